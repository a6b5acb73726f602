//! Document Validation Engine
//!
//! Validation of a submitted MIDNAM document runs in two phases that both always
//! execute once the document parses:
//! - **DTD phase**: libxml2 validates the parsed tree against its declared DTD, or
//!   against the single fixed DTD when one is configured. Every diagnostic is kept,
//!   formatted as `Line <N>: <message>`.
//! - **Note phase**: every `NoteNameList` is checked for invalid, empty and duplicate
//!   note numbers and for empty note names.
//!
//! Input that is not well-formed XML short-circuits to a single
//! `"Invalid XML structure"` error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::error::{LibXml2Error, LibXml2Result};
use crate::libxml2::{LibXml2Wrapper, XmlDtdPtr};
use crate::notes::{self, NoteNumberGrammar};

/// The only error reported for input that cannot be parsed as XML
pub const INVALID_XML_STRUCTURE: &str = "Invalid XML structure";

/// Result of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Build a report from the collected errors; valid iff there are none
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Report for input that is not well-formed XML
    pub fn malformed() -> Self {
        Self {
            valid: false,
            errors: vec![INVALID_XML_STRUCTURE.to_string()],
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Validates MIDNAM documents; cheap to share between request handlers
#[derive(Debug, Clone)]
pub struct DocumentValidator {
    libxml: LibXml2Wrapper,
    dtd: Option<XmlDtdPtr>,
    grammar: NoteNumberGrammar,
    base_url: Option<PathBuf>,
}

impl DocumentValidator {
    /// Create a validator, parsing the fixed DTD if one is configured
    ///
    /// `base_url` is where relative external DTD references are resolved from,
    /// normally the storage path of the document.
    pub fn new(config: &ValidationConfig, base_url: Option<&Path>) -> LibXml2Result<Self> {
        let libxml = LibXml2Wrapper::new();

        let dtd = match &config.dtd_path {
            Some(path) => {
                let dtd = libxml.parse_dtd_file(path)?;
                tracing::info!(path = %path.display(), "Loaded fixed DTD");
                Some(dtd)
            }
            None => None,
        };

        Ok(Self {
            libxml,
            dtd,
            grammar: config.note_numbers,
            base_url: base_url.map(Path::to_path_buf),
        })
    }

    pub fn grammar(&self) -> NoteNumberGrammar {
        self.grammar
    }

    pub fn uses_fixed_dtd(&self) -> bool {
        self.dtd.is_some()
    }

    /// Validate a document
    ///
    /// Malformed input is not an error: it yields [`ValidationReport::malformed`].
    ///
    /// # Errors
    ///
    /// Returns an error only when libxml2 itself fails (validation context
    /// allocation, input larger than libxml2 accepts).
    pub fn validate(&self, xml: &str) -> LibXml2Result<ValidationReport> {
        let document = match self
            .libxml
            .parse_document(xml.as_bytes(), self.base_url.as_deref())
        {
            Ok(document) => document,
            Err(LibXml2Error::MalformedDocument { details }) => {
                tracing::debug!(%details, "Rejecting malformed document");
                return Ok(ValidationReport::malformed());
            }
            Err(e) => return Err(e),
        };

        let dtd_result = match &self.dtd {
            Some(dtd) => self.libxml.validate_against_dtd(&document, dtd)?,
            None => self.libxml.validate_document(&document)?,
        };

        let note_lists = notes::collect_note_lists(&document);

        let mut errors: Vec<String> = dtd_result
            .diagnostics()
            .iter()
            .map(ToString::to_string)
            .collect();
        errors.extend(notes::check_note_lists(&note_lists, self.grammar));

        let report = ValidationReport::from_errors(errors);
        tracing::debug!(
            valid = report.valid,
            errors = report.error_count(),
            note_lists = note_lists.len(),
            "Validated document"
        );

        Ok(report)
    }

    /// Well-formedness check used before persisting a document
    pub fn check_well_formed(&self, xml: &str) -> LibXml2Result<()> {
        self.libxml.check_well_formed(xml.as_bytes())
    }
}
