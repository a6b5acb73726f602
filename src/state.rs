use crate::config::Config;
use crate::error::LibXml2Result;
use crate::store::DocumentStore;
use crate::validator::DocumentValidator;
use std::sync::Arc;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Effective configuration
    pub config: Arc<Config>,

    /// The stored document and its save lock
    pub store: Arc<DocumentStore>,

    /// Validator with the fixed DTD (if any) already parsed
    pub validator: Arc<DocumentValidator>,
}

impl AppState {
    /// Create application state, parsing the fixed DTD if one is configured
    pub fn new(config: Config) -> LibXml2Result<Self> {
        let document_path = config.storage.document_path.clone();
        let validator = DocumentValidator::new(&config.validation, Some(&document_path))?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(DocumentStore::new(document_path)),
            validator: Arc::new(validator),
        })
    }
}
