//! LibXML2 FFI Wrapper Module
//!
//! This module provides a safe wrapper around the libxml2 calls the service needs:
//! parsing a document from memory, validating it against its own DTD (or a fixed,
//! pre-parsed DTD), and capturing every diagnostic libxml2 reports with its source line.
//!
//! ## Error capture
//!
//! libxml2 reports problems through a structured error callback. The callback is
//! installed with `xmlSetStructuredErrorFunc`, which libxml2 keeps in thread-local
//! storage for threaded builds. Every call in this module installs the callback,
//! performs the libxml2 work synchronously on the same thread, then removes it
//! (see [`ErrorCapture`]). Nothing here awaits while a capture is installed.
//!
//! ## Thread Safety
//!
//! - **Initialization**: `xmlInitParser` is not thread-safe and runs exactly once.
//! - **Document parsing and validation**: independent documents on different threads
//!   are safe; each call creates its own validation context.
//! - **Shared DTD**: a parsed DTD is only read during validation, so it is shared
//!   between threads behind an `Arc`, the same way a parsed schema would be.

use std::ffi::{CStr, CString};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Once};

use libc::{c_char, c_int, c_uchar, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// `XML_PARSE_NONET`: forbid network access while loading the document
const XML_PARSE_NONET: c_int = 1 << 11;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDtd {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlValidCtxt {
    _private: [u8; 0],
}

/// Leading fields of libxml2's `xmlNode`; the rest is never read from Rust
#[repr(C)]
pub struct XmlNode {
    _private: *mut c_void,
    node_type: c_int,
    name: *const c_uchar,
    children: *mut XmlNode,
    _last: *mut XmlNode,
    _parent: *mut XmlNode,
    next: *mut XmlNode,
}

/// `XML_ELEMENT_NODE`
const XML_ELEMENT_NODE: c_int = 1;

pub type XmlFreeFunc = Option<unsafe extern "C" fn(mem: *mut c_void)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlLineNumbersDefault(val: c_int) -> c_int;

    // Document parsing
    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);

    // Tree access
    pub fn xmlDocGetRootElement(doc: *const XmlDoc) -> *mut XmlNode;
    pub fn xmlGetProp(node: *const XmlNode, name: *const c_uchar) -> *mut c_uchar;
    #[allow(non_upper_case_globals)]
    pub static xmlFree: XmlFreeFunc;

    // DTD handling
    pub fn xmlParseDTD(external_id: *const c_uchar, system_id: *const c_uchar) -> *mut XmlDtd;
    pub fn xmlFreeDtd(dtd: *mut XmlDtd);

    // Validation
    pub fn xmlNewValidCtxt() -> *mut XmlValidCtxt;
    pub fn xmlFreeValidCtxt(ctxt: *mut XmlValidCtxt);
    pub fn xmlValidateDocument(ctxt: *mut XmlValidCtxt, doc: *mut XmlDoc) -> c_int;
    pub fn xmlValidateDtd(ctxt: *mut XmlValidCtxt, doc: *mut XmlDoc, dtd: *mut XmlDtd) -> c_int;

    // Error reporting
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

/// Severity of a libxml2 diagnostic (`xmlErrorLevel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Warning,
    Error,
    Fatal,
}

impl DiagnosticLevel {
    fn from_raw(level: c_int) -> Self {
        match level {
            3 => DiagnosticLevel::Fatal,
            2 => DiagnosticLevel::Error,
            _ => DiagnosticLevel::Warning,
        }
    }
}

/// One diagnostic reported by libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDiagnostic {
    /// 1-based source line, 0 when libxml2 had no node to attribute it to
    pub line: i32,
    pub level: DiagnosticLevel,
    /// Message with surrounding whitespace removed
    pub message: String,
}

impl fmt::Display for XmlDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

/// Callback for libxml2 to report diagnostics (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }

    let diagnostics = unsafe { &mut *(user_data as *mut Vec<XmlDiagnostic>) };
    let error = unsafe { &*error };

    let message = if error.message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim()
            .to_string()
    };

    diagnostics.push(XmlDiagnostic {
        line: error.line,
        level: DiagnosticLevel::from_raw(error.level),
        message,
    });
}

/// Installs the structured error callback on the current thread for the lifetime
/// of the guard. Dropping the guard removes the callback again.
struct ErrorCapture {
    sink: Box<Vec<XmlDiagnostic>>,
}

impl ErrorCapture {
    fn install() -> Self {
        let mut sink = Box::new(Vec::new());
        let sink_ptr = &mut *sink as *mut Vec<XmlDiagnostic> as *mut c_void;

        unsafe {
            xmlSetStructuredErrorFunc(sink_ptr, Some(structured_error_callback));
        }

        ErrorCapture { sink }
    }

    fn take(&mut self) -> Vec<XmlDiagnostic> {
        std::mem::take(&mut *self.sink)
    }
}

impl Drop for ErrorCapture {
    fn drop(&mut self) {
        unsafe {
            xmlSetStructuredErrorFunc(std::ptr::null_mut(), None);
        }
    }
}

/// A parsed libxml2 document, freed on drop
///
/// Not `Send`: a document is parsed, validated and dropped within one call.
pub struct XmlDocument {
    ptr: *mut XmlDoc,
}

impl XmlDocument {
    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }

    /// The document element, `None` for a document without one
    pub fn root_element(&self) -> Option<XmlElement<'_>> {
        let node = unsafe { xmlDocGetRootElement(self.ptr) };
        XmlElement::from_raw(node)
    }
}

/// An element node borrowed from a parsed [`XmlDocument`]
#[derive(Clone, Copy)]
pub struct XmlElement<'doc> {
    ptr: *mut XmlNode,
    _doc: PhantomData<&'doc XmlDocument>,
}

impl<'doc> XmlElement<'doc> {
    fn from_raw(ptr: *mut XmlNode) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(XmlElement {
            ptr,
            _doc: PhantomData,
        })
    }

    /// Element name as stored by libxml2, without any namespace prefix
    pub fn name(&self) -> &'doc [u8] {
        let name = unsafe { (*self.ptr).name };
        if name.is_null() {
            return &[];
        }
        unsafe { CStr::from_ptr(name as *const c_char) }.to_bytes()
    }

    /// Attribute value as the XML data model sees it: entity references
    /// expanded, whitespace normalized and DTD defaults applied
    pub fn attribute(&self, name: &str) -> Option<String> {
        let c_name = CString::new(name).ok()?;
        let value = unsafe { xmlGetProp(self.ptr, c_name.as_ptr() as *const c_uchar) };
        if value.is_null() {
            return None;
        }

        let text = unsafe { CStr::from_ptr(value as *const c_char) }
            .to_string_lossy()
            .into_owned();
        unsafe {
            if let Some(free) = xmlFree {
                free(value as *mut c_void);
            }
        }
        Some(text)
    }

    /// Child elements in document order; text, comments and entity
    /// references are skipped
    pub fn children(&self) -> XmlChildren<'doc> {
        XmlChildren {
            next: unsafe { (*self.ptr).children },
            _doc: PhantomData,
        }
    }
}

impl fmt::Debug for XmlElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlElement")
            .field("name", &String::from_utf8_lossy(self.name()))
            .finish()
    }
}

/// Iterator over the child elements of an [`XmlElement`]
pub struct XmlChildren<'doc> {
    next: *mut XmlNode,
    _doc: PhantomData<&'doc XmlDocument>,
}

impl<'doc> Iterator for XmlChildren<'doc> {
    type Item = XmlElement<'doc>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.next.is_null() {
            let node = self.next;
            let (node_type, next) = unsafe { ((*node).node_type, (*node).next) };
            self.next = next;
            if node_type == XML_ELEMENT_NODE {
                return XmlElement::from_raw(node);
            }
        }
        None
    }
}

impl Drop for XmlDocument {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDoc(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Thread-safe wrapper for a parsed DTD with proper resource management
#[derive(Debug, Clone)]
pub struct XmlDtdPtr {
    inner: Arc<XmlDtdInner>,
}

#[derive(Debug)]
struct XmlDtdInner {
    ptr: *mut XmlDtd,
    _phantom: PhantomData<XmlDtd>,
}

// Safety: the DTD is never mutated after parsing; validation only reads it.
unsafe impl Send for XmlDtdInner {}
unsafe impl Sync for XmlDtdInner {}

impl XmlDtdPtr {
    /// # Safety
    ///
    /// The pointer must come from `xmlParseDTD` and must not be freed elsewhere.
    unsafe fn from_raw(ptr: *mut XmlDtd, path: &Path) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::DtdParseFailed {
                path: path.to_path_buf(),
            });
        }

        Ok(XmlDtdPtr {
            inner: Arc::new(XmlDtdInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlDtd {
        self.inner.ptr
    }
}

impl Drop for XmlDtdInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlFreeDtd(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Outcome of DTD validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Document satisfies its DTD (return code 1)
    Valid,
    /// Document violates its DTD; all diagnostics libxml2 raised
    Invalid { diagnostics: Vec<XmlDiagnostic> },
}

impl ValidationResult {
    /// Create ValidationResult from libxml2 return code and captured diagnostics
    pub fn from_code(code: c_int, diagnostics: Vec<XmlDiagnostic>) -> Self {
        match code {
            1 => ValidationResult::Valid,
            _ => ValidationResult::Invalid { diagnostics },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn diagnostics(&self) -> &[XmlDiagnostic] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid { diagnostics } => diagnostics,
        }
    }
}

/// LibXML2 wrapper providing safe access to parsing and DTD validation
#[derive(Debug, Clone, Copy)]
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Create a new LibXML2 wrapper instance
    ///
    /// Initializes the libxml2 parser exactly once per process; safe to call repeatedly.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse an XML document from memory
    ///
    /// `base_url` is used to resolve a relative external DTD reference.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::MalformedDocument` if the input is not well-formed XML,
    /// `LibXml2Error::InputTooLarge` if it does not fit libxml2's `int` length.
    pub fn parse_document(
        &self,
        content: &[u8],
        base_url: Option<&Path>,
    ) -> LibXml2Result<XmlDocument> {
        let size = c_int::try_from(content.len()).map_err(|_| LibXml2Error::InputTooLarge {
            size: content.len(),
        })?;

        let c_url = match base_url {
            Some(path) => Some(path_to_cstring(path)?),
            None => None,
        };
        let url_ptr = c_url
            .as_ref()
            .map_or(std::ptr::null(), |url| url.as_ptr());

        let mut capture = ErrorCapture::install();
        let doc = unsafe {
            // Per-thread default on older libxml2; nodes need lines for validity diagnostics
            xmlLineNumbersDefault(1);
            xmlReadMemory(
                content.as_ptr() as *const c_char,
                size,
                url_ptr,
                std::ptr::null(),
                XML_PARSE_NONET,
            )
        };
        let diagnostics = capture.take();
        drop(capture);

        if doc.is_null() {
            let details = diagnostics
                .iter()
                .find(|d| d.level >= DiagnosticLevel::Error)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "document could not be parsed".to_string());
            return Err(LibXml2Error::MalformedDocument { details });
        }

        for diagnostic in &diagnostics {
            tracing::debug!(%diagnostic, "libxml2 parser diagnostic");
        }

        Ok(XmlDocument { ptr: doc })
    }

    /// Check that the input is well-formed XML without keeping the tree
    pub fn check_well_formed(&self, content: &[u8]) -> LibXml2Result<()> {
        self.parse_document(content, None).map(drop)
    }

    /// Parse a DTD from a file
    ///
    /// The returned pointer can be shared between threads and reused for every validation.
    pub fn parse_dtd_file(&self, path: &Path) -> LibXml2Result<XmlDtdPtr> {
        let c_path = path_to_cstring(path)?;

        let mut capture = ErrorCapture::install();
        let dtd = unsafe { xmlParseDTD(std::ptr::null(), c_path.as_ptr() as *const c_uchar) };
        for diagnostic in capture.take() {
            tracing::warn!(%diagnostic, path = %path.display(), "DTD diagnostic");
        }
        drop(capture);

        unsafe { XmlDtdPtr::from_raw(dtd, path) }
    }

    /// Validate a document against the DTD it declares
    ///
    /// A document without any DTD is invalid ("no DTD found").
    pub fn validate_document(&self, document: &XmlDocument) -> LibXml2Result<ValidationResult> {
        self.run_validation(|ctxt| unsafe { xmlValidateDocument(ctxt, document.as_ptr()) })
    }

    /// Validate a document against a fixed DTD, ignoring its own DOCTYPE
    pub fn validate_against_dtd(
        &self,
        document: &XmlDocument,
        dtd: &XmlDtdPtr,
    ) -> LibXml2Result<ValidationResult> {
        self.run_validation(|ctxt| unsafe { xmlValidateDtd(ctxt, document.as_ptr(), dtd.as_ptr()) })
    }

    fn run_validation<F>(&self, validate: F) -> LibXml2Result<ValidationResult>
    where
        F: FnOnce(*mut XmlValidCtxt) -> c_int,
    {
        let ctxt = unsafe { xmlNewValidCtxt() };
        if ctxt.is_null() {
            return Err(LibXml2Error::ValidationContextCreationFailed);
        }

        let mut capture = ErrorCapture::install();
        let code = validate(ctxt);
        let diagnostics = capture.take();
        drop(capture);

        unsafe {
            xmlFreeValidCtxt(ctxt);
        }

        Ok(ValidationResult::from_code(code, diagnostics))
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}
