//! API route handlers
//!
//! - `document`: retrieval and persistence of the stored document
//! - `validate`: validation of a submitted document

pub mod document;
pub mod validate;

use crate::error::ServiceError;
use axum::Form;
use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;

/// Form body shared by the save and validate endpoints, as ordered key/value pairs
pub type XmlForm = Vec<(String, String)>;

const XML_FIELD: &str = "xml";

/// Pull the `xml` field out of a form body
///
/// A repeated field keeps its last value. A missing or unreadable body counts as no data.
pub(crate) fn submitted_xml(
    form: Result<Form<XmlForm>, FormRejection>,
) -> Result<String, ServiceError> {
    let fields = match form {
        Ok(Form(fields)) => fields,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(ServiceError::PayloadTooLarge);
        }
        Err(rejection) => {
            tracing::debug!(%rejection, "Unusable form body");
            Vec::new()
        }
    };

    let xml = fields
        .into_iter()
        .rev()
        .find_map(|(key, value)| (key == XML_FIELD).then_some(value))
        .unwrap_or_default();

    if xml.is_empty() {
        return Err(ServiceError::BadRequest);
    }

    Ok(xml)
}

/// Any method a route does not serve
pub async fn method_not_allowed() -> ServiceError {
    ServiceError::MethodNotAllowed
}

/// Plain `OPTIONS` requests (not CORS preflights) get an empty 200
pub async fn options() -> StatusCode {
    StatusCode::OK
}
