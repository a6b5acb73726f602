use crate::error::ServiceError;
use crate::routes::{XmlForm, submitted_xml};
use crate::state::AppState;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

const XML_CONTENT_TYPE: &str = "application/xml";

/// Response from a successful save
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    /// Backup of the previous document, `null` when there was none
    pub backup: Option<String>,
}

/// Return the stored document verbatim
///
/// Failures are reported as a small XML document rather than JSON:
/// `<?xml version="1.0" encoding="UTF-8"?><error>File not found</error>`
pub async fn load_document(State(state): State<AppState>) -> Response {
    match state.store.load().await {
        Ok(bytes) => ([(CONTENT_TYPE, XML_CONTENT_TYPE)], bytes).into_response(),
        Err(e) => xml_error(e),
    }
}

/// Back up the stored document and replace it with the submitted one
pub async fn save_document(
    State(state): State<AppState>,
    form: Result<Form<XmlForm>, FormRejection>,
) -> Result<Json<SaveResponse>, ServiceError> {
    let xml = submitted_xml(form)?;
    let outcome = state.store.save(&xml).await?;

    Ok(Json(SaveResponse {
        success: true,
        backup: outcome.backup.map(|path| path.display().to_string()),
    }))
}

fn xml_error(error: ServiceError) -> Response {
    error.log();

    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><error>{}</error>"#,
        error.public_message()
    );
    (
        error.status_code(),
        [(CONTENT_TYPE, XML_CONTENT_TYPE)],
        body,
    )
        .into_response()
}
