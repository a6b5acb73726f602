use crate::error::ServiceError;
use crate::routes::{XmlForm, submitted_xml};
use crate::state::AppState;
use crate::validator::ValidationReport;
use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::{Form, Json};

/// Validate a submitted document
///
/// DTD and note-list problems are a normal outcome (`200` with `valid: false`);
/// only a missing body or a libxml2 failure is an error response.
pub async fn validate_document(
    State(state): State<AppState>,
    form: Result<Form<XmlForm>, FormRejection>,
) -> Result<Json<ValidationReport>, ServiceError> {
    let xml = submitted_xml(form)?;
    let report = state.validator.validate(&xml)?;

    tracing::info!(
        valid = report.valid,
        errors = report.error_count(),
        "Validated submitted document"
    );

    Ok(Json(report))
}
