use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("student {0} does not exist")]
    UnknownStudent(Uuid),

    #[error("storage query failed: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("csv import failed: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalyticsError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AnalyticsError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parses a caller-supplied identifier. Empty, malformed and nil ids are rejected.
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid, AnalyticsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalyticsError::invalid(field, "identifier is required"));
    }

    let id = Uuid::parse_str(trimmed)
        .map_err(|err| {
            AnalyticsError::invalid(field, format!("`{trimmed}` is not a uuid: {err}"))
        })?;

    if id.is_nil() {
        return Err(AnalyticsError::invalid(field, "nil uuid is not a valid identifier"));
    }

    Ok(id)
}
