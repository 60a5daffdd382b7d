use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sea_orm::{DbErr, RuntimeErr, SqlErr};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("movie catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("database error: {0}")]
    Storage(#[from] DbErr),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::CatalogUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::CatalogUnavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Storage(_) | AppError::Other(_) => {
                tracing::error!(error = %self, "request failed");
            },
            AppError::CatalogUnavailable(_) => {
                tracing::warn!(error = %self, "catalog request failed");
            },
            AppError::NotFound(_) | AppError::Validation(_) => {},
        }

        let body = crate::templates::error_page(&self.to_string());
        (self.status(), Html(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// True when the storage layer rejected a write because of a uniqueness constraint.
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            e.to_string().to_lowercase().contains("unique constraint")
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::ConnAcquireErr;

    use super::*;

    #[test]
    fn pool_timeout_is_a_storage_error() {
        let err = AppError::from(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout));
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::not_found("entry x").status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::validation("bad score").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::CatalogUnavailable("down".to_string()).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
