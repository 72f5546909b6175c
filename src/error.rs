//! Error types for Librio server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable application error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchLoan = 6,
    NoSuchCategory = 7,
    BookNotAvailable = 8,
    ReservationConflict = 9,
    CopiesAlreadyFull = 10,
    MaxLoansReached = 11,
    DuplicateLoan = 12,
    AlreadyReturned = 13,
    NotRenewable = 14,
    LibrarianRequired = 15,
    Duplicate = 16,
    BadValue = 17,
}

/// Main application error type.
///
/// Domain violations are distinct variants carrying the identifiers and
/// limits involved, so callers switch on the variant rather than on message
/// content. `IntoResponse` is the single place where variants are translated
/// to HTTP semantics; the services never see status codes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("User with id {id} not found")]
    UserNotFound { id: i32 },

    #[error("Book with id {id} not found")]
    BookNotFound { id: i32 },

    #[error("Loan with id {id} not found")]
    LoanNotFound { id: i32 },

    #[error("Category with id {id} not found")]
    CategoryNotFound { id: i32 },

    #[error("No copies of book {book_id} are available")]
    BookNotAvailable { book_id: i32 },

    #[error("Book {book_id} was exhausted by a concurrent reservation")]
    ReservationConflict { book_id: i32 },

    #[error("All copies of book {book_id} are already on shelf")]
    CopiesAlreadyFull { book_id: i32 },

    #[error("Maximum number of borrowed books reached (limit: {limit})")]
    LoanLimitExceeded { limit: i32, active: i64 },

    #[error("User {user_id} already has an active loan for book {book_id}")]
    DuplicateActiveLoan { user_id: i32, book_id: i32 },

    #[error("Loan {loan_id} has already been returned")]
    AlreadyReturned { loan_id: i32 },

    #[error("Loan {loan_id} is not renewable")]
    NotRenewable { loan_id: i32 },

    #[error("Librarian role required")]
    LibrarianRequired,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Machine-readable error code for the API boundary
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) => ErrorCode::NotAuthorized,
            AppError::NotAuthorized(_) => ErrorCode::NotAuthorized,
            AppError::UserNotFound { .. } => ErrorCode::NoSuchUser,
            AppError::BookNotFound { .. } => ErrorCode::NoSuchBook,
            AppError::LoanNotFound { .. } => ErrorCode::NoSuchLoan,
            AppError::CategoryNotFound { .. } => ErrorCode::NoSuchCategory,
            AppError::BookNotAvailable { .. } => ErrorCode::BookNotAvailable,
            AppError::ReservationConflict { .. } => ErrorCode::ReservationConflict,
            AppError::CopiesAlreadyFull { .. } => ErrorCode::CopiesAlreadyFull,
            AppError::LoanLimitExceeded { .. } => ErrorCode::MaxLoansReached,
            AppError::DuplicateActiveLoan { .. } => ErrorCode::DuplicateLoan,
            AppError::AlreadyReturned { .. } => ErrorCode::AlreadyReturned,
            AppError::NotRenewable { .. } => ErrorCode::NotRenewable,
            AppError::LibrarianRequired => ErrorCode::LibrarianRequired,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::NotAuthorized(_) | AppError::LibrarianRequired => StatusCode::FORBIDDEN,
            AppError::UserNotFound { .. }
            | AppError::BookNotFound { .. }
            | AppError::LoanNotFound { .. }
            | AppError::CategoryNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BookNotAvailable { .. }
            | AppError::ReservationConflict { .. }
            | AppError::CopiesAlreadyFull { .. }
            | AppError::DuplicateActiveLoan { .. }
            | AppError::AlreadyReturned { .. }
            | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::LoanLimitExceeded { .. } | AppError::NotRenewable { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_exceeded_message_contains_the_limit() {
        let err = AppError::LoanLimitExceeded { limit: 2, active: 2 };
        assert!(err.to_string().contains('2'));
        assert_eq!(err.code(), ErrorCode::MaxLoansReached);
    }

    #[test]
    fn domain_errors_map_to_distinct_codes() {
        let codes = [
            AppError::BookNotAvailable { book_id: 1 }.code() as u32,
            AppError::ReservationConflict { book_id: 1 }.code() as u32,
            AppError::DuplicateActiveLoan { user_id: 1, book_id: 1 }.code() as u32,
            AppError::AlreadyReturned { loan_id: 1 }.code() as u32,
            AppError::NotRenewable { loan_id: 1 }.code() as u32,
            AppError::LibrarianRequired.code() as u32,
        ];
        let mut unique = codes.to_vec();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn http_mapping_for_domain_violations() {
        assert_eq!(
            AppError::AlreadyReturned { loan_id: 3 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::LibrarianRequired.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::NotRenewable { loan_id: 3 }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::LoanLimitExceeded { limit: 5, active: 5 }.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
