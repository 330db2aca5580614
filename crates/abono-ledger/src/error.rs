//! # Ledger Error Type
//!
//! The error every [`SaleLedger`](crate::SaleLedger) operation returns.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Ledger                             │
//! │                                                                         │
//! │  ledger.register_installment(id, input)                                 │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  validate input ──── ValidationError ──────────────┐            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          │            │  │
//! │  │  begin tx, lock ──── DbError::NotFound ────────────┤            │  │
//! │  │         │                                          │            │  │
//! │  │         ▼                                          ▼            │  │
//! │  │  rules, writes ───── DbError::Conflict ────── LedgerError ─────►│  │
//! │  │         │                                          ▲            │  │
//! │  │         ▼                                          │            │  │
//! │  │  commit ──────────── DbError::LockTimeout ─────────┘            │  │
//! │  │         │            (and every other store fault → Internal)  │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Any error drops the transaction handle, which rolls back.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! Callers that cross a process boundary send an [`ErrorReport`]:
//! ```json
//! {
//!   "code": "CONFLICT",
//!   "message": "Installment amount $900.00 exceeds remaining balance $800.00"
//! }
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use abono_core::{ConflictError, CoreError, ValidationError};
use abono_db::DbError;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or missing input, rejected before any transaction.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Sale, product, customer or administrator does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A business rule refused the operation.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// A unique index refused a row the guard did not catch.
    #[error("Duplicate {field}: '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Storage failure, lock timeout or unexpected fault. Nothing was written.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error codes.
///
/// ## Usage
/// ```rust
/// use abono_ledger::ErrorKind;
///
/// let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
/// assert_eq!(json, "\"NOT_FOUND\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Input validation failed
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,

    /// Requested record doesn't exist
    NotFound,

    /// Business rule violation
    Conflict,

    /// Unexpected server error
    Internal,
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        LedgerError::Internal(message.into())
    }

    /// Collapses the error into one of the four reported kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Conflict(_) | LedgerError::Duplicate { .. } => ErrorKind::Conflict,
            LedgerError::Config(_) | LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// The business rule behind a conflict, if there is one.
    pub fn conflict(&self) -> Option<&ConflictError> {
        match self {
            LedgerError::Conflict(c) => Some(c),
            _ => None,
        }
    }
}

/// Convert database errors to ledger errors.
///
/// ## Error Mapping
/// ```text
/// DbError::NotFound            → NotFound
/// DbError::Conflict            → Conflict
/// DbError::Validation          → Validation
/// DbError::UniqueViolation     → Duplicate (kind CONFLICT)
/// DbError::ForeignKeyViolation → NotFound (a referenced row is missing)
/// everything else              → Internal (logged)
/// ```
impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::Conflict(c) => LedgerError::Conflict(c),
            DbError::Validation(v) => LedgerError::Validation(v),
            DbError::UniqueViolation { field, value } => LedgerError::Duplicate { field, value },
            DbError::ForeignKeyViolation { message } => LedgerError::NotFound {
                entity: "Referenced record".to_string(),
                id: message,
            },
            other => {
                tracing::error!(error = %other, "Database error");
                LedgerError::Internal(other.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from(DbError::from(err))
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => LedgerError::Validation(v),
            CoreError::Conflict(c) => LedgerError::Conflict(c),
        }
    }
}

// =============================================================================
// Error Report
// =============================================================================

/// Serializable form of a [`LedgerError`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorKind,

    /// Human-readable error message for display
    pub message: String,
}

impl From<&LedgerError> for ErrorReport {
    fn from(err: &LedgerError) -> Self {
        ErrorReport {
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abono_core::Money;

    #[test]
    fn test_db_errors_map_to_kinds() {
        let err = LedgerError::from(DbError::not_found("CreditSale", "x"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "CreditSale not found: x");

        let err = LedgerError::from(DbError::Conflict(ConflictError::FirstInstallmentLocked));
        assert!(err.is_conflict());
        assert_eq!(err.conflict(), Some(&ConflictError::FirstInstallmentLocked));

        let err = LedgerError::from(DbError::duplicate("card_number", "1042"));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        assert_eq!(LedgerError::from(DbError::LockTimeout).kind(), ErrorKind::Internal);
        assert_eq!(LedgerError::from(DbError::PoolExhausted).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_report_serialization() {
        let err = LedgerError::Conflict(ConflictError::AmountExceedsBalance {
            amount: Money::from_cents(90_000),
            remaining: Money::from_cents(80_000),
        });
        let json = serde_json::to_value(ErrorReport::from(&err)).unwrap();

        assert_eq!(json["code"], "CONFLICT");
        assert_eq!(
            json["message"],
            "Installment amount $900.00 exceeds remaining balance $800.00"
        );

        let err = LedgerError::Validation(ValidationError::Required {
            field: "card_number".to_string(),
        });
        let json = serde_json::to_value(ErrorReport::from(&err)).unwrap();
        assert_eq!(json["code"], "VALIDATION_ERROR");
    }
}
