//! # Validation Module
//!
//! Input validation run by the ledger before any transaction opens.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (no store access)                                │
//! │  ├── Required fields, id format, card number shape                     │
//! │  └── Amount signs                                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SaleLedger, inside the transaction                           │
//! │  ├── Product state, customer status, card uniqueness                   │
//! │  └── Balance checks against locked rows                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE card_number / product_id per sale table                    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use abono_core::validation::{validate_card_number, validate_uuid};
//!
//! assert!(validate_card_number("1042", 20).is_ok());
//! assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{CashSaleUpdate, CreditSaleUpdate, InstallmentUpdate, NewCashSale, NewCreditSale, NewInstallment};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a card number.
///
/// ## Rules
/// - Must not be empty
/// - At most `max_len` characters
/// - Letters, digits and hyphens only
///
/// ## Example
/// ```rust
/// use abono_core::validation::validate_card_number;
///
/// assert!(validate_card_number("A-1042", 20).is_ok());
/// assert!(validate_card_number("", 20).is_err());
/// assert!(validate_card_number("10 42", 20).is_err());
/// ```
pub fn validate_card_number(card_number: &str, max_len: usize) -> ValidationResult<()> {
    let card_number = card_number.trim();

    if card_number.is_empty() {
        return Err(ValidationError::Required {
            field: "card_number".to_string(),
        });
    }

    if card_number.chars().count() > max_len {
        return Err(ValidationError::TooLong {
            field: "card_number".to_string(),
            max: max_len,
        });
    }

    if !card_number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "card_number".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Money Validators
// =============================================================================

/// Validates the initial installment of a credit sale.
///
/// Zero is allowed (nothing paid at the counter). The upper bound is the
/// product price, which is only known inside the transaction.
pub fn validate_initial_installment(amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "initial_installment".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an installment amount (entries after the seed).
///
/// ## Example
/// ```rust
/// use abono_core::money::Money;
/// use abono_core::validation::validate_installment_amount;
///
/// assert!(validate_installment_amount(Money::from_cents(30_000)).is_ok());
/// assert!(validate_installment_amount(Money::zero()).is_err());
/// ```
pub fn validate_installment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates an installment sequence number (1-based).
pub fn validate_sequence(sequence: i64) -> ValidationResult<()> {
    if sequence < crate::FIRST_INSTALLMENT {
        return Err(ValidationError::OutOfRange {
            field: "sequence".to_string(),
            min: crate::FIRST_INSTALLMENT,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use abono_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    validate_id("id", id)
}

/// Same as [`validate_uuid`] but reports the offending field by name.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Input Validators
// =============================================================================

pub fn validate_new_credit_sale(input: &NewCreditSale, max_card_len: usize) -> ValidationResult<()> {
    validate_card_number(&input.card_number, max_card_len)?;
    validate_initial_installment(input.initial_installment)?;
    validate_id("customer_id", &input.customer_id)?;
    validate_id("product_id", &input.product_id)?;
    validate_id("admin_id", &input.admin_id)
}

pub fn validate_credit_sale_update(
    input: &CreditSaleUpdate,
    max_card_len: usize,
) -> ValidationResult<()> {
    validate_card_number(&input.card_number, max_card_len)?;
    validate_initial_installment(input.initial_installment)?;
    validate_id("customer_id", &input.customer_id)?;
    validate_id("product_id", &input.product_id)
}

pub fn validate_new_cash_sale(input: &NewCashSale, max_card_len: usize) -> ValidationResult<()> {
    validate_card_number(&input.card_number, max_card_len)?;
    validate_id("customer_id", &input.customer_id)?;
    validate_id("product_id", &input.product_id)?;
    validate_id("admin_id", &input.admin_id)
}

pub fn validate_cash_sale_update(input: &CashSaleUpdate, max_card_len: usize) -> ValidationResult<()> {
    validate_card_number(&input.card_number, max_card_len)?;
    validate_id("customer_id", &input.customer_id)?;
    validate_id("product_id", &input.product_id)
}

pub fn validate_new_installment(input: &NewInstallment) -> ValidationResult<()> {
    validate_installment_amount(input.amount)?;
    validate_id("admin_id", &input.admin_id)
}

/// Sequence 1 passes here; refusing it is a business rule, not a format error.
pub fn validate_installment_update(input: &InstallmentUpdate) -> ValidationResult<()> {
    validate_sequence(input.sequence)?;
    validate_installment_amount(input.amount)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_validate_card_number() {
        assert!(validate_card_number("1042", 20).is_ok());
        assert!(validate_card_number("AB-77", 20).is_ok());

        assert!(validate_card_number("", 20).is_err());
        assert!(validate_card_number("   ", 20).is_err());
        assert!(validate_card_number("12/4", 20).is_err());
        assert_eq!(
            validate_card_number(&"9".repeat(21), 20),
            Err(ValidationError::TooLong {
                field: "card_number".to_string(),
                max: 20
            })
        );
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_initial_installment(Money::zero()).is_ok());
        assert!(validate_initial_installment(Money::from_cents(-1)).is_err());

        assert!(validate_installment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_installment_amount(Money::zero()).is_err());
        assert!(validate_installment_amount(Money::from_cents(-500)).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid(ID).is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
        assert_eq!(
            validate_id("product_id", "nope"),
            Err(ValidationError::InvalidFormat {
                field: "product_id".to_string(),
                reason: "must be a valid UUID".to_string()
            })
        );
    }

    #[test]
    fn test_validate_new_credit_sale() {
        let mut input = NewCreditSale {
            card_number: "1042".to_string(),
            sale_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            initial_installment: Money::from_cents(20_000),
            customer_id: ID.to_string(),
            product_id: ID.to_string(),
            admin_id: ID.to_string(),
        };
        assert!(validate_new_credit_sale(&input, 20).is_ok());

        input.admin_id = String::new();
        assert_eq!(
            validate_new_credit_sale(&input, 20),
            Err(ValidationError::Required {
                field: "admin_id".to_string()
            })
        );
    }

    #[test]
    fn test_validate_installment_update() {
        let update = InstallmentUpdate {
            sequence: 0,
            amount: Money::from_cents(100),
            paid_on: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert!(validate_installment_update(&update).is_err());

        let update = InstallmentUpdate { sequence: 1, ..update };
        assert!(validate_installment_update(&update).is_ok());
    }
}
