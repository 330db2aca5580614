//! # Ledger Rules
//!
//! Pure balance arithmetic and lifecycle checks. The database layer calls
//! these against rows it has already locked, so every function here is a
//! plain value-in, value-out decision.
//!
//! ## Balance Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  price 1000, initial installment 200                                    │
//! │                                                                         │
//! │  initial_balance(1000, 200) ─────────────────────────► 800             │
//! │                                                                         │
//! │  #2  check_installment(300, 800)  apply_delta(800, -300) ──► 500       │
//! │  #3  check_installment(300, 500)  apply_delta(500, -300) ──► 200       │
//! │  #4  check_installment(200, 200)  apply_delta(200, -200) ──► 0  ★      │
//! │                                                                         │
//! │  ★ reaches_zero: sale → Finalized, product → Closed                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{ConflictError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CreditSale, CreditSaleStatus, ProductState, User};
use crate::FIRST_INSTALLMENT;

// =============================================================================
// Balance Arithmetic
// =============================================================================

/// Outcome of a balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub remaining: Money,
    /// True when the new balance is exactly zero. The only finalize trigger.
    pub reaches_zero: bool,
}

/// Balance owed after the counter payment.
///
/// ## Example
/// ```rust
/// use abono_core::money::Money;
/// use abono_core::rules::initial_balance;
///
/// let balance = initial_balance(Money::from_cents(100_000), Money::from_cents(20_000));
/// assert_eq!(balance.unwrap(), Money::from_cents(80_000));
///
/// assert!(initial_balance(Money::from_cents(100), Money::from_cents(101)).is_err());
/// ```
pub fn initial_balance(price: Money, initial_installment: Money) -> CoreResult<Money> {
    if initial_installment.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "initial_installment".to_string(),
            min: 0,
            max: price.cents(),
        }
        .into());
    }

    if initial_installment > price {
        return Err(ConflictError::InitialInstallmentExceedsPrice {
            initial: initial_installment,
            price,
        }
        .into());
    }

    Ok(price - initial_installment)
}

/// Applies a signed delta to a balance, refusing to go below zero.
pub fn apply_delta(current: Money, delta: Money) -> CoreResult<BalanceChange> {
    let remaining = current
        .checked_add(delta)
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: i64::MIN,
            max: i64::MAX,
        })?;

    if remaining.is_negative() {
        return Err(ConflictError::NegativeBalance {
            would_be: remaining,
        }
        .into());
    }

    Ok(BalanceChange {
        remaining,
        reaches_zero: remaining.is_zero(),
    })
}

/// A new installment must be positive and no larger than what is owed.
pub fn check_installment(amount: Money, remaining: Money) -> Result<(), ConflictError> {
    if !amount.is_positive() {
        return Err(ConflictError::NonPositiveAmount(amount));
    }

    if amount > remaining {
        return Err(ConflictError::AmountExceedsBalance { amount, remaining });
    }

    Ok(())
}

/// Balance left after replacing an installment recorded against `balance_before`.
pub fn replacement_balance(balance_before: Money, new_amount: Money) -> Result<Money, ConflictError> {
    if !new_amount.is_positive() {
        return Err(ConflictError::NonPositiveAmount(new_amount));
    }

    if new_amount > balance_before {
        return Err(ConflictError::AmountExceedsBalance {
            amount: new_amount,
            remaining: balance_before,
        });
    }

    Ok(balance_before - new_amount)
}

/// Delta applied to the running balance when an entry's amount changes.
#[inline]
pub fn replacement_delta(old_amount: Money, new_amount: Money) -> Money {
    old_amount - new_amount
}

// =============================================================================
// Installment Editing
// =============================================================================

/// First sequence number inside the editable trailing window.
///
/// Never below 2: the seed entry is edited through the sale.
pub fn first_editable(last_sequence: i64, window: u32) -> i64 {
    let window = i64::from(window.max(1));
    (last_sequence - window + 1).max(FIRST_INSTALLMENT + 1)
}

/// Checks that `requested` may be edited when `last_sequence` is the newest entry.
pub fn check_editable(requested: i64, last_sequence: i64, window: u32) -> Result<(), ConflictError> {
    if requested == FIRST_INSTALLMENT {
        return Err(ConflictError::FirstInstallmentLocked);
    }

    let first = first_editable(last_sequence, window);
    if requested < first || requested > last_sequence {
        return Err(ConflictError::InstallmentNotEditable {
            requested,
            first_editable: first,
            last: last_sequence,
        });
    }

    Ok(())
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Product state implied by a credit sale's remaining balance.
#[inline]
pub fn product_state_for(remaining: Money) -> ProductState {
    if remaining.is_zero() {
        ProductState::Closed
    } else {
        ProductState::Claimed
    }
}

/// Sale status implied by a credit sale's remaining balance.
#[inline]
pub fn status_for(remaining: Money) -> CreditSaleStatus {
    if remaining.is_zero() {
        CreditSaleStatus::Finalized
    } else {
        CreditSaleStatus::Active
    }
}

/// Finalized sales accept no edits.
pub fn check_sale_open(sale: &CreditSale) -> Result<(), ConflictError> {
    if sale.is_finalized() {
        return Err(ConflictError::SaleFinalized(sale.id.clone()));
    }
    Ok(())
}

/// Sale-level edits and deletion need the seed entry to be the only one.
pub fn check_only_seed(sale: &CreditSale, installment_count: i64) -> Result<(), ConflictError> {
    check_sale_open(sale)?;

    if installment_count > FIRST_INSTALLMENT {
        return Err(ConflictError::TooManyInstallments {
            sale_id: sale.id.clone(),
            count: installment_count,
        });
    }
    Ok(())
}

pub fn check_customer_active(customer: &User) -> Result<(), ConflictError> {
    if !customer.is_active() {
        return Err(ConflictError::CustomerInactive(customer.id.clone()));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
