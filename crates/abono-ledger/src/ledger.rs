//! # Sale Ledger
//!
//! Every operation a caller can perform on sales and installments.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Mutating Operation                               │
//! │                                                                         │
//! │  1. validate input           ValidationError, no transaction opened    │
//! │  2. BEGIN                                                               │
//! │  3. touch lock               first statement, takes the write lock     │
//! │       product row            create                                    │
//! │       sale row               update / delete / finalize                │
//! │       balance row            register / update installment             │
//! │  4. read + check             guard, directory, rules                   │
//! │  5. write                    sale, product state, balance, journal     │
//! │  6. read summary             same transaction, no second round trip    │
//! │  7. COMMIT                   any earlier error drops tx → ROLLBACK     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Product State Machine
//! ```text
//!                create credit / create cash (claimed mode)
//!   ┌─────────┐ ─────────────────────────────────────────► ┌─────────┐
//!   │ PENDING │                                             │ CLAIMED │
//!   └─────────┘ ◄───────────────────────────────────────── └────┬────┘
//!     ▲    │           delete sale / product swapped out         │
//!     │    │                                                     │ balance reaches 0
//!     │    │ create cash (closed mode)                           │ finalize cash sale
//!     │    ▼                                                     ▼
//!     │  ┌────────┐ ◄─────────────────────────────────────────────┘
//!     └──│ CLOSED │   terminal for credit sales;
//!        └────────┘   a deleted cash sale releases it
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{LedgerConfig, LedgerSettings};
use crate::error::{ErrorKind, LedgerError, LedgerResult};
use abono_core::rules;
use abono_core::validation;
use abono_core::{
    CashSale, CashSaleOverview, CashSaleSummary, CashSaleUpdate, CreditSale, CreditSaleOverview,
    CreditSaleStatus, CreditSaleSummary, CreditSaleUpdate, InstallmentEntry, InstallmentReceipt,
    InstallmentUpdate, NewCashSale, NewCreditSale, NewInstallment, ProductState, ReleasedSale,
    SaleType,
};
use abono_db::{
    BalanceTracker, CashSaleRepository, ConsistencyGuard, CreditSaleRepository, Database,
    InstallmentJournal, ProductCatalog, Tx, UserDirectory,
};

/// Orchestrates sales, balances and installments over one database.
///
/// Cloning is cheap and every clone shares the pool, so a ledger can be
/// handed to concurrent tasks.
#[derive(Debug, Clone)]
pub struct SaleLedger {
    db: Database,
    settings: LedgerSettings,
}

impl SaleLedger {
    /// Opens the database described by `config` and runs migrations.
    pub async fn open(config: &LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;

        info!(
            path = ?config.database.path,
            cash_sale_product_state = %config.ledger.cash_sale_product_state,
            editable_installment_window = config.ledger.editable_installment_window,
            "Opening sale ledger"
        );

        let db = Database::new(config.to_db_config()).await?;
        Ok(Self::new(db, config.ledger.clone()))
    }

    pub fn new(db: Database, settings: LedgerSettings) -> Self {
        SaleLedger { db, settings }
    }

    /// The underlying database, for catalog and directory maintenance.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    // =========================================================================
    // Credit Sales
    // =========================================================================

    /// Records a credit sale, claims its product and writes the seed installment.
    ///
    /// ## Errors
    /// * `NotFound` - product, customer or administrator missing
    /// * `Conflict` - product not pending or claimed elsewhere, customer
    ///   inactive, card number taken, initial installment above price
    pub async fn create_credit_sale(&self, input: NewCreditSale) -> LedgerResult<CreditSaleSummary> {
        validation::validate_new_credit_sale(&input, self.settings.max_card_number_len)?;

        self.create_credit_sale_tx(&input)
            .await
            .inspect_err(|e| log_rejection("create_credit_sale", e))
    }

    async fn create_credit_sale_tx(&self, input: &NewCreditSale) -> LedgerResult<CreditSaleSummary> {
        let mut tx = self.db.pool().begin().await?;
        ProductCatalog::lock(&mut tx, &input.product_id).await?;

        let product = ConsistencyGuard::check_product_available(&mut tx, &input.product_id, None).await?;
        let customer = UserDirectory::customer(&mut tx, &input.customer_id).await?;
        rules::check_customer_active(&customer)?;
        UserDirectory::administrator(&mut tx, &input.admin_id).await?;
        ConsistencyGuard::check_card_unique(&mut tx, input.card_number.trim(), SaleType::Credit, None).await?;

        let initial_balance = rules::initial_balance(product.price(), input.initial_installment)?;

        let now = Utc::now();
        let sale = CreditSale {
            id: Uuid::new_v4().to_string(),
            card_number: input.card_number.trim().to_string(),
            sale_date: input.sale_date,
            initial_installment_cents: input.initial_installment.cents(),
            customer_id: input.customer_id.clone(),
            product_id: input.product_id.clone(),
            admin_id: input.admin_id.clone(),
            initial_balance_cents: initial_balance.cents(),
            status: rules::status_for(initial_balance),
            created_at: now,
            updated_at: now,
        };

        CreditSaleRepository::insert(&mut tx, &sale).await?;
        ProductCatalog::set_state(&mut tx, &sale.product_id, rules::product_state_for(initial_balance))
            .await?;
        BalanceTracker::initialize(&mut tx, &sale.id, initial_balance).await?;
        InstallmentJournal::append_first(
            &mut tx,
            &sale.id,
            input.initial_installment,
            sale.sale_date,
            &sale.admin_id,
            initial_balance,
        )
        .await?;

        let summary = CreditSaleRepository::summary_in(&mut tx, &sale.id).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            card_number = %sale.card_number,
            product_id = %sale.product_id,
            initial_balance = %initial_balance,
            finalized = sale.is_finalized(),
            "Credit sale created"
        );

        Ok(summary)
    }

    /// Rewrites a credit sale that has only its seed installment.
    ///
    /// Swapping the product releases the old one to `Pending`. The initial
    /// balance, the running balance and installment #1 are recomputed from
    /// the new price and initial installment.
    pub async fn update_credit_sale(
        &self,
        id: &str,
        input: CreditSaleUpdate,
    ) -> LedgerResult<CreditSaleSummary> {
        validation::validate_id("credit_sale_id", id)?;
        validation::validate_credit_sale_update(&input, self.settings.max_card_number_len)?;

        self.update_credit_sale_tx(id, &input)
            .await
            .inspect_err(|e| log_rejection("update_credit_sale", e))
    }

    async fn update_credit_sale_tx(
        &self,
        id: &str,
        input: &CreditSaleUpdate,
    ) -> LedgerResult<CreditSaleSummary> {
        let mut tx = self.db.pool().begin().await?;
        CreditSaleRepository::lock(&mut tx, id).await?;

        let mut sale = CreditSaleRepository::get(&mut tx, id).await?;
        let count = InstallmentJournal::count(&mut tx, id).await?;
        rules::check_only_seed(&sale, count)?;

        let product_changed = sale.product_id != input.product_id;
        if product_changed {
            ProductCatalog::lock(&mut tx, &input.product_id).await?;
        }

        let product =
            ConsistencyGuard::check_product_available(&mut tx, &input.product_id, Some(id)).await?;
        let customer = UserDirectory::customer(&mut tx, &input.customer_id).await?;
        rules::check_customer_active(&customer)?;
        ConsistencyGuard::check_card_unique(&mut tx, input.card_number.trim(), SaleType::Credit, Some(id))
            .await?;

        let initial_balance = rules::initial_balance(product.price(), input.initial_installment)?;

        if product_changed {
            debug!(sale_id = %id, old = %sale.product_id, new = %input.product_id, "Swapping product");
            ProductCatalog::set_state(&mut tx, &sale.product_id, ProductState::Pending).await?;
        }

        sale.card_number = input.card_number.trim().to_string();
        sale.sale_date = input.sale_date;
        sale.initial_installment_cents = input.initial_installment.cents();
        sale.customer_id = input.customer_id.clone();
        sale.product_id = input.product_id.clone();
        sale.initial_balance_cents = initial_balance.cents();
        sale.status = rules::status_for(initial_balance);

        CreditSaleRepository::update(&mut tx, &sale).await?;
        ProductCatalog::set_state(&mut tx, &sale.product_id, rules::product_state_for(initial_balance))
            .await?;
        BalanceTracker::reinitialize(&mut tx, id, initial_balance).await?;
        InstallmentJournal::replace_first(
            &mut tx,
            id,
            input.initial_installment,
            sale.sale_date,
            initial_balance,
        )
        .await?;

        let summary = CreditSaleRepository::summary_in(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            sale_id = %id,
            product_id = %sale.product_id,
            initial_balance = %initial_balance,
            finalized = sale.is_finalized(),
            "Credit sale updated"
        );

        Ok(summary)
    }

    /// Deletes a credit sale that has only its seed installment.
    ///
    /// The balance and the seed entry go with it; the product returns to
    /// `Pending`.
    pub async fn delete_credit_sale(&self, id: &str) -> LedgerResult<ReleasedSale> {
        validation::validate_id("credit_sale_id", id)?;

        self.delete_credit_sale_tx(id)
            .await
            .inspect_err(|e| log_rejection("delete_credit_sale", e))
    }

    async fn delete_credit_sale_tx(&self, id: &str) -> LedgerResult<ReleasedSale> {
        let mut tx = self.db.pool().begin().await?;
        CreditSaleRepository::lock(&mut tx, id).await?;

        let sale = CreditSaleRepository::get(&mut tx, id).await?;
        let count = InstallmentJournal::count(&mut tx, id).await?;
        rules::check_only_seed(&sale, count)?;

        CreditSaleRepository::delete(&mut tx, id).await?;
        ProductCatalog::set_state(&mut tx, &sale.product_id, ProductState::Pending).await?;
        tx.commit().await?;

        info!(sale_id = %id, product_id = %sale.product_id, "Credit sale deleted");

        Ok(ReleasedSale {
            sale_id: sale.id,
            sale_type: SaleType::Credit,
            product_id: sale.product_id,
        })
    }

    /// Reads a credit sale with its remaining balance and installment count.
    pub async fn get_credit_sale(&self, id: &str) -> LedgerResult<CreditSaleSummary> {
        validation::validate_id("credit_sale_id", id)?;
        Ok(self.db.credit_sales().summary(id).await?)
    }

    pub async fn list_credit_sales(&self) -> LedgerResult<Vec<CreditSaleOverview>> {
        Ok(self.db.credit_sales().list().await?)
    }

    // =========================================================================
    // Installments
    // =========================================================================

    /// Records the next payment against a credit sale.
    ///
    /// A payment that brings the balance to zero finalizes the sale and
    /// closes its product in the same transaction.
    ///
    /// ## Errors
    /// * `NotFound` - sale or administrator missing
    /// * `Conflict` - sale finalized, amount above the remaining balance
    pub async fn register_installment(
        &self,
        credit_sale_id: &str,
        input: NewInstallment,
    ) -> LedgerResult<InstallmentReceipt> {
        validation::validate_id("credit_sale_id", credit_sale_id)?;
        validation::validate_new_installment(&input)?;

        self.register_installment_tx(credit_sale_id, &input)
            .await
            .inspect_err(|e| log_rejection("register_installment", e))
    }

    async fn register_installment_tx(
        &self,
        credit_sale_id: &str,
        input: &NewInstallment,
    ) -> LedgerResult<InstallmentReceipt> {
        let mut tx = self.db.pool().begin().await?;
        BalanceTracker::lock(&mut tx, credit_sale_id).await?;

        let sale = CreditSaleRepository::get(&mut tx, credit_sale_id).await?;
        rules::check_sale_open(&sale)?;
        UserDirectory::administrator(&mut tx, &input.admin_id).await?;

        let (entry, change) = InstallmentJournal::append_next(
            &mut tx,
            credit_sale_id,
            input.amount,
            input.paid_on,
            &input.admin_id,
        )
        .await?;

        if change.reaches_zero {
            finalize_credit_sale(&mut tx, &sale).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %credit_sale_id,
            sequence = entry.sequence,
            amount = %input.amount,
            remaining = %change.remaining,
            "Installment registered"
        );

        Ok(InstallmentReceipt {
            entry,
            remaining_cents: change.remaining.cents(),
            finalized: change.reaches_zero,
        })
    }

    /// Corrects an installment inside the editable trailing window.
    ///
    /// With the default window only the newest installment is editable.
    /// Installment #1 is refused; it changes through `update_credit_sale`.
    pub async fn update_installment(
        &self,
        credit_sale_id: &str,
        input: InstallmentUpdate,
    ) -> LedgerResult<InstallmentReceipt> {
        validation::validate_id("credit_sale_id", credit_sale_id)?;
        validation::validate_installment_update(&input)?;

        self.update_installment_tx(credit_sale_id, &input)
            .await
            .inspect_err(|e| log_rejection("update_installment", e))
    }

    async fn update_installment_tx(
        &self,
        credit_sale_id: &str,
        input: &InstallmentUpdate,
    ) -> LedgerResult<InstallmentReceipt> {
        let mut tx = self.db.pool().begin().await?;
        BalanceTracker::lock(&mut tx, credit_sale_id).await?;

        let sale = CreditSaleRepository::get(&mut tx, credit_sale_id).await?;
        rules::check_sale_open(&sale)?;

        let (entry, change) = InstallmentJournal::replace_last(
            &mut tx,
            credit_sale_id,
            input.amount,
            input.paid_on,
            input.sequence,
            self.settings.editable_installment_window,
        )
        .await?;

        if change.reaches_zero {
            finalize_credit_sale(&mut tx, &sale).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %credit_sale_id,
            sequence = entry.sequence,
            amount = %input.amount,
            remaining = %change.remaining,
            "Installment updated"
        );

        Ok(InstallmentReceipt {
            entry,
            remaining_cents: change.remaining.cents(),
            finalized: change.reaches_zero,
        })
    }

    /// Installments of a credit sale, ordered by sequence.
    pub async fn installment_history(&self, credit_sale_id: &str) -> LedgerResult<Vec<InstallmentEntry>> {
        validation::validate_id("credit_sale_id", credit_sale_id)?;
        Ok(self.db.credit_sales().installments(credit_sale_id).await?)
    }

    // =========================================================================
    // Cash Sales
    // =========================================================================

    /// Records a cash sale. The product moves to the configured cash state.
    pub async fn create_cash_sale(&self, input: NewCashSale) -> LedgerResult<CashSaleSummary> {
        validation::validate_new_cash_sale(&input, self.settings.max_card_number_len)?;

        self.create_cash_sale_tx(&input)
            .await
            .inspect_err(|e| log_rejection("create_cash_sale", e))
    }

    async fn create_cash_sale_tx(&self, input: &NewCashSale) -> LedgerResult<CashSaleSummary> {
        let mut tx = self.db.pool().begin().await?;
        ProductCatalog::lock(&mut tx, &input.product_id).await?;

        ConsistencyGuard::check_product_available(&mut tx, &input.product_id, None).await?;
        let customer = UserDirectory::customer(&mut tx, &input.customer_id).await?;
        rules::check_customer_active(&customer)?;
        UserDirectory::administrator(&mut tx, &input.admin_id).await?;
        ConsistencyGuard::check_card_unique(&mut tx, input.card_number.trim(), SaleType::Cash, None).await?;

        let now = Utc::now();
        let sale = CashSale {
            id: Uuid::new_v4().to_string(),
            card_number: input.card_number.trim().to_string(),
            sale_date: input.sale_date,
            customer_id: input.customer_id.clone(),
            product_id: input.product_id.clone(),
            admin_id: input.admin_id.clone(),
            created_at: now,
            updated_at: now,
        };

        let state = self.settings.cash_sale_product_state.product_state();
        CashSaleRepository::insert(&mut tx, &sale).await?;
        ProductCatalog::set_state(&mut tx, &sale.product_id, state).await?;

        let summary = CashSaleRepository::summary_in(&mut tx, &sale.id).await?;
        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            card_number = %sale.card_number,
            product_id = %sale.product_id,
            product_state = %state,
            "Cash sale created"
        );

        Ok(summary)
    }

    /// Rewrites a cash sale. Swapping the product releases the old one.
    pub async fn update_cash_sale(&self, id: &str, input: CashSaleUpdate) -> LedgerResult<CashSaleSummary> {
        validation::validate_id("cash_sale_id", id)?;
        validation::validate_cash_sale_update(&input, self.settings.max_card_number_len)?;

        self.update_cash_sale_tx(id, &input)
            .await
            .inspect_err(|e| log_rejection("update_cash_sale", e))
    }

    async fn update_cash_sale_tx(&self, id: &str, input: &CashSaleUpdate) -> LedgerResult<CashSaleSummary> {
        let mut tx = self.db.pool().begin().await?;
        CashSaleRepository::lock(&mut tx, id).await?;

        let mut sale = CashSaleRepository::get(&mut tx, id).await?;

        let product_changed = sale.product_id != input.product_id;
        if product_changed {
            ProductCatalog::lock(&mut tx, &input.product_id).await?;
        }

        ConsistencyGuard::check_product_available(&mut tx, &input.product_id, Some(id)).await?;
        let customer = UserDirectory::customer(&mut tx, &input.customer_id).await?;
        rules::check_customer_active(&customer)?;
        ConsistencyGuard::check_card_unique(&mut tx, input.card_number.trim(), SaleType::Cash, Some(id))
            .await?;

        if product_changed {
            debug!(sale_id = %id, old = %sale.product_id, new = %input.product_id, "Swapping product");
            ProductCatalog::set_state(&mut tx, &sale.product_id, ProductState::Pending).await?;
            ProductCatalog::set_state(
                &mut tx,
                &input.product_id,
                self.settings.cash_sale_product_state.product_state(),
            )
            .await?;
        }

        sale.card_number = input.card_number.trim().to_string();
        sale.sale_date = input.sale_date;
        sale.customer_id = input.customer_id.clone();
        sale.product_id = input.product_id.clone();
        CashSaleRepository::update(&mut tx, &sale).await?;

        let summary = CashSaleRepository::summary_in(&mut tx, id).await?;
        tx.commit().await?;

        info!(sale_id = %id, product_id = %sale.product_id, "Cash sale updated");

        Ok(summary)
    }

    /// Deletes a cash sale and releases its product, closed or not.
    pub async fn delete_cash_sale(&self, id: &str) -> LedgerResult<ReleasedSale> {
        validation::validate_id("cash_sale_id", id)?;

        self.delete_cash_sale_tx(id)
            .await
            .inspect_err(|e| log_rejection("delete_cash_sale", e))
    }

    async fn delete_cash_sale_tx(&self, id: &str) -> LedgerResult<ReleasedSale> {
        let mut tx = self.db.pool().begin().await?;
        CashSaleRepository::lock(&mut tx, id).await?;

        let sale = CashSaleRepository::get(&mut tx, id).await?;
        CashSaleRepository::delete(&mut tx, id).await?;
        ProductCatalog::set_state(&mut tx, &sale.product_id, ProductState::Pending).await?;
        tx.commit().await?;

        info!(sale_id = %id, product_id = %sale.product_id, "Cash sale deleted");

        Ok(ReleasedSale {
            sale_id: sale.id,
            sale_type: SaleType::Cash,
            product_id: sale.product_id,
        })
    }

    /// Closes the product of a cash sale recorded in `claimed` mode.
    ///
    /// In `closed` mode every cash sale is already closed, so this always
    /// returns a conflict there.
    pub async fn finalize_cash_sale(&self, id: &str) -> LedgerResult<CashSaleSummary> {
        validation::validate_id("cash_sale_id", id)?;

        self.finalize_cash_sale_tx(id)
            .await
            .inspect_err(|e| log_rejection("finalize_cash_sale", e))
    }

    async fn finalize_cash_sale_tx(&self, id: &str) -> LedgerResult<CashSaleSummary> {
        let mut tx = self.db.pool().begin().await?;
        CashSaleRepository::lock(&mut tx, id).await?;

        let current = CashSaleRepository::summary_in(&mut tx, id).await?;
        if current.product_state == ProductState::Closed {
            return Err(abono_core::ConflictError::CashSaleClosed(id.to_string()).into());
        }

        ProductCatalog::set_state(&mut tx, &current.sale.product_id, ProductState::Closed).await?;
        let summary = CashSaleRepository::summary_in(&mut tx, id).await?;
        tx.commit().await?;

        info!(sale_id = %id, product_id = %summary.sale.product_id, "Cash sale finalized");

        Ok(summary)
    }

    pub async fn get_cash_sale(&self, id: &str) -> LedgerResult<CashSaleSummary> {
        validation::validate_id("cash_sale_id", id)?;
        Ok(self.db.cash_sales().summary(id).await?)
    }

    pub async fn list_cash_sales(&self) -> LedgerResult<Vec<CashSaleOverview>> {
        Ok(self.db.cash_sales().list().await?)
    }
}

/// Balance reached zero: the sale is finalized and its product closed.
async fn finalize_credit_sale(tx: &mut Tx<'_>, sale: &CreditSale) -> LedgerResult<()> {
    CreditSaleRepository::set_status(tx, &sale.id, CreditSaleStatus::Finalized).await?;
    ProductCatalog::set_state(tx, &sale.product_id, ProductState::Closed).await?;

    info!(sale_id = %sale.id, product_id = %sale.product_id, "Credit sale finalized");
    Ok(())
}

fn log_rejection(operation: &'static str, err: &LedgerError) {
    match err.kind() {
        ErrorKind::Conflict => warn!(operation, error = %err, "Operation rejected"),
        ErrorKind::NotFound | ErrorKind::Validation => {
            debug!(operation, error = %err, "Operation refused")
        }
        // Logged where the store error was converted.
        ErrorKind::Internal => {}
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
