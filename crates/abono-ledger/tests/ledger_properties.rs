//! End-to-end properties of the sale ledger.
//!
//! Most tests run against an in-memory database. The concurrency tests need
//! real competing connections and use a temporary database file.

use abono_core::{
    ConflictError, CreditSaleStatus, InstallmentUpdate, Money, NewCashSale, NewCreditSale,
    NewInstallment, NewProduct, NewUser, Product, ProductState, User, UserRole, UserStatus,
};
use abono_ledger::{CashSaleProductState, ErrorKind, LedgerConfig, LedgerError, SaleLedger};
use chrono::NaiveDate;
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

struct Shop {
    ledger: SaleLedger,
    customer: User,
    admin: User,
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

async fn shop_with(config: LedgerConfig) -> Shop {
    let ledger = SaleLedger::open(&config).await.unwrap();
    let users = ledger.database().users();

    let customer = users
        .insert(&NewUser {
            username: "rosa".to_string(),
            first_name: "Rosa".to_string(),
            last_name: "Diaz".to_string(),
            identification: "CC-1001".to_string(),
            role: UserRole::Customer,
            status: UserStatus::Active,
        })
        .await
        .unwrap();
    let admin = users
        .insert(&NewUser {
            username: "admin".to_string(),
            first_name: "Main".to_string(),
            last_name: "Admin".to_string(),
            identification: "CC-1".to_string(),
            role: UserRole::Administrator,
            status: UserStatus::Active,
        })
        .await
        .unwrap();

    Shop {
        ledger,
        customer,
        admin,
    }
}

async fn shop() -> Shop {
    shop_with(LedgerConfig::in_memory()).await
}

async fn file_shop(dir: &TempDir) -> Shop {
    let mut config = LedgerConfig::default();
    config.database.path = dir.path().join("abono.db");
    shop_with(config).await
}

impl Shop {
    async fn product(&self, reference: &str, price: i64) -> Product {
        self.ledger
            .database()
            .products()
            .insert(&NewProduct {
                reference: reference.to_string(),
                name: format!("Item {reference}"),
                brand: "Haceb".to_string(),
                cost: Money::from_major_minor(price / 2, 0),
                price: Money::from_major_minor(price, 0),
            })
            .await
            .unwrap()
    }

    async fn product_state(&self, id: &str) -> ProductState {
        self.ledger
            .database()
            .products()
            .find_by_id(id)
            .await
            .unwrap()
            .unwrap()
            .state
    }

    fn credit(&self, card: &str, product: &Product, initial: i64) -> NewCreditSale {
        NewCreditSale {
            card_number: card.to_string(),
            sale_date: day(1),
            initial_installment: Money::from_major_minor(initial, 0),
            customer_id: self.customer.id.clone(),
            product_id: product.id.clone(),
            admin_id: self.admin.id.clone(),
        }
    }

    fn cash(&self, card: &str, product: &Product) -> NewCashSale {
        NewCashSale {
            card_number: card.to_string(),
            sale_date: day(1),
            customer_id: self.customer.id.clone(),
            product_id: product.id.clone(),
            admin_id: self.admin.id.clone(),
        }
    }

    fn pay(&self, amount: i64, d: u32) -> NewInstallment {
        NewInstallment {
            amount: Money::from_major_minor(amount, 0),
            paid_on: day(d),
            admin_id: self.admin.id.clone(),
        }
    }

    /// Checks every credit sale for the ledger-wide invariants.
    async fn assert_invariants(&self) {
        for row in self.ledger.list_credit_sales().await.unwrap() {
            assert!(row.remaining_cents >= 0, "negative balance on {}", row.id);

            let paid_off = row.remaining_cents == 0;
            assert_eq!(paid_off, row.status == CreditSaleStatus::Finalized, "status of {}", row.id);
            assert_eq!(paid_off, row.product_state == ProductState::Closed, "product of {}", row.id);

            let history = self.ledger.installment_history(&row.id).await.unwrap();
            let sequences: Vec<i64> = history.iter().map(|e| e.sequence).collect();
            let expected: Vec<i64> = (1..=history.len() as i64).collect();
            assert_eq!(sequences, expected, "sequences of {}", row.id);

            if let Some(last) = history.last() {
                assert_eq!(last.balance_after().cents(), row.remaining_cents);
            }
        }
    }
}

fn conflict(err: LedgerError) -> ConflictError {
    match err {
        LedgerError::Conflict(c) => c,
        other => panic!("expected conflict, got {other:?}"),
    }
}

// =============================================================================
// Balance Properties
// =============================================================================

#[tokio::test]
async fn test_payments_reach_zero_and_finalize() {
    let shop = shop().await;
    let fridge = shop.product("FRIDGE-300", 1000).await;

    let summary = shop.ledger.create_credit_sale(shop.credit("2001", &fridge, 200)).await.unwrap();
    let id = summary.sale.id.clone();
    assert_eq!(summary.remaining(), Money::from_major_minor(800, 0));

    let r = shop.ledger.register_installment(&id, shop.pay(300, 2)).await.unwrap();
    assert_eq!(r.remaining(), Money::from_major_minor(500, 0));
    let r = shop.ledger.register_installment(&id, shop.pay(300, 3)).await.unwrap();
    assert_eq!(r.remaining(), Money::from_major_minor(200, 0));
    let r = shop.ledger.register_installment(&id, shop.pay(200, 4)).await.unwrap();
    assert!(r.remaining().is_zero());
    assert!(r.finalized);

    let summary = shop.ledger.get_credit_sale(&id).await.unwrap();
    assert_eq!(summary.sale.status, CreditSaleStatus::Finalized);
    assert_eq!(summary.product_state, ProductState::Closed);
    assert_eq!(summary.installment_count, 4);

    let err = shop.ledger.register_installment(&id, shop.pay(1, 5)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    shop.assert_invariants().await;
}

#[tokio::test]
async fn test_overpayment_leaves_balance_untouched() {
    let shop = shop().await;
    let fridge = shop.product("FRIDGE-300", 1000).await;
    let id = shop
        .ledger
        .create_credit_sale(shop.credit("2001", &fridge, 200))
        .await
        .unwrap()
        .sale
        .id;

    let err = shop.ledger.register_installment(&id, shop.pay(900, 2)).await.unwrap_err();
    assert!(matches!(conflict(err), ConflictError::AmountExceedsBalance { .. }));

    let summary = shop.ledger.get_credit_sale(&id).await.unwrap();
    assert_eq!(summary.remaining(), Money::from_major_minor(800, 0));
    assert_eq!(summary.installment_count, 1);

    let err = shop.ledger.register_installment(&id, shop.pay(0, 2)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_sequences_stay_contiguous() {
    let shop = shop().await;
    let tv = shop.product("TV-55", 2400).await;
    let id = shop.ledger.create_credit_sale(shop.credit("9", &tv, 0)).await.unwrap().sale.id;

    for (n, amount) in [100, 250, 80, 400].into_iter().enumerate() {
        shop.ledger
            .register_installment(&id, shop.pay(amount, n as u32 + 2))
            .await
            .unwrap();
    }

    // A refused payment must not consume a sequence number.
    assert!(shop.ledger.register_installment(&id, shop.pay(5000, 9)).await.is_err());

    shop.ledger
        .update_installment(
            &id,
            InstallmentUpdate {
                sequence: 5,
                amount: Money::from_major_minor(300, 0),
                paid_on: day(10),
            },
        )
        .await
        .unwrap();

    let r = shop.ledger.register_installment(&id, shop.pay(50, 11)).await.unwrap();
    assert_eq!(r.entry.sequence, 6);

    shop.assert_invariants().await;
}

// =============================================================================
// Product Claims
// =============================================================================

#[tokio::test]
async fn test_claimed_product_cannot_be_sold_again() {
    let shop = shop().await;
    let stove = shop.product("STOVE-4", 700).await;

    shop.ledger.create_credit_sale(shop.credit("1", &stove, 100)).await.unwrap();
    assert_eq!(shop.product_state(&stove.id).await, ProductState::Claimed);

    let err = shop.ledger.create_credit_sale(shop.credit("2", &stove, 100)).await.unwrap_err();
    assert!(err.is_conflict());

    let err = shop.ledger.create_cash_sale(shop.cash("3", &stove)).await.unwrap_err();
    assert!(err.is_conflict());

    assert_eq!(shop.ledger.list_credit_sales().await.unwrap().len(), 1);
    assert!(shop.ledger.list_cash_sales().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_only_with_seed_installment() {
    let shop = shop().await;
    let washer = shop.product("WASH-8", 900).await;
    let dryer = shop.product("DRY-2", 600).await;

    let busy = shop.ledger.create_credit_sale(shop.credit("1", &washer, 100)).await.unwrap().sale;
    shop.ledger.register_installment(&busy.id, shop.pay(50, 2)).await.unwrap();

    let err = shop.ledger.delete_credit_sale(&busy.id).await.unwrap_err();
    assert!(matches!(conflict(err), ConflictError::TooManyInstallments { count: 2, .. }));
    assert_eq!(shop.product_state(&washer.id).await, ProductState::Claimed);

    let fresh = shop.ledger.create_credit_sale(shop.credit("2", &dryer, 100)).await.unwrap().sale;
    let released = shop.ledger.delete_credit_sale(&fresh.id).await.unwrap();
    assert_eq!(released.product_id, dryer.id);
    assert_eq!(shop.product_state(&dryer.id).await, ProductState::Pending);
    assert!(shop.ledger.get_credit_sale(&fresh.id).await.unwrap_err().is_not_found());

    // The released product can be sold again.
    shop.ledger.create_cash_sale(shop.cash("2", &dryer)).await.unwrap();
    shop.assert_invariants().await;
}

#[tokio::test]
async fn test_cash_sales_in_claimed_mode() {
    let mut config = LedgerConfig::in_memory();
    config.ledger.cash_sale_product_state = CashSaleProductState::Claimed;
    let shop = shop_with(config).await;
    let chair = shop.product("CHAIR-1", 120).await;

    let sale = shop.ledger.create_cash_sale(shop.cash("C-1", &chair)).await.unwrap().sale;
    assert_eq!(shop.product_state(&chair.id).await, ProductState::Claimed);

    shop.ledger.finalize_cash_sale(&sale.id).await.unwrap();
    assert_eq!(shop.product_state(&chair.id).await, ProductState::Closed);

    shop.ledger.delete_cash_sale(&sale.id).await.unwrap();
    assert_eq!(shop.product_state(&chair.id).await, ProductState::Pending);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let shop = file_shop(&dir).await;
    let bike = shop.product("BIKE-26", 700).await;

    let id = shop.ledger.create_credit_sale(shop.credit("7", &bike, 100)).await.unwrap().sale.id;

    let attempts: Vec<_> = (0..2)
        .map(|n| {
            let ledger = shop.ledger.clone();
            let id = id.clone();
            let payment = shop.pay(500, 2 + n);
            tokio::spawn(async move { ledger.register_installment(&id, payment).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut conflicts = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!((succeeded, conflicts), (1, 1));

    let summary = shop.ledger.get_credit_sale(&id).await.unwrap();
    assert_eq!(summary.remaining(), Money::from_major_minor(100, 0));
    assert_eq!(summary.installment_count, 2);
    shop.assert_invariants().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_of_one_product() {
    let dir = tempfile::tempdir().unwrap();
    let shop = file_shop(&dir).await;
    let piano = shop.product("PIANO-1", 5000).await;

    let credit = {
        let ledger = shop.ledger.clone();
        let input = shop.credit("P-1", &piano, 500);
        tokio::spawn(async move { ledger.create_credit_sale(input).await.map(|_| ()) })
    };
    let cash = {
        let ledger = shop.ledger.clone();
        let input = shop.cash("P-2", &piano);
        tokio::spawn(async move { ledger.create_cash_sale(input).await.map(|_| ()) })
    };

    let outcomes = [credit.await.unwrap(), cash.await.unwrap()];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(LedgerError::is_conflict));

    let sales = shop.ledger.list_credit_sales().await.unwrap().len()
        + shop.ledger.list_cash_sales().await.unwrap().len();
    assert_eq!(sales, 1);
}
