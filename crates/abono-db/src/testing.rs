//! Fixtures shared by the in-crate tests.

use abono_core::{Money, NewProduct, NewUser, Product, User, UserRole, UserStatus};

use crate::pool::{Database, DbConfig};

pub fn tv() -> NewProduct {
    product("TV-0042", 100_000)
}

pub fn product(reference: &str, price_cents: i64) -> NewProduct {
    NewProduct {
        reference: reference.to_string(),
        name: format!("Product {reference}"),
        brand: "Orion".to_string(),
        cost: Money::from_cents(price_cents * 7 / 10),
        price: Money::from_cents(price_cents),
    }
}

pub fn user(username: &str, role: UserRole, status: UserStatus) -> NewUser {
    NewUser {
        username: username.to_string(),
        first_name: "Ana".to_string(),
        last_name: username.to_string(),
        identification: format!("ID-{username}"),
        role,
        status,
    }
}

/// In-memory database with one product, one active customer and one admin.
pub struct Fixture {
    pub db: Database,
    pub product: Product,
    pub customer: User,
    pub admin: User,
}

pub async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let product = db.products().insert(&tv()).await.unwrap();
    let customer = db
        .users()
        .insert(&user("carla", UserRole::Customer, UserStatus::Active))
        .await
        .unwrap();
    let admin = db
        .users()
        .insert(&user("admin", UserRole::Administrator, UserStatus::Active))
        .await
        .unwrap();

    Fixture {
        db,
        product,
        customer,
        admin,
    }
}
