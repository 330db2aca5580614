//! # Seed Data Generator
//!
//! Populates the database with products, customers and an administrator
//! for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products and 50 customers (default)
//! cargo run -p abono-db --bin seed
//!
//! # Generate custom amounts
//! cargo run -p abono-db --bin seed -- --products 1000 --customers 300
//!
//! # Specify database path
//! cargo run -p abono-db --bin seed -- --db ./data/abono.db
//! ```
//!
//! ## Generated Data
//! - Products: `{CATEGORY}-{INDEX}` references, prices $80.00 - $2,000.00,
//!   all `pending`
//! - Customers: `customer{N}`, every tenth one inactive
//! - One administrator: `admin`

use abono_core::{Money, NewProduct, NewUser, UserRole, UserStatus};
use abono_db::{Database, DbConfig};
use std::env;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "TV",
        &["Television 32\"", "Television 43\"", "Television 55\"", "Soundbar", "Projector"],
    ),
    (
        "KIT",
        &["Refrigerator", "Gas Stove", "Microwave", "Blender", "Washing Machine"],
    ),
    (
        "FUR",
        &["Sofa", "Dining Table", "Wardrobe", "Double Bed", "Bookcase"],
    ),
    (
        "PHN",
        &["Smartphone", "Tablet", "Laptop", "Headphones", "Smartwatch"],
    ),
];

const BRANDS: &[&str] = &["Orion", "Nordik", "Casa Alta", "Veloz", "Kumo"];

const FIRST_NAMES: &[&str] = &["Ana", "Luis", "Marta", "Jorge", "Sofia", "Pedro", "Lucia", "Diego"];
const LAST_NAMES: &[&str] = &["Gomez", "Rojas", "Vargas", "Castro", "Mendoza", "Rios"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut products: usize = 200;
    let mut customers: usize = 50;
    let mut db_path = String::from("./abono_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    products = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--customers" | "-c" => {
                if i + 1 < args.len() {
                    customers = args[i + 1].parse().unwrap_or(50);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Abono Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>   Number of products (default: 200)");
                println!("  -c, --customers <N>  Number of customers (default: 50)");
                println!("  -d, --db <PATH>      Database file path (default: ./abono_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Abono Seed Data Generator");
    println!("============================");
    println!("Database:  {}", db_path);
    println!("Products:  {}", products);
    println!("Customers: {}", customers);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let admin = db
        .users()
        .insert(&NewUser {
            username: "admin".to_string(),
            first_name: "Store".to_string(),
            last_name: "Admin".to_string(),
            identification: "ADM-0001".to_string(),
            role: UserRole::Administrator,
            status: UserStatus::Active,
        })
        .await?;
    println!("✓ Administrator '{}' ({})", admin.username, admin.id);

    let kinds: Vec<(&str, &str, usize)> = CATEGORIES
        .iter()
        .flat_map(|(code, names)| names.iter().enumerate().map(move |(i, name)| (*code, *name, i)))
        .collect();

    let mut generated = 0;
    for seed in 0..products {
        let (category_code, name, name_idx) = kinds[seed % kinds.len()];

        let input = generate_product(category_code, name, seed, name_idx);
        if let Err(e) = db.products().insert(&input).await {
            eprintln!("Failed to insert {}: {}", input.reference, e);
            continue;
        }
        generated += 1;
    }

    let mut inactive = 0;
    for n in 0..customers {
        let status = if n % 10 == 9 {
            inactive += 1;
            UserStatus::Inactive
        } else {
            UserStatus::Active
        };

        db.users()
            .insert(&NewUser {
                username: format!("customer{n}"),
                first_name: FIRST_NAMES[n % FIRST_NAMES.len()].to_string(),
                last_name: LAST_NAMES[(n / FIRST_NAMES.len()) % LAST_NAMES.len()].to_string(),
                identification: format!("CC-{:08}", 10_000_000 + n * 7919),
                role: UserRole::Customer,
                status,
            })
            .await?;
    }

    println!(
        "✓ Generated {} products and {} customers ({} inactive) in {:?}",
        generated,
        customers,
        inactive,
        start.elapsed()
    );
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, seed: usize, name_idx: usize) -> NewProduct {
    // $80.00 - $2,000.00 in $10 steps
    let price_cents = 8_000 + ((seed * 37) % 193) as i64 * 1_000;

    // Cost is 55-75% of price
    let cost_pct = 55 + (seed % 21) as i64;

    NewProduct {
        reference: format!("{}-{:05}", category, seed),
        name: name.to_string(),
        brand: BRANDS[(seed + name_idx) % BRANDS.len()].to_string(),
        cost: Money::from_cents(price_cents * cost_pct / 100),
        price: Money::from_cents(price_cents),
    }
}
