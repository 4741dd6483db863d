//! # Seed Data Generator
//!
//! Populates a fresh database with an admin account and a small pharmacy
//! inventory for development.
//!
//! ## Usage
//! ```bash
//! # Default database and credentials
//! cargo run -p apotek-db --bin seed
//!
//! # Custom database path and admin account
//! cargo run -p apotek-db --bin seed -- --db ./data/apotek.db \
//!     --admin-user admin --admin-password rahasia
//! ```
//!
//! ## Generated Data
//! - One user account (skipped if the username exists)
//! - Inventory across categories, several SKUs carrying two batches
//! - `TEST001/B001` (stock 50, Rp 100.00) and `TEST002/B001` (stock 5,
//!   below its minimum) for manual API checks

use std::env;

use apotek_core::{Money, NewInventory, DEFAULT_QUANTITY_MINIMUM};
use apotek_db::{Database, DbConfig, DbError};

/// (sku, batch, name, category, stock, price in cents)
const ITEMS: &[(&str, &str, &str, &str, i64, i64)] = &[
    ("TEST001", "B001", "Paracetamol 500mg", "Obat Bebas", 50, 10_000),
    ("TEST002", "B001", "Amoxicillin 500mg", "Obat Keras", 5, 25_000),
    ("PCT-500", "B2401", "Paracetamol 500mg Strip", "Obat Bebas", 120, 4_500),
    ("PCT-500", "B2407", "Paracetamol 500mg Strip", "Obat Bebas", 80, 4_500),
    ("IBU-400", "B2403", "Ibuprofen 400mg", "Obat Bebas Terbatas", 60, 8_000),
    ("CTM-4", "B2311", "Chlorpheniramine 4mg", "Obat Bebas Terbatas", 9, 2_000),
    ("AMX-250", "B2402", "Amoxicillin Sirup 250mg", "Obat Keras", 24, 32_500),
    ("AMX-250", "B2409", "Amoxicillin Sirup 250mg", "Obat Keras", 30, 32_500),
    ("VITC-500", "B2405", "Vitamin C 500mg", "Suplemen", 200, 15_000),
    ("ORS-200", "B2310", "Oralit 200ml", "Obat Bebas", 12, 3_500),
    ("BETA-10", "B2406", "Betadine 10ml", "Antiseptik", 40, 17_500),
    ("MASK-3P", "B2404", "Masker Medis 3 Ply", "Alat Kesehatan", 300, 1_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./apotek_dev.db");
    let mut admin_user = String::from("admin");
    let mut admin_password = String::from("admin123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-user" => {
                if i + 1 < args.len() {
                    admin_user = args[i + 1].clone();
                    i += 1;
                }
            }
            "--admin-password" => {
                if i + 1 < args.len() {
                    admin_password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Apotek Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>              Database file path (default: ./apotek_dev.db)");
                println!("      --admin-user <NAME>      Admin username (default: admin)");
                println!("      --admin-password <PASS>  Admin password (default: admin123)");
                println!("  -h, --help                   Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Apotek Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    match db.users().create(&admin_user, &admin_password).await {
        Ok(user) => println!("✓ Created user '{}' (id {})", user.username, user.id),
        Err(DbError::UniqueViolation { .. }) => {
            println!("⚠ User '{}' already exists, leaving it as is", admin_user)
        }
        Err(e) => return Err(e.into()),
    }

    let existing = db.inventory().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} inventory records", existing);
        println!("  Skipping inventory seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating inventory...");

    let mut generated = 0;
    for (sku, batch, name, category, stock, price_cents) in ITEMS {
        let item = NewInventory {
            sku: sku.to_string(),
            batch_number: batch.to_string(),
            name: name.to_string(),
            category: Some(category.to_string()),
            quantity_available: *stock,
            quantity_minimum: DEFAULT_QUANTITY_MINIMUM,
            unit_price: Money::from_cents(*price_cents),
        };

        if let Err(e) = db.inventory().create(item).await {
            eprintln!("Failed to insert {}/{}: {}", sku, batch, e);
            continue;
        }
        generated += 1;
    }

    println!("✓ Generated {} inventory records", generated);

    let low = db.queries().low_stock().await?;
    println!("  Low stock: {} records", low.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
