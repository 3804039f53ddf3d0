//! # Seed Data Generator
//!
//! Populates a database with demo pharmacy stock and prints the resulting
//! dashboard alerts as JSON.
//!
//! ## Usage
//! ```bash
//! cargo run -p apotheca-db --bin seed
//!
//! # Specify database path (or set APOTHECA_DB_PATH) and inventory config
//! cargo run -p apotheca-db --bin seed -- --db ./data/apotheca.db --config ./inventory.toml
//!
//! # Pretend it is another day (expiry dates are relative to it)
//! cargo run -p apotheca-db --bin seed -- --today 2025-01-01
//! ```
//!
//! ## Generated Stock
//! Every medicine gets batches whose expiry dates are offsets from `--today`,
//! so each run shows a mix of healthy, expiring, expired and low stock.
//! A few sales are then issued FEFO to exercise the ledger.

use std::env;
use std::path::PathBuf;

use apotheca_core::OrderLine;
use apotheca_db::repository::product::new_product;
use apotheca_db::{Database, DbConfig, InventoryConfig};
use chrono::{Days, Local, NaiveDate};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (name, category, unit, min_stock, price_cents)
const MEDICINES: &[(&str, &str, &str, i64, i64)] = &[
    ("Paracetamol 500mg", "Analgesic", "tablet", 50, 12),
    ("Ibuprofen 400mg", "Analgesic", "tablet", 40, 18),
    ("Amoxicillin 250mg", "Antibiotic", "capsule", 30, 45),
    ("Azithromycin 500mg", "Antibiotic", "tablet", 10, 120),
    ("Cetirizine 10mg", "Antihistamine", "tablet", 20, 15),
    ("Omeprazole 20mg", "Gastro", "capsule", 25, 30),
    ("Salbutamol Inhaler", "Respiratory", "inhaler", 5, 650),
    ("ORS Sachet", "Rehydration", "sachet", 60, 20),
    ("Cough Syrup 100ml", "Respiratory", "bottle", 8, 240),
    ("Insulin Glargine Pen", "Diabetes", "pen", 4, 2800),
];

/// Batch layouts as (quantity, expiry offset in days), cycled over medicines.
/// Negative offsets produce already expired batches.
const BATCH_PLANS: &[&[(i64, i64)]] = &[
    &[(120, 200), (80, 400)],
    &[(15, 12), (30, 300)],
    &[(10, -5), (25, 90)],
    &[(6, 45)],
];

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,apotheca_db=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn offset(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        today.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path =
        env::var("APOTHECA_DB_PATH").unwrap_or_else(|_| String::from("./apotheca_dev.db"));
    let mut config_path: Option<PathBuf> = None;
    let mut today = Local::now().date_naive();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--today" | "-t" => {
                if i + 1 < args.len() {
                    today = NaiveDate::parse_from_str(&args[i + 1], "%Y-%m-%d")?;
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Apotheca POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: ./apotheca_dev.db)");
                println!("  -c, --config <PATH>   Inventory config TOML");
                println!("  -t, --today <DATE>    Reference day, YYYY-MM-DD (default: today)");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(arg = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let inventory = InventoryConfig::load(config_path)?;
    let db = Database::new(DbConfig::new(&db_path).inventory(inventory)).await?;
    info!(path = %db_path, %today, "Connected to database");

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
    } else {
        let mut product_ids = Vec::with_capacity(MEDICINES.len());

        for (idx, (name, category, unit, min_stock, price)) in MEDICINES.iter().enumerate() {
            let product = new_product(name, category, unit, *min_stock, *price);
            db.products().insert(&product).await?;

            for (lot, (quantity, days)) in BATCH_PLANS[idx % BATCH_PLANS.len()].iter().enumerate() {
                let Some(expiry) = offset(today, *days) else {
                    warn!(days, "Expiry offset out of range, skipping batch");
                    continue;
                };
                let code = format!("LOT-{:02}{:02}", idx + 1, lot + 1);
                db.batches()
                    .receive(&product.id, *quantity, expiry, Some(code.as_str()), "seed")
                    .await?;
            }

            product_ids.push(product.id);
        }

        // A couple of counter sales so the ledger has issuances.
        for (n, pid) in product_ids.iter().enumerate().take(4) {
            let order = [OrderLine::new(pid.as_str(), 3 + n as i64)];
            let reference = format!("SALE-{:04}", n + 1);
            match db.stock().issue_order(&order, Some(reference.as_str()), "seed").await {
                Ok(issued) => info!(reference = %reference, lines = issued.len(), "Demo sale issued"),
                Err(e) => warn!(reference = %reference, error = %e, "Demo sale rejected"),
            }
        }

        info!(products = product_ids.len(), "Seed complete");
    }

    let alerts = db.stock().alerts(today).await?;
    println!("{}", serde_json::to_string_pretty(&alerts)?);

    db.close().await;
    Ok(())
}
