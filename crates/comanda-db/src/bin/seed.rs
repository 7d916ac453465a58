//! # Seed Data Generator
//!
//! Fills a store with a demo kitutes catalog and a few tabs, for trying the
//! screens without typing everything in.
//!
//! ## Usage
//! ```bash
//! # Seed ./kitutes.db (native, emulator if it can't be opened)
//! cargo run -p comanda-db --bin seed
//!
//! # Specify database path
//! cargo run -p comanda-db --bin seed -- --db ./data/kitutes.db
//!
//! # Emulator only, print everything as JSON
//! cargo run -p comanda-db --bin seed -- --backend memory --dump
//! ```
//!
//! ## Generated Data
//! - Catalog: salgados, doces and bebidas with prices in cents
//! - Open tabs with a few items each
//! - One closed tab (history) and one finalized tab (sale records)

use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use comanda_core::{NewLineItem, ProductInput, DEFAULT_DB_FILE};
use comanda_db::{BackendPreference, DbConfig, Store};

/// Demo catalog: (name, price in cents)
const CATALOG: &[(&str, i64)] = &[
    ("Coxinha", 350),
    ("Coxinha Grande", 600),
    ("Pastel de Carne", 500),
    ("Pastel de Queijo", 500),
    ("Esfiha", 450),
    ("Pão de Queijo", 400),
    ("Quibe", 400),
    ("Empada", 450),
    ("Brigadeiro", 250),
    ("Beijinho", 250),
    ("Bolo de Cenoura", 700),
    ("Refrigerante Lata", 600),
    ("Suco Natural", 800),
    ("Água", 300),
    ("Café", 400),
];

/// Demo tabs: (name, [(product reference, quantity)])
const TABS: &[(&str, &[(&str, i64)])] = &[
    ("Mesa 1", &[("Coxinha", 2), ("Pastel de Carne", 1), ("Refri", 2)]),
    ("Mesa 2", &[("Esfiha", 4), ("Suco", 1)]),
    ("Balcão", &[("Pão de Queijo", 3), ("Café", 3)]),
    ("Ana", &[("Brigadeiro", 6), ("Água", 1)]),
    ("João", &[("Empada", 2), ("Bolo", 1), ("Café", 1)]),
];

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=comanda=trace` - Show trace for comanda crates only
/// - Default: INFO, debug for comanda crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,comanda=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config = DbConfig::from_env();
    let mut dump = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--backend" | "-b" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<BackendPreference>() {
                        Ok(backend) => config.backend = backend,
                        Err(e) => warn!(error = %e, "Keeping backend {}", config.backend),
                    }
                    i += 1;
                }
            }
            "--dump" => dump = true,
            "--help" | "-h" => {
                println!("Comanda Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  -d, --db <PATH>          Database file path (default: {DEFAULT_DB_FILE})"
                );
                println!("  -b, --backend <KIND>     auto, native or memory (default: auto)");
                println!("      --dump               Print every table as JSON afterwards");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let store = Store::open(config.bootstrap_on_open(true)).await?;
    info!(backend = %store.kind(), "Store ready");

    // Check existing catalog
    let existing = store.products().count().await?;
    if existing > 0 {
        warn!(
            products = existing,
            "Store already has products, skipping seed to avoid duplicates"
        );
    } else {
        seed(&store).await?;
    }

    let summary = store.reports().dashboard().await?;
    info!(
        open_tabs = summary.open_tabs,
        closed_tabs = summary.closed_tabs,
        open_total = %summary.open_total,
        closed_total = %summary.closed_total,
        "Dashboard"
    );
    for tally in &summary.top_products {
        info!(
            product = %tally.product_name,
            quantity = tally.quantity,
            total = %tally.total,
            "Top product"
        );
    }

    if dump {
        let snapshot = store.admin().snapshot().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    store.close().await;
    Ok(())
}

async fn seed(store: &Store) -> Result<(), Box<dyn std::error::Error>> {
    let start = std::time::Instant::now();

    for (name, price_cents) in CATALOG {
        store
            .products()
            .upsert(ProductInput::new(*name, *price_cents))
            .await?;
    }
    info!(products = CATALOG.len(), "Catalog seeded");

    let mut tab_ids = Vec::with_capacity(TABS.len());
    for (tab_name, items) in TABS {
        let tab = store.tabs().create(tab_name).await?;
        for (reference, quantity) in *items {
            if let Err(e) = store
                .line_items()
                .add(NewLineItem::new(tab, *reference, *quantity))
                .await
            {
                warn!(tab = %tab_name, reference = %reference, error = %e, "Skipping item");
            }
        }
        tab_ids.push(tab);
    }

    // Last tab goes to history, the one before it to sale records
    if let Some(&last) = tab_ids.last() {
        store.tabs().close(last).await?;
    }
    if let Some(&finalized) = tab_ids.iter().rev().nth(1) {
        let records = store
            .tabs()
            .finalize(finalized, Utc::now().date_naive())
            .await?;
        info!(records = records.len(), "Tab finalized into sale records");
    }

    info!(elapsed = ?start.elapsed(), tabs = tab_ids.len(), "Seed complete");
    Ok(())
}
