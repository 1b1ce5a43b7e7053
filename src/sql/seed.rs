// Demo dataset
//
// A small retail schema (customers, products, orders, order_items) filled
// with deterministic data from a fixed RNG seed. Tables that already hold
// rows are left alone unless `reset` is set.

use crate::sql::database::Database;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;

const SEED: u64 = 42;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    city TEXT,
    signup_date TEXT
);
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT,
    price REAL NOT NULL
);
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id),
    order_date TEXT NOT NULL,
    total REAL NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS order_items (
    id INTEGER PRIMARY KEY,
    order_id INTEGER NOT NULL REFERENCES orders(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_orders_customer ON orders(customer_id);
CREATE INDEX IF NOT EXISTS idx_items_order ON order_items(order_id);
CREATE INDEX IF NOT EXISTS idx_items_product ON order_items(product_id);
";

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "Dave", "Eve", "Frank", "Grace", "Heidi", "Ivan", "Judy", "Mallory",
    "Niaj", "Olivia", "Peggy", "Rupert", "Sybil", "Trent", "Uma", "Victor", "Wendy", "Xavier",
    "Yasmin", "Zane",
];
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Rodriguez",
    "Wilson", "Martinez", "Anderson", "Taylor", "Thomas", "Hernandez", "Moore", "Martin",
    "Jackson", "Thompson", "White",
];
const CITIES: &[&str] = &[
    "New York", "San Francisco", "Los Angeles", "Seattle", "Chicago", "Boston", "Austin",
    "Denver", "Miami", "Atlanta",
];
const ADJECTIVES: &[&str] = &[
    "Smart", "Ultra", "Pro", "Nano", "Eco", "Rapid", "Prime", "Lite", "Max", "Quantum", "Hyper",
    "Fusion", "Terra", "Aero", "Aqua",
];
const NOUNS: &[&str] = &[
    "Widget", "Gizmo", "Device", "Hub", "Sensor", "Cable", "Charger", "Adapter", "Module", "Panel",
    "Kit", "Bundle", "Service", "Subscription", "License",
];

/// Category and its price band
const CATEGORIES: &[(&str, f64, f64)] = &[
    ("Gadgets", 20.0, 120.0),
    ("Accessories", 5.0, 40.0),
    ("Services", 50.0, 200.0),
    ("Software", 30.0, 150.0),
    ("Hardware", 80.0, 400.0),
    ("Apparel", 10.0, 90.0),
];

#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
    /// Delete existing rows first
    pub reset: bool,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            customers: 50,
            products: 40,
            orders: 300,
            reset: false,
        }
    }
}

/// Row counts after seeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub customers: i64,
    pub products: i64,
    pub orders: i64,
    pub order_items: i64,
}

/// Create the demo schema and fill empty tables
pub async fn seed_demo(db: &Database, options: SeedOptions) -> Result<SeedSummary> {
    db.with_connection(|conn| {
        conn.execute_batch(SCHEMA)
            .context("Failed to create demo schema")?;

        let tx = conn.transaction()?;
        if options.reset {
            tx.execute_batch(
                "DELETE FROM order_items; DELETE FROM orders; \
                 DELETE FROM products; DELETE FROM customers;",
            )
            .context("Failed to clear demo data")?;
        }

        let mut rng = StdRng::seed_from_u64(SEED);
        if count(&tx, "customers")? == 0 {
            insert_customers(&tx, &mut rng, options.customers)?;
        }
        if count(&tx, "products")? == 0 {
            insert_products(&tx, &mut rng, options.products)?;
        }
        if count(&tx, "orders")? == 0 {
            insert_orders(&tx, &mut rng, options.orders)?;
        }
        tx.commit().context("Failed to commit demo data")?;

        let summary = SeedSummary {
            customers: count(conn, "customers")?,
            products: count(conn, "products")?,
            orders: count(conn, "orders")?,
            order_items: count(conn, "order_items")?,
        };
        tracing::info!(
            "Seeded demo data: {} customers, {} products, {} orders, {} items",
            summary.customers,
            summary.products,
            summary.orders,
            summary.order_items
        );
        Ok(summary)
    })
    .await
}

fn count(conn: &Connection, table: &str) -> Result<i64> {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .with_context(|| format!("Failed to count rows in {}", table))
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

fn random_date(rng: &mut StdRng, start: NaiveDate, end: NaiveDate) -> String {
    let span = (end - start).num_days();
    let offset = rng.gen_range(0..=span);
    (start + Duration::days(offset)).format("%Y-%m-%d").to_string()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("Invalid date {}-{}-{}", y, m, d))
}

fn insert_customers(tx: &Transaction<'_>, rng: &mut StdRng, n: usize) -> Result<()> {
    let (start, end) = (date(2023, 1, 1)?, date(2025, 1, 1)?);
    let mut stmt =
        tx.prepare("INSERT INTO customers (id, name, city, signup_date) VALUES (?1, ?2, ?3, ?4)")?;
    for id in 1..=n as i64 {
        let name = format!("{} {}", pick(rng, FIRST_NAMES), pick(rng, LAST_NAMES));
        let city = pick(rng, CITIES);
        let signup = random_date(rng, start, end);
        stmt.execute(params![id, name, city, signup])?;
    }
    Ok(())
}

fn insert_products(tx: &Transaction<'_>, rng: &mut StdRng, n: usize) -> Result<()> {
    let mut stmt =
        tx.prepare("INSERT INTO products (id, name, category, price) VALUES (?1, ?2, ?3, ?4)")?;
    for id in 1..=n as i64 {
        let name = format!("{} {}", pick(rng, ADJECTIVES), pick(rng, NOUNS));
        let (category, low, high) = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
        let price = round2(rng.gen_range(low..high));
        stmt.execute(params![id, name, category, price])?;
    }
    Ok(())
}

fn insert_orders(tx: &Transaction<'_>, rng: &mut StdRng, n: usize) -> Result<()> {
    let customer_ids: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT id FROM customers ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        ids
    };
    let products: Vec<(i64, f64)> = {
        let mut stmt = tx.prepare("SELECT id, price FROM products ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(i64, f64)>, _>>()?;
        rows
    };
    if customer_ids.is_empty() || products.is_empty() {
        tracing::warn!("No customers or products; skipping orders");
        return Ok(());
    }

    let (start, end) = (date(2024, 1, 1)?, date(2025, 6, 30)?);
    let mut insert_order = tx.prepare(
        "INSERT INTO orders (id, customer_id, order_date, total) VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut insert_item = tx.prepare(
        "INSERT INTO order_items (id, order_id, product_id, quantity, unit_price) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    let mut item_id: i64 = 1;
    for order_id in 1..=n as i64 {
        let customer = customer_ids[rng.gen_range(0..customer_ids.len())];
        let order_date = random_date(rng, start, end);

        let mut items = Vec::new();
        let mut total = 0.0;
        for _ in 0..rng.gen_range(1..=5) {
            let (product_id, base_price) = products[rng.gen_range(0..products.len())];
            let quantity: i64 = rng.gen_range(1..=3);
            // occasional discount or markup of up to 10%
            let unit_price = round2(base_price * rng.gen_range(0.9..1.1));
            total += quantity as f64 * unit_price;
            items.push((product_id, quantity, unit_price));
        }

        insert_order.execute(params![order_id, customer, order_date, round2(total)])?;
        for (product_id, quantity, unit_price) in items {
            insert_item.execute(params![item_id, order_id, product_id, quantity, unit_price])?;
            item_id += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::database::{QueryBackend, QueryParams};

    fn small() -> SeedOptions {
        SeedOptions {
            customers: 5,
            products: 4,
            orders: 10,
            reset: false,
        }
    }

    #[tokio::test]
    async fn test_seed_creates_rows() {
        let db = Database::open_in_memory().unwrap();
        let summary = seed_demo(&db, small()).await.unwrap();
        assert_eq!(summary.customers, 5);
        assert_eq!(summary.products, 4);
        assert_eq!(summary.orders, 10);
        assert!(summary.order_items >= 10);
    }

    #[tokio::test]
    async fn test_seed_is_deterministic() {
        let a = Database::open_in_memory().unwrap();
        let b = Database::open_in_memory().unwrap();
        seed_demo(&a, small()).await.unwrap();
        seed_demo(&b, small()).await.unwrap();

        let sql = "SELECT name, city, signup_date FROM customers ORDER BY id";
        let rows_a = a.query(sql, &QueryParams::None, 100).await.unwrap();
        let rows_b = b.query(sql, &QueryParams::None, 100).await.unwrap();
        assert_eq!(rows_a, rows_b);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_without_reset() {
        let db = Database::open_in_memory().unwrap();
        seed_demo(&db, small()).await.unwrap();
        let again = seed_demo(&db, SeedOptions { customers: 99, ..small() })
            .await
            .unwrap();
        assert_eq!(again.customers, 5);

        let reset = seed_demo(&db, SeedOptions { customers: 7, reset: true, ..small() })
            .await
            .unwrap();
        assert_eq!(reset.customers, 7);
    }

    #[tokio::test]
    async fn test_order_totals_match_items() {
        let db = Database::open_in_memory().unwrap();
        seed_demo(&db, small()).await.unwrap();
        let result = db
            .query(
                "SELECT o.id, o.total, SUM(i.quantity * i.unit_price) \
                 FROM orders o JOIN order_items i ON i.order_id = o.id GROUP BY o.id",
                &QueryParams::None,
                100,
            )
            .await
            .unwrap();
        for row in result.rows {
            let total = row[1].as_f64().unwrap();
            let sum = row[2].as_f64().unwrap();
            assert!((total - sum).abs() < 0.02, "order {}: {} vs {}", row[0], total, sum);
        }
    }
}
