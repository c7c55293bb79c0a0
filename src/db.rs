// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Ledgerwise", "ledgerwise"));

/// Environment variable that points the CLI at a specific database file.
pub const DB_ENV: &str = "LEDGERWISE_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var(DB_ENV) {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p.trim()));
        }
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("ledgerwise.sqlite"))
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL COLLATE NOCASE,
        type TEXT NOT NULL CHECK(type IN ('asset','liability','income','expense','equity')),
        category TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        opened_at TEXT NOT NULL,
        system TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(owner_id, name)
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts(owner_id);

    -- type is fixed once an account exists; entries were signed against it
    CREATE TRIGGER IF NOT EXISTS accounts_type_immutable
    BEFORE UPDATE OF type ON accounts
    WHEN OLD.type != NEW.type
    BEGIN
        SELECT RAISE(ABORT, 'account type is immutable');
    END;

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL,
        date TEXT NOT NULL,
        description TEXT NOT NULL,
        notes TEXT,
        created_at TEXT NOT NULL,
        reverses INTEGER UNIQUE,
        FOREIGN KEY(reverses) REFERENCES transactions(id)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_owner_date ON transactions(owner_id, date);

    -- one row per leg; amounts are decimal strings, never REAL
    CREATE TABLE IF NOT EXISTS entries(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        side TEXT NOT NULL CHECK(side IN ('debit','credit')),
        amount TEXT NOT NULL,
        FOREIGN KEY(transaction_id) REFERENCES transactions(id) ON DELETE RESTRICT,
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE RESTRICT
    );
    CREATE INDEX IF NOT EXISTS idx_entries_account ON entries(account_id);
    CREATE INDEX IF NOT EXISTS idx_entries_transaction ON entries(transaction_id);

    CREATE TABLE IF NOT EXISTS debts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id TEXT NOT NULL,
        name TEXT NOT NULL,
        liability_account_id INTEGER NOT NULL,
        principal TEXT NOT NULL,
        current_balance TEXT NOT NULL,
        interest_rate TEXT NOT NULL,
        rate_frequency TEXT NOT NULL,
        repayment_method TEXT NOT NULL,
        payment_amount TEXT NOT NULL,
        payment_frequency TEXT NOT NULL,
        start_date TEXT NOT NULL,
        total_periods INTEGER NOT NULL,
        FOREIGN KEY(liability_account_id) REFERENCES accounts(id) ON DELETE RESTRICT
    );
    "#,
    )
}
