// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::ledger::service::LedgerConfig;
use crate::models::OwnerId;
use crate::money::DEFAULT_MINOR_UNITS;

/// Owner id handed over by the session layer; overrides the stored owner.
pub const OWNER_ENV: &str = "LEDGERWISE_OWNER";

pub const KEYS: [&str; 4] = ["base_currency", "minor_units", "owner", "long_horizon_periods"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub base_currency: String,
    pub minor_units: u32,
    pub owner: String,
    /// Payoff beyond this many periods gets a warning.
    pub long_horizon_periods: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_currency: "USD".to_string(),
            minor_units: DEFAULT_MINOR_UNITS,
            owner: "default".to_string(),
            long_horizon_periods: 360,
        }
    }
}

fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?)
}

fn put(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

impl Settings {
    /// Stored values over defaults, then `LEDGERWISE_OWNER` over the stored owner.
    pub fn load(conn: &Connection) -> Result<Self> {
        let mut s = Settings::default();
        if let Some(v) = get(conn, "base_currency")? {
            s.base_currency = v;
        }
        if let Some(v) = get(conn, "minor_units")? {
            s.minor_units = v
                .parse()
                .with_context(|| format!("Invalid stored minor_units '{}'", v))?;
        }
        if let Some(v) = get(conn, "owner")? {
            s.owner = v;
        }
        if let Some(v) = get(conn, "long_horizon_periods")? {
            s.long_horizon_periods = v
                .parse()
                .with_context(|| format!("Invalid stored long_horizon_periods '{}'", v))?;
        }
        if let Ok(owner) = std::env::var(OWNER_ENV) {
            if !owner.trim().is_empty() {
                s.owner = owner.trim().to_string();
            }
        }
        Ok(s)
    }

    pub fn get(&self, key: &str) -> Result<String> {
        Ok(match key {
            "base_currency" => self.base_currency.clone(),
            "minor_units" => self.minor_units.to_string(),
            "owner" => self.owner.clone(),
            "long_horizon_periods" => self.long_horizon_periods.to_string(),
            other => return Err(anyhow!("Unknown setting '{}'", other)),
        })
    }

    /// Validates and persists one key.
    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "base_currency" => {
                if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
                    bail!("Currency must be a 3-letter code, got '{}'", value);
                }
                put(conn, key, &value.to_uppercase())
            }
            "minor_units" => {
                let mu: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid minor_units '{}'", value))?;
                if mu > 8 {
                    bail!("minor_units must be between 0 and 8");
                }
                put(conn, key, value)
            }
            "owner" => {
                if value.is_empty() {
                    bail!("Owner must not be empty");
                }
                put(conn, key, value)
            }
            "long_horizon_periods" => {
                let n: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid long_horizon_periods '{}'", value))?;
                if n == 0 {
                    bail!("long_horizon_periods must be positive");
                }
                put(conn, key, value)
            }
            other => bail!("Unknown setting '{}'", other),
        }
    }

    pub fn owner_id(&self) -> OwnerId {
        OwnerId::new(self.owner.clone())
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            minor_units: self.minor_units,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().unwrap();
        init_schema(&c).unwrap();
        c
    }

    #[test]
    fn defaults_when_nothing_stored() {
        let c = conn();
        let s = Settings::load(&c).unwrap();
        assert_eq!(s.base_currency, "USD");
        assert_eq!(s.minor_units, 2);
        assert_eq!(s.long_horizon_periods, 360);
    }

    #[test]
    fn set_validates_and_round_trips() {
        let c = conn();
        Settings::set(&c, "base_currency", "eur").unwrap();
        Settings::set(&c, "minor_units", "0").unwrap();
        assert!(Settings::set(&c, "minor_units", "many").is_err());
        assert!(Settings::set(&c, "base_currency", "EURO").is_err());
        assert!(Settings::set(&c, "colour", "blue").is_err());
        let s = Settings::load(&c).unwrap();
        assert_eq!(s.base_currency, "EUR");
        assert_eq!(s.minor_units, 0);
        assert_eq!(s.get("minor_units").unwrap(), "0");
    }
}
