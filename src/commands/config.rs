// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::settings::{Settings, KEYS};
use crate::utils::{arg, maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("get", sub)) => {
            let settings = Settings::load(conn)?;
            println!("{}", settings.get(arg(sub, "key")?)?);
        }
        Some(("set", sub)) => {
            let key = arg(sub, "key")?;
            Settings::set(conn, key, arg(sub, "value")?)?;
            println!("Set {} = {}", key, Settings::load(conn)?.get(key)?);
        }
        Some(("list", sub)) => {
            let settings = Settings::load(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &settings)? {
                let mut rows = Vec::new();
                for key in KEYS {
                    rows.push(vec![key.to_string(), settings.get(key)?]);
                }
                println!("{}", pretty_table(&["Key", "Value"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
