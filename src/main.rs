// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;

use anyhow::{Context, Result};

use ledgerwise::commands::{self, Session};
use ledgerwise::ledger::{Ledger, SqliteStore};
use ledgerwise::settings::Settings;
use ledgerwise::{cli, db, logging};

fn main() -> Result<()> {
    logging::init();
    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let path = db::db_path()?;
    let store = Arc::new(
        SqliteStore::open(&path).with_context(|| format!("Open DB at {}", path.display()))?,
    );
    let settings = {
        let conn = store.conn()?;
        Settings::load(&conn)?
    };

    if let Some(("config", sub)) = matches.subcommand() {
        let conn = store.conn()?;
        return commands::config::handle(&conn, sub);
    }

    let ledger = Ledger::new(store.clone(), settings.ledger_config());
    let session = Session::new(&ledger, &settings);

    if let Some(("init", _)) = matches.subcommand() {
        println!("Database initialized at {}", path.display());
    } else if !commands::dispatch(&session, &matches)? {
        cli::build_cli().print_help()?;
        println!();
    }
    Ok(())
}
