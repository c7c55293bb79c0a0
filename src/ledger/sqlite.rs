// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::db::init_schema;
use crate::error::StoreError;
use crate::ledger::store::{LedgerStore, StoreResult};
use crate::models::{
    Account, AccountId, AccountPatch, Debt, DebtId, Entry, EntryDraft, EntryFilter, NewAccount,
    NewDebt, NewTransaction, OwnerId, PostedEntry, SystemAccount, Transaction, TransactionId,
};
use crate::money::Money;

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.amount().to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Decimal::from_str(s)
            .map(Money::new)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

fn text<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    s.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const ACCOUNT_COLS: &str = "id, owner_id, name, type, category, is_active, opened_at, system";

fn account_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    let system: Option<String> = r.get(7)?;
    Ok(Account {
        id: AccountId(r.get(0)?),
        owner_id: OwnerId(r.get(1)?),
        name: r.get(2)?,
        r#type: text(r, 3)?,
        category: r.get(4)?,
        is_active: r.get(5)?,
        opened_at: r.get(6)?,
        system: system.as_deref().and_then(SystemAccount::from_key),
    })
}

const DEBT_COLS: &str = "id, owner_id, name, liability_account_id, principal, current_balance, \
    interest_rate, rate_frequency, repayment_method, payment_amount, payment_frequency, \
    start_date, total_periods";

fn debt_row(r: &Row<'_>) -> rusqlite::Result<Debt> {
    Ok(Debt {
        id: DebtId(r.get(0)?),
        owner_id: OwnerId(r.get(1)?),
        name: r.get(2)?,
        liability_account_id: AccountId(r.get(3)?),
        principal: r.get(4)?,
        current_balance: r.get(5)?,
        interest_rate: decimal(r, 6)?,
        rate_frequency: text(r, 7)?,
        repayment_method: text(r, 8)?,
        payment_amount: r.get(9)?,
        payment_frequency: text(r, 10)?,
        start_date: r.get(11)?,
        total_periods: r.get(12)?,
    })
}

/// `LedgerStore` over SQLite. Each append, or batch of appends, runs inside one
/// SQL transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Direct access for settings and maintenance queries.
    pub fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn entries_of(conn: &Connection, id: TransactionId) -> StoreResult<Vec<Entry>> {
        let mut stmt = conn.prepare_cached(
            "SELECT account_id, side, amount FROM entries WHERE transaction_id=?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![id.0], |r| {
            Ok(Entry {
                transaction_id: id,
                account_id: AccountId(r.get(0)?),
                side: text(r, 1)?,
                amount: r.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn transaction_rows(
        conn: &Connection,
        sql: &str,
        param: &dyn ToSql,
    ) -> StoreResult<Vec<Transaction>> {
        let mut stmt = conn.prepare(sql)?;
        let headers = stmt
            .query_map([param], |r| {
                Ok(Transaction {
                    id: TransactionId(r.get(0)?),
                    owner_id: OwnerId(r.get(1)?),
                    date: r.get(2)?,
                    description: r.get(3)?,
                    notes: r.get(4)?,
                    created_at: r.get(5)?,
                    reverses: r.get::<_, Option<i64>>(6)?.map(TransactionId),
                    entries: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        let mut out = Vec::with_capacity(headers.len());
        for mut t in headers {
            t.entries = Self::entries_of(conn, t.id)?;
            out.push(t);
        }
        Ok(out)
    }

    fn insert_transaction(
        tx: &rusqlite::Transaction<'_>,
        header: &NewTransaction,
        entries: &[EntryDraft],
    ) -> StoreResult<TransactionId> {
        tx.execute(
            "INSERT INTO transactions(owner_id, date, description, notes, created_at, reverses)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                header.owner_id.as_str(),
                header.date,
                header.description,
                header.notes,
                Utc::now(),
                header.reverses.map(|r| r.0),
            ],
        )?;
        let id = TransactionId(tx.last_insert_rowid());
        let mut stmt = tx.prepare_cached(
            "INSERT INTO entries(transaction_id, account_id, side, amount) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for e in entries {
            stmt.execute(params![id.0, e.account_id.0, e.side.as_str(), e.amount])?;
        }
        Ok(id)
    }
}

impl LedgerStore for SqliteStore {
    fn insert_account(&self, new: NewAccount) -> StoreResult<Account> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts(owner_id, name, type, category, is_active, opened_at, system)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
            params![
                new.owner_id.as_str(),
                new.name,
                new.r#type.as_str(),
                new.category,
                new.opened_at,
                new.system.map(SystemAccount::key),
            ],
        )?;
        let id = AccountId(conn.last_insert_rowid());
        Ok(Account {
            id,
            owner_id: new.owner_id,
            name: new.name,
            r#type: new.r#type,
            category: new.category,
            is_active: true,
            opened_at: new.opened_at,
            system: new.system,
        })
    }

    fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM accounts WHERE id=?1", ACCOUNT_COLS);
        Ok(conn.query_row(&sql, params![id.0], account_row).optional()?)
    }

    fn accounts(&self, owner: &OwnerId) -> StoreResult<Vec<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM accounts WHERE owner_id=?1 ORDER BY name",
            ACCOUNT_COLS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner.as_str()], account_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn system_account(&self, owner: &OwnerId, kind: SystemAccount) -> StoreResult<Option<Account>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM accounts WHERE owner_id=?1 AND system=?2",
            ACCOUNT_COLS
        );
        Ok(conn
            .query_row(&sql, params![owner.as_str(), kind.key()], account_row)
            .optional()?)
    }

    fn update_account(&self, id: AccountId, patch: &AccountPatch) -> StoreResult<()> {
        let conn = self.conn()?;
        if let Some(name) = &patch.name {
            conn.execute("UPDATE accounts SET name=?1 WHERE id=?2", params![name, id.0])?;
        }
        if let Some(category) = &patch.category {
            conn.execute(
                "UPDATE accounts SET category=?1 WHERE id=?2",
                params![category, id.0],
            )?;
        }
        Ok(())
    }

    fn set_account_active(&self, id: AccountId, active: bool) -> StoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE accounts SET is_active=?1 WHERE id=?2",
            params![active, id.0],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("account {}", id)));
        }
        Ok(())
    }

    fn delete_account(&self, id: AccountId) -> StoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute("DELETE FROM accounts WHERE id=?1", params![id.0])?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("account {}", id)));
        }
        Ok(())
    }

    fn append_transaction(
        &self,
        header: &NewTransaction,
        entries: &[EntryDraft],
    ) -> StoreResult<TransactionId> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id = Self::insert_transaction(&tx, header, entries)?;
        tx.commit()?;
        Ok(id)
    }

    fn append_batch(
        &self,
        batch: &[(NewTransaction, Vec<EntryDraft>)],
    ) -> StoreResult<Vec<TransactionId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(batch.len());
        for (header, entries) in batch {
            ids.push(Self::insert_transaction(&tx, header, entries)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn transaction(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        let conn = self.conn()?;
        let mut found = Self::transaction_rows(
            &conn,
            "SELECT id, owner_id, date, description, notes, created_at, reverses
             FROM transactions WHERE id=?1",
            &id.0,
        )?;
        Ok(found.pop())
    }

    fn transactions(&self, owner: &OwnerId) -> StoreResult<Vec<Transaction>> {
        let conn = self.conn()?;
        Self::transaction_rows(
            &conn,
            "SELECT id, owner_id, date, description, notes, created_at, reverses
             FROM transactions WHERE owner_id=?1 ORDER BY date, id",
            &owner.as_str(),
        )
    }

    fn reversal_of(&self, id: TransactionId) -> StoreResult<Option<TransactionId>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id FROM transactions WHERE reverses=?1",
                params![id.0],
                |r| r.get::<_, i64>(0),
            )
            .optional()?
            .map(TransactionId))
    }

    fn query_entries(&self, filter: &EntryFilter) -> StoreResult<Vec<PostedEntry>> {
        let conn = self.conn()?;
        let mut sql = String::from(
            "SELECT e.id, e.transaction_id, t.owner_id, t.date, e.account_id, e.side, e.amount
             FROM entries e JOIN transactions t ON e.transaction_id=t.id WHERE 1=1",
        );
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(owner) = &filter.owner_id {
            sql.push_str(" AND t.owner_id=?");
            args.push(Box::new(owner.0.clone()));
        }
        if let Some(account) = filter.account_id {
            sql.push_str(" AND e.account_id=?");
            args.push(Box::new(account.0));
        }
        if let Some(from) = filter.from {
            sql.push_str(" AND t.date>=?");
            args.push(Box::new(from));
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND t.date<=?");
            args.push(Box::new(to));
        }
        sql.push_str(" ORDER BY t.date, e.id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |r| {
            Ok(PostedEntry {
                seq: r.get(0)?,
                transaction_id: TransactionId(r.get(1)?),
                owner_id: OwnerId(r.get(2)?),
                date: r.get(3)?,
                account_id: AccountId(r.get(4)?),
                side: text(r, 5)?,
                amount: r.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_debt(&self, new: NewDebt) -> StoreResult<Debt> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO debts(owner_id, name, liability_account_id, principal, current_balance,
                interest_rate, rate_frequency, repayment_method, payment_amount, payment_frequency,
                start_date, total_periods)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.owner_id.as_str(),
                new.name,
                new.liability_account_id.0,
                new.principal,
                new.current_balance,
                new.interest_rate.to_string(),
                new.rate_frequency.as_str(),
                new.repayment_method.as_str(),
                new.payment_amount,
                new.payment_frequency.as_str(),
                new.start_date,
                new.total_periods,
            ],
        )?;
        let id = DebtId(conn.last_insert_rowid());
        Ok(Debt {
            id,
            owner_id: new.owner_id,
            name: new.name,
            liability_account_id: new.liability_account_id,
            principal: new.principal,
            current_balance: new.current_balance,
            interest_rate: new.interest_rate,
            rate_frequency: new.rate_frequency,
            repayment_method: new.repayment_method,
            payment_amount: new.payment_amount,
            payment_frequency: new.payment_frequency,
            start_date: new.start_date,
            total_periods: new.total_periods,
        })
    }

    fn debt(&self, id: DebtId) -> StoreResult<Option<Debt>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM debts WHERE id=?1", DEBT_COLS);
        Ok(conn.query_row(&sql, params![id.0], debt_row).optional()?)
    }

    fn debts(&self, owner: &OwnerId) -> StoreResult<Vec<Debt>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM debts WHERE owner_id=?1 ORDER BY id", DEBT_COLS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner.as_str()], debt_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_debt_balance(&self, id: DebtId, balance: Money) -> StoreResult<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE debts SET current_balance=?1 WHERE id=?2",
            params![balance, id.0],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(format!("debt {}", id)));
        }
        Ok(())
    }
}
