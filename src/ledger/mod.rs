// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Double-entry books: storage, validation, posting shapes and projections.

pub mod projector;
pub mod service;
pub mod shapes;
pub mod sqlite;
pub mod store;
pub mod validator;

pub use projector::Projector;
pub use service::{Ledger, LedgerConfig, PostOutcome, TransactionHeader};
pub use shapes::{Allocation, Posting, WindfallSplit};
pub use sqlite::SqliteStore;
pub use store::{LedgerStore, MemoryStore};
