// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal vocabulary notebook with a shared remote snapshot.
//!
//! Words live in a local __word store__. The store can be reconciled with a
//! single JSON snapshot kept in a GitHub repository, so the same collection
//! can be used from several machines, or by several people.
//!
//! # Reconciliation
//!
//! Records are matched by their word text, trimmed and lower-cased. When
//! both sides hold the same word, the copy with the later update timestamp
//! wins, and the local id always survives. Nothing is ever deleted by a
//! merge, which also means a word removed locally returns if the remote
//! snapshot still has it.

pub mod config;
pub mod export;
pub mod lookup;
pub mod merge;
pub mod outbox;
pub mod path;
pub mod record;
pub mod remote;
pub mod snapshot;
pub mod store;
pub mod sync;
