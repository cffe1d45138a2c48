//! clubdues - payment reconciliation and obligation engine for club
//! membership billing
//!
//! This library is the core subsystem behind a club billing application:
//! it parses camt.052 bank statements into normalized transactions, matches
//! each transaction to a probable payer with ranked heuristics, allocates
//! payments across outstanding costs under an exact-sum invariant, cascades
//! state changes when payments are edited or deleted, and materializes
//! recurring costs from templates on a rolling schedule.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Core data models (members, parents, costs, payments, ...)
//! - `storage`: JSON file storage layer with a pending-write queue
//! - `services`: The engine (parser, matcher, allocator, coordinator,
//!   cascades, recurring scheduler)
//! - `export`: Per-payer overdue statements
//! - `audit`: Append-only audit log of engine actions
//!
//! # Persistence model
//!
//! Mutations apply to the in-memory repositories synchronously and queue a
//! write; the host drains the queue with [`storage::Storage::flush`] when
//! idle. Failed writes are logged and retried on the next flush — the
//! in-memory state never rolls back, trading strict write-through
//! consistency for immediate feedback.
//!
//! # Example
//!
//! ```rust,ignore
//! use clubdues::config::paths::DuesPaths;
//! use clubdues::services::{RecurringService, ReconciliationService};
//! use clubdues::storage::Storage;
//!
//! let mut storage = Storage::new(DuesPaths::new()?)?;
//! storage.load_all()?;
//!
//! // Materialize newly due recurring costs, then import a statement
//! RecurringService::new(&storage).run()?;
//! let summary = ReconciliationService::new(&storage)
//!     .import_statement("statement.xml", &xml)?;
//! storage.flush();
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{DuesError, DuesResult};
