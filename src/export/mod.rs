//! Export surfaces consuming engine state
//!
//! Only the plain-text dunning export lives here; table/CSV rendering of
//! the raw data belongs to the host application.

pub mod dunning;

pub use dunning::{overdue_statement, overdue_statements};
