//! # stratum-core: schema-migration engine
//!
//! Discovers versioned migration units on disk, tracks applied state in a
//! ledger table, and executes up/down scripts transactionally against
//! Postgres. The CLI in `crates/cli` is the only intended caller; the
//! library itself never owns database connectivity — a `PgPool` is passed
//! in by whoever bootstraps the process.

pub mod config;
pub mod error;
pub mod ledger;
pub mod runner;
pub mod source;
pub mod splitter;
pub mod types;

pub use config::*;
pub use error::*;
pub use ledger::*;
pub use runner::*;
pub use source::*;
pub use splitter::*;
pub use types::*;
