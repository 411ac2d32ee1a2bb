//! Adaptive exploration of a numeric column behind a suppressing data source
//!
//! An [`ExplorationDriver`] fetches the top-level statistics of a column,
//! decides whether bucketing is worth the queries, and drills down round by
//! round. Each round asks for several bucket sizes in one query, classifies
//! the rows into observed buckets and suppressed aggregates, and inserts the
//! levels into a [`BucketTree`](bucket_tree::BucketTree).
//!
//! The data source is reached through two traits: [`QueryBuilder`] produces
//! requests and [`QueryExecutor`] runs them.
//!
//! # Example
//!
//! ```rust,no_run
//! use bucket_explorer::{ExplorationConfig, ExplorationDriver, QueryBuilder, QueryExecutor};
//!
//! fn explore<B, E>(builder: B, executor: E) -> bucket_core::Result<()>
//! where
//!     B: QueryBuilder,
//!     E: QueryExecutor<B::Request>,
//! {
//!     let config = ExplorationConfig::default().with_levels_per_round(2);
//!     let mut driver = ExplorationDriver::new(builder, executor, "loans", "amount", config)?;
//!     driver.run()?;
//!
//!     for level in driver.tree().levels() {
//!         println!("{}: {} buckets", level.size(), level.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod driver;
pub mod query;

pub use classify::{assign_suppressed, classify, classify_all, RowClass};
pub use config::ExplorationConfig;
pub use driver::ExplorationDriver;
pub use query::{BucketRowSchema, QueryBuilder, QueryExecutor, QueryResult, Row, StatsColumns};
