//! Pricing ladder laboratory: a three-tier choice model, a pocket
//! price waterfall, and a constrained grid search over candidate
//! ladders, with snapshot and share-link persistence on SQLite.

pub mod choice;
pub mod coverage;
pub mod csv;
pub mod error;
pub mod kpi;
pub mod leakage;
pub mod optimizer;
pub mod scenario;
pub mod sensitivity;
pub mod snapshot;
pub mod store;
pub mod types;
