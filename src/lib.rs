//! bracket15 - arbitrage detection and two-phase execution for 15-minute
//! up/down prediction-market brackets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Reusable library components
//! │   ├── domain/       # Pure domain types (slug, book, evaluator, execution)
//! │   ├── catalog/       # Active-set market catalog
//! │   ├── book/          # Live orderbook aggregator (streaming + REST)
//! │   ├── executor/      # Two-phase crash-safe execution engine
//! │   ├── store/         # Execution persistence
//! │   ├── db/            # Diesel connection pool + schema
//! │   ├── risk/          # Risk register
//! │   └── telemetry/     # Decision/tick event sink
//! └── app/              # Configuration + orchestration
//! ```

pub mod app;
pub mod cli;
pub mod core;
pub mod error;
