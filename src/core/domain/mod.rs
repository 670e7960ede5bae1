//! Core domain types.
//!
//! ## Identifiers
//!
//! - [`TokenId`] - a CLOB token/outcome identifier
//! - [`Slug`] - a bracket's canonical string identifier
//!
//! ## Market types
//!
//! - [`MarketMetadata`] - cached, immutable per-bracket metadata
//!
//! ## Book types
//!
//! - [`PriceLevel`], [`MarketBook`], [`BracketBooks`]
//!
//! ## Execution types
//!
//! - [`ExecutionRecord`], [`ExecutionState`]

mod book;
mod execution;
mod market;
mod slug;

pub use book::{BracketBooks, MarketBook, PriceLevel, Side};
pub use execution::{execution_id, ExecutionRecord, ExecutionState};
pub use market::{normalize_token_ids, MarketMetadata, TokenId};
pub use slug::{Slug, BUCKET_SECONDS};
