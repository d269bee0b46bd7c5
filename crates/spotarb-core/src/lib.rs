//! Shared types for the cross-venue spot arbitrage engine: the price/book/fee/balance
//! data model, the `Opportunity`/`Transaction`/`RebalanceProposal` records that flow
//! between components, the mutable `AppSettings` snapshot type, and the injectable
//! `Clock`/`RandomSource` traits used in place of direct `Utc::now()`/`rand::thread_rng()`
//! calls everywhere else in the workspace.
//!
//! There is no crate-wide error enum: every fallible boundary in this workspace folds
//! its failures into a domain result instead (`OrderResponse`/`Transaction` status for
//! execution, `thiserror`-scoped enums per crate for everything else), so there is no
//! shared shape for a cross-crate error type to serve.

pub mod clock;
pub mod ids;
pub mod model;
pub mod settings;

pub use clock::{Clock, FixedClock, FixedRandomSource, RandomSource, SystemClock, ThreadRandomSource};
pub use ids::{Symbol, VenueId};
pub use model::{
    Balance, FeeSchedule, OrderBook, Opportunity, PriceLevel, RebalanceProposal, Transaction,
    TransactionStatus,
};
pub use settings::{AppSettings, ExecutionMode};
