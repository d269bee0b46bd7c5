//! The message streams that connect detection, dispatch, execution, inventory and
//! safety without coupling those crates to one another directly. Two shapes cover
//! every stream in the engine: a coalescing last-writer-wins channel for signals a
//! slow reader can afford to see only the newest of, and an unbounded channel for
//! records that must never be dropped.

pub mod coalescing;
pub mod hub;
pub mod streams;

pub use coalescing::{CoalescingSignalChannel, SharedCoalescingChannel};
pub use hub::ChannelHub;
pub use streams::{SafetyEvent, StrategyUpdate};
