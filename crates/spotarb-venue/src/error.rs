use thiserror::Error;

/// The tagged result every `VenueAdapter` method returns. `NotSupported` is the only
/// variant the dispatcher/executor may branch on as a first-class outcome, reported
/// when an adapter has no implementation for a given operation; `Transport`
/// failures inside `place*`/`cancel`/`status` are instead folded into an
/// `Ok(OrderResponse { status: Failed, .. })` by the adapter itself and never reach
/// this variant — `Transport` here is reserved for calls with no "failed order"
/// shape to fall back to, such as `withdraw` and `deposit_address`.
#[derive(Debug, Error)]
pub enum VenueError {
    #[error("operation not supported by this venue")]
    NotSupported,

    #[error("transport error: {0}")]
    Transport(String),
}

pub type VenueResult<T> = Result<T, VenueError>;
