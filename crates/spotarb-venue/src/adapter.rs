use crate::error::VenueResult;
use crate::order::{OrderInfo, OrderResponse};
use async_trait::async_trait;
use rust_decimal::Decimal;
use spotarb_core::{Balance, FeeSchedule, OrderBook, Symbol, VenueId};

/// Abstract access to one exchange (component C1). Real per-exchange REST/WebSocket
/// clients are out of scope; this is the contract they would satisfy, and the two
/// in-tree implementations (`FakeVenueAdapter`, `SandboxVenueAdapter`) stand in for
/// them in tests and in `--sandbox` runs.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue_id(&self) -> &VenueId;

    /// Last cached fee schedule; falls back to the previous value on transport
    /// failure rather than erroring.
    fn cached_fees(&self) -> FeeSchedule;

    /// Returns `None` if the book for `symbol` is missing or stale.
    async fn order_book(&self, symbol: &Symbol, depth: usize) -> Option<OrderBook>;

    /// Last cached balances; never blocks on a network round trip.
    fn cached_balances(&self) -> Vec<Balance>;

    /// Authoritative balances, refreshed from the venue. Falls back to the cached
    /// value on transport failure rather than erroring.
    async fn balances(&self) -> Vec<Balance>;

    async fn place_market_buy(&self, symbol: &Symbol, quantity: Decimal) -> VenueResult<OrderResponse>;
    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> VenueResult<OrderResponse>;
    async fn place_limit_buy(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> VenueResult<OrderResponse>;
    async fn place_limit_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> VenueResult<OrderResponse>;

    async fn order_status(&self, order_id: &str) -> VenueResult<OrderInfo>;
    async fn cancel(&self, order_id: &str) -> VenueResult<bool>;

    async fn withdrawal_fee(&self, asset: &str) -> VenueResult<Decimal>;
    async fn deposit_address(&self, asset: &str) -> VenueResult<Option<String>>;
    async fn withdraw(
        &self,
        asset: &str,
        amount: Decimal,
        address: &str,
        network: Option<&str>,
    ) -> VenueResult<String>;
}
