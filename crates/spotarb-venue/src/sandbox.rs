use crate::adapter::VenueAdapter;
use crate::error::VenueResult;
use crate::fake::FakeVenueAdapter;
use crate::order::{OrderInfo, OrderResponse};
use async_trait::async_trait;
use rust_decimal::Decimal;
use spotarb_core::{Balance, FeeSchedule, OrderBook, RandomSource, Symbol, ThreadRandomSource, VenueId};
use std::sync::Arc;
use std::time::Duration;

/// Stands in for a real exchange adapter running against that exchange's sandbox
/// environment. The choice between a live adapter and this one is made once at
/// construction time — there is no settable mode on a single adapter instance.
/// This wraps a [`FakeVenueAdapter`] rather than reimplementing the scripting
/// machinery; a real sandbox adapter would instead hold a REST/WebSocket client
/// pointed at the venue's sandbox host, which is out of scope here. Every call
/// pays an injected latency before delegating, and order placement additionally
/// rolls an injected failure rate, so dispatch/execution code exercised against
/// this adapter sees the same timing and rejection shapes it would against a
/// real exchange's sandbox.
pub struct SandboxVenueAdapter {
    inner: FakeVenueAdapter,
    latency: Duration,
    failure_rate: Decimal,
    random: Arc<dyn RandomSource>,
}

impl SandboxVenueAdapter {
    /// No injected latency or failures: a plain pass-through, for tests that
    /// only care about the scripted responses themselves.
    pub fn new(venue_id: impl Into<VenueId>, fees: FeeSchedule) -> Self {
        Self::with_latency(venue_id, fees, Duration::ZERO, Decimal::ZERO)
    }

    /// `failure_rate` is a probability in `[0, 1)`: the fraction of placement
    /// calls that are rejected without ever reaching the scripted queue.
    pub fn with_latency(
        venue_id: impl Into<VenueId>,
        fees: FeeSchedule,
        latency: Duration,
        failure_rate: Decimal,
    ) -> Self {
        Self {
            inner: FakeVenueAdapter::new(venue_id, fees),
            latency,
            failure_rate,
            random: Arc::new(ThreadRandomSource),
        }
    }

    pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn inner(&self) -> &FakeVenueAdapter {
        &self.inner
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Draws a `[0, 1)` fraction from the injected random source and compares it
    /// against `failure_rate`. A zero rate never fails, regardless of the draw.
    fn should_inject_failure(&self) -> bool {
        if self.failure_rate <= Decimal::ZERO {
            return false;
        }
        let draw = self.random.jitter(Duration::from_millis(1_000));
        let fraction = Decimal::from(draw.as_millis() as u64) / Decimal::from(1_000u64);
        fraction < self.failure_rate
    }

    fn injected_failure(&self) -> OrderResponse {
        OrderResponse::failed(
            format!("{}-sandbox-rejected", self.inner.venue_id().as_str()),
            "sandbox injected failure",
        )
    }
}

#[async_trait]
impl VenueAdapter for SandboxVenueAdapter {
    fn venue_id(&self) -> &VenueId {
        self.inner.venue_id()
    }

    fn cached_fees(&self) -> FeeSchedule {
        self.inner.cached_fees()
    }

    async fn order_book(&self, symbol: &Symbol, depth: usize) -> Option<OrderBook> {
        self.simulate_latency().await;
        self.inner.order_book(symbol, depth).await
    }

    fn cached_balances(&self) -> Vec<Balance> {
        self.inner.cached_balances()
    }

    async fn balances(&self) -> Vec<Balance> {
        self.simulate_latency().await;
        self.inner.balances().await
    }

    async fn place_market_buy(&self, symbol: &Symbol, quantity: Decimal) -> VenueResult<OrderResponse> {
        self.simulate_latency().await;
        if self.should_inject_failure() {
            return Ok(self.injected_failure());
        }
        self.inner.place_market_buy(symbol, quantity).await
    }

    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> VenueResult<OrderResponse> {
        self.simulate_latency().await;
        if self.should_inject_failure() {
            return Ok(self.injected_failure());
        }
        self.inner.place_market_sell(symbol, quantity).await
    }

    async fn place_limit_buy(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> VenueResult<OrderResponse> {
        self.simulate_latency().await;
        if self.should_inject_failure() {
            return Ok(self.injected_failure());
        }
        self.inner.place_limit_buy(symbol, quantity, price).await
    }

    async fn place_limit_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> VenueResult<OrderResponse> {
        self.simulate_latency().await;
        if self.should_inject_failure() {
            return Ok(self.injected_failure());
        }
        self.inner.place_limit_sell(symbol, quantity, price).await
    }

    async fn order_status(&self, order_id: &str) -> VenueResult<OrderInfo> {
        self.simulate_latency().await;
        self.inner.order_status(order_id).await
    }

    async fn cancel(&self, order_id: &str) -> VenueResult<bool> {
        self.simulate_latency().await;
        self.inner.cancel(order_id).await
    }

    async fn withdrawal_fee(&self, asset: &str) -> VenueResult<Decimal> {
        self.simulate_latency().await;
        self.inner.withdrawal_fee(asset).await
    }

    async fn deposit_address(&self, asset: &str) -> VenueResult<Option<String>> {
        self.simulate_latency().await;
        self.inner.deposit_address(asset).await
    }

    async fn withdraw(
        &self,
        asset: &str,
        amount: Decimal,
        address: &str,
        network: Option<&str>,
    ) -> VenueResult<String> {
        self.simulate_latency().await;
        self.inner.withdraw(asset, amount, address, network).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use spotarb_core::FixedRandomSource;

    fn fees() -> FeeSchedule {
        FeeSchedule::new(dec!(0.001), dec!(0.002), Utc::now())
    }

    #[tokio::test]
    async fn zero_failure_rate_always_delegates() {
        let venue = SandboxVenueAdapter::new("A", fees());
        venue
            .inner()
            .push_order_response(Ok(OrderResponse::filled("o1", dec!(1), dec!(100))));
        let response = venue
            .place_market_buy(&Symbol::new("BTCUSDT"), dec!(1))
            .await
            .unwrap();
        assert_eq!(response.order_id, "o1");
    }

    #[tokio::test]
    async fn full_failure_rate_always_rejects_before_the_scripted_queue() {
        let venue = SandboxVenueAdapter::with_latency("A", fees(), Duration::ZERO, Decimal::ONE)
            .with_random_source(Arc::new(FixedRandomSource(Duration::ZERO)));
        venue
            .inner()
            .push_order_response(Ok(OrderResponse::filled("o1", dec!(1), dec!(100))));

        let response = venue
            .place_market_buy(&Symbol::new("BTCUSDT"), dec!(1))
            .await
            .unwrap();

        assert_eq!(response.status, crate::order::OrderStatus::Failed);
        assert!(venue.inner().order_status("o1").await.is_err());
    }

    #[tokio::test]
    async fn injected_latency_delays_the_response() {
        let venue = SandboxVenueAdapter::with_latency(
            "A",
            fees(),
            Duration::from_millis(20),
            Decimal::ZERO,
        );
        venue
            .inner()
            .push_order_response(Ok(OrderResponse::filled("o1", dec!(1), dec!(100))));

        let start = tokio::time::Instant::now();
        venue
            .place_market_buy(&Symbol::new("BTCUSDT"), dec!(1))
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
