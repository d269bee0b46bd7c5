use crate::adapter::VenueAdapter;
use crate::error::{VenueError, VenueResult};
use crate::order::{OrderInfo, OrderResponse, OrderStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use spotarb_core::{Balance, FeeSchedule, OrderBook, Symbol, VenueId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// A deterministic, fully in-memory `VenueAdapter` used throughout the test suite
/// (and by `SandboxVenueAdapter`) in place of a real exchange client. Every
/// placement call consumes the next response from a scripted FIFO queue so a test
/// can dictate exact fills, partial fills, and failures without timing races.
pub struct FakeVenueAdapter {
    venue_id: VenueId,
    books: RwLock<HashMap<Symbol, OrderBook>>,
    fees: RwLock<FeeSchedule>,
    balances: RwLock<Vec<Balance>>,
    scripted_orders: RwLock<VecDeque<VenueResult<OrderResponse>>>,
    orders: RwLock<HashMap<String, OrderInfo>>,
    withdrawal_fees: RwLock<HashMap<String, Decimal>>,
    deposit_addresses: RwLock<HashMap<String, String>>,
    next_order_seq: AtomicU64,
}

impl FakeVenueAdapter {
    pub fn new(venue_id: impl Into<VenueId>, fees: FeeSchedule) -> Self {
        Self {
            venue_id: venue_id.into(),
            books: RwLock::new(HashMap::new()),
            fees: RwLock::new(fees),
            balances: RwLock::new(Vec::new()),
            scripted_orders: RwLock::new(VecDeque::new()),
            orders: RwLock::new(HashMap::new()),
            withdrawal_fees: RwLock::new(HashMap::new()),
            deposit_addresses: RwLock::new(HashMap::new()),
            next_order_seq: AtomicU64::new(1),
        }
    }

    pub fn set_book(&self, symbol: Symbol, book: OrderBook) {
        self.books.write().insert(symbol, book);
    }

    pub fn set_balances(&self, balances: Vec<Balance>) {
        *self.balances.write() = balances;
    }

    pub fn set_withdrawal_fee(&self, asset: impl Into<String>, fee: Decimal) {
        self.withdrawal_fees.write().insert(asset.into(), fee);
    }

    pub fn set_deposit_address(&self, asset: impl Into<String>, address: impl Into<String>) {
        self.deposit_addresses
            .write()
            .insert(asset.into(), address.into());
    }

    /// Queues a response to be returned by the next `place_*` call, in order.
    pub fn push_order_response(&self, response: VenueResult<OrderResponse>) {
        self.scripted_orders.write().push_back(response);
    }

    fn next_order_id(&self) -> String {
        let seq = self.next_order_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-fake-{seq}", self.venue_id.as_str())
    }

    fn place(&self) -> VenueResult<OrderResponse> {
        let mut queue = self.scripted_orders.write();
        let response = queue.pop_front().unwrap_or_else(|| {
            Ok(OrderResponse::failed(
                self.next_order_id(),
                "no scripted order response queued",
            ))
        });
        if let Ok(ok) = &response {
            self.orders.write().insert(
                ok.order_id.clone(),
                OrderInfo {
                    order_id: ok.order_id.clone(),
                    status: ok.status,
                    executed_quantity: ok.executed_quantity,
                    average_price: ok.average_price,
                },
            );
        }
        response
    }
}

#[async_trait]
impl VenueAdapter for FakeVenueAdapter {
    fn venue_id(&self) -> &VenueId {
        &self.venue_id
    }

    fn cached_fees(&self) -> FeeSchedule {
        *self.fees.read()
    }

    async fn order_book(&self, symbol: &Symbol, _depth: usize) -> Option<OrderBook> {
        self.books.read().get(symbol).cloned()
    }

    fn cached_balances(&self) -> Vec<Balance> {
        self.balances.read().clone()
    }

    async fn balances(&self) -> Vec<Balance> {
        self.balances.read().clone()
    }

    async fn place_market_buy(&self, _symbol: &Symbol, _quantity: Decimal) -> VenueResult<OrderResponse> {
        self.place()
    }

    async fn place_market_sell(&self, _symbol: &Symbol, _quantity: Decimal) -> VenueResult<OrderResponse> {
        self.place()
    }

    async fn place_limit_buy(
        &self,
        _symbol: &Symbol,
        _quantity: Decimal,
        _price: Decimal,
    ) -> VenueResult<OrderResponse> {
        self.place()
    }

    async fn place_limit_sell(
        &self,
        _symbol: &Symbol,
        _quantity: Decimal,
        _price: Decimal,
    ) -> VenueResult<OrderResponse> {
        self.place()
    }

    async fn order_status(&self, order_id: &str) -> VenueResult<OrderInfo> {
        self.orders
            .read()
            .get(order_id)
            .cloned()
            .ok_or_else(|| VenueError::Transport(format!("unknown order {order_id}")))
    }

    async fn cancel(&self, order_id: &str) -> VenueResult<bool> {
        let mut orders = self.orders.write();
        match orders.get_mut(order_id) {
            Some(info) if !info.status.is_terminal() => {
                info.status = OrderStatus::Cancelled;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(VenueError::Transport(format!("unknown order {order_id}"))),
        }
    }

    async fn withdrawal_fee(&self, asset: &str) -> VenueResult<Decimal> {
        self.withdrawal_fees
            .read()
            .get(asset)
            .copied()
            .ok_or(VenueError::NotSupported)
    }

    async fn deposit_address(&self, asset: &str) -> VenueResult<Option<String>> {
        Ok(self.deposit_addresses.read().get(asset).cloned())
    }

    async fn withdraw(
        &self,
        _asset: &str,
        _amount: Decimal,
        _address: &str,
        _network: Option<&str>,
    ) -> VenueResult<String> {
        Ok(self.next_order_id())
    }
}
