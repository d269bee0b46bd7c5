use parking_lot::Mutex;
use spotarb_core::Symbol;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// A bounded, per-symbol last-writer-wins queue. Publishing a value for a symbol
/// that already has one pending silently replaces it rather than growing a backlog,
/// which is the behavior `TradeSignalStream` and `PassiveRebalanceSignalStream` need:
/// a reader that falls behind should see the newest signal for a symbol, not a
/// stale queue of superseded ones. Capacity is bounded by the number of distinct
/// symbols with a pending signal, which is inherently small (the trading universe),
/// so no separate size cap is enforced.
pub struct CoalescingSignalChannel<T> {
    pending: Mutex<HashMap<Symbol, T>>,
    notify: Notify,
}

impl<T> Default for CoalescingSignalChannel<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            notify: Notify::new(),
        }
    }
}

impl<T> CoalescingSignalChannel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any value already pending for `symbol`.
    pub fn publish(&self, symbol: Symbol, value: T) {
        self.pending.lock().insert(symbol, value);
        self.notify.notify_one();
    }

    /// Returns one pending value if any is available, without waiting.
    pub fn try_recv(&self) -> Option<(Symbol, T)> {
        let mut pending = self.pending.lock();
        let key = pending.keys().next().cloned()?;
        pending.remove_entry(&key)
    }

    /// Waits until at least one value is pending, then returns it.
    pub async fn recv(&self) -> (Symbol, T) {
        loop {
            if let Some(item) = self.try_recv() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub type SharedCoalescingChannel<T> = Arc<CoalescingSignalChannel<T>>;
