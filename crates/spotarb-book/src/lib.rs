//! The per-venue, per-symbol order book registry (component C2). Books are
//! push-updated by venue adapters; each write publishes the updated symbol onto a
//! `broadcast` channel so `DetectionService` (and anything else interested) learns
//! which symbol changed without polling. `broadcast`'s native lagged-receiver
//! behavior gives the "drop-oldest on overflow" policy required of market-update
//! streams for free — a slow reader skips forward to the oldest still-buffered
//! update instead of blocking the writer.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use spotarb_core::{OrderBook, Symbol, VenueId};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default staleness window: a book older than this is treated as absent.
pub const DEFAULT_STALENESS: chrono::Duration = chrono::Duration::milliseconds(2000);

const MARKET_UPDATE_CAPACITY: usize = 1024;

/// Maps `(venue, symbol) -> OrderBook`. Reads are lock-free with respect to writes on
/// other keys: the registry shards storage behind a single `RwLock`, but held time
/// per operation is a map lookup/insert, never an await — callers never hold the
/// guard across a suspension point.
pub struct BookRegistry {
    books: RwLock<HashMap<(VenueId, Symbol), OrderBook>>,
    staleness: chrono::Duration,
    market_update_tx: broadcast::Sender<Symbol>,
}

impl BookRegistry {
    pub fn new(staleness: chrono::Duration) -> Self {
        let (market_update_tx, _rx) = broadcast::channel(MARKET_UPDATE_CAPACITY);
        Self {
            books: RwLock::new(HashMap::new()),
            staleness,
            market_update_tx,
        }
    }

    pub fn with_default_staleness() -> Self {
        Self::new(DEFAULT_STALENESS)
    }

    /// Subscribe to the market-update stream. Every `update` publishes the symbol
    /// whose book changed to every currently-subscribed receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Symbol> {
        self.market_update_tx.subscribe()
    }

    /// Push-updates the book for `(venue, symbol)` and publishes the update.
    pub fn update(&self, venue: VenueId, symbol: Symbol, book: OrderBook) {
        self.books.write().insert((venue, symbol.clone()), book);
        // No active subscriber is not an error: nothing downstream wants updates yet.
        let _ = self.market_update_tx.send(symbol);
    }

    /// Reads the book for `(venue, symbol)` if present and not stale as of `now`.
    pub fn get(&self, venue: &VenueId, symbol: &Symbol, now: DateTime<Utc>) -> Option<OrderBook> {
        let books = self.books.read();
        let book = books.get(&(venue.clone(), symbol.clone()))?;
        if book.is_stale(now, self.staleness) {
            None
        } else {
            Some(book.clone())
        }
    }

    /// Reads the non-stale book for `symbol` on every venue that has one.
    pub fn get_all_venues(&self, symbol: &Symbol, now: DateTime<Utc>) -> HashMap<VenueId, OrderBook> {
        let books = self.books.read();
        books
            .iter()
            .filter(|((_, s), _)| s == symbol)
            .filter(|(_, book)| !book.is_stale(now, self.staleness))
            .map(|((venue, _), book)| (venue.clone(), book.clone()))
            .collect()
    }
}
