use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single resting quantity at a price. Never constructed with a negative price or
/// quantity; callers that parse these from adapter wire data are responsible for
/// filtering negatives before reaching here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("crossed book: best bid {best_bid} >= best ask {best_ask}")]
pub struct CrossedBookError {
    pub best_bid: Decimal,
    pub best_ask: Decimal,
}

/// `bids` descending by price, `asks` ascending by price. Construction through
/// [`OrderBook::try_new`] is the only way to obtain one and enforces the
/// best-bid-less-than-best-ask invariant; a book that would violate it is rejected
/// rather than silently accepted (callers bump a "crossed book" metric and move on).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    pub last_update: DateTime<Utc>,
}

impl OrderBook {
    pub fn try_new(
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
        last_update: DateTime<Utc>,
    ) -> Result<Self, CrossedBookError> {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        if let (Some(best_bid), Some(best_ask)) = (bids.first(), asks.first()) {
            if best_bid.price >= best_ask.price {
                return Err(CrossedBookError {
                    best_bid: best_bid.price,
                    best_ask: best_ask.price,
                });
            }
        }
        Ok(Self {
            bids,
            asks,
            last_update,
        })
    }

    pub fn empty(last_update: DateTime<Utc>) -> Self {
        Self {
            bids: Vec::new(),
            asks: Vec::new(),
            last_update,
        }
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    pub fn is_stale(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        now - self.last_update > staleness
    }
}
