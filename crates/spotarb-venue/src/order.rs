use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    Filled,
    PartiallyFilled,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Failed | Self::Cancelled)
    }

    pub fn has_any_fill(self) -> bool {
        matches!(self, Self::Filled | Self::PartiallyFilled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// The immediate response to a placement call. A transport error or a venue
/// rejection both surface here as `status: Failed` with a diagnostic `message` —
/// adapters never raise for these cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Decimal>,
    pub message: Option<String>,
}

impl OrderResponse {
    pub fn filled(order_id: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::Filled,
            executed_quantity: quantity,
            average_price: Some(price),
            message: None,
        }
    }

    pub fn partially_filled(
        order_id: impl Into<String>,
        executed_quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::PartiallyFilled,
            executed_quantity,
            average_price: Some(price),
            message: None,
        }
    }

    pub fn failed(order_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::Failed,
            executed_quantity: Decimal::ZERO,
            average_price: None,
            message: Some(message.into()),
        }
    }
}

/// The result of polling an order that has already been placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub order_id: String,
    pub status: OrderStatus,
    pub executed_quantity: Decimal,
    pub average_price: Option<Decimal>,
}
