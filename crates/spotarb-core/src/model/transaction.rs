use super::Opportunity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Success,
    Partial,
    Failed,
    Recovered,
}

impl TransactionStatus {
    /// Terminal non-success outcomes that count toward the consecutive-loss streak.
    pub fn is_loss(self) -> bool {
        matches!(self, Self::Failed | Self::Partial)
    }

    pub fn is_terminal(self) -> bool {
        true
    }
}

/// The record of one executor call. Immutable once `status` is terminal; every
/// `Transaction` produced by the executor already has a terminal status, so in
/// practice these are write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub opportunity: Opportunity,
    pub created_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub realized_profit: Decimal,
    pub notes: String,
}

impl Transaction {
    pub fn new(
        opportunity: Opportunity,
        created_at: DateTime<Utc>,
        status: TransactionStatus,
        realized_profit: Decimal,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: opportunity.id,
            opportunity,
            created_at,
            status,
            realized_profit,
            notes: notes.into(),
        }
    }
}
