use spotarb_core::{Symbol, Transaction};
#[cfg(test)]
use spotarb_core::{Opportunity, TransactionStatus, VenueId};
use tokio::sync::{mpsc, watch};

/// A terminal state change published by the safety monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyEvent {
    Tripped { reason: String },
    Reset,
}

/// A threshold recomputation published by the adaptive strategy component.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyUpdate {
    pub symbol: Symbol,
    pub threshold_pct: rust_decimal::Decimal,
    pub reason: String,
}

/// Carries completed executions out of the executor. Unbounded: a dropped
/// transaction record is a bookkeeping hole the engine cannot afford, so this
/// stream never sheds load the way the signal channels do.
pub fn execution_result_stream() -> (mpsc::UnboundedSender<Transaction>, mpsc::UnboundedReceiver<Transaction>) {
    mpsc::unbounded_channel()
}

/// Carries safety state transitions (trip / reset) to anything that needs to
/// react immediately, such as a CLI status line or a dispatcher shortcut.
/// Unbounded for the same reason as the execution result stream: a missed
/// trip event could let trading continue when it shouldn't.
pub fn safety_event_stream() -> (mpsc::UnboundedSender<SafetyEvent>, mpsc::UnboundedReceiver<SafetyEvent>) {
    mpsc::unbounded_channel()
}

/// Publishes the current per-symbol trade threshold alongside change
/// notification. `watch` fits this better than `mpsc`: subscribers only ever
/// care about the latest threshold, never a history of past ones.
pub fn strategy_update_stream(initial: StrategyUpdate) -> (watch::Sender<StrategyUpdate>, watch::Receiver<StrategyUpdate>) {
    watch::channel(initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fixture_transaction() -> Transaction {
        let opportunity = Opportunity::new(
            Symbol::new("BTCUSDT"),
            "BTC",
            "USDT",
            VenueId::new("binance"),
            VenueId::new("kraken"),
            dec!(49500),
            dec!(51000),
            dec!(1),
            dec!(0.1),
            dec!(0.1),
            dec!(3.03),
            dec!(2.83),
            chrono::Utc::now(),
            false,
        );
        Transaction::new(opportunity, chrono::Utc::now(), TransactionStatus::Success, dec!(15), "ok")
    }

    #[tokio::test]
    async fn execution_result_stream_delivers_in_order() {
        let (tx, mut rx) = execution_result_stream();
        let first = fixture_transaction();
        let second = fixture_transaction();
        tx.send(first.clone()).unwrap();
        tx.send(second.clone()).unwrap();
        assert_eq!(rx.recv().await.unwrap().id, first.id);
        assert_eq!(rx.recv().await.unwrap().id, second.id);
    }

    #[tokio::test]
    async fn safety_event_stream_delivers_trip_then_reset() {
        let (tx, mut rx) = safety_event_stream();
        tx.send(SafetyEvent::Tripped { reason: "drawdown".into() }).unwrap();
        tx.send(SafetyEvent::Reset).unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            SafetyEvent::Tripped { reason: "drawdown".into() }
        );
        assert_eq!(rx.recv().await.unwrap(), SafetyEvent::Reset);
    }

    #[test]
    fn strategy_update_watch_reflects_latest_value() {
        let initial = StrategyUpdate {
            symbol: Symbol::new("BTCUSDT"),
            threshold_pct: dec!(0.5),
            reason: "initial".into(),
        };
        let (tx, rx) = strategy_update_stream(initial);
        tx.send(StrategyUpdate {
            symbol: Symbol::new("BTCUSDT"),
            threshold_pct: dec!(0.75),
            reason: "volatility up".into(),
        })
        .unwrap();
        assert_eq!(rx.borrow().threshold_pct, dec!(0.75));
    }
}
