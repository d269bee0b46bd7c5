use crate::coalescing::CoalescingSignalChannel;
use crate::streams::{
    execution_result_stream, safety_event_stream, strategy_update_stream, SafetyEvent,
    StrategyUpdate,
};
use spotarb_core::{Opportunity, Transaction};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Owns every stream that connects detection, dispatch, execution, inventory and
/// safety to one another. `BookRegistry`'s market-update broadcast stream is not
/// duplicated here: it is produced and owned by the book crate, and DetectionService
/// subscribes to it directly.
pub struct ChannelHub {
    pub trade_signals: Arc<CoalescingSignalChannel<Opportunity>>,
    pub passive_rebalance_signals: Arc<CoalescingSignalChannel<Opportunity>>,
    execution_results_tx: mpsc::UnboundedSender<Transaction>,
    execution_results_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<Transaction>>>,
    safety_events_tx: mpsc::UnboundedSender<SafetyEvent>,
    safety_events_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<SafetyEvent>>>,
    strategy_updates_tx: watch::Sender<StrategyUpdate>,
}

impl ChannelHub {
    pub fn new(initial_strategy_update: StrategyUpdate) -> Self {
        let (execution_results_tx, execution_results_rx) = execution_result_stream();
        let (safety_events_tx, safety_events_rx) = safety_event_stream();
        let (strategy_updates_tx, _) = strategy_update_stream(initial_strategy_update);
        Self {
            trade_signals: Arc::new(CoalescingSignalChannel::new()),
            passive_rebalance_signals: Arc::new(CoalescingSignalChannel::new()),
            execution_results_tx,
            execution_results_rx: parking_lot::Mutex::new(Some(execution_results_rx)),
            safety_events_tx,
            safety_events_rx: parking_lot::Mutex::new(Some(safety_events_rx)),
            strategy_updates_tx,
        }
    }

    pub fn execution_results_sender(&self) -> mpsc::UnboundedSender<Transaction> {
        self.execution_results_tx.clone()
    }

    /// Takes ownership of the execution-result receiver. Panics if called twice:
    /// there is exactly one consumer of this stream in the engine.
    pub fn take_execution_results_receiver(&self) -> mpsc::UnboundedReceiver<Transaction> {
        self.execution_results_rx
            .lock()
            .take()
            .expect("execution results receiver already taken")
    }

    pub fn safety_events_sender(&self) -> mpsc::UnboundedSender<SafetyEvent> {
        self.safety_events_tx.clone()
    }

    pub fn take_safety_events_receiver(&self) -> mpsc::UnboundedReceiver<SafetyEvent> {
        self.safety_events_rx
            .lock()
            .take()
            .expect("safety events receiver already taken")
    }

    pub fn strategy_updates_sender(&self) -> watch::Sender<StrategyUpdate> {
        self.strategy_updates_tx.clone()
    }

    pub fn subscribe_strategy_updates(&self) -> watch::Receiver<StrategyUpdate> {
        self.strategy_updates_tx.subscribe()
    }
}
