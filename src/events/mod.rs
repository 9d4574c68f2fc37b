use crate::services::{commerce::order_materializer::MaterializedLine, notifications::OrderNotifier};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events published after state has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// An order was materialized from an approved payment.
    SaleApproved {
        user_id: i32,
        order_id: i32,
        total: Decimal,
        lines: Vec<MaterializedLine>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a bounded channel and its sender
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queues an event without waiting. A full or closed channel is logged, never surfaced.
    pub fn send_or_log(&self, event: Event) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                counter!("storefront_events.dropped", 1);
                warn!(?event, "Event channel full; dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                counter!("storefront_events.dropped", 1);
                warn!(?event, "Event channel closed; dropping event");
            }
        }
    }
}

/// Drains the channel until every sender is gone.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<OrderNotifier>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!(?event, "Received event");
        match event {
            Event::SaleApproved {
                user_id,
                order_id,
                total,
                lines,
            } => notifier.notify(user_id, order_id, total, &lines).await,
        }
    }

    info!("Event channel closed; event processing stopped");
}
