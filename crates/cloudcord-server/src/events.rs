//! In-process event channel.
//!
//! Services publish [`Event`]s through the narrow [`EventPublisher`]
//! capability. [`ChannelPublisher`] encodes each event as a JSON payload on
//! the queue configured for its kind and pushes it onto a bounded tokio mpsc
//! channel; [`EventConsumer`] drains that channel, decodes by queue name and
//! hands the event to an [`EventHandler`].
//!
//! Delivery is at-least-once: a handler failure keeps the delivery in a
//! consumer-local retry queue until `max_attempts` is reached, after which
//! it is logged and dropped.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cloudcord_shared::{Event, EventError};

use crate::chat::ConversationService;
use crate::config::QueueNames;
use crate::error::ServiceError;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Encode(#[from] EventError),

    #[error("Event channel closed")]
    Closed,
}

/// Capability to publish an event. Callers decide whether a failure matters.
#[async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &Event) -> Result<(), PublishError>;
}

/// Receives decoded events from the consumer loop.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: Event) -> Result<(), ServiceError>;
}

/// One encoded event in flight.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: Uuid,
    pub queue: String,
    pub body: Vec<u8>,
    /// 1 on first delivery.
    pub attempt: u32,
}

#[derive(Debug)]
enum BusCommand {
    Deliver(Delivery),
    Shutdown,
}

/// Create a connected publisher/consumer pair.
pub fn channel(
    queues: QueueNames,
    capacity: usize,
    max_attempts: u32,
) -> (ChannelPublisher, EventConsumer) {
    let (tx, rx) = mpsc::channel(capacity);
    let consumer = EventConsumer {
        rx,
        retries: VecDeque::new(),
        queues: queues.clone(),
        max_attempts: max_attempts.max(1),
    };
    (ChannelPublisher { tx, queues }, consumer)
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<BusCommand>,
    queues: QueueNames,
}

impl ChannelPublisher {
    /// Ask the consumer to stop once everything queued so far is handled.
    pub async fn shutdown(&self) {
        if self.tx.send(BusCommand::Shutdown).await.is_err() {
            debug!("Event consumer already stopped");
        }
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let delivery = Delivery {
            id: Uuid::new_v4(),
            queue: self.queues.queue_for(event.kind()).to_string(),
            body: event.to_payload()?,
            attempt: 1,
        };

        debug!(id = %delivery.id, queue = %delivery.queue, "Publishing event");

        self.tx
            .send(BusCommand::Deliver(delivery))
            .await
            .map_err(|_| PublishError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

pub struct EventConsumer {
    rx: mpsc::Receiver<BusCommand>,
    /// Failed deliveries waiting for another attempt. Handled before new
    /// deliveries and independent of free space in the channel.
    retries: VecDeque<Delivery>,
    queues: QueueNames,
    max_attempts: u32,
}

impl EventConsumer {
    /// Consume until [`ChannelPublisher::shutdown`] is called or every
    /// publisher is dropped.
    pub async fn run(mut self, handler: Arc<dyn EventHandler>) {
        info!("Event consumer started");

        loop {
            if let Some(delivery) = self.retries.pop_front() {
                self.process(delivery, handler.as_ref()).await;
                continue;
            }

            match self.rx.recv().await {
                Some(BusCommand::Deliver(delivery)) => {
                    self.process(delivery, handler.as_ref()).await
                }
                Some(BusCommand::Shutdown) => {
                    self.drain(handler.as_ref()).await;
                    break;
                }
                None => break,
            }
        }

        info!("Event consumer stopped");
    }

    /// Handle whatever is still queued, including redeliveries it produces.
    async fn drain(&mut self, handler: &dyn EventHandler) {
        loop {
            if let Some(delivery) = self.retries.pop_front() {
                self.process(delivery, handler).await;
                continue;
            }
            match self.rx.try_recv() {
                Ok(BusCommand::Deliver(delivery)) => self.process(delivery, handler).await,
                Ok(BusCommand::Shutdown) => {}
                Err(_) => break,
            }
        }
    }

    async fn process(&mut self, delivery: Delivery, handler: &dyn EventHandler) {
        let Some(kind) = self.queues.kind_of(&delivery.queue) else {
            let err = EventError::UnknownQueue(delivery.queue.clone());
            warn!(id = %delivery.id, error = %err, "Dropping delivery");
            return;
        };

        let event = match Event::from_payload(kind, &delivery.body) {
            Ok(event) => event,
            Err(e) => {
                warn!(id = %delivery.id, error = %e, "Dropping undecodable delivery");
                return;
            }
        };

        match handler.handle(event).await {
            Ok(()) => {
                debug!(id = %delivery.id, %kind, attempt = delivery.attempt, "Event handled");
            }
            Err(e) if delivery.attempt < self.max_attempts => {
                warn!(
                    id = %delivery.id,
                    %kind,
                    attempt = delivery.attempt,
                    error = %e,
                    "Event handler failed, requeueing"
                );
                self.retries.push_back(Delivery {
                    attempt: delivery.attempt + 1,
                    ..delivery
                });
            }
            Err(e) => {
                error!(
                    id = %delivery.id,
                    %kind,
                    attempts = delivery.attempt,
                    error = %e,
                    "Event handler failed, giving up"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes consumed events to the services that own them.
pub struct Dispatcher {
    conversations: ConversationService,
}

impl Dispatcher {
    pub fn new(conversations: ConversationService) -> Self {
        Self { conversations }
    }
}

#[async_trait]
impl EventHandler for Dispatcher {
    async fn handle(&self, event: Event) -> Result<(), ServiceError> {
        match event {
            Event::AccountDeleted(deleted) => {
                self.conversations
                    .purge_participant(&deleted.external_identity)
                    .await?;
            }
            Event::MessageNotification(notification) => {
                info!(
                    receiver_id = %notification.receiver_id,
                    message = %notification.message,
                    "Notification delivered"
                );
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------
