//! Event loop: filter inbound events, dispatch each in its own task, reply.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::config::BotConfig;
use crate::error::CoreError;
use crate::registry::Registry;
use crate::supervisor::RestartError;
use crate::transport::{ChatTransport, InboundMessage, OutboundReply};

#[derive(Debug, Error)]
pub enum BotError {
    #[error("transport failed: {0}")]
    Transport(#[from] CoreError),
    #[error("restart failed: {0}")]
    Restart(#[from] RestartError),
}

/// Decides which inbound events reach the registry.
#[derive(Debug, Clone)]
pub struct EventFilter {
    started_at_ms: i64,
    historical_skew_ms: i64,
    allowed_rooms: Vec<String>,
    own_user_id: String,
}

impl EventFilter {
    pub fn new(config: &BotConfig, started_at_ms: i64) -> Self {
        Self {
            started_at_ms,
            historical_skew_ms: i64::try_from(config.historical_skew_ms).unwrap_or(i64::MAX),
            allowed_rooms: config.allowed_rooms.clone(),
            own_user_id: config.user_id.clone(),
        }
    }

    pub fn accepts(&self, message: &InboundMessage) -> bool {
        if message.sender == self.own_user_id {
            return false;
        }
        let oldest = self.started_at_ms.saturating_sub(self.historical_skew_ms);
        if message.server_timestamp_ms < oldest {
            tracing::debug!("ignoring historical event {}", message.event_id);
            return false;
        }
        if !self.allowed_rooms.is_empty() && !self.allowed_rooms.contains(&message.room_id) {
            tracing::debug!("ignoring event from room {}", message.room_id);
            return false;
        }
        true
    }
}

pub struct Bot {
    registry: Arc<Registry>,
    transport: Arc<dyn ChatTransport>,
    filter: EventFilter,
}

impl Bot {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn ChatTransport>,
        filter: EventFilter,
    ) -> Self {
        Self {
            registry,
            transport,
            filter,
        }
    }

    /// Run until the transport closes or a restart fails. In-flight handlers
    /// are awaited when the transport closes.
    pub async fn run(
        &self,
        mut fatal: mpsc::UnboundedReceiver<RestartError>,
    ) -> Result<(), BotError> {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                message = self.transport.next_message() => {
                    match message? {
                        Some(message) if self.filter.accepts(&message) => {
                            tasks.spawn(deliver(
                                Arc::clone(&self.registry),
                                Arc::clone(&self.transport),
                                message,
                            ));
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                Some(error) = fatal.recv() => return Err(BotError::Restart(error)),
                Some(joined) = tasks.join_next() => log_task_outcome(joined),
            }
        }

        tracing::info!("transport closed, waiting for {} handlers", tasks.len());
        while let Some(joined) = tasks.join_next().await {
            log_task_outcome(joined);
        }
        Ok(())
    }
}

fn log_task_outcome(joined: Result<(), tokio::task::JoinError>) {
    if let Err(error) = joined {
        tracing::error!("message handler task failed: {error}");
    }
}

/// Dispatch one event. Handler errors are logged and never reach the loop.
async fn deliver(
    registry: Arc<Registry>,
    transport: Arc<dyn ChatTransport>,
    message: InboundMessage,
) {
    let reply = match registry.dispatch(&message.body).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!("command failed for event {}: {error}", message.event_id);
            return;
        }
    };
    let outbound = OutboundReply {
        room_id: message.room_id,
        in_reply_to: message.event_id,
        body: reply,
    };
    if let Err(error) = transport.send_reply(outbound).await {
        tracing::warn!("failed to send reply: {error}");
    }
}
