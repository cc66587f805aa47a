//! Chat delivery boundary.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

pub const CONSOLE_ROOM: &str = "console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub room_id: String,
    pub sender: String,
    pub event_id: String,
    pub body: String,
    pub server_timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub room_id: String,
    /// Event id of the message being answered.
    pub in_reply_to: String,
    pub body: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Next inbound event, or `None` once the transport is closed.
    /// Must be cancel-safe: the bot loop polls it inside `select!`.
    async fn next_message(&self) -> CoreResult<Option<InboundMessage>>;

    async fn send_reply(&self, reply: OutboundReply) -> CoreResult<()>;
}

/// Line-oriented transport over stdin/stdout, one room.
pub struct ConsoleTransport {
    sender: String,
    lines: Mutex<Lines<BufReader<Stdin>>>,
    stdout: Mutex<Stdout>,
}

impl ConsoleTransport {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn next_message(&self) -> CoreResult<Option<InboundMessage>> {
        let mut lines = self.lines.lock().await;
        loop {
            let Some(line) = lines.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(InboundMessage {
                room_id: CONSOLE_ROOM.to_string(),
                sender: self.sender.clone(),
                event_id: format!("${}", Uuid::new_v4()),
                body: line,
                server_timestamp_ms: chrono::Utc::now().timestamp_millis(),
            }));
        }
    }

    async fn send_reply(&self, reply: OutboundReply) -> CoreResult<()> {
        let mut stdout = self.stdout.lock().await;
        let text = format!("{}\n", reply.body);
        stdout
            .write_all(text.as_bytes())
            .await
            .map_err(|error| CoreError::Io(format!("failed to write reply: {error}")))?;
        stdout
            .flush()
            .await
            .map_err(|error| CoreError::Io(format!("failed to flush reply: {error}")))?;
        Ok(())
    }
}
