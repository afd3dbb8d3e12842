//! Inbound transaction subscription over NATS.
//!
//! The subscription surfaces as a plain payload stream so the stream
//! worker stays broker-agnostic and testable against channel-backed
//! streams.

use anyhow::Result;
use async_nats::Client;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::info;

pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subject-bound stream of raw message payloads. The stream ends
    /// when the subscription is closed by the server or the connection
    /// drops.
    pub async fn payloads(&self) -> Result<impl Stream<Item = Bytes> + Unpin> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber.map(|message| message.payload))
    }
}
