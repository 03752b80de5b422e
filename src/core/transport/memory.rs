//! In-memory transport
//!
//! A connector wired to a [`MemoryHost`] through channels. The host side
//! scripts records and inspects what the session sent.

use super::{Connector, Endpoint, HostReader, HostWriter, TransportError, TransportPair, TransportType};
use crate::core::screen::Dimensions;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

type Channels = (mpsc::UnboundedReceiver<Bytes>, mpsc::UnboundedSender<Bytes>);

/// Connector that attaches to an in-memory host once
#[derive(Debug)]
pub struct MemoryConnector {
    channels: Mutex<Option<Channels>>,
    refuse: Option<String>,
}

impl MemoryConnector {
    /// Connector whose every attempt fails with the given reason
    pub fn refusing(reason: &str) -> Self {
        Self {
            channels: Mutex::new(None),
            refuse: Some(reason.to_string()),
        }
    }
}

/// Scriptable host end of an in-memory connection
#[derive(Debug)]
pub struct MemoryHost {
    to_session: Option<mpsc::UnboundedSender<Bytes>>,
    from_session: mpsc::UnboundedReceiver<Bytes>,
}

/// Create a connected connector / host pair
pub fn memory_pair() -> (MemoryConnector, MemoryHost) {
    let (to_session, session_rx) = mpsc::unbounded_channel();
    let (session_tx, from_session) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            channels: Mutex::new(Some((session_rx, session_tx))),
            refuse: None,
        },
        MemoryHost {
            to_session: Some(to_session),
            from_session,
        },
    )
}

impl MemoryHost {
    /// Queue a record for the session. Records sent before the session
    /// connects are delivered once it does.
    pub fn send_record(&self, record: impl Into<Bytes>) -> Result<(), TransportError> {
        let tx = self.to_session.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(record.into()).map_err(|_| TransportError::Disconnected)
    }

    /// Next record the session sent, or `None` once it hung up
    pub async fn next_sent(&mut self) -> Option<Bytes> {
        self.from_session.recv().await
    }

    /// Record the session sent, if one is already waiting
    pub fn try_next_sent(&mut self) -> Option<Bytes> {
        self.from_session.try_recv().ok()
    }

    /// Close the host side; the session sees end of stream
    pub fn close(&mut self) {
        self.to_session = None;
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, endpoint: &Endpoint, dims: Dimensions) -> Result<TransportPair, TransportError> {
        if let Some(reason) = &self.refuse {
            return Err(TransportError::ConnectionFailed(reason.clone()));
        }
        let (rx, tx) = self
            .channels
            .lock()
            .take()
            .ok_or_else(|| TransportError::ConnectionFailed("memory host already attached".into()))?;
        debug!("Attached memory host as {} ({})", endpoint, dims);
        Ok(TransportPair {
            reader: Box::new(MemoryReader { rx }),
            writer: Box::new(MemoryWriter { tx: Some(tx) }),
            info: format!("memory://{endpoint}"),
        })
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

#[async_trait]
impl HostReader for MemoryReader {
    async fn receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

struct MemoryWriter {
    tx: Option<mpsc::UnboundedSender<Bytes>>,
}

#[async_trait]
impl HostWriter for MemoryWriter {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Disconnected)?;
        tx.send(Bytes::copy_from_slice(data))
            .map_err(|_| TransportError::Disconnected)?;
        Ok(data.len())
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_host() {
        let (connector, mut host) = memory_pair();
        host.send_record(vec![0x04, 0x40]).unwrap();

        let mut pair = connector
            .connect(&Endpoint::new("demo", 23), Dimensions::MODEL_2)
            .await
            .unwrap();
        assert_eq!(pair.reader.receive().await.unwrap().unwrap(), Bytes::from_static(&[0x04, 0x40]));

        pair.writer.send(&[0xC1]).await.unwrap();
        assert_eq!(host.next_sent().await.unwrap(), Bytes::from_static(&[0xC1]));

        host.close();
        assert!(pair.reader.receive().await.unwrap().is_none());

        pair.writer.shutdown().await.unwrap();
        assert!(host.next_sent().await.is_none());
    }

    #[tokio::test]
    async fn test_single_attach_and_refusal() {
        let (connector, _host) = memory_pair();
        let endpoint = Endpoint::new("demo", 23);
        connector.connect(&endpoint, Dimensions::MODEL_2).await.unwrap();
        assert!(connector.connect(&endpoint, Dimensions::MODEL_2).await.is_err());

        let refusing = MemoryConnector::refusing("no route");
        let err = refusing.connect(&endpoint, Dimensions::MODEL_2).await.unwrap_err();
        assert!(err.to_string().contains("no route"));
    }
}
