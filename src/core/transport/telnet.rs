//! TN5250 telnet transport
//!
//! Telnet (RFC 854) with the options a 5250 host expects: TERMINAL-TYPE,
//! END-OF-RECORD and BINARY. Everything else is declined. Host records are
//! delimited by `IAC EOR`; `IAC` bytes inside records are doubled.

use super::{Connector, Endpoint, HostReader, HostWriter, TransportError, TransportPair, TransportType};
use crate::core::screen::Dimensions;
use async_trait::async_trait;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, info};

// Telnet protocol constants
const IAC: u8 = 255; // Interpret As Command
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250; // Subnegotiation Begin
const SE: u8 = 240; // Subnegotiation End
const EOR: u8 = 239; // End Of Record marker

const OPT_BINARY: u8 = 0;
const OPT_TERMINAL_TYPE: u8 = 24;
const OPT_END_OF_RECORD: u8 = 25;

const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

const SUPPORTED: [u8; 3] = [OPT_BINARY, OPT_TERMINAL_TYPE, OPT_END_OF_RECORD];

/// One decoded telnet unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetFrame {
    /// Data up to `IAC EOR`, unescaped
    Record(Bytes),
    /// `IAC DO/DONT/WILL/WONT option`
    Command {
        /// DO, DONT, WILL or WONT
        verb: u8,
        /// Option code
        option: u8,
    },
    /// `IAC SB option data IAC SE`
    Subnegotiation {
        /// Option code
        option: u8,
        /// Payload, unescaped
        data: Bytes,
    },
}

/// Telnet framing codec
#[derive(Debug, Default)]
pub struct TelnetCodec {
    record: BytesMut,
}

fn put_escaped(dst: &mut BytesMut, data: &[u8]) {
    for &byte in data {
        if byte == IAC {
            dst.put_u8(IAC);
        }
        dst.put_u8(byte);
    }
}

fn unescape(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        out.put_u8(data[i]);
        i += if data[i] == IAC && data.get(i + 1) == Some(&IAC) { 2 } else { 1 };
    }
    out.freeze()
}

impl Decoder for TelnetCodec {
    type Item = TelnetFrame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TelnetFrame>, std::io::Error> {
        loop {
            if src.is_empty() {
                return Ok(None);
            }
            if src[0] != IAC {
                let n = src.iter().position(|&b| b == IAC).unwrap_or(src.len());
                self.record.extend_from_slice(&src.split_to(n));
                continue;
            }
            if src.len() < 2 {
                return Ok(None);
            }

            match src[1] {
                IAC => {
                    src.advance(2);
                    self.record.put_u8(IAC);
                }
                EOR => {
                    src.advance(2);
                    return Ok(Some(TelnetFrame::Record(self.record.split().freeze())));
                }
                DO | DONT | WILL | WONT => {
                    if src.len() < 3 {
                        return Ok(None);
                    }
                    let verb = src[1];
                    let option = src[2];
                    src.advance(3);
                    return Ok(Some(TelnetFrame::Command { verb, option }));
                }
                SB => {
                    // Find IAC SE, stepping over doubled IACs in the payload
                    let mut end = None;
                    let mut j = 3;
                    while j + 1 < src.len() {
                        if src[j] == IAC {
                            if src[j + 1] == SE {
                                end = Some(j);
                                break;
                            }
                            j += 2;
                        } else {
                            j += 1;
                        }
                    }
                    let Some(end) = end else {
                        return Ok(None);
                    };
                    let option = src[2];
                    let data = unescape(&src[3..end]);
                    src.advance(end + 2);
                    return Ok(Some(TelnetFrame::Subnegotiation { option, data }));
                }
                // NOP, GA and friends carry nothing for us
                _ => src.advance(2),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<TelnetFrame>, std::io::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // A record cut off by the close is never delivered
        src.clear();
        self.record.clear();
        Ok(None)
    }
}

impl Encoder<TelnetFrame> for TelnetCodec {
    type Error = std::io::Error;

    fn encode(&mut self, frame: TelnetFrame, dst: &mut BytesMut) -> Result<(), std::io::Error> {
        match frame {
            TelnetFrame::Record(data) => {
                dst.reserve(data.len() + 2);
                put_escaped(dst, &data);
                dst.put_slice(&[IAC, EOR]);
            }
            TelnetFrame::Command { verb, option } => dst.put_slice(&[IAC, verb, option]),
            TelnetFrame::Subnegotiation { option, data } => {
                dst.put_slice(&[IAC, SB, option]);
                put_escaped(dst, &data);
                dst.put_slice(&[IAC, SE]);
            }
        }
        Ok(())
    }
}

/// Telnet connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelnetConfig {
    /// Terminal type to announce; derived from the screen size when unset
    pub terminal_type: Option<String>,
    /// Bound on TCP connect plus option negotiation
    pub connect_timeout: Duration,
}

impl TelnetConfig {
    /// Create a new Telnet configuration
    pub fn new() -> Self {
        Self {
            terminal_type: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set terminal type
    #[must_use]
    pub fn terminal_type(mut self, term_type: &str) -> Self {
        self.terminal_type = Some(term_type.to_string());
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Terminal type announced for a screen size
    pub fn terminal_type_for(&self, dims: Dimensions) -> String {
        self.terminal_type.clone().unwrap_or_else(|| {
            if dims == Dimensions::MODEL_5 {
                "IBM-3477-FC".to_string()
            } else {
                "IBM-3179-2".to_string()
            }
        })
    }
}

impl Default for TelnetConfig {
    fn default() -> Self {
        Self::new()
    }
}

type TelnetFramed = Framed<TcpStream, TelnetCodec>;

/// Connector for TN5250 hosts
#[derive(Debug, Clone, Default)]
pub struct TelnetConnector {
    config: TelnetConfig,
}

impl TelnetConnector {
    /// Create a connector
    pub fn new(config: TelnetConfig) -> Self {
        Self { config }
    }

    async fn open(&self, endpoint: &Endpoint, terminal_type: &str) -> Result<TransportPair, TransportError> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{endpoint}: {e}")))?;
        stream.set_nodelay(true).map_err(TransportError::IoError)?;

        let mut framed = Framed::new(stream, TelnetCodec::default());
        let first = negotiate(&mut framed, terminal_type).await?;
        info!("Negotiated TN5250 session with {} as {}", endpoint, terminal_type);

        let (sink, stream) = framed.split();
        Ok(TransportPair {
            reader: Box::new(TelnetReader {
                stream,
                pending: Some(first),
            }),
            writer: Box::new(TelnetWriter { sink }),
            info: format!("telnet://{endpoint}"),
        })
    }
}

/// Answer option requests until the host sends its first record
async fn negotiate(framed: &mut TelnetFramed, terminal_type: &str) -> Result<Bytes, TransportError> {
    let mut local: HashSet<u8> = HashSet::new();
    let mut remote: HashSet<u8> = HashSet::new();

    loop {
        let frame = framed
            .next()
            .await
            .ok_or_else(|| TransportError::Negotiation("host closed the connection".into()))??;

        let reply = match frame {
            TelnetFrame::Record(data) => {
                if !local.contains(&OPT_END_OF_RECORD) {
                    return Err(TransportError::Negotiation(
                        "host sent a record before negotiating END-OF-RECORD".into(),
                    ));
                }
                return Ok(data);
            }
            TelnetFrame::Command { verb: DO, option } => {
                debug!("Host DO {}", option);
                if SUPPORTED.contains(&option) {
                    local.insert(option).then_some((WILL, option))
                } else {
                    Some((WONT, option))
                }
            }
            TelnetFrame::Command { verb: WILL, option } => {
                debug!("Host WILL {}", option);
                if option == OPT_BINARY || option == OPT_END_OF_RECORD {
                    remote.insert(option).then_some((DO, option))
                } else {
                    Some((DONT, option))
                }
            }
            TelnetFrame::Command { verb: DONT, option } => local.remove(&option).then_some((WONT, option)),
            TelnetFrame::Command { verb: WONT, option } => remote.remove(&option).then_some((DONT, option)),
            TelnetFrame::Command { .. } => None,
            TelnetFrame::Subnegotiation { option, data } => {
                if option == OPT_TERMINAL_TYPE && data.first() == Some(&TTYPE_SEND) {
                    debug!("Sending terminal type {}", terminal_type);
                    let mut payload = BytesMut::with_capacity(terminal_type.len() + 1);
                    payload.put_u8(TTYPE_IS);
                    payload.put_slice(terminal_type.as_bytes());
                    framed
                        .send(TelnetFrame::Subnegotiation {
                            option,
                            data: payload.freeze(),
                        })
                        .await?;
                } else {
                    debug!("Ignoring subnegotiation for option {}", option);
                }
                None
            }
        };

        if let Some((verb, option)) = reply {
            framed.send(TelnetFrame::Command { verb, option }).await?;
        }
    }
}

#[async_trait]
impl Connector for TelnetConnector {
    async fn connect(&self, endpoint: &Endpoint, dims: Dimensions) -> Result<TransportPair, TransportError> {
        let terminal_type = self.config.terminal_type_for(dims);
        let timeout = self.config.connect_timeout;
        tokio::time::timeout(timeout, self.open(endpoint, &terminal_type))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Telnet
    }
}

struct TelnetReader {
    stream: SplitStream<TelnetFramed>,
    pending: Option<Bytes>,
}

#[async_trait]
impl HostReader for TelnetReader {
    async fn receive(&mut self) -> Result<Option<Bytes>, TransportError> {
        if let Some(first) = self.pending.take() {
            return Ok(Some(first));
        }
        while let Some(frame) = self.stream.next().await {
            match frame? {
                TelnetFrame::Record(data) => return Ok(Some(data)),
                other => debug!("Ignoring telnet frame after negotiation: {:?}", other),
            }
        }
        Ok(None)
    }
}

struct TelnetWriter {
    sink: SplitSink<TelnetFramed, TelnetFrame>,
}

#[async_trait]
impl HostWriter for TelnetWriter {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.sink
            .send(TelnetFrame::Record(Bytes::copy_from_slice(data)))
            .await
            .map_err(|e| TransportError::SendError(e.to_string()))?;
        Ok(data.len())
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(TransportError::IoError)
    }
}
