//! RCON client — framed text console protocol over TCP.
//!
//! Source-RCON framing, little-endian: `[length:i32][id:i32][type:i32]`
//! followed by the body and two NUL terminators. The client authenticates
//! once, then exchanges command/response text pairs. The protocol carries
//! no sequence correlation at this layer, so the first response after a
//! command is treated as its reply; callers must keep at most one request
//! outstanding, and the client rejects a second one outright.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use rcb_types::config::RconConfig;

// Packet types on the wire. Request and response namespaces overlap: exec
// requests and auth acknowledgements share the value 2.
const TYPE_AUTH: i32 = 3;
const TYPE_EXEC: i32 = 2;
const TYPE_AUTH_RESPONSE: i32 = 2;
const TYPE_RESPONSE_VALUE: i32 = 0;

/// Upper bound on an inbound frame; anything larger is a protocol error.
const MAX_FRAME: i32 = 1_048_576;

#[derive(Debug, Error)]
pub enum RconError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authentication rejected by server")]
    AuthFailed,
    #[error("malformed frame: {0}")]
    Protocol(String),
    #[error("another command is already awaiting its reply")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticated,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Remote console operations the dispatcher programs against.
#[async_trait]
pub trait RemoteConsole: Send + Sync {
    /// Issue a command and wait up to `timeout` for its single reply.
    ///
    /// `Ok(Some(body))` is the reply, which may legitimately be the empty
    /// string. `Ok(None)` is the no-reply sentinel: not connected, timed
    /// out, or the connection dropped while waiting. `Err(Busy)` means a
    /// request was already pending; the caller decides what that maps to.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<Option<String>, RconError>;

    /// Fire-and-forget command; dropped (and logged) when not connected.
    async fn notify(&self, command: &str);
}

// ─── Packet codec ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Packet {
    id: i32,
    kind: i32,
    body: String,
}

async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> std::io::Result<()> {
    let body = packet.body.as_bytes();
    // id + type + body + two NULs
    let len = (body.len() + 10) as i32;
    let mut frame = Vec::with_capacity(body.len() + 14);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&packet.id.to_le_bytes());
    frame.extend_from_slice(&packet.kind.to_le_bytes());
    frame.extend_from_slice(body);
    frame.extend_from_slice(&[0, 0]);
    writer.write_all(&frame).await?;
    writer.flush().await
}

async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Packet, RconError> {
    let mut head = [0u8; 4];
    reader.read_exact(&mut head).await?;
    let len = i32::from_le_bytes(head);
    if !(10..=MAX_FRAME).contains(&len) {
        return Err(RconError::Protocol(format!("frame length {len} out of range")));
    }
    let mut rest = vec![0u8; len as usize];
    reader.read_exact(&mut rest).await?;
    let id = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
    let kind = i32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
    let body = String::from_utf8_lossy(&rest[8..rest.len() - 2]).into_owned();
    Ok(Packet { id, kind, body })
}

// ─── Client ───────────────────────────────────────────────────────────────────

struct StateCell {
    state: ConnectionState,
    connected_at: Option<DateTime<Utc>>,
}

struct Shared {
    state: Mutex<StateCell>,
    /// The single outstanding request. Taking the sender resolves the
    /// waiter; dropping it resolves the waiter to the no-reply sentinel.
    pending: Mutex<Option<oneshot::Sender<String>>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let mut cell = self.state.lock().unwrap();
        cell.state = state;
        if state != ConnectionState::Authenticated {
            cell.connected_at = None;
        }
    }

    fn set_authenticated(&self) {
        let mut cell = self.state.lock().unwrap();
        cell.state = ConnectionState::Authenticated;
        cell.connected_at = Some(Utc::now());
    }
}

/// Client for one remote console connection.
///
/// Owns the connection state and the pending-request slot exclusively; no
/// other component touches the transport. There is no automatic reconnect:
/// after a failed [`connect`] or a dropped connection the caller decides
/// when to dial again.
///
/// [`connect`]: RconClient::connect
pub struct RconClient {
    config: RconConfig,
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicI32,
}

impl RconClient {
    pub fn new(config: RconConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(StateCell {
                    state: ConnectionState::Disconnected,
                    connected_at: None,
                }),
                pending: Mutex::new(None),
                writer: tokio::sync::Mutex::new(None),
            }),
            reader: Mutex::new(None),
            next_id: AtomicI32::new(1),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.lock().unwrap().state
    }

    /// When the current connection finished authenticating, if any.
    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().unwrap().connected_at
    }

    /// Dial the server and run the authentication exchange. On success the
    /// client transitions to `Authenticated` and starts its reader task; on
    /// any failure it transitions back to `Disconnected` and returns the
    /// cause.
    pub async fn connect(&self) -> Result<(), RconError> {
        self.disconnect().await;
        self.shared.set_state(ConnectionState::Connecting);

        let addr = (self.config.host.as_str(), self.config.port);
        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };
        let (mut read_half, mut write_half) = stream.into_split();

        let auth = Packet {
            id: self.next_id(),
            kind: TYPE_AUTH,
            body: self.config.password.clone(),
        };
        if let Err(e) = write_packet(&mut write_half, &auth).await {
            self.shared.set_state(ConnectionState::Disconnected);
            return Err(e.into());
        }

        // Some servers send an empty value packet before the auth ack.
        loop {
            let packet = match read_packet(&mut read_half).await {
                Ok(packet) => packet,
                Err(e) => {
                    self.shared.set_state(ConnectionState::Disconnected);
                    return Err(e);
                }
            };
            match packet.kind {
                TYPE_AUTH_RESPONSE if packet.id == -1 => {
                    self.shared.set_state(ConnectionState::Disconnected);
                    return Err(RconError::AuthFailed);
                }
                TYPE_AUTH_RESPONSE => break,
                TYPE_RESPONSE_VALUE => continue,
                other => {
                    self.shared.set_state(ConnectionState::Disconnected);
                    return Err(RconError::Protocol(format!(
                        "unexpected packet type {other} during auth"
                    )));
                }
            }
        }

        *self.shared.writer.lock().await = Some(write_half);
        self.shared.set_authenticated();
        let handle = tokio::spawn(read_loop(Arc::clone(&self.shared), read_half));
        *self.reader.lock().unwrap() = Some(handle);

        info!(host = %self.config.host, port = self.config.port, "rcon authenticated");
        Ok(())
    }

    /// Tear the connection down. Any pending request resolves to the
    /// no-reply sentinel.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.reader.lock().unwrap().take() {
            handle.abort();
        }
        *self.shared.writer.lock().await = None;
        let was_connected = self.state() == ConnectionState::Authenticated;
        self.shared.set_state(ConnectionState::Disconnected);
        self.shared.pending.lock().unwrap().take();
        if was_connected {
            info!("rcon disconnected");
        }
    }

    /// Issue a command and wait for its reply. See [`RemoteConsole::exec`].
    pub async fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, RconError> {
        if self.state() != ConnectionState::Authenticated {
            debug!(command, "exec skipped: not connected");
            return Ok(None);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock().unwrap();
            if pending.is_some() {
                warn!(command, "exec rejected: another request pending");
                return Err(RconError::Busy);
            }
            *pending = Some(tx);
        }

        let packet = Packet {
            id: self.next_id(),
            kind: TYPE_EXEC,
            body: command.to_string(),
        };
        if let Err(e) = self.write(&packet).await {
            warn!(command, "rcon write failed: {e}");
            self.shared.pending.lock().unwrap().take();
            self.disconnect().await;
            return Ok(None);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(body)) => Ok(Some(body)),
            Ok(Err(_)) => {
                debug!(command, "connection dropped while awaiting reply");
                Ok(None)
            }
            Err(_) => {
                warn!(
                    command,
                    timeout_ms = timeout.as_millis() as u64,
                    "no reply before timeout"
                );
                self.shared.pending.lock().unwrap().take();
                Ok(None)
            }
        }
    }

    /// Fire-and-forget command. See [`RemoteConsole::notify`].
    pub async fn notify(&self, command: &str) {
        if self.state() != ConnectionState::Authenticated {
            warn!(command, "notify dropped: not connected");
            return;
        }
        let packet = Packet {
            id: self.next_id(),
            kind: TYPE_EXEC,
            body: command.to_string(),
        };
        if let Err(e) = self.write(&packet).await {
            warn!(command, "rcon write failed: {e}");
            self.disconnect().await;
        }
    }

    async fn write(&self, packet: &Packet) -> Result<(), RconError> {
        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(w) => Ok(write_packet(w, packet).await?),
            None => Err(RconError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection is gone",
            ))),
        }
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::Relaxed) & i32::MAX
    }
}

#[async_trait]
impl RemoteConsole for RconClient {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<Option<String>, RconError> {
        RconClient::exec(self, command, timeout).await
    }

    async fn notify(&self, command: &str) {
        RconClient::notify(self, command).await;
    }
}

/// Drains response packets for the life of one connection. Resolves the
/// pending request with the first response after issuance; everything else
/// is protocol noise worth at most a debug line.
async fn read_loop(shared: Arc<Shared>, mut read_half: OwnedReadHalf) {
    loop {
        match read_packet(&mut read_half).await {
            Ok(packet) if packet.kind == TYPE_RESPONSE_VALUE => {
                let waiter = shared.pending.lock().unwrap().take();
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(packet.body);
                    }
                    None => {
                        if !packet.body.is_empty() {
                            debug!(body = %packet.body, "unsolicited rcon response");
                        }
                    }
                }
            }
            Ok(packet) => {
                debug!(kind = packet.kind, "ignoring non-response packet");
            }
            Err(RconError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                info!("rcon connection closed by server");
                break;
            }
            Err(e) => {
                warn!("rcon read failed: {e}");
                break;
            }
        }
    }

    // The connection is gone: reset state first so a waiter resolved below
    // already observes `Disconnected`, then fail the pending request by
    // dropping its sender.
    *shared.writer.lock().await = None;
    shared.set_state(ConnectionState::Disconnected);
    shared.pending.lock().unwrap().take();
}
