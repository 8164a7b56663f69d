//! Websocket link to the relay server.
//!
//! DESIGN
//! ======
//! The socket is split once connected. A writer task drains an outbound
//! queue; a reader task decodes inbound frames and either completes a
//! pending request (matched by `parent_id`) or hands the frame to the
//! inbound stream. Requests resolve on the server's `done` or `error` reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use frames::{Body, Frame, Participant, SessionOp, Status, Token};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::CliError;

const OUTBOUND_CAPACITY: usize = 256;
const INBOUND_CAPACITY: usize = 256;
const WELCOME_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Frame>>>>;

/// Who to connect as.
#[derive(Debug, Clone)]
pub struct Identity {
    pub room: String,
    pub user: String,
    pub name: String,
    pub gm: bool,
}

/// Room snapshot received on connect.
#[derive(Debug, Clone)]
pub struct Welcome {
    pub participant: Participant,
    pub participants: Vec<Participant>,
    pub tokens: Vec<Token>,
}

pub struct Link {
    out: mpsc::Sender<Frame>,
    pending: Pending,
}

pub struct Connected {
    pub link: Arc<Link>,
    pub welcome: Welcome,
    /// Frames that are not replies to our own requests.
    pub inbound: mpsc::Receiver<Frame>,
}

/// Build the websocket URL for `identity` from an `http(s)://` base URL.
///
/// # Errors
///
/// `InvalidBaseUrl` if the base is not an http or https URL.
pub fn ws_url(base_url: &str, identity: &Identity) -> Result<String, CliError> {
    let invalid = || CliError::InvalidBaseUrl(base_url.to_owned());
    let mut url = reqwest::Url::parse(base_url).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|()| invalid())?;
    url.set_path("/api/ws");
    url.query_pairs_mut()
        .clear()
        .append_pair("room", &identity.room)
        .append_pair("user", &identity.user)
        .append_pair("name", &identity.name)
        .append_pair("role", if identity.gm { "gm" } else { "player" });
    Ok(url.into())
}

/// Connect, wait for the welcome, and start the reader and writer tasks.
///
/// # Errors
///
/// Fails if the socket cannot be opened or the first frame is not a welcome.
pub async fn connect(url: &str) -> Result<Connected, CliError> {
    let (stream, _) = connect_async(url).await?;
    let (mut sink, mut source) = stream.split();

    let first = recv_next(&mut source, WELCOME_TIMEOUT).await?;
    let welcome = match first.body()? {
        Body::Session(SessionOp::Welcome { participant, participants, tokens }) => {
            Welcome { participant, participants, tokens }
        }
        _ => return Err(CliError::UnexpectedFrame(first.syscall)),
    };
    info!(user_id = %welcome.participant.id, tokens = welcome.tokens.len(), "link: connected");

    let (out_tx, mut out_rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(Message::Binary(frames::encode_frame(&frame).into())).await {
                warn!(error = %e, "link: send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let pending = Pending::default();
    let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);
    tokio::spawn(read_loop(source, pending.clone(), in_tx));

    Ok(Connected { link: Arc::new(Link { out: out_tx, pending }), welcome, inbound: in_rx })
}

impl Link {
    /// Queue a frame without waiting for a reply.
    ///
    /// # Errors
    ///
    /// `WsClosed` once the writer task has stopped.
    pub async fn send(&self, frame: Frame) -> Result<(), CliError> {
        self.out.send(frame).await.map_err(|_| CliError::WsClosed)
    }

    /// Send a frame and wait for the server's terminal reply.
    ///
    /// # Errors
    ///
    /// `ServerError` when the server rejects the frame, `Timeout` if no reply
    /// arrives in time, `WsClosed` if the link drops first.
    pub async fn request(&self, frame: Frame) -> Result<Frame, CliError> {
        let (tx, rx) = oneshot::channel();
        let id = frame.id.clone();
        lock(&self.pending).insert(id.clone(), tx);

        if let Err(e) = self.send(frame).await {
            lock(&self.pending).remove(&id);
            return Err(e);
        }

        let reply = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(CliError::WsClosed),
            Err(_) => {
                lock(&self.pending).remove(&id);
                return Err(CliError::Timeout);
            }
        };

        if reply.status == Status::Error {
            let field = |key: &str| reply.data.get(key).and_then(Value::as_str).unwrap_or("-").to_owned();
            return Err(CliError::ServerError { syscall: reply.syscall.clone(), code: field("code"), message: field("message") });
        }
        Ok(reply)
    }
}

async fn read_loop(mut source: SplitStream<WsStream>, pending: Pending, inbound: mpsc::Sender<Frame>) {
    loop {
        let frame = match recv_frame(&mut source).await {
            Ok(frame) => frame,
            Err(CliError::Decode(e)) => {
                warn!(error = %e, "link: undecodable frame skipped");
                continue;
            }
            Err(e) => {
                info!(error = %e, "link: reader stopped");
                break;
            }
        };

        let waiter = frame.parent_id.as_ref().and_then(|parent| lock(&pending).remove(parent));
        if let Some(waiter) = waiter {
            let _ = waiter.send(frame);
            continue;
        }

        debug!(syscall = %frame.syscall, "link: inbound frame");
        if inbound.send(frame).await.is_err() {
            break;
        }
    }
    // Dropping the waiters fails their requests with `WsClosed`.
    lock(&pending).clear();
}

async fn recv_next(source: &mut SplitStream<WsStream>, timeout: Duration) -> Result<Frame, CliError> {
    tokio::time::timeout(timeout, recv_frame(source)).await.map_err(|_| CliError::Timeout)?
}

async fn recv_frame(source: &mut SplitStream<WsStream>) -> Result<Frame, CliError> {
    loop {
        let Some(message) = source.next().await else {
            return Err(CliError::WsClosed);
        };
        match message? {
            Message::Binary(bytes) => return frames::decode_frame(&bytes).map_err(CliError::from),
            Message::Close(_) => return Err(CliError::WsClosed),
            _ => {}
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "link_test.rs"]
mod tests;
