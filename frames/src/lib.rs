//! Shared frame model and protobuf codec for the shell-game relay.
//!
//! This crate owns the wire representation used by the `server`, the `cli`
//! and the core library. The envelope is encoded over protobuf for compact
//! binary transport; the body stays JSON so each channel can carry its own
//! tagged payload:
//!
//! | Syscall prefix | Body |
//! |---|---|
//! | `shell:` | [`ShellEvent`] ready-check control events |
//! | `scene:` | [`SceneOp`] token document changes and snapshots |
//! | `session:` | [`SessionOp`] presence, welcome and errors |
//!
//! Nothing should dispatch on `data` directly. [`Frame::body`] validates the
//! payload against the syscall and returns a typed [`Body`].

use std::time::{SystemTime, UNIX_EPOCH};

use prost::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Suffix appended to decoy token names.
pub const FAKE_SUFFIX: &str = " (Fake)";

/// Error returned by [`decode_frame`] and [`Frame::body`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The raw bytes could not be decoded as a protobuf `WireFrame`.
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The `status` integer on the wire does not map to a known [`Status`] variant.
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
    /// The syscall has no `prefix:op` shape or names an unknown channel.
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    /// The body's `type` tag disagrees with the syscall op.
    #[error("syscall `{syscall}` does not match body type `{body}`")]
    KindMismatch { syscall: String, body: &'static str },
    /// The JSON body does not deserialize into the channel's body type.
    #[error("invalid {channel} body: {source}")]
    InvalidBody {
        channel: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A required string field is empty.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),
}

/// Lifecycle status of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Event or request originated by a peer.
    Request,
    /// Successful reply correlated through `parent_id`.
    Done,
    /// Error reply correlated through `parent_id`.
    Error,
}

impl Status {
    /// Convert status into wire enum integer value.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Request => WireFrameStatus::Request as i32,
            Self::Done => WireFrameStatus::Done as i32,
            Self::Error => WireFrameStatus::Error as i32,
        }
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        match WireFrameStatus::try_from(value) {
            Ok(WireFrameStatus::Request) => Ok(Self::Request),
            Ok(WireFrameStatus::Done) => Ok(Self::Done),
            Ok(WireFrameStatus::Error) => Ok(Self::Error),
            Err(_) => Err(CodecError::InvalidStatus(value)),
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Session role of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Gm,
    Player,
}

/// A connected (or recently connected) user as reported by the session host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Participant {
    #[must_use]
    pub fn is_gm(&self) -> bool {
        self.role == Role::Gm
    }
}

fn default_true() -> bool {
    true
}

fn default_extent() -> f64 {
    100.0
}

/// A token document on the shared scene. `x`/`y` is the top-left corner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, rename = "playerOwned")]
    pub player_owned: bool,
}

impl Token {
    /// Center of the token's footprint in scene coordinates.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Whether the token is a decoy produced by the setup tool.
    #[must_use]
    pub fn is_fake(&self) -> bool {
        self.name.ends_with(FAKE_SUFFIX)
    }
}

// =============================================================================
// BODIES
// =============================================================================

/// A participant's answer to a ready check. `unknown` never travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyAnswer {
    Ready,
    No,
}

/// Ready-check control events fanned out by the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ShellEvent {
    StartCheck {
        #[serde(rename = "tokenName")]
        token_name: String,
    },
    Status {
        #[serde(rename = "userId")]
        user_id: String,
        status: ReadyAnswer,
    },
    CloseCheck,
    Countdown,
    ClearTargets,
}

impl ShellEvent {
    /// The `type` tag, also used as the syscall op.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StartCheck { .. } => "start-check",
            Self::Status { .. } => "status",
            Self::CloseCheck => "close-check",
            Self::Countdown => "countdown",
            Self::ClearTargets => "clear-targets",
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        match self {
            Self::StartCheck { token_name } if token_name.trim().is_empty() => Err(CodecError::EmptyField("tokenName")),
            Self::Status { user_id, .. } if user_id.is_empty() => Err(CodecError::EmptyField("userId")),
            _ => Ok(()),
        }
    }
}

/// Changes to the shared scene's token documents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SceneOp {
    TokenCreate {
        token: Token,
    },
    TokenUpdate {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elevation: Option<f64>,
        /// Animation length the renderer should use for the change.
        #[serde(default, rename = "animateMs")]
        animate_ms: u64,
    },
    TokenDelete {
        id: String,
    },
    /// Request for the full token list; the reply carries it.
    Snapshot {
        #[serde(default)]
        tokens: Vec<Token>,
    },
}

impl SceneOp {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenCreate { .. } => "token-create",
            Self::TokenUpdate { .. } => "token-update",
            Self::TokenDelete { .. } => "token-delete",
            Self::Snapshot { .. } => "snapshot",
        }
    }

    fn validate(&self) -> Result<(), CodecError> {
        let id = match self {
            Self::TokenCreate { token } => &token.id,
            Self::TokenUpdate { id, .. } | Self::TokenDelete { id } => id,
            Self::Snapshot { .. } => return Ok(()),
        };
        if id.is_empty() {
            return Err(CodecError::EmptyField("id"));
        }
        Ok(())
    }
}

/// Presence, welcome and error traffic between a client and the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionOp {
    /// First frame after connecting: who you are and what the room looks like.
    Welcome {
        participant: Participant,
        participants: Vec<Participant>,
        tokens: Vec<Token>,
    },
    Join {
        participant: Participant,
    },
    Part {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Error {
        code: String,
        message: String,
    },
}

impl SessionOp {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Join { .. } => "join",
            Self::Part { .. } => "part",
            Self::Error { .. } => "error",
        }
    }
}

/// A validated frame body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Shell(ShellEvent),
    Scene(SceneOp),
    Session(SessionOp),
}

// =============================================================================
// FRAME
// =============================================================================

/// A single message on the realtime wire protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Unique identifier for this frame (UUID string).
    pub id: String,
    /// ID of the frame this is replying to, if any.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch when the frame was created.
    pub ts: i64,
    /// Room the frame belongs to.
    pub room: Option<String>,
    /// Sender user id, stamped by the server.
    pub from: Option<String>,
    /// Namespaced operation name, e.g. `"shell:start-check"`.
    pub syscall: String,
    pub status: Status,
    /// JSON body, tagged with `type`.
    pub data: Value,
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame with a raw body.
    pub fn new(syscall: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            ts: now_ms(),
            room: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    #[must_use]
    pub fn shell(event: &ShellEvent) -> Self {
        Self::new(format!("shell:{}", event.kind()), serde_json::to_value(event).unwrap_or_default())
    }

    #[must_use]
    pub fn scene(op: &SceneOp) -> Self {
        Self::new(format!("scene:{}", op.kind()), serde_json::to_value(op).unwrap_or_default())
    }

    #[must_use]
    pub fn session(op: &SessionOp) -> Self {
        Self::new(format!("session:{}", op.kind()), serde_json::to_value(op).unwrap_or_default())
    }

    /// Build a `session:error` reply to this frame.
    #[must_use]
    pub fn error_reply(&self, code: &str, message: impl Into<String>) -> Self {
        let op = SessionOp::Error { code: code.to_owned(), message: message.into() };
        let mut reply = Self::session(&op);
        reply.parent_id = Some(self.id.clone());
        reply.room.clone_from(&self.room);
        reply.status = Status::Error;
        reply
    }

    /// Build a `done` reply to this frame on the same syscall.
    #[must_use]
    pub fn done_reply(&self, data: Value) -> Self {
        let mut reply = Self::new(self.syscall.clone(), data);
        reply.parent_id = Some(self.id.clone());
        reply.room.clone_from(&self.room);
        reply.status = Status::Done;
        reply
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Channel prefix of the syscall (`"shell"`, `"scene"`, ...).
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.syscall.split_once(':').map_or(self.syscall.as_str(), |(prefix, _)| prefix)
    }

    /// Validate and decode the body.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnknownSyscall`] for unknown channels,
    /// [`CodecError::InvalidBody`] when the JSON does not fit the channel,
    /// [`CodecError::KindMismatch`] when the body's `type` disagrees with the
    /// syscall, and [`CodecError::EmptyField`] for blank identifiers.
    pub fn body(&self) -> Result<Body, CodecError> {
        let Some((prefix, op)) = self.syscall.split_once(':') else {
            return Err(CodecError::UnknownSyscall(self.syscall.clone()));
        };
        match prefix {
            "shell" => {
                let event: ShellEvent = parse_body("shell", &self.data)?;
                self.check_kind(op, event.kind())?;
                event.validate()?;
                Ok(Body::Shell(event))
            }
            "scene" => {
                let scene_op: SceneOp = parse_body("scene", &self.data)?;
                self.check_kind(op, scene_op.kind())?;
                scene_op.validate()?;
                Ok(Body::Scene(scene_op))
            }
            "session" => {
                let session_op: SessionOp = parse_body("session", &self.data)?;
                self.check_kind(op, session_op.kind())?;
                Ok(Body::Session(session_op))
            }
            _ => Err(CodecError::UnknownSyscall(self.syscall.clone())),
        }
    }

    fn check_kind(&self, op: &str, kind: &'static str) -> Result<(), CodecError> {
        if op == kind {
            Ok(())
        } else {
            Err(CodecError::KindMismatch { syscall: self.syscall.clone(), body: kind })
        }
    }
}

fn parse_body<T: DeserializeOwned>(channel: &'static str, data: &Value) -> Result<T, CodecError> {
    serde_json::from_value(data.clone()).map_err(|source| CodecError::InvalidBody { channel, source })
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode a frame into protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let wire = WireFrame {
        id: frame.id.clone(),
        parent_id: frame.parent_id.clone(),
        ts: frame.ts,
        room: frame.room.clone(),
        from: frame.from.clone(),
        syscall: frame.syscall.clone(),
        status: frame.status.as_i32(),
        data: Some(json_to_proto(&frame.data)),
    };
    // Encoding into a growable Vec cannot run out of buffer.
    wire.encode_to_vec()
}

/// Decode protobuf bytes into a frame. The body is not validated here; call
/// [`Frame::body`] before dispatching.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed bytes and
/// [`CodecError::InvalidStatus`] for out-of-range status values.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let wire = WireFrame::decode(bytes)?;
    Ok(Frame {
        id: wire.id,
        parent_id: wire.parent_id,
        ts: wire.ts,
        room: wire.room,
        from: wire.from,
        syscall: wire.syscall,
        status: Status::from_i32(wire.status)?,
        data: wire.data.as_ref().map_or(Value::Object(Map::new()), proto_to_json),
    })
}

fn json_to_proto(value: &Value) -> prost_types::Value {
    use prost_types::value::Kind;

    let kind = match value {
        Value::Null => Kind::NullValue(prost_types::NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(*b),
        Value::Number(n) => Kind::NumberValue(n.as_f64().unwrap_or(0.0)),
        Value::String(s) => Kind::StringValue(s.clone()),
        Value::Array(items) => Kind::ListValue(prost_types::ListValue { values: items.iter().map(json_to_proto).collect() }),
        Value::Object(fields) => Kind::StructValue(prost_types::Struct {
            fields: fields.iter().map(|(k, v)| (k.clone(), json_to_proto(v))).collect(),
        }),
    };
    prost_types::Value { kind: Some(kind) }
}

fn proto_to_json(value: &prost_types::Value) -> Value {
    use prost_types::value::Kind;

    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::NumberValue(n)) => number_to_json(*n),
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(proto_to_json).collect()),
        Some(Kind::StructValue(st)) => Value::Object(st.fields.iter().map(|(k, v)| (k.clone(), proto_to_json(v))).collect()),
    }
}

/// Protobuf only carries doubles. Integral values come back as JSON integers
/// so `u64` fields such as `animateMs` still deserialize.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n >= 0.0 && n < u64::MAX as f64 {
        return Value::from(n as u64);
    }
    if n.fract() == 0.0 && n < 0.0 && n > i64::MIN as f64 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

#[derive(Clone, PartialEq, Message)]
struct WireFrame {
    #[prost(string, tag = "1")]
    id: String,
    #[prost(string, optional, tag = "2")]
    parent_id: Option<String>,
    #[prost(int64, tag = "3")]
    ts: i64,
    #[prost(string, optional, tag = "4")]
    room: Option<String>,
    #[prost(string, optional, tag = "5")]
    from: Option<String>,
    #[prost(string, tag = "6")]
    syscall: String,
    #[prost(enumeration = "WireFrameStatus", tag = "7")]
    status: i32,
    #[prost(message, optional, tag = "8")]
    data: Option<prost_types::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
enum WireFrameStatus {
    Request = 0,
    Done = 1,
    Error = 2,
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
