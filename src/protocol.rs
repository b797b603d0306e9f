//! JSON events exchanged over a circle websocket.
//!
//! Every frame is an object tagged by `type`. Field names are camelCase.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::circles::Message;

pub const DEFAULT_AVATAR: &str = "👤";

/// Client-asserted identity, fixed for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub nickname: String,
    pub flair: String,
    pub client_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySnapshot {
    pub author_nickname: String,
    pub text: String,
}

impl ReplySnapshot {
    pub fn of(message: &Message) -> Self {
        Self {
            author_nickname: message.author_nickname.clone(),
            text: message.text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberView {
    pub nickname: String,
    pub flair: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Join,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    #[serde(rename = "nickname-in-use")]
    NicknameInUse,
    #[serde(rename = "nickname-invalid")]
    NicknameInvalid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    Join(JoinRequest),
    Send(SendRequest),
    Leave,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub nickname: String,
    #[serde(default)]
    pub flair: String,
    pub client_token: String,
    #[serde(default)]
    pub circle: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub text: String,
    /// Formatting bag (font, size, weight, colour). Never inspected.
    #[serde(default = "empty_style")]
    pub style: Value,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

fn empty_style() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    JoinRejected { reason: RejectReason },
    HistorySnapshot { messages: Vec<Message> },
    MemberList { members: Vec<MemberView> },
    SystemNotice { kind: NoticeKind, nickname: String },
    Message(Message),
}
