use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::protocol::{Identity, ReplySnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// UUIDv7, so ids sort by creation time.
    pub id: String,
    /// Position in the circle's message sequence, starting at 0.
    pub seq: u64,
    pub author_nickname: String,
    pub author_flair: String,
    pub avatar: String,
    pub text: String,
    pub style: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub reply_to: Option<ReplySnapshot>,
}

impl Message {
    pub(crate) fn compose(
        seq: u64,
        author: &Identity,
        avatar: &str,
        text: String,
        style: Value,
        reply_to: Option<ReplySnapshot>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            seq,
            author_nickname: author.nickname.clone(),
            author_flair: author.flair.clone(),
            avatar: avatar.to_owned(),
            text,
            style,
            timestamp: OffsetDateTime::now_utc(),
            reply_to,
        }
    }
}
