use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use crate::protocol::{Identity, MemberView, NoticeKind, RejectReason, ReplySnapshot, ServerEvent};

use super::{history::RingHistory, msg::Message};

pub type ConnectionId = Uuid;

/// Per-connection sink. Events are shared between every member they fan out to.
///
/// The channel is bounded; a member whose queue is full when a circle event
/// is fanned out is dropped from the circle.
pub type Outbox = mpsc::Sender<Arc<ServerEvent>>;

#[derive(Debug)]
struct Member {
    identity: Identity,
    avatar: String,
    outbox: Outbox,
    ordinal: u64,
}

impl Member {
    fn view(&self) -> MemberView {
        MemberView {
            nickname: self.identity.nickname.clone(),
            flair: self.identity.flair.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

#[derive(Debug)]
struct CircleState {
    members: HashMap<ConnectionId, Member>,
    history: RingHistory,
    next_seq: u64,
    next_ordinal: u64,
    closed: bool,
}

impl CircleState {
    fn member_views(&self) -> Vec<MemberView> {
        let mut members: Vec<&Member> = self.members.values().collect();
        members.sort_by_key(|m| m.ordinal);
        members.into_iter().map(Member::view).collect()
    }

    fn broadcast(&mut self, event: ServerEvent) {
        let event = Arc::new(event);
        let mut lagging = Vec::new();
        for (connection, member) in &self.members {
            // a closed outbox belongs to a connection that is already tearing down
            if let Err(TrySendError::Full(_)) = member.outbox.try_send(Arc::clone(&event)) {
                lagging.push(*connection);
            }
        }

        if !lagging.is_empty() {
            self.evict(lagging);
        }
    }

    fn evict(&mut self, lagging: Vec<ConnectionId>) {
        let mut nicknames = Vec::with_capacity(lagging.len());
        for connection in lagging {
            if let Some(member) = self.members.remove(&connection) {
                warn!(
                    %connection,
                    nickname = %member.identity.nickname,
                    "outbox full, member dropped"
                );
                nicknames.push(member.identity.nickname);
            }
        }

        if self.members.is_empty() {
            self.closed = true;
            return;
        }

        let members = self.member_views();
        self.broadcast(ServerEvent::MemberList { members });
        for nickname in nicknames {
            self.broadcast(ServerEvent::SystemNotice { kind: NoticeKind::Leave, nickname });
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined {
        history: Vec<Message>,
        members: Vec<MemberView>,
    },
    Rejected(RejectReason),
    /// The circle lost its last member and is waiting to be deregistered.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    NotMember,
    Left { nickname: String, now_empty: bool },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PostError {
    #[error("connection {0} is not a member of this circle")]
    NotAMember(ConnectionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircleStats {
    pub id: String,
    pub members: usize,
    pub messages: usize,
}

/// One chat namespace: its members and its recent history.
///
/// All state sits behind a single lock, so `join`, `leave` and `post` on the
/// same circle are serialized, and fan-out happens before the lock is
/// released. Every member therefore sees a circle's events in one order.
#[derive(Debug)]
pub struct Circle {
    id: String,
    state: Mutex<CircleState>,
}

impl Circle {
    pub fn new(id: impl Into<String>, history_capacity: usize) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(CircleState {
                members: HashMap::new(),
                history: RingHistory::new(history_capacity),
                next_seq: 0,
                next_ordinal: 0,
                closed: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, CircleState> {
        // no operation panics between mutations, so the state is usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admits `connection` unless another member holds the nickname under a
    /// different client token. On success the caller's outbox receives the
    /// history, then every member (caller included) receives the member list
    /// and a join notice.
    pub fn join(
        &self,
        connection: ConnectionId,
        identity: Identity,
        avatar: String,
        outbox: Outbox,
    ) -> JoinOutcome {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.closed {
            return JoinOutcome::Closed;
        }

        let taken = state.members.iter().any(|(id, m)| {
            *id != connection
                && m.identity.nickname == identity.nickname
                && m.identity.client_token != identity.client_token
        });
        if taken {
            return JoinOutcome::Rejected(RejectReason::NicknameInUse);
        }

        let history = state.history.snapshot();
        let _ = outbox.try_send(Arc::new(ServerEvent::HistorySnapshot {
            messages: history.clone(),
        }));

        let nickname = identity.nickname.clone();
        let ordinal = match state.members.get(&connection) {
            Some(existing) => existing.ordinal,
            None => {
                state.next_ordinal += 1;
                state.next_ordinal
            }
        };
        state.members.insert(connection, Member { identity, avatar, outbox, ordinal });

        let members = state.member_views();
        state.broadcast(ServerEvent::MemberList { members: members.clone() });
        state.broadcast(ServerEvent::SystemNotice { kind: NoticeKind::Join, nickname });

        JoinOutcome::Joined { history, members }
    }

    /// Removes `connection`. The last leave closes the circle; no further
    /// joins are admitted and the caller should deregister it.
    pub fn leave(&self, connection: ConnectionId) -> LeaveOutcome {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(member) = state.members.remove(&connection) else {
            return LeaveOutcome::NotMember;
        };
        let nickname = member.identity.nickname;

        if state.members.is_empty() {
            state.closed = true;
            return LeaveOutcome::Left { nickname, now_empty: true };
        }

        let members = state.member_views();
        state.broadcast(ServerEvent::MemberList { members });
        state.broadcast(ServerEvent::SystemNotice {
            kind: NoticeKind::Leave,
            nickname: nickname.clone(),
        });
        // fan-out may have dropped the remaining members
        LeaveOutcome::Left { nickname, now_empty: state.closed }
    }

    /// Appends a message and fans it out to every member, the author included.
    /// A `reply_to_id` that is no longer in history is dropped silently.
    pub fn post(
        &self,
        connection: ConnectionId,
        text: String,
        style: Value,
        reply_to_id: Option<&str>,
    ) -> Result<Message, PostError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(author) = state.members.get(&connection) else {
            return Err(PostError::NotAMember(connection));
        };

        let reply_to = reply_to_id
            .and_then(|id| state.history.by_id(id))
            .map(ReplySnapshot::of);
        let message = Message::compose(
            state.next_seq,
            &author.identity,
            &author.avatar,
            text,
            style,
            reply_to,
        );

        state.next_seq += 1;
        state.history.append(message.clone());
        state.broadcast(ServerEvent::Message(message.clone()));
        Ok(message)
    }

    pub fn members(&self) -> Vec<MemberView> {
        self.lock().member_views()
    }

    pub fn history(&self) -> Vec<Message> {
        self.lock().history.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn stats(&self) -> CircleStats {
        let state = self.lock();
        CircleStats {
            id: self.id.clone(),
            members: state.members.len(),
            messages: state.history.len(),
        }
    }
}
