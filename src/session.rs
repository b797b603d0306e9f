//! Per-connection state machine binding a transport connection to a circle.
//!
//! `Unjoined -> Joined -> Terminated`. Events that make no sense in the
//! current phase are dropped without a reply.

use std::{mem, sync::Arc};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    circles::{Circle, ConnectionId, JoinOutcome, LeaveOutcome, Outbox},
    protocol::{
        ClientEvent, DEFAULT_AVATAR, Identity, JoinRequest, RejectReason, SendRequest, ServerEvent,
    },
    AppState,
};

#[derive(Debug)]
enum Phase {
    Unjoined,
    Joined(Arc<Circle>),
    Terminated,
}

#[derive(Debug)]
pub struct Session {
    connection: ConnectionId,
    app: AppState,
    outbox: Outbox,
    phase: Phase,
}

impl Session {
    pub fn new(app: AppState, outbox: Outbox) -> Self {
        Self {
            connection: Uuid::now_v7(),
            app,
            outbox,
            phase: Phase::Unjoined,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// The circle this connection is bound to, while joined.
    pub fn circle(&self) -> Option<&Arc<Circle>> {
        match &self.phase {
            Phase::Joined(circle) => Some(circle),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Terminated)
    }

    pub fn handle(&mut self, event: ClientEvent) {
        match (&self.phase, event) {
            (Phase::Unjoined, ClientEvent::Join(request)) => self.join(request),
            (Phase::Joined(circle), ClientEvent::Send(request)) => self.send(circle, request),
            (Phase::Joined(_), ClientEvent::Leave) => self.disconnect(),
            (_, event) => {
                debug!(connection = %self.connection, ?event, "event ignored in current phase")
            }
        }
    }

    fn join(&mut self, request: JoinRequest) {
        let nickname = request.nickname.trim();
        if nickname.is_empty() {
            self.deliver(ServerEvent::JoinRejected { reason: RejectReason::NicknameInvalid });
            return;
        }

        let identity = Identity {
            nickname: nickname.to_owned(),
            flair: request.flair.trim().to_owned(),
            client_token: request.client_token,
        };
        let avatar = request
            .avatar
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_owned());
        let circle_id = request
            .circle
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| self.app.config.default_circle.clone());

        loop {
            let circle = self.app.registry.get_or_create(&circle_id);
            let outcome =
                circle.join(self.connection, identity.clone(), avatar.clone(), self.outbox.clone());
            match outcome {
                JoinOutcome::Joined { members, .. } => {
                    info!(
                        connection = %self.connection,
                        circle = %circle_id,
                        nickname = %identity.nickname,
                        members = members.len(),
                        "joined"
                    );
                    self.phase = Phase::Joined(circle);
                    return;
                }
                JoinOutcome::Rejected(reason) => {
                    warn!(
                        connection = %self.connection,
                        circle = %circle_id,
                        nickname = %identity.nickname,
                        ?reason,
                        "join rejected"
                    );
                    self.deliver(ServerEvent::JoinRejected { reason });
                    return;
                }
                // lost a race with the last leaver; the registry hands out a fresh circle next time
                JoinOutcome::Closed => continue,
            }
        }
    }

    fn send(&self, circle: &Circle, SendRequest { text, style, reply_to_id }: SendRequest) {
        if text.trim().is_empty() {
            return;
        }

        match circle.post(self.connection, text, style, reply_to_id.as_deref()) {
            Ok(message) => debug!(
                connection = %self.connection,
                circle = circle.id(),
                id = %message.id,
                seq = message.seq,
                "message posted"
            ),
            Err(err) => debug!(connection = %self.connection, "post dropped: {err}"),
        }
    }

    /// Leaves the bound circle, deregistering it if it is now empty. Safe to
    /// call more than once; every event after this is ignored.
    pub fn disconnect(&mut self) {
        let Phase::Joined(circle) = mem::replace(&mut self.phase, Phase::Terminated) else {
            return;
        };

        match circle.leave(self.connection) {
            LeaveOutcome::Left { nickname, now_empty } => {
                info!(connection = %self.connection, circle = circle.id(), %nickname, "left");
                if now_empty {
                    self.app.registry.remove(circle.id());
                }
            }
            // dropped for a full outbox; that may have emptied the circle
            LeaveOutcome::NotMember => {
                if circle.is_closed() {
                    self.app.registry.remove(circle.id());
                }
            }
        }
    }

    fn deliver(&self, event: ServerEvent) {
        let _ = self.outbox.try_send(Arc::new(event));
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}
