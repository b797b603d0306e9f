#![allow(dead_code)]

use std::sync::Arc;

use mooncafe::{
    protocol::{ClientEvent, JoinRequest, SendRequest, ServerEvent},
    AppState, Session,
};
use serde_json::json;
use tokio::sync::mpsc::{self, Receiver};

pub struct Client {
    pub session: Session,
    pub rx: Receiver<Arc<ServerEvent>>,
}

impl Client {
    pub fn connect(app: &AppState) -> Self {
        let (tx, rx) = mpsc::channel(app.config.outbox_capacity);
        Self { session: Session::new(app.clone(), tx), rx }
    }

    pub fn join(&mut self, nickname: &str, token: &str, circle: &str) {
        self.session.handle(ClientEvent::Join(JoinRequest {
            nickname: nickname.to_owned(),
            flair: String::new(),
            client_token: token.to_owned(),
            circle: Some(circle.to_owned()),
            avatar: None,
        }));
    }

    pub fn send(&mut self, text: &str) {
        self.reply(text, None);
    }

    pub fn reply(&mut self, text: &str, reply_to_id: Option<&str>) {
        self.session.handle(ClientEvent::Send(SendRequest {
            text: text.to_owned(),
            style: json!({ "fontWeight": "bold" }),
            reply_to_id: reply_to_id.map(str::to_owned),
        }));
    }

    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push((*event).clone());
        }
        events
    }

    pub fn messages(&mut self) -> Vec<mooncafe::circles::Message> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}
