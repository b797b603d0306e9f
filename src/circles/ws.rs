use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{protocol::{ClientEvent, ServerEvent}, session::Session, AppState};

#[debug_handler(state = crate::AppState)]
pub async fn circle_ws(
    State(app): State<AppState>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve(app, stream))
}

async fn serve(app: AppState, stream: WebSocket) {
    let (mut sender, mut receiver) = stream.split();
    let (outbox, mut inbox) = mpsc::channel::<Arc<ServerEvent>>(app.config.outbox_capacity);

    let mut session = Session::new(app, outbox);
    let connection = session.connection();
    info!(%connection, "connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let text = match serde_json::to_string(&*event) {
                Ok(text) => text,
                Err(err) => {
                    warn!(%connection, "failed to encode event: {err}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let Some(Ok(frame)) = frame else {
                    break;
                };
                let decoded = match frame {
                    WsMessage::Close(_) => break,
                    WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
                    frame => serde_json::from_slice::<ClientEvent>(&frame.into_data()),
                };

                match decoded {
                    Ok(event) => session.handle(event),
                    Err(err) => debug!(%connection, "dropped frame: {err}"),
                }
            }
            _ = &mut writer => break,
        }
    }

    session.disconnect();
    drop(session);
    writer.abort();
    info!(%connection, "disconnected");
}
