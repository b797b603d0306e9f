mod circle;
mod history;
mod msg;
mod registry;
mod ws;

use axum::{debug_handler, extract::{Path, State}, routing::{get, post}, Json, Router};
use rand::Rng;
use serde::Serialize;

use crate::{AppResult, AppError, AppState};

pub use circle::{Circle, CircleStats, ConnectionId, JoinOutcome, LeaveOutcome, Outbox, PostError};
pub use history::RingHistory;
pub use msg::Message;
pub use registry::Registry;

const CIRCLE_ID_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::circle_ws))
        .route("/circles", post(new_circle))
        .route("/circles/{id}", get(circle_stats))
}

#[derive(Debug, Serialize)]
pub(crate) struct NewCircle {
    id: String,
}

/// Hands out an unused-looking circle id (`circle-xxxxxxxxx`). Nothing is
/// allocated until somebody joins it.
#[debug_handler]
pub(crate) async fn new_circle() -> Json<NewCircle> {
    Json(NewCircle { id: fresh_circle_id() })
}

#[debug_handler]
pub(crate) async fn circle_stats(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CircleStats>> {
    let Some(circle) = app.registry.get(&id) else {
        return Err(AppError::not_found(format!("no circle named {id}")));
    };

    Ok(Json(circle.stats()))
}

fn fresh_circle_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..9)
        .map(|_| CIRCLE_ID_CHARS[rng.random_range(0..CIRCLE_ID_CHARS.len())] as char)
        .collect();
    format!("circle-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_have_the_circle_prefix() {
        let id = fresh_circle_id();
        assert!(id.starts_with("circle-"));
        assert_eq!(id.len(), "circle-".len() + 9);
        assert!(id["circle-".len()..].bytes().all(|b| CIRCLE_ID_CHARS.contains(&b)));
    }
}
