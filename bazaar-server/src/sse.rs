//! SSE log streaming: a thin poll-and-push proxy over the orchestrator's
//! log API. The stream ends after an error event; client disconnects drop
//! the stream and with it the polling.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream};
use uuid::Uuid;

use bazaar_core::JobKind;
use bazaar_security::AuthenticatedUser;

use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub fn log_stream(
    state: AppState,
    user: AuthenticatedUser,
    model_id: Uuid,
    kind: JobKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = stream::unfold(
        (state, user, false),
        move |(state, user, done)| async move {
            if done {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            match state.models.logs(&user, model_id, kind).await {
                Ok(logs) => {
                    let data = serde_json::to_string(&logs).unwrap_or_else(|_| "[]".to_string());
                    let event = Event::default().event("logs").data(data);
                    Some((Ok(event), (state, user, false)))
                }
                Err(err) => {
                    let event = Event::default().event("error").data(err.to_string());
                    Some((Ok(event), (state, user, true)))
                }
            }
        },
    );
    Sse::new(stream).keep_alive(KeepAlive::default())
}
