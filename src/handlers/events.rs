use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, instrument, warn};

use crate::auth::AdminUser;
use crate::schemas::AppState;

/// Server-sent event stream for admin dashboards.
///
/// Each event's name is the refresh reason (e.g. `history.add_user`)
/// and its data is the serialized [`crate::events::DashboardEvent`].
/// A dashboard that falls behind the broadcast buffer simply misses
/// events; the next one it does receive triggers a full refresh anyway.
#[instrument(skip_all)]
pub async fn stream_dashboard(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Admin {} attached to the dashboard stream", admin.id);

    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(event) => match Event::default()
            .event(event.reason.as_str())
            .json_data(&event)
        {
            Ok(sse_event) => Some(Ok(sse_event)),
            Err(serialize_error) => {
                warn!("Failed to serialize dashboard event: {}", serialize_error);
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            warn!("Dashboard subscriber lagged, {} event(s) dropped", missed);
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
