//! Notify Route
//!
//! - GET /notify - Server-sent event stream of reports
//!
//! Each client gets its own broker subscription. The current report is sent
//! as soon as the stream opens, followed by every report the broker
//! delivers. The subscription is dropped when the client goes away.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::broker::{Broker, SubscriberId, Subscription};
use crate::feed::SharedReport;

/// GET /notify
pub async fn notify(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    // Subscribe before reading the snapshot so nothing published in between is missed
    let subscription = state.broker.subscribe().await?;
    let pending = state.latest_report();

    let stream_state = NotifyStream {
        pending,
        last_sent: None,
        _guard: UnsubscribeOnDrop {
            broker: Arc::clone(&state.broker),
            id: subscription.id(),
        },
        subscription,
    };

    let events = stream::unfold(stream_state, |mut s| async move {
        let report = s.next_report().await?;
        let event = Event::default().event("report").json_data(report.to_payload());
        Some((event, s))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive)))
}

struct NotifyStream {
    pending: Option<SharedReport>,
    last_sent: Option<SharedReport>,
    subscription: Subscription<SharedReport>,
    _guard: UnsubscribeOnDrop,
}

impl NotifyStream {
    /// Next report to send, skipping one already sent from the snapshot.
    async fn next_report(&mut self) -> Option<SharedReport> {
        let report = match self.pending.take() {
            Some(report) => report,
            None => loop {
                let report = self.subscription.recv().await?;
                let repeat = self
                    .last_sent
                    .as_ref()
                    .is_some_and(|last| Arc::ptr_eq(last, &report));
                if !repeat {
                    break report;
                }
            },
        };
        self.last_sent = Some(Arc::clone(&report));
        Some(report)
    }
}

/// Removes the subscription once the response stream is dropped.
struct UnsubscribeOnDrop {
    broker: Arc<Broker<SharedReport>>,
    id: SubscriberId,
}

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        let id = self.id;
        tracing::debug!(subscriber_id = %id, "Event stream closed");

        let broker = Arc::clone(&self.broker);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                broker.unsubscribe_id(id).await;
            });
        }
    }
}
