// emberbot-core/src/overlay/server.rs

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::Error;
use crate::overlay::{OverlayBroadcaster, OverlayEvent};

pub fn router(broadcaster: Arc<OverlayBroadcaster>) -> Router {
    Router::new()
        .route("/events", get(events))
        .route("/health", get(health))
        .with_state(broadcaster)
}

/// Bind and serve until the shutdown token fires. In-flight observer
/// streams are dropped with the server; overlay events are not durable.
pub async fn serve(
    broadcaster: Arc<OverlayBroadcaster>,
    port: u16,
    shutdown: CancellationToken,
) -> Result<(), Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "overlay server listening");

    axum::serve(listener, router(broadcaster))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("overlay server stopped");
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn events(
    State(broadcaster): State<Arc<OverlayBroadcaster>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = broadcaster.subscribe();
    info!(observer = id, "overlay observer connected");

    let stream = ObserverStream {
        id,
        rx,
        broadcaster,
        greeted: false,
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Adapts an observer's queue into an SSE stream and deregisters the
/// observer when the connection goes away.
struct ObserverStream {
    id: u64,
    rx: mpsc::Receiver<OverlayEvent>,
    broadcaster: Arc<OverlayBroadcaster>,
    greeted: bool,
}

impl Stream for ObserverStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if !this.greeted {
            this.greeted = true;
            return Poll::Ready(Some(Ok(to_sse_event(&OverlayEvent::connected()))));
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(Ok(to_sse_event(&event)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ObserverStream {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
        info!(observer = self.id, "overlay observer disconnected");
    }
}

fn to_sse_event(event: &OverlayEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(sse) => sse,
        Err(e) => {
            error!(err = %e, "failed to serialize overlay event");
            Event::default().data("{}")
        }
    }
}
