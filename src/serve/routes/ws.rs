use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

use crate::store::{MetricsStore, StoreState};

/// GET /api/ws — WebSocket upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(store): State<Arc<MetricsStore>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, store))
}

async fn handle_socket(socket: WebSocket, store: Arc<MetricsStore>) {
    let (sender, mut receiver) = socket.split();
    let mut send_task = tokio::spawn(stream_states(sender, store.watch()));

    // Nothing is accepted from clients; read only to notice the close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Send the current state as a text frame, then one frame per change, until
/// the peer goes away or the store is dropped.
async fn stream_states<S>(mut sink: S, mut state_rx: watch::Receiver<StoreState>)
where
    S: Sink<Message> + Unpin,
{
    loop {
        let payload = encode(&state_rx.borrow_and_update());
        let Some(payload) = payload else {
            break;
        };
        if sink.send(Message::Text(payload.into())).await.is_err() {
            break;
        }
        if state_rx.changed().await.is_err() {
            break;
        }
    }
}

fn encode(state: &StoreState) -> Option<String> {
    serde_json::to_string(state)
        .map_err(|e| tracing::warn!("failed to encode store state: {}", e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{LogGateway, MemoryGateway};
    use crate::model::NewLogRecord;
    use futures::channel::mpsc;
    use std::time::Duration;

    async fn next_state(frames: &mut mpsc::Receiver<Message>) -> StoreState {
        let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .expect("timed out waiting for frame")
            .expect("feed ended");
        match frame {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sends_current_state_then_each_insert() {
        let gw = Arc::new(MemoryGateway::new());
        gw.insert(&NewLogRecord::new(1, 1.0, 0.1, 10.0)).await.unwrap();
        let store = MetricsStore::new(gw.clone());
        store.fetch_logs().await;
        let _sub = store.subscribe_to_logs().await.expect("subscribed");

        let (tx, mut frames) = mpsc::channel(16);
        let feed = tokio::spawn(stream_states(tx, store.watch()));

        let first = next_state(&mut frames).await;
        assert_eq!(first, store.snapshot());
        assert_eq!(first.logs.len(), 1);

        let pushed = gw.insert(&NewLogRecord::new(2, 1.2, 0.1, 12.0)).await.unwrap();
        let second = next_state(&mut frames).await;
        let epochs: Vec<i64> = second.logs.iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![1, 2]);
        assert_eq!(second.logs[1].id, pushed.id);

        // Client gone: the next change ends the feed.
        drop(frames);
        gw.insert(&NewLogRecord::new(3, 1.3, 0.1, 13.0)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), feed)
            .await
            .expect("feed still running")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_store_ends_feed() {
        let store = MetricsStore::new(Arc::new(MemoryGateway::new()));
        let (tx, mut frames) = mpsc::channel(4);
        let feed = tokio::spawn(stream_states(tx, store.watch()));

        assert_eq!(next_state(&mut frames).await, StoreState::default());
        drop(store);
        tokio::time::timeout(Duration::from_secs(2), feed)
            .await
            .expect("feed still running")
            .unwrap();
    }
}
