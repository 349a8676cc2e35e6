use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Serialize;

use super::ServeState;

/// Browser half of the reload channel. Served at `/__kiln/reload.js` and
/// injected into every HTML page the dev server hands out.
const RELOAD_JS: &str = r#"(() => {
  const scheme = location.protocol === "https:" ? "wss://" : "ws://";
  const url = scheme + location.host + "/__kiln/ws";
  let delay = 500;
  const connect = () => {
    const ws = new WebSocket(url);
    ws.onopen = () => { delay = 500; };
    ws.onmessage = (event) => {
      const msg = JSON.parse(event.data);
      if (msg.type === "reload") location.reload();
    };
    ws.onclose = () => setTimeout(connect, delay = Math.min(delay * 2, 5000));
  };
  connect();
})();
"#;

// ── WebSocket Messages ──────────────────────────────────────────

#[derive(Serialize)]
struct WsMessage<T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    data: T,
}

pub(crate) fn ws_json<T: Serialize>(msg_type: &'static str, data: T) -> String {
    serde_json::to_string(&WsMessage { msg_type, data }).unwrap_or_default()
}

// ── Handlers ────────────────────────────────────────────────────

pub(crate) async fn reload_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], RELOAD_JS)
}

pub(crate) async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<ServeState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.reload_tx.subscribe();

    let hello = ws_json(
        "hello",
        serde_json::json!({ "server": "kiln", "version": env!("CARGO_PKG_VERSION") }),
    );
    if sender.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    // Forward reload broadcasts to this client.
    let send_task = tokio::spawn(async move {
        while let Ok(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Consume incoming frames (pings, close) but ignore content.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_json_envelope_shape() {
        let msg = ws_json("reload", serde_json::json!({ "reason": "build" }));
        let parsed: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "reload");
        assert_eq!(parsed["data"]["reason"], "build");
    }

    #[test]
    fn test_reload_client_targets_kiln_endpoints() {
        assert!(RELOAD_JS.contains("/__kiln/ws"));
        assert!(RELOAD_JS.contains("location.reload()"));
    }
}
