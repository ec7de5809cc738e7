//! RPC over WebSocket.
//!
//! Each text frame carries one `ClientMessage`. Requests are dispatched on
//! their own task, so a slow unit call does not hold up the connection;
//! responses carry the request id and may arrive in any order.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use mmi_domain::ConnectionId;
use mmi_shared::{dispatch, ClientMessage, ResponseResult, ServerMessage};

use super::ApiState;

/// Replies queued per connection before request tasks wait on the writer.
const REPLY_QUEUE: usize = 256;

/// Upgrades `GET /adapter` to the RPC socket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serve one RPC connection until the peer goes away.
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sink, mut frames) = socket.split();
    let connection_id = ConnectionId::new();

    let (replies, mut outbound) = mpsc::channel::<ServerMessage>(REPLY_QUEUE);

    state.connections.register(connection_id).await;
    tracing::info!(connection_id = %connection_id, "RPC client connected");

    let writer = tokio::spawn(async move {
        while let Some(reply) = outbound.recv().await {
            match serde_json::to_string(&reply) {
                Ok(json) => {
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!(error = %e, "Reply could not be encoded"),
            }
        }
    });

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(ClientMessage::Request { request_id, call }) => {
                    state.connections.record_request(connection_id).await;
                    let service = state.service.clone();
                    let replies = replies.clone();
                    tokio::spawn(async move {
                        let method = call.method();
                        tracing::debug!(connection_id = %connection_id, %request_id, method, "Request received");
                        let result = ResponseResult::from_result(dispatch(service.as_ref(), call).await);
                        if let ResponseResult::Error { message, .. } = &result {
                            tracing::debug!(%request_id, method, error = %message, "Request failed");
                        }
                        if replies.send(ServerMessage::Response { request_id, result }).await.is_err() {
                            tracing::debug!(connection_id = %connection_id, "Connection gone before response");
                        }
                    });
                }
                Ok(ClientMessage::Ping) => {
                    let _ = replies.send(ServerMessage::Pong).await;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, error = %e, "Unreadable RPC frame");
                    let _ = replies.try_send(ServerMessage::Error {
                        code: "PARSE_ERROR".into(),
                        message: format!("not an RPC message: {e}"),
                    });
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "Client hung up");
                break;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "RPC socket failed");
                break;
            }
            _ => {}
        }
    }

    state.connections.unregister(connection_id).await;
    drop(replies);
    // in-flight requests still hold senders; the writer ends with the last one
    let _ = writer.await;

    tracing::info!(connection_id = %connection_id, "RPC client gone");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use mmi_shared::{AdapterCall, AdapterReply};
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    use crate::api::{router, ADAPTER_ROUTE};
    use crate::dispatcher::tests::adapter;

    async fn spawn_ws_server() -> String {
        let state = Arc::new(ApiState::new(Arc::new(adapter())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        format!("ws://{addr}{ADAPTER_ROUTE}")
    }

    async fn next_server_message<S>(ws: &mut S) -> ServerMessage
    where
        S: StreamExt<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("frame in time")
                .expect("stream open")
                .expect("valid frame");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    fn request(request_id: &str, call: AdapterCall) -> WsMessage {
        WsMessage::Text(
            serde_json::to_string(&ClientMessage::Request {
                request_id: request_id.into(),
                call,
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_request_response_round_trip() {
        let url = spawn_ws_server().await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        ws.send(request(
            "r1",
            AdapterCall::CreateSession {
                session_id: "scene1".into(),
            },
        ))
        .await
        .unwrap();
        ws.send(request("r2", AdapterCall::GetStatus)).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            match next_server_message(&mut ws).await {
                ServerMessage::Response { request_id, result } => {
                    let reply = result.into_result().unwrap();
                    match request_id.as_str() {
                        "r1" => assert!(reply.into_bool().unwrap().successful),
                        "r2" => assert!(reply.into_properties().unwrap().contains_key("Version")),
                        other => panic!("unexpected request id {other}"),
                    }
                    seen.push(request_id);
                }
                other => panic!("unexpected message {other:?}"),
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_typed_error_reaches_client() {
        let url = spawn_ws_server().await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        ws.send(request(
            "r1",
            AdapterCall::GetScene {
                session_id: "missing".into(),
            },
        ))
        .await
        .unwrap();

        let ServerMessage::Response { result, .. } = next_server_message(&mut ws).await else {
            panic!("expected response");
        };
        let err = result.into_result().unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let url = spawn_ws_server().await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        ws.send(WsMessage::Text("{nope".into())).await.unwrap();
        match next_server_message(&mut ws).await {
            ServerMessage::Error { code, .. } => assert_eq!(code, "PARSE_ERROR"),
            other => panic!("unexpected message {other:?}"),
        }

        ws.send(WsMessage::Text(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
        ))
        .await
        .unwrap();
        assert!(matches!(
            next_server_message(&mut ws).await,
            ServerMessage::Pong
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_travels_as_bytes() {
        let url = spawn_ws_server().await;
        let (mut ws, _) = connect_async(url).await.unwrap();

        for (id, call) in [
            (
                "create",
                AdapterCall::CreateSession {
                    session_id: "s".into(),
                },
            ),
            (
                "load",
                AdapterCall::LoadMmus {
                    unit_ids: vec!["idle".into()],
                    session_id: "s".into(),
                },
            ),
        ] {
            ws.send(request(id, call)).await.unwrap();
            next_server_message(&mut ws).await;
        }

        ws.send(request(
            "cp",
            AdapterCall::CreateCheckpoint {
                unit_id: "idle".into(),
                session_id: "s".into(),
            },
        ))
        .await
        .unwrap();
        let ServerMessage::Response { result, .. } = next_server_message(&mut ws).await else {
            panic!("expected response");
        };
        let reply: AdapterReply = result.into_result().unwrap();
        assert!(!reply.into_checkpoint().unwrap().is_empty());
    }
}
