use crate::protocol::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;

/// Serialize a server message and write it to the socket as one text frame.
pub(super) async fn send_server_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(error = %err, tag = message.tag(), "Failed to serialize server message");
            r#"{"type":"ERROR","payload":{"msg":"Internal error","code":"INTERNAL_ERROR"}}"#
                .to_string()
        }
    };

    sender.send(Message::Text(payload.into())).await
}

/// Send a final frame and close the socket. Used when a connection is refused
/// before a session exists.
pub(super) async fn reject_and_close(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) {
    if let Err(err) = send_server_message(sender, message).await {
        tracing::debug!(error = %err, tag = message.tag(), "Failed to send rejection frame");
    }
    let _ = sender.close().await;
}
