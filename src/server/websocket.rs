//! WebSocket handling for collaborative editing connections.
//!
//! Each connection is one site: it joins its document's session on upgrade,
//! receives an init snapshot, then exchanges JSON messages. Inbound raw
//! edits and replica operations are serialized through the session; outbound
//! updates come from the session's fan-out (own operations excluded).

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineError, Operation, SiteId};
use crate::session::{Edit, Session, SessionHandle, SessionManager};

/// Messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Raw edit: insert `value` at visible index `index`
    Insert { value: char, index: usize },
    /// Raw edit: delete the visible character at `index`
    Delete { index: usize },
    /// A full operation authored by a client-side replica
    Operation { operation: Operation },
    /// Request the current rendered document
    GetContent,
}

/// Messages the server sends.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after join: assigned site id plus catch-up state
    Init {
        site: SiteId,
        content: String,
        operations: Vec<Operation>,
    },
    /// An operation integrated on behalf of another site
    Operation {
        origin: SiteId,
        operation: Operation,
    },
    /// Reply to `get_content`
    Content { content: String },
    /// Reported to the originating client only
    Error { message: String },
}

/// Runs one WebSocket connection against a document session from join to
/// leave. Disconnecting (or any socket error) is a leave; the site simply
/// stops being a fan-out target.
pub async fn handle_connection(
    socket: WebSocket,
    manager: Arc<SessionManager>,
    document_id: String,
) {
    let SessionHandle {
        site,
        snapshot,
        session,
        mut updates,
    } = manager.join(&document_id).await;
    info!(document = %document_id, site, "websocket connection established");

    let (mut sender, mut receiver) = socket.split();

    let init = ServerMessage::Init {
        site,
        content: snapshot.text,
        operations: snapshot.operations,
    };
    if !send_message(&mut sender, &init).await {
        manager.leave(&document_id, site).await;
        return;
    }

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(update) = update else { break };
                let message = ServerMessage::Operation {
                    origin: update.origin,
                    operation: update.operation,
                };
                if !send_message(&mut sender, &message).await {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_text_message(&session, site, &text) {
                            if !send_message(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(document = %document_id, site, "client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, ping and pong frames are ignored; axum
                        // answers pings on its own.
                    }
                    Some(Err(e)) => {
                        warn!(document = %document_id, site, error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    manager.leave(&document_id, site).await;
    info!(document = %document_id, site, "websocket connection ended");
}

/// Dispatches one inbound text frame. Returns the reply to send to this
/// client, if any; fan-out to other sites happens inside the session.
fn handle_text_message(session: &Session, site: SiteId, text: &str) -> Option<ServerMessage> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(site, error = %e, "malformed client message");
            return Some(ServerMessage::Error {
                message: format!("malformed message: {e}"),
            });
        }
    };

    match message {
        ClientMessage::Insert { value, index } => {
            edit_reply(session.submit_edit(site, Edit::Insert { value, index }))
        }
        ClientMessage::Delete { index } => {
            edit_reply(session.submit_edit(site, Edit::Delete { index }))
        }
        ClientMessage::Operation { operation } => {
            match session.submit_operation(site, operation) {
                Ok(_) => None,
                Err(e) => Some(ServerMessage::Error {
                    message: e.to_string(),
                }),
            }
        }
        ClientMessage::GetContent => Some(ServerMessage::Content {
            content: session.render(),
        }),
    }
}

fn edit_reply(result: Result<Operation, EngineError>) -> Option<ServerMessage> {
    match result {
        Ok(_) => None,
        Err(e) => Some(ServerMessage::Error {
            message: e.to_string(),
        }),
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!(error = %e, "failed to serialize server message");
            return false;
        }
    };
    sender.send(Message::Text(json)).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_parsing() {
        let insert: ClientMessage =
            serde_json::from_str(r#"{"type":"insert","value":"x","index":0}"#).unwrap();
        assert!(matches!(
            insert,
            ClientMessage::Insert { value: 'x', index: 0 }
        ));

        let get: ClientMessage = serde_json::from_str(r#"{"type":"get_content"}"#).unwrap();
        assert!(matches!(get, ClientMessage::GetContent));

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"nonsense"}"#).is_err());
    }

    #[test]
    fn test_server_message_wire_shape() {
        let message = ServerMessage::Content {
            content: "hi".to_string(),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(json, r#"{"type":"content","content":"hi"}"#);
    }
}
