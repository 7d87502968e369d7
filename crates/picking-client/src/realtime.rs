//! Client of the hosted Realtime service, which delivers row changes over
//! a websocket speaking the Phoenix channels protocol.
//!
//! Each Subscription runs a dedicated task holding one socket and one channel.
//! The task reconnects with backoff after failures, and is aborted when the
//! Subscription is dropped. Every join uses the current access token, and a
//! refreshed token is pushed to the joined channel.

use crate::{AuthEvent, AuthService, ChangeEvent, ChannelFilter, EventKind, Subscription};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Subscribe to changes selected by `filter`, using the Realtime websocket at `url`.
/// Access tokens are taken from `auth`, or are `public_token` if there's no session.
pub fn subscribe(
    url: url::Url,
    auth: Arc<dyn AuthService>,
    public_token: String,
    filter: ChannelFilter,
) -> Subscription {
    let (tx, rx) = mpsc::channel(64);
    let tokens = Tokens {
        events: auth.on_auth_state_change(),
        auth,
        public_token,
    };
    let task = tokio::spawn(serve(url, tokens, filter.clone(), tx));

    Subscription::new(filter, rx, Some(Box::new(AbortOnDrop(task.abort_handle()))))
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// Tokens is the source of access tokens of a channel.
struct Tokens {
    auth: Arc<dyn AuthService>,
    events: broadcast::Receiver<AuthEvent>,
    public_token: String,
}

impl Tokens {
    // Current access token, which may refresh an expiring session.
    async fn current(&self) -> anyhow::Result<String> {
        Ok(match self.auth.get_session().await? {
            Some(session) => session.access_token,
            None => self.public_token.clone(),
        })
    }

    // Next access token of an AuthEvent which carries a session.
    async fn changed(&mut self) -> String {
        loop {
            match self.events.recv().await {
                Ok(AuthEvent {
                    session: Some(session),
                    ..
                }) => return session.access_token,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                // The auth service is gone: there are no further tokens.
                Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
            }
        }
    }
}

async fn serve(
    url: url::Url,
    mut tokens: Tokens,
    filter: ChannelFilter,
    tx: mpsc::Sender<ChangeEvent>,
) {
    let mut attempt = 0;

    loop {
        match serve_socket(&url, &mut tokens, &filter, &tx, &mut attempt).await {
            Ok(()) => return, // Receiver was dropped.
            Err(err) => {
                attempt += 1;
                let backoff = backoff(attempt);
                tracing::warn!(%filter, ?err, ?backoff, "realtime channel failed (will retry)");
                () = tokio::time::sleep(backoff).await;
            }
        }
    }
}

async fn serve_socket(
    url: &url::Url,
    tokens: &mut Tokens,
    filter: &ChannelFilter,
    tx: &mpsc::Sender<ChangeEvent>,
    attempt: &mut u32,
) -> anyhow::Result<()> {
    let mut access_token = tokens.current().await?;

    let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    let topic = format!("realtime:{filter}");
    sink.send(Message::Text(
        join_message(&topic, filter, &access_token).to_string(),
    ))
    .await?;
    tracing::debug!(%topic, "joined realtime channel");

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut next_ref = 2u64;

    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = sink.send(Message::Text(leave_message(&topic, next_ref).to_string())).await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                sink.send(Message::Text(heartbeat_message(next_ref).to_string())).await?;
                next_ref += 1;

                // Reading the session refreshes it ahead of expiry,
                // which is observed below as a changed token.
                if let Err(err) = tokens.current().await {
                    tracing::warn!(%topic, ?err, "failed to read the session");
                }
            }
            token = tokens.changed() => {
                if token == access_token {
                    continue;
                }
                access_token = token;

                sink.send(Message::Text(
                    access_token_message(&topic, &access_token, next_ref).to_string(),
                ))
                .await?;
                next_ref += 1;
                tracing::debug!(%topic, "sent refreshed access token");
            }
            message = stream.next() => {
                let text = match message {
                    None => anyhow::bail!("realtime socket closed"),
                    Some(Err(err)) => return Err(err.into()),
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => anyhow::bail!("realtime socket closed: {frame:?}"),
                    Some(Ok(_)) => continue,
                };

                if let Some(event) = parse_frame(&text)? {
                    *attempt = 0;
                    if tx.send(event).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(5)).min(MAX_BACKOFF)
}

fn join_message(topic: &str, filter: &ChannelFilter, access_token: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [{
                    "event": filter.event.as_str(),
                    "schema": "public",
                    "table": filter.table.as_str(),
                    "filter": filter.filter_expr(),
                }],
            },
            "access_token": access_token,
        },
        "ref": "1",
    })
}

fn access_token_message(topic: &str, access_token: &str, next_ref: u64) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "event": "access_token",
        "payload": {"access_token": access_token},
        "ref": next_ref.to_string(),
    })
}

fn leave_message(topic: &str, next_ref: u64) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": next_ref.to_string(),
    })
}

fn heartbeat_message(next_ref: u64) -> serde_json::Value {
    serde_json::json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": next_ref.to_string(),
    })
}

#[derive(serde::Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: EventKind,
    table: String,
    #[serde(default)]
    record: serde_json::Value,
    #[serde(default)]
    old_record: serde_json::Value,
}

// Parse a text frame of the socket, returning its ChangeEvent if it carries one.
// Error replies of the server fail the channel.
fn parse_frame(text: &str) -> anyhow::Result<Option<ChangeEvent>> {
    let Frame { event, payload } = serde_json::from_str(text)?;

    match event.as_str() {
        "postgres_changes" => {
            let ChangeData {
                kind,
                table,
                record,
                old_record,
            } = serde_json::from_value(payload["data"].clone())?;

            Ok(Some(ChangeEvent {
                table: table.parse()?,
                kind,
                record,
                old_record,
            }))
        }
        "phx_reply" if payload["status"] != "ok" => {
            anyhow::bail!("realtime channel rejected: {}", payload["response"])
        }
        "phx_error" | "phx_close" => anyhow::bail!("realtime channel {event}: {payload}"),
        "system" if payload["status"] == "error" => {
            anyhow::bail!("realtime channel error: {}", payload["message"])
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use models::Table;
    use serde_json::json;

    #[test]
    fn test_join_message() {
        let warehouse = uuid::Uuid::nil();
        let filter = ChannelFilter::warehouse(Table::ChatMessages, warehouse).only(EventKind::Insert);

        let message = join_message("realtime:chat", &filter, "token");
        assert_eq!(
            message["payload"]["config"]["postgres_changes"][0],
            json!({
                "event": "INSERT",
                "schema": "public",
                "table": "chat_messages",
                "filter": "warehouse_id=eq.00000000-0000-0000-0000-000000000000",
            })
        );
        assert_eq!(message["payload"]["access_token"], "token");
    }

    #[test]
    fn test_parse_frames() {
        let change = json!({
            "topic": "realtime:x",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "UPDATE",
                    "table": "pick_lists",
                    "schema": "public",
                    "record": {"id": "a", "status": "completed"},
                    "old_record": {"id": "a"},
                },
                "ids": [1],
            },
            "ref": null,
        });
        let event = parse_frame(&change.to_string()).unwrap().unwrap();
        assert_eq!(event.table, Table::PickLists);
        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(event.record["status"], "completed");

        let ok = json!({"event": "phx_reply", "payload": {"status": "ok", "response": {}}});
        assert_eq!(parse_frame(&ok.to_string()).unwrap(), None);

        let rejected = json!({"event": "phx_reply", "payload": {"status": "error", "response": {"reason": "denied"}}});
        assert!(parse_frame(&rejected.to_string()).is_err());

        let presence = json!({"event": "presence_state", "payload": {}});
        assert_eq!(parse_frame(&presence.to_string()).unwrap(), None);
    }

    // Next frame of `socket` having `event`, skipping others.
    async fn next_event(
        socket: &mut tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
        event: &str,
    ) -> serde_json::Value {
        loop {
            if let Message::Text(text) = socket.next().await.unwrap().unwrap() {
                let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
                if frame["event"] == event {
                    return frame;
                }
            }
        }
    }

    async fn sign_in(service: &crate::MemoryService) -> crate::Session {
        service
            .sign_in_with_password("sam@example.com", "hunter2")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_channel_follows_the_session_token() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url: url::Url = format!("ws://{}/realtime/v1/websocket", listener.local_addr().unwrap())
            .parse()
            .unwrap();

        let (service, _store) = crate::MemoryService::standalone();
        service.seed_account("sam@example.com", "hunter2", uuid::Uuid::new_v4());
        let first = sign_in(&service).await;

        let filter = ChannelFilter::warehouse(Table::PickLists, uuid::Uuid::nil());
        let _sub = subscribe(url, service.clone(), "anon-key".to_string(), filter);

        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let join = next_event(&mut socket, "phx_join").await;
        assert_eq!(join["payload"]["access_token"], first.access_token.as_str());

        // A new session is pushed to the joined channel.
        let second = sign_in(&service).await;
        let pushed = next_event(&mut socket, "access_token").await;
        assert_eq!(pushed["topic"], join["topic"]);
        assert_eq!(pushed["payload"]["access_token"], second.access_token.as_str());

        // A lost socket re-joins with the session current at that time.
        socket.close(None).await.unwrap();
        let third = sign_in(&service).await;

        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let join = next_event(&mut socket, "phx_join").await;
        assert_eq!(join["payload"]["access_token"], third.access_token.as_str());
    }

    #[test]
    fn test_access_token_message() {
        let message = access_token_message("realtime:x", "fresh", 7);
        assert_eq!(
            message,
            json!({
                "topic": "realtime:x",
                "event": "access_token",
                "payload": {"access_token": "fresh"},
                "ref": "7",
            })
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(4), Duration::from_secs(16));
        assert_eq!(backoff(9), MAX_BACKOFF);
    }
}
