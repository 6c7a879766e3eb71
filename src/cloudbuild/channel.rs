//! Event channel to the remote build service.
//!
//! The service speaks socket.io. `connect`, `disconnect` and `error` are
//! protocol lifecycle events; everything else is a named event carrying
//! JSON arguments.

use async_trait::async_trait;
use futures::future::{self, BoxFuture, FutureExt};
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::{PublishError, Result};

/// Inbound event from the build service
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Server accepted the session under `id`; empty when the handshake
    /// did not name it
    Connect { id: String },
    Disconnect,
    Error(String),
    /// Any other named event
    Message { event: String, data: Value },
}

/// Bidirectional event transport used by [super::BuildSession]
#[async_trait]
pub trait BuildChannel: Send {
    /// Next inbound event; `None` once the transport is gone
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    async fn emit(&mut self, event: &str, data: Value) -> Result<()>;

    /// Close the transport from our side
    async fn disconnect(&mut self) -> Result<()>;
}

/// Connection parameters sent when opening the channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParams {
    pub repo: String,
    pub name: String,
    pub branch: String,
    pub version: String,
    pub build_cmd: String,
}

impl BuildParams {
    /// `server` with the parameters appended as query string
    pub fn url(&self, server: &str) -> Result<Url> {
        let mut url = Url::parse(server).map_err(|e| {
            PublishError::config(format!("invalid build server url '{}': {}", server, e))
        })?;
        url.query_pairs_mut()
            .append_pair("repo", &self.repo)
            .append_pair("name", &self.name)
            .append_pair("branch", &self.branch)
            .append_pair("version", &self.version)
            .append_pair("buildCmd", &self.build_cmd);
        Ok(url)
    }
}

/// First argument of an event, or all of them as an array
fn payload_value(payload: Payload) -> Value {
    match payload {
        Payload::Text(mut values) if values.len() == 1 => values.remove(0),
        Payload::Text(values) if values.is_empty() => Value::Null,
        Payload::Text(values) => Value::Array(values),
        _ => Value::Null,
    }
}

/// Session id announced in the namespace handshake (`{"sid": ...}`)
fn handshake_sid(payload: Payload) -> String {
    payload_value(payload)
        .get("sid")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn error_text(payload: Payload) -> String {
    match payload_value(payload) {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn event_name(event: Event) -> String {
    match event {
        Event::Custom(name) => name,
        other => String::from(other),
    }
}

/// Callback pushing the mapped payload into the channel queue
fn forward<F>(
    sender: &mpsc::UnboundedSender<ChannelEvent>,
    map: F,
) -> impl FnMut(Payload, Client) -> BoxFuture<'static, ()> + Send + Sync + 'static
where
    F: Fn(Payload) -> ChannelEvent + Send + Sync + 'static,
{
    let sender = sender.clone();
    move |payload: Payload, _client: Client| {
        let _ = sender.send(map(payload));
        future::ready(()).boxed()
    }
}

/// socket.io client transport
pub struct SocketIoChannel {
    client: Client,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    closed: bool,
}

impl SocketIoChannel {
    /// Open a channel to `server` for one build.
    ///
    /// The parameters travel in the handshake query. Returns once the
    /// transport is up; `connect` arrives later as an event.
    pub async fn open(server: &str, params: &BuildParams) -> Result<Self> {
        let url = params.url(server)?;
        debug!(url = %url, "opening build channel");

        let (sender, events) = mpsc::unbounded_channel();
        let any_sender = sender.clone();
        let client = ClientBuilder::new(url.as_str())
            .on(
                Event::Connect,
                forward(&sender, |payload| ChannelEvent::Connect {
                    id: handshake_sid(payload),
                }),
            )
            .on(Event::Close, forward(&sender, |_| ChannelEvent::Disconnect))
            .on(
                Event::Error,
                forward(&sender, |payload| ChannelEvent::Error(error_text(payload))),
            )
            .on_any(move |event: Event, payload: Payload, _client: Client| {
                let _ = any_sender.send(ChannelEvent::Message {
                    event: event_name(event),
                    data: payload_value(payload),
                });
                future::ready(()).boxed()
            })
            .connect()
            .await
            .map_err(|e| PublishError::BuildSessionError(format!("connect {}: {}", server, e)))?;

        Ok(SocketIoChannel {
            client,
            events,
            closed: false,
        })
    }
}

#[async_trait]
impl BuildChannel for SocketIoChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    async fn emit(&mut self, event: &str, data: Value) -> Result<()> {
        let args = if data.is_null() { Vec::new() } else { vec![data] };
        self.client
            .emit(event, Payload::Text(args))
            .await
            .map_err(|e| PublishError::BuildSessionError(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client
            .disconnect()
            .await
            .map_err(|e| PublishError::BuildSessionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_in_query() {
        let params = BuildParams {
            repo: "git@github.com:me/app.git".to_string(),
            name: "app".to_string(),
            branch: "dev/1.0.0".to_string(),
            version: "1.0.0".to_string(),
            build_cmd: "npm run build".to_string(),
        };
        let url = params.url("http://localhost:7001").unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("repo".to_string(), "git@github.com:me/app.git".to_string()));
        assert_eq!(pairs[4], ("buildCmd".to_string(), "npm run build".to_string()));
    }

    #[test]
    fn test_invalid_server_url() {
        let params = BuildParams {
            repo: String::new(),
            name: String::new(),
            branch: String::new(),
            version: String::new(),
            build_cmd: String::new(),
        };
        assert!(params.url("not a url").is_err());
    }

    #[test]
    fn test_payload_value() {
        assert_eq!(
            payload_value(Payload::Text(vec![json!({"data": {"action": "build"}})])),
            json!({"data": {"action": "build"}})
        );
        assert_eq!(payload_value(Payload::Text(Vec::new())), Value::Null);
        assert_eq!(
            payload_value(Payload::Text(vec![json!(1), json!(2)])),
            json!([1, 2])
        );
    }

    #[test]
    fn test_handshake_sid() {
        assert_eq!(
            handshake_sid(Payload::Text(vec![json!({"sid": "Xk2a"})])),
            "Xk2a"
        );
        assert_eq!(handshake_sid(Payload::Text(Vec::new())), "");
    }

    #[test]
    fn test_error_and_event_names() {
        assert_eq!(error_text(Payload::Text(vec![json!("refused")])), "refused");
        assert_eq!(
            error_text(Payload::Text(vec![json!({"code": 1})])),
            r#"{"code":1}"#
        );
        assert_eq!(event_name(Event::Custom("building".to_string())), "building");
    }
}
