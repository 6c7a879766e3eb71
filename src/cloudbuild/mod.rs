//! Remote build session.
//!
//! A session opens an event channel to the build service, asks it to build
//! once connected, and follows the progress stream until the service
//! disconnects. One timer guards the session at any time: the connect
//! deadline until `connect` arrives, then the task deadline.
//!
//! Failure actions reported by the service close the channel from our side.
//! The session still completes on disconnect and hands the failure back in
//! [SessionOutcome].

pub mod channel;
pub mod mock;
pub mod timer;

pub use channel::{BuildChannel, BuildParams, ChannelEvent, SocketIoChannel};
pub use mock::{MockChannel, MockChannelHandle};
pub use timer::PhaseTimer;

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{PublishError, Result, TimeoutPhase};
use crate::ui;

/// Actions that end a remote build unsuccessfully
pub const FAILED_ACTIONS: [&str; 6] = [
    "prepare failed",
    "download failed",
    "install failed",
    "build failed",
    "pre-publish failed",
    "publish failed",
];

const BUILD_EVENT: &str = "build";
const BUILDING_EVENT: &str = "building";

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Failure,
    Error,
    Timeout(TimeoutPhase),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Connected,
    Building,
    Terminated(Termination),
}

/// Failure action reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub action: String,
    pub message: String,
}

/// Result of a session that ended with a disconnect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub session_id: Option<String>,
    pub failure: Option<BuildFailure>,
}

impl SessionOutcome {
    /// Turn an observed failure action into [PublishError::BuildTerminalFailure]
    pub fn into_result(self) -> Result<SessionOutcome> {
        match self.failure {
            Some(failure) => Err(PublishError::BuildTerminalFailure {
                action: failure.action,
                message: failure.message,
            }),
            None => Ok(self),
        }
    }
}

/// `{data: {action, payload: {message}}}` frames of the build stream
fn parse_progress(data: &Value) -> (String, String) {
    let action = data
        .pointer("/data/action")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let message = data
        .pointer("/data/payload/message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    (action.to_string(), message.to_string())
}

enum Step {
    Event(Option<ChannelEvent>),
    Timeout(TimeoutPhase),
}

/// What a named event carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    Build,
    Building,
    SessionLog,
    Other,
}

pub struct BuildSession<C: BuildChannel> {
    channel: C,
    timer: PhaseTimer,
    state: SessionState,
    session_id: Option<String>,
    failure: Option<BuildFailure>,
    connect_timeout: Duration,
    connect_deadline: Option<Instant>,
    task_timeout: Duration,
    closed: bool,
}

impl<C: BuildChannel> BuildSession<C> {
    pub fn new(channel: C, connect_timeout: Duration, task_timeout: Duration) -> Self {
        BuildSession {
            channel,
            timer: PhaseTimer::new(),
            state: SessionState::Connecting,
            session_id: None,
            failure: None,
            connect_timeout,
            connect_deadline: None,
            task_timeout,
            closed: false,
        }
    }

    /// Wait for `connect` until `deadline` instead of `connect_timeout`
    /// from the start of [BuildSession::run].
    ///
    /// Lets time spent opening the transport count against the same deadline.
    pub fn connect_by(mut self, deadline: Instant) -> Self {
        self.connect_deadline = Some(deadline);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Drive the session until it terminates
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        match self.connect_deadline {
            Some(deadline) => self.timer.arm_at(TimeoutPhase::Connect, deadline),
            None => self.timer.arm(TimeoutPhase::Connect, self.connect_timeout),
        }

        loop {
            let step = tokio::select! {
                event = self.channel.next_event() => Step::Event(event),
                phase = self.timer.expired() => Step::Timeout(phase),
            };

            match step {
                Step::Timeout(phase) => {
                    warn!(%phase, "build session timed out");
                    self.teardown().await;
                    self.state = SessionState::Terminated(Termination::Timeout(phase));
                    return Err(PublishError::BuildSessionTimeout(phase));
                }
                Step::Event(None) if self.state == SessionState::Connecting => {
                    self.teardown().await;
                    self.state = SessionState::Terminated(Termination::Error);
                    return Err(PublishError::BuildSessionError(
                        "channel closed before connect".to_string(),
                    ));
                }
                Step::Event(None) | Step::Event(Some(ChannelEvent::Disconnect)) => {
                    return Ok(self.finish().await);
                }
                Step::Event(Some(ChannelEvent::Error(message))) => {
                    self.teardown().await;
                    self.state = SessionState::Terminated(Termination::Error);
                    return Err(PublishError::BuildSessionError(message));
                }
                Step::Event(Some(ChannelEvent::Connect { id })) => {
                    if let Err(e) = self.on_connect(id).await {
                        self.teardown().await;
                        self.state = SessionState::Terminated(Termination::Error);
                        return Err(e);
                    }
                }
                Step::Event(Some(ChannelEvent::Message { event, data })) => {
                    self.on_message(&event, &data).await;
                }
            }
        }
    }

    async fn on_connect(&mut self, id: String) -> Result<()> {
        if self.state != SessionState::Connecting {
            debug!(id = %id, "ignoring repeated connect");
            return Ok(());
        }
        self.timer.cancel();
        debug!(id = %id, "build session connected");
        self.session_id = Some(id);
        self.state = SessionState::Connected;

        self.channel.emit(BUILD_EVENT, Value::Null).await?;
        self.timer.arm(TimeoutPhase::Task, self.task_timeout);
        ui::display_status("Cloud build started");
        Ok(())
    }

    async fn on_message(&mut self, event: &str, data: &Value) {
        if self.state == SessionState::Connected {
            self.state = SessionState::Building;
        }

        match self.classify(event) {
            MessageKind::Build => {
                let (action, message) = parse_progress(data);
                if FAILED_ACTIONS.contains(&action.as_str()) {
                    ui::display_build_action(&action, &message, true);
                    self.failure = Some(BuildFailure { action, message });
                    self.teardown().await;
                } else {
                    ui::display_build_action(&action, &message, false);
                }
            }
            MessageKind::Building => {
                let text = match data {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                ui::display_build_output(&text);
            }
            MessageKind::SessionLog => {
                let (action, message) = parse_progress(data);
                ui::display_build_action(&action, &message, false);
            }
            MessageKind::Other => debug!(event = %event, "ignoring build channel event"),
        }
    }

    /// The session log is sent under the session id. When the handshake
    /// did not name the session, every other named event is that log.
    fn classify(&self, event: &str) -> MessageKind {
        match event {
            BUILD_EVENT => MessageKind::Build,
            BUILDING_EVENT => MessageKind::Building,
            _ => match self.session_id.as_deref() {
                Some("") => MessageKind::SessionLog,
                Some(id) if id == event => MessageKind::SessionLog,
                _ => MessageKind::Other,
            },
        }
    }

    async fn finish(&mut self) -> SessionOutcome {
        self.teardown().await;
        let termination = if self.failure.is_some() {
            Termination::Failure
        } else {
            Termination::Success
        };
        self.state = SessionState::Terminated(termination);
        SessionOutcome {
            session_id: self.session_id.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Cancel the timer and close the channel, once
    async fn teardown(&mut self) {
        self.timer.cancel();
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.channel.disconnect().await {
            debug!(error = %e, "disconnect failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONNECT: Duration = Duration::from_secs(5);
    const TASK: Duration = Duration::from_secs(300);

    fn connect(id: &str) -> ChannelEvent {
        ChannelEvent::Connect { id: id.to_string() }
    }

    #[tokio::test(start_paused = true)]
    async fn test_happy_path() {
        let (channel, handle) = MockChannel::new();
        handle.push(connect("s1"));
        handle.push_build("install", "installing dependencies");
        handle.push(ChannelEvent::Message {
            event: "building".to_string(),
            data: json!("> vite build"),
        });
        handle.push(ChannelEvent::Disconnect);

        let mut session = BuildSession::new(channel, CONNECT, TASK);
        let outcome = session.run().await.unwrap();

        assert_eq!(outcome.session_id.as_deref(), Some("s1"));
        assert_eq!(outcome.failure, None);
        assert_eq!(session.state(), SessionState::Terminated(Termination::Success));
        assert_eq!(handle.emitted(), vec![("build".to_string(), Value::Null)]);
        assert_eq!(handle.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_timeout_after_connect() {
        let (channel, handle) = MockChannel::new();
        handle.push(connect("s1"));

        let mut session = BuildSession::new(channel, CONNECT, TASK);
        let err = session.run().await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::BuildSessionTimeout(TimeoutPhase::Task)
        ));
        assert_eq!(handle.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_error_tears_down() {
        let (channel, handle) = MockChannel::new();
        handle.push(connect("s1"));
        handle.push(ChannelEvent::Error("socket hang up".to_string()));

        let mut session = BuildSession::new(channel, CONNECT, TASK);
        let err = session.run().await.unwrap_err();

        assert!(matches!(err, PublishError::BuildSessionError(ref m) if m == "socket hang up"));
        assert_eq!(session.state(), SessionState::Terminated(Termination::Error));
        assert_eq!(handle.disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_failure_is_session_error() {
        let (channel, handle) = MockChannel::new();
        handle.push(connect("s1"));

        let mut session = BuildSession::new(channel.failing_emit(), CONNECT, TASK);
        let err = session.run().await.unwrap_err();

        assert!(matches!(err, PublishError::BuildSessionError(_)));
        assert_eq!(handle.disconnects(), 1);
    }

    #[test]
    fn test_parse_progress() {
        let data = json!({"data": {"action": "build failed", "payload": {"message": "exit 1"}}});
        assert_eq!(
            parse_progress(&data),
            ("build failed".to_string(), "exit 1".to_string())
        );
        assert_eq!(parse_progress(&json!({})), (String::new(), String::new()));
    }

    #[test]
    fn test_outcome_into_result() {
        let outcome = SessionOutcome {
            session_id: None,
            failure: Some(BuildFailure {
                action: "install failed".to_string(),
                message: "ENOTFOUND".to_string(),
            }),
        };
        assert!(matches!(
            outcome.into_result(),
            Err(PublishError::BuildTerminalFailure { .. })
        ));
    }

    #[test]
    fn test_classify_session_log() {
        let (channel, _handle) = MockChannel::new();
        let mut session = BuildSession::new(channel, CONNECT, TASK);
        assert_eq!(session.classify("s1"), MessageKind::Other);

        session.session_id = Some("s1".to_string());
        assert_eq!(session.classify("build"), MessageKind::Build);
        assert_eq!(session.classify("building"), MessageKind::Building);
        assert_eq!(session.classify("s1"), MessageKind::SessionLog);
        assert_eq!(session.classify("s2"), MessageKind::Other);

        session.session_id = Some(String::new());
        assert_eq!(session.classify("s2"), MessageKind::SessionLog);
        assert_eq!(session.classify("build"), MessageKind::Build);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_deadline_counts_time_before_run() {
        let (channel, handle) = MockChannel::new();
        let deadline = Instant::now() + CONNECT;
        tokio::time::sleep(Duration::from_secs(4)).await;

        let pusher = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            pusher.push(connect("late"));
        });

        let started = Instant::now();
        let mut session = BuildSession::new(channel, CONNECT, TASK).connect_by(deadline);
        let err = session.run().await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::BuildSessionTimeout(TimeoutPhase::Connect)
        ));
        assert!(Instant::now() >= deadline);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(handle.emitted().is_empty());
    }
}
