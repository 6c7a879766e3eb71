use std::fmt;

use thiserror::Error;

/// Workflow phase a fatal error surfaced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Negotiation,
    Reconciliation,
    Build,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Negotiation => "negotiation",
            Phase::Reconciliation => "reconciliation",
            Phase::Build => "build",
        };
        f.write_str(name)
    }
}

/// Build session deadline that expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Task,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connect"),
            TimeoutPhase::Task => f.write_str("task"),
        }
    }
}

/// Unified error type for cloud-publish operations
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Invalid version policy: {0}")]
    InvalidVersionPolicy(String),

    #[error("Merge conflict in working tree, resolve manually and retry: {}", .paths.join(", "))]
    MergeConflict { paths: Vec<String> },

    #[error("VCS operation failed: {0}")]
    Vcs(String),

    #[error("Platform request failed: {0}")]
    Platform(String),

    #[error("Build artifact missing: {0}")]
    BuildArtifactMissing(String),

    #[error("Manifest misconfigured: {0}")]
    ManifestMisconfigured(String),

    #[error("Illegal build command '{0}': only npm or cnpm are allowed")]
    IllegalBuildCommand(String),

    #[error("Unknown build script '{script}' for command '{command}'")]
    UnknownBuildScript { command: String, script: String },

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Build session {0} timeout")]
    BuildSessionTimeout(TimeoutPhase),

    #[error("Build session channel error: {0}")]
    BuildSessionError(String),

    #[error("Remote build reported '{action}': {message}")]
    BuildTerminalFailure { action: String, message: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{phase} failed: {source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: Box<PublishError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results in cloud-publish
pub type Result<T> = std::result::Result<T, PublishError>;

impl PublishError {
    pub fn vcs(msg: impl Into<String>) -> Self {
        PublishError::Vcs(msg.into())
    }

    pub fn platform(msg: impl Into<String>) -> Self {
        PublishError::Platform(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PublishError::Config(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        PublishError::Registry(msg.into())
    }

    pub fn version_policy(msg: impl Into<String>) -> Self {
        PublishError::InvalidVersionPolicy(msg.into())
    }

    pub fn manifest(msg: impl Into<String>) -> Self {
        PublishError::ManifestMisconfigured(msg.into())
    }

    /// Tag this error with the workflow phase it aborted.
    ///
    /// An error already tagged keeps its original phase.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            PublishError::PhaseFailed { .. } => self,
            other => PublishError::PhaseFailed {
                phase,
                source: Box::new(other),
            },
        }
    }

    /// Phase the error was tagged with, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            PublishError::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<git2::Error> for PublishError {
    fn from(err: git2::Error) -> Self {
        PublishError::Vcs(err.message().to_string())
    }
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Platform(err.to_string())
    }
}

/// Extension for tagging results with a workflow phase
pub trait PhaseExt<T> {
    fn phase(self, phase: Phase) -> Result<T>;
}

impl<T> PhaseExt<T> for Result<T> {
    fn phase(self, phase: Phase) -> Result<T> {
        self.map_err(|e| e.in_phase(phase))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PublishError::config("missing home");
        assert_eq!(err.to_string(), "Configuration error: missing home");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PublishError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_merge_conflict_lists_paths() {
        let err = PublishError::MergeConflict {
            paths: vec!["src/a.js".to_string(), "package.json".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("src/a.js, package.json"));
    }

    #[test]
    fn test_phase_wrapping_names_phase_and_cause() {
        let err = PublishError::vcs("remote rejected").in_phase(Phase::Reconciliation);
        assert_eq!(err.phase(), Some(Phase::Reconciliation));
        assert_eq!(
            err.to_string(),
            "reconciliation failed: VCS operation failed: remote rejected"
        );
    }

    #[test]
    fn test_phase_wrapping_keeps_first_phase() {
        let err = PublishError::BuildSessionTimeout(TimeoutPhase::Connect)
            .in_phase(Phase::Build)
            .in_phase(Phase::Prepare);
        assert_eq!(err.phase(), Some(Phase::Build));
        assert!(err.to_string().contains("connect timeout"));
    }

    #[test]
    fn test_phase_ext_on_result() {
        let result: Result<()> = Err(PublishError::version_policy("missing increment"));
        let err = result.phase(Phase::Negotiation).unwrap_err();
        assert!(err.to_string().starts_with("negotiation failed"));
    }

    #[test]
    fn test_error_messages_are_descriptive() {
        let error_pairs = vec![
            (PublishError::vcs("x"), "VCS operation failed"),
            (PublishError::platform("x"), "Platform request failed"),
            (PublishError::version_policy("x"), "Invalid version policy"),
            (PublishError::manifest("x"), "Manifest misconfigured"),
            (
                PublishError::IllegalBuildCommand("yarn build".into()),
                "Illegal build command",
            ),
        ];

        for (err, expected_prefix) in error_pairs {
            let msg = err.to_string();
            assert!(
                msg.starts_with(expected_prefix),
                "Error message should start with '{}', but got '{}'",
                expected_prefix,
                msg
            );
        }
    }
}
