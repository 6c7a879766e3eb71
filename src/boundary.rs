use std::fmt;

/// Non-fatal conditions met while publishing.
/// These are reported to the user; the workflow carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryWarning {
    /// A stash entry was popped back onto the working tree
    StashRestored { remaining: usize },
    /// The remote has no `master`, nothing to merge
    RemoteMasterMissing { remote: String },
    /// The declared version was bumped past an existing release
    VersionBumped {
        declared: String,
        release: String,
        effective: String,
    },
    /// The remote build reported a failure action before disconnecting
    BuildFailureObserved { action: String, message: String },
    /// A newer release of this CLI is published
    UpdateAvailable { current: String, latest: String },
    /// The npm registry could not be queried
    RegistryUnreachable { reason: String },
}

impl fmt::Display for BoundaryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryWarning::StashRestored { remaining } => {
                write!(
                    f,
                    "Restored the latest stash entry onto the working tree ({} left)",
                    remaining
                )
            }
            BoundaryWarning::RemoteMasterMissing { remote } => {
                write!(f, "Remote '{}' has no master branch, merge skipped", remote)
            }
            BoundaryWarning::VersionBumped {
                declared,
                release,
                effective,
            } => write!(
                f,
                "Version {} is not newer than release {}, publishing {}",
                declared, release, effective
            ),
            BoundaryWarning::BuildFailureObserved { action, message } => {
                write!(f, "Remote build reported '{}': {}", action, message)
            }
            BoundaryWarning::UpdateAvailable { current, latest } => write!(
                f,
                "A newer cloud-publish is available: {} (current {})",
                latest, current
            ),
            BoundaryWarning::RegistryUnreachable { reason } => {
                write!(f, "Could not check for updates: {}", reason)
            }
        }
    }
}
