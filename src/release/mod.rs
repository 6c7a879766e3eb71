//! Release workflow engine: version sets, branch negotiation and working
//! tree reconciliation.

pub mod negotiator;
pub mod reconciler;
pub mod resolver;

pub use negotiator::{ask_increment, needs_increment, negotiate};
pub use reconciler::Reconciler;
pub use resolver::{RefKind, RemoteRef, VersionSet};

use crate::boundary::BoundaryWarning;
use crate::domain::{BranchDecision, IncrementClass, Manifest, RepositoryContext};
use crate::error::Result;
use crate::git::{Vcs, ORIGIN};
use crate::ui::Prompt;

/// Negotiate the working branch for `ctx` from a fresh ref listing.
///
/// The increment class comes from `increment` or, when the declared version
/// needs one, from `prompt`. A changed version is written to the manifest
/// right away. The decision is applied to `ctx`.
pub fn negotiate_branch(
    vcs: &dyn Vcs,
    prompt: &mut dyn Prompt,
    ctx: &mut RepositoryContext,
    manifest: &mut Manifest,
    increment: Option<IncrementClass>,
) -> Result<(BranchDecision, Option<BoundaryWarning>)> {
    let listing = vcs.list_remote_refs(ORIGIN)?;
    let releases = VersionSet::resolve(&listing, RefKind::ReleaseTag)?;
    let declared = ctx.declared_version().clone();

    let increment = match (increment, releases.latest()) {
        (Some(class), _) => Some(class),
        (None, Some(latest)) if needs_increment(&declared, &releases) => {
            Some(ask_increment(prompt, latest)?)
        }
        (None, _) => None,
    };

    let decision = negotiate(&declared, &releases, increment)?;

    let warning = if decision.version_changed {
        manifest.sync_version(&decision.version.to_string())?;
        releases.latest().map(|release| BoundaryWarning::VersionBumped {
            declared: declared.to_string(),
            release: release.to_string(),
            effective: decision.version.to_string(),
        })
    } else {
        None
    };

    ctx.apply(&decision);
    Ok((decision, warning))
}
