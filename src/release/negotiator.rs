//! Branch and version negotiation against published releases.

use semver::Version;

use crate::domain::{BranchDecision, IncrementClass};
use crate::error::{PublishError, Result};
use crate::release::resolver::VersionSet;
use crate::ui::{Choice, Prompt};

/// Whether `declared` is not ahead of the latest release
pub fn needs_increment(declared: &Version, releases: &VersionSet) -> bool {
    match releases.latest() {
        Some(latest) => declared <= latest,
        None => false,
    }
}

/// Decide the working branch for `declared`.
///
/// Without releases, or with `declared` ahead of every release, the declared
/// version is kept. Otherwise the latest release is incremented by
/// `increment`, which must then be present.
pub fn negotiate(
    declared: &Version,
    releases: &VersionSet,
    increment: Option<IncrementClass>,
) -> Result<BranchDecision> {
    let latest = match releases.latest() {
        Some(latest) if declared <= latest => latest,
        _ => return Ok(BranchDecision::keep(declared.clone())),
    };

    let class = increment.ok_or_else(|| {
        PublishError::version_policy(format!(
            "version {} is not newer than release {} and no increment class was given",
            declared, latest
        ))
    })?;

    Ok(BranchDecision::bumped(class.apply(latest)))
}

/// Ask which part of `latest` to increment, defaulting to patch
pub fn ask_increment(prompt: &mut dyn Prompt, latest: &Version) -> Result<IncrementClass> {
    let choices: Vec<Choice> = IncrementClass::ALL
        .iter()
        .map(|class| {
            Choice::new(
                format!("{} ({} -> {})", class, latest, class.apply(latest)),
                class.as_str(),
            )
        })
        .collect();

    let answer = prompt.select(
        &format!("Release {} exists, choose the version increment", latest),
        &choices,
        0,
    )?;
    answer.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::resolver::RefKind;
    use crate::ui::ScriptedPrompt;

    fn releases(listing: &str) -> VersionSet {
        VersionSet::resolve(listing, RefKind::ReleaseTag).unwrap()
    }

    #[test]
    fn test_no_release_keeps_version() {
        let decision = negotiate(&Version::new(2, 0, 0), &releases(""), None).unwrap();
        assert_eq!(decision.branch, "dev/2.0.0");
        assert_eq!(decision.version, Version::new(2, 0, 0));
        assert!(!decision.version_changed);
    }

    #[test]
    fn test_ahead_of_release_keeps_version() {
        let set = releases("refs/tags/release/1.4.0\n");
        let decision = negotiate(&Version::new(1, 5, 0), &set, None).unwrap();
        assert_eq!(decision.branch, "dev/1.5.0");
        assert!(!decision.version_changed);
    }

    #[test]
    fn test_equal_to_release_with_minor() {
        let set = releases("refs/tags/release/1.0.0\n");
        let decision =
            negotiate(&Version::new(1, 0, 0), &set, Some(IncrementClass::Minor)).unwrap();
        assert_eq!(decision.branch, "dev/1.1.0");
        assert_eq!(decision.version, Version::new(1, 1, 0));
        assert!(decision.version_changed);
    }

    #[test]
    fn test_increment_applies_to_release_not_declared() {
        let set = releases("refs/tags/release/1.3.2\nrefs/tags/release/1.0.0\n");
        let decision =
            negotiate(&Version::new(1, 0, 0), &set, Some(IncrementClass::Patch)).unwrap();
        assert_eq!(decision.branch, "dev/1.3.3");
    }

    #[test]
    fn test_missing_increment_is_policy_error() {
        let set = releases("refs/tags/release/1.0.0\n");
        let err = negotiate(&Version::new(0, 9, 0), &set, None).unwrap_err();
        assert!(matches!(err, PublishError::InvalidVersionPolicy(_)));
    }

    #[test]
    fn test_needs_increment() {
        let set = releases("refs/tags/release/1.0.0\n");
        assert!(needs_increment(&Version::new(1, 0, 0), &set));
        assert!(!needs_increment(&Version::new(1, 0, 1), &set));
        assert!(!needs_increment(&Version::new(1, 0, 0), &releases("")));
    }

    #[test]
    fn test_ask_increment_uses_prompt_answer() {
        let mut prompt = ScriptedPrompt::new(["major"]);
        let class = ask_increment(&mut prompt, &Version::new(1, 2, 3)).unwrap();
        assert_eq!(class, IncrementClass::Major);
    }
}
