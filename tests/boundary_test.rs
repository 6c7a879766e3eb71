use cloud_publish::boundary::BoundaryWarning;
use cloud_publish::ui;

// ============================================================================
// BoundaryWarning Display Tests
// ============================================================================

#[test]
fn test_boundary_warning_stash_restored_display() {
    let warning = BoundaryWarning::StashRestored { remaining: 2 };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("stash"),
        "Message should mention the stash, got: {}",
        display_msg
    );
    assert!(
        display_msg.contains("2 left"),
        "Message should contain remaining count, got: {}",
        display_msg
    );
}

#[test]
fn test_boundary_warning_remote_master_missing_display() {
    let warning = BoundaryWarning::RemoteMasterMissing {
        remote: "origin".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("'origin'") && display_msg.contains("master"),
        "Message should name remote and branch, got: {}",
        display_msg
    );
}

#[test]
fn test_boundary_warning_version_bumped_display() {
    let warning = BoundaryWarning::VersionBumped {
        declared: "1.0.0".to_string(),
        release: "1.0.0".to_string(),
        effective: "1.1.0".to_string(),
    };

    let display_msg = warning.to_string();
    assert_eq!(
        display_msg,
        "Version 1.0.0 is not newer than release 1.0.0, publishing 1.1.0"
    );
}

#[test]
fn test_boundary_warning_build_failure_display() {
    let warning = BoundaryWarning::BuildFailureObserved {
        action: "install failed".to_string(),
        message: "npm ERR! 404".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(
        display_msg.contains("install failed") && display_msg.contains("npm ERR! 404"),
        "Message should contain action and message, got: {}",
        display_msg
    );
}

#[test]
fn test_boundary_warning_update_available_display() {
    let warning = BoundaryWarning::UpdateAvailable {
        current: "0.1.0".to_string(),
        latest: "0.3.2".to_string(),
    };

    let display_msg = warning.to_string();
    assert!(display_msg.contains("0.3.2"));
    assert!(display_msg.contains("current 0.1.0"));
}

#[test]
fn test_boundary_warning_equality() {
    let a = BoundaryWarning::StashRestored { remaining: 0 };
    let b = BoundaryWarning::StashRestored { remaining: 0 };
    let c = BoundaryWarning::StashRestored { remaining: 1 };
    assert_eq!(a, b);
    assert_ne!(a, c);
}

// ============================================================================
// UI Display Tests
// ============================================================================

#[test]
fn test_display_boundary_warning_does_not_panic() {
    // Visual verification test - output is printed to stderr
    ui::display_boundary_warning(&BoundaryWarning::RegistryUnreachable {
        reason: "offline".to_string(),
    });
}

#[test]
fn test_format_build_action_failure_and_progress() {
    console::set_colors_enabled(false);
    assert_eq!(
        ui::formatter::format_build_action("build failed", "exit 1", true),
        "[build] build failed exit 1"
    );
    assert_eq!(
        ui::formatter::format_build_action("download", "", false),
        "[build] download"
    );
}
