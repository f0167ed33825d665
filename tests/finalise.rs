//! Integration tests for the `finalise` command.
use geox_prep::cli::handle_finalise_command;
use geox_prep::log::is_logger_initialised;
use geox_prep::settings::Settings;
use tempfile::tempdir;

/// Get the first error message in the chain
fn first_error(result: anyhow::Result<()>) -> String {
    result.unwrap_err().chain().next().unwrap().to_string()
}

/// Mismatched ISO codes are rejected before anything is done.
#[test]
fn test_handle_finalise_command_bad_iso_codes() {
    let dir = tempdir().unwrap();
    let countries = ["Kenya".to_string(), "Uganda".to_string()];

    assert_eq!(
        first_error(handle_finalise_command(
            &countries,
            &[],
            dir.path(),
            Some(Settings::default())
        )),
        "Please enter the ISO codes. These are used in naming the final files."
    );
    assert_eq!(
        first_error(handle_finalise_command(
            &countries,
            &["KEN".to_string()],
            dir.path(),
            Some(Settings::default())
        )),
        "Got 1 ISO codes for 2 countries. Please enter one ISO code per country."
    );

    // Nothing was created and logging never started
    assert!(!is_logger_initialised());
    assert!(!dir.path().join("geox").exists());
}
