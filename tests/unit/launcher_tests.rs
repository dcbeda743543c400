//! Unit tests for PATH discovery of terminal emulators.
//!
//! These mutate the process `PATH`, so they are serialized.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use serial_test::serial;

use termlink::session::launcher::find_on_path;

/// Point `PATH` at `dir` alone, run `body`, and restore the original.
fn with_path<T>(dir: &std::path::Path, body: impl FnOnce() -> T) -> T {
    let original: Option<OsString> = env::var_os("PATH");
    env::set_var("PATH", dir);
    let outcome = body();
    match original {
        Some(value) => env::set_var("PATH", value),
        None => env::remove_var("PATH"),
    }
    outcome
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("set execute bit");
}

/// An executable file in a `PATH` directory is found under its name.
#[test]
#[serial]
fn finds_executable_on_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = dir.path().join("fake-terminal");
    std::fs::write(&tool, b"#!/bin/sh\n").expect("write stub");
    #[cfg(unix)]
    make_executable(&tool);

    let found: Option<PathBuf> = with_path(dir.path(), || find_on_path("fake-terminal"));

    assert_eq!(found, Some(tool), "stub must be discovered by name");
}

/// A name absent from every `PATH` directory is not found.
#[test]
#[serial]
fn absent_name_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");

    let found = with_path(dir.path(), || find_on_path("no-such-terminal"));

    assert_eq!(found, None);
}

/// A matching file without the execute bit is skipped.
#[cfg(unix)]
#[test]
#[serial]
fn non_executable_file_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let tool = dir.path().join("fake-terminal");
    std::fs::write(&tool, b"data").expect("write stub");
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644))
        .expect("clear execute bit");

    let found = with_path(dir.path(), || find_on_path("fake-terminal"));

    assert_eq!(found, None, "file without the execute bit must be skipped");
}

/// A directory whose name matches is never treated as an executable.
#[test]
#[serial]
fn directory_with_matching_name_is_skipped() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("fake-terminal")).expect("create decoy dir");

    let found = with_path(dir.path(), || find_on_path("fake-terminal"));

    assert_eq!(found, None, "directories must not satisfy discovery");
}
