//! Containment tests for the path guard.
//!
//! Property under test: a restricted resolve either returns a path
//! whose canonical form lies inside the canonical workspace, or fails.
//! No success ever names an outside location.

use picoclaw_sandbox::resolve_path;
use std::path::PathBuf;
use tempfile::TempDir;

fn ws(root: &TempDir) -> &str {
    root.path().to_str().unwrap()
}

#[test]
fn successful_resolutions_stay_inside_the_workspace() {
    let root = TempDir::new().unwrap();
    let canonical_ws = std::fs::canonicalize(root.path()).unwrap();

    let candidates = [
        "a.txt",
        "a/b/c.txt",
        "./x/../y.txt",
        "deep/../shallow.txt",
        ".hidden",
    ];
    for candidate in candidates {
        let resolved = resolve_path(candidate, ws(&root), true).unwrap();
        let within = resolved.starts_with(root.path())
            || resolved.starts_with(&canonical_ws);
        assert!(within, "{candidate} resolved to {}", resolved.display());
    }
}

#[test]
fn traversal_attempts_fail() {
    let root = TempDir::new().unwrap();
    for candidate in ["..", "../x", "a/../../x", "/etc/passwd"] {
        let err = resolve_path(candidate, ws(&root), true).unwrap_err();
        assert!(
            err.to_string().contains("outside the workspace"),
            "{candidate}: {err}"
        );
    }
}

#[test]
fn absolute_path_inside_workspace_is_accepted() {
    let root = TempDir::new().unwrap();
    let inside = root.path().join("file.txt");
    let got = resolve_path(inside.to_str().unwrap(), ws(&root), true).unwrap();
    assert_eq!(got, inside);
}

#[test]
fn empty_workspace_passes_paths_through() {
    assert_eq!(
        resolve_path("anything/../at/all", "", true).unwrap(),
        PathBuf::from("anything/../at/all")
    );
}

#[cfg(unix)]
#[test]
fn lexically_inside_but_symlinked_outside_fails() {
    let root = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    std::os::unix::fs::symlink(outside.path(), root.path().join("vault")).unwrap();

    // Existing target behind the link.
    std::fs::write(outside.path().join("data.txt"), b"x").unwrap();
    let err = resolve_path("vault/data.txt", ws(&root), true).unwrap_err();
    assert!(err.to_string().contains("symlink"), "{err}");

    // Not-yet-existing target behind the link.
    let err = resolve_path("vault/new.txt", ws(&root), true).unwrap_err();
    assert!(err.to_string().contains("symlink"), "{err}");
}

#[cfg(unix)]
#[test]
fn symlink_inside_workspace_is_fine() {
    let root = TempDir::new().unwrap();
    std::fs::create_dir_all(root.path().join("real")).unwrap();
    std::fs::write(root.path().join("real/data.txt"), b"x").unwrap();
    std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();

    let got = resolve_path("alias/data.txt", ws(&root), true).unwrap();
    assert_eq!(got, root.path().join("alias/data.txt"));
}
