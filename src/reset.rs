//! Destroy and recreate the test-repository workspace.
//!
//! Removal of the previous tree is best effort: a failure is logged and
//! recorded in the [`ResetReport`], and the run carries on. Creating the new
//! tree is not recoverable and surfaces as an error.

use std::fs;
use std::io;

use anyhow::{Context, Result};
use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::layout::Layout;
use crate::util;

/// What happened to the tree that was there before the reset.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Removal {
    /// Nothing occupied the workspace root.
    Absent,
    Removed,
    /// Removal failed; leftovers may remain under the root.
    Failed(String),
    /// Dry run; an existing tree would have been removed.
    Skipped,
}

#[derive(Clone, Debug)]
pub struct ResetReport {
    pub layout: Layout,
    pub removal: Removal,
    pub dry_run: bool,
}

pub fn reset(layout: &Layout, dry_run: bool) -> Result<ResetReport> {
    reset_with(layout, dry_run, util::fs::remove_entry)
}

/// Reset using `remove` to clear an existing workspace root.
pub fn reset_with<F>(layout: &Layout, dry_run: bool, remove: F) -> Result<ResetReport>
where
    F: FnOnce(&Utf8Path) -> io::Result<()>,
{
    let root = layout.root();
    let removal = if !util::fs::occupied(root) {
        debug!(path = %root, "workspace root absent");
        Removal::Absent
    } else if dry_run {
        info!(path = %root, "(dry-run) would remove workspace root");
        Removal::Skipped
    } else {
        match remove(root) {
            Ok(()) => {
                info!(path = %root, "removed workspace root");
                Removal::Removed
            }
            Err(err) => {
                warn!(path = %root, error = %err, "failed to remove workspace root; continuing");
                Removal::Failed(err.to_string())
            }
        }
    };

    if dry_run {
        info!(path = %layout.placeholder_path(), "(dry-run) would create placeholder");
        return Ok(ResetReport {
            layout: layout.clone(),
            removal,
            dry_run,
        });
    }

    util::fs::ensure_dir(root).with_context(|| format!("creating workspace root {}", root))?;
    let repo_dir = layout.repo_dir();
    util::fs::ensure_dir(repo_dir)
        .with_context(|| format!("creating repository directory {}", repo_dir))?;
    let placeholder = layout.placeholder_path();
    fs::write(placeholder, layout.contents())
        .with_context(|| format!("writing placeholder {}", placeholder))?;
    info!(path = %placeholder, "wrote placeholder");

    Ok(ResetReport {
        layout: layout.clone(),
        removal,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResetConfig;
    use crate::layout::{self, Variant};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn layout_in(tmp: &TempDir, variant: Variant) -> Layout {
        let base = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        Layout::new(&base, &ResetConfig::default(), variant).unwrap()
    }

    fn snapshot(dir: &Utf8Path) -> Vec<(String, Option<String>)> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_owned()];
        while let Some(current) = stack.pop() {
            for entry in current.read_dir_utf8().unwrap() {
                let entry = entry.unwrap();
                let rel = entry.path().strip_prefix(dir).unwrap().to_string();
                if entry.file_type().unwrap().is_dir() {
                    stack.push(entry.path().to_owned());
                    out.push((rel, None));
                } else {
                    out.push((rel, Some(fs::read_to_string(entry.path()).unwrap())));
                }
            }
        }
        out.sort();
        out
    }

    #[test]
    fn creates_layout_from_scratch() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);

        let report = reset(&layout, false).unwrap();

        assert_eq!(report.removal, Removal::Absent);
        assert_eq!(
            fs::read_to_string(layout.placeholder_path()).unwrap(),
            "This is a placeholder file."
        );
        assert!(layout::inspect(&layout).unwrap().is_empty());
    }

    #[test]
    fn wipes_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        fs::create_dir_all(layout.root().join("old-repo").join("media")).unwrap();
        fs::write(layout.root().join("old-repo").join("media").join("a.mp3"), "x").unwrap();
        fs::create_dir_all(layout.repo_dir()).unwrap();
        fs::write(layout.repo_dir().join("playlists.db"), "stale").unwrap();

        let report = reset(&layout, false).unwrap();

        assert_eq!(report.removal, Removal::Removed);
        assert!(layout::inspect(&layout).unwrap().is_empty());
        assert_eq!(
            snapshot(layout.root()),
            vec![
                (".playrepo".to_owned(), None),
                (
                    ".playrepo/placeholder".to_owned(),
                    Some("This is a placeholder file.".to_owned())
                ),
            ]
        );
    }

    #[test]
    fn running_twice_yields_identical_tree() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Simple);

        reset(&layout, false).unwrap();
        let first = snapshot(layout.root());
        let report = reset(&layout, false).unwrap();
        let second = snapshot(layout.root());

        assert_eq!(report.removal, Removal::Removed);
        assert_eq!(first, second);
        assert_eq!(
            fs::read_to_string(layout.placeholder_path()).unwrap(),
            "placeholder"
        );
    }

    #[test]
    fn removal_failure_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        fs::create_dir_all(layout.root()).unwrap();
        fs::write(layout.root().join("locked.db"), "in use").unwrap();

        let report = reset_with(&layout, false, |_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"))
        })
        .unwrap();

        assert_eq!(report.removal, Removal::Failed("access denied".to_owned()));
        assert!(layout.root().join("locked.db").exists());
        assert_eq!(
            fs::read_to_string(layout.placeholder_path()).unwrap(),
            "This is a placeholder file."
        );
    }

    #[test]
    fn root_occupied_by_file_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        fs::write(layout.root(), "not a directory").unwrap();

        let report = reset(&layout, false).unwrap();

        assert_eq!(report.removal, Removal::Removed);
        assert!(layout::inspect(&layout).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_root_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        std::os::unix::fs::symlink(tmp.path().join("gone"), layout.root()).unwrap();
        assert!(!layout.root().exists());

        let report = reset(&layout, false).unwrap();

        assert_eq!(report.removal, Removal::Removed);
        assert!(!fs::symlink_metadata(layout.root()).unwrap().file_type().is_symlink());
        assert!(layout::inspect(&layout).unwrap().is_empty());
    }

    #[test]
    fn creation_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        fs::write(layout.root(), "blocker").unwrap();

        // Removal "fails", leaving a file where the root directory must go.
        let err = reset_with(&layout, false, |_| {
            Err(io::Error::other("busy"))
        })
        .unwrap_err();

        assert!(err.to_string().contains("creating workspace root"));
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp, Variant::Full);
        fs::create_dir_all(layout.root()).unwrap();
        fs::write(layout.root().join("keep.txt"), "still here").unwrap();

        let report = reset(&layout, true).unwrap();

        assert!(report.dry_run);
        assert_eq!(report.removal, Removal::Skipped);
        assert!(layout.root().join("keep.txt").exists());
        assert!(!layout.placeholder_path().exists());
    }
}
