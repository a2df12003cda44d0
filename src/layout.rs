use std::fmt;
use std::fs;
use std::io;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::config::ResetConfig;

pub const DEFAULT_WORKSPACE_DIR: &str = "testrepos";
pub const DEFAULT_REPO_DIR: &str = ".playrepo";
pub const DEFAULT_PLACEHOLDER_NAME: &str = "placeholder";
pub const FULL_PLACEHOLDER: &str = "This is a placeholder file.";
pub const SIMPLE_PLACEHOLDER: &str = "placeholder";

/// Which placeholder text the reset writes.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    #[default]
    Full,
    Simple,
}

impl Variant {
    pub fn contents(&self) -> &'static str {
        match self {
            Variant::Full => FULL_PLACEHOLDER,
            Variant::Simple => SIMPLE_PLACEHOLDER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Full => "full",
            Variant::Simple => "simple",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(Variant::Full),
            "simple" => Some(Variant::Simple),
            _ => None,
        }
    }
}

/// Fully resolved paths and content for one workspace.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
pub struct Layout {
    root: Utf8PathBuf,
    repo_dir: Utf8PathBuf,
    placeholder_path: Utf8PathBuf,
    contents: String,
}

impl Layout {
    pub fn new(base: &Utf8Path, config: &ResetConfig, variant: Variant) -> Result<Self> {
        config.validate()?;
        let root = base.join(config.workspace_dir());
        let repo_dir = root.join(config.repo_dir());
        let placeholder_path = repo_dir.join(config.placeholder_name());
        let contents = config
            .placeholder_contents
            .clone()
            .unwrap_or_else(|| variant.contents().to_owned());
        Ok(Self {
            root,
            repo_dir,
            placeholder_path,
            contents,
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn repo_dir(&self) -> &Utf8Path {
        &self.repo_dir
    }

    pub fn placeholder_path(&self) -> &Utf8Path {
        &self.placeholder_path
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

/// A way the tree on disk differs from a freshly reset workspace.
#[derive(Clone, Debug, Serialize, Eq, PartialEq)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum LayoutIssue {
    MissingRoot(Utf8PathBuf),
    RootNotDirectory(Utf8PathBuf),
    MissingRepoDir(Utf8PathBuf),
    RepoDirNotDirectory(Utf8PathBuf),
    MissingPlaceholder(Utf8PathBuf),
    PlaceholderNotFile(Utf8PathBuf),
    ContentMismatch(Utf8PathBuf),
    UnexpectedEntry(Utf8PathBuf),
}

impl fmt::Display for LayoutIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutIssue::MissingRoot(path) => write!(f, "workspace root {path} does not exist"),
            LayoutIssue::RootNotDirectory(path) => {
                write!(f, "workspace root {path} is not a directory")
            }
            LayoutIssue::MissingRepoDir(path) => write!(f, "repository directory {path} is missing"),
            LayoutIssue::RepoDirNotDirectory(path) => {
                write!(f, "repository directory {path} is not a directory")
            }
            LayoutIssue::MissingPlaceholder(path) => write!(f, "placeholder {path} is missing"),
            LayoutIssue::PlaceholderNotFile(path) => {
                write!(f, "placeholder {path} is not a regular file")
            }
            LayoutIssue::ContentMismatch(path) => {
                write!(f, "placeholder {path} has unexpected content")
            }
            LayoutIssue::UnexpectedEntry(path) => write!(f, "unexpected entry {path}"),
        }
    }
}

/// Compare what is on disk against the state a reset would leave behind.
pub fn inspect(layout: &Layout) -> Result<Vec<LayoutIssue>> {
    let mut issues = Vec::new();

    let Some(root_meta) = metadata(layout.root())? else {
        issues.push(LayoutIssue::MissingRoot(layout.root().to_owned()));
        return Ok(issues);
    };
    if !root_meta.is_dir() {
        issues.push(LayoutIssue::RootNotDirectory(layout.root().to_owned()));
        return Ok(issues);
    }
    unexpected_entries(layout.root(), layout.repo_dir(), &mut issues)?;

    let Some(repo_meta) = metadata(layout.repo_dir())? else {
        issues.push(LayoutIssue::MissingRepoDir(layout.repo_dir().to_owned()));
        return Ok(issues);
    };
    if !repo_meta.is_dir() {
        issues.push(LayoutIssue::RepoDirNotDirectory(layout.repo_dir().to_owned()));
        return Ok(issues);
    }
    unexpected_entries(layout.repo_dir(), layout.placeholder_path(), &mut issues)?;

    let placeholder = layout.placeholder_path();
    match metadata(placeholder)? {
        None => issues.push(LayoutIssue::MissingPlaceholder(placeholder.to_owned())),
        Some(meta) if !meta.is_file() => {
            issues.push(LayoutIssue::PlaceholderNotFile(placeholder.to_owned()));
        }
        Some(_) => {
            let actual =
                fs::read(placeholder).with_context(|| format!("reading {}", placeholder))?;
            if actual != layout.contents().as_bytes() {
                issues.push(LayoutIssue::ContentMismatch(placeholder.to_owned()));
            }
        }
    }

    Ok(issues)
}

fn metadata(path: &Utf8Path) -> Result<Option<fs::Metadata>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("inspecting {}", path)),
    }
}

fn unexpected_entries(
    dir: &Utf8Path,
    expected: &Utf8Path,
    issues: &mut Vec<LayoutIssue>,
) -> Result<()> {
    let mut extra = Vec::new();
    for entry in dir
        .read_dir_utf8()
        .with_context(|| format!("listing {}", dir))?
    {
        let entry = entry.with_context(|| format!("listing {}", dir))?;
        if entry.path() != expected {
            extra.push(entry.path().to_owned());
        }
    }
    extra.sort();
    issues.extend(extra.into_iter().map(LayoutIssue::UnexpectedEntry));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap()
    }

    fn build(layout: &Layout) {
        fs::create_dir_all(layout.repo_dir()).unwrap();
        fs::write(layout.placeholder_path(), layout.contents()).unwrap();
    }

    #[test]
    fn default_layout_matches_playrepo_convention() {
        let layout = Layout::new(
            Utf8Path::new("/srv/project"),
            &ResetConfig::default(),
            Variant::Full,
        )
        .unwrap();
        assert_eq!(layout.root(), "/srv/project/testrepos");
        assert_eq!(layout.repo_dir(), "/srv/project/testrepos/.playrepo");
        assert_eq!(
            layout.placeholder_path(),
            "/srv/project/testrepos/.playrepo/placeholder"
        );
        assert_eq!(layout.contents(), "This is a placeholder file.");
    }

    #[test]
    fn explicit_contents_override_variant() {
        let config = ResetConfig {
            placeholder_contents: Some("custom".to_owned()),
            ..ResetConfig::default()
        };
        let layout = Layout::new(Utf8Path::new("/b"), &config, Variant::Simple).unwrap();
        assert_eq!(layout.contents(), "custom");

        let simple =
            Layout::new(Utf8Path::new("/b"), &ResetConfig::default(), Variant::Simple).unwrap();
        assert_eq!(simple.contents(), "placeholder");
    }

    #[test]
    fn clean_tree_has_no_issues() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(&base(&tmp), &ResetConfig::default(), Variant::Full).unwrap();
        build(&layout);
        assert!(inspect(&layout).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_reported() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(&base(&tmp), &ResetConfig::default(), Variant::Full).unwrap();
        assert_eq!(
            inspect(&layout).unwrap(),
            vec![LayoutIssue::MissingRoot(layout.root().to_owned())]
        );
    }

    #[test]
    fn stray_entries_and_wrong_content_are_reported() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(&base(&tmp), &ResetConfig::default(), Variant::Full).unwrap();
        build(&layout);
        fs::write(layout.root().join("leftover.db"), "old").unwrap();
        fs::write(layout.placeholder_path(), "This is a placeholder file.\n").unwrap();

        let issues = inspect(&layout).unwrap();
        assert_eq!(
            issues,
            vec![
                LayoutIssue::UnexpectedEntry(layout.root().join("leftover.db")),
                LayoutIssue::ContentMismatch(layout.placeholder_path().to_owned()),
            ]
        );
    }

    #[test]
    fn names_escaping_the_base_are_refused() {
        let tmp = TempDir::new().unwrap();
        let project = base(&tmp);
        fs::create_dir_all(project.join("src")).unwrap();

        for workspace_dir in ["", "..", "/", "."] {
            let config = ResetConfig {
                workspace_dir: Some(workspace_dir.to_owned()),
                ..ResetConfig::default()
            };
            assert!(
                Layout::new(&project, &config, Variant::Full).is_err(),
                "accepted workspace_dir {workspace_dir:?}"
            );
        }

        let nested = ResetConfig {
            repo_dir: Some("meta/.playrepo".to_owned()),
            ..ResetConfig::default()
        };
        assert!(Layout::new(&project, &nested, Variant::Full).is_err());
        assert!(project.join("src").is_dir());
    }

    #[test]
    fn variant_round_trips_through_names() {
        for variant in [Variant::Full, Variant::Simple] {
            assert_eq!(Variant::parse(variant.as_str()), Some(variant));
        }
        assert_eq!(Variant::parse("verbose"), None);
    }
}
