use std::fmt::Write as _;
use std::fs;

use anyhow::{Context, Result, bail};
use camino::{Utf8Component, Utf8Path};
use serde::Deserialize;
use toml_edit::{DocumentMut, value};

use crate::layout::{
    DEFAULT_PLACEHOLDER_NAME, DEFAULT_REPO_DIR, DEFAULT_WORKSPACE_DIR, Variant,
};
use crate::templates;

pub const CONFIG_FILENAME: &str = "testrepos.toml";
const EXAMPLE_TEMPLATE: &str = "config/example.testrepos.toml";

/// Keys accepted by `config set`.
pub const KNOWN_KEYS: &[&str] = &[
    "base_dir",
    "workspace_dir",
    "repo_dir",
    "placeholder_name",
    "variant",
    "placeholder_contents",
];

/// Keys naming a single path segment under the base directory.
const NAME_KEYS: &[&str] = &["workspace_dir", "repo_dir", "placeholder_name"];

/// Optional overrides read from `testrepos.toml`. Missing fields fall back to the built-in layout.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResetConfig {
    pub base_dir: Option<String>,
    pub workspace_dir: Option<String>,
    pub repo_dir: Option<String>,
    pub placeholder_name: Option<String>,
    pub variant: Option<Variant>,
    pub placeholder_contents: Option<String>,
}

impl ResetConfig {
    pub fn workspace_dir(&self) -> &str {
        self.workspace_dir.as_deref().unwrap_or(DEFAULT_WORKSPACE_DIR)
    }

    pub fn repo_dir(&self) -> &str {
        self.repo_dir.as_deref().unwrap_or(DEFAULT_REPO_DIR)
    }

    pub fn placeholder_name(&self) -> &str {
        self.placeholder_name
            .as_deref()
            .unwrap_or(DEFAULT_PLACEHOLDER_NAME)
    }

    pub fn variant(&self) -> Variant {
        self.variant.unwrap_or_default()
    }

    /// Reject entity names that would escape their parent directory.
    pub fn validate(&self) -> Result<()> {
        validate_name("workspace_dir", self.workspace_dir())?;
        validate_name("repo_dir", self.repo_dir())?;
        validate_name("placeholder_name", self.placeholder_name())
    }
}

/// A name must be exactly one normal path component: no separators, no `.`/`..`, not empty.
pub fn validate_name(key: &str, name: &str) -> Result<()> {
    let mut components = Utf8Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(part)), None) if part == name => Ok(()),
        _ => bail!(
            "invalid {} `{}`; expected a single directory or file name",
            key,
            name
        ),
    }
}

/// Load a configuration file from disk and deserialize it.
pub fn load_from_path(path: &Utf8Path) -> Result<ResetConfig> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
    let config: ResetConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path))?;
    config
        .validate()
        .with_context(|| format!("validating config {}", path))?;
    Ok(config)
}

/// Like [`load_from_path`], but an absent file yields the defaults.
pub fn load_or_default(path: &Utf8Path) -> Result<ResetConfig> {
    if !path.exists() {
        return Ok(ResetConfig::default());
    }
    load_from_path(path)
}

pub fn write_example_config(path: &Utf8Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists; rerun with --force to overwrite", path);
    }

    templates::write_template(path, EXAMPLE_TEMPLATE)
}

/// Set a single top-level key, keeping the rest of the document (comments included) intact.
pub fn set_value(path: &Utf8Path, key: &str, raw: &str) -> Result<()> {
    if !KNOWN_KEYS.contains(&key) {
        bail!(
            "unknown config key `{}`; expected one of: {}",
            key,
            KNOWN_KEYS.join(", ")
        );
    }
    if key == "variant" && Variant::parse(raw).is_none() {
        bail!("invalid variant `{}`; expected `full` or `simple`", raw);
    }
    if NAME_KEYS.contains(&key) {
        validate_name(key, raw)?;
    }

    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent))?;
        }
    }

    let mut doc: DocumentMut = if path.exists() {
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        raw.parse()
            .with_context(|| format!("parsing config {}", path))?
    } else {
        DocumentMut::new()
    };

    doc[key] = value(raw);

    fs::write(path, doc.to_string()).with_context(|| format!("writing config {}", path))
}

pub fn format_summary(config: &ResetConfig) -> String {
    let mut out = String::new();
    let base = config.base_dir.as_deref().unwrap_or("<auto>");
    let contents = config
        .placeholder_contents
        .as_deref()
        .unwrap_or_else(|| config.variant().contents());

    let _ = writeln!(out, "Base directory: {}", base);
    let _ = writeln!(out, "Workspace directory: {}", config.workspace_dir());
    let _ = writeln!(out, "Repository directory: {}", config.repo_dir());
    let _ = writeln!(out, "Placeholder file: {}", config.placeholder_name());
    let _ = writeln!(out, "Variant: {}", config.variant().as_str());
    let _ = write!(out, "Placeholder contents: {:?}", contents);

    out
}
