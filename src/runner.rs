use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::{CheckArgs, Cli, Command, ConfigCommand};
use crate::config::{self, CONFIG_FILENAME, ResetConfig};
use crate::layout::{self, Layout, LayoutIssue, Variant};
use crate::reset::{self, Removal, ResetReport};

/// Markers that identify the top of a project checkout.
const PROJECT_MARKERS: &[&str] = &[".git", "Cargo.toml"];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ConfigPathSource {
    Explicit,
    Discovered,
    HomeDefault,
}

impl ConfigPathSource {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigPathSource::Explicit => "explicit",
            ConfigPathSource::Discovered => "discovered",
            ConfigPathSource::HomeDefault => "home-default",
        }
    }
}

#[derive(Clone, Debug)]
struct ResolvedConfigPath {
    path: Utf8PathBuf,
    source: ConfigPathSource,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BaseDirSource {
    Flag,
    Config,
    ProjectRoot,
    WorkingDir,
}

impl BaseDirSource {
    fn as_str(&self) -> &'static str {
        match self {
            BaseDirSource::Flag => "--root",
            BaseDirSource::Config => "config",
            BaseDirSource::ProjectRoot => "project root",
            BaseDirSource::WorkingDir => "working directory",
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let ctx = CliContext::from(&cli);
    ctx.apply_chdir()?;
    let cwd = current_dir()?;

    match cli.command {
        Some(Command::Config { command }) => handle_config_only(&ctx, &cwd, command),
        other => {
            let state = AppState::new(ctx, &cwd)?;
            match other {
                None | Some(Command::Reset) => handle_reset(&state),
                Some(Command::Check(args)) => handle_check(&state, args),
                Some(Command::Config { .. }) => unreachable!("config commands handled earlier"),
            }
        }
    }
}

fn handle_reset(state: &AppState) -> Result<()> {
    debug!(
        base = %state.base_dir,
        source = state.base_source.as_str(),
        "resolved base directory"
    );
    let report = reset::reset(&state.layout, state.ctx.dry_run)?;
    for line in outcome_lines(&report) {
        println!("{}", line);
    }
    Ok(())
}

fn outcome_lines(report: &ResetReport) -> Vec<String> {
    let mut lines = Vec::new();
    match &report.removal {
        Removal::Failed(err) => {
            lines.push(format!("Error removing {}: {}", report.layout.root(), err));
        }
        Removal::Skipped => {
            lines.push(format!("(dry-run) would remove {}", report.layout.root()));
        }
        Removal::Absent | Removal::Removed => {}
    }

    if report.dry_run {
        lines.push(format!(
            "(dry-run) would create {}",
            report.layout.placeholder_path()
        ));
    } else {
        lines.push("Directories and placeholder file created successfully.".to_owned());
    }
    lines
}

#[derive(Serialize)]
struct CheckReport<'a> {
    layout: &'a Layout,
    ok: bool,
    issues: &'a [LayoutIssue],
}

fn handle_check(state: &AppState, args: CheckArgs) -> Result<()> {
    let issues = layout::inspect(&state.layout)?;

    if args.json {
        let report = CheckReport {
            layout: &state.layout,
            ok: issues.is_empty(),
            issues: &issues,
        };
        let rendered =
            serde_json::to_string_pretty(&report).context("serializing check report")?;
        println!("{}", rendered);
    } else if issues.is_empty() {
        println!("[ok] {} matches a fresh reset.", state.layout.root());
    } else {
        println!("[error] {} differs from a fresh reset:", state.layout.root());
        for issue in &issues {
            println!("  - {}", issue);
        }
    }

    if !issues.is_empty() {
        bail!(
            "workspace check failed with {} issue(s); run `cleantestrepos reset`",
            issues.len()
        );
    }
    Ok(())
}

fn handle_config_only(
    ctx: &CliContext,
    cwd: &Utf8Path,
    command: Option<ConfigCommand>,
) -> Result<()> {
    let resolved = ctx.resolve_config_path(cwd)?;
    let config_path = resolved.path;
    match command {
        Some(ConfigCommand::Path) => {
            println!("Config path: {} ({})", config_path, resolved.source.as_str());
            Ok(())
        }
        None | Some(ConfigCommand::Show) => {
            if !config_path.exists() {
                println!("No config found at {}; using built-in defaults.", config_path);
                println!("Use `cleantestrepos config generate` to scaffold one.");
            } else {
                println!("Config path: {} ({})", config_path, resolved.source.as_str());
            }
            let config = config::load_or_default(&config_path)?;
            println!("{}", config::format_summary(&config));
            Ok(())
        }
        Some(ConfigCommand::Generate { path, force }) => {
            let target = match path {
                Some(path) => utf8(path, "config generate path")?,
                None => config_path.clone(),
            };
            config::write_example_config(&target, force)?;
            if force {
                println!("Overwrote config at {}", target);
            } else {
                println!("Wrote example config to {}", target);
            }
            Ok(())
        }
        Some(ConfigCommand::Set { key, value }) => {
            config::set_value(&config_path, &key, &value)?;
            println!("Set `{}` = {:?} in {}", key, value, config_path);
            Ok(())
        }
    }
}

#[derive(Clone, Debug)]
struct CliContext {
    chdir: Option<PathBuf>,
    file: Option<PathBuf>,
    root: Option<PathBuf>,
    simple: bool,
    dry_run: bool,
}

impl CliContext {
    fn apply_chdir(&self) -> Result<()> {
        if let Some(path) = &self.chdir {
            std::env::set_current_dir(path)
                .with_context(|| format!("changing directory to {}", path.display()))?;
        }
        Ok(())
    }

    fn resolve_config_path(&self, cwd: &Utf8Path) -> Result<ResolvedConfigPath> {
        match self.discover_config_path(cwd)? {
            Some(resolved) => Ok(resolved),
            None => home_config_path(),
        }
    }

    /// Explicit `--file`, else the nearest `testrepos.toml` above `cwd`.
    fn discover_config_path(&self, cwd: &Utf8Path) -> Result<Option<ResolvedConfigPath>> {
        if let Some(path) = &self.file {
            return Ok(Some(ResolvedConfigPath {
                path: absolutize(cwd, utf8(path.clone(), "config path")?),
                source: ConfigPathSource::Explicit,
            }));
        }

        for dir in cwd.ancestors() {
            let candidate = dir.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Ok(Some(ResolvedConfigPath {
                    path: candidate,
                    source: ConfigPathSource::Discovered,
                }));
            }
        }
        Ok(None)
    }

    fn resolve_base_dir(
        &self,
        cwd: &Utf8Path,
        config: &ResetConfig,
        config_path: Option<&Utf8Path>,
    ) -> Result<(Utf8PathBuf, BaseDirSource)> {
        if let Some(root) = &self.root {
            let root = utf8(root.clone(), "--root")?;
            return Ok((absolutize(cwd, root), BaseDirSource::Flag));
        }

        if let Some(base) = &config.base_dir {
            let anchor = config_path.and_then(Utf8Path::parent).unwrap_or(cwd);
            return Ok((absolutize(anchor, Utf8PathBuf::from(base)), BaseDirSource::Config));
        }

        if let Some(root) = discover_project_root(cwd) {
            return Ok((root.to_owned(), BaseDirSource::ProjectRoot));
        }

        Ok((cwd.to_owned(), BaseDirSource::WorkingDir))
    }

    fn variant(&self, config: &ResetConfig) -> Variant {
        if self.simple {
            Variant::Simple
        } else {
            config.variant()
        }
    }
}

impl From<&Cli> for CliContext {
    fn from(cli: &Cli) -> Self {
        Self {
            chdir: cli.chdir.clone(),
            file: cli.file.clone(),
            root: cli.root.clone(),
            simple: cli.simple,
            dry_run: cli.dry_run,
        }
    }
}

struct AppState {
    ctx: CliContext,
    base_dir: Utf8PathBuf,
    base_source: BaseDirSource,
    layout: Layout,
}

impl AppState {
    fn new(ctx: CliContext, cwd: &Utf8Path) -> Result<Self> {
        let resolved = match ctx.discover_config_path(cwd)? {
            Some(resolved) => Some(resolved),
            None => home_config_path()
                .map_err(|err| warn!(error = %err, "cannot locate home config; using built-in defaults"))
                .ok(),
        };
        Self::with_config_path(ctx, cwd, resolved)
    }

    fn with_config_path(
        ctx: CliContext,
        cwd: &Utf8Path,
        resolved: Option<ResolvedConfigPath>,
    ) -> Result<Self> {
        let config = match &resolved {
            Some(resolved) => {
                let config = config::load_or_default(&resolved.path)?;
                debug!(
                    path = %resolved.path,
                    source = resolved.source.as_str(),
                    "loaded config"
                );
                config
            }
            None => ResetConfig::default(),
        };

        let config_path = resolved.as_ref().map(|resolved| resolved.path.as_path());
        let (base_dir, base_source) = ctx.resolve_base_dir(cwd, &config, config_path)?;
        let layout = Layout::new(&base_dir, &config, ctx.variant(&config))?;
        Ok(Self {
            ctx,
            base_dir,
            base_source,
            layout,
        })
    }
}

fn home_config_path() -> Result<ResolvedConfigPath> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to determine home directory"))?;
    let mut path = home;
    path.push(".config");
    path.push("testrepos");
    path.push("config.toml");
    Ok(ResolvedConfigPath {
        path: utf8(path, "config path")?,
        source: ConfigPathSource::HomeDefault,
    })
}

fn discover_project_root(start: &Utf8Path) -> Option<&Utf8Path> {
    start
        .ancestors()
        .find(|dir| PROJECT_MARKERS.iter().any(|marker| dir.join(marker).exists()))
}

fn absolutize(anchor: &Utf8Path, path: Utf8PathBuf) -> Utf8PathBuf {
    if path.is_absolute() {
        path
    } else {
        anchor.join(path)
    }
}

fn utf8(path: PathBuf, what: &str) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|_| anyhow!("{} must be valid UTF-8", what))
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("determining current directory")?;
    utf8(cwd, "current directory")
}
