//! Monitor configuration loading and expansion.
//!
//! The config file is JSON: a list of monitors, optional batch entries that
//! fan out over several repositories, shared defaults, and presentation
//! settings. Expansion and validation happen once at load time; the rest of
//! the pipeline only sees resolved [`Monitor`] values.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use notify::NotifyOptions;

/// Default branch when neither the monitor nor the defaults name one.
const DEFAULT_BRANCH: &str = "main";

/// A watched path, resolved once at config-load time.
///
/// Paths configured with a trailing slash are folder prefixes; everything
/// else is a single file. Both are compared the same way (latest commit SHA
/// touching the path), only the query scope differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPath {
    /// A single file.
    File(String),
    /// A folder prefix (configured with a trailing slash).
    Folder(String),
}

impl WatchPath {
    /// Resolve the trailing-slash convention.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.strip_suffix('/') {
            Some(prefix) => Self::Folder(prefix.to_string()),
            None => Self::File(raw.to_string()),
        }
    }

    /// The path without any trailing slash, as sent to the API and used in
    /// state keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File(p) | Self::Folder(p) => p,
        }
    }

    /// Whether this is a folder prefix.
    #[must_use]
    pub const fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// A fully resolved monitor, after defaults and batch expansion.
#[derive(Debug, Clone)]
pub struct Monitor {
    /// Display name, defaults to the repository basename.
    pub name: String,
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Branch to watch.
    pub branch: String,
    /// Plain watched paths.
    pub paths: Vec<WatchPath>,
    /// Glob patterns expanded against the repository tree at check time.
    pub glob_patterns: Vec<String>,
    /// Disabled monitors are skipped entirely.
    pub enabled: bool,
}

/// One monitor entry as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMonitor {
    pub name: Option<String>,
    pub repo: String,
    pub branch: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub paths_glob: Vec<String>,
    pub enabled: Option<bool>,
}

/// A batch entry: the same watch config applied to several repositories.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEntry {
    pub repos: Vec<String>,
    pub name: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub paths_glob: Vec<String>,
    pub enabled: Option<bool>,
}

/// Shared fallbacks applied to every monitor and batch entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MonitorDefaults {
    pub branch: Option<String>,
    pub enabled: Option<bool>,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub paths_glob: Vec<String>,
}

/// Presentation and scheduling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Informational for the external scheduler; the binary does not
    /// self-schedule.
    pub check_interval_hours: u64,
    /// Subject line prefix for the summary email.
    pub email_subject_prefix: String,
    /// Sender display name for the summary email.
    pub email_sender_name: String,
    /// Include the compare/diff link per event.
    pub include_diff_link: bool,
    /// Include the first line of the commit message per event.
    pub include_commit_message: bool,
    /// Name of the Microsoft To Do list that receives tasks.
    pub todo_list_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            check_interval_hours: 6,
            email_subject_prefix: "[langwatch]".to_string(),
            email_sender_name: "langwatch".to_string(),
            include_diff_link: true,
            include_commit_message: true,
            todo_list_name: "Langwatch".to_string(),
        }
    }
}

impl Settings {
    /// Map the settings onto the notifier's presentation options.
    #[must_use]
    pub fn notify_options(&self) -> NotifyOptions {
        NotifyOptions {
            subject_prefix: self.email_subject_prefix.clone(),
            sender_name: self.email_sender_name.clone(),
            include_diff_link: self.include_diff_link,
            include_commit_message: self.include_commit_message,
            todo_list_name: self.todo_list_name.clone(),
        }
    }
}

/// The parsed config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MonitorsFile {
    #[serde(default)]
    pub monitors: Vec<RawMonitor>,
    #[serde(default)]
    pub batch: Vec<BatchEntry>,
    #[serde(default)]
    pub defaults: MonitorDefaults,
    #[serde(default)]
    pub settings: Settings,
}

impl MonitorsFile {
    /// Load and parse the config file. Any failure here is fatal to the run.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(file)
    }

    /// Expand batch entries and defaults into resolved, validated monitors.
    pub fn resolve(&self) -> Result<Vec<Monitor>> {
        if self.monitors.is_empty() && self.batch.is_empty() {
            bail!("No monitors configured; add entries under \"monitors\" or \"batch\"");
        }

        let mut resolved = Vec::new();

        for entry in &self.batch {
            for repo in &entry.repos {
                resolved.push(self.build_monitor(
                    entry.name.clone(),
                    repo.clone(),
                    entry.branch.clone(),
                    &entry.paths,
                    &entry.paths_glob,
                    entry.enabled,
                )?);
            }
        }

        for raw in &self.monitors {
            resolved.push(self.build_monitor(
                raw.name.clone(),
                raw.repo.clone(),
                raw.branch.clone(),
                &raw.paths,
                &raw.paths_glob,
                raw.enabled,
            )?);
        }

        Ok(resolved)
    }

    fn build_monitor(
        &self,
        name: Option<String>,
        repo: String,
        branch: Option<String>,
        paths: &[String],
        paths_glob: &[String],
        enabled: Option<bool>,
    ) -> Result<Monitor> {
        let name = name.unwrap_or_else(|| repo_basename(&repo).to_string());

        if !is_valid_repo(&repo) {
            bail!("Monitor '{name}': repo must be in owner/name format, got '{repo}'");
        }

        let branch = branch
            .or_else(|| self.defaults.branch.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        let enabled = enabled.or(self.defaults.enabled).unwrap_or(true);

        let raw_paths = if paths.is_empty() {
            &self.defaults.paths
        } else {
            paths
        };
        let glob_patterns = if paths_glob.is_empty() {
            self.defaults.paths_glob.clone()
        } else {
            paths_glob.to_vec()
        };

        if enabled && raw_paths.is_empty() && glob_patterns.is_empty() {
            bail!("Monitor '{name}': enabled but has no paths or glob patterns");
        }

        Ok(Monitor {
            name,
            repo,
            branch,
            paths: raw_paths.iter().map(|p| WatchPath::parse(p)).collect(),
            glob_patterns,
            enabled,
        })
    }
}

/// Check the `owner/name` repository format.
fn is_valid_repo(repo: &str) -> bool {
    let mut parts = repo.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

/// Repository basename (`name` from `owner/name`).
fn repo_basename(repo: &str) -> &str {
    repo.rsplit('/').next().unwrap_or(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> MonitorsFile {
        serde_json::from_str(content).expect("config should parse")
    }

    #[test]
    fn test_watch_path_variants() {
        assert_eq!(
            WatchPath::parse("lang/en.json"),
            WatchPath::File("lang/en.json".to_string())
        );
        assert_eq!(WatchPath::parse("lang/"), WatchPath::Folder("lang".to_string()));
        assert!(WatchPath::parse("lang/").is_folder());
        assert_eq!(WatchPath::parse("lang/").as_str(), "lang");
    }

    #[test]
    fn test_resolve_full_monitor() {
        let file = parse(
            r#"{
                "monitors": [
                    {
                        "name": "web",
                        "repo": "acme/web-app",
                        "branch": "develop",
                        "paths": ["lang/en.json", "i18n/"],
                        "enabled": true
                    }
                ]
            }"#,
        );

        let monitors = file.resolve().unwrap();
        assert_eq!(monitors.len(), 1);

        let m = &monitors[0];
        assert_eq!(m.name, "web");
        assert_eq!(m.branch, "develop");
        assert_eq!(m.paths.len(), 2);
        assert!(m.paths[1].is_folder());
    }

    #[test]
    fn test_defaults_applied() {
        let file = parse(
            r#"{
                "defaults": { "branch": "release", "paths": ["locales/"] },
                "monitors": [ { "repo": "acme/api" } ]
            }"#,
        );

        let monitors = file.resolve().unwrap();
        let m = &monitors[0];
        assert_eq!(m.name, "api");
        assert_eq!(m.branch, "release");
        assert!(m.enabled);
        assert_eq!(m.paths, vec![WatchPath::Folder("locales".to_string())]);
    }

    #[test]
    fn test_monitor_overrides_defaults() {
        let file = parse(
            r#"{
                "defaults": { "branch": "release", "paths": ["locales/"] },
                "monitors": [
                    { "repo": "acme/api", "branch": "main", "paths": ["lang/de.json"] }
                ]
            }"#,
        );

        let monitors = file.resolve().unwrap();
        let m = &monitors[0];
        assert_eq!(m.branch, "main");
        assert_eq!(m.paths, vec![WatchPath::File("lang/de.json".to_string())]);
    }

    #[test]
    fn test_batch_expansion() {
        let file = parse(
            r#"{
                "batch": [
                    {
                        "repos": ["acme/web", "acme/api", "acme/cli"],
                        "paths": ["lang/"]
                    }
                ]
            }"#,
        );

        let monitors = file.resolve().unwrap();
        assert_eq!(monitors.len(), 3);
        assert_eq!(monitors[0].name, "web");
        assert_eq!(monitors[2].repo, "acme/cli");
        assert!(monitors.iter().all(|m| m.branch == "main"));
    }

    #[test]
    fn test_invalid_repo_is_fatal() {
        let file = parse(r#"{ "monitors": [ { "repo": "not-a-repo", "paths": ["a"] } ] }"#);
        let err = file.resolve().unwrap_err().to_string();
        assert!(err.contains("owner/name"));
    }

    #[test]
    fn test_enabled_without_paths_is_fatal() {
        let file = parse(r#"{ "monitors": [ { "repo": "acme/web" } ] }"#);
        assert!(file.resolve().is_err());
    }

    #[test]
    fn test_disabled_without_paths_is_allowed() {
        let file = parse(r#"{ "monitors": [ { "repo": "acme/web", "enabled": false } ] }"#);
        let monitors = file.resolve().unwrap();
        assert!(!monitors[0].enabled);
    }

    #[test]
    fn test_empty_config_is_fatal() {
        let file = parse("{}");
        assert!(file.resolve().is_err());
    }

    #[test]
    fn test_settings_defaults() {
        let file = parse(r#"{ "monitors": [ { "repo": "a/b", "paths": ["x"] } ] }"#);
        assert_eq!(file.settings.email_subject_prefix, "[langwatch]");
        assert!(file.settings.include_diff_link);
        assert_eq!(file.settings.check_interval_hours, 6);
    }

    #[test]
    fn test_settings_override() {
        let file = parse(
            r#"{
                "monitors": [ { "repo": "a/b", "paths": ["x"] } ],
                "settings": {
                    "email_subject_prefix": "[i18n]",
                    "include_commit_message": false,
                    "todo_list_name": "Translations"
                }
            }"#,
        );

        let options = file.settings.notify_options();
        assert_eq!(options.subject_prefix, "[i18n]");
        assert!(!options.include_commit_message);
        assert_eq!(options.todo_list_name, "Translations");
    }
}
