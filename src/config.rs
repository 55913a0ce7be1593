//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$PATCHMAIL_CONFIG` (environment variable)
//! 2. `~/.config/patchmail/config.toml` (Linux/macOS)
//!    `%APPDATA%\patchmail\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Who sends the mails.
    pub identity: IdentityConfig,
    /// How series are generated.
    pub series: SeriesConfig,
    /// Where mails go.
    pub transport: TransportConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Override directory of the annotation store.
    pub store_dir: Option<PathBuf>,
}

/// Sender identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// `Name <email>` the mails are sent as.
    pub sender: Option<String>,
    /// Display name that marks the sender as a bot sending on behalf of
    /// the authors.
    pub bot_name: Option<String>,
    /// Owner of the canonical repository; PRs against forks get the fork
    /// owner in their tag names.
    pub canonical_owner: Option<String>,
}

/// Series generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    /// Column at which the cover-letter prose is wrapped.
    pub wrap_column: usize,
    /// Indent of the description in a single-patch mail.
    pub single_patch_indent: String,
    /// Prefix turning a Message-ID into an archive URL.
    pub mid_url_prefix: String,
    /// Host whose URLs get `Published-As:` links.
    pub forge_host: String,
    /// URL the iteration tags are pushed to.
    pub publish_remote: Option<String>,
    /// Default `To:` recipients.
    pub to: Vec<String>,
    /// Default `Cc:` recipients.
    pub cc: Vec<String>,
    /// Extra `Name: value` headers for every mail.
    pub add_headers: Vec<String>,
}

/// Mail transport selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Append to an mbox file.
    #[default]
    Mbox,
    /// Pipe to a sendmail-compatible program.
    Sendmail,
}

/// Mail transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    /// Output file of the mbox transport.
    pub mbox_path: PathBuf,
    /// Program used by the sendmail transport.
    pub sendmail_program: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            store_dir: None,
        }
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            wrap_column: 76,
            single_patch_indent: "    ".to_string(),
            mid_url_prefix: "https://lore.kernel.org/git/".to_string(),
            forge_host: "github.com".to_string(),
            publish_remote: None,
            to: Vec::new(),
            cc: Vec::new(),
            add_headers: Vec::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Mbox,
            mbox_path: PathBuf::from("outgoing.mbox"),
            sendmail_program: "sendmail".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("PATCHMAIL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("patchmail").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchmail")
}

/// Return the annotation store directory.
pub fn store_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.store_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("patchmail")
        .join("notes")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("patchmail.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.series.wrap_column, 76);
        assert_eq!(cfg.series.single_patch_indent, "    ");
        assert_eq!(cfg.series.forge_host, "github.com");
        assert_eq!(cfg.transport.kind, TransportKind::Mbox);
        assert!(cfg.identity.sender.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.identity.bot_name = Some("GitGitGadget".into());
        cfg.series.cc = vec!["list@example.com".into()];
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.identity.bot_name, cfg.identity.bot_name);
        assert_eq!(parsed.series.cc, cfg.series.cc);
        assert_eq!(parsed.transport.mbox_path, cfg.transport.mbox_path);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[identity]
sender = "Sam Sender <sam@example.com>"

[transport]
kind = "sendmail"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(
            cfg.identity.sender.as_deref(),
            Some("Sam Sender <sam@example.com>")
        );
        assert_eq!(cfg.transport.kind, TransportKind::Sendmail);
        // Other fields use defaults
        assert_eq!(cfg.transport.sendmail_program, "sendmail");
        assert_eq!(cfg.series.wrap_column, 76);
    }

    #[test]
    fn test_directories_honor_overrides() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/pm-cache"));
        cfg.general.store_dir = Some(PathBuf::from("/tmp/pm-notes"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/pm-cache/patchmail.log"));
        assert_eq!(store_dir(&cfg), PathBuf::from("/tmp/pm-notes"));
    }
}
