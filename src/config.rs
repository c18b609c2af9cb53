//! Configuration file model, defaults, validation and loading.
//!
//! The file is TOML with kebab-case keys. Every key is optional; missing keys
//! take the defaults below. Lookup order: explicit `--config` path, then
//! `$XDG_CONFIG_HOME/bibarchive/config.toml` (or
//! `$HOME/.config/bibarchive/config.toml`) if it exists, then built-in
//! defaults. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::network::media::{HTML_MEDIA_TYPE, PDF_MEDIA_TYPE, parse_media_type};
use crate::network::DEFAULT_TIMEOUT_SECS;
use crate::pattern::{NAMING_VARS, PROXY_VARS, Pattern};
use crate::user_agent;

/// Default bounded queue capacity between pipeline stages.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

const MAX_QUEUE_CAPACITY: usize = 1024;
const MAX_TIMEOUT_SECS: u64 = 600;
const CONFIG_DIR_NAME: &str = "bibarchive";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Complete run configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Acquisition and media-type policy.
    pub archive: ArchiveConfig,
    /// HTTP transport settings.
    pub network: NetworkConfig,
    /// Open-access lookup.
    pub unpaywall: UnpaywallConfig,
    /// External HTML snapshot converter.
    pub snapshot: SnapshotConfig,
    /// Zotero collection options.
    pub zotero: ZoteroConfig,
    /// Stored directory and file naming.
    pub naming: NamingConfig,
    /// Pipeline sizing.
    pub pipeline: PipelineConfig,
    /// User-defined proxy resolver rules, in evaluation order.
    pub resolvers: Vec<ResolverRuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ArchiveConfig {
    pub user_agent: String,
    /// Media types that local copies must have to beat the network.
    pub preferred_media_types: Vec<String>,
    /// Media types the embedded-object extractor looks for.
    pub embedded_media_types: Vec<String>,
    /// Media types the direct pass-through handler refuses.
    pub exclude_media_types: Vec<String>,
    /// Whether a local HTML snapshot may serve as the contingency copy.
    pub include_local_snapshots: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            user_agent: user_agent::default_user_agent(),
            preferred_media_types: vec![PDF_MEDIA_TYPE.to_string()],
            embedded_media_types: vec![PDF_MEDIA_TYPE.to_string()],
            exclude_media_types: Vec::new(),
            include_local_snapshots: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct UnpaywallConfig {
    pub enabled: bool,
    /// Contact address required by the Unpaywall API. Empty disables the lookup.
    pub email: String,
}

impl Default for UnpaywallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: String::new(),
        }
    }
}

impl UnpaywallConfig {
    /// The lookup runs only when enabled and a contact address is set.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && !self.email.trim().is_empty()
    }
}

/// Options of the monolith snapshot converter. Each `include-*` flag maps
/// to the matching `--no-*` argument when false.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// Executable name (looked up on `PATH`) or path.
    pub path: String,
    pub allow_insecure: bool,
    pub include_audio: bool,
    pub include_css: bool,
    pub include_fonts: bool,
    pub include_frames: bool,
    pub include_images: bool,
    pub include_js: bool,
    pub include_video: bool,
    pub include_metadata: bool,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "monolith".to_string(),
            allow_insecure: false,
            include_audio: true,
            include_css: true,
            include_fonts: true,
            include_frames: true,
            include_images: true,
            include_js: true,
            include_video: true,
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ZoteroConfig {
    /// Whether an HTML web-snapshot attachment may serve as the contingency copy.
    pub include_snapshots: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct NamingConfig {
    /// Directory name patterns; the first fully resolvable one is used.
    pub directory_names: Vec<String>,
    /// File name patterns; the first fully resolvable one is used.
    pub file_names: Vec<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            directory_names: vec!["%i".to_string()],
            file_names: vec!["%o".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PipelineConfig {
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// One proxy resolver rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolverRuleConfig {
    /// URL templates, tried in order.
    pub schemes: Vec<String>,
    /// When non-empty, the rule applies only to these hosts.
    pub include_hostnames: Vec<String>,
    /// Hosts the rule never applies to. Wins over the include list.
    pub exclude_hostnames: Vec<String>,
}

impl Config {
    /// Returns true if `media_type` is one of the preferred media types.
    #[must_use]
    pub fn is_preferred_media_type(&self, media_type: &str) -> bool {
        let essence = parse_media_type(media_type);
        self.archive
            .preferred_media_types
            .iter()
            .any(|preferred| parse_media_type(preferred) == essence && essence.is_some())
    }

    /// Media types the direct handler refuses: the configured list plus HTML
    /// when snapshots are disabled, so raw landing pages are not archived.
    #[must_use]
    pub fn handler_exclude_media_types(&self) -> Vec<String> {
        let mut excluded = self.archive.exclude_media_types.clone();
        if !self.snapshot.enabled && !excluded.iter().any(|t| t == HTML_MEDIA_TYPE) {
            excluded.push(HTML_MEDIA_TYPE.to_string());
        }
        excluded
    }

    /// Validates value ranges and patterns.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let user_agent = &self.archive.user_agent;
        if user_agent.trim().is_empty() || user_agent.chars().any(char::is_control) {
            bail!(
                "Invalid config value for `archive.user-agent`: {user_agent:?}. Expected a non-empty string without control characters"
            );
        }

        for (key, list) in [
            ("archive.preferred-media-types", &self.archive.preferred_media_types),
            ("archive.embedded-media-types", &self.archive.embedded_media_types),
            ("archive.exclude-media-types", &self.archive.exclude_media_types),
        ] {
            if let Some(bad) = list.iter().find(|value| parse_media_type(value).is_none()) {
                bail!("Invalid config value for `{key}`: {bad:?}. Expected a media type like `application/pdf`");
            }
        }

        let timeout = self.network.timeout_secs;
        if !(1..=MAX_TIMEOUT_SECS).contains(&timeout) {
            bail!("Invalid config value for `network.timeout-secs`: {timeout}. Expected range: 1..={MAX_TIMEOUT_SECS}");
        }

        let capacity = self.pipeline.queue_capacity;
        if !(1..=MAX_QUEUE_CAPACITY).contains(&capacity) {
            bail!("Invalid config value for `pipeline.queue-capacity`: {capacity}. Expected range: 1..={MAX_QUEUE_CAPACITY}");
        }

        if self.snapshot.enabled && self.snapshot.path.trim().is_empty() {
            bail!("Invalid config value for `snapshot.path`: empty. Expected an executable name or path");
        }

        for pattern in self.naming.directory_names.iter().chain(&self.naming.file_names) {
            Pattern::parse(pattern, NAMING_VARS)
                .with_context(|| "Invalid naming pattern in `naming`".to_string())?;
        }

        for (index, rule) in self.resolvers.iter().enumerate() {
            for scheme in &rule.schemes {
                Pattern::parse(scheme, PROXY_VARS)
                    .with_context(|| format!("Invalid URL template in `resolvers[{index}].schemes`"))?;
            }
        }

        Ok(())
    }
}

/// Configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was read, or the default path that was probed.
    pub path: Option<PathBuf>,
    /// Effective configuration.
    pub config: Config,
    /// Whether a file was actually read.
    pub loaded_from_file: bool,
}

/// Default config file location, following XDG conventions.
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    std::env::var_os(name).filter(|value| !value.is_empty())
}

/// Loads the configuration from `explicit_path`, the default location, or
/// built-in defaults, in that order.
///
/// # Errors
///
/// Returns an error if an explicit path cannot be read, or if any file read
/// fails to parse or validate.
pub fn load_config(explicit_path: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit_path {
        let config = load_config_file(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_config_file(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: Config::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses and validates TOML configuration text.
///
/// # Errors
///
/// Returns an error on malformed TOML, unknown keys, or invalid values.
pub fn parse_config_str(raw: &str) -> Result<Config> {
    let config: Config = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.pipeline.queue_capacity, 16);
        assert_eq!(config.network.timeout_secs, 15);
        assert!(!config.unpaywall.is_active());
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let config = parse_config_str(
            r#"
[unpaywall]
email = "me@example.com"

[snapshot]
enabled = true
include-js = false
"#,
        )
        .unwrap();
        assert!(config.unpaywall.is_active());
        assert!(config.snapshot.enabled);
        assert!(!config.snapshot.include_js);
        assert!(config.snapshot.include_css);
        assert_eq!(config.snapshot.path, "monolith");
    }

    #[test]
    fn test_parse_config_resolver_rules_keep_order() {
        let config = parse_config_str(
            r#"
[[resolvers]]
schemes = ["https://a.example/%d", "https://b.example/%p"]
include-hostnames = ["journal.example"]

[[resolvers]]
schemes = ["https://c.example/%f"]
exclude-hostnames = ["blocked.example"]
"#,
        )
        .unwrap();
        assert_eq!(config.resolvers.len(), 2);
        assert_eq!(config.resolvers[0].schemes[1], "https://b.example/%p");
        assert_eq!(config.resolvers[1].exclude_hostnames, vec!["blocked.example"]);
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let error = parse_config_str("[archive]\nunknown-key = 1\n").unwrap_err();
        assert!(format!("{error:#}").contains("unknown"));
    }

    #[test]
    fn test_parse_config_rejects_bad_template_variable() {
        let error = parse_config_str("[[resolvers]]\nschemes = [\"https://x/%z\"]\n").unwrap_err();
        let msg = format!("{error:#}");
        assert!(msg.contains("resolvers[0]"), "got: {msg}");
        assert!(msg.contains("%z"), "got: {msg}");
    }

    #[test]
    fn test_parse_config_accepts_percent_encoded_template() {
        let config = parse_config_str(
            "[[resolvers]]\nschemes = [\"https://proxy.example/login?url=https%3A%2F%2F%h%2F%p\"]\n",
        )
        .unwrap();
        assert_eq!(config.resolvers[0].schemes.len(), 1);
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_values() {
        assert!(parse_config_str("[pipeline]\nqueue-capacity = 0\n").is_err());
        assert!(parse_config_str("[network]\ntimeout-secs = 0\n").is_err());
        assert!(parse_config_str("[archive]\nuser-agent = \"\"\n").is_err());
        assert!(parse_config_str("[archive]\npreferred-media-types = [\"pdf\"]\n").is_err());
    }

    #[test]
    fn test_is_preferred_media_type_ignores_parameters_and_case() {
        let config = Config::default();
        assert!(config.is_preferred_media_type("Application/PDF; qs=1"));
        assert!(!config.is_preferred_media_type("text/html"));
        assert!(!config.is_preferred_media_type(""));
    }

    #[test]
    fn test_handler_exclude_media_types_adds_html_when_snapshot_disabled() {
        let mut config = Config::default();
        assert_eq!(config.handler_exclude_media_types(), vec!["text/html"]);
        config.snapshot.enabled = true;
        assert!(config.handler_exclude_media_types().is_empty());
    }

    #[test]
    fn test_load_config_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let error = load_config(Some(&missing)).unwrap_err();
        assert!(error.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_explicit_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[zotero]\ninclude-snapshots = true\n").unwrap();
        let loaded = load_config(Some(&path)).unwrap();
        assert!(loaded.loaded_from_file);
        assert!(loaded.config.zotero.include_snapshots);
    }
}
