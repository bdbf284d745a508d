//! Application configuration for atlasdash.
//!
//! User config lives at `~/.atlasdash/atlasdash.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DocsetError, Result};
use crate::types::TypeDescriptor;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "atlasdash.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".atlasdash";

// ---------------------------------------------------------------------------
// Config structs (matching atlasdash.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Documentation feed settings.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Ordered entry type rules. Empty means the built-in table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDescriptor>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Documentation locale.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Docset build directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum concurrent downloads for the whole run.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_locale() -> String {
    "en-us".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_concurrency() -> u32 {
    16
}

/// `[feed]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the documentation API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL the page stylesheets are downloaded from.
    #[serde(default = "default_stylesheet_base_url")]
    pub stylesheet_base_url: String,

    /// Stylesheet file names linked from every page.
    #[serde(default = "default_stylesheets")]
    pub stylesheets: Vec<String>,

    /// Ids of the top-level entries whose subtrees are indexed.
    #[serde(default = "default_root_ids")]
    pub root_ids: Vec<String>,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stylesheet_base_url: default_stylesheet_base_url(),
            stylesheets: default_stylesheets(),
            root_ids: default_root_ids(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://developer.salesforce.com/docs".into()
}
fn default_stylesheet_base_url() -> String {
    "https://developer.salesforce.com/resource/stylesheets".into()
}
fn default_stylesheets() -> Vec<String> {
    vec![
        "holygrail.min.css".into(),
        "docs.min.css".into(),
        "syntax-highlighter.min.css".into(),
    ]
}
fn default_root_ids() -> Vec<String> {
    vec!["apex_reference".into(), "pages_compref".into()]
}
fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Build config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime build configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Documentation locale.
    pub locale: String,
    /// Deliverables to build, in order.
    pub deliverables: Vec<String>,
    /// Docset build directory.
    pub output_dir: PathBuf,
    /// Maximum concurrent downloads.
    pub concurrency: usize,
    /// Parsed feed base URL.
    pub base_url: Url,
    /// Parsed stylesheet base URL.
    pub stylesheet_base_url: Url,
    pub stylesheets: Vec<String>,
    pub root_ids: Vec<String>,
    pub timeout_secs: u64,
    /// Type rules; empty selects the built-in table.
    pub types: Vec<TypeDescriptor>,
}

impl BuildConfig {
    /// Build a runtime config from the loaded file config.
    pub fn from_app_config(config: &AppConfig, deliverables: Vec<String>) -> Result<Self> {
        let base_url = parse_url("feed.base_url", &config.feed.base_url)?;
        let stylesheet_base_url =
            parse_url("feed.stylesheet_base_url", &config.feed.stylesheet_base_url)?;

        let build = Self {
            locale: config.defaults.locale.clone(),
            deliverables,
            output_dir: PathBuf::from(&config.defaults.output_dir),
            concurrency: config.defaults.concurrency as usize,
            base_url,
            stylesheet_base_url,
            stylesheets: config.feed.stylesheets.clone(),
            root_ids: config.feed.root_ids.clone(),
            timeout_secs: config.feed.timeout_secs,
            types: config.types.clone(),
        };
        build.validate()?;
        Ok(build)
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(DocsetError::config("concurrency must be at least 1"));
        }
        if self.locale.is_empty() {
            return Err(DocsetError::config("locale must not be empty"));
        }
        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| DocsetError::config(format!("invalid {field} '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.atlasdash/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocsetError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.atlasdash/atlasdash.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsetError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsetError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocsetError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocsetError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsetError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
