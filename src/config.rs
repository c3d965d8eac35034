use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "FONTSHELF_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the catalog store.
    #[serde(default = "default_library_root")]
    pub library_root: PathBuf,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub introspection: IntrospectionConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub facets: FacetsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Threads used for face introspection during a scan.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Descend into symlinked directories. Symlinked font files are picked
    /// up either way.
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8))
        .unwrap_or(4)
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            follow_symlinks: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntrospectionBackend {
    #[default]
    Native,
    Rpc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    #[serde(default)]
    pub backend: IntrospectionBackend,

    /// Helper command line for the `rpc` backend, program first.
    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            backend: IntrospectionBackend::default(),
            command: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistryBackend {
    #[default]
    UserDir,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    #[serde(default)]
    pub backend: RegistryBackend,

    /// Overrides the per-user font directory links are placed in.
    #[serde(default)]
    pub font_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_watcher_enabled")]
    pub enabled: bool,

    /// Quiet period before a changed path is processed.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Full rescan of every source when the daemon starts. A rescan resets
    /// activation, so by default startup only catches up on what changed
    /// while the daemon was down.
    #[serde(default)]
    pub rescan_on_startup: bool,
}

fn default_watcher_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: default_watcher_enabled(),
            debounce_ms: default_debounce_ms(),
            rescan_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between drift sweeps in the daemon. 0 disables periodic sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_sweep_on_startup")]
    pub sweep_on_startup: bool,
}

fn default_sweep_interval_secs() -> u64 {
    900
}

fn default_sweep_on_startup() -> bool {
    true
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_on_startup: default_sweep_on_startup(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FacetsConfig {
    /// Schema synced by the daemon at startup.
    #[serde(default)]
    pub schema_path: Option<PathBuf>,
}

fn default_library_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fontshelf")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_root: default_library_root(),
            scanner: ScannerConfig::default(),
            introspection: IntrospectionConfig::default(),
            registry: RegistryConfig::default(),
            watcher: WatcherConfig::default(),
            reconcile: ReconcileConfig::default(),
            facets: FacetsConfig::default(),
        }
    }
}

impl Config {
    /// Load from `FONTSHELF_CONFIG` or the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, writing the defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fontshelf")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf/config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.watcher.debounce_ms, 300);
        assert_eq!(config.registry.backend, RegistryBackend::UserDir);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.library_root, config.library_root);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
library_root = "/srv/fonts"

[introspection]
backend = "rpc"
command = ["fontprobe", "--stdio"]

[registry]
backend = "memory"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.library_root, PathBuf::from("/srv/fonts"));
        assert_eq!(config.introspection.backend, IntrospectionBackend::Rpc);
        assert_eq!(config.introspection.command, vec!["fontprobe", "--stdio"]);
        assert_eq!(config.introspection.timeout_secs, 10);
        assert_eq!(config.registry.backend, RegistryBackend::Memory);
        assert!(config.watcher.enabled);
        assert!(!config.watcher.rescan_on_startup);
        assert!(config.reconcile.sweep_on_startup);
        assert!(config.facets.schema_path.is_none());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[registry]\nbackend = \"kernel\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
