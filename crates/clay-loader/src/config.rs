// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration

use crate::error::{ClayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default filename pattern of the loader script, used for root discovery
pub const DEFAULT_SCRIPT_PATTERN: &str = r"clayworks[-.\w]*js$";

/// Default deadline for a single script load
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 30_000;

/// Project-level configuration file name
pub const CONFIG_FILE: &str = "clay.toml";

/// Order in which completion callbacks are drained at a zero-crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainOrder {
    /// Most recently queued callback first
    #[default]
    Lifo,
    /// Callbacks run in the order they were queued
    Fifo,
}

impl std::str::FromStr for DrainOrder {
    type Err = ClayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lifo" => Ok(Self::Lifo),
            "fifo" => Ok(Self::Fifo),
            other => Err(ClayError::Config(format!("unknown drain order '{}'", other))),
        }
    }
}

/// Configuration for a loader instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Base prepended to every derived script URL
    pub script_root: Option<String>,

    /// Pattern matching the loader's own script, for root discovery
    pub script_pattern: String,

    /// Extension appended to derived script URLs
    pub extension: String,

    /// Per-load deadline in milliseconds (0 disables the deadline)
    pub load_timeout_ms: u64,

    /// Callback drain order
    pub drain_order: DrainOrder,

    /// Open the ready gate as soon as the loader is built
    pub ready_on_start: bool,

    /// Pre-declared dependencies (module -> prerequisites)
    pub depend: BTreeMap<String, Vec<String>>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            script_root: None,
            script_pattern: DEFAULT_SCRIPT_PATTERN.to_string(),
            extension: "js".to_string(),
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            drain_order: DrainOrder::Lifo,
            ready_on_start: false,
            depend: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from default locations.
    ///
    /// Layers the user config, then `./clay.toml`, then `CLAY_*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let project_config = PathBuf::from(CONFIG_FILE);
        let files = user_config_path()
            .into_iter()
            .chain(std::iter::once(project_config))
            .filter(|path| path.exists());
        Self::layered(files, env_var)
    }

    /// Load configuration from `path` if given, else from default locations.
    ///
    /// An explicit file replaces the default file layers; environment
    /// overrides still apply on top of it.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::layered(std::iter::once(path.to_path_buf()), env_var),
            None => Self::load(),
        }
    }

    /// Load configuration from a single TOML file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config = LoaderConfig::default();
        config.merge_from_file(path)?;
        Ok(config)
    }

    /// Defaults, then each file in order, then environment overrides
    fn layered<I, F>(files: I, env: F) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoaderConfig::default();
        for path in files {
            config.merge_from_file(&path)?;
        }
        config.apply_env(env)?;
        Ok(config)
    }

    /// Merge configuration from a TOML file.
    ///
    /// Keys present in the file replace the current values; the `depend`
    /// table is merged key by key.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        self.merge_from_str(&content)
    }

    /// Merge configuration from TOML text.
    pub fn merge_from_str(&mut self, content: &str) -> Result<()> {
        let overlay: PartialConfig = toml::from_str(content)?;

        if let Some(root) = overlay.script_root {
            self.script_root = Some(root);
        }
        if let Some(pattern) = overlay.script_pattern {
            self.script_pattern = pattern;
        }
        if let Some(extension) = overlay.extension {
            self.extension = extension;
        }
        if let Some(timeout) = overlay.load_timeout_ms {
            self.load_timeout_ms = timeout;
        }
        if let Some(order) = overlay.drain_order {
            self.drain_order = order;
        }
        if let Some(ready) = overlay.ready_on_start {
            self.ready_on_start = ready;
        }
        self.depend.extend(overlay.depend);

        Ok(())
    }

    /// Apply `CLAY_*` environment overrides.
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_env(env_var)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = env("CLAY_SCRIPT_ROOT") {
            self.script_root = Some(root);
        }
        if let Some(timeout) = env("CLAY_LOAD_TIMEOUT_MS") {
            self.load_timeout_ms = timeout.trim().parse().map_err(|_| {
                ClayError::Config(format!("CLAY_LOAD_TIMEOUT_MS is not a number: '{}'", timeout))
            })?;
        }
        if let Some(order) = env("CLAY_DRAIN_ORDER") {
            self.drain_order = order.parse()?;
        }
        Ok(())
    }

    /// Deadline applied to each script load, if any
    pub fn load_timeout(&self) -> Option<Duration> {
        match self.load_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Same shape as [`LoaderConfig`] but every key optional, for layering.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    script_root: Option<String>,
    script_pattern: Option<String>,
    extension: Option<String>,
    load_timeout_ms: Option<u64>,
    drain_order: Option<DrainOrder>,
    ready_on_start: Option<bool>,
    #[serde(default)]
    depend: BTreeMap<String, Vec<String>>,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get the user config file path.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clay").join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.extension, "js");
        assert_eq!(config.drain_order, DrainOrder::Lifo);
        assert_eq!(config.load_timeout(), Some(Duration::from_secs(30)));
        assert!(!config.ready_on_start);
    }

    #[test]
    fn test_merge_from_str_layers_values() {
        let mut config = LoaderConfig::default();
        config.depend.insert("a".into(), vec!["b".into()]);

        config
            .merge_from_str(
                r#"
                script_root = "/static/js/"
                load_timeout_ms = 0
                drain_order = "fifo"

                [depend]
                "modules.control" = ["modules.anim", "modules.util"]
                "#,
            )
            .unwrap();

        assert_eq!(config.script_root.as_deref(), Some("/static/js/"));
        assert_eq!(config.load_timeout(), None);
        assert_eq!(config.drain_order, DrainOrder::Fifo);
        assert_eq!(config.extension, "js");
        assert_eq!(config.depend.len(), 2);
        assert_eq!(
            config.depend["modules.control"],
            vec!["modules.anim".to_string(), "modules.util".to_string()]
        );
    }

    #[test]
    fn test_merge_rejects_bad_toml() {
        let mut config = LoaderConfig::default();
        let err = config.merge_from_str("drain_order = \"sideways\"").unwrap_err();
        assert!(matches!(err, ClayError::Toml(_)));
    }

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let user = write_config(
            &dir,
            "user.toml",
            "script_root = \"/user/\"\nextension = \"mjs\"\n[depend]\na = [\"b\"]\n",
        );
        let project = write_config(
            &dir,
            "clay.toml",
            "script_root = \"/project/\"\n[depend]\nc = [\"d\"]\n",
        );

        let config = LoaderConfig::layered([user, project], env_from(&[])).unwrap();
        assert_eq!(config.script_root.as_deref(), Some("/project/"));
        assert_eq!(config.extension, "mjs");
        assert_eq!(config.depend.len(), 2);
    }

    #[test]
    fn test_env_overrides_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(
            &dir,
            "other.toml",
            "script_root = \"/file/\"\nload_timeout_ms = 500\nextension = \"txt\"\n",
        );
        let env = env_from(&[
            ("CLAY_SCRIPT_ROOT", "/env/"),
            ("CLAY_LOAD_TIMEOUT_MS", " 0 "),
            ("CLAY_DRAIN_ORDER", "FIFO"),
        ]);

        let config = LoaderConfig::layered([file], env).unwrap();
        assert_eq!(config.script_root.as_deref(), Some("/env/"));
        assert_eq!(config.load_timeout(), None);
        assert_eq!(config.drain_order, DrainOrder::Fifo);
        assert_eq!(config.extension, "txt");
    }

    #[test]
    fn test_env_rejects_bad_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(&dir, "clay.toml", "load_timeout_ms = 500\n");

        let err = LoaderConfig::layered([file], env_from(&[("CLAY_LOAD_TIMEOUT_MS", "abc")]))
            .unwrap_err();
        assert!(matches!(err, ClayError::Config(ref msg) if msg.contains("'abc'")));
    }

    #[test]
    fn test_env_rejects_bad_drain_order() {
        let mut config = LoaderConfig::default();
        let err = config
            .apply_env(env_from(&[("CLAY_DRAIN_ORDER", "sideways")]))
            .unwrap_err();
        assert!(matches!(err, ClayError::Config(ref msg) if msg.contains("sideways")));
        assert_eq!(config.drain_order, DrainOrder::Lifo);
    }

    #[test]
    fn test_load_with_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoaderConfig::load_with(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ClayError::Io(_)));
    }

    #[test]
    fn test_drain_order_parse() {
        assert_eq!("FIFO".parse::<DrainOrder>().unwrap(), DrainOrder::Fifo);
        assert_eq!(" lifo ".parse::<DrainOrder>().unwrap(), DrainOrder::Lifo);
        assert!("random".parse::<DrainOrder>().is_err());
    }
}
