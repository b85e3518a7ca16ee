//! src/config.rs
//! ============================================================================
//! # Config: Tree Behaviour Settings
//!
//! Every tunable of the state engine and the lazy-loading cache in one serde
//! structure, so hosts can ship it as TOML next to their own settings.
//!
//! ## Example
//! ```rust,ignore
//! let config = TreeConfig::from_toml_str(r#"
//! [selection]
//! multi_select = true
//! propagation = { descendants = true }
//!
//! [lazy_loading]
//! stale_time = "30s"
//! "#)?;
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::{
    error::{TreeError, TreeResult},
    model::selection::{Propagation, SelectionMode},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub multi_select: bool,

    /// Every selection command becomes a no-op.
    pub disable_selection: bool,

    pub propagation: Propagation,
}

impl SelectionConfig {
    #[must_use]
    pub const fn mode(&self) -> SelectionMode {
        if self.multi_select {
            SelectionMode::Multiple
        } else {
            SelectionMode::Single
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Rows skipped by PageUp / PageDown.
    pub page_size: usize,

    /// Landing on a collapsed parent expands it.
    pub auto_expand_on_navigation: bool,

    /// Disabled items can take focus but still reject every other command.
    pub disabled_items_focusable: bool,

    /// Printable keys jump to the next label starting with that character.
    pub type_ahead: bool,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            auto_expand_on_navigation: false,
            disabled_items_focusable: false,
            type_ahead: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyLoadingConfig {
    /// When off, every request goes straight to the data source.
    pub enabled: bool,

    /// Age after which a loaded entry is fetched again.
    #[serde(with = "humantime_serde")]
    pub stale_time: Duration,

    /// Upper bound on the total number of cached items across all parents.
    pub max_cache_size: usize,
}

impl Default for LazyLoadingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_time: Duration::from_secs(300), // 5 minutes
            max_cache_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    pub selection: SelectionConfig,

    pub navigation: NavigationConfig,

    pub lazy_loading: LazyLoadingConfig,
}

impl TreeConfig {
    pub fn from_toml_str(raw: &str) -> TreeResult<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> TreeResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> TreeResult<()> {
        if self.navigation.page_size == 0 {
            return Err(TreeError::Config("navigation.page_size must be at least 1".into()));
        }
        if self.lazy_loading.max_cache_size == 0 {
            return Err(TreeError::Config(
                "lazy_loading.max_cache_size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Loads config from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> TreeResult<Self> {
        let path = path.as_ref();
        info!("Loading tree config from {}", path.display());

        let text = TokioFs::read_to_string(path)
            .await
            .map_err(|source| TreeError::ConfigIo {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    /// Saves config as pretty TOML, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> TreeResult<()> {
        let path = path.as_ref();
        info!("Saving tree config to {}", path.display());

        let io_err = |source| TreeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent).await.map_err(io_err)?;
        }
        TokioFs::write(path, self.to_toml_string()?)
            .await
            .map_err(io_err)
    }
}
