use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// default number of blob names returned per listing page
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// tool configuration stored in a toml file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// portal directory used when none is given on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal: Option<PathBuf>,
    /// blob listing page size
    pub page_size: usize,
    /// delete remote content absent from an applied archive
    pub delete_extra: bool,
}

impl Config {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// page size, never zero
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: None,
            page_size: DEFAULT_PAGE_SIZE,
            delete_extra: true,
        }
    }
}
