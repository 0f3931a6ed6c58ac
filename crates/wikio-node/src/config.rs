//! Thresholds and permission rows shared by every service in the node.

use std::path::Path;

use serde::{Deserialize, Serialize};
use wikio_moderation::{ModerationConfig, PermissionTable};
use wikio_opinion::OpinionConfig;

use crate::error::Result;

/// Tunables loaded from the `WIKIO_CONFIG` file. Missing sections fall back
/// to the stock Wiki-O values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub opinion: OpinionConfig,
    pub moderation: ModerationConfig,
    pub permissions: PermissionTable,
}

impl CoreConfig {
    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
