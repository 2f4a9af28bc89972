// SPDX-License-Identifier: MIT

use serde::Deserialize;

use crate::error::{DeployError, DeployResult};

/// Journaled filesystems the striped volumes can be formatted with.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Filesystem {
    #[default]
    Ntfs,
    Refs,
}

impl Filesystem {
    pub fn check_allocation_unit(&self, unit_kb: u32) -> DeployResult<()> {
        let allowed: &[u32] = match self {
            Filesystem::Ntfs => &[4, 8, 16, 32, 64],
            Filesystem::Refs => &[4, 64],
        };
        if !allowed.contains(&unit_kb) {
            return Err(DeployError::config(format!(
                "{self} allocation unit must be one of {allowed:?} KB (got {unit_kb})"
            )));
        }
        Ok(())
    }
}

impl core::fmt::Display for Filesystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Filesystem::Ntfs => "NTFS",
            Filesystem::Refs => "ReFS",
        };
        write!(f, "{s}")
    }
}
