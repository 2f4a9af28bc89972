// SPDX-License-Identifier: MIT

use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::DeployError;

/// Instance sizes accepted by the classic service-management API.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum VmSize {
    ExtraSmall,
    Small,
    Medium,
    Large,
    ExtraLarge,
    A5,
    A6,
    A7,
}

impl VmSize {
    pub const ALL: [VmSize; 8] = [
        VmSize::ExtraSmall,
        VmSize::Small,
        VmSize::Medium,
        VmSize::Large,
        VmSize::ExtraLarge,
        VmSize::A5,
        VmSize::A6,
        VmSize::A7,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VmSize::ExtraSmall => "ExtraSmall",
            VmSize::Small => "Small",
            VmSize::Medium => "Medium",
            VmSize::Large => "Large",
            VmSize::ExtraLarge => "ExtraLarge",
            VmSize::A5 => "A5",
            VmSize::A6 => "A6",
            VmSize::A7 => "A7",
        }
    }

    /// Maximum number of data disks the size can attach.
    pub fn max_data_disks(&self) -> u32 {
        match self {
            VmSize::ExtraSmall => 1,
            VmSize::Small => 2,
            VmSize::Medium | VmSize::A5 => 4,
            VmSize::Large | VmSize::A6 => 8,
            VmSize::ExtraLarge | VmSize::A7 => 16,
        }
    }
}

impl FromStr for VmSize {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        VmSize::ALL
            .iter()
            .copied()
            .find(|size| size.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<_> = VmSize::ALL.iter().map(|s| s.as_str()).collect();
                DeployError::config(format!(
                    "unknown instance size '{wanted}' (expected one of {})",
                    known.join(", ")
                ))
            })
    }
}

impl<'de> Deserialize<'de> for VmSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct VmSizeVisitor;

        impl serde::de::Visitor<'_> for VmSizeVisitor {
            type Value = VmSize;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an instance size like 'Small', 'Medium' or 'A6'")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                value.parse().map_err(|e: DeployError| E::custom(e))
            }
        }

        deserializer.deserialize_str(VmSizeVisitor)
    }
}

impl std::fmt::Display for VmSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("medium".parse::<VmSize>().unwrap(), VmSize::Medium);
        assert_eq!(" ExtraLarge ".parse::<VmSize>().unwrap(), VmSize::ExtraLarge);
        assert_eq!("a7".parse::<VmSize>().unwrap(), VmSize::A7);
    }

    #[test]
    fn rejects_unknown_size() {
        let err = "Huge".parse::<VmSize>().unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
        assert!(err.to_string().contains("Huge"));
    }

    #[test]
    fn data_disk_limits_follow_core_count() {
        let limits: Vec<(VmSize, u32)> = VmSize::ALL
            .iter()
            .map(|size| (*size, size.max_data_disks()))
            .collect();
        assert_eq!(
            limits,
            vec![
                (VmSize::ExtraSmall, 1),
                (VmSize::Small, 2),
                (VmSize::Medium, 4),
                (VmSize::Large, 8),
                (VmSize::ExtraLarge, 16),
                (VmSize::A5, 4),
                (VmSize::A6, 8),
                (VmSize::A7, 16),
            ]
        );
    }
}
