// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fmt;

use crate::error::{DeployError, DeployResult};

/// How the attached data disks are grouped into striped pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskPoolPlan {
    total_disks: u32,
    disks_per_pool: u32,
    pool_count: u32,
}

impl DiskPoolPlan {
    pub fn new(total_disks: u32, pool_count: u32, disks_per_pool: u32) -> DeployResult<Self> {
        if pool_count == 0 || disks_per_pool == 0 {
            return Err(DeployError::config(format!(
                "pool count ({pool_count}) and disks per pool ({disks_per_pool}) must both be at least 1"
            )));
        }
        let needed = pool_count.checked_mul(disks_per_pool);
        if needed != Some(total_disks) {
            return Err(DeployError::config(format!(
                "{total_disks} data disk(s) cannot form {pool_count} pool(s) of {disks_per_pool} disk(s)"
            )));
        }
        Ok(Self {
            total_disks,
            disks_per_pool,
            pool_count,
        })
    }

    pub fn total_disks(&self) -> u32 {
        self.total_disks
    }

    pub fn disks_per_pool(&self) -> u32 {
        self.disks_per_pool
    }

    pub fn pool_count(&self) -> u32 {
        self.pool_count
    }

    /// Slices the enumerated disks into contiguous pools, in enumeration order.
    /// Disks past `total_disks` are left alone.
    pub fn assign(&self, disks: &[PhysicalDisk], naming: &PoolNaming) -> DeployResult<Vec<Pool>> {
        let needed = self.total_disks as usize;
        if disks.len() < needed {
            return Err(DeployError::remote(format!(
                "{needed} poolable disk(s) required but only {} found",
                disks.len()
            )));
        }

        let pools = disks[..needed]
            .chunks(self.disks_per_pool as usize)
            .enumerate()
            .map(|(i, slice)| Pool {
                name: naming.pool_name(i + 1),
                virtual_disk: naming.virtual_disk_name(i + 1),
                disks: slice.to_vec(),
            })
            .collect();

        Ok(pools)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolNaming {
    pub pool_prefix: String,
    pub virtual_disk_prefix: String,
}

impl Default for PoolNaming {
    fn default() -> Self {
        Self {
            pool_prefix: "Pool".into(),
            virtual_disk_prefix: "VDisk".into(),
        }
    }
}

impl PoolNaming {
    pub fn pool_name(&self, index: usize) -> String {
        format!("{}{index}", self.pool_prefix)
    }

    pub fn virtual_disk_name(&self, index: usize) -> String {
        format!("{}{index}", self.virtual_disk_prefix)
    }
}

/// A raw disk the guest reports as poolable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicalDisk {
    pub unique_id: String,
    pub friendly_name: String,
    #[serde(rename = "Size", default)]
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub name: String,
    pub virtual_disk: String,
    pub disks: Vec<PhysicalDisk>,
}

impl Pool {
    pub fn disk_ids(&self) -> Vec<&str> {
        self.disks.iter().map(|d| d.unique_id.as_str()).collect()
    }

    /// Full striping: one column per disk, a single data copy.
    pub fn striped_volume(&self) -> StripedVolume {
        StripedVolume {
            name: self.virtual_disk.clone(),
            pool: self.name.clone(),
            columns: self.disks.len() as u32,
            data_copies: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripedVolume {
    pub name: String,
    pub pool: String,
    pub columns: u32,
    pub data_copies: u32,
}

/// Drive letter of a formatted volume, always upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriveLetter(char);

impl DriveLetter {
    pub fn new(c: char) -> DeployResult<Self> {
        if c.is_ascii_alphabetic() {
            Ok(Self(c.to_ascii_uppercase()))
        } else {
            Err(DeployError::config(format!("'{c}' is not a drive letter")))
        }
    }

    pub fn as_char(&self) -> char {
        self.0
    }

    /// Root path of the volume, e.g. `F:\`.
    pub fn root(&self) -> String {
        format!("{}:\\", self.0)
    }

    /// Drive letters starting at `first`, used to preview a layout.
    pub fn sequence(first: char, count: usize) -> DeployResult<Vec<Self>> {
        let start = DriveLetter::new(first)?.0 as u8;
        (0..count)
            .map(|i| {
                let c = start
                    .checked_add(i as u8)
                    .filter(|c| *c <= b'Z')
                    .ok_or_else(|| DeployError::config("ran out of drive letters"))?;
                DriveLetter::new(c as char)
            })
            .collect()
    }
}

impl TryFrom<&str> for DriveLetter {
    type Error = DeployError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim().trim_end_matches(['\\', ':']);
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => DriveLetter::new(c),
            _ => Err(DeployError::config(format!(
                "'{value}' is not a drive letter"
            ))),
        }
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disks(n: usize) -> Vec<PhysicalDisk> {
        (0..n)
            .map(|i| PhysicalDisk {
                unique_id: format!("disk-{i}"),
                friendly_name: format!("PhysicalDisk{}", i + 2),
                size_bytes: 10 * 1024 * 1024 * 1024,
            })
            .collect()
    }

    #[test]
    fn rejects_mismatched_arithmetic() {
        for (total, pools, per_pool) in [(4, 3, 2), (4, 2, 3), (5, 2, 2), (0, 2, 2), (3, 1, 2)] {
            let err = DiskPoolPlan::new(total, pools, per_pool).unwrap_err();
            assert!(
                matches!(err, DeployError::Configuration(_)),
                "({total}, {pools}, {per_pool}) should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_counts() {
        assert!(DiskPoolPlan::new(0, 0, 2).is_err());
        assert!(DiskPoolPlan::new(0, 2, 0).is_err());
    }

    #[test]
    fn two_by_two_takes_first_four_disks() {
        let plan = DiskPoolPlan::new(4, 2, 2).unwrap();
        let available = disks(6);
        let pools = plan.assign(&available, &PoolNaming::default()).unwrap();

        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name, "Pool1");
        assert_eq!(pools[1].name, "Pool2");
        assert_eq!(pools[0].disk_ids(), vec!["disk-0", "disk-1"]);
        assert_eq!(pools[1].disk_ids(), vec!["disk-2", "disk-3"]);

        let mut seen: Vec<_> = pools.iter().flat_map(|p| p.disk_ids()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 4, "no disk may be reused across pools");
    }

    #[test]
    fn too_few_disks_is_fatal() {
        let plan = DiskPoolPlan::new(4, 2, 2).unwrap();
        let err = plan.assign(&disks(3), &PoolNaming::default()).unwrap_err();
        assert!(matches!(err, DeployError::RemoteExecution(_)));
        assert!(err.to_string().contains("only 3 found"));
    }

    #[test]
    fn striped_volume_uses_every_disk_as_a_column() {
        let plan = DiskPoolPlan::new(6, 2, 3).unwrap();
        let pools = plan.assign(&disks(6), &PoolNaming::default()).unwrap();
        let vol = pools[1].striped_volume();
        assert_eq!(vol.name, "VDisk2");
        assert_eq!(vol.pool, "Pool2");
        assert_eq!(vol.columns, 3);
        assert_eq!(vol.data_copies, 1);
    }

    #[test]
    fn drive_letters() {
        assert_eq!(DriveLetter::try_from("f").unwrap().as_char(), 'F');
        assert_eq!(DriveLetter::try_from("G:\\").unwrap().root(), "G:\\");
        assert!(DriveLetter::try_from("").is_err());
        assert!(DriveLetter::try_from("FG").is_err());
        assert!(DriveLetter::new('1').is_err());

        let seq = DriveLetter::sequence('F', 3).unwrap();
        assert_eq!(seq.iter().map(|d| d.as_char()).collect::<String>(), "FGH");
        assert!(DriveLetter::sequence('Y', 3).is_err());
    }
}
