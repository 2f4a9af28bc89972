// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ddl::FileSizing;
use crate::error::{DeployError, DeployResult};
use crate::filesystem::Filesystem;
use crate::plan::{DiskPoolPlan, PoolNaming};
use crate::size::VmSize;

pub const DEFAULT_IMAGE_LABEL: &str = "SQL Server 2014 RTM Enterprise on Windows Server 2012 R2";
pub const SQL_SERVER_PORT: u16 = 1433;

const RESERVED_ADMIN_NAMES: [&str; 4] = ["administrator", "admin", "guest", "root"];

/// Everything a deployment needs, read from `deploy.toml`. Every field has a
/// default, so an empty file (or no file) describes the reference layout.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    pub service: ServiceSection,
    pub vm: VmSection,
    pub storage: StorageSection,
    pub database: DatabaseSection,
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceSection {
    pub name: String,
    pub location: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "svc1".into(),
            location: "West US".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmSection {
    pub computer_name: String,
    pub instance_size: VmSize,
    pub admin_user: String,
    pub image_label: String,
}

impl Default for VmSection {
    fn default() -> Self {
        Self {
            computer_name: "backend".into(),
            instance_size: VmSize::Medium,
            admin_user: "sqladmin".into(),
            image_label: DEFAULT_IMAGE_LABEL.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub data_disks: u32,
    pub disk_size_gb: u32,
    pub pool_count: u32,
    pub disks_per_pool: u32,
    pub pool_prefix: String,
    pub vdisk_prefix: String,
    pub filesystem: Filesystem,
    pub allocation_unit_kb: u32,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_disks: 4,
            disk_size_gb: 10,
            pool_count: 2,
            disks_per_pool: 2,
            pool_prefix: "Pool".into(),
            vdisk_prefix: "VDisk".into(),
            filesystem: Filesystem::Ntfs,
            allocation_unit_kb: 64,
        }
    }
}

impl StorageSection {
    pub fn naming(&self) -> PoolNaming {
        PoolNaming {
            pool_prefix: self.pool_prefix.clone(),
            virtual_disk_prefix: self.vdisk_prefix.clone(),
        }
    }

    pub fn allocation_unit_bytes(&self) -> u64 {
        u64::from(self.allocation_unit_kb) * 1024
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub name: String,
    pub size_mb: u32,
    pub max_size_mb: u32,
    pub growth_mb: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let sizing = FileSizing::default();
        Self {
            name: "Testdata".into(),
            size_mb: sizing.size_mb,
            max_size_mb: sizing.max_size_mb,
            growth_mb: sizing.growth_mb,
        }
    }
}

impl DatabaseSection {
    pub fn sizing(&self) -> FileSizing {
        FileSizing {
            size_mb: self.size_mb,
            max_size_mb: self.max_size_mb,
            growth_mb: self.growth_mb,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemoteSection {
    pub settle_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub firewall_rule: String,
    pub firewall_port: u16,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            settle_timeout_secs: 120,
            poll_interval_secs: 5,
            firewall_rule: "SQL Server".into(),
            firewall_port: SQL_SERVER_PORT,
        }
    }
}

impl RemoteSection {
    pub fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.settle_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl DeployConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: DeployConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// The disk arithmetic, checked before anything talks to the cloud.
    pub fn pool_plan(&self) -> DeployResult<DiskPoolPlan> {
        DiskPoolPlan::new(
            self.storage.data_disks,
            self.storage.pool_count,
            self.storage.disks_per_pool,
        )
    }

    pub fn validate(&self) -> DeployResult<DiskPoolPlan> {
        let plan = self.pool_plan()?;

        check_field("service name", &self.service.name)?;
        check_field("location", &self.service.location)?;
        validate_computer_name(&self.vm.computer_name)?;

        let admin = check_field("admin user", &self.vm.admin_user)?;
        if RESERVED_ADMIN_NAMES
            .iter()
            .any(|r| r.eq_ignore_ascii_case(admin))
        {
            return Err(DeployError::config(format!(
                "admin user '{admin}' is reserved by the platform"
            )));
        }
        check_field("image label filter", &self.vm.image_label)?;

        let max = self.vm.instance_size.max_data_disks();
        if self.storage.data_disks > max {
            return Err(DeployError::config(format!(
                "{} VMs attach at most {max} data disk(s), {} requested",
                self.vm.instance_size, self.storage.data_disks
            )));
        }
        if !(1..=1023).contains(&self.storage.disk_size_gb) {
            return Err(DeployError::config(format!(
                "data disk size must be between 1 and 1023 GB (got {})",
                self.storage.disk_size_gb
            )));
        }
        self.storage
            .filesystem
            .check_allocation_unit(self.storage.allocation_unit_kb)?;
        check_field("pool prefix", &self.storage.pool_prefix)?;
        check_field("virtual disk prefix", &self.storage.vdisk_prefix)?;
        if self.storage.pool_prefix == self.storage.vdisk_prefix {
            return Err(DeployError::config("pool and virtual disk prefixes must differ"));
        }

        check_field("database name", &self.database.name)?;
        self.database.sizing().validate()?;

        if self.remote.poll_interval_secs == 0 {
            return Err(DeployError::config("poll interval must be at least 1s"));
        }
        if self.remote.poll_interval_secs > self.remote.settle_timeout_secs {
            return Err(DeployError::config(format!(
                "poll interval ({}s) exceeds the settle timeout ({}s)",
                self.remote.poll_interval_secs, self.remote.settle_timeout_secs
            )));
        }
        check_field("firewall rule name", &self.remote.firewall_rule)?;
        if self.remote.firewall_port == 0 {
            return Err(DeployError::config("firewall port must not be 0"));
        }

        Ok(plan)
    }

    pub fn print_summary(&self) {
        println!("{self}");
    }
}

/// Values are sent to the cloud and the guest verbatim, so padding is an error.
fn check_field<'a>(field: &str, value: &'a str) -> DeployResult<&'a str> {
    if value.trim().is_empty() {
        return Err(DeployError::config(format!("{field} is empty")));
    }
    if value.trim() != value {
        return Err(DeployError::config(format!(
            "{field} '{value}' has leading or trailing whitespace"
        )));
    }
    Ok(value)
}

fn validate_computer_name(name: &str) -> DeployResult<()> {
    if name.is_empty() || name.len() > 15 {
        return Err(DeployError::config(format!(
            "computer name '{name}' must be 1 to 15 characters"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(DeployError::config(format!(
            "computer name '{name}' may only contain letters, digits and hyphens"
        )));
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(DeployError::config(format!(
            "computer name '{name}' cannot be entirely numeric"
        )));
    }
    Ok(())
}

impl core::fmt::Display for DeployConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(
            f,
            "\n  {}/{} in '{}' ({}, {})",
            self.service.name,
            self.vm.computer_name,
            self.service.location,
            self.vm.instance_size,
            self.vm.image_label
        )?;
        writeln!(f, "  ┌──────┬──────────────────┬──────────────────┬───────┬────────────┐")?;
        writeln!(f, "  | Pool | Name             | Virtual disk     | Disks | Capacity   |")?;
        writeln!(f, "  ├──────┼──────────────────┼──────────────────┼───────┼────────────┤")?;
        let naming = self.storage.naming();
        for k in 1..=self.storage.pool_count as usize {
            let capacity =
                u64::from(self.storage.disks_per_pool) * u64::from(self.storage.disk_size_gb);
            writeln!(
                f,
                "  | {k:<4} | {n:<16} | {v:<16} | {d:>5} | {c:>7} GB |",
                n = naming.pool_name(k),
                v = naming.virtual_disk_name(k),
                d = self.storage.disks_per_pool,
                c = capacity,
            )?;
        }
        writeln!(f, "  └──────┴──────────────────┴──────────────────┴───────┴────────────┘")?;
        write!(
            f,
            "  {} volumes, {} KB units; database [{}]: {} data + {} log file(s), {} MB (max {} MB, +{} MB), TCP/{} open",
            self.storage.filesystem,
            self.storage.allocation_unit_kb,
            self.database.name,
            self.storage.pool_count,
            self.storage.pool_count,
            self.database.size_mb,
            self.database.max_size_mb,
            self.database.growth_mb,
            self.remote.firewall_port
        )
    }
}
