// SPDX-License-Identifier: MIT

use serde::Deserialize;

use sqlvm_layout::{DeployConfig, DeployResult, VmSize};

use crate::credential::Credential;

/// Cloud management operations the deployment relies on.
pub trait CloudProvider {
    fn service_exists(&self, service: &str) -> DeployResult<bool>;
    fn vm_exists(&self, service: &str, vm: &str) -> DeployResult<bool>;
    /// Newest image whose label starts with `label_prefix`.
    fn latest_image(&self, label_prefix: &str) -> DeployResult<VmImage>;
    /// Creates the VM and blocks until it has booted.
    fn create_vm(&self, request: &VmRequest, credential: &Credential) -> DeployResult<()>;
    fn winrm_thumbprint(&self, service: &str, vm: &str) -> DeployResult<String>;
    fn certificate(&self, service: &str, thumbprint: &str) -> DeployResult<Certificate>;
    fn winrm_uri(&self, service: &str, vm: &str) -> DeployResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VmImage {
    pub image_name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    pub thumbprint: String,
    /// Base64 DER bytes.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDisk {
    pub lun: u32,
    pub size_gb: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRequest {
    pub service: String,
    /// Only set when the cloud service has to be created along with the VM.
    pub location: Option<String>,
    pub name: String,
    pub size: VmSize,
    pub image: String,
    pub admin_user: String,
    pub data_disks: Vec<DataDisk>,
}

impl VmRequest {
    pub fn from_config(config: &DeployConfig, image: &VmImage, new_service: bool) -> Self {
        let data_disks = (0..config.storage.data_disks)
            .map(|lun| DataDisk {
                lun,
                size_gb: config.storage.disk_size_gb,
                label: format!("{}-data{lun}", config.vm.computer_name),
            })
            .collect();

        Self {
            service: config.service.name.clone(),
            location: new_service.then(|| config.service.location.clone()),
            name: config.vm.computer_name.clone(),
            size: config.vm.instance_size,
            image: image.image_name.clone(),
            admin_user: config.vm.admin_user.clone(),
            data_disks,
        }
    }
}
