// SPDX-License-Identifier: MIT

use sqlvm_layout::{
    DeployConfig, DeployError, DeployResult, DriveLetter, Log, PhysicalDisk, log_info, log_ok,
    log_verbose,
};

use crate::azure::AzureServiceManagement;
use crate::credential::Credential;
use crate::executor::{ProcedureOutcome, RemoteExecutor, RemoteProcedure};
use crate::progress::with_spinner;
use crate::provider::{CloudProvider, VmImage, VmRequest};
use crate::remote::{RemoteConnector, RemoteOperation, RemoteRequest, render_remote};
use crate::script::{PowerShell, PsScript};
use crate::trust::{CertificateStore, TrustBootstrapper, TrustOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    pub service: String,
    pub vm: String,
    pub image: VmImage,
    pub new_service: bool,
    pub trust: TrustOutcome,
    pub endpoint: String,
    pub procedure: ProcedureOutcome,
}

/// The whole pipeline: provision, trust, then run the guest procedure.
pub struct Deployment<'a, P, S, C>
where
    P: CloudProvider,
    S: CertificateStore,
    C: RemoteConnector,
{
    provider: &'a P,
    store: &'a mut S,
    connector: &'a C,
    log: &'a Log,
}

impl<'a, P, S, C> Deployment<'a, P, S, C>
where
    P: CloudProvider,
    S: CertificateStore,
    C: RemoteConnector,
{
    pub fn new(provider: &'a P, store: &'a mut S, connector: &'a C, log: &'a Log) -> Self {
        Self {
            provider,
            store,
            connector,
            log,
        }
    }

    pub fn run(
        &mut self,
        config: &DeployConfig,
        credential: &Credential,
    ) -> DeployResult<DeploymentReport> {
        // Nothing external is touched until the layout is known to be sound.
        let plan = config.validate()?;
        credential
            .check_complexity()
            .map_err(|e| DeployError::config(format!("{e:#}")))?;
        if credential.user != config.vm.admin_user {
            return Err(DeployError::config(format!(
                "credential is for '{}' but the VM admin is '{}'",
                credential.user, config.vm.admin_user
            )));
        }

        let service = config.service.name.as_str();
        let vm = config.vm.computer_name.as_str();

        let new_service = !self.provider.service_exists(service)?;
        if !new_service && self.provider.vm_exists(service, vm)? {
            return Err(DeployError::Precondition(format!(
                "VM '{vm}' already exists in service '{service}'"
            )));
        }

        let image = self.provider.latest_image(&config.vm.image_label)?;
        log_verbose!(self.log, "Image: {} ({})", image.label, image.image_name);

        let request = VmRequest::from_config(config, &image, new_service);
        if new_service {
            log_info!(
                self.log,
                "Creating service '{service}' in '{}'",
                config.service.location
            );
        }
        log_info!(
            self.log,
            "Provisioning {vm} ({}) with {} x {} GB data disk(s)",
            request.size,
            request.data_disks.len(),
            config.storage.disk_size_gb
        );
        with_spinner(self.log, "Waiting for the VM to boot", || {
            self.provider.create_vm(&request, credential)
        })?;
        log_ok!(self.log, "{vm} is running");

        let trust =
            TrustBootstrapper::new(self.provider, self.store, self.log).establish(service, vm)?;

        let endpoint = self.provider.winrm_uri(service, vm)?;
        let mut channel = self.connector.connect(&endpoint, credential)?;
        let procedure = RemoteProcedure::from_config(config, plan);
        let outcome = RemoteExecutor::new(&mut channel, self.log).run(&procedure)?;

        log_ok!(
            self.log,
            "Database [{}] is ready on {service}/{vm}",
            config.database.name
        );

        Ok(DeploymentReport {
            service: service.to_string(),
            vm: vm.to_string(),
            image,
            new_service,
            trust,
            endpoint,
            procedure: outcome,
        })
    }
}

/// What a deployment would run, rendered without calling anything.
#[derive(Debug)]
pub struct Preview {
    pub scripts: Vec<PsScript>,
    pub statement: String,
}

pub const PLACEHOLDER_ENDPOINT: &str = "https://<service>.cloudapp.net:<port>/";

pub fn preview(config: &DeployConfig) -> DeployResult<Preview> {
    type Azure = AzureServiceManagement<PowerShell>;

    let plan = config.validate()?;
    let service = config.service.name.as_str();
    let vm = config.vm.computer_name.as_str();

    let image = VmImage {
        image_name: "<latest image>".into(),
        label: config.vm.image_label.clone(),
    };
    let request = VmRequest::from_config(config, &image, true);

    let mut scripts = vec![
        Azure::service_exists_script(service),
        Azure::vm_exists_script(service, vm),
        Azure::latest_image_script(&config.vm.image_label),
        Azure::create_vm_script(&request),
        Azure::winrm_thumbprint_script(service, vm),
        Azure::certificate_script(service, "<thumbprint>"),
        Azure::winrm_uri_script(service, vm),
    ];

    let disks: Vec<PhysicalDisk> = (0..plan.total_disks())
        .map(|i| PhysicalDisk {
            unique_id: format!("<disk-{i}>"),
            friendly_name: format!("PhysicalDisk{}", i + 2),
            size_bytes: u64::from(config.storage.disk_size_gb) << 30,
        })
        .collect();
    let procedure = RemoteProcedure::from_config(config, plan);
    let pools = plan.assign(&disks, &procedure.naming)?;
    let volumes: Vec<String> = pools.iter().map(|p| p.virtual_disk.clone()).collect();
    let drives = DriveLetter::sequence('F', pools.len())?;
    let statement = procedure.create_database(&drives)?;

    let operations = [
        RemoteOperation::ListPoolableDisks,
        RemoteOperation::CreateStoragePools {
            pools: pools.clone(),
        },
        RemoteOperation::CreateVirtualDisks {
            volumes: pools.iter().map(|p| p.striped_volume()).collect(),
        },
        RemoteOperation::FormatVirtualDisks {
            volumes: volumes.clone(),
            filesystem: procedure.filesystem,
            allocation_unit_bytes: procedure.allocation_unit_bytes,
        },
        RemoteOperation::ListVolumes { volumes },
        RemoteOperation::ExecuteSql {
            statement: statement.clone(),
        },
        RemoteOperation::OpenFirewallPort {
            rule_name: procedure.firewall_rule.clone(),
            port: procedure.firewall_port,
        },
    ];
    scripts.extend(operations.into_iter().map(|op| {
        render_remote(
            PLACEHOLDER_ENDPOINT,
            &config.vm.admin_user,
            &RemoteRequest::new(op),
        )
    }));

    Ok(Preview { scripts, statement })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_covers_every_step() {
        let preview = preview(&DeployConfig::default()).unwrap();
        let names: Vec<&str> = preview.scripts.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "service-exists",
                "vm-exists",
                "latest-image",
                "create-vm",
                "winrm-thumbprint",
                "fetch-certificate",
                "winrm-uri",
                "remote-list-poolable-disks",
                "remote-create-storage-pools",
                "remote-create-virtual-disks",
                "remote-format-virtual-disks",
                "remote-list-volumes",
                "remote-execute-sql",
                "remote-open-firewall-port",
            ]
        );
        assert!(preview.statement.contains("N'F:\\Testdata1.mdf'"));
        assert!(preview.statement.contains("N'G:\\Testdata2.ndf'"));
        assert!(
            preview.scripts[8].contains("@(@('<disk-0>', '<disk-1>'), @('<disk-2>', '<disk-3>'))")
        );
    }

    #[test]
    fn preview_rejects_bad_arithmetic() {
        let mut config = DeployConfig::default();
        config.storage.pool_count = 3;
        assert!(matches!(
            preview(&config).unwrap_err(),
            DeployError::Configuration(_)
        ));
    }
}
