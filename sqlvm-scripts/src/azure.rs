// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;

use sqlvm_layout::{DeployError, DeployResult, Log, log_verbose};

use crate::credential::{Credential, PASSWORD_ENV};
use crate::provider::{Certificate, CloudProvider, VmImage, VmRequest};
use crate::script::{PsScript, ScriptRunner, parse_json, quote};

/// [`CloudProvider`] backed by the classic Azure service-management cmdlets.
pub struct AzureServiceManagement<R: ScriptRunner> {
    runner: R,
    log: Log,
}

impl<R: ScriptRunner> AzureServiceManagement<R> {
    pub fn new(runner: R, log: &Log) -> Self {
        Self {
            runner,
            log: log.clone(),
        }
    }

    fn query<T: DeserializeOwned>(&self, script: &PsScript) -> DeployResult<T> {
        log_verbose!(self.log, "azure: {}", script.name());
        let stdout = self
            .runner
            .run(script)
            .map_err(|e| DeployError::provider(format!("{}: {e:#}", script.name())))?;
        parse_json(&stdout).map_err(|e| DeployError::provider(format!("{}: {e:#}", script.name())))
    }

    pub fn service_exists_script(service: &str) -> PsScript {
        let mut ps = PsScript::new("service-exists");
        ps.add(format!(
            "try {{ $null = Get-AzureService -ServiceName {} -ErrorAction Stop; $found = $true }} catch {{ $found = $false }}",
            quote(service)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject $found");
        ps
    }

    pub fn vm_exists_script(service: &str, vm: &str) -> PsScript {
        let mut ps = PsScript::new("vm-exists");
        ps.add(format!(
            "$vm = Get-AzureVM -ServiceName {} -Name {} -ErrorAction SilentlyContinue",
            quote(service),
            quote(vm)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject ($null -ne $vm)");
        ps
    }

    pub fn latest_image_script(label_prefix: &str) -> PsScript {
        let mut ps = PsScript::new("latest-image");
        ps.add(format!(
            "$pattern = [System.Management.Automation.WildcardPattern]::Escape({}) + '*'",
            quote(label_prefix)
        ));
        ps.add("$image = Get-AzureVMImage | Where-Object { $_.Label -like $pattern } | Sort-Object -Property PublishedDate -Descending | Select-Object -First 1");
        ps.add("if ($null -eq $image) { $found = $null } else { $found = [pscustomobject]@{ ImageName = $image.ImageName; Label = $image.Label } }");
        ps.add("ConvertTo-Json -Compress -InputObject $found");
        ps
    }

    pub fn create_vm_script(request: &VmRequest) -> PsScript {
        let mut ps = PsScript::new("create-vm");
        ps.add(format!(
            "$vm = New-AzureVMConfig -Name {} -InstanceSize {} -ImageName {}",
            quote(&request.name),
            quote(request.size.as_str()),
            quote(&request.image)
        ));
        ps.add(format!(
            "$vm = $vm | Add-AzureProvisioningConfig -Windows -AdminUsername {} -Password $env:{PASSWORD_ENV}",
            quote(&request.admin_user)
        ));
        for disk in &request.data_disks {
            ps.add(format!(
                "$vm = $vm | Add-AzureDataDisk -CreateNew -DiskSizeInGB {} -DiskLabel {} -LUN {}",
                disk.size_gb,
                quote(&disk.label),
                disk.lun
            ));
        }
        let location = request
            .location
            .as_deref()
            .map(|l| format!(" -Location {}", quote(l)))
            .unwrap_or_default();
        ps.add(format!(
            "New-AzureVM -ServiceName {}{location} -VMs $vm -WaitForBoot | Out-Null",
            quote(&request.service)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject $true");
        ps
    }

    pub fn winrm_thumbprint_script(service: &str, vm: &str) -> PsScript {
        let mut ps = PsScript::new("winrm-thumbprint");
        ps.add(format!(
            "$vm = Get-AzureVM -ServiceName {} -Name {}",
            quote(service),
            quote(vm)
        ));
        ps.add(
            "ConvertTo-Json -Compress -InputObject \"$($vm.VM.DefaultWinRMCertificateThumbprint)\"",
        );
        ps
    }

    pub fn certificate_script(service: &str, thumbprint: &str) -> PsScript {
        let mut ps = PsScript::new("fetch-certificate");
        ps.add(format!(
            "$cert = Get-AzureCertificate -ServiceName {} -Thumbprint {} -ThumbprintAlgorithm sha1",
            quote(service),
            quote(thumbprint)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject ([pscustomobject]@{ Thumbprint = \"$($cert.Thumbprint)\"; Data = \"$($cert.Data)\" })");
        ps
    }

    pub fn winrm_uri_script(service: &str, vm: &str) -> PsScript {
        let mut ps = PsScript::new("winrm-uri");
        ps.add(format!(
            "$uri = Get-AzureWinRMUri -ServiceName {} -Name {}",
            quote(service),
            quote(vm)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject $uri.AbsoluteUri");
        ps
    }
}

impl<R: ScriptRunner> CloudProvider for AzureServiceManagement<R> {
    fn service_exists(&self, service: &str) -> DeployResult<bool> {
        self.query(&Self::service_exists_script(service))
    }

    fn vm_exists(&self, service: &str, vm: &str) -> DeployResult<bool> {
        self.query(&Self::vm_exists_script(service, vm))
    }

    fn latest_image(&self, label_prefix: &str) -> DeployResult<VmImage> {
        let found: Option<VmImage> = self.query(&Self::latest_image_script(label_prefix))?;
        found.ok_or_else(|| {
            DeployError::provider(format!("no image label starts with '{label_prefix}'"))
        })
    }

    fn create_vm(&self, request: &VmRequest, credential: &Credential) -> DeployResult<()> {
        let mut script = Self::create_vm_script(request);
        script.env(PASSWORD_ENV, credential.password());
        let _: bool = self.query(&script)?;
        Ok(())
    }

    fn winrm_thumbprint(&self, service: &str, vm: &str) -> DeployResult<String> {
        let thumbprint: String = self.query(&Self::winrm_thumbprint_script(service, vm))?;
        if thumbprint.trim().is_empty() {
            return Err(DeployError::provider(format!(
                "{service}/{vm} has no WinRM certificate"
            )));
        }
        Ok(thumbprint.trim().to_string())
    }

    fn certificate(&self, service: &str, thumbprint: &str) -> DeployResult<Certificate> {
        let cert: Certificate = self.query(&Self::certificate_script(service, thumbprint))?;
        if cert.data.is_empty() {
            return Err(DeployError::provider(format!(
                "certificate {thumbprint} of {service} came back empty"
            )));
        }
        Ok(cert)
    }

    fn winrm_uri(&self, service: &str, vm: &str) -> DeployResult<String> {
        self.query(&Self::winrm_uri_script(service, vm))
    }
}
