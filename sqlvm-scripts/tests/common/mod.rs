// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use sqlvm_layout::{DeployError, DeployResult};
use sqlvm_scripts::{
    Certificate, CertificateStore, CloudProvider, Credential, RemoteChannel, RemoteConnector,
    RemoteOperation, RemoteReply, RemoteRequest, VmImage, VmRequest,
};

pub const THUMBPRINT: &str = "3D9C1A7E55B0F2C4A8E6D1B9C7F0A2E4D6B8C1F3";
pub const ENDPOINT: &str = "https://svc1.cloudapp.net:5986/";

pub fn credential() -> Credential {
    Credential::new("sqladmin", "Str0ng!Passw0rd")
}

#[derive(Default)]
pub struct FakeProvider {
    pub service_exists: bool,
    pub vm_exists: bool,
    pub calls: RefCell<Vec<String>>,
    pub created: RefCell<Vec<VmRequest>>,
}

impl FakeProvider {
    fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CloudProvider for FakeProvider {
    fn service_exists(&self, _service: &str) -> DeployResult<bool> {
        self.record("service_exists");
        Ok(self.service_exists)
    }

    fn vm_exists(&self, _service: &str, _vm: &str) -> DeployResult<bool> {
        self.record("vm_exists");
        Ok(self.vm_exists)
    }

    fn latest_image(&self, label_prefix: &str) -> DeployResult<VmImage> {
        self.record("latest_image");
        Ok(VmImage {
            image_name: "fb83b3509582419d99629ce476bcb5c8__SQL-Server-2014-RTM-12.0.2000.8-Enterprise".into(),
            label: label_prefix.to_string(),
        })
    }

    fn create_vm(&self, request: &VmRequest, _credential: &Credential) -> DeployResult<()> {
        self.record("create_vm");
        self.created.borrow_mut().push(request.clone());
        Ok(())
    }

    fn winrm_thumbprint(&self, _service: &str, _vm: &str) -> DeployResult<String> {
        self.record("winrm_thumbprint");
        Ok(THUMBPRINT.into())
    }

    fn certificate(&self, _service: &str, thumbprint: &str) -> DeployResult<Certificate> {
        self.record("certificate");
        Ok(Certificate {
            thumbprint: thumbprint.to_string(),
            data: "MIIDBjCCAe6gAwIBAgIQ".into(),
        })
    }

    fn winrm_uri(&self, _service: &str, _vm: &str) -> DeployResult<String> {
        self.record("winrm_uri");
        Ok(ENDPOINT.into())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub trusted: Vec<String>,
    pub imports: usize,
}

impl CertificateStore for FakeStore {
    fn contains(&self, thumbprint: &str) -> DeployResult<bool> {
        Ok(self.trusted.iter().any(|t| t.eq_ignore_ascii_case(thumbprint)))
    }

    fn import(&mut self, certificate: &Certificate) -> DeployResult<()> {
        self.imports += 1;
        self.trusted.push(certificate.thumbprint.clone());
        Ok(())
    }
}

/// How the fake guest behaves.
#[derive(Clone)]
pub struct Guest {
    pub disks: usize,
    /// Pools whose virtual disk job fails.
    pub failing_pools: Vec<String>,
    /// `ListVolumes` polls answered before the volumes report ready.
    pub polls_until_ready: Option<usize>,
}

impl Default for Guest {
    fn default() -> Self {
        Self {
            disks: 4,
            failing_pools: vec![],
            polls_until_ready: Some(0),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub guest: Guest,
    pub received: Rc<RefCell<Vec<RemoteOperation>>>,
    pub connected: Rc<RefCell<Vec<(String, String)>>>,
}

impl FakeConnector {
    pub fn with_guest(guest: Guest) -> Self {
        Self {
            guest,
            ..Default::default()
        }
    }

    pub fn operation_names(&self) -> Vec<&'static str> {
        self.received.borrow().iter().map(|op| op.name()).collect()
    }
}

impl RemoteConnector for FakeConnector {
    type Channel = FakeChannel;

    fn connect(&self, uri: &str, credential: &Credential) -> DeployResult<FakeChannel> {
        self.connected
            .borrow_mut()
            .push((uri.to_string(), credential.user.clone()));
        Ok(FakeChannel {
            guest: self.guest.clone(),
            received: Rc::clone(&self.received),
            polls: 0,
        })
    }
}

pub struct FakeChannel {
    guest: Guest,
    received: Rc<RefCell<Vec<RemoteOperation>>>,
    polls: usize,
}

impl RemoteChannel for FakeChannel {
    fn invoke(&mut self, request: &RemoteRequest) -> DeployResult<RemoteReply> {
        self.received.borrow_mut().push(request.operation.clone());
        let value = match &request.operation {
            RemoteOperation::ListPoolableDisks => Value::Array(
                (0..self.guest.disks)
                    .map(|i| {
                        json!({
                            "UniqueId": format!("{{6000-{i}}}"),
                            "FriendlyName": format!("PhysicalDisk{}", i + 2),
                            "Size": 10u64 << 30,
                        })
                    })
                    .collect(),
            ),
            RemoteOperation::CreateVirtualDisks { volumes } => Value::Array(
                volumes
                    .iter()
                    .map(|v| {
                        let failed = self.guest.failing_pools.contains(&v.pool);
                        json!({
                            "Pool": v.pool,
                            "VirtualDisk": v.name,
                            "State": if failed { "Failed" } else { "Completed" },
                            "Error": if failed { "Not enough available capacity" } else { "" },
                        })
                    })
                    .collect(),
            ),
            RemoteOperation::ListVolumes { volumes } => {
                let ready = self
                    .guest
                    .polls_until_ready
                    .is_some_and(|n| self.polls >= n);
                self.polls += 1;
                Value::Array(
                    volumes
                        .iter()
                        .enumerate()
                        .map(|(i, name)| {
                            let letter = char::from(b'F' + i as u8).to_string();
                            json!({
                                "VirtualDisk": name,
                                "DriveLetter":
                                    if ready { Value::from(letter) } else { Value::Null },
                                "Ready": ready,
                            })
                        })
                        .collect(),
                )
            }
            RemoteOperation::CreateStoragePools { .. }
            | RemoteOperation::FormatVirtualDisks { .. }
            | RemoteOperation::ExecuteSql { .. }
            | RemoteOperation::OpenFirewallPort { .. } => Value::Null,
        };
        Ok(RemoteReply(value))
    }
}

pub fn is_configuration(err: &DeployError) -> bool {
    matches!(err, DeployError::Configuration(_))
}
