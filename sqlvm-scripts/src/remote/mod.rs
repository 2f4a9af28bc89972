// SPDX-License-Identifier: MIT

//! Typed requests dispatched over a remote command channel.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use sqlvm_layout::{DeployError, DeployResult, Filesystem, Pool, StripedVolume};

use crate::credential::Credential;

mod ops;
pub mod winrm;

pub use winrm::*;

/// One unit of remote work and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    ListPoolableDisks,
    CreateStoragePools {
        pools: Vec<Pool>,
    },
    CreateVirtualDisks {
        volumes: Vec<StripedVolume>,
    },
    FormatVirtualDisks {
        volumes: Vec<String>,
        filesystem: Filesystem,
        allocation_unit_bytes: u64,
    },
    ListVolumes {
        volumes: Vec<String>,
    },
    ExecuteSql {
        statement: String,
    },
    OpenFirewallPort {
        rule_name: String,
        port: u16,
    },
}

impl RemoteOperation {
    pub fn name(&self) -> &'static str {
        match self {
            RemoteOperation::ListPoolableDisks => "list-poolable-disks",
            RemoteOperation::CreateStoragePools { .. } => "create-storage-pools",
            RemoteOperation::CreateVirtualDisks { .. } => "create-virtual-disks",
            RemoteOperation::FormatVirtualDisks { .. } => "format-virtual-disks",
            RemoteOperation::ListVolumes { .. } => "list-volumes",
            RemoteOperation::ExecuteSql { .. } => "execute-sql",
            RemoteOperation::OpenFirewallPort { .. } => "open-firewall-port",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub id: Uuid,
    pub operation: RemoteOperation,
}

impl RemoteRequest {
    pub fn new(operation: RemoteOperation) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
        }
    }
}

/// JSON the remote side wrote back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReply(pub serde_json::Value);

impl RemoteReply {
    pub fn empty() -> Self {
        RemoteReply(serde_json::Value::Null)
    }

    pub fn parse<T: DeserializeOwned>(&self, what: &str) -> DeployResult<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| DeployError::remote(format!("{what}: unexpected reply {}: {e}", self.0)))
    }
}

/// Outcome of one background virtual-disk job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualDiskJob {
    pub pool: String,
    pub virtual_disk: String,
    pub state: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl VirtualDiskJob {
    pub fn succeeded(&self) -> bool {
        self.state == "Completed" && self.error.as_deref().is_none_or(|e| e.trim().is_empty())
    }
}

/// Drive-letter state of one striped volume.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeStatus {
    pub virtual_disk: String,
    #[serde(default)]
    pub drive_letter: Option<String>,
    #[serde(default)]
    pub ready: bool,
}

/// An open session to the guest.
pub trait RemoteChannel {
    fn invoke(&mut self, request: &RemoteRequest) -> DeployResult<RemoteReply>;
}

/// Opens sessions once the endpoint and credential are known.
pub trait RemoteConnector {
    type Channel: RemoteChannel;

    fn connect(&self, uri: &str, credential: &Credential) -> DeployResult<Self::Channel>;
}
