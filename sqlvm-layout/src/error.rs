// SPDX-License-Identifier: MIT

use core::fmt;
use std::time::Duration;

/// Every failure of a deployment run. All of them are fatal: nothing is
/// retried and nothing already created is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    /// Invalid settings, detected before any provider or remote call.
    Configuration(String),
    /// The target already exists.
    Precondition(String),
    /// A cloud management call failed.
    Provider(String),
    /// A step of the remote procedure failed on the guest.
    RemoteExecution(String),
    /// A bounded wait ran out.
    Timeout { what: String, waited: Duration },
}

impl DeployError {
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::Configuration(_) => "configuration",
            DeployError::Precondition(_) => "precondition",
            DeployError::Provider(_) => "provider",
            DeployError::RemoteExecution(_) => "remote execution",
            DeployError::Timeout { .. } => "timeout",
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        DeployError::Configuration(msg.into())
    }

    pub fn provider<S: Into<String>>(msg: S) -> Self {
        DeployError::Provider(msg.into())
    }

    pub fn remote<S: Into<String>>(msg: S) -> Self {
        DeployError::RemoteExecution(msg.into())
    }
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Configuration(msg) => write!(f, "Invalid config: {msg}"),
            DeployError::Precondition(msg) => write!(f, "Precondition failed: {msg}"),
            DeployError::Provider(msg) => write!(f, "Cloud provider error: {msg}"),
            DeployError::RemoteExecution(msg) => write!(f, "Remote execution failed: {msg}"),
            DeployError::Timeout { what, waited } => {
                write!(f, "Timed out after {}s waiting for {what}", waited.as_secs())
            }
        }
    }
}

impl std::error::Error for DeployError {}

pub type DeployResult<T = ()> = Result<T, DeployError>;
