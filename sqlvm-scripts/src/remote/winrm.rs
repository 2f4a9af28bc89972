// SPDX-License-Identifier: MIT

use sqlvm_layout::{DeployError, DeployResult, Log, log_verbose};

use super::{RemoteChannel, RemoteConnector, RemoteReply, RemoteRequest};
use crate::credential::{Credential, PASSWORD_ENV};
use crate::script::{PsScript, ScriptRunner, parse_json, quote};

/// Wraps one request into a local script that runs it with `Invoke-Command`.
pub fn render_remote(uri: &str, user: &str, request: &RemoteRequest) -> PsScript {
    let op = &request.operation;
    let params = op.parameters();

    let mut ps = PsScript::new(format!("remote-{}", op.name()));
    ps.add(format!(
        "$secure = ConvertTo-SecureString -String $env:{PASSWORD_ENV} -AsPlainText -Force"
    ));
    ps.add(format!(
        "$credential = New-Object System.Management.Automation.PSCredential -ArgumentList {}, $secure",
        quote(user)
    ));
    for (i, (_, value)) in params.iter().enumerate() {
        ps.add(format!("$arg{i} = {}", value.render()));
    }

    let names = params
        .iter()
        .map(|(name, _)| format!("${name}"))
        .collect::<Vec<_>>()
        .join(", ");
    ps.add(format!(
        "$result = Invoke-Command -ConnectionUri {} -Credential $credential -ScriptBlock {{",
        quote(uri)
    ));
    ps.add(format!("    param({names})"));
    ps.add("    $ErrorActionPreference = 'Stop'");
    for line in op.body() {
        ps.add(format!("    {line}"));
    }

    let argument_list = match params.len() {
        0 => String::new(),
        // A single array argument would be spread across the parameters.
        1 => " -ArgumentList (,$arg0)".to_string(),
        n => format!(
            " -ArgumentList {}",
            (0..n).map(|i| format!("$arg{i}")).collect::<Vec<_>>().join(", ")
        ),
    };
    ps.add(format!("}}{argument_list}"));
    ps.add("Write-Output $result");
    ps
}

/// Opens [`WinRmChannel`]s over HTTPS remoting.
pub struct WinRmConnector<R: ScriptRunner + Clone> {
    runner: R,
    log: Log,
}

impl<R: ScriptRunner + Clone> WinRmConnector<R> {
    pub fn new(runner: R, log: &Log) -> Self {
        Self {
            runner,
            log: log.clone(),
        }
    }
}

impl<R: ScriptRunner + Clone> RemoteConnector for WinRmConnector<R> {
    type Channel = WinRmChannel<R>;

    fn connect(&self, uri: &str, credential: &Credential) -> DeployResult<Self::Channel> {
        if uri.trim().is_empty() {
            return Err(DeployError::remote("empty WinRM endpoint"));
        }
        log_verbose!(self.log, "WinRM endpoint: {uri}");
        Ok(WinRmChannel {
            runner: self.runner.clone(),
            uri: uri.to_string(),
            credential: credential.clone(),
            log: self.log.clone(),
        })
    }
}

pub struct WinRmChannel<R: ScriptRunner> {
    runner: R,
    uri: String,
    credential: Credential,
    log: Log,
}

impl<R: ScriptRunner> RemoteChannel for WinRmChannel<R> {
    fn invoke(&mut self, request: &RemoteRequest) -> DeployResult<RemoteReply> {
        let name = request.operation.name();
        log_verbose!(self.log, "-> {name} [{}]", request.id);

        let mut script = render_remote(&self.uri, &self.credential.user, request);
        script.env(PASSWORD_ENV, self.credential.password());

        let stdout = self
            .runner
            .run(&script)
            .map_err(|e| DeployError::remote(format!("{name}: {e:#}")))?;
        let value =
            parse_json(&stdout).map_err(|e| DeployError::remote(format!("{name}: {e:#}")))?;
        Ok(RemoteReply(value))
    }
}
