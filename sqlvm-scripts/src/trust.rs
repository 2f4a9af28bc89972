// SPDX-License-Identifier: MIT

use sqlvm_layout::{DeployError, DeployResult, Log, log_info, log_verbose};

use crate::provider::{Certificate, CloudProvider};
use crate::script::{PsScript, ScriptRunner, parse_json, quote};

/// Local store of trusted root certificates.
pub trait CertificateStore {
    fn contains(&self, thumbprint: &str) -> DeployResult<bool>;
    fn import(&mut self, certificate: &Certificate) -> DeployResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreLocation {
    #[default]
    LocalMachine,
    CurrentUser,
}

impl StoreLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreLocation::LocalMachine => "LocalMachine",
            StoreLocation::CurrentUser => "CurrentUser",
        }
    }
}

/// The `Root` store of this machine, driven through PowerShell.
pub struct RootStore<R: ScriptRunner> {
    runner: R,
    location: StoreLocation,
}

impl<R: ScriptRunner> RootStore<R> {
    pub fn new(runner: R, location: StoreLocation) -> Self {
        Self { runner, location }
    }

    pub fn contains_script(&self, thumbprint: &str) -> PsScript {
        let mut ps = PsScript::new("cert-trusted");
        ps.add(format!(
            "$path = 'Cert:\\{}\\Root\\' + {}",
            self.location.as_str(),
            quote(thumbprint)
        ));
        ps.add("ConvertTo-Json -Compress -InputObject (Test-Path -LiteralPath $path)");
        ps
    }

    pub fn import_script(&self, certificate: &Certificate) -> PsScript {
        let mut ps = PsScript::new("cert-import");
        ps.add(format!(
            "$bytes = [System.Convert]::FromBase64String({})",
            quote(&certificate.data)
        ));
        ps.add("$cert = New-Object System.Security.Cryptography.X509Certificates.X509Certificate2 -ArgumentList (,$bytes)");
        ps.add(format!(
            "$store = New-Object System.Security.Cryptography.X509Certificates.X509Store -ArgumentList 'Root', '{}'",
            self.location.as_str()
        ));
        ps.add("$store.Open([System.Security.Cryptography.X509Certificates.OpenFlags]::ReadWrite)");
        ps.add("try { $store.Add($cert) } finally { $store.Close() }");
        ps.add("ConvertTo-Json -Compress -InputObject $cert.Thumbprint");
        ps
    }
}

impl<R: ScriptRunner> CertificateStore for RootStore<R> {
    fn contains(&self, thumbprint: &str) -> DeployResult<bool> {
        let script = self.contains_script(thumbprint);
        let stdout = self
            .runner
            .run(&script)
            .map_err(|e| DeployError::provider(format!("checking trust of {thumbprint}: {e:#}")))?;
        parse_json(&stdout).map_err(|e| DeployError::provider(format!("{e:#}")))
    }

    fn import(&mut self, certificate: &Certificate) -> DeployResult<()> {
        let script = self.import_script(certificate);
        let stdout = self.runner.run(&script).map_err(|e| {
            DeployError::provider(format!(
                "importing certificate {}: {e:#}",
                certificate.thumbprint
            ))
        })?;
        let imported: String =
            parse_json(&stdout).map_err(|e| DeployError::provider(format!("{e:#}")))?;
        if !imported.eq_ignore_ascii_case(&certificate.thumbprint) {
            return Err(DeployError::provider(format!(
                "imported certificate {imported} does not match {}",
                certificate.thumbprint
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustOutcome {
    pub thumbprint: String,
    pub imported: bool,
}

/// Makes the VM's self-signed WinRM certificate trusted on this machine.
pub struct TrustBootstrapper<'a, P: CloudProvider, S: CertificateStore> {
    provider: &'a P,
    store: &'a mut S,
    log: &'a Log,
}

impl<'a, P: CloudProvider, S: CertificateStore> TrustBootstrapper<'a, P, S> {
    pub fn new(provider: &'a P, store: &'a mut S, log: &'a Log) -> Self {
        Self {
            provider,
            store,
            log,
        }
    }

    /// Imports the certificate unless its thumbprint is already trusted.
    pub fn establish(&mut self, service: &str, vm: &str) -> DeployResult<TrustOutcome> {
        let thumbprint = self.provider.winrm_thumbprint(service, vm)?;
        log_verbose!(self.log, "WinRM certificate thumbprint: {thumbprint}");
        let certificate = self.provider.certificate(service, &thumbprint)?;

        if self.store.contains(&thumbprint)? {
            log_verbose!(self.log, "Certificate {thumbprint} already trusted");
            return Ok(TrustOutcome {
                thumbprint,
                imported: false,
            });
        }

        log_info!(self.log, "Trusting WinRM certificate {thumbprint}");
        self.store.import(&certificate)?;
        Ok(TrustOutcome {
            thumbprint,
            imported: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers every script with the same stdout.
    struct Canned(&'static str);

    impl ScriptRunner for Canned {
        fn run(&self, _: &PsScript) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn cert() -> Certificate {
        Certificate {
            thumbprint: "AB12CD".into(),
            data: "MIIB".into(),
        }
    }

    #[test]
    fn import_script_targets_the_root_store() {
        let store = RootStore::new(Canned("null"), StoreLocation::LocalMachine);
        let ps = store.import_script(&cert());
        assert!(ps.contains("FromBase64String('MIIB')"));
        assert!(ps.contains("-ArgumentList 'Root', 'LocalMachine'"));

        let lookup = store.contains_script("AB12CD");
        assert!(lookup.contains("'Cert:\\LocalMachine\\Root\\' + 'AB12CD'"));
    }

    #[test]
    fn current_user_store_path() {
        let store = RootStore::new(Canned("null"), StoreLocation::CurrentUser);
        assert!(store.contains_script("AB12CD").contains("'Cert:\\CurrentUser\\Root\\'"));
        assert!(store.import_script(&cert()).contains("'Root', 'CurrentUser'"));
    }

    #[test]
    fn contains_parses_the_reply() {
        let yes = RootStore::new(
            Canned("WARNING: slow provider\r\ntrue\r\n"),
            StoreLocation::LocalMachine,
        );
        assert!(yes.contains("AB12CD").unwrap());
        let no = RootStore::new(Canned("false"), StoreLocation::LocalMachine);
        assert!(!no.contains("AB12CD").unwrap());

        let garbled = RootStore::new(Canned("Access denied"), StoreLocation::LocalMachine);
        assert!(matches!(
            garbled.contains("AB12CD").unwrap_err(),
            DeployError::Provider(_)
        ));
    }

    #[test]
    fn import_accepts_thumbprint_in_any_case() {
        let mut store = RootStore::new(Canned("\"ab12cd\""), StoreLocation::LocalMachine);
        store.import(&cert()).unwrap();
    }

    #[test]
    fn import_rejects_a_different_certificate() {
        let mut store = RootStore::new(Canned("\"FFFF00\""), StoreLocation::LocalMachine);
        let err = store.import(&cert()).unwrap_err();
        assert!(matches!(err, DeployError::Provider(_)));
        assert!(err.to_string().contains("FFFF00"));
        assert!(err.to_string().contains("AB12CD"));
    }
}
