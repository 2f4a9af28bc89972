// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{fs::File, io::Write};

use sqlvm_layout::{Log, log_verbose};

/// A PowerShell script assembled line by line.
///
/// Secrets never appear in the text: they are handed to the process as
/// environment variables and read back with `$env:NAME`.
pub struct PsScript {
    name: String,
    lines: Vec<String>,
    env: Vec<(String, String)>,
}

impl PsScript {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            lines: vec![
                "$ErrorActionPreference = 'Stop'".into(),
                "$ProgressPreference = 'SilentlyContinue'".into(),
            ],
            env: vec![],
        }
    }

    pub fn add<S: Into<String>>(&mut self, line: S) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn env_vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn content(&self) -> String {
        self.lines.join("\n")
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn dry_mode(&self) {
        println!(
            "==[Powershell Script: {}]==\n{}\n=====================",
            self.name,
            self.content()
        );
    }
}

impl fmt::Debug for PsScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PsScript")
            .field("name", &self.name)
            .field("lines", &self.lines.len())
            .field("env", &self.env.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}

/// Runs a script and hands back what it wrote to stdout.
pub trait ScriptRunner {
    fn run(&self, script: &PsScript) -> anyhow::Result<String>;
}

impl<R: ScriptRunner + ?Sized> ScriptRunner for &R {
    fn run(&self, script: &PsScript) -> anyhow::Result<String> {
        (**self).run(script)
    }
}

/// Runs scripts with the local Windows PowerShell (or `pwsh`).
pub struct PowerShell {
    binary: PathBuf,
    log: Log,
}

impl PowerShell {
    pub const CANDIDATES: [&'static str; 2] = ["powershell", "pwsh"];

    pub fn locate(log: &Log) -> anyhow::Result<Self> {
        let binary = Self::CANDIDATES
            .iter()
            .find_map(|b| which::which(b).ok())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Missing dependency: `powershell` is not installed or not in PATH."
                )
            })?;
        log_verbose!(log, "Using PowerShell at {}", binary.display());
        Ok(Self {
            binary,
            log: log.clone(),
        })
    }

    fn write_script(&self, script: &PsScript, temp_dir: &Path) -> anyhow::Result<PathBuf> {
        let script_path = temp_dir.join(format!("{}.ps1", script.name()));
        let mut file = File::create(&script_path)?;
        file.write_all(script.content().as_bytes())?;
        file.sync_all()?;
        drop(file);
        Ok(script_path.canonicalize()?)
    }
}

impl ScriptRunner for PowerShell {
    fn run(&self, script: &PsScript) -> anyhow::Result<String> {
        let temp_root = tempfile::tempdir()?;
        let script_path = self.write_script(script, temp_root.path())?;

        if self.log.is_verbose() {
            script.dry_mode();
        }

        let output = Command::new(&self.binary)
            .args(crate::args![
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-File"
            ])
            .arg(&script_path)
            .envs(script.env_vars())
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Powershell script '{}' failed with exit code {:?}: {}",
                script.name(),
                output.status.code(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Quotes a value as a PowerShell single-quoted literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Positional argument of a remote script block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsValue {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<PsValue>),
}

impl PsValue {
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        PsValue::List(
            items
                .into_iter()
                .map(|s| PsValue::Str(s.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn render(&self) -> String {
        match self {
            PsValue::Str(s) => quote(s),
            PsValue::Int(n) => n.to_string(),
            PsValue::Bool(true) => "$true".into(),
            PsValue::Bool(false) => "$false".into(),
            // A lone element needs the unary comma or PowerShell unrolls it.
            PsValue::List(items) if items.len() == 1 => format!("@(,{})", items[0].render()),
            PsValue::List(items) => format!(
                "@({})",
                items
                    .iter()
                    .map(PsValue::render)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<&str> for PsValue {
    fn from(value: &str) -> Self {
        PsValue::Str(value.to_string())
    }
}

impl From<String> for PsValue {
    fn from(value: String) -> Self {
        PsValue::Str(value)
    }
}

impl From<u64> for PsValue {
    fn from(value: u64) -> Self {
        PsValue::Int(value as i64)
    }
}

impl From<u32> for PsValue {
    fn from(value: u32) -> Self {
        PsValue::Int(i64::from(value))
    }
}

impl From<u16> for PsValue {
    fn from(value: u16) -> Self {
        PsValue::Int(i64::from(value))
    }
}

/// Scripts end with `ConvertTo-Json -Compress`, so the payload is the last
/// non-empty line of stdout; anything before it is host chatter.
pub fn parse_json<T: DeserializeOwned>(stdout: &str) -> anyhow::Result<T> {
    let payload = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| anyhow::anyhow!("script produced no output"))?;
    serde_json::from_str(payload)
        .map_err(|e| anyhow::anyhow!("unexpected script output '{payload}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_stop_on_first_error() {
        let mut ps = PsScript::new("clock");
        ps.add("Get-Date");
        assert_eq!(ps.lines()[0], "$ErrorActionPreference = 'Stop'");
        assert!(ps.content().ends_with("Get-Date"));
    }

    #[test]
    fn secrets_stay_out_of_text_and_debug() {
        let mut ps = PsScript::new("secret");
        ps.env("SQLVM_ADMIN_PASSWORD", "hunter2");
        ps.add("$p = $env:SQLVM_ADMIN_PASSWORD");
        assert!(!ps.content().contains("hunter2"));
        assert!(!format!("{ps:?}").contains("hunter2"));
        assert_eq!(
            ps.env_vars().collect::<Vec<_>>(),
            vec![("SQLVM_ADMIN_PASSWORD", "hunter2")]
        );
    }

    #[test]
    fn quotes_single_quotes() {
        assert_eq!(quote("West US"), "'West US'");
        assert_eq!(quote("it's"), "'it''s'");
    }

    #[test]
    fn renders_values() {
        assert_eq!(PsValue::from(4u32).render(), "4");
        assert_eq!(PsValue::Bool(true).render(), "$true");
        assert_eq!(PsValue::strings(["a"]).render(), "@(,'a')");
        assert_eq!(PsValue::List(vec![]).render(), "@()");
        let nested = PsValue::List(vec![PsValue::strings(["a", "b"]), PsValue::strings(["c"])]);
        assert_eq!(nested.render(), "@(@('a', 'b'), @(,'c'))");
        let single = PsValue::List(vec![PsValue::strings(["a", "b"])]);
        assert_eq!(single.render(), "@(,@('a', 'b'))");
    }

    #[test]
    fn parses_last_line() {
        let out = "WARNING: module loaded\r\n[1,2]\r\n\r\n";
        let parsed: Vec<u32> = parse_json(out).unwrap();
        assert_eq!(parsed, vec![1, 2]);
        assert!(parse_json::<bool>("").is_err());
        assert!(parse_json::<bool>("not json").is_err());
    }
}
