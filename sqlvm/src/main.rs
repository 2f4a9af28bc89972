// SPDX-License-Identifier: MIT

mod utils;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlvm_layout::*;
use sqlvm_scripts::*;
use std::path::PathBuf;

use crate::utils::prompt;

#[derive(Parser)]
#[command(name = "sqlvm", version, about = "SQL Server VM deployer with striped data volumes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the VM, stripe its data disks and create the database
    Deploy {
        #[command(flatten)]
        target: Target,

        /// Read the admin password from this environment variable instead of prompting
        #[arg(long, value_name = "VAR")]
        password_env: Option<String>,

        /// Trust the VM certificate for the current user only (no elevation needed)
        #[arg(long)]
        user_trust_store: bool,

        #[command(flatten)]
        verbosity: Verbosity,
    },
    /// Validate the settings and print everything a deployment would run
    Plan {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        verbosity: Verbosity,
    },
}

#[derive(Args)]
struct Target {
    /// Deployment settings (TOML); every field has a default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cloud service hosting the VM
    #[arg(long)]
    service_name: Option<String>,

    /// Region used when the cloud service has to be created
    #[arg(long)]
    location: Option<String>,

    /// VM host name
    #[arg(long)]
    computer_name: Option<String>,

    /// ExtraSmall, Small, Medium, Large, ExtraLarge, A5, A6 or A7
    #[arg(long)]
    instance_size: Option<VmSize>,

    #[arg(long)]
    admin_user: Option<String>,
}

impl Target {
    fn load(self) -> anyhow::Result<DeployConfig> {
        let mut config = match &self.config {
            Some(path) => DeployConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => DeployConfig::default(),
        };
        if let Some(name) = self.service_name {
            config.service.name = name;
        }
        if let Some(location) = self.location {
            config.service.location = location;
        }
        if let Some(name) = self.computer_name {
            config.vm.computer_name = name;
        }
        if let Some(size) = self.instance_size {
            config.vm.instance_size = size;
        }
        if let Some(user) = self.admin_user {
            config.vm.admin_user = user;
        }
        Ok(config)
    }
}

#[derive(Args)]
struct Verbosity {
    /// Log every remote request and print generated scripts
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

impl Verbosity {
    fn log(&self) -> Log {
        match (self.verbose, self.quiet) {
            (true, _) => Log::new(LogLevel::Verbose),
            (_, true) => Log::new(LogLevel::Quiet),
            _ => Log::new(LogLevel::Normal),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy {
            target,
            password_env,
            user_trust_store,
            verbosity,
        } => {
            let log = verbosity.log();
            let config = target.load()?;
            config.validate()?;
            if !log.is_quiet() {
                config.print_summary();
            }

            let password = match password_env {
                Some(var) => std::env::var(&var)
                    .with_context(|| format!("environment variable {var} is not set"))?,
                None => prompt::ask_password(&config.vm.admin_user)?,
            };
            let credential = Credential::new(config.vm.admin_user.clone(), password);

            let powershell = PowerShell::locate(&log)?;
            let azure = AzureServiceManagement::new(&powershell, &log);
            let location = if user_trust_store {
                StoreLocation::CurrentUser
            } else {
                StoreLocation::LocalMachine
            };
            let mut store = RootStore::new(&powershell, location);
            let connector = WinRmConnector::new(&powershell, &log);

            let report = Deployment::new(&azure, &mut store, &connector, &log)
                .run(&config, &credential)
                .map_err(|e| anyhow::anyhow!("deployment stopped ({} failure): {e}", e.kind()))?;

            log_normal!(log, "Endpoint: {}", report.endpoint);
            log_normal!(
                log,
                "Database [{}] on {} ({} pool(s), trust {})",
                config.database.name,
                report
                    .procedure
                    .drives
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                report.procedure.pools.len(),
                if report.trust.imported { "imported" } else { "already present" }
            );
        }
        Commands::Plan { target, verbosity } => {
            let log = verbosity.log();
            let config = target.load()?;
            let preview = preview(&config)?;
            config.print_summary();
            log_info!(log, "Dry run mode: nothing will be created.");
            println!("\n{}\n", preview.statement);
            if !log.is_quiet() {
                for script in &preview.scripts {
                    script.dry_mode();
                }
            }
        }
    }

    Ok(())
}
