// SPDX-License-Identifier: MIT

use std::thread;
use std::time::{Duration, Instant};

use sqlvm_layout::{
    CreateDatabase, DeployConfig, DeployError, DeployResult, DiskPoolPlan, DriveLetter,
    FileSizing, Filesystem, Log, PhysicalDisk, Pool, PoolNaming, SqlDialect, TransactSql,
    log_info, log_ok, log_verbose, log_warn,
};

use crate::progress::spinner;
use crate::remote::{
    RemoteChannel, RemoteOperation, RemoteReply, RemoteRequest, VirtualDiskJob, VolumeStatus,
};

/// Bounded wait: poll every `interval` until `timeout` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Everything the guest-side procedure needs, fixed before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProcedure {
    pub plan: DiskPoolPlan,
    pub naming: PoolNaming,
    pub filesystem: Filesystem,
    pub allocation_unit_bytes: u64,
    pub database: String,
    pub sizing: FileSizing,
    pub firewall_rule: String,
    pub firewall_port: u16,
    pub settle: PollPolicy,
}

impl RemoteProcedure {
    pub fn from_config(config: &DeployConfig, plan: DiskPoolPlan) -> Self {
        Self {
            plan,
            naming: config.storage.naming(),
            filesystem: config.storage.filesystem,
            allocation_unit_bytes: config.storage.allocation_unit_bytes(),
            database: config.database.name.clone(),
            sizing: config.database.sizing(),
            firewall_rule: config.remote.firewall_rule.clone(),
            firewall_port: config.remote.firewall_port,
            settle: PollPolicy {
                timeout: config.remote.settle_timeout(),
                interval: config.remote.poll_interval(),
            },
        }
    }

    /// The DDL for volumes mounted at `drives`, in pool order.
    pub fn create_database(&self, drives: &[DriveLetter]) -> DeployResult<String> {
        let statement = CreateDatabase::striped(&self.database, drives, self.sizing)?;
        Ok(TransactSql.render_create_database(&statement))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureOutcome {
    pub pools: Vec<Pool>,
    pub drives: Vec<DriveLetter>,
    pub statement: String,
}

/// Runs the procedure step by step over one channel. Each request blocks
/// until the guest answers; the first failure ends the run.
pub struct RemoteExecutor<'a, C: RemoteChannel> {
    channel: &'a mut C,
    log: &'a Log,
}

impl<'a, C: RemoteChannel> RemoteExecutor<'a, C> {
    pub fn new(channel: &'a mut C, log: &'a Log) -> Self {
        Self { channel, log }
    }

    fn dispatch(&mut self, operation: RemoteOperation) -> DeployResult<RemoteReply> {
        let request = RemoteRequest::new(operation);
        log_verbose!(self.log, "{} [{}]", request.operation.name(), request.id);
        self.channel.invoke(&request)
    }

    pub fn run(&mut self, procedure: &RemoteProcedure) -> DeployResult<ProcedureOutcome> {
        let disks: Vec<PhysicalDisk> = self
            .dispatch(RemoteOperation::ListPoolableDisks)?
            .parse("list-poolable-disks")?;
        log_verbose!(self.log, "{} poolable disk(s) found", disks.len());
        let total = procedure.plan.total_disks() as usize;
        if disks.len() > total {
            log_warn!(self.log, "Ignoring {} extra poolable disk(s)", disks.len() - total);
        }

        let pools = procedure.plan.assign(&disks, &procedure.naming)?;
        for pool in &pools {
            log_verbose!(self.log, "{}: {}", pool.name, pool.disk_ids().join(", "));
        }

        log_info!(self.log, "Creating {} storage pool(s)", pools.len());
        self.dispatch(RemoteOperation::CreateStoragePools {
            pools: pools.clone(),
        })?;

        self.create_virtual_disks(&pools)?;

        let volumes: Vec<String> = pools.iter().map(|p| p.virtual_disk.clone()).collect();
        log_info!(
            self.log,
            "Formatting {} volume(s) as {}",
            volumes.len(),
            procedure.filesystem
        );
        self.dispatch(RemoteOperation::FormatVirtualDisks {
            volumes: volumes.clone(),
            filesystem: procedure.filesystem,
            allocation_unit_bytes: procedure.allocation_unit_bytes,
        })?;

        let drives = self.wait_for_volumes(&volumes, procedure.settle)?;
        log_ok!(
            self.log,
            "Volumes ready on {}",
            drives.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        );

        let statement = procedure.create_database(&drives)?;
        log_info!(self.log, "Creating database [{}]", procedure.database);
        log_verbose!(self.log, "\n{statement}");
        self.dispatch(RemoteOperation::ExecuteSql {
            statement: statement.clone(),
        })?;

        log_info!(
            self.log,
            "Opening TCP/{} in the guest firewall",
            procedure.firewall_port
        );
        self.dispatch(RemoteOperation::OpenFirewallPort {
            rule_name: procedure.firewall_rule.clone(),
            port: procedure.firewall_port,
        })?;

        Ok(ProcedureOutcome {
            pools,
            drives,
            statement,
        })
    }

    fn create_virtual_disks(&mut self, pools: &[Pool]) -> DeployResult<()> {
        log_info!(self.log, "Creating {} striped virtual disk(s)", pools.len());
        let jobs: Vec<VirtualDiskJob> = self
            .dispatch(RemoteOperation::CreateVirtualDisks {
                volumes: pools.iter().map(Pool::striped_volume).collect(),
            })?
            .parse("create-virtual-disks")?;

        if jobs.len() != pools.len() {
            return Err(DeployError::remote(format!(
                "{} virtual disk job(s) reported for {} pool(s)",
                jobs.len(),
                pools.len()
            )));
        }

        let failed: Vec<String> = jobs
            .iter()
            .filter(|job| !job.succeeded())
            .map(|job| match job.error.as_deref() {
                Some(e) if !e.trim().is_empty() => {
                    format!("{} ({}: {})", job.pool, job.state, e.trim())
                }
                _ => format!("{} ({})", job.pool, job.state),
            })
            .collect();
        if !failed.is_empty() {
            return Err(DeployError::remote(format!(
                "virtual disk creation failed for {}",
                failed.join(", ")
            )));
        }
        Ok(())
    }

    /// Polls until every volume has a reachable drive letter.
    pub fn wait_for_volumes(
        &mut self,
        volumes: &[String],
        policy: PollPolicy,
    ) -> DeployResult<Vec<DriveLetter>> {
        let pb = spinner(self.log, "Waiting for volumes to mount");
        let start = Instant::now();
        let result = loop {
            let status: Vec<VolumeStatus> = match self
                .dispatch(RemoteOperation::ListVolumes {
                    volumes: volumes.to_vec(),
                })
                .and_then(|reply| reply.parse("list-volumes"))
            {
                Ok(status) => status,
                Err(e) => break Err(e),
            };

            match settled(volumes, &status) {
                Ok(Some(drives)) => break Ok(drives),
                Ok(None) => {}
                Err(e) => break Err(e),
            }

            let waited = start.elapsed();
            if waited >= policy.timeout {
                break Err(DeployError::Timeout {
                    what: format!("drive letters on {} volume(s)", volumes.len()),
                    waited,
                });
            }
            thread::sleep(policy.interval.min(policy.timeout - waited));
        };
        pb.finish_and_clear();
        result
    }
}

/// Drive letters in `volumes` order, once all of them are ready.
fn settled(
    volumes: &[String],
    status: &[VolumeStatus],
) -> DeployResult<Option<Vec<DriveLetter>>> {
    let mut drives = Vec::with_capacity(volumes.len());
    for name in volumes {
        let Some(entry) = status.iter().find(|s| &s.virtual_disk == name) else {
            return Ok(None);
        };
        match entry.drive_letter.as_deref() {
            Some(letter) if entry.ready => {
                let drive = DriveLetter::try_from(letter).map_err(|_| {
                    DeployError::remote(format!("{name}: bad drive letter '{letter}'"))
                })?;
                drives.push(drive);
            }
            _ => return Ok(None),
        }
    }
    Ok(Some(drives))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, letter: Option<&str>, ready: bool) -> VolumeStatus {
        VolumeStatus {
            virtual_disk: name.into(),
            drive_letter: letter.map(str::to_string),
            ready,
        }
    }

    #[test]
    fn settled_keeps_pool_order() {
        let volumes = vec!["VDisk1".to_string(), "VDisk2".to_string()];
        let out = settled(
            &volumes,
            &[status("VDisk2", Some("G"), true), status("VDisk1", Some("F"), true)],
        )
        .unwrap()
        .unwrap();
        assert_eq!(out, vec![DriveLetter::new('F').unwrap(), DriveLetter::new('G').unwrap()]);
    }

    #[test]
    fn settled_waits_for_every_volume() {
        let volumes = vec!["VDisk1".to_string(), "VDisk2".to_string()];
        assert_eq!(settled(&volumes, &[status("VDisk1", Some("F"), true)]).unwrap(), None);
        assert_eq!(
            settled(
                &volumes,
                &[status("VDisk1", Some("F"), true), status("VDisk2", Some("G"), false)]
            )
            .unwrap(),
            None
        );
        assert_eq!(
            settled(
                &volumes,
                &[status("VDisk1", Some("F"), true), status("VDisk2", None, true)]
            )
            .unwrap(),
            None
        );
    }

    #[test]
    fn settled_rejects_garbage_letters() {
        let volumes = vec!["VDisk1".to_string()];
        let err = settled(&volumes, &[status("VDisk1", Some("12"), true)]).unwrap_err();
        assert!(matches!(err, DeployError::RemoteExecution(_)));
    }

    #[test]
    fn procedure_follows_config() {
        let config = DeployConfig::default();
        let plan = config.validate().unwrap();
        let procedure = RemoteProcedure::from_config(&config, plan);
        assert_eq!(procedure.allocation_unit_bytes, 65536);
        assert_eq!(procedure.firewall_port, 1433);
        assert_eq!(procedure.settle.timeout, Duration::from_secs(120));

        let ddl = procedure
            .create_database(&DriveLetter::sequence('F', 2).unwrap())
            .unwrap();
        assert!(ddl.starts_with("CREATE DATABASE [Testdata]"));
        assert!(ddl.contains("N'G:\\Testdatalog2.ldf'"));
    }
}
