// SPDX-License-Identifier: MIT

use sqlvm_layout::Filesystem;

use super::RemoteOperation;
use crate::macros::ToLine;
use crate::script::PsValue;

pub trait FormatCommandBuilder {
    /// `Format-Volume` invocation; `label` and `unit` are script expressions.
    fn build_format_command(&self, label: &str, unit: &str) -> Vec<String>;
}

impl FormatCommandBuilder for Filesystem {
    fn build_format_command(&self, label: &str, unit: &str) -> Vec<String> {
        crate::args![
            "Format-Volume",
            "-FileSystem",
            self,
            "-NewFileSystemLabel",
            label,
            "-AllocationUnitSize",
            unit,
            "-Confirm:$false",
            "-Force"
        ]
    }
}

impl RemoteOperation {
    /// Positional parameters, in `param(...)` order.
    pub(crate) fn parameters(&self) -> Vec<(&'static str, PsValue)> {
        match self {
            RemoteOperation::ListPoolableDisks => vec![],
            RemoteOperation::CreateStoragePools { pools } => vec![
                ("poolNames", PsValue::strings(pools.iter().map(|p| &p.name))),
                (
                    "poolDisks",
                    PsValue::List(pools.iter().map(|p| PsValue::strings(p.disk_ids())).collect()),
                ),
            ],
            RemoteOperation::CreateVirtualDisks { volumes } => vec![
                ("poolNames", PsValue::strings(volumes.iter().map(|v| &v.pool))),
                ("diskNames", PsValue::strings(volumes.iter().map(|v| &v.name))),
                (
                    "columns",
                    PsValue::List(volumes.iter().map(|v| v.columns.into()).collect()),
                ),
                (
                    "copies",
                    PsValue::List(volumes.iter().map(|v| v.data_copies.into()).collect()),
                ),
            ],
            RemoteOperation::FormatVirtualDisks {
                volumes,
                allocation_unit_bytes,
                ..
            } => vec![
                ("diskNames", PsValue::strings(volumes)),
                ("allocationUnit", (*allocation_unit_bytes).into()),
            ],
            RemoteOperation::ListVolumes { volumes } => {
                vec![("diskNames", PsValue::strings(volumes))]
            }
            RemoteOperation::ExecuteSql { statement } => {
                vec![("statement", statement.as_str().into())]
            }
            RemoteOperation::OpenFirewallPort { rule_name, port } => vec![
                ("ruleName", rule_name.as_str().into()),
                ("port", (*port).into()),
            ],
        }
    }

    /// Script block body. The last line writes the JSON reply.
    pub(crate) fn body(&self) -> Vec<String> {
        let mut lines: Vec<String> = vec![];
        let mut add = |l: &str| lines.push(l.to_string());

        match self {
            RemoteOperation::ListPoolableDisks => {
                add("$disks = @(Get-PhysicalDisk -CanPool $true | ForEach-Object {");
                add("    [pscustomobject]@{ UniqueId = \"$($_.UniqueId)\"; FriendlyName = \"$($_.FriendlyName)\"; Size = [uint64]$_.Size }");
                add("})");
                add("ConvertTo-Json -Compress -Depth 4 -InputObject $disks");
            }
            RemoteOperation::CreateStoragePools { .. } => {
                add("$subsystem = Get-StorageSubSystem | Where-Object { $_.FriendlyName -like '*Storage Spaces*' -or $_.FriendlyName -like 'Windows Storage*' } | Select-Object -First 1");
                add("if ($null -eq $subsystem) { throw 'no Storage Spaces subsystem found' }");
                add("for ($i = 0; $i -lt $poolNames.Count; $i++) {");
                add("    $ids = @($poolDisks[$i])");
                // Disks were assigned from the listing; look them up by id only.
                add("    $members = @($ids | ForEach-Object { Get-PhysicalDisk -UniqueId $_ })");
                add("    New-StoragePool -FriendlyName $poolNames[$i] -StorageSubSystemUniqueId $subsystem.UniqueId -PhysicalDisks $members | Out-Null");
                add("}");
                add("'null'");
            }
            RemoteOperation::CreateVirtualDisks { .. } => {
                // Fire every job first, then wait for all of them.
                add("$jobs = @()");
                add("for ($i = 0; $i -lt $poolNames.Count; $i++) {");
                add("    $jobs += New-VirtualDisk -StoragePoolFriendlyName $poolNames[$i] -FriendlyName $diskNames[$i] -ResiliencySettingName Simple -NumberOfDataCopies $copies[$i] -NumberOfColumns $columns[$i] -UseMaximumSize -AsJob");
                add("}");
                add("$null = Wait-Job -Job $jobs");
                add("$report = @()");
                add("for ($i = 0; $i -lt $jobs.Count; $i++) {");
                add("    $job = $jobs[$i]");
                add("    $reasons = @($job.ChildJobs | ForEach-Object { $_.JobStateInfo.Reason; $_.Error } | Where-Object { $_ } | ForEach-Object { \"$_\" })");
                add("    $report += [pscustomobject]@{ Pool = $poolNames[$i]; VirtualDisk = $diskNames[$i]; State = \"$($job.State)\"; Error = ($reasons -join '; ') }");
                add("}");
                add("$jobs | Remove-Job -Force");
                add("ConvertTo-Json -Compress -Depth 4 -InputObject $report");
            }
            RemoteOperation::FormatVirtualDisks { filesystem, .. } => {
                let format = filesystem
                    .build_format_command("$name", "$allocationUnit")
                    .to_line();
                add("foreach ($name in $diskNames) {");
                add("    Get-VirtualDisk -FriendlyName $name | Get-Disk |");
                add("        Initialize-Disk -PartitionStyle GPT -PassThru |");
                add("        New-Partition -AssignDriveLetter -UseMaximumSize |");
                add(&format!("        {format} | Out-Null"));
                add("}");
                add("'null'");
            }
            RemoteOperation::ListVolumes { .. } => {
                add("$status = @(foreach ($name in $diskNames) {");
                add("    $letter = Get-VirtualDisk -FriendlyName $name | Get-Disk | Get-Partition | Where-Object { \"$($_.DriveLetter)\" -match '^[A-Za-z]$' } | Select-Object -First 1 -ExpandProperty DriveLetter");
                add("    $drive = $null; $ready = $false");
                add("    if ($letter) { $drive = \"$letter\"; $ready = Test-Path -LiteralPath \"$($letter):\\\" }");
                add("    [pscustomobject]@{ VirtualDisk = $name; DriveLetter = $drive; Ready = $ready }");
                add("})");
                add("ConvertTo-Json -Compress -Depth 4 -InputObject $status");
            }
            RemoteOperation::ExecuteSql { .. } => {
                add("Import-Module sqlps -DisableNameChecking -ErrorAction SilentlyContinue | Out-Null");
                add("Invoke-Sqlcmd -ServerInstance '.' -Query $statement -QueryTimeout 600 -ErrorAction Stop | Out-Null");
                add("'null'");
            }
            RemoteOperation::OpenFirewallPort { .. } => {
                add("New-NetFirewallRule -DisplayName $ruleName -Direction Inbound -Protocol TCP -LocalPort $port -Action Allow | Out-Null");
                add("'null'");
            }
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlvm_layout::{DiskPoolPlan, PhysicalDisk, PoolNaming};

    fn pools() -> Vec<sqlvm_layout::Pool> {
        let disks: Vec<_> = (0..4)
            .map(|i| PhysicalDisk {
                unique_id: format!("{{uid-{i}}}"),
                friendly_name: format!("PhysicalDisk{i}"),
                size_bytes: 10 << 30,
            })
            .collect();
        DiskPoolPlan::new(4, 2, 2)
            .unwrap()
            .assign(&disks, &PoolNaming::default())
            .unwrap()
    }

    #[test]
    fn pools_carry_their_disk_slices() {
        let op = RemoteOperation::CreateStoragePools { pools: pools() };
        let params = op.parameters();
        assert_eq!(params[0].0, "poolNames");
        assert_eq!(params[0].1.render(), "@('Pool1', 'Pool2')");
        assert_eq!(
            params[1].1.render(),
            "@(@('{uid-0}', '{uid-1}'), @('{uid-2}', '{uid-3}'))"
        );
    }

    #[test]
    fn pool_members_are_looked_up_by_id() {
        let body = RemoteOperation::CreateStoragePools { pools: pools() }
            .body()
            .join("\n");
        assert!(body.contains("Get-PhysicalDisk -UniqueId $_"));
        assert!(!body.contains("-CanPool"));
        assert!(body.contains("-PhysicalDisks $members"));
    }

    #[test]
    fn virtual_disks_are_fired_then_awaited() {
        let volumes = pools().iter().map(|p| p.striped_volume()).collect();
        let op = RemoteOperation::CreateVirtualDisks { volumes };
        let body = op.body();

        let fire = body.iter().position(|l| l.contains("-AsJob")).unwrap();
        let wait = body.iter().position(|l| l.contains("Wait-Job")).unwrap();
        let release = body.iter().position(|l| l.contains("Remove-Job")).unwrap();
        assert!(fire < wait && wait < release);
        assert!(body[fire].contains("-ResiliencySettingName Simple"));
        assert!(body[fire].contains("-UseMaximumSize"));

        let params = op.parameters();
        assert_eq!(params[2].1.render(), "@(2, 2)");
        assert_eq!(params[3].1.render(), "@(1, 1)");
    }

    #[test]
    fn format_uses_the_configured_filesystem() {
        let op = RemoteOperation::FormatVirtualDisks {
            volumes: vec!["VDisk1".into()],
            filesystem: Filesystem::Ntfs,
            allocation_unit_bytes: 65536,
        };
        let body = op.body().join("\n");
        assert!(body.contains(
            "Format-Volume -FileSystem NTFS -NewFileSystemLabel $name -AllocationUnitSize $allocationUnit -Confirm:$false -Force"
        ));
        assert!(body.contains("New-Partition -AssignDriveLetter -UseMaximumSize"));
        assert_eq!(op.parameters()[1].1.render(), "65536");
    }

    #[test]
    fn firewall_rule_parameters() {
        let op = RemoteOperation::OpenFirewallPort {
            rule_name: "SQL Server".into(),
            port: 1433,
        };
        let params: Vec<_> = op.parameters().into_iter().map(|(_, v)| v.render()).collect();
        assert_eq!(params, vec!["'SQL Server'", "1433"]);
        assert!(op.body()[0].contains("-Direction Inbound -Protocol TCP"));
    }

    #[test]
    fn every_body_ends_with_a_reply() {
        let ops = [
            RemoteOperation::ListPoolableDisks,
            RemoteOperation::CreateStoragePools { pools: pools() },
            RemoteOperation::ListVolumes {
                volumes: vec!["VDisk1".into()],
            },
            RemoteOperation::ExecuteSql {
                statement: "SELECT 1".into(),
            },
        ];
        for op in ops {
            let body = op.body();
            let last = body.last().unwrap();
            assert!(
                last.starts_with("ConvertTo-Json") || last == "'null'",
                "{} ends with {last}",
                op.name()
            );
        }
    }
}
