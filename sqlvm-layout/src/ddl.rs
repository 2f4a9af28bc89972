// SPDX-License-Identifier: MIT

//! Structured `CREATE DATABASE` statements spread over striped volumes.
//!
//! The statement is assembled as plain data ([`CreateDatabase`]) and only
//! turned into text by a [`SqlDialect`], so layouts can be checked without a
//! database engine.

use crate::error::{DeployError, DeployResult};
use crate::plan::DriveLetter;

/// Size policy shared by every generated file, in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSizing {
    pub size_mb: u32,
    pub max_size_mb: u32,
    pub growth_mb: u32,
}

impl Default for FileSizing {
    fn default() -> Self {
        Self {
            size_mb: 100,
            max_size_mb: 200,
            growth_mb: 20,
        }
    }
}

impl FileSizing {
    pub fn validate(&self) -> DeployResult<()> {
        if self.size_mb == 0 {
            return Err(DeployError::config("database file size must be at least 1 MB"));
        }
        if self.max_size_mb < self.size_mb {
            return Err(DeployError::config(format!(
                "max size ({} MB) is below the initial size ({} MB)",
                self.max_size_mb, self.size_mb
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// First data file of the PRIMARY file group (`.mdf`).
    PrimaryData,
    /// Additional data file (`.ndf`).
    SecondaryData,
    /// Transaction log file (`.ldf`).
    Log,
}

impl FileRole {
    pub fn extension(&self) -> &'static str {
        match self {
            FileRole::PrimaryData => "mdf",
            FileRole::SecondaryData => "ndf",
            FileRole::Log => "ldf",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseFileSpec {
    pub name: String,
    pub path: String,
    pub role: FileRole,
    pub size_mb: u32,
    pub max_size_mb: u32,
    pub growth_mb: u32,
}

impl DatabaseFileSpec {
    pub fn on_volume(name: String, drive: DriveLetter, role: FileRole, sizing: FileSizing) -> Self {
        let path = format!("{}{name}.{}", drive.root(), role.extension());
        Self {
            name,
            path,
            role,
            size_mb: sizing.size_mb,
            max_size_mb: sizing.max_size_mb,
            growth_mb: sizing.growth_mb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDatabase {
    pub database: String,
    pub primary: Vec<DatabaseFileSpec>,
    pub log: Vec<DatabaseFileSpec>,
}

impl CreateDatabase {
    /// One data file and one log file per volume, in volume order.
    ///
    /// The first volume carries `<db>1.mdf` and `<db>log1.ldf`; every further
    /// volume `i` (2, 3, ...) carries `<db>{i}.ndf` and `<db>log{i}.ldf`.
    pub fn striped(
        database: &str,
        drives: &[DriveLetter],
        sizing: FileSizing,
    ) -> DeployResult<Self> {
        let (first, rest) = drives
            .split_first()
            .ok_or_else(|| DeployError::config("at least one volume is needed for the database"))?;
        if database.trim().is_empty() {
            return Err(DeployError::config("database name is empty"));
        }
        sizing.validate()?;

        let mut primary = vec![DatabaseFileSpec::on_volume(
            format!("{database}1"),
            *first,
            FileRole::PrimaryData,
            sizing,
        )];
        for (i, drive) in (2..).zip(rest) {
            primary.push(DatabaseFileSpec::on_volume(
                format!("{database}{i}"),
                *drive,
                FileRole::SecondaryData,
                sizing,
            ));
        }

        let mut log = vec![DatabaseFileSpec::on_volume(
            format!("{database}log1"),
            *first,
            FileRole::Log,
            sizing,
        )];
        for (i, drive) in (2..).zip(rest) {
            log.push(DatabaseFileSpec::on_volume(
                format!("{database}log{i}"),
                *drive,
                FileRole::Log,
                sizing,
            ));
        }

        Ok(Self {
            database: database.to_string(),
            primary,
            log,
        })
    }
}

/// Renders a statement in one engine's syntax.
pub trait SqlDialect {
    fn render_create_database(&self, stmt: &CreateDatabase) -> String;
}

/// SQL Server's Transact-SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactSql;

impl TransactSql {
    pub fn quote_ident(ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    pub fn quote_literal(value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }

    fn file_clause(spec: &DatabaseFileSpec) -> String {
        format!(
            "    (NAME = {}, FILENAME = {}, SIZE = {}MB, MAXSIZE = {}MB, FILEGROWTH = {}MB)",
            Self::quote_literal(&spec.name),
            Self::quote_literal(&spec.path),
            spec.size_mb,
            spec.max_size_mb,
            spec.growth_mb
        )
    }

    fn file_list(specs: &[DatabaseFileSpec]) -> String {
        specs
            .iter()
            .map(Self::file_clause)
            .collect::<Vec<_>>()
            .join(",\n")
    }
}

impl SqlDialect for TransactSql {
    fn render_create_database(&self, stmt: &CreateDatabase) -> String {
        format!(
            "CREATE DATABASE {}\nON PRIMARY\n{}\nLOG ON\n{};",
            Self::quote_ident(&stmt.database),
            Self::file_list(&stmt.primary),
            Self::file_list(&stmt.log)
        )
    }
}
