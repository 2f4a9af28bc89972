// SPDX-License-Identifier: MIT

pub mod config;
pub mod ddl;
pub mod error;
pub mod filesystem;
pub mod log;
pub mod plan;
pub mod size;

pub use config::*;
pub use ddl::*;
pub use error::*;
pub use filesystem::*;
pub use log::*;
pub use plan::*;
pub use size::*;
