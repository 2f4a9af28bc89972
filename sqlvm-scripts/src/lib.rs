// SPDX-License-Identifier: MIT

#[macro_use]
pub mod macros;

pub mod azure;
pub mod credential;
pub mod deploy;
pub mod executor;
pub mod progress;
pub mod provider;
pub mod remote;
pub mod script;
pub mod trust;

pub use azure::*;
pub use credential::*;
pub use deploy::*;
pub use executor::*;
pub use provider::*;
pub use remote::*;
pub use script::*;
pub use trust::*;
