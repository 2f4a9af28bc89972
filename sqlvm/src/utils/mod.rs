// SPDX-License-Identifier: MIT

pub mod prompt;
