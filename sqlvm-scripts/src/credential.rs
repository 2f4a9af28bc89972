// SPDX-License-Identifier: MIT

use std::fmt;

/// Environment variable scripts read the admin password from.
pub const PASSWORD_ENV: &str = "SQLVM_ADMIN_PASSWORD";

/// Administrator account set at provisioning and reused for remoting.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user: String,
    password: String,
}

impl Credential {
    pub fn new<U: Into<String>, P: Into<String>>(user: U, password: P) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Platform rule: 8 to 123 characters drawn from at least three of
    /// lower case, upper case, digits and symbols.
    pub fn check_complexity(&self) -> anyhow::Result<()> {
        let len = self.password.chars().count();
        if !(8..=123).contains(&len) {
            anyhow::bail!("password must be 8 to 123 characters long (got {len})");
        }
        let p = &self.password;
        let classes = [
            p.chars().any(|c| c.is_lowercase()),
            p.chars().any(|c| c.is_uppercase()),
            p.chars().any(|c| c.is_ascii_digit()),
            p.chars().any(|c| !c.is_alphanumeric()),
        ];
        if classes.iter().filter(|b| **b).count() < 3 {
            anyhow::bail!(
                "password needs three of: lower case, upper case, digits, symbols"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}
