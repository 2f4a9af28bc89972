// SPDX-License-Identifier: MIT

use anyhow::Context;
use std::io::{BufRead, IsTerminal, Write};

fn prompt_text(user: &str) -> String {
    format!("Password for '{user}': ")
}

fn entered(line: &str) -> anyhow::Result<String> {
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password.to_string())
}

/// Asks for the admin password with echo turned off when stdin is a
/// terminal, otherwise reads one line from the pipe.
pub fn ask_password(user: &str) -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        let line = rpassword::prompt_password(prompt_text(user))
            .context("failed to read the password")?;
        entered(&line)
    } else {
        read_password(user, &mut std::io::stdin().lock(), &mut std::io::stderr())
    }
}

/// Asks for the admin password on `out` and reads one line from `input`.
pub fn read_password<R: BufRead, W: Write>(
    user: &str,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<String> {
    write!(out, "{}", prompt_text(user))?;
    out.flush()?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read the password")?;
    if read == 0 {
        anyhow::bail!("no password given (stdin closed)");
    }
    entered(&line)
}
