//! Interactive prompts for first-time configuration

use crate::config::Config;
use std::io::{self, BufRead, Write};

/// Source of answers for the configuration questions
pub trait Prompter {
    /// Ask a single question; `hidden` answers must not be echoed
    fn ask(&self, label: &str, hidden: bool) -> io::Result<String>;
}

/// Prompts on the controlling terminal
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, label: &str, hidden: bool) -> io::Result<String> {
        if hidden {
            return rpassword::prompt_password(format!("{} ", label));
        }

        let mut stdout = io::stdout();
        write!(stdout, "{} ", label)?;
        stdout.flush()?;

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed before an answer was given",
            ));
        }
        Ok(answer)
    }
}

/// Ask until a non-empty (after trimming) answer is given
fn ask_required(prompter: &dyn Prompter, label: &str, hidden: bool) -> io::Result<String> {
    loop {
        let answer = prompter.ask(label, hidden)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        tracing::warn!("A value is required");
    }
}

/// Collect the three configuration fields
pub fn collect_config(prompter: &dyn Prompter) -> io::Result<Config> {
    let connection_name = ask_required(prompter, "VPN connection name:", false)?;
    let secret_base32 = ask_required(prompter, "Secret (base32):", true)?;
    let password_static_part = ask_required(prompter, "Password static part:", true)?;

    Ok(Config::new(
        connection_name,
        secret_base32,
        password_static_part,
    ))
}
