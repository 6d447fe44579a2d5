//! TTY detection and color support logic

use std::io::IsTerminal;

/// Whether stdout output should be styled
///
/// `NO_COLOR` always wins, then `CLICOLOR_FORCE`, then `CLICOLOR=0`, and
/// finally whether stdout is a terminal.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    if let Ok(val) = std::env::var("CLICOLOR_FORCE") {
        if val != "0" {
            return true;
        }
    }

    if matches!(std::env::var("CLICOLOR").as_deref(), Ok("0")) {
        return false;
    }

    std::io::stdout().is_terminal()
}
