//! Terminal output helpers shared by the subcommands.

use anyhow::Result;
use serde::Serialize;

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One `[OK]` / `[!!]` status line.
pub fn check_line(ok: bool, message: impl std::fmt::Display) {
    let mark = if ok { "[OK]" } else { "[!!]" };
    println!("{mark} {message}");
}

pub fn heading(title: &str) {
    println!("{title}");
    println!("{}", "=".repeat(title.chars().count()));
    println!();
}
