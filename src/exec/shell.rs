// src/exec/shell.rs

//! Command-line construction for the two shell families we talk to.
//!
//! Every component that builds a command string receives a [`ShellDialect`]
//! from the machine config instead of consulting global state.

use crate::types::CommandSeparator;

/// How arguments are quoted for the target shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// `sh`-compatible single quoting.
    Posix,
    /// `cmd.exe` double quoting.
    Cmd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellDialect {
    pub separator: CommandSeparator,
    pub quoting: Quoting,
}

impl ShellDialect {
    pub fn for_target(guest: bool, host_is_windows: bool) -> Self {
        let separator = CommandSeparator::for_target(guest, host_is_windows);
        let quoting = match separator {
            CommandSeparator::Semicolon => Quoting::Posix,
            CommandSeparator::Ampersand => Quoting::Cmd,
        };
        Self { separator, quoting }
    }

    pub fn posix() -> Self {
        Self::for_target(true, false)
    }

    /// `cd <dir><sep> <command>`.
    pub fn in_dir(&self, dir: &str, command: &str) -> String {
        let cd = match self.quoting {
            Quoting::Posix => "cd",
            Quoting::Cmd => "cd /d",
        };
        format!("{cd} {}{} {command}", self.quote(dir), self.separator)
    }

    /// `<command> >> <path>`; stdout of the command is appended to `path`.
    pub fn append_stdout(&self, command: &str, path: &str) -> String {
        format!("{command} >> {}", self.quote(path))
    }

    /// Quote a single argument if it contains anything the shell would
    /// interpret.
    pub fn quote(&self, arg: &str) -> String {
        if !arg.is_empty() && arg.chars().all(is_plain) {
            return arg.to_string();
        }
        match self.quoting {
            Quoting::Posix => format!("'{}'", arg.replace('\'', r"'\''")),
            Quoting::Cmd => format!("\"{}\"", arg.replace('"', "\"\"")),
        }
    }
}

fn is_plain(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '\\' | ':' | '@' | '+' | '=' | ',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_dir_prefix() {
        let shell = ShellDialect::posix();
        assert_eq!(shell.in_dir("/home/dev/repo", "git branch"), "cd /home/dev/repo; git branch");
    }

    #[test]
    fn cmd_dir_prefix_switches_drive() {
        let shell = ShellDialect::for_target(false, true);
        assert_eq!(shell.in_dir(r"D:\src\repo", "git branch"), r"cd /d D:\src\repo& git branch");
    }

    #[test]
    fn quoting_only_when_needed() {
        let posix = ShellDialect::posix();
        assert_eq!(posix.quote("feature/x-1"), "feature/x-1");
        assert_eq!(posix.quote("a b"), "'a b'");
        assert_eq!(posix.quote("it's"), r"'it'\''s'");
        assert_eq!(posix.quote(""), "''");

        let cmd = ShellDialect::for_target(false, true);
        assert_eq!(cmd.quote("C:/logs/2024-01-01 10:00_x_output"), "\"C:/logs/2024-01-01 10:00_x_output\"");
    }

    #[test]
    fn append_quotes_log_path() {
        let shell = ShellDialect::posix();
        assert_eq!(
            shell.append_stdout("make", "/b/2024-01-01 10:00_vm_output"),
            "make >> '/b/2024-01-01 10:00_vm_output'"
        );
    }
}
