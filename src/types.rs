use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed, `Send` future returned by the pluggable traits (transport,
/// hypervisor, connector) so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Token placed between the directory change and the actual command.
///
/// - `Semicolon`: POSIX shells on guests (and on Unix hosts).
/// - `Ampersand`: `cmd.exe` on Windows hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSeparator {
    Semicolon,
    Ampersand,
}

impl CommandSeparator {
    /// Separator for a machine, derived only from its guest flag and the
    /// shell family of the host running the local variant.
    pub fn for_target(guest: bool, host_is_windows: bool) -> Self {
        if guest || !host_is_windows {
            CommandSeparator::Semicolon
        } else {
            CommandSeparator::Ampersand
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandSeparator::Semicolon => ";",
            CommandSeparator::Ampersand => "&",
        }
    }
}

impl fmt::Display for CommandSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guests_always_use_semicolon() {
        assert_eq!(CommandSeparator::for_target(true, true), CommandSeparator::Semicolon);
        assert_eq!(CommandSeparator::for_target(true, false), CommandSeparator::Semicolon);
    }

    #[test]
    fn local_windows_hosts_use_ampersand() {
        assert_eq!(CommandSeparator::for_target(false, true), CommandSeparator::Ampersand);
        assert_eq!(CommandSeparator::for_target(false, false), CommandSeparator::Semicolon);
        assert_eq!(CommandSeparator::Ampersand.to_string(), "&");
    }
}
