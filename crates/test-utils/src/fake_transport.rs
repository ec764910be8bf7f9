use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use buildrig::errors::{BuildrigError, Result};
use buildrig::exec::{CommandResult, CommandTransport, FetchedFile, TransportConnector};
use buildrig::config::MachineConfig;
use buildrig::fs::destination_in;
use buildrig::types::BoxFuture;

/// A fake transport that:
/// - simulates a git repository (`git branch`, `checkout`, `branch -D`, `pull`)
/// - treats every other command as a successful build, remembering any
///   `>> <log>` target as a file on the machine
/// - records every command line, fetched file and removed file
///
/// Rules added with [`FakeTransport::respond`] take precedence over the
/// simulation. Clones share state, so a test keeps one handle while the
/// orchestrator owns another. The repository outlives sessions: every
/// connection through [`FakeConnector`] reopens it, and `close` only ends
/// the current one.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    branches: Vec<String>,
    current: Option<String>,
    rules: Vec<(String, VecDeque<CommandResult>)>,
    commands: Vec<String>,
    files: Vec<String>,
    fetched: Vec<(String, PathBuf)>,
    removed: Vec<String>,
    fail_fetch: bool,
    closed: bool,
    sessions: usize,
}

impl FakeTransport {
    /// Repository with only `current` checked out.
    pub fn with_branch(current: &str) -> Self {
        let fake = Self::default();
        {
            let mut s = fake.lock();
            s.branches.push(current.to_string());
            s.current = Some(current.to_string());
        }
        fake
    }

    pub fn add_branch(&self, name: &str) -> &Self {
        self.lock().branches.push(name.to_string());
        self
    }

    /// Queue `result` for the next command line containing `pattern`. Once a
    /// rule's queue is empty the simulation handles the command again.
    pub fn respond(&self, pattern: &str, result: CommandResult) -> &Self {
        let mut s = self.lock();
        match s.rules.iter_mut().find(|(p, _)| p == pattern) {
            Some((_, queue)) => queue.push_back(result),
            None => s.rules.push((pattern.to_string(), VecDeque::from([result]))),
        }
        self
    }

    pub fn fail_fetch(&self) -> &Self {
        self.lock().fail_fetch = true;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    pub fn branches(&self) -> Vec<String> {
        self.lock().branches.clone()
    }

    pub fn current_branch(&self) -> Option<String> {
        self.lock().current.clone()
    }

    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.lock().fetched.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.lock().removed.clone()
    }

    /// Whether the most recent session was closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of sessions opened through a [`FakeConnector`].
    pub fn sessions(&self) -> usize {
        self.lock().sessions
    }

    fn open_session(&self) {
        let mut s = self.lock();
        s.closed = false;
        s.sessions += 1;
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

pub fn ok(stdout: &str) -> CommandResult {
    CommandResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        status: 0,
    }
}

pub fn failed(status: i32, stderr: &str) -> CommandResult {
    CommandResult {
        stdout: String::new(),
        stderr: stderr.to_string(),
        status,
    }
}

fn unquote(arg: &str) -> String {
    arg.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

impl FakeState {
    fn simulate(&mut self, command_line: &str) -> CommandResult {
        let Some(idx) = command_line.find("git ") else {
            return self.simulate_build(command_line);
        };
        let args: Vec<&str> = command_line[idx + 4..].split_whitespace().collect();

        match args.as_slice() {
            ["branch"] => {
                let listing: String = self
                    .branches
                    .iter()
                    .map(|b| {
                        let marker = if Some(b) == self.current.as_ref() { "*" } else { " " };
                        format!("{marker} {b}\n")
                    })
                    .collect();
                ok(&listing)
            }
            ["branch", "-D", name] => {
                let name = unquote(name);
                if Some(&name) == self.current.as_ref() {
                    return failed(1, &format!("error: Cannot delete branch '{name}' checked out"));
                }
                match self.branches.iter().position(|b| *b == name) {
                    Some(pos) => {
                        self.branches.remove(pos);
                        ok(&format!("Deleted branch {name}.\n"))
                    }
                    None => failed(1, &format!("error: branch '{name}' not found.")),
                }
            }
            ["branch", name] => {
                let name = unquote(name);
                if self.branches.contains(&name) {
                    return failed(128, &format!("fatal: a branch named '{name}' already exists"));
                }
                self.branches.push(name);
                ok("")
            }
            ["checkout", name] => {
                let name = unquote(name);
                if self.branches.contains(&name) {
                    self.current = Some(name.clone());
                    CommandResult {
                        stdout: String::new(),
                        stderr: format!("Switched to branch '{name}'\n"),
                        status: 0,
                    }
                } else {
                    failed(1, &format!("error: pathspec '{name}' did not match any file(s) known to git"))
                }
            }
            ["pull", "origin", _] => ok("Already up to date.\n"),
            _ => failed(1, "git: unsupported command in fake"),
        }
    }

    fn simulate_build(&mut self, command_line: &str) -> CommandResult {
        if let Some((_, target)) = command_line.rsplit_once(">> ") {
            self.files.push(unquote(target));
        }
        ok("")
    }
}

impl CommandTransport for FakeTransport {
    fn execute<'a>(&'a mut self, command_line: &'a str) -> BoxFuture<'a, Result<CommandResult>> {
        Box::pin(async move {
            let mut s = self.lock();
            assert!(!s.closed, "command issued after transport was closed: {command_line}");
            s.commands.push(command_line.to_string());

            let scripted = s
                .rules
                .iter_mut()
                .find(|(pattern, queue)| command_line.contains(pattern.as_str()) && !queue.is_empty())
                .and_then(|(_, queue)| queue.pop_front());

            Ok(match scripted {
                Some(result) => result,
                None => s.simulate(command_line),
            })
        })
    }

    fn fetch_file<'a>(&'a mut self, source: &'a str, dest_dir: &'a Path) -> BoxFuture<'a, Result<FetchedFile>> {
        Box::pin(async move {
            let mut s = self.lock();
            if s.fail_fetch || !s.files.iter().any(|f| f == source) {
                return Err(BuildrigError::Other(anyhow::anyhow!("no such file on target: {source}")));
            }
            let dest = destination_in(dest_dir, source)?;
            s.fetched.push((source.to_string(), dest.clone()));
            Ok(FetchedFile::copied(dest))
        })
    }

    fn remove_file<'a>(&'a mut self, path: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut s = self.lock();
            s.files.retain(|f| f != path);
            s.removed.push(path.to_string());
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.lock().closed = true;
            Ok(())
        })
    }
}

/// Connector that hands out clones of one [`FakeTransport`] and records the
/// address it was asked to connect to.
#[derive(Clone, Default)]
pub struct FakeConnector {
    transport: FakeTransport,
    addresses: Arc<Mutex<Vec<Option<std::net::Ipv4Addr>>>>,
    refuse: bool,
}

impl FakeConnector {
    pub fn new(transport: FakeTransport) -> Self {
        Self {
            transport,
            addresses: Arc::default(),
            refuse: false,
        }
    }

    /// Every connection attempt fails with a transport connection error.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn addresses(&self) -> Vec<Option<std::net::Ipv4Addr>> {
        self.addresses.lock().unwrap().clone()
    }
}

impl TransportConnector for FakeConnector {
    fn connect<'a>(
        &'a self,
        machine: &'a MachineConfig,
        address: Option<std::net::Ipv4Addr>,
    ) -> BoxFuture<'a, Result<Box<dyn CommandTransport>>> {
        Box::pin(async move {
            self.addresses.lock().unwrap().push(address);
            if self.refuse {
                return Err(BuildrigError::TransportConnectionError {
                    target: machine.name.clone(),
                    reason: "connection refused".to_string(),
                });
            }
            self.transport.open_session();
            Ok(Box::new(self.transport.clone()) as Box<dyn CommandTransport>)
        })
    }
}
