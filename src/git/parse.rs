// src/git/parse.rs

//! Pure parsing of git output. Kept free of IO so every rule here can be
//! tested on its own.

use std::sync::LazyLock;

use regex::Regex;

/// Fragment git/ssh print when the remote's host key no longer matches.
pub const HOST_KEY_CHANGED_MARKER: &str = "REMOTE HOST IDENTIFICATION HAS CHANGED";

/// Fragment git prints when a pull would clobber uncommitted work.
pub const UNCOMMITTED_CHANGES_MARKER: &str = "would be overwritten by merge";

/// Current-branch line of `git branch`: `* <name>`.
static ACTIVE_BRANCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\*[ \t]*(.*?)[ \t]*\r?$").expect("active branch regex is valid")
});

/// Name on the line marked with `*`, without the marker and line ending.
pub fn parse_active_branch(branch_listing: &str) -> Option<String> {
    let caps = ACTIVE_BRANCH_RE.captures(branch_listing)?;
    let name = caps.get(1)?.as_str();
    (!name.is_empty()).then(|| name.to_string())
}

/// All branch names in a `git branch` listing.
///
/// Strips the current-branch (`*`) and other-worktree (`+`) markers.
pub fn parse_branch_list(branch_listing: &str) -> Vec<String> {
    branch_listing
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("* ")
                .or_else(|| line.strip_prefix("+ "))
                .unwrap_or(line)
                .trim()
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Why a `git pull` exited nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullFailure {
    HostKeyChanged,
    UncommittedLocalChanges,
    Generic,
}

/// Classify pull error text. Checks run in priority order, so the host-key
/// warning wins when both fragments are present.
pub fn classify_pull_failure(error_text: &str) -> PullFailure {
    if error_text.contains(HOST_KEY_CHANGED_MARKER) {
        PullFailure::HostKeyChanged
    } else if error_text.contains(UNCOMMITTED_CHANGES_MARKER) {
        PullFailure::UncommittedLocalChanges
    } else {
        PullFailure::Generic
    }
}
