// tests/git_output_props.rs

mod common;
use crate::common::FakeTransport;

use proptest::prelude::*;

use buildrig::exec::shell::ShellDialect;
use buildrig::git::parse::{HOST_KEY_CHANGED_MARKER, UNCOMMITTED_CHANGES_MARKER};
use buildrig::git::{classify_pull_failure, parse_active_branch, parse_branch_list, GitWorkflow, PullFailure};

fn branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}(/[a-z0-9_-]{1,8})?"
}

proptest! {
    #[test]
    fn host_key_marker_wins_over_uncommitted(prefix in ".{0,40}", middle in ".{0,40}", suffix in ".{0,40}") {
        let both = format!("{prefix}{UNCOMMITTED_CHANGES_MARKER}{middle}{HOST_KEY_CHANGED_MARKER}{suffix}");
        prop_assert_eq!(classify_pull_failure(&both), PullFailure::HostKeyChanged);
    }

    #[test]
    fn text_without_markers_is_generic(text in "[^Rw]{0,200}") {
        prop_assert_eq!(classify_pull_failure(&text), PullFailure::Generic);
    }

    #[test]
    fn listing_round_trips_names_and_active_branch(
        names in proptest::collection::btree_set(branch_name(), 1..8),
        active_idx in any::<prop::sample::Index>(),
        crlf in any::<bool>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let active = active_idx.index(names.len());
        let eol = if crlf { "\r\n" } else { "\n" };
        let listing: String = names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("{} {n}{eol}", if i == active { '*' } else { ' ' }))
            .collect();

        prop_assert_eq!(parse_active_branch(&listing), Some(names[active].clone()));
        prop_assert_eq!(parse_branch_list(&listing), names);
    }

    #[test]
    fn created_branch_is_listed_afterwards(name in branch_name()) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let mut transport = FakeTransport::with_branch("main");

        rt.block_on(async {
            GitWorkflow::new(&mut transport, ShellDialect::posix(), "/repo", "prop")
                .create_branch(&name)
                .await
        })
        .unwrap();

        prop_assert!(transport.branches().contains(&name));
    }
}
