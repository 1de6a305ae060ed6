//! Tests for pause, resume and cancel subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_pause() {
    match parse(&["sdm", "pause", "7"]) {
        CliCommand::Pause { id } => assert_eq!(id, 7),
        _ => panic!("expected Pause"),
    }
}

#[test]
fn cli_parse_resume() {
    match parse(&["sdm", "resume", "12"]) {
        CliCommand::Resume { id } => assert_eq!(id, 12),
        _ => panic!("expected Resume"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["sdm", "cancel", "3"]) {
        CliCommand::Cancel { id, retry } => {
            assert_eq!(id, 3);
            assert!(!retry);
        }
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_cancel_retry() {
    match parse(&["sdm", "cancel", "3", "--retry"]) {
        CliCommand::Cancel { id, retry } => {
            assert_eq!(id, 3);
            assert!(retry);
        }
        _ => panic!("expected Cancel --retry"),
    }
}

#[test]
fn cli_parse_rejects_non_numeric_id() {
    assert!(Cli::try_parse_from(["sdm", "pause", "abc"]).is_err());
}
