//! Tests for add, run and status subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_add_several_urls() {
    match parse(&[
        "sdm",
        "add",
        "https://example.com/a.iso",
        "https://example.com/b.iso",
    ]) {
        CliCommand::Add { urls } => {
            assert_eq!(
                urls,
                vec!["https://example.com/a.iso", "https://example.com/b.iso"]
            );
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_requires_a_url() {
    assert!(Cli::try_parse_from(["sdm", "add"]).is_err());
}

#[test]
fn cli_parse_run_defaults() {
    match parse(&["sdm", "run"]) {
        CliCommand::Run { jobs, download_dir } => {
            assert!(jobs.is_none());
            assert!(download_dir.is_none());
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_options() {
    match parse(&["sdm", "run", "--jobs", "4", "--download-dir", "/tmp/dl"]) {
        CliCommand::Run { jobs, download_dir } => {
            assert_eq!(jobs, Some(4));
            assert_eq!(
                download_dir.as_deref(),
                Some(std::path::Path::new("/tmp/dl"))
            );
        }
        _ => panic!("expected Run with options"),
    }
}

#[test]
fn cli_parse_status() {
    assert!(matches!(parse(&["sdm", "status"]), CliCommand::Status));
}
