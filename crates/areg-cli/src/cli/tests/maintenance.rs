//! Tests for status, mark-all, import, discover and refresh.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_status_and_mark_all() {
    assert!(matches!(parse(&["areg", "status"]), CliCommand::Status));
    assert!(matches!(parse(&["areg", "mark-all"]), CliCommand::MarkAll));
    assert!(matches!(parse(&["areg", "refresh"]), CliCommand::Refresh));
}

#[test]
fn cli_parse_import() {
    match parse(&["areg", "import"]) {
        CliCommand::Import { roster } => assert!(roster.is_none()),
        _ => panic!("expected Import"),
    }
    match parse(&["areg", "import", "students.json"]) {
        CliCommand::Import { roster } => {
            assert_eq!(roster.as_deref(), Some(Path::new("students.json")))
        }
        _ => panic!("expected Import with path"),
    }
}

#[test]
fn cli_parse_discover() {
    match parse(&["areg", "discover", "1234"]) {
        CliCommand::Discover { course, out, force } => {
            assert_eq!(course, "1234");
            assert!(out.is_none());
            assert!(!force);
        }
        _ => panic!("expected Discover"),
    }
    match parse(&["areg", "discover", "1234", "--out", "roster.json", "--force"]) {
        CliCommand::Discover { course, out, force } => {
            assert_eq!(course, "1234");
            assert_eq!(out.as_deref(), Some(Path::new("roster.json")));
            assert!(force);
        }
        _ => panic!("expected Discover with --out --force"),
    }
}

#[test]
fn cli_parse_discover_requires_course() {
    assert!(Cli::try_parse_from(["areg", "discover"]).is_err());
}
