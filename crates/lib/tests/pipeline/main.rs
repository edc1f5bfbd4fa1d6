//! Pipeline integration tests against fake build tools.
//!
//! The fake tools are POSIX shell scripts, so these tests only run on Unix.

#![cfg(unix)]

mod common;

mod clean_tests;
mod concurrency_tests;
mod failure_tests;
mod incremental_tests;
