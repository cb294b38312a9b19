//! Library integration tests.
//!
//! These drive real subprocesses through the process harness, with shell
//! scripts standing in for `native-image`.

#![cfg(unix)]

mod common;
mod native_build_tests;
