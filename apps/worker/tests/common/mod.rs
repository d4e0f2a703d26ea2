//! Common test utilities for worker integration tests
//!
//! Provides recording task fixtures and helpers to build and observe a
//! task manager.

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
