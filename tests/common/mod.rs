//! Shared fixtures for the order workflow integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod strategies;

pub use fixtures::*;
