//! A3S Forge CLI library.
//!
//! Command definitions, request assembly and output helpers used by the
//! `a3s-forge` binary.

#![allow(clippy::result_large_err)]

pub mod commands;
pub mod output;
pub mod request;
