// src/exec/mod.rs

//! Process execution for graph files.
//!
//! The engine is domain-agnostic; this module supplies the one body type the
//! binary needs: [`CommandAction`], which runs a shell command with
//! `tokio::process::Command`.

pub mod command;

pub use command::{CommandAction, INPUTS_ENV_VAR};
