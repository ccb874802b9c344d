// src/commands/mod.rs
//! Command handlers for the flint CLI

mod install;

pub use install::{cmd_install, InstallOptions};
