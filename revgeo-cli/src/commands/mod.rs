//! CLI subcommands.

pub mod cache;
pub mod common;
pub mod init;
pub mod lookup;
pub mod serve;
