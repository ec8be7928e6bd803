//! Core library components.
//!
//! Configuration, credential caching, the ssh-agent session and the backup
//! orchestration itself. Everything that starts a process goes through
//! [`process::Runner`].

pub mod acquire;
pub mod agent;
pub mod backup;
pub mod config;
pub mod constants;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod identity;
pub mod keyring;
pub mod options;
pub mod process;
pub mod repository;
