//! nmb - interactive module manager
//!
//! Fetches bash and python modules from a GitHub repository, installs
//! their dependencies, and launches them locally or on a host reached
//! over SSH.
//!
//! # Architecture
//!
//! - **modules**: header parsing, local store, registry client
//! - **deps**: dependency installation, local and remote
//! - **runner**: local process table
//! - **remote**: SSH session and remote command building
//! - **repl**: interactive engine

pub mod errors;
pub mod cli;
pub mod modules;
pub mod deps;
pub mod remote;
pub mod runner;
pub mod repl;
pub mod doctor;

pub use errors::{NmbError, Result};
