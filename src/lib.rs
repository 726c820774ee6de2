#![doc = "roadrunners: build-job runners for the legacy content repository."]

//! Each runner takes a build request (package id, version, repository URI),
//! stages its input from the content repository, shells out to an external
//! converter and copies the produced artifacts into an output directory.
//!
//! # Usage
//! Call [`runner::run_build`] with a [`runner::RunnerKind`], a
//! [`contract::BuildRequest`], the runner's [`config::Settings`] and a
//! [`runner::RunContext`]. The `roadrunners` binary does exactly that from a
//! YAML config file and a JSON job description.

pub mod acquire;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod contract;
pub mod error;
pub mod limits;
pub mod load_config;
pub mod lock;
pub mod process;
pub mod request;
pub mod runner;
pub mod staging;
pub mod unpack;

pub use cli::{run, Cli, Commands};
pub use runner::{run_build, RunContext, RunnerKind};
