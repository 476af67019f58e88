#![doc = "daily-contrib-core: core logic library for daily-contrib."]

//! This crate contains the idempotent generate-and-publish pipeline: the
//! category catalog, the idempotency gate, the repository publisher, the git
//! backend, and the orchestrator that sequences them.
//! Process concerns (argument parsing, config files, exit codes) live in the
//! `daily-contrib` binary crate.
//!
//! # Usage
//! Build a [`config::PipelineConfig`], pick a [`contract::ContentCatalog`] and
//! a [`contract::RepositoryBackend`], then call [`contribute::contribute`].

pub mod catalog;
pub mod config;
pub mod contract;
pub mod contribute;
pub mod gate;
pub mod git;
pub mod publish;
