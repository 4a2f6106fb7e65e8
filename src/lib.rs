//! taskfold - a folder of markdown files as a synchronized task database
//!
//! This crate provides the core functionality for the `tf` CLI tool. Each
//! task is one markdown file with a front-matter header; the folder may live
//! on local disk or inside a cloud-synced directory that other devices edit.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Task documents, file identities, recurrence rules
//! - [`codec`] - Front-matter encoding and decoding
//! - [`store`] - File access, atomic writes, cloud providers, conflicts, sidecars
//! - [`repo`] - Task-level create/update/complete on top of the store
//! - [`sync`] - Polling watcher that turns folder changes into events
//! - [`journal`] - Durable queue of writes that could not be completed
//! - [`folder`] - Task folder resolution
//! - [`workspace`] - One opened folder with all of the above wired together
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod folder;
pub mod journal;
pub mod model;
pub mod repo;
pub mod store;
pub mod sync;
pub mod validate;
pub mod workspace;

pub use error::{Error, Result};
