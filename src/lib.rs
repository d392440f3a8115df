//! Ebooks folder manager engine.
//!
//! Runs a chain of actions (fetch, DRM removal, KFX conversion, rename, PDF
//! reformat, metadata print) over every ebook in a set of files, folders or
//! globs. Each file is processed in its own transaction: actions write into
//! a private staging directory and only a successful commit touches the
//! original's folder, backing the original up to `<name>.bak` first.
//!
//! The public API is organised into these layers:
//!
//! - **[`config`]**: per-folder config discovery with `extends` inheritance
//! - **[`formats`]**, **[`metadata`]**: file type sniffing and metadata reading
//! - **[`collaborators`]**: external tools (DeDRM, k2pdfopt, calibre, libgourou)
//! - **[`actions`]**: the pipeline steps and their canonical order
//! - **[`transaction`]**: staging, commit, backup and rollback for one file
//! - **[`commands`]**: batch driver, watch mode and the other subcommands
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod actions;
pub mod cli;
pub mod collaborators;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod formats;
pub mod logging;
pub mod metadata;
pub mod operations;
pub mod shutdown;
pub mod transaction;
