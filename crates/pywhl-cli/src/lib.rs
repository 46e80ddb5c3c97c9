//! pywhl - Python wheel downloader
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Resolves a package and its dependencies against the Python package
//! index, picks the one wheel that fits a target interpreter and platform,
//! and downloads it for offline installation.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.pywhl/
//! ├── config.toml   # Optional, read-only settings
//! └── cache/        # <key>-<filename>, one file per wheel
//! ```

pub mod cmd;
pub mod python;
pub mod settings;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "pywhl")]
#[command(author, version, about = "pywhl - download Python wheels for offline installation")]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Package index JSON API base URL
    #[arg(long, global = true, env = "PYWHL_INDEX_URL")]
    pub index_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download a wheel, optionally with its dependencies
    Download {
        /// Package spec: name, name==1.2.0, "name>=1.0,<2"
        #[arg(required_unless_present = "requirements")]
        spec: Option<String>,
        /// Download every requirement listed in a file
        #[arg(short, long, value_name = "FILE", conflicts_with = "spec")]
        requirements: Option<PathBuf>,
        /// Target Python version (MAJOR.MINOR, or "auto" to detect)
        #[arg(short, long, value_name = "VER")]
        python: Option<String>,
        /// Target platform tag (e.g. manylinux_2_17_x86_64, win_amd64)
        #[arg(short = 't', long)]
        platform: Option<String>,
        /// Also download dependencies
        #[arg(short, long)]
        deps: bool,
        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Skip the wheel cache
        #[arg(long)]
        no_cache: bool,
        /// Number of parallel downloads
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,
        /// Accept free-threaded (cp313t) builds when no standard build fits
        #[arg(long)]
        allow_free_threaded: bool,
        /// Fail when any dependency conflict is found
        #[arg(long)]
        strict: bool,
    },
    /// Resolve dependencies without downloading
    Resolve {
        /// Package spec
        spec: String,
        /// Target Python version
        #[arg(short, long, value_name = "VER")]
        python: Option<String>,
        /// Target platform tag
        #[arg(short = 't', long)]
        platform: Option<String>,
        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show package info
    Info {
        /// Package name
        package: String,
        /// List published versions
        #[arg(short, long)]
        versions: bool,
    },
    /// Manage the wheel cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// List cached wheels
    List,
    /// Show cache location and size
    Info,
    /// Remove cached wheels
    Clean {
        /// Remove everything
        #[arg(long, conflicts_with = "older_than", required_unless_present = "older_than")]
        all: bool,
        /// Remove wheels not modified for this many days
        #[arg(long, value_name = "DAYS")]
        older_than: Option<u64>,
    },
}
