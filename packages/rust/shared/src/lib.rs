//! Shared types, error model, and configuration for atlasdash.
//!
//! This crate is the foundation depended on by all other atlasdash crates.
//! It provides:
//! - [`DocsetError`], the unified error type
//! - Domain types ([`AtlasToc`], [`Entry`], [`TypeDescriptor`], [`IndexRecord`], [`DocLocation`])
//! - Configuration ([`AppConfig`], [`BuildConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, DefaultsConfig, FeedConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{DocsetError, Result};
pub use types::{
    AtlasToc, DocLocation, Entry, IndexRecord, LanguageInfo, LinkAttr, TocContent,
    TypeDescriptor, VersionInfo,
};
