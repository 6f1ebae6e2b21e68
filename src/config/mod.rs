//! Config module.
//! Typed run configuration, default paths, XML loading and validation.

pub mod paths;
pub mod types;
mod validate;
pub mod xml;

pub use paths::{
    CONFIG_ENV, default_config_path, default_data_dir, default_log_path, path_has_symlink_ancestor,
};
pub use types::{Config, LogLevel, TransferGroup, parse_size};
pub use validate::validate_rewrite_root;
pub use xml::{
    create_template_config, ensure_default_config_exists, load_config, load_config_from_xml_path,
};

/// Free space every destination must keep after accepting a file.
pub const DEFAULT_HEADROOM_BYTES: u64 = 500 * 1024 * 1024 * 1024;
/// How many residual rewrite artifacts are listed by name after cleanup.
pub const DEFAULT_RESIDUAL_REPORT_LIMIT: usize = 10;
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &["thumbs.db", ".ds_store"];
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[".srt", ".tmp", ".bak"];
pub const DEFAULT_EXCLUDED_DIRS: &[&str] = &["#recycle"];
