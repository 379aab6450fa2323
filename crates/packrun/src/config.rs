//! Launcher configuration.
//!
//! The launcher reads no configuration files or environment variables. A
//! `LaunchConfig` only carries the fixed layout of a Packer host so that the
//! pipeline can be pointed at other trees in tests.
//!
//! ## Example
//!
//! ```ignore
//! use packrun::LaunchConfig;
//!
//! let config = LaunchConfig::default()
//!     .host_dirs(["/Applications", "/Users"])
//!     .path_capacity(4096);
//! ```
//!
//! ## Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `path_capacity` | 1024 bytes (including the terminating NUL) |
//! | `host_dirs` | `/Applications`, `/Packages`, `/Mount`, `/System`, `/Users` |
//! | `sysroot_dir` | `.sysroot` |
//! | `rawenv_dir` | `.rawenv` |
//! | `mount_options` | `bind,x-gvfs-hide` |

use std::path::PathBuf;

/// Capacity of every path the launcher composes, NUL included.
pub const PATH_MAX_INTERNAL: usize = 1024;

/// Top-level host directories shared into every package root.
pub const HOST_DIRS: [&str; 5] = ["/Applications", "/Packages", "/Mount", "/System", "/Users"];

/// Where the host's `/` appears inside the jail.
pub const SYSROOT_DIR: &str = ".sysroot";

/// Where the raw package directory appears inside the jail.
pub const RAWENV_DIR: &str = ".rawenv";

/// Mount data; `x-gvfs-hide` keeps the binds out of desktop volume lists.
pub const MOUNT_OPTIONS: &str = "bind,x-gvfs-hide";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub path_capacity: usize,
    pub host_dirs: Vec<PathBuf>,
    pub sysroot_dir: PathBuf,
    pub rawenv_dir: PathBuf,
    pub mount_options: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            path_capacity: PATH_MAX_INTERNAL,
            host_dirs: HOST_DIRS.iter().map(PathBuf::from).collect(),
            sysroot_dir: PathBuf::from(SYSROOT_DIR),
            rawenv_dir: PathBuf::from(RAWENV_DIR),
            mount_options: MOUNT_OPTIONS.to_string(),
        }
    }
}

impl LaunchConfig {
    #[must_use]
    pub fn path_capacity(mut self, capacity: usize) -> Self {
        self.path_capacity = capacity;
        self
    }

    /// Replace the list of shared host directories.
    #[must_use]
    pub fn host_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.host_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn mount_options(mut self, options: impl Into<String>) -> Self {
        self.mount_options = options.into();
        self
    }
}
