//! Packer installation discovery.
//!
//! ## Layout
//!
//! ```text
//! <package-root>/
//! ├── Binaries/app.link     program links live one level below the root
//! └── .root/                chroot target
//!     └── .packerenv/       overlay, bound over <package-root> inside the jail
//! ```
//!
//! Normal mode starts from a program link and walks up to the package root;
//! manual mode is handed the root directly.

use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Chroot directory inside a package root.
pub const ROOT_DIR: &str = ".root";

/// Overlay environment inside [`ROOT_DIR`].
pub const ENV_DIR: &str = ".packerenv";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to resolve program link path \"{}\"", .path.display())]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve program link directory of \"{}\"", .path.display())]
    DirName { path: PathBuf },

    #[error("failed to resolve Packer directory \"{}\"", .path.display())]
    PackageRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Packer directory \"{}\" is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("resolving Packer directory \"{}\" internals exceeds the path capacity ({capacity})", .path.display())]
    PathTooLong { path: PathBuf, capacity: usize },
}

/// Canonical coordinates of one installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackerInstallation {
    /// The package directory.
    pub root: PathBuf,
    /// `<root>/.root`, the future `/`.
    pub chroot: PathBuf,
    /// `<root>/.root/.packerenv`.
    pub overlay: PathBuf,
}

impl PackerInstallation {
    /// Locate the installation owning the program link at `link`.
    ///
    /// Links live one directory below the package root, so the root is the
    /// parent of the link's (canonical) directory.
    pub fn from_link(link: &Path, capacity: usize) -> Result<Self, ResolveError> {
        let link = fs::canonicalize(link).map_err(|source| ResolveError::Canonicalize {
            path: link.to_path_buf(),
            source,
        })?;
        let dir = link
            .parent()
            .ok_or_else(|| ResolveError::DirName { path: link.clone() })?;

        let parent = dir.join("..");
        let root = fs::canonicalize(&parent)
            .map_err(|source| ResolveError::PackageRoot { path: parent, source })?;

        Self::from_canonical(root, capacity)
    }

    /// Use `root` as the package directory.
    pub fn from_root(root: &Path, capacity: usize) -> Result<Self, ResolveError> {
        let root = fs::canonicalize(root).map_err(|source| ResolveError::PackageRoot {
            path: root.to_path_buf(),
            source,
        })?;

        Self::from_canonical(root, capacity)
    }

    fn from_canonical(root: PathBuf, capacity: usize) -> Result<Self, ResolveError> {
        if !root.is_dir() {
            return Err(ResolveError::NotADirectory { path: root });
        }

        let chroot = root.join(ROOT_DIR);
        let overlay = chroot.join(ENV_DIR);

        // overlay is the longest of the three
        if overlay.as_os_str().as_bytes().len() + 1 > capacity {
            return Err(ResolveError::PathTooLong {
                path: root,
                capacity,
            });
        }

        Ok(Self {
            root,
            chroot,
            overlay,
        })
    }

    /// Where the overlay is mounted so that it shadows `root` inside the jail.
    pub fn overlay_target(&self) -> PathBuf {
        let relative = self.root.strip_prefix("/").unwrap_or(&self.root);
        self.chroot.join(relative)
    }
}
