//! Private mount namespace for a package.
//!
//! ## View inside the jail (after `chroot <package>/.root`)
//!
//! ```text
//! /
//! ├── Applications/  → bind from host /Applications
//! ├── Packages/      → bind from host /Packages
//! ├── Mount/         → bind from host /Mount
//! ├── System/        → bind from host /System
//! ├── Users/         → bind from host /Users
//! ├── .sysroot/      → bind from host /
//! ├── .rawenv/       → bind from <package>
//! └── <package>/     → bind from <package>/.root/.packerenv
//! ```
//!
//! ## Failure policy
//!
//! Isolation (`unshare` + private propagation) is the security boundary and
//! is fatal. Individual binds are best-effort: a host without `/Mount`
//! still launches, so each bind reports a [`MountOutcome`] instead of an
//! error.
//!
//! [`MountPlan::apply`] takes the [`Namespace`] returned by [`isolate`];
//! there is no other way to obtain one:
//!
//! ```compile_fail
//! let ns = packrun::Namespace { _private: () };
//! ```

use std::path::PathBuf;

use packrun_sys::{Errno, Kernel};
use thiserror::Error;

use crate::config::LaunchConfig;
use crate::privilege::{PrivilegeContext, Working};
use crate::resolve::PackerInstallation;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to create new mount namespace")]
    Unshare(#[source] Errno),

    #[error("failed to make mounts private in the new namespace")]
    Propagation(#[source] Errno),
}

/// One bind mount of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    /// Absolute host path under the package's chroot directory.
    pub target: PathBuf,
    pub recursive: bool,
    pub options: String,
}

impl BindMount {
    pub fn new(
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        options: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            recursive: true,
            options: options.into(),
        }
    }

    /// Apply this bind, never failing the launch.
    pub fn apply_best_effort<K: Kernel>(&self, kernel: &mut K) -> MountOutcome {
        match kernel.bind_mount(&self.source, &self.target, self.recursive, &self.options) {
            Ok(()) => MountOutcome::Applied,
            Err(errno) => {
                tracing::debug!(
                    source = %self.source.display(),
                    target = %self.target.display(),
                    %errno,
                    "bind mount skipped"
                );
                MountOutcome::Skipped(errno)
            }
        }
    }
}

/// Result of a best-effort bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Applied,
    Skipped(Errno),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MountReport {
    pub outcomes: Vec<(BindMount, MountOutcome)>,
}

impl MountReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == MountOutcome::Applied)
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&BindMount, Errno)> {
        self.outcomes.iter().filter_map(|(mount, outcome)| match outcome {
            MountOutcome::Skipped(errno) => Some((mount, *errno)),
            MountOutcome::Applied => None,
        })
    }
}

/// Ordered bind mounts for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    pub mounts: Vec<BindMount>,
}

impl MountPlan {
    pub fn for_installation(install: &PackerInstallation, config: &LaunchConfig) -> Self {
        let options = config.mount_options.as_str();
        let mut mounts = Vec::with_capacity(config.host_dirs.len() + 3);

        for dir in &config.host_dirs {
            let relative = dir.strip_prefix("/").unwrap_or(dir);
            mounts.push(BindMount::new(dir, install.chroot.join(relative), options));
        }

        mounts.push(BindMount::new(
            "/",
            install.chroot.join(&config.sysroot_dir),
            options,
        ));
        // After the host binds: the package root may itself live under one of them.
        mounts.push(BindMount::new(
            &install.overlay,
            install.overlay_target(),
            options,
        ));
        mounts.push(BindMount::new(
            &install.root,
            install.chroot.join(&config.rawenv_dir),
            options,
        ));

        Self { mounts }
    }

    /// Apply every bind in order. Never fails.
    ///
    /// Needs the [`Namespace`] from [`isolate`], so no bind can reach the
    /// host's mount table.
    pub fn apply<K: Kernel>(&self, _ns: &Namespace, kernel: &mut K) -> MountReport {
        let outcomes = self
            .mounts
            .iter()
            .map(|mount| (mount.clone(), mount.apply_best_effort(kernel)))
            .collect();
        MountReport { outcomes }
    }
}

/// Proof that the process sits in a private mount namespace.
#[derive(Debug)]
#[must_use]
pub struct Namespace {
    _private: (),
}

/// Enter a new mount namespace whose mounts never propagate to the host.
pub fn isolate<K: Kernel>(
    _ctx: &PrivilegeContext<Working>,
    kernel: &mut K,
) -> Result<Namespace, MountError> {
    kernel.unshare_mount_namespace().map_err(MountError::Unshare)?;
    kernel.make_mounts_private().map_err(MountError::Propagation)?;
    tracing::debug!("entered private mount namespace");
    Ok(Namespace { _private: () })
}
