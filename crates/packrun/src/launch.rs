//! The launch pipeline.
//!
//! ```text
//! verify ─► access(link) ─► elevate ─► parse link / resolve ─► capture cwd
//! (euid 0)   (real uid)
//!
//!     ─► isolate ─► bind mounts ─► chdir + chroot ─► drop to invoking uid ─► restore cwd ─► execv
//! ```
//!
//! Every error is fatal and surfaces immediately; only bind mounts are
//! allowed to fail.

use std::convert::Infallible;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use packrun_sys::Kernel;
use thiserror::Error;

use crate::config::LaunchConfig;
use crate::exec::{ExecError, replace_process};
use crate::link::{LinkError, parse_link};
use crate::mounts::{self, MountError, MountPlan};
use crate::privilege::{PrivilegeContext, PrivilegeError, WorkingDirectory};
use crate::resolve::{PackerInstallation, ResolveError};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// `runner <link>`: target path read from the program link.
    Link { link: PathBuf },
    /// `runner -M <root> <binary>`: target given explicitly.
    Manual { root: PathBuf, binary: PathBuf },
}

/// One run of the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: Mode,
    /// Forwarded as the target's full argv, `argv[0]` included.
    pub argv: Vec<OsString>,
}

impl Invocation {
    /// `argv[0]` is the program link; the whole vector is forwarded.
    pub fn link<I, A>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let link = PathBuf::from(argv.first()?);
        Some(Self {
            mode: Mode::Link { link },
            argv,
        })
    }

    /// `argv[0]` is the binary inside `root`; the whole vector is forwarded.
    pub fn manual<I, A>(root: impl Into<PathBuf>, argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
        let binary = PathBuf::from(argv.first()?);
        Some(Self {
            mode: Mode::Manual {
                root: root.into(),
                binary,
            },
            argv,
        })
    }
}

/// Run `invocation` to completion: on success the process image is replaced
/// and this never returns.
pub fn launch<K: Kernel>(
    invocation: &Invocation,
    config: &LaunchConfig,
    kernel: &mut K,
) -> Result<Infallible, LaunchError> {
    let verified = PrivilegeContext::verify(kernel)?;

    // access(2) checks the real uid, still the invoking user's until elevate().
    if let Mode::Link { link } = &invocation.mode {
        kernel
            .check_readable(link)
            .map_err(|errno| LinkError::Open {
                path: link.clone(),
                source: io::Error::from(errno),
            })?;
    }

    let elevated = verified.elevate(kernel)?;

    let (install, target) = match &invocation.mode {
        Mode::Link { link } => {
            let target = parse_link(link, config.path_capacity)?;
            let install = PackerInstallation::from_link(link, config.path_capacity)?;
            (install, target)
        }
        Mode::Manual { root, binary } => (
            PackerInstallation::from_root(root, config.path_capacity)?,
            binary.clone(),
        ),
    };
    tracing::debug!(
        root = %install.root.display(),
        target = %target.display(),
        "resolved installation"
    );

    let cwd = WorkingDirectory::capture(kernel)?;
    let working = elevated.begin();

    let ns = mounts::isolate(&working, kernel)?;
    let report = MountPlan::for_installation(&install, config).apply(&ns, kernel);
    tracing::debug!(
        applied = report.applied(),
        skipped = report.skipped().count(),
        "mount plan applied"
    );

    let jail = working.enter_root(kernel, &install.chroot)?;
    let dropped = working.drop_privileges(kernel, jail)?;
    cwd.restore(&dropped, kernel)?;

    replace_process(&dropped, kernel, &target, &invocation.argv).map_err(LaunchError::from)
}
