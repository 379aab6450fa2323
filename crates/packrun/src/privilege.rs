//! Privilege transitions of the runner.
//!
//! The runner is installed setuid-root. Its identity moves through four
//! states, encoded as type parameters of [`PrivilegeContext`]:
//!
//! ```text
//!  verify()            elevate()           begin()            drop_privileges(Jail)
//! ──────────► Verified ──────────► Elevated ───────► Working ──────────────────────► Dropped
//!             euid == 0,                              │ isolate, mount,               │
//!             real uid = invoker                      │ enter_root() -> Jail          │ restore cwd, exec
//! ```
//!
//! `acquire()` is `verify()` followed by `elevate()`. Anything that must be
//! checked against the invoking user's real uid goes between the two.
//!
//! - Each transition consumes the previous state; nothing leads back from
//!   `Dropped`.
//! - `drop_privileges` needs the [`Jail`] that only `enter_root` hands out,
//!   so the drop cannot happen before `chroot`.
//! - Exec only accepts `&PrivilegeContext<Dropped>`.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use packrun_sys::{Errno, Kernel, Uid};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error(
        "the runner utility is not set as SetUID (effective uid {euid}); run \"chmod u+s\" on the runner utility to fix this issue"
    )]
    NotSetuid { euid: Uid },

    #[error("cannot setuid to root; does the runner utility have the setuid bit set?")]
    Elevate(#[source] Errno),

    #[error("failed to change UID to \"{uid}\"")]
    Drop {
        uid: Uid,
        #[source]
        source: Errno,
    },

    #[error("privilege drop to UID \"{uid}\" is incomplete (uid {real}, euid {effective})")]
    DropIncomplete { uid: Uid, real: Uid, effective: Uid },

    #[error("cannot get current working directory")]
    Cwd(#[source] Errno),

    #[error("cannot change working directory to \"{}\"", .path.display())]
    Chdir {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("failed to change root to \"{}\"", .path.display())]
    Chroot {
        path: PathBuf,
        #[source]
        source: Errno,
    },
}

/// Running setuid-root, real uid still the invoker's.
#[derive(Debug)]
pub struct Verified;

/// Full root, nothing done yet.
#[derive(Debug)]
pub struct Elevated;

/// Still root, setting up the namespace and jail.
#[derive(Debug)]
pub struct Working;

/// Back to the invoking user. Terminal.
#[derive(Debug)]
pub struct Dropped;

#[derive(Debug)]
pub struct PrivilegeContext<S> {
    invoking: Uid,
    _state: PhantomData<S>,
}

impl<S> PrivilegeContext<S> {
    /// The real uid captured before any privilege change.
    pub fn invoking_uid(&self) -> Uid {
        self.invoking
    }

    fn into_state<T>(self) -> PrivilegeContext<T> {
        PrivilegeContext {
            invoking: self.invoking,
            _state: PhantomData,
        }
    }
}

impl PrivilegeContext<Verified> {
    /// Verify the setuid-root install and remember who invoked us.
    pub fn verify<K: Kernel>(kernel: &K) -> Result<Self, PrivilegeError> {
        let euid = kernel.geteuid();
        if !euid.is_root() {
            return Err(PrivilegeError::NotSetuid { euid });
        }

        Ok(Self {
            invoking: kernel.getuid(),
            _state: PhantomData,
        })
    }

    /// Become root for real (uid as well as euid).
    pub fn elevate<K: Kernel>(
        self,
        kernel: &mut K,
    ) -> Result<PrivilegeContext<Elevated>, PrivilegeError> {
        kernel
            .setuid(Uid::from_raw(0))
            .map_err(PrivilegeError::Elevate)?;

        tracing::debug!(invoking = %self.invoking, "elevated");
        Ok(self.into_state())
    }
}

impl PrivilegeContext<Elevated> {
    /// [`verify`](PrivilegeContext::verify) then
    /// [`elevate`](PrivilegeContext::elevate).
    pub fn acquire<K: Kernel>(kernel: &mut K) -> Result<Self, PrivilegeError> {
        PrivilegeContext::verify(kernel)?.elevate(kernel)
    }

    pub fn begin(self) -> PrivilegeContext<Working> {
        self.into_state()
    }
}

impl PrivilegeContext<Working> {
    /// `chdir` into `root`, then `chroot` to it.
    pub fn enter_root<K: Kernel>(
        &self,
        kernel: &mut K,
        root: &Path,
    ) -> Result<Jail, PrivilegeError> {
        chdir(kernel, root)?;
        kernel.chroot(root).map_err(|source| PrivilegeError::Chroot {
            path: root.to_path_buf(),
            source,
        })?;

        tracing::debug!(root = %root.display(), "entered jail");
        Ok(Jail {
            root: root.to_path_buf(),
        })
    }

    /// Permanently become the invoking user.
    pub fn drop_privileges<K: Kernel>(
        self,
        kernel: &mut K,
        jail: Jail,
    ) -> Result<PrivilegeContext<Dropped>, PrivilegeError> {
        let uid = self.invoking;
        kernel
            .setuid(uid)
            .map_err(|source| PrivilegeError::Drop { uid, source })?;

        let real = kernel.getuid();
        let effective = kernel.geteuid();
        if real != uid || effective != uid {
            return Err(PrivilegeError::DropIncomplete {
                uid,
                real,
                effective,
            });
        }

        // The saved set-user-ID must be gone too.
        if !uid.is_root() && kernel.setuid(Uid::from_raw(0)).is_ok() {
            return Err(PrivilegeError::DropIncomplete {
                uid,
                real: kernel.getuid(),
                effective: kernel.geteuid(),
            });
        }

        tracing::debug!(%uid, jail = %jail.root.display(), "dropped privileges");
        Ok(self.into_state())
    }
}

/// Proof that the process has been chrooted.
#[derive(Debug)]
#[must_use]
pub struct Jail {
    root: PathBuf,
}

impl Jail {
    /// Host path of the new root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The caller's working directory, captured before any `chdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory(PathBuf);

impl WorkingDirectory {
    pub fn capture<K: Kernel>(kernel: &K) -> Result<Self, PrivilegeError> {
        kernel.getcwd().map(Self).map_err(PrivilegeError::Cwd)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Re-enter the same path, now resolved inside the jail.
    pub fn restore<K: Kernel>(
        &self,
        _ctx: &PrivilegeContext<Dropped>,
        kernel: &mut K,
    ) -> Result<(), PrivilegeError> {
        chdir(kernel, Path::new("/"))?;
        chdir(kernel, &self.0)
    }
}

fn chdir<K: Kernel>(kernel: &mut K, dir: &Path) -> Result<(), PrivilegeError> {
    kernel.chdir(dir).map_err(|source| PrivilegeError::Chdir {
        path: dir.to_path_buf(),
        source,
    })
}
