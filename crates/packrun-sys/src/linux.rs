//! [`Kernel`] backed by the running Linux kernel.

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::mount::{MsFlags, mount};
use nix::sched::{CloneFlags, unshare};
use nix::unistd::{self, AccessFlags, Uid};

use crate::Kernel;

/// Direct syscalls on the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxKernel;

impl Kernel for LinuxKernel {
    fn getuid(&self) -> Uid {
        unistd::getuid()
    }

    fn geteuid(&self) -> Uid {
        unistd::geteuid()
    }

    fn setuid(&mut self, uid: Uid) -> Result<(), Errno> {
        tracing::trace!(%uid, "setuid");
        unistd::setuid(uid)
    }

    fn check_readable(&self, path: &Path) -> Result<(), Errno> {
        unistd::access(path, AccessFlags::R_OK)
    }

    fn getcwd(&self) -> Result<PathBuf, Errno> {
        unistd::getcwd()
    }

    fn chdir(&mut self, dir: &Path) -> Result<(), Errno> {
        tracing::trace!(dir = %dir.display(), "chdir");
        unistd::chdir(dir)
    }

    fn chroot(&mut self, root: &Path) -> Result<(), Errno> {
        tracing::trace!(root = %root.display(), "chroot");
        unistd::chroot(root)
    }

    fn unshare_mount_namespace(&mut self) -> Result<(), Errno> {
        tracing::trace!("unshare(CLONE_NEWNS)");
        unshare(CloneFlags::CLONE_NEWNS)
    }

    fn make_mounts_private(&mut self) -> Result<(), Errno> {
        mount(
            None::<&str>,
            "/",
            None::<&str>,
            MsFlags::MS_REC | MsFlags::MS_PRIVATE,
            None::<&str>,
        )
    }

    fn bind_mount(
        &mut self,
        source: &Path,
        target: &Path,
        recursive: bool,
        options: &str,
    ) -> Result<(), Errno> {
        let mut flags = MsFlags::MS_BIND;
        if recursive {
            flags |= MsFlags::MS_REC;
        }
        mount(Some(source), target, None::<&str>, flags, Some(options))
    }

    fn execv(&mut self, path: &CStr, argv: &[CString]) -> Errno {
        match unistd::execv(path, argv) {
            Ok(never) => match never {},
            Err(errno) => errno,
        }
    }
}
