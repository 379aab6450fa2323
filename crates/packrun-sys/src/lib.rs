//! Kernel interface for the Packer launcher.
//!
//! Every privileged system call the launcher performs goes through the
//! [`Kernel`] trait. The launcher pipeline is generic over it, which keeps the
//! ordering rules (isolate before mounting, chroot before dropping, drop
//! before exec) observable in tests without needing root.
//!
//! ## Calls
//!
//! | Method | Syscall |
//! |--------|---------|
//! | `getuid` / `geteuid` / `setuid` | credential queries and the privilege drop |
//! | `check_readable` | `access(R_OK)`, evaluated against the real uid |
//! | `getcwd` / `chdir` / `chroot` | working directory and root change |
//! | `unshare_mount_namespace` | `unshare(CLONE_NEWNS)` |
//! | `make_mounts_private` | `mount(NULL, "/", NULL, MS_REC \| MS_PRIVATE)` |
//! | `bind_mount` | `mount(src, dst, NULL, MS_BIND [\| MS_REC], opts)` |
//! | `execv` | `execv(path, argv)` |
//!
//! [`LinuxKernel`] is the real implementation.

use std::ffi::{CStr, CString};
use std::path::{Path, PathBuf};

mod linux;

pub use linux::LinuxKernel;
pub use nix::errno::Errno;
pub use nix::unistd::Uid;

/// The system calls used by the launcher.
pub trait Kernel {
    /// Real user id of the calling process.
    fn getuid(&self) -> Uid;

    /// Effective user id of the calling process.
    fn geteuid(&self) -> Uid;

    /// Set real, effective and saved user ids (`setuid(2)`).
    fn setuid(&mut self, uid: Uid) -> Result<(), Errno>;

    /// Check that the *real* user may read `path`.
    fn check_readable(&self, path: &Path) -> Result<(), Errno>;

    fn getcwd(&self) -> Result<PathBuf, Errno>;

    fn chdir(&mut self, dir: &Path) -> Result<(), Errno>;

    fn chroot(&mut self, root: &Path) -> Result<(), Errno>;

    /// Move the process into a new mount namespace.
    fn unshare_mount_namespace(&mut self) -> Result<(), Errno>;

    /// Recursively mark every mount private so new mounts stay in this namespace.
    fn make_mounts_private(&mut self) -> Result<(), Errno>;

    fn bind_mount(
        &mut self,
        source: &Path,
        target: &Path,
        recursive: bool,
        options: &str,
    ) -> Result<(), Errno>;

    /// Replace the process image. Only returns on failure.
    fn execv(&mut self, path: &CStr, argv: &[CString]) -> Errno;
}

#[inline]
pub fn path_to_cstring(path: &Path) -> Result<CString, Errno> {
    use std::os::unix::ffi::OsStrExt;

    CString::new(path.as_os_str().as_bytes()).map_err(|_| Errno::EINVAL)
}
