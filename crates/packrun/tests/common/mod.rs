//! Common utilities for launcher tests.
//!
//! `FakeKernel` records every call the pipeline makes, models `setuid(2)`
//! credential rules and can be told to fail individual calls.

#![allow(dead_code)]

use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::fs;
use std::path::{Path, PathBuf};

use packrun_sys::{Errno, Kernel, Uid};
use tempfile::TempDir;

pub const USER: u32 = 1000;
pub const HOME: &str = "/home/user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetUid(u32),
    Chdir(PathBuf),
    Chroot(PathBuf),
    Unshare,
    MakePrivate,
    BindMount { source: PathBuf, target: PathBuf },
    Execv {
        path: PathBuf,
        argv: Vec<String>,
        uid: u32,
        euid: u32,
    },
}

#[derive(Debug)]
pub struct FakeKernel {
    pub uid: u32,
    pub euid: u32,
    pub suid: u32,
    pub cwd: PathBuf,
    pub calls: Vec<Call>,
    /// Real uid at the last `check_readable`.
    pub readable_checked_as: Cell<Option<u32>>,

    pub fail_elevate: Option<Errno>,
    pub fail_drop: Option<Errno>,
    /// `setuid` to a non-root uid only changes the real uid.
    pub sticky_euid: bool,
    pub fail_readable: Option<Errno>,
    pub fail_unshare: Option<Errno>,
    pub fail_private: Option<Errno>,
    pub fail_bind_sources: Vec<PathBuf>,
    pub fail_chdir: Vec<PathBuf>,
    pub fail_chroot: Option<Errno>,
    pub exec_errno: Errno,
}

impl FakeKernel {
    /// A setuid-root runner started by `uid`.
    pub fn setuid_root(uid: u32) -> Self {
        Self {
            uid,
            euid: 0,
            suid: 0,
            cwd: PathBuf::from(HOME),
            calls: Vec::new(),
            readable_checked_as: Cell::new(None),
            fail_elevate: None,
            fail_drop: None,
            sticky_euid: false,
            fail_readable: None,
            fail_unshare: None,
            fail_private: None,
            fail_bind_sources: Vec::new(),
            fail_chdir: Vec::new(),
            fail_chroot: None,
            exec_errno: Errno::ENOEXEC,
        }
    }

    /// A runner missing its setuid bit.
    pub fn unprivileged(uid: u32) -> Self {
        Self {
            euid: uid,
            suid: uid,
            ..Self::setuid_root(uid)
        }
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.iter().position(pred)
    }

    pub fn index_of(&self, call: &Call) -> usize {
        self.position(|c| c == call)
            .unwrap_or_else(|| panic!("{call:?} not in {:#?}", self.calls))
    }

    pub fn binds(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::BindMount { source, target } => Some((source.clone(), target.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn exec(&self) -> Option<&Call> {
        self.calls.iter().find(|c| matches!(c, Call::Execv { .. }))
    }

    pub fn reached(&self, pred: impl Fn(&Call) -> bool) -> bool {
        self.position(pred).is_some()
    }
}

impl Kernel for FakeKernel {
    fn getuid(&self) -> Uid {
        Uid::from_raw(self.uid)
    }

    fn geteuid(&self) -> Uid {
        Uid::from_raw(self.euid)
    }

    fn setuid(&mut self, uid: Uid) -> Result<(), Errno> {
        let uid = uid.as_raw();
        self.calls.push(Call::SetUid(uid));

        if uid == 0 {
            if let Some(errno) = self.fail_elevate {
                return Err(errno);
            }
        } else if let Some(errno) = self.fail_drop {
            return Err(errno);
        }

        if self.euid == 0 {
            self.uid = uid;
            if !(self.sticky_euid && uid != 0) {
                self.euid = uid;
                self.suid = uid;
            }
            Ok(())
        } else if uid == self.uid || uid == self.suid {
            self.euid = uid;
            Ok(())
        } else {
            Err(Errno::EPERM)
        }
    }

    fn check_readable(&self, _path: &Path) -> Result<(), Errno> {
        self.readable_checked_as.set(Some(self.uid));
        self.fail_readable.map_or(Ok(()), Err)
    }

    fn getcwd(&self) -> Result<PathBuf, Errno> {
        Ok(self.cwd.clone())
    }

    fn chdir(&mut self, dir: &Path) -> Result<(), Errno> {
        self.calls.push(Call::Chdir(dir.to_path_buf()));
        if self.fail_chdir.iter().any(|d| d == dir) {
            return Err(Errno::ENOENT);
        }
        Ok(())
    }

    fn chroot(&mut self, root: &Path) -> Result<(), Errno> {
        self.calls.push(Call::Chroot(root.to_path_buf()));
        self.fail_chroot.map_or(Ok(()), Err)
    }

    fn unshare_mount_namespace(&mut self) -> Result<(), Errno> {
        self.calls.push(Call::Unshare);
        self.fail_unshare.map_or(Ok(()), Err)
    }

    fn make_mounts_private(&mut self) -> Result<(), Errno> {
        self.calls.push(Call::MakePrivate);
        self.fail_private.map_or(Ok(()), Err)
    }

    fn bind_mount(
        &mut self,
        source: &Path,
        target: &Path,
        _recursive: bool,
        _options: &str,
    ) -> Result<(), Errno> {
        self.calls.push(Call::BindMount {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
        });
        if self.fail_bind_sources.iter().any(|s| s == source) {
            return Err(Errno::ENOENT);
        }
        Ok(())
    }

    fn execv(&mut self, path: &CStr, argv: &[CString]) -> Errno {
        self.calls.push(Call::Execv {
            path: PathBuf::from(path.to_str().unwrap()),
            argv: argv
                .iter()
                .map(|a| a.to_str().unwrap().to_string())
                .collect(),
            uid: self.uid,
            euid: self.euid,
        });
        self.exec_errno
    }
}

/// A package at `<tmp>/pkgs/app` with a program link at `Binaries/app.link`.
pub struct Package {
    pub tmp: TempDir,
    pub root: PathBuf,
}

impl Package {
    pub fn new(link_contents: &str) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let root = tmp.path().join("pkgs/app");
        fs::create_dir_all(root.join(".root/.packerenv")).unwrap();
        fs::create_dir_all(root.join("Binaries")).unwrap();
        fs::write(root.join("Binaries/app.link"), link_contents).unwrap();
        let root = fs::canonicalize(root).unwrap();
        Self { tmp, root }
    }

    pub fn link(&self) -> PathBuf {
        self.root.join("Binaries/app.link")
    }

    pub fn chroot(&self) -> PathBuf {
        self.root.join(".root")
    }
}
