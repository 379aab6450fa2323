//! Final process replacement.

use std::convert::Infallible;
use std::ffi::{CString, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use packrun_sys::{Errno, Kernel, path_to_cstring};
use thiserror::Error;

use crate::privilege::{Dropped, PrivilegeContext};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("the specified binary \"{}\" could not be executed within the Packer environment", .path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    #[error("{site} for \"{}\" contains a NUL byte", .path.display())]
    Nul { path: PathBuf, site: NulSite },
}

/// Where a NUL byte was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NulSite {
    Target,
    Argument(usize),
}

impl fmt::Display for NulSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => f.write_str("target path"),
            Self::Argument(index) => write!(f, "argument {index}"),
        }
    }
}

/// `execv` the target with `argv` forwarded verbatim (`argv[0]` included).
///
/// Only returns on failure; there is no fallback binary.
pub fn replace_process<K: Kernel>(
    ctx: &PrivilegeContext<Dropped>,
    kernel: &mut K,
    target: &Path,
    argv: &[OsString],
) -> Result<Infallible, ExecError> {
    let path = path_to_cstring(target).map_err(|_| ExecError::Nul {
        path: target.to_path_buf(),
        site: NulSite::Target,
    })?;
    let args = to_cstrings(target, argv)?;

    tracing::info!(
        target = %target.display(),
        uid = %ctx.invoking_uid(),
        argc = args.len(),
        "executing"
    );

    let source = kernel.execv(&path, &args);
    Err(ExecError::Exec {
        path: target.to_path_buf(),
        source,
    })
}

fn to_cstrings(target: &Path, argv: &[OsString]) -> Result<Vec<CString>, ExecError> {
    argv.iter()
        .enumerate()
        .map(|(index, arg)| {
            CString::new(arg.as_bytes()).map_err(|_| ExecError::Nul {
                path: target.to_path_buf(),
                site: NulSite::Argument(index),
            })
        })
        .collect()
}
