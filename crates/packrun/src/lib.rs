//! packrun: launcher for programs installed by Packer
//!
//! Runs a packaged program as if it were native to the host while actually
//! executing it inside a private mount namespace, jailed at the package's
//! `.root` directory, with the invoking user's identity.
//!
//! The pipeline is strictly linear and order-dependent:
//!
//! 1. **Privilege** - verify the runner is setuid-root, capture the invoking uid,
//!    check the link is readable by it, elevate
//! 2. **Link / Resolve** - read the program link, locate the package root
//! 3. **Mounts** - unshare a private mount namespace, apply the bind plan
//! 4. **Jail** - `chroot` into `<package>/.root`
//! 5. **Drop** - irreversibly return to the invoking uid
//! 6. **Exec** - replace the process with the target binary
//!
//! ## Quick Start
//!
//! ```ignore
//! use packrun::{Invocation, LaunchConfig, launch};
//! use packrun_sys::LinuxKernel;
//!
//! let invocation = Invocation::manual("/Packages/app", ["/bin/sh", "-c", "echo hi"])?;
//! // Only returns if something went wrong.
//! let Err(err) = launch(&invocation, &LaunchConfig::default(), &mut LinuxKernel);
//! eprintln!("{err}");
//! ```

pub mod config;
pub mod exec;
pub mod launch;
pub mod link;
pub mod mounts;
pub mod privilege;
pub mod resolve;

pub use config::LaunchConfig;
pub use exec::{ExecError, NulSite, replace_process};
pub use launch::{Invocation, LaunchError, Mode, launch};
pub use link::{LinkError, parse_link};
pub use mounts::{
    BindMount, MountError, MountOutcome, MountPlan, MountReport, Namespace, isolate,
};
pub use privilege::{
    Dropped, Elevated, Jail, PrivilegeContext, PrivilegeError, Verified, Working,
    WorkingDirectory,
};
pub use resolve::{PackerInstallation, ResolveError};
