//! runner - Executable handler for Packer
//!
//! Installed setuid-root. Program links use it as their interpreter:
//!
//! ```text
//! runner /Packages/Binaries/program_name [args...]
//! runner -M /Packages/app /bin/sh [args...]
//! ```

use std::error::Error;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use packrun::{Invocation, LaunchConfig, launch};
use packrun_sys::LinuxKernel;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "runner")]
#[command(version, about = "Executable handler for Packer")]
#[command(long_about = "Executable handler for Packer.\n\n\
    This utility handles running Packaged programs installed by Packer. The program \
    runs chrooted into its package's private root, inside a private mount namespace, \
    as the invoking user.")]
#[command(override_usage = "runner <PROGRAM_LINK> [ARGS]...\n       \
    runner -M <PACKAGE_ROOT> <BINARY> [ARGS]...")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Run BINARY from PACKAGE_ROOT instead of following a program link
    #[arg(short = 'M', long = "manual", value_name = "PACKAGE_ROOT")]
    manual: Option<PathBuf>,

    /// Program link (or, with -M, the binary inside the package root) and its arguments
    #[arg(value_name = "COMMAND", required = true, trailing_var_arg = true)]
    command: Vec<OsString>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let invocation = match cli.manual {
        Some(root) => Invocation::manual(root, cli.command),
        None => Invocation::link(cli.command),
    };
    let Some(invocation) = invocation else {
        Cli::command().print_help().ok();
        return ExitCode::FAILURE;
    };

    match launch(&invocation, &LaunchConfig::default(), &mut LinuxKernel) {
        Ok(never) => match never {},
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &dyn Error) {
    eprintln!(" --- [PACKER]: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!(" --- [PERROR]: {cause}");
        source = cause.source();
    }
}
