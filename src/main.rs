mod cmd;
mod config;
mod distro;
mod dracut;
mod error;
mod extract;
mod grub;
mod host;
mod layout;
mod patcher;
mod ui;
mod util;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cmd::Session;
use config::Config;
use ui::UX;

#[derive(Debug, Parser)]
#[command(
    name = "bootpatch",
    version,
    about = "Patch the dracut/GRUB boot pipeline so the encrypted root unlocks unattended"
)]
struct Cli {
    /// Config file (.toml, otherwise YAML); defaults to /etc/bootpatch.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Inspect a system mounted at this prefix instead of /; only `status` accepts it
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Debug-level diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report how the boot pipeline is currently patched
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Remove the legacy patch, install the unlock module, rebuild initramfs
    Patch {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Add kernel arguments to every GRUB install (BIOS and UEFI)
    KernelArgs {
        /// Arguments to add; falls back to kernel_args.default from config
        args: Vec<String>,
    },
    /// Install the encryption utilities via yum when missing
    Prereqs {
        /// Also install the wider utility set
        #[arg(long)]
        extras: bool,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ui = UX::new(cli.quiet);

    let mut cfg = Config::resolve(cli.config.as_deref()).context("load configuration")?;
    if let Some(root) = cli.root {
        cfg.system.root = root;
    }
    let session = Session::open(cfg)?;

    match cli.command {
        Command::Status { json } => cmd::status::run(&ui, &session, json),
        Command::Patch { yes } => cmd::patch::run(&ui, &session, yes),
        Command::KernelArgs { args } => cmd::kernel_args::run(&ui, &session, &args),
        Command::Prereqs { extras } => cmd::prereqs::run(&ui, &session, extras),
    }
}
