// SPDX-FileCopyrightText: 2025 AyaSanae
//
// SPDX-License-Identifier: GPL-3.0-only

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info, warn};
use pkt_counter::{
    config::{XdpMode, create_or_read_config, read_config},
    ebpf::{AyaDatapath, bump_memlock_rlimit},
    error::CounterError,
    supervisor::{LogReporter, Outcome, Supervisor},
};
use tokio::signal::{
    self,
    unix::{SignalKind, signal as unix_signal},
};

#[derive(Parser)]
#[command(name = "pkt-counter")]
#[command(author, version, about)]
struct Opt {
    /// Interface to count received packets on
    #[clap(short, long)]
    iface: Option<String>,
    /// Config file to use instead of ~/.config/pkt_counter/config.toml
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Seconds between two reports
    #[clap(long)]
    interval: Option<u64>,
    /// XDP attach mode
    #[clap(long, value_enum)]
    mode: Option<XdpMode>,
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let opt = Opt::parse();
    let default_filter = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    ExitCode::from(exit_status(run(opt).await))
}

/// Logs the single diagnostic of a failed run and picks the exit status.
fn exit_status(result: Result<Outcome, anyhow::Error>) -> u8 {
    match result {
        Ok(outcome) => outcome.exit_status(),
        Err(e) => {
            // CounterError already carries its cause in the message
            match e.downcast_ref::<CounterError>() {
                Some(e) => error!("{e}"),
                None => error!("{e:#}"),
            }
            1
        }
    }
}

async fn run(opt: Opt) -> Result<Outcome, anyhow::Error> {
    if !unsafe { libc::getuid() == 0 || libc::geteuid() == 0 } {
        anyhow::bail!("This program must be run as root");
    }

    let file_config = match &opt.config {
        Some(path) => read_config(path)?,
        None => create_or_read_config()?,
    };
    let config = file_config
        .override_with(opt.iface, opt.interval, opt.mode)
        .validate()?;
    info!(
        "iface: {}, poll_interval: {}s, xdp_mode: {:?}",
        config.iface, config.poll_interval, config.xdp_mode
    );

    bump_memlock_rlimit();

    let supervisor = Supervisor::start(
        AyaDatapath::new(config.xdp_mode),
        &config.iface,
        config.poll_interval(),
        LogReporter,
    )?;

    Ok(supervisor.run(shutdown_signal()).await)
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
