use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fcast_file::hosts::format_host_entry;
use fcast_file::{CastOptions, CastRequest, CastSession, HostStore, MediaServer};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Saved receivers file [default: ~/.fcast_hosts.json]
    #[arg(long, global = true)]
    hosts_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve a file and tell a receiver to play it
    Cast {
        file: PathBuf,

        /// Receiver as host:port
        #[arg(required_unless_present = "saved", conflicts_with = "saved")]
        target: Option<String>,

        /// Use the saved receiver at this index (see `hosts list`)
        #[arg(long)]
        saved: Option<usize>,

        /// Local address the receiver can reach us on, picked automatically if omitted
        #[arg(long)]
        ip: Option<IpAddr>,

        /// Pause between the server starting and notifying the receiver
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,

        /// Remember the receiver
        #[arg(long)]
        save: bool,
    },
    /// Only serve a file over HTTP
    Serve {
        file: PathBuf,

        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        ip: IpAddr,

        /// 0 picks a free port
        #[arg(long, default_value_t = 0)]
        port: u16,
    },
    /// Manage saved receivers
    Hosts {
        #[command(subcommand)]
        command: HostsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HostsCommand {
    /// Print saved receivers with their index
    List,
    /// Save a receiver
    Add { host: String, port: u16 },
}

/// Returns `true` if interrupted, `false` if the server stopped on its own.
async fn wait_for_interrupt<F>(stopped: F) -> Result<bool>
where
    F: Future<Output = fcast_file::Result<()>>,
{
    let interrupted = tokio::select! {
        res = stopped => {
            res?;
            false
        }
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            true
        }
    };

    Ok(interrupted)
}

async fn cast(
    store: &HostStore,
    file: PathBuf,
    target: Option<String>,
    saved: Option<usize>,
    ip: Option<IpAddr>,
    delay_ms: u64,
    save: bool,
) -> Result<()> {
    let entry = match (target, saved) {
        (Some(target), _) => target,
        (None, Some(idx)) => store
            .load()?
            .get(idx)
            .cloned()
            .with_context(|| format!("No saved receiver at index {idx}"))?,
        (None, None) => bail!("No receiver given"),
    };

    let request = CastRequest::from_host_entry(&file, &entry)?;
    let options = CastOptions {
        notify_delay: Duration::from_millis(delay_ms),
        ..Default::default()
    };

    let mut session = CastSession::start(request, ip, options).await?;

    if save {
        match store.add(&entry) {
            Ok(true) => info!("Saved {entry} to {}", store.path().display()),
            Ok(false) => (),
            Err(err) => warn!("Failed to save {entry}: {err:#}"),
        }
    }

    info!("Serving {} at {}, press Ctrl-C to stop", file.display(), session.url());

    // Serving continues after the notify so the receiver can seek
    if wait_for_interrupt(session.wait()).await? {
        session.shutdown().await?;
    }

    Ok(())
}

async fn serve(file: PathBuf, ip: IpAddr, port: u16) -> Result<()> {
    let mut server = MediaServer::start(ip, port, &file).await?;
    info!(
        "Serving {} on {}, press Ctrl-C to stop",
        file.display(),
        server.local_addr()
    );

    if wait_for_interrupt(server.wait()).await? {
        server.shutdown().await?;
    }

    Ok(())
}

fn hosts(store: &HostStore, command: HostsCommand) -> Result<()> {
    match command {
        HostsCommand::List => {
            for (idx, host) in store.load()?.iter().enumerate() {
                println!("{idx}: {host}");
            }
        }
        HostsCommand::Add { host, port } => {
            let entry = format_host_entry(&host, port);
            if !store.add(&entry)? {
                info!("{entry} is already saved");
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_module("fcast_file", common::default_log_level())
        .filter_module("common", common::default_log_level())
        .init();

    let args = Args::parse();

    let store = match args.hosts_file {
        Some(path) => HostStore::new(path),
        None => HostStore::new(
            HostStore::default_path().context("Could not determine the home directory")?,
        ),
    };

    match args.command {
        Command::Cast {
            file,
            target,
            saved,
            ip,
            delay_ms,
            save,
        } => common::runtime().block_on(cast(&store, file, target, saved, ip, delay_ms, save)),
        Command::Serve { file, ip, port } => common::runtime().block_on(serve(file, ip, port)),
        Command::Hosts { command } => hosts(&store, command),
    }
}
