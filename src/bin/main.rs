use anyhow::Result;
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use notebook_bridge::utils::{
    check_pid, check_version, to_api_path, to_os_path, url_escape, url_unescape,
};
use notebook_bridge::{
    BridgeConfig, Completion, ExecutionContext, SchedulerFlavor, block_on_deferred,
    load_bridge_config,
};

#[derive(Parser)]
#[command(name = "notebook-bridge")]
#[command(about = "Notebook server helpers and async/sync bridge")]
struct Cli {
    /// Scheduler flavor for work driven from the command line
    #[arg(long, global = true, env = "NOTEBOOK_BRIDGE_FLAVOR")]
    flavor: Option<SchedulerFlavor>,
    /// Worker threads for the multi-thread flavor
    #[arg(long, global = true, env = "NOTEBOOK_BRIDGE_WORKER_THREADS")]
    worker_threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether a process id is alive
    CheckPid { pid: i32 },
    /// Wait until a process exits
    WaitPid {
        pid: i32,
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,
        #[arg(long, default_value = "100")]
        poll_ms: u64,
    },
    /// Check that a version satisfies a minimum
    CheckVersion { version: String, minimum: String },
    /// Map an API path to a filesystem path
    ToOsPath {
        api_path: String,
        #[arg(long, default_value = "")]
        root: String,
    },
    /// Map a filesystem path to an API path
    ToApiPath {
        os_path: String,
        #[arg(long, default_value = "")]
        root: String,
    },
    /// Percent-encode each segment of a URL path
    UrlEscape { path: String },
    /// Decode each segment of a URL path
    UrlUnescape { path: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())?)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = apply_cli_overrides(load_bridge_config()?, cli.flavor, cli.worker_threads);

    match cli.command {
        Commands::CheckPid { pid } => {
            let alive = check_pid(pid)?;
            println!("{}", if alive { "alive" } else { "dead" });
        }
        Commands::WaitPid {
            pid,
            timeout_ms,
            poll_ms,
        } => {
            info!(
                "Waiting up to {}ms for pid {} to exit ({:?} scheduler)",
                timeout_ms, pid, config.flavor
            );
            let mut ctx = ExecutionContext::new(config);
            let timeout = Duration::from_millis(timeout_ms);
            let poll = Duration::from_millis(poll_ms.max(1));
            let completion = block_on_deferred(&mut ctx, wait_for_exit(pid, timeout, poll))?;

            match completion {
                Completion::Ready(true) => println!("pid {} exited", pid),
                Completion::Ready(false) => {
                    println!("pid {} still running after {}ms", pid, timeout_ms);
                    std::process::exit(1);
                }
                // main never runs inside a scheduler
                Completion::Pending(_) => anyhow::bail!("wait for pid {} did not complete", pid),
            }
        }
        Commands::CheckVersion { version, minimum } => {
            let satisfied = check_version(&version, &minimum);
            println!(
                "{} {} {}",
                version,
                if satisfied { ">=" } else { "<" },
                minimum
            );
            if !satisfied {
                std::process::exit(1);
            }
        }
        Commands::ToOsPath { api_path, root } => {
            println!("{}", to_os_path(&api_path, &root).display());
        }
        Commands::ToApiPath { os_path, root } => {
            println!("{}", to_api_path(&os_path, &root));
        }
        Commands::UrlEscape { path } => println!("{}", url_escape(&path)),
        Commands::UrlUnescape { path } => println!("{}", url_unescape(&path)),
    }

    Ok(())
}

/// `RUST_LOG` when set, otherwise info-level logs from this crate.
fn log_filter(env: Option<&str>) -> Result<EnvFilter> {
    match env {
        Some(directives) if !directives.trim().is_empty() => Ok(EnvFilter::try_new(directives)?),
        _ => Ok(EnvFilter::new("notebook_bridge=info")),
    }
}

/// Merge command-line scheduler flags over the loaded configuration.
fn apply_cli_overrides(
    mut config: BridgeConfig,
    flavor: Option<SchedulerFlavor>,
    worker_threads: Option<usize>,
) -> BridgeConfig {
    if let Some(flavor) = flavor {
        config.flavor = flavor;
    }
    if worker_threads.is_some() {
        config.worker_threads = worker_threads;
    }
    config
}

/// Poll until `pid` is gone. Resolves to `false` on timeout.
async fn wait_for_exit(pid: i32, timeout: Duration, poll: Duration) -> Result<bool> {
    let started = Instant::now();
    let mut interval = tokio::time::interval(poll);
    loop {
        interval.tick().await;
        if !check_pid(pid)? {
            return Ok(true);
        }
        if started.elapsed() >= timeout {
            tracing::warn!("Timed out waiting for pid {}", pid);
            return Ok(false);
        }
    }
}
