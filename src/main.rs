//! `focus-relay` binary.
//!
//! Normally launched by the browser as a native-messaging host; host events
//! arrive on stdin and logs go to stderr, since stdout belongs to the
//! browser.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use focus_relay::{Agent, AgentConfig, Framing, Result};

// ============================================================================
// Cli
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "focus-relay", version)]
#[command(about = "Streams the focused browser tab to a local companion service")]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long, env = "FOCUS_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Host event framing on stdin (native, lines)
    #[arg(long)]
    framing: Option<Framing>,

    /// Path of the discovery resource
    #[arg(long)]
    discovery_path: Option<String>,

    /// Fixed discovery ports, probed first
    #[arg(long, value_delimiter = ',')]
    fixed_ports: Option<Vec<u16>>,

    /// Common service ports, probed second
    #[arg(long, value_delimiter = ',')]
    common_ports: Option<Vec<u16>>,

    /// First port of the range scan
    #[arg(long)]
    scan_start: Option<u16>,

    /// Last port of the range scan
    #[arg(long)]
    scan_end: Option<u16>,

    /// Distance between scanned ports
    #[arg(long)]
    scan_stride: Option<u16>,

    /// Probe cap for the range scan
    #[arg(long)]
    scan_max_attempts: Option<usize>,

    /// Per-probe timeout for listed ports
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Per-probe timeout for the range scan
    #[arg(long)]
    scan_timeout_ms: Option<u64>,

    /// Delay between connection attempts
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Enables doubling backoff capped at this delay
    #[arg(long)]
    retry_max_delay_ms: Option<u64>,

    /// WebSocket handshake budget
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Arguments passed by the launching browser (caller origin, or
    /// manifest path and add-on id)
    #[arg(hide = true)]
    host_args: Vec<String>,

    /// Parent window handle passed by some browsers on Windows
    #[arg(long, hide = true)]
    parent_window: Option<String>,
}

impl Cli {
    /// Loads the configuration file, then applies flag overrides.
    fn into_config(self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::default(),
        };

        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(path) = self.discovery_path {
            config.discovery_path = path;
        }
        if let Some(ports) = self.fixed_ports {
            config.fixed_ports = ports;
        }
        if let Some(ports) = self.common_ports {
            config.common_ports = ports;
        }

        let scan = &mut config.scan;
        apply(&mut scan.start, self.scan_start);
        apply(&mut scan.end, self.scan_end);
        apply(&mut scan.stride, self.scan_stride);
        apply(&mut scan.max_attempts, self.scan_max_attempts);

        apply(&mut config.probe_timeout_ms, self.probe_timeout_ms);
        apply(&mut config.scan_timeout_ms, self.scan_timeout_ms);
        apply(&mut config.retry_delay_ms, self.retry_delay_ms);
        apply(&mut config.connect_timeout_ms, self.connect_timeout_ms);
        if self.retry_max_delay_ms.is_some() {
            config.retry_max_delay_ms = self.retry_max_delay_ms;
        }

        Ok(config)
    }
}

fn apply<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Initializes tracing on stderr.
///
/// `RUST_LOG` wins over `--debug`.
fn init_logging(debug: bool) {
    let default_directive = if debug {
        "focus_relay=debug"
    } else {
        "focus_relay=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if !cli.host_args.is_empty() {
        info!(args = ?cli.host_args, "Launched by browser");
    }
    if let Some(handle) = &cli.parent_window {
        debug!(%handle, "Parent window");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Focus relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let agent = Agent::builder().config(config).build()?;

    agent
        .run_stdio(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await
}

// ============================================================================
// Tests
// ============================================================================
