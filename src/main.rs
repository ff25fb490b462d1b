use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chordial::chord::types::FingerUpdatePolicy;
use chordial::config::NodeConfig;
use chordial::error::ChordError;
use chordial::network::runtime::NodeRuntime;

#[derive(Parser)]
#[command(name = "chordial")]
#[command(about = "A Chord-style distributed hash table node", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct NodeOpts {
    /// Ring identifier of this node, in [0, 2^M)
    #[arg(short, long)]
    id: u64,

    /// Path to a JSON config file shared by all ring members
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ring bit width M (overrides the config file)
    #[arg(long)]
    bits: Option<u8>,

    /// Host all ring members resolve on (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Port of identifier 0; node n listens on base-port + n
    #[arg(long)]
    base_port: Option<u16>,

    /// Upper bound in milliseconds on each outbound remote call
    #[arg(long)]
    rpc_timeout_ms: Option<u64>,

    /// Interval semantics for finger updates: "exclusive" or "paper"
    #[arg(long)]
    finger_update_policy: Option<FingerUpdatePolicy>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the first node of a brand-new ring
    Bootstrap {
        #[command(flatten)]
        opts: NodeOpts,
    },
    /// Start a node and join an existing ring through a known member
    Join {
        #[command(flatten)]
        opts: NodeOpts,
        /// Identifier of a node already in the ring
        #[arg(short, long)]
        contact: u64,
    },
    /// Start a node and wait for init to arrive over rpc
    Serve {
        #[command(flatten)]
        opts: NodeOpts,
    },
}

impl NodeOpts {
    fn into_config(self) -> Result<(u64, NodeConfig), ChordError> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if let Some(bits) = self.bits {
            config.bits = bits;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(base_port) = self.base_port {
            config.base_port = base_port;
        }
        if let Some(timeout) = self.rpc_timeout_ms {
            config.rpc_timeout_ms = timeout;
        }
        if let Some(policy) = self.finger_update_policy {
            config.finger_update_policy = policy;
        }
        Ok((self.id, config))
    }
}

async fn run(command: Commands) -> Result<(), ChordError> {
    match command {
        Commands::Bootstrap { opts } => {
            let (id, config) = opts.into_config()?;
            let mut runtime = NodeRuntime::new(id, config)?;
            runtime.start().await?;
            runtime.node().init_alone().await;
            info!(node = id, "ring bootstrapped, waiting for members");
            runtime.run().await
        }
        Commands::Join { opts, contact } => {
            let (id, config) = opts.into_config()?;
            let mut runtime = NodeRuntime::new(id, config)?;
            runtime.start().await?;
            runtime.node().init(contact).await?;
            runtime.run().await
        }
        Commands::Serve { opts } => {
            let (id, config) = opts.into_config()?;
            let mut runtime = NodeRuntime::new(id, config)?;
            runtime.start().await?;
            info!(node = id, "serving uninitialized, expecting init over rpc");
            runtime.run().await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "node failed");
            ExitCode::FAILURE
        }
    }
}
