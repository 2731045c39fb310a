//! p2pnode CLI Application
//!
//! Command-line tools for talking to Bitcoin SV peers and reading block files.

use bsv_p2p_node::cli;
use bsv_p2p_node::network::Network;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "p2pnode")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Bitcoin SV peer protocol and Merkle proof tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handshake with a peer and print what it announces
    Connect {
        /// Peer host name or IP address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Peer port (defaults to the network's port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Network: mainnet, testnet3, stn or regtest
        #[arg(short, long, default_value = "regtest")]
        network: Network,

        /// Seconds to wait for each handshake step
        #[arg(short, long, default_value = "30")]
        timeout_secs: u64,
    },

    /// Decode the block stored at a byte offset of a block file
    LoadBlock {
        /// Block file path
        #[arg(short, long)]
        file: PathBuf,

        /// Byte offset of the block within the file
        #[arg(short, long, default_value = "0")]
        offset: u64,
    },

    /// Build a Merkle inclusion proof
    Proof {
        /// Transaction hash to prove
        #[arg(long)]
        tx: String,

        /// Hash of the block the transactions belong to
        #[arg(long)]
        block: Option<String>,

        /// Every transaction hash of the block, in order
        #[arg(required = true)]
        hashes: Vec<String>,
    },

    /// Verify a proof printed by `proof`
    VerifyProof {
        /// Proof JSON
        #[arg(long)]
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Connect {
            host,
            port,
            network,
            timeout_secs,
        } => {
            let addr = cli::resolve_peer(&host, port, network).await?;
            cli::cmd_connect(addr, network, Duration::from_secs(timeout_secs)).await?;
        }

        Commands::LoadBlock { file, offset } => {
            cli::cmd_load_block(&file, offset)?;
        }

        Commands::Proof { tx, block, hashes } => {
            cli::cmd_proof(block.as_deref(), &tx, &hashes)?;
        }

        Commands::VerifyProof { json } => {
            cli::cmd_verify_proof(&json)?;
        }
    }

    Ok(())
}
