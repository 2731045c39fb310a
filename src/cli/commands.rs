//! CLI commands for the node tools
//!
//! Implements all command handlers for the CLI interface.

use crate::crypto::{MerkleProofResult, ProofError};
use crate::network::{
    ConnectionConfig, ConnectionRegistry, DefaultCallbacks, Message, Network,
    NetworkThreadConfig,
};
use crate::storage::BlockFile;
use crate::wire::Hash256;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Resolve `host:port`, falling back to the network's default port
pub async fn resolve_peer(host: &str, port: Option<u16>, network: Network) -> CliResult<SocketAddr> {
    let port = port.unwrap_or_else(|| network.default_port());
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| format!("could not resolve {}", host).into())
}

/// Handshake with a peer, report what it announced and hang up
pub async fn cmd_connect(addr: SocketAddr, network: Network, timeout: Duration) -> CliResult<()> {
    let registry = ConnectionRegistry::new(NetworkThreadConfig::default());
    let worker = registry.spawn();

    let config = ConnectionConfig::for_network(network);
    let result = async {
        let mut handle = registry
            .connect(addr, &config, Box::new(DefaultCallbacks))
            .await?;
        handle.wait_for_verack(timeout).await?;
        handle.sync_with_ping(timeout).await?;

        println!("🤝 Connected to {} ({})", addr, network);
        if let Some(Message::Version(v)) = handle.last_message("version") {
            println!("   ├─ Version: {}", v.version);
            println!("   ├─ Services: {:?}", v.services);
            println!("   ├─ User agent: {}", v.user_agent.as_deref().unwrap_or("-"));
            match v.start_height {
                Some(height) => println!("   ├─ Start height: {}", height),
                None => println!("   ├─ Start height: -"),
            }
            println!("   └─ Relay: {}", v.relay);
        }
        let (ver_send, ver_recv) = handle.with(|s| (s.conn.ver_send(), s.conn.ver_recv()));
        println!("   Negotiated wire version: send {} / recv {}", ver_send, ver_recv);

        handle.disconnect();
        handle.wait_for_disconnect(timeout).await?;
        Ok::<(), crate::network::ConnectionError>(())
    }
    .await;

    registry.stop();
    worker.await?;
    result?;
    Ok(())
}

/// Print the JSON summary of the block stored at `offset`
pub fn cmd_load_block(file: &Path, offset: u64) -> CliResult<()> {
    let report = block_report(file, offset)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Header summary plus per-transaction summaries
pub fn block_report(file: &Path, offset: u64) -> CliResult<serde_json::Value> {
    let mut block = BlockFile::new(file).load_at_offset(offset)?;
    let valid_merkle_root = block.calc_merkle_root() == block.header.merkle_root;
    Ok(serde_json::json!({
        "header": block.header.summary(),
        "merkle_root_valid": valid_merkle_root,
        "transactions": block.transaction_summaries(),
    }))
}

/// Build an inclusion proof for `tx` among the ordered `txs`
pub fn build_proof(block: Option<&str>, tx: &str, txs: &[String]) -> CliResult<MerkleProofResult> {
    let parse = |hex: &str| hex.parse::<Hash256>().map_err(|_| ProofError::InvalidHex);
    let block_hash = match block {
        Some(hex) => parse(hex)?,
        None => Hash256::zero(),
    };
    let tx_hash = parse(tx)?;
    let hashes = txs
        .iter()
        .map(|h| parse(h.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(MerkleProofResult::build(block_hash, tx_hash, &hashes)?)
}

pub fn cmd_proof(block: Option<&str>, tx: &str, txs: &[String]) -> CliResult<()> {
    let proof = build_proof(block, tx, txs)?;
    println!("{}", serde_json::to_string_pretty(&proof)?);
    Ok(())
}

/// Check a proof previously printed by `proof`
pub fn verify_proof_json(json: &str) -> CliResult<bool> {
    let proof: MerkleProofResult = serde_json::from_str(json)?;
    Ok(proof.verify())
}

pub fn cmd_verify_proof(json: &str) -> CliResult<()> {
    if verify_proof_json(json)? {
        println!("✅ Proof is valid");
        Ok(())
    } else {
        Err("proof does not reach the stated merkle root".into())
    }
}
