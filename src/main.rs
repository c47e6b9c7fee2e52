use anyhow::{bail, Result};
use clap::Parser;
use fct_autotrader::config::load_config;
use fct_autotrader::engine::ControlLoop;
use fct_autotrader::ledger::FileLedgerStore;
use fct_autotrader::sim::{SimChain, SimParams};
use fct_autotrader::telemetry::HttpCycleTelemetry;
use fct_autotrader::types::fp18;
use alloy::primitives::U256;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "fct-autotrader", about = "FCT mine-and-sell autotrader")]
struct Args {
    /// Run against live chain adapters instead of the built-in simulation
    #[arg(long, env = "LIVE")]
    live: bool,

    /// Verbose logging
    #[arg(long, env = "DEBUG")]
    debug: bool,
}

/// Dry-run market: a mid-size pool with the mint economics well inside the
/// profitable region, so a fresh checkout produces visible cycles.
fn dry_run_params() -> SimParams {
    SimParams {
        reserve_fct: U256::from(1_000_000u64) * fp18(),
        reserve_eth: U256::from(100_000u64) * fp18(),
        fee_wei: U256::from(2_000_000_000u64), // 2 gwei
        mint_rate_fp18: U256::from(200_000u64) * fp18(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let cfg = load_config()?;

    if args.live {
        // The engine only talks to the chain through the collaborator
        // traits; live adapters (RPC, wallet, signer) are wired by the
        // embedding deployment, not this binary.
        bail!("live mode requires chain adapters; run without --live for the simulated dry run");
    }

    info!(ledger = %cfg.ledger_path, "starting in dry-run mode");
    let chain = Arc::new(SimChain::new(dry_run_params(), cfg.gas_multiplier_ppm));
    let mut collaborators = chain.collaborators();
    if let Some(url) = &cfg.cycle_info_url {
        info!(%url, "using http cycle telemetry");
        collaborators.telemetry = Arc::new(HttpCycleTelemetry::new(url.clone(), cfg.call_timeout)?);
    }

    let store = Arc::new(FileLedgerStore::new(&cfg.ledger_path));
    let mut control = ControlLoop::new(cfg.clone(), collaborators, store)?;

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let warmer = control
        .oracle()
        .spawn_warmer(cfg.poll_interval, stop_rx.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = stop_tx.send(true);
        }
    });

    control.run(stop_rx).await?;
    warmer.abort();
    info!("shutdown complete");
    Ok(())
}
