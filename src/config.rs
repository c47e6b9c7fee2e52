//! Configuration management
//!
//! All tunables are read from the environment exactly once at startup and
//! frozen into an immutable `BotConfig` that is passed by reference into
//! every component. No component reads ambient environment state directly.

use crate::types::{fp18, u256_to_f64, BPS, PPM};
use alloy::primitives::U256;
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Floor on the poll interval. Anything lower hammers the RPC for no benefit.
pub const MIN_POLL_INTERVAL_MS: u64 = 5_000;

/// Hard cap on the number of slices in one sell plan.
pub const MAX_SLICES: usize = 50;

/// Immutable bot configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    // Sell side
    /// Sell triggers when price >= wac * (1 + take_profit), as ppm
    pub take_profit_ppm: u64,
    /// Fraction of inventory sold per accepted cycle, as ppm
    pub chunk_ppm: u64,
    /// Smallest sell worth the gas, FCT-wei
    pub min_trade_fct: U256,
    /// Per-slice price impact bound, bps
    pub max_slippage_bps: u32,
    /// Haircut applied to each slice's estimated output, bps
    pub min_out_safety_bps: u32,

    // Mint side
    /// Required proportional discount of mint cost vs market, as ppm
    pub target_discount_ppm: u64,
    /// Required absolute edge (market - cost) in ETH-wei per FCT, fp18
    pub min_abs_edge_fp18: U256,
    /// Minimum fraction of gas spend that mints FCT, as ppm (None = no floor).
    /// Fixed execution overhead caps reachable efficiency at ~994,900 ppm
    /// for the largest mint, so any floor above that rejects everything.
    pub efficiency_floor_ppm: Option<u64>,
    /// Payload size per mint transaction, KB
    pub mint_size_kb: u32,
    /// Multiplier applied to the base fee when estimating burn, as ppm
    pub gas_multiplier_ppm: u64,
    /// Whether accepted cycles also submit a mint
    pub mint_enabled: bool,

    // Fee-price window
    /// Lower bound on acceptable L1 fee, wei per gas (None = open)
    pub fee_min_wei: Option<U256>,
    /// Upper bound on acceptable L1 fee, wei per gas (None = open)
    pub fee_max_wei: Option<U256>,
    /// How long the loop may wait for the fee to re-enter the window
    pub fee_wait_budget: Duration,
    /// Re-check interval while waiting on the fee window
    pub fee_check_interval: Duration,

    // Cycle timing
    /// Mint only while cycle progress <= this, ppm
    pub max_progress_ppm: u64,
    /// Mint only while at least this many blocks remain
    pub min_blocks_left: u64,
    /// "Late" region of the cycle, in blocks remaining
    pub end_window_blocks: u64,
    /// Progress below this in the late region means wait for next cycle, ppm
    pub weak_progress_ppm: u64,
    /// Progress at or above this means the cycle is nearly saturated, ppm
    pub near_cap_ppm: u64,

    // Cooldown
    /// Realized edge below this is "weak", ETH-wei per FCT fp18
    pub edge_warn_fp18: U256,
    /// Unconditional-reject window after repeated weak edges
    pub cooldown: Duration,

    // Relaxation
    /// Consecutive threshold-driven rejects before relaxing
    pub relax_after_cycles: u32,
    /// Linear relaxation per extra cycle, percent
    pub relax_step_percent: u64,
    /// Hard ceiling on total relaxation, percent
    pub relax_cap_percent: u64,

    // Loop
    pub poll_interval: Duration,
    pub backoff_ceiling: Duration,
    /// Oracle event-window lookback
    pub quote_lookback: Duration,
    /// Per-call timeout for collaborator RPC
    pub call_timeout: Duration,
    /// Abort the process on hard execution failures instead of continuing
    pub stop_on_failure: bool,

    // External state
    pub ledger_path: String,
    /// Optional JSON endpoint serving mint-cycle telemetry
    pub cycle_info_url: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            take_profit_ppm: 120_000,                       // 12%
            chunk_ppm: 200_000,                             // 20% of inventory
            min_trade_fct: fp18(),                          // 1 FCT
            max_slippage_bps: 80,
            min_out_safety_bps: 50,
            target_discount_ppm: 200_000,                   // 20%
            min_abs_edge_fp18: U256::from(20_000_000_000_000_000u64), // 0.02 ETH
            efficiency_floor_ppm: None,
            mint_size_kb: 100,
            gas_multiplier_ppm: 1_500_000,                  // 1.5x
            mint_enabled: true,
            fee_min_wei: None,
            fee_max_wei: None,
            fee_wait_budget: Duration::from_secs(180),
            fee_check_interval: Duration::from_secs(15),
            max_progress_ppm: 300_000,                      // 0.30
            min_blocks_left: 250,
            end_window_blocks: 40,
            weak_progress_ppm: 600_000,                     // 0.60
            near_cap_ppm: 900_000,                          // 0.90
            edge_warn_fp18: U256::from(3_000_000_000_000_000u64), // 0.003 ETH
            cooldown: Duration::from_secs(30 * 60),
            relax_after_cycles: 5,
            relax_step_percent: 10,
            relax_cap_percent: 50,
            poll_interval: Duration::from_millis(30_000),
            backoff_ceiling: Duration::from_secs(10 * 60),
            quote_lookback: Duration::from_secs(120),
            call_timeout: Duration::from_secs(30),
            stop_on_failure: false,
            ledger_path: "./autotrader-ledger.json".to_string(),
            cycle_info_url: None,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(v) => match v.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => bail!("invalid {}={}: {}", name, v, e),
        },
        None => Ok(None),
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "y"))
}

/// Parses a ratio env var given as a plain decimal (e.g. "0.12") into ppm.
fn env_ratio_ppm(name: &str) -> Result<Option<u64>> {
    match env_parse::<f64>(name)? {
        Some(r) if r.is_finite() && r >= 0.0 => Ok(Some((r * PPM as f64).round() as u64)),
        Some(r) => bail!("invalid {}={}: must be a non-negative ratio", name, r),
        None => Ok(None),
    }
}

/// Parses an ETH-denominated env var (e.g. "0.02") into fp18 wei.
fn env_eth_fp18(name: &str) -> Result<Option<U256>> {
    match env_parse::<f64>(name)? {
        Some(v) if v.is_finite() && v >= 0.0 => {
            Ok(Some(U256::from((v * 1e18).round() as u128)))
        }
        Some(v) => bail!("invalid {}={}: must be non-negative", name, v),
        None => Ok(None),
    }
}

/// Parses a gwei-denominated env var into wei.
fn env_gwei_wei(name: &str) -> Result<Option<U256>> {
    match env_parse::<f64>(name)? {
        Some(v) if v.is_finite() && v >= 0.0 => {
            Ok(Some(U256::from((v * 1e9).round() as u128)))
        }
        Some(v) => bail!("invalid {}={}: must be non-negative", name, v),
        None => Ok(None),
    }
}

/// Loads configuration from the environment on top of the defaults.
pub fn load_config() -> Result<BotConfig> {
    dotenv::dotenv().ok();

    let mut cfg = BotConfig::default();

    if let Some(v) = env_ratio_ppm("TAKE_PROFIT")? {
        cfg.take_profit_ppm = v;
    }
    if let Some(v) = env_ratio_ppm("CHUNK_PCT")? {
        cfg.chunk_ppm = v.min(PPM);
    }
    if let Some(v) = env_parse::<U256>("MIN_TRADE_FCT")? {
        cfg.min_trade_fct = v;
    }
    if let Some(v) = env_parse::<u32>("SLIPPAGE_BPS")? {
        cfg.max_slippage_bps = v.clamp(1, BPS as u32);
    }
    if let Some(v) = env_parse::<u32>("MIN_OUT_SAFETY_BPS")? {
        cfg.min_out_safety_bps = v.min(5_000);
    }
    if let Some(v) = env_ratio_ppm("TARGET_DISCOUNT")? {
        cfg.target_discount_ppm = v.min(PPM);
    }
    if let Some(v) = env_eth_fp18("MIN_ABS_EDGE_ETH")? {
        cfg.min_abs_edge_fp18 = v;
    }
    if let Some(v) = env_parse::<f64>("MIN_EFFICIENCY_PERCENT")? {
        if !(0.0..=100.0).contains(&v) {
            bail!("invalid MIN_EFFICIENCY_PERCENT={}: must be 0..=100", v);
        }
        cfg.efficiency_floor_ppm = Some((v / 100.0 * PPM as f64).round() as u64);
    }
    if let Some(v) = env_parse::<u32>("MINT_SIZE_KB")? {
        if v == 0 || v > 100 {
            bail!("invalid MINT_SIZE_KB={}: must be 1..=100", v);
        }
        cfg.mint_size_kb = v;
    }
    if let Some(v) = env_ratio_ppm("GAS_PRICE_MULTIPLIER")? {
        cfg.gas_multiplier_ppm = v.max(PPM);
    }
    if let Some(v) = env_bool("MINT_ENABLED") {
        cfg.mint_enabled = v;
    }
    cfg.fee_min_wei = env_gwei_wei("FEE_GWEI_MIN")?.or(cfg.fee_min_wei);
    cfg.fee_max_wei = env_gwei_wei("FEE_GWEI_MAX")?.or(cfg.fee_max_wei);
    if let Some(v) = env_parse::<u64>("FEE_WAIT_BUDGET_SEC")? {
        cfg.fee_wait_budget = Duration::from_secs(v);
    }
    if let Some(v) = env_parse::<u64>("FEE_CHECK_INTERVAL_SEC")? {
        cfg.fee_check_interval = Duration::from_secs(v.max(1));
    }
    if let Some(v) = env_ratio_ppm("MAX_PROGRESS")? {
        cfg.max_progress_ppm = v.min(PPM);
    }
    if let Some(v) = env_parse::<u64>("MIN_BLOCKS_LEFT")? {
        cfg.min_blocks_left = v;
    }
    if let Some(v) = env_parse::<u64>("END_WINDOW_BLOCKS")? {
        cfg.end_window_blocks = v;
    }
    if let Some(v) = env_ratio_ppm("WEAK_PROGRESS")? {
        cfg.weak_progress_ppm = v.min(PPM);
    }
    if let Some(v) = env_ratio_ppm("NEAR_CAP_PROGRESS")? {
        cfg.near_cap_ppm = v.min(PPM);
    }
    if let Some(v) = env_eth_fp18("EDGE_WARN_ETH")? {
        cfg.edge_warn_fp18 = v;
    }
    if let Some(v) = env_parse::<u64>("COOLDOWN_MIN")? {
        cfg.cooldown = Duration::from_secs(v * 60);
    }
    if let Some(v) = env_parse::<u32>("RELAX_AFTER_CYCLES")? {
        cfg.relax_after_cycles = v.max(1);
    }
    if let Some(v) = env_parse::<u64>("RELAX_STEP_PERCENT")? {
        cfg.relax_step_percent = v;
    }
    if let Some(v) = env_parse::<u64>("RELAX_CAP_PERCENT")? {
        cfg.relax_cap_percent = v;
    }
    if let Some(v) = env_parse::<u64>("POLL_MS")? {
        cfg.poll_interval = Duration::from_millis(v.max(MIN_POLL_INTERVAL_MS));
    }
    if let Some(v) = env_parse::<u64>("BACKOFF_MAX_MS")? {
        cfg.backoff_ceiling = Duration::from_millis(v);
    }
    if let Some(v) = env_parse::<u64>("QUOTE_LOOKBACK_SEC")? {
        cfg.quote_lookback = Duration::from_secs(v.max(1));
    }
    if let Some(v) = env_parse::<u64>("CALL_TIMEOUT_SEC")? {
        cfg.call_timeout = Duration::from_secs(v.max(1));
    }
    if let Some(v) = env_bool("STOP_ON_FAILURE") {
        cfg.stop_on_failure = v;
    }
    if let Some(v) = env_var("LEDGER_PATH") {
        cfg.ledger_path = v;
    }
    cfg.cycle_info_url = env_var("CYCLE_INFO_URL");

    validate(&cfg).context("configuration validation failed")?;
    Ok(cfg)
}

fn validate(cfg: &BotConfig) -> Result<()> {
    if cfg.chunk_ppm == 0 {
        bail!("CHUNK_PCT must be > 0");
    }
    if let (Some(min), Some(max)) = (cfg.fee_min_wei, cfg.fee_max_wei) {
        if min > max {
            bail!(
                "fee window inverted: min {} gwei > max {} gwei",
                u256_to_f64(min) / 1e9,
                u256_to_f64(max) / 1e9
            );
        }
    }
    if cfg.weak_progress_ppm > cfg.near_cap_ppm {
        bail!("WEAK_PROGRESS must not exceed NEAR_CAP_PROGRESS");
    }
    Ok(())
}
