//! Control loop
//!
//! One logical thread drives the whole strategy: quote, gate, mint, slice,
//! sell, settle, repeat. Every cycle starts by reconciling any trade whose
//! receipt timed out in a previous cycle; no mutating action happens while a
//! settlement is outstanding. Hard failures back off exponentially,
//! transient ones just wait for the next poll.

pub mod backoff;

use crate::config::BotConfig;
use crate::gate::{AdmissionGate, GateInputs};
use crate::ledger::{LedgerState, LedgerStore};
use crate::mint;
use crate::oracle::PriceOracle;
use crate::slicer;
use crate::traits::{CycleTelemetry, FeeOracle, MintQuoter, MintSubmitter, PoolReader, TradeSubmitter};
use crate::types::{fp18, fp18_to_f64, u256_to_f64, CycleInfo, ExecError, PriceQuote, RejectReason, PPM};
use alloy::primitives::U256;
use anyhow::{Context, Result};
use backoff::BackoffPolicy;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Loop phase, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Idle,
    Quoting,
    Gating,
    Slicing,
    Executing,
    Settling,
    Backoff,
    Cooldown,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Quoting => "quoting",
            LoopState::Gating => "gating",
            LoopState::Slicing => "slicing",
            LoopState::Executing => "executing",
            LoopState::Settling => "settling",
            LoopState::Backoff => "backoff",
            LoopState::Cooldown => "cooldown",
        };
        write!(f, "{}", s)
    }
}

/// What one cycle did, which decides the wait before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing actionable (rejected, no inventory, settlement pending)
    Idle,
    /// Sold inventory and settled
    Completed { sold: U256, received: U256 },
    /// Transient collaborator failure; retry at the normal poll interval
    Transient,
    /// Hard failure; enter backoff
    HardFailure,
}

/// A trade submitted but not yet confirmed. Re-polled at the top of every
/// cycle; the ledger is only debited once the receipt lands.
struct PendingSettlement {
    id: String,
}

/// External collaborators the loop drives. Live chain adapters and the sim
/// implement the same traits.
pub struct Collaborators {
    pub pool: Arc<dyn PoolReader>,
    pub fees: Arc<dyn FeeOracle>,
    pub mint_quoter: Arc<dyn MintQuoter>,
    pub trades: Arc<dyn TradeSubmitter>,
    pub mints: Arc<dyn MintSubmitter>,
    pub telemetry: Arc<dyn CycleTelemetry>,
}

pub struct ControlLoop {
    cfg: BotConfig,
    oracle: Arc<PriceOracle>,
    gate: AdmissionGate,
    store: Arc<dyn LedgerStore>,
    ledger: LedgerState,
    ext: Collaborators,
    backoff: BackoffPolicy,
    pending: Option<PendingSettlement>,
    state: LoopState,
}

impl ControlLoop {
    /// Loads the ledger and wires the loop. A corrupt ledger file is fatal
    /// here so the process halts before any trading.
    pub fn new(
        cfg: BotConfig,
        ext: Collaborators,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self> {
        let ledger = store.load().context("loading ledger at startup")?;
        info!(
            inventory_fct = fp18_to_f64(ledger.inventory_fct),
            wac_eth = fp18_to_f64(ledger.wac_eth_per_fct_fp18),
            "ledger loaded"
        );
        let oracle = Arc::new(PriceOracle::new(ext.pool.clone(), cfg.quote_lookback));
        Ok(Self {
            gate: AdmissionGate::new(&cfg),
            backoff: BackoffPolicy::new(cfg.poll_interval, cfg.backoff_ceiling),
            oracle,
            store,
            ledger,
            ext,
            cfg,
            pending: None,
            state: LoopState::Idle,
        })
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn oracle(&self) -> Arc<PriceOracle> {
        self.oracle.clone()
    }

    fn enter(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "state");
            self.state = next;
        }
    }

    /// Runs until the shutdown signal flips. One cycle at a time; the signal
    /// is only honored between cycles.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(poll_secs = self.cfg.poll_interval.as_secs(), "control loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let outcome = self.run_cycle().await;
            let wait = match outcome {
                CycleOutcome::Completed { sold, received } => {
                    info!(
                        sold_fct = fp18_to_f64(sold),
                        received_eth = fp18_to_f64(received),
                        "cycle completed"
                    );
                    self.backoff.reset();
                    self.cfg.poll_interval
                }
                CycleOutcome::Idle | CycleOutcome::Transient => self.cfg.poll_interval,
                CycleOutcome::HardFailure => {
                    if self.cfg.stop_on_failure {
                        anyhow::bail!("hard cycle failure with stop_on_failure set");
                    }
                    self.enter(LoopState::Backoff);
                    let delay = self.backoff.next_delay();
                    warn!(delay_secs = delay.as_secs(), "backing off");
                    delay
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {}
            }
        }
        info!("control loop stopped");
        Ok(())
    }

    /// One full decision cycle. Public for tests; `run` is the production
    /// driver.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.enter(LoopState::Idle);

        // Outstanding settlement blocks everything else
        match self.reconcile_pending().await {
            Ok(true) => {}
            Ok(false) => return CycleOutcome::Idle,
            Err(outcome) => return outcome,
        }

        self.enter(LoopState::Quoting);
        if let Err(e) = self.oracle.warm().await {
            // Window warm failures fall through to the reserve read
            debug!(error = %e, "oracle warm failed");
        }
        let market = match self.oracle.smoothed_quote().await {
            Ok(q) => q,
            Err(e) => {
                warn!(error = %e, "no market quote this cycle");
                return CycleOutcome::Transient;
            }
        };
        debug!(
            price_eth = fp18_to_f64(market.value_fp18),
            source = %market.source,
            "market quote"
        );

        let fee = match self.call_fee().await {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "fee oracle unavailable");
                return CycleOutcome::Transient;
            }
        };
        let rate = match self.call_mint_rate().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "mint rate unavailable");
                return CycleOutcome::Transient;
            }
        };
        let cycle = self.call_telemetry().await;
        let est = mint::estimate(self.cfg.mint_size_kb, fee, self.cfg.gas_multiplier_ppm, rate);

        self.enter(LoopState::Gating);
        let decision = self.gate.evaluate(&GateInputs {
            market: &market,
            ledger: &self.ledger,
            mint_cost: &est,
            fee_level_wei: fee,
            cycle: &cycle,
        });
        let decision = if !decision.accept
            && decision.rejected_only_for(&[RejectReason::FeeOutOfWindow])
        {
            self.wait_for_fee_window(&market, &est, &cycle).await
        } else {
            decision
        };
        if !decision.accept {
            let reasons: Vec<String> = decision.reasons.iter().map(|r| r.to_string()).collect();
            if decision.reasons.contains(&RejectReason::CooldownActive) {
                self.enter(LoopState::Cooldown);
            }
            info!(reasons = ?reasons, "cycle rejected");
            return CycleOutcome::Idle;
        }

        if self.cfg.mint_enabled {
            if let Some(outcome) = self.run_mint().await {
                return outcome;
            }
        }

        self.enter(LoopState::Slicing);
        let chunk = (self.ledger.inventory_fct * U256::from(self.cfg.chunk_ppm)
            / U256::from(PPM))
        .min(self.ledger.inventory_fct);
        if chunk < self.cfg.min_trade_fct {
            debug!(chunk_fct = fp18_to_f64(chunk), "chunk below minimum trade");
            return CycleOutcome::Idle;
        }
        let snapshot = match self.ext.pool.get_reserves().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "reserve read for slicing failed");
                return CycleOutcome::Transient;
            }
        };
        let plan = slicer::plan(
            chunk,
            snapshot.reserve_token,
            snapshot.reserve_base,
            self.cfg.max_slippage_bps,
            self.cfg.min_out_safety_bps,
        );
        if plan.is_empty() {
            return CycleOutcome::Idle;
        }
        info!(
            slices = plan.slices.len(),
            total_fct = fp18_to_f64(plan.total_in()),
            min_out_eth = fp18_to_f64(plan.total_min_out()),
            "sell plan ready"
        );

        self.enter(LoopState::Executing);
        self.execute_plan(plan).await
    }

    /// Re-polls an outstanding trade. Returns `Ok(true)` when the loop may
    /// proceed, `Ok(false)` when still blocked.
    async fn reconcile_pending(&mut self) -> Result<bool, CycleOutcome> {
        let id = match &self.pending {
            Some(p) => p.id.clone(),
            None => return Ok(true),
        };
        self.enter(LoopState::Settling);
        debug!(%id, "re-polling deferred settlement");
        match self.ext.trades.poll_receipt(&id).await {
            Ok(Some(receipt)) => {
                self.pending = None;
                if let Err(out) = self.settle(receipt.amount_in, receipt.amount_out) {
                    return Err(out);
                }
                // A deferred sale is still a realized outcome for the
                // weak-edge cooldown
                self.record_realized_edge(receipt.amount_in, receipt.amount_out);
                info!(id = %receipt.id, "deferred settlement applied");
                Ok(true)
            }
            Ok(None) => {
                info!(%id, "trade still unconfirmed, holding");
                Ok(false)
            }
            Err(ExecError::Revert(reason)) => {
                // Nothing landed on-chain; the inventory was never debited
                warn!(%id, %reason, "deferred trade reverted, dropping");
                self.pending = None;
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "settlement poll failed");
                Err(CycleOutcome::Transient)
            }
        }
    }

    /// Debits the ledger for a confirmed sell and persists it.
    fn settle(&mut self, amount_in: U256, amount_out: U256) -> Result<(), CycleOutcome> {
        if amount_in.is_zero() {
            return Ok(());
        }
        let avg_price = amount_out * fp18() / amount_in;
        let pnl = self.ledger.realized_pnl(avg_price, amount_in);
        if let Err(e) = self.ledger.apply_sell(amount_in) {
            // Ledger refuses the debit: accounting is out of sync with the
            // chain, which is a hard stop condition
            error!(error = %e, "settlement exceeds ledger inventory");
            return Err(CycleOutcome::HardFailure);
        }
        if let Err(e) = self.store.save(&self.ledger) {
            error!(error = %e, "ledger persist failed");
            return Err(CycleOutcome::HardFailure);
        }
        info!(
            sold_fct = fp18_to_f64(amount_in),
            received_eth = fp18_to_f64(amount_out),
            pnl_eth = pnl.to_string(),
            "sell settled"
        );
        Ok(())
    }

    /// Submits the accepted mint and folds it into the cost basis. Returns
    /// an outcome only when the cycle must stop here.
    async fn run_mint(&mut self) -> Option<CycleOutcome> {
        let size_bytes = self.cfg.mint_size_kb as u64 * 1024;
        match self.ext.mints.submit_mint(size_bytes).await {
            Ok(outcome) => {
                info!(
                    minted_fct = fp18_to_f64(outcome.quantity_minted),
                    burned_eth = fp18_to_f64(outcome.cost_paid),
                    "mint confirmed"
                );
                self.ledger
                    .apply_mint(outcome.quantity_minted, outcome.cost_paid);
                if let Err(e) = self.store.save(&self.ledger) {
                    error!(error = %e, "ledger persist failed after mint");
                    return Some(CycleOutcome::HardFailure);
                }
                None
            }
            Err(ExecError::Transient(reason)) => {
                warn!(%reason, "mint submission transient failure");
                Some(CycleOutcome::Transient)
            }
            Err(ExecError::InsufficientFunds { have, need }) => {
                warn!(
                    have_eth = fp18_to_f64(have),
                    need_eth = fp18_to_f64(need),
                    "insufficient funds for mint"
                );
                Some(CycleOutcome::Idle)
            }
            Err(e) => {
                error!(error = %e, "mint submission failed");
                Some(CycleOutcome::HardFailure)
            }
        }
    }

    /// Submits the plan slice by slice, settling each receipt as it lands.
    async fn execute_plan(&mut self, plan: crate::types::OrderPlan) -> CycleOutcome {
        let mut sold = U256::ZERO;
        let mut received = U256::ZERO;

        for (amount, min_out) in plan.slices.iter().zip(plan.min_out_per_slice.iter()) {
            match self.ext.trades.submit_trade(*amount, *min_out).await {
                Ok(receipt) => {
                    if let Err(out) = self.settle(receipt.amount_in, receipt.amount_out) {
                        return out;
                    }
                    sold += receipt.amount_in;
                    received += receipt.amount_out;
                }
                Err(ExecError::ReceiptTimeout { id }) => {
                    warn!(%id, "receipt wait timed out, deferring settlement");
                    self.pending = Some(PendingSettlement { id });
                    break;
                }
                Err(ExecError::Transient(reason)) => {
                    warn!(%reason, "trade submission transient failure");
                    break;
                }
                Err(ExecError::InsufficientFunds { have, need }) => {
                    warn!(
                        have = u256_to_f64(have),
                        need = u256_to_f64(need),
                        "insufficient funds for trade"
                    );
                    break;
                }
                Err(ExecError::Revert(reason)) => {
                    error!(%reason, "trade reverted");
                    return CycleOutcome::HardFailure;
                }
            }
        }

        if sold.is_zero() {
            return CycleOutcome::Idle;
        }

        self.enter(LoopState::Settling);
        self.record_realized_edge(sold, received);

        CycleOutcome::Completed { sold, received }
    }

    /// Feeds the realized edge of a settled sale (cycle aggregate or a
    /// deferred receipt) into the weak-edge cooldown.
    fn record_realized_edge(&mut self, amount_in: U256, amount_out: U256) {
        if amount_in.is_zero() {
            return;
        }
        let avg_price = amount_out * fp18() / amount_in;
        let wac = self.ledger.wac_eth_per_fct_fp18;
        let edge = if avg_price >= wac {
            i128::try_from(avg_price - wac).unwrap_or(i128::MAX)
        } else {
            i128::try_from(wac - avg_price).map_or(i128::MIN, |v| -v)
        };
        self.gate.record_edge(edge);
    }

    /// The fee window is the one criterion worth waiting out inside a cycle:
    /// fees move on block cadence. Bounded by the configured budget.
    ///
    /// Re-checks inside the wait go through the streak-free `check` so a
    /// single cycle's polling cannot masquerade as many reject cycles and
    /// unwind the relaxation thresholds. Only when the fee re-enters the
    /// window is the decision committed through `evaluate`.
    async fn wait_for_fee_window(
        &mut self,
        market: &PriceQuote,
        est: &mint::MintEstimate,
        cycle: &CycleInfo,
    ) -> crate::types::GateDecision {
        let deadline = Instant::now() + self.cfg.fee_wait_budget;
        info!(
            budget_secs = self.cfg.fee_wait_budget.as_secs(),
            "fee out of window, waiting"
        );
        let mut last = crate::types::GateDecision::rejected(vec![RejectReason::FeeOutOfWindow]);
        while Instant::now() < deadline {
            tokio::time::sleep(self.cfg.fee_check_interval.min(
                deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(1)),
            ))
            .await;
            let fee = match self.call_fee().await {
                Ok(f) => f,
                Err(e) => {
                    debug!(error = %e, "fee re-check failed");
                    continue;
                }
            };
            let retry_inputs = GateInputs {
                market,
                ledger: &self.ledger,
                mint_cost: est,
                fee_level_wei: fee,
                cycle,
            };
            last = self.gate.check(&retry_inputs);
            if last.accept {
                // Commit the accepting decision (resets the reject streak)
                return self.gate.evaluate(&retry_inputs);
            }
            if !last.rejected_only_for(&[RejectReason::FeeOutOfWindow]) {
                return last;
            }
        }
        info!("fee wait budget exhausted");
        last
    }

    async fn call_fee(&self) -> Result<U256> {
        tokio::time::timeout(self.cfg.call_timeout, self.ext.fees.current_fee_level())
            .await
            .context("fee oracle timed out")?
    }

    async fn call_mint_rate(&self) -> Result<U256> {
        tokio::time::timeout(self.cfg.call_timeout, self.ext.mint_quoter.quote_mint_rate())
            .await
            .context("mint quoter timed out")?
    }

    /// Telemetry is best-effort: on failure the gate's cycle criteria pass
    /// open rather than blocking trading.
    async fn call_telemetry(&self) -> CycleInfo {
        match tokio::time::timeout(self.cfg.call_timeout, self.ext.telemetry.cycle_info()).await {
            Ok(Ok(info)) => info,
            Ok(Err(e)) => {
                debug!(error = %e, "cycle telemetry unavailable");
                CycleInfo::default()
            }
            Err(_) => {
                debug!("cycle telemetry timed out");
                CycleInfo::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FileLedgerStore;
    use crate::sim::{SimChain, SimParams};
    use crate::types::fp18;

    fn test_cfg(ledger_path: &std::path::Path) -> BotConfig {
        let mut cfg = BotConfig::default();
        cfg.ledger_path = ledger_path.to_string_lossy().into_owned();
        cfg.fee_wait_budget = Duration::from_millis(10);
        cfg.fee_check_interval = Duration::from_millis(5);
        cfg
    }

    fn temp_ledger(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("fct-engine-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("ledger.json")
    }

    /// Pool deep enough that the default chunk fits a handful of slices,
    /// market far above cost so the gate accepts.
    fn profitable_params() -> SimParams {
        SimParams {
            reserve_fct: U256::from(1_000_000u64) * fp18(),
            reserve_eth: U256::from(100_000u64) * fp18(), // 0.1 ETH per FCT
            fee_wei: U256::from(1_000_000_000u64),        // 1 gwei
            // At 1 gwei base fee this mints at far below market
            mint_rate_fp18: U256::from(500_000u64) * fp18(),
        }
    }

    fn seeded_loop_with(
        tag: &str,
        params: SimParams,
        cfg: BotConfig,
    ) -> (ControlLoop, Arc<SimChain>) {
        let path = temp_ledger(tag);
        let _ = std::fs::remove_file(&path);
        let mut cfg = cfg;
        cfg.ledger_path = path.to_string_lossy().into_owned();
        let chain = Arc::new(SimChain::new(params, cfg.gas_multiplier_ppm));
        let store = Arc::new(FileLedgerStore::new(&path));

        // Seed inventory with a cheap cost basis
        let mut ledger = LedgerState::default();
        ledger.apply_mint(U256::from(10_000u64) * fp18(), U256::from(10u64) * fp18());
        store.save(&ledger).unwrap();

        let lp = ControlLoop::new(cfg, chain.collaborators(), store).unwrap();
        (lp, chain)
    }

    fn seeded_loop(tag: &str, params: SimParams) -> (ControlLoop, Arc<SimChain>) {
        let path = temp_ledger(tag);
        seeded_loop_with(tag, params, test_cfg(&path))
    }

    #[tokio::test]
    async fn test_accepted_cycle_mints_and_sells() {
        let (mut lp, chain) = seeded_loop("accept", profitable_params());
        let before = lp.ledger().clone();

        let outcome = lp.run_cycle().await;
        let (sold, received) = match outcome {
            CycleOutcome::Completed { sold, received } => (sold, received),
            other => panic!("unexpected outcome {:?}", other),
        };
        assert!(!sold.is_zero());
        assert!(!received.is_zero());

        // Mint credited first, then the 20% chunk of the grown inventory sold
        let minted = chain.minted_total();
        assert!(!minted.is_zero());
        let expected_inventory = before.inventory_fct + minted - sold;
        assert_eq!(lp.ledger().inventory_fct, expected_inventory);

        // Pool reserves moved by exactly the sold amount
        let (fct, _eth) = chain.reserves();
        assert_eq!(fct, profitable_params().reserve_fct + sold);
    }

    #[tokio::test]
    async fn test_rejected_cycle_touches_nothing() {
        let mut params = profitable_params();
        // Market at cost: no discount, no edge
        params.mint_rate_fp18 = U256::from(1u64) * fp18();
        let (mut lp, chain) = seeded_loop("reject", params);
        let before = lp.ledger().clone();

        assert_eq!(lp.run_cycle().await, CycleOutcome::Idle);
        assert_eq!(lp.ledger(), &before);
        assert!(chain.minted_total().is_zero());
    }

    #[tokio::test]
    async fn test_deferred_settlement_applies_exactly_once() {
        let (mut lp, chain) = seeded_loop("defer", profitable_params());
        chain.timeout_next_trade();

        // First cycle: mint lands, first slice times out, settlement deferred
        assert_eq!(lp.run_cycle().await, CycleOutcome::Idle);
        let minted = chain.minted_total();
        let after_first = lp.ledger().clone();
        // Inventory grew by the mint and nothing was debited yet
        assert_eq!(
            after_first.inventory_fct,
            U256::from(10_000u64) * fp18() + minted
        );

        // Second cycle: reconciles the receipt, debits once, then proceeds
        let outcome = lp.run_cycle().await;
        let deferred = chain.last_settled_amount();
        assert!(!deferred.is_zero());
        match outcome {
            CycleOutcome::Completed { sold, .. } => {
                assert_eq!(
                    lp.ledger().inventory_fct,
                    after_first.inventory_fct + chain.minted_total() - minted - deferred - sold
                );
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fee_wait_rejects_when_fee_stays_out() {
        let path = temp_ledger("fee-stuck");
        let mut cfg = test_cfg(&path);
        cfg.fee_max_wei = Some(U256::from(10_000_000_000u64)); // 10 gwei ceiling
        cfg.fee_wait_budget = Duration::from_millis(100);
        cfg.fee_check_interval = Duration::from_millis(5);

        let mut params = profitable_params();
        params.fee_wei = U256::from(13_000_000_000u64); // 30% over, stays there
        let (mut lp, chain) = seeded_loop_with("fee-stuck", params, cfg);
        let before = lp.ledger().clone();

        // Dozens of in-cycle re-checks must not widen the window enough to
        // admit the fee; the cycle ends rejected with nothing executed
        assert_eq!(lp.run_cycle().await, CycleOutcome::Idle);
        assert_eq!(lp.ledger(), &before);
        assert!(chain.minted_total().is_zero());
    }

    #[tokio::test]
    async fn test_fee_wait_recovers_when_fee_reenters() {
        let path = temp_ledger("fee-recover");
        let mut cfg = test_cfg(&path);
        cfg.fee_max_wei = Some(U256::from(10_000_000_000u64));
        cfg.fee_wait_budget = Duration::from_millis(500);
        cfg.fee_check_interval = Duration::from_millis(10);

        let mut params = profitable_params();
        params.fee_wei = U256::from(13_000_000_000u64);
        let (mut lp, chain) = seeded_loop_with("fee-recover", params, cfg);

        // Fee drops back into the window mid-wait
        let mover = chain.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            mover.set_fee(U256::from(8_000_000_000u64));
        });

        assert!(matches!(
            lp.run_cycle().await,
            CycleOutcome::Completed { .. }
        ));
        assert!(!chain.minted_total().is_zero());
    }

    #[tokio::test]
    async fn test_deferred_settlements_feed_cooldown() {
        let path = temp_ledger("defer-weak");
        let mut cfg = test_cfg(&path);
        // Every realized edge counts as weak
        cfg.edge_warn_fp18 = U256::from(1u64) * fp18();
        let (mut lp, chain) = seeded_loop_with("defer-weak", profitable_params(), cfg);

        // Three cycles in a row: mint lands, the sell's receipt times out,
        // and the next cycle's reconciliation settles it as a weak edge
        for _ in 0..3 {
            chain.timeout_next_trade();
            assert_eq!(lp.run_cycle().await, CycleOutcome::Idle);
        }
        let minted_after_three = chain.minted_total();

        // Fourth cycle settles the third weak edge, arming the cooldown
        // before gating; no new mint happens
        assert_eq!(lp.run_cycle().await, CycleOutcome::Idle);
        assert_eq!(chain.minted_total(), minted_after_three);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_back_off() {
        let (mut lp, chain) = seeded_loop("transient", profitable_params());
        chain.fail_fee_oracle(true);
        assert_eq!(lp.run_cycle().await, CycleOutcome::Transient);
        chain.fail_fee_oracle(false);
        assert!(matches!(
            lp.run_cycle().await,
            CycleOutcome::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_corrupt_ledger_halts_startup() {
        let path = temp_ledger("corrupt");
        std::fs::write(&path, "{broken").unwrap();
        let cfg = test_cfg(&path);
        let chain = Arc::new(SimChain::new(profitable_params(), cfg.gas_multiplier_ppm));
        let store = Arc::new(FileLedgerStore::new(&path));
        assert!(ControlLoop::new(cfg, chain.collaborators(), store).is_err());
    }
}
