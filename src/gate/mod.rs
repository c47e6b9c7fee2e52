//! Admission gate
//!
//! One evaluation per cycle, answering "should this cycle mint and sell".
//! All criteria are checked and every failing one is reported, so a single
//! log line explains the full rejection instead of just the first miss.
//! Threshold comparisons are integer fixed-point (ppm), never floats.

pub mod cooldown;

use crate::config::BotConfig;
use crate::ledger::LedgerState;
use crate::mint::MintEstimate;
use crate::types::{CycleInfo, GateDecision, PriceQuote, RejectReason, PPM};
use alloy::primitives::U256;
use cooldown::EdgeCooldown;
use tracing::{debug, info};

/// Everything one admission decision looks at. The market quote is the
/// oracle's EMA-smoothed price; raw reserves never reach the gate.
pub struct GateInputs<'a> {
    pub market: &'a PriceQuote,
    pub ledger: &'a LedgerState,
    pub mint_cost: &'a MintEstimate,
    /// Current L1 fee in wei per gas
    pub fee_level_wei: U256,
    pub cycle: &'a CycleInfo,
}

/// Reasons eligible for threshold relaxation. Profitability, discount, and
/// cooldown are never relaxed.
const RELAXABLE: [RejectReason; 2] = [
    RejectReason::EfficiencyBelowFloor,
    RejectReason::FeeOutOfWindow,
];

pub struct AdmissionGate {
    cfg: BotConfig,
    cooldown: EdgeCooldown,
    /// Consecutive rejects caused solely by relaxable thresholds
    relax_streak: u32,
}

impl AdmissionGate {
    pub fn new(cfg: &BotConfig) -> Self {
        let warn = i128::try_from(cfg.edge_warn_fp18).unwrap_or(i128::MAX);
        Self {
            cooldown: EdgeCooldown::new(warn, cfg.cooldown),
            relax_streak: 0,
            cfg: cfg.clone(),
        }
    }

    /// Current relaxation applied to the efficiency floor and fee ceiling,
    /// in percent.
    pub fn relax_percent(&self) -> u64 {
        if self.relax_streak < self.cfg.relax_after_cycles {
            return 0;
        }
        let extra = (self.relax_streak - self.cfg.relax_after_cycles) as u64 + 1;
        (extra * self.cfg.relax_step_percent).min(self.cfg.relax_cap_percent)
    }

    /// Feeds the realized edge of a settled cycle into the cooldown tracker.
    pub fn record_edge(&mut self, edge_wei: i128) {
        self.cooldown.record_edge(edge_wei);
    }

    /// Runs all admission criteria without touching the relaxation streak.
    /// Safe to call any number of times within a cycle (fee re-checks).
    pub fn check(&self, inputs: &GateInputs) -> GateDecision {
        let relax = self.relax_percent();
        let mut reasons = Vec::new();

        self.check_inventory(inputs, &mut reasons);
        self.check_take_profit(inputs, &mut reasons);
        self.check_mint_edge(inputs, &mut reasons);
        self.check_efficiency(inputs, relax, &mut reasons);
        self.check_fee_window(inputs, relax, &mut reasons);
        self.check_cycle_timing(inputs, &mut reasons);
        if self.cooldown.is_active() {
            reasons.push(RejectReason::CooldownActive);
        }

        if reasons.is_empty() {
            GateDecision::accepted()
        } else {
            GateDecision::rejected(reasons)
        }
    }

    /// Evaluates the criteria and updates the relaxation streak. Call at
    /// most once per control-loop cycle; the streak counts cycles, not
    /// checks.
    pub fn evaluate(&mut self, inputs: &GateInputs) -> GateDecision {
        let relax = self.relax_percent();
        let decision = self.check(inputs);

        if decision.accept {
            self.relax_streak = 0;
            info!(relax_percent = relax, "gate accepted");
        } else if decision.rejected_only_for(&RELAXABLE) {
            self.relax_streak += 1;
            debug!(
                streak = self.relax_streak,
                relax_percent = relax,
                "reject driven by relaxable thresholds"
            );
        } else {
            self.relax_streak = 0;
        }
        decision
    }

    fn check_inventory(&self, inputs: &GateInputs, reasons: &mut Vec<RejectReason>) {
        if inputs.ledger.inventory_fct < self.cfg.min_trade_fct {
            reasons.push(RejectReason::NoInventory);
        }
    }

    /// Sell trigger: `price * 1e6 >= wac * (1e6 + take_profit_ppm)`, exact
    /// integer compare. A zero WAC (costless inventory) always passes.
    fn check_take_profit(&self, inputs: &GateInputs, reasons: &mut Vec<RejectReason>) {
        let wac = inputs.ledger.wac_eth_per_fct_fp18;
        if wac.is_zero() {
            return;
        }
        let lhs = inputs.market.value_fp18 * U256::from(PPM);
        let rhs = wac * U256::from(PPM + self.cfg.take_profit_ppm);
        if lhs < rhs {
            reasons.push(RejectReason::BelowTakeProfit);
        }
    }

    /// Mint-side economics: the cost per FCT must sit at least
    /// `target_discount` below market AND leave an absolute edge worth the
    /// execution risk.
    fn check_mint_edge(&self, inputs: &GateInputs, reasons: &mut Vec<RejectReason>) {
        let market = inputs.market.value_fp18;
        let cost = inputs.mint_cost.cost_per_fct_fp18;

        let lhs = cost * U256::from(PPM);
        let rhs = market * U256::from(PPM - self.cfg.target_discount_ppm);
        if lhs > rhs {
            reasons.push(RejectReason::InsufficientDiscount);
        }
        if market.saturating_sub(cost) < self.cfg.min_abs_edge_fp18 {
            reasons.push(RejectReason::EdgeTooSmall);
        }
    }

    /// No configured floor means no efficiency criterion at all; the fixed
    /// 21k execution overhead already bounds what any mint can reach.
    fn check_efficiency(&self, inputs: &GateInputs, relax: u64, reasons: &mut Vec<RejectReason>) {
        let floor = match self.cfg.efficiency_floor_ppm {
            Some(f) => f * (100 - relax.min(100)) / 100,
            None => return,
        };
        if inputs.mint_cost.efficiency_ppm < floor {
            reasons.push(RejectReason::EfficiencyBelowFloor);
        }
    }

    /// Fee window. Relaxation widens the window: the ceiling rises and the
    /// floor drops by the relax percentage.
    fn check_fee_window(&self, inputs: &GateInputs, relax: u64, reasons: &mut Vec<RejectReason>) {
        let fee = inputs.fee_level_wei;
        if let Some(min) = self.cfg.fee_min_wei {
            let eff_min = min * U256::from(100 - relax.min(100)) / U256::from(100u64);
            if fee < eff_min {
                reasons.push(RejectReason::FeeOutOfWindow);
                return;
            }
        }
        if let Some(max) = self.cfg.fee_max_wei {
            let eff_max = max * U256::from(100 + relax) / U256::from(100u64);
            if fee > eff_max {
                reasons.push(RejectReason::FeeOutOfWindow);
            }
        }
    }

    /// Issuance-cycle timing. Missing telemetry fields pass open; a criterion
    /// only fires on data that is actually present.
    fn check_cycle_timing(&self, inputs: &GateInputs, reasons: &mut Vec<RejectReason>) {
        let progress = match inputs.cycle.progress_ppm {
            Some(p) => p,
            None => return,
        };
        let blocks_left = inputs.cycle.blocks_left;

        if progress >= self.cfg.near_cap_ppm {
            // Cycle almost saturated: marginal mint rate collapses
            reasons.push(RejectReason::CycleNearCap);
            return;
        }
        if let Some(left) = blocks_left {
            if left < self.cfg.end_window_blocks && progress < self.cfg.weak_progress_ppm {
                // Late and undersubscribed: next cycle will price better
                reasons.push(RejectReason::CycleLateWeak);
                return;
            }
        }
        let early_ok = progress <= self.cfg.max_progress_ppm
            && blocks_left.map_or(true, |left| left >= self.cfg.min_blocks_left);
        if !early_ok {
            reasons.push(RejectReason::CycleNotEarly);
        }
    }
}
