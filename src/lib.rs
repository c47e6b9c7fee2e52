//! FCT autotrader
//!
//! Decision-and-accounting engine for a mine-and-sell strategy: mint FCT by
//! burning L1 gas when it is cheap relative to market, hold it in a
//! persisted cost-basis ledger, and sell chunks against a constant-product
//! pool once price clears the profitability bar. Wallet custody, signing,
//! and the RPC client live behind the `traits` seams.

pub mod config;
pub mod engine;
pub mod gate;
pub mod ledger;
pub mod mint;
pub mod oracle;
pub mod pool;
pub mod sim;
pub mod slicer;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use config::{load_config, BotConfig};
pub use engine::{Collaborators, ControlLoop, CycleOutcome};
pub use gate::{AdmissionGate, GateInputs};
pub use ledger::{FileLedgerStore, LedgerState, LedgerStore};
pub use oracle::PriceOracle;
pub use types::{GateDecision, OrderPlan, PriceQuote, RejectReason};
