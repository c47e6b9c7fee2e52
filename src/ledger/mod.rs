//! Cost-basis ledger
//!
//! Tracks FCT inventory and its weighted-average cost (WAC) in ETH per FCT,
//! persisted as a small JSON file. Amounts are stored as decimal-string
//! integers so the file survives tooling that mangles large numbers.
//!
//! Single-writer discipline: exactly one process owns the ledger file. There
//! is no cross-process locking; running two instances against the same path
//! corrupts the cost basis.

use crate::types::fp18;
use alloy::primitives::{I256, U256};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The file exists but cannot be parsed. Callers must halt rather than
    /// start from zero and silently wipe the cost basis.
    #[error("corrupt ledger at {path}: {detail}")]
    CorruptLedger { path: PathBuf, detail: String },

    #[error("insufficient inventory: have {have} FCT-wei, need {need}")]
    InsufficientInventory { have: U256, need: U256 },

    #[error("ledger io: {0}")]
    Io(#[from] std::io::Error),
}

mod u256_dec {
    use alloy::primitives::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &U256, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse::<U256>()
            .map_err(|e| de::Error::custom(format!("bad U256 {:?}: {}", raw, e)))
    }
}

/// In-memory ledger state. All mutation goes through [`apply_mint`] and
/// [`apply_sell`] so the WAC invariants hold by construction.
///
/// [`apply_mint`]: LedgerState::apply_mint
/// [`apply_sell`]: LedgerState::apply_sell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    /// FCT-wei held
    #[serde(rename = "inventoryFCT", with = "u256_dec")]
    pub inventory_fct: U256,
    /// ETH-wei paid per FCT, 18-decimal fixed point
    #[serde(rename = "wacEthPerFCT", with = "u256_dec")]
    pub wac_eth_per_fct_fp18: U256,
}

impl LedgerState {
    /// Folds a confirmed mint into the weighted-average cost.
    ///
    /// `wac' = (inv * wac + cost * 1e18) / (inv + minted)`, computed in one
    /// division so the result does not depend on how an acquisition was split
    /// across transactions.
    pub fn apply_mint(&mut self, quantity_minted: U256, cost_paid: U256) {
        if quantity_minted.is_zero() {
            return;
        }
        let new_inventory = self.inventory_fct + quantity_minted;
        self.wac_eth_per_fct_fp18 = (self.inventory_fct * self.wac_eth_per_fct_fp18
            + cost_paid * fp18())
            / new_inventory;
        self.inventory_fct = new_inventory;
    }

    /// Removes sold quantity. WAC is untouched: selling everything keeps the
    /// last WAC on file so a later mint folds in against a sane basis.
    pub fn apply_sell(&mut self, quantity_sold: U256) -> Result<(), LedgerError> {
        if quantity_sold > self.inventory_fct {
            return Err(LedgerError::InsufficientInventory {
                have: self.inventory_fct,
                need: quantity_sold,
            });
        }
        self.inventory_fct -= quantity_sold;
        Ok(())
    }

    /// Realized profit of selling `qty` at `sale_price_fp18`, in ETH-wei.
    /// Derived on demand, never persisted.
    pub fn realized_pnl(&self, sale_price_fp18: U256, qty: U256) -> I256 {
        let (diff, negative) = if sale_price_fp18 >= self.wac_eth_per_fct_fp18 {
            (sale_price_fp18 - self.wac_eth_per_fct_fp18, false)
        } else {
            (self.wac_eth_per_fct_fp18 - sale_price_fp18, true)
        };
        let magnitude = I256::from_raw(diff * qty / fp18());
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Persistence seam. Lets the engine run against a file in production and an
/// in-memory store in tests.
pub trait LedgerStore: Send + Sync {
    fn load(&self) -> Result<LedgerState, LedgerError>;
    fn save(&self, state: &LedgerState) -> Result<(), LedgerError>;
}

/// JSON-file store with write-temp-then-rename atomicity.
pub struct FileLedgerStore {
    path: PathBuf,
}

impl FileLedgerStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl LedgerStore for FileLedgerStore {
    fn load(&self) -> Result<LedgerState, LedgerError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no ledger file, starting from zero state");
                return Ok(LedgerState::default());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw).map_err(|e| LedgerError::CorruptLedger {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    fn save(&self, state: &LedgerState) -> Result<(), LedgerError> {
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(state).map_err(|e| LedgerError::CorruptLedger {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        std::fs::write(&tmp, body)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!(error = %e, "ledger rename failed, removing temp file");
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(n: u64) -> U256 {
        U256::from(n) * fp18()
    }

    #[test]
    fn test_mint_sets_wac_from_zero() {
        let mut s = LedgerState::default();
        // 100 FCT for 1 ETH -> wac = 0.01 ETH/FCT
        s.apply_mint(eth(100), fp18());
        assert_eq!(s.inventory_fct, eth(100));
        assert_eq!(
            s.wac_eth_per_fct_fp18,
            U256::from(10_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_wac_split_invariance() {
        // One 300-for-3 mint equals three 100-for-1 mints
        let mut a = LedgerState::default();
        a.apply_mint(eth(300), eth(3));

        let mut b = LedgerState::default();
        b.apply_mint(eth(100), eth(1));
        b.apply_mint(eth(100), eth(1));
        b.apply_mint(eth(100), eth(1));

        assert_eq!(a.wac_eth_per_fct_fp18, b.wac_eth_per_fct_fp18);
        assert_eq!(a.inventory_fct, b.inventory_fct);
    }

    #[test]
    fn test_sell_guards_inventory_and_keeps_wac() {
        let mut s = LedgerState::default();
        s.apply_mint(eth(100), fp18());
        let wac = s.wac_eth_per_fct_fp18;

        assert!(matches!(
            s.apply_sell(eth(101)),
            Err(LedgerError::InsufficientInventory { .. })
        ));
        // Failed sell mutates nothing
        assert_eq!(s.inventory_fct, eth(100));

        s.apply_sell(eth(100)).unwrap();
        assert_eq!(s.inventory_fct, U256::ZERO);
        // Full sell preserves the last WAC
        assert_eq!(s.wac_eth_per_fct_fp18, wac);
    }

    #[test]
    fn test_realized_pnl_sign() {
        let mut s = LedgerState::default();
        s.apply_mint(eth(100), eth(1));

        // wac = 0.01; sell 100 FCT at 0.02 -> +1 ETH
        let gain = s.realized_pnl(U256::from(20_000_000_000_000_000u64), eth(100));
        assert_eq!(gain, I256::from_raw(fp18()));

        // sell 100 FCT at 0.005 -> -0.5 ETH
        let loss = s.realized_pnl(U256::from(5_000_000_000_000_000u64), eth(100));
        assert_eq!(loss, -I256::from_raw(fp18() / U256::from(2u64)));
    }

    #[test]
    fn test_file_round_trip_bit_identical() {
        let dir = std::env::temp_dir().join(format!("fct-ledger-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = FileLedgerStore::new(dir.join("ledger.json"));

        let mut s = LedgerState::default();
        s.apply_mint(
            U256::from(123_456_789u64) * fp18(),
            U256::from(987_654_321u64),
        );
        store.save(&s).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, s);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_zero_state() {
        let store = FileLedgerStore::new("/nonexistent-dir-xyz/ledger.json");
        // Missing parent dir surfaces as NotFound on read
        let s = store.load().unwrap();
        assert_eq!(s, LedgerState::default());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("fct-ledger-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileLedgerStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(LedgerError::CorruptLedger { .. })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
