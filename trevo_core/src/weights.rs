use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::rng::SpinRng;
use crate::symbols::Symbol;

pub const MIN_TARGET_RTP: f64 = 90.0;
pub const MAX_TARGET_RTP: f64 = 99.0;

/// Weights at the 90% end of the RTP range, in `Symbol::ALL` order.
pub const LOW_WEIGHTS: [u32; Symbol::COUNT] = [20, 20, 20, 20, 3, 55, 1, 2, 2];

/// Weights at the 99% end of the RTP range, in `Symbol::ALL` order.
pub const HIGH_WEIGHTS: [u32; Symbol::COUNT] = [23, 21, 19, 17, 3, 53, 1, 2, 2];

/// Per-symbol integer sampling weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTable {
    weights: [u32; Symbol::COUNT],
}

impl WeightTable {
    pub fn new(weights: [u32; Symbol::COUNT]) -> EngineResult<Self> {
        let table = Self { weights };
        table.validate()?;
        Ok(table)
    }

    pub fn low() -> Self {
        Self {
            weights: LOW_WEIGHTS,
        }
    }

    pub fn high() -> Self {
        Self {
            weights: HIGH_WEIGHTS,
        }
    }

    /// A table that only ever draws `symbol`.
    pub fn only(symbol: Symbol) -> Self {
        let mut weights = [0; Symbol::COUNT];
        weights[symbol.to_index() as usize] = 1;
        Self { weights }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.total() == 0 {
            return Err(EngineError::Configuration(
                "weight table must have a positive total".into(),
            ));
        }
        Ok(())
    }

    /// Interpolates between `low` and `high` for a target RTP percentage.
    ///
    /// The RTP is clamped to [90, 99]; NaN counts as 90. Each weight is
    /// rounded independently.
    pub fn for_rtp(target_rtp: f64, low: &WeightTable, high: &WeightTable) -> Self {
        let t = (clamp_rtp(target_rtp) - MIN_TARGET_RTP) / (MAX_TARGET_RTP - MIN_TARGET_RTP);
        let mut weights = [0u32; Symbol::COUNT];
        for (i, w) in weights.iter_mut().enumerate() {
            let lo = f64::from(low.weights[i]);
            let hi = f64::from(high.weights[i]);
            *w = (lo + (hi - lo) * t).round() as u32;
        }
        Self { weights }
    }

    pub fn weight(&self, symbol: Symbol) -> u32 {
        self.weights[symbol.to_index() as usize]
    }

    pub fn total(&self) -> u64 {
        self.weights.iter().map(|w| u64::from(*w)).sum()
    }

    pub fn entries(&self) -> [(Symbol, u32); Symbol::COUNT] {
        Symbol::ALL.map(|s| (s, self.weight(s)))
    }

    /// One weighted draw from `rng`.
    pub fn sample(&self, rng: &mut SpinRng) -> Symbol {
        // entries() is never empty
        rng.pick_weighted(&self.entries()).unwrap_or(Symbol::Pot)
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::low()
    }
}

pub fn clamp_rtp(target_rtp: f64) -> f64 {
    if target_rtp.is_nan() {
        return MIN_TARGET_RTP;
    }
    target_rtp.clamp(MIN_TARGET_RTP, MAX_TARGET_RTP)
}
