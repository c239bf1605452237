use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::MIN_CLUSTER;
use crate::error::{EngineError, EngineResult};
use crate::weights::WeightTable;

pub const DEFAULT_TARGET_RTP: f64 = 96.34;
pub const MAX_CASCADES: u32 = 10;
pub const FREE_SPINS_AWARD: u32 = 10;
pub const CLOVER_MULTIPLIER: f64 = 2.0;

/// Tunables of the engine. Every field has a default, so a JSON file only
/// needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub target_rtp: f64,
    /// Weights at 90% RTP.
    pub low_weights: WeightTable,
    /// Weights at 99% RTP.
    pub high_weights: WeightTable,
    pub min_cluster: usize,
    /// Hard cap on cluster evaluations per spin.
    pub max_cascades: u32,
    /// Cluster win = cells * bet * factor * multiplier.
    pub cluster_pay_factor: f64,
    /// Credit per cell picked by the three-scatter luck bonus, times bet.
    pub luck_credit_factor: f64,
    /// Pot credit per paying cell on the board, times bet.
    pub pot_credit_factor: f64,
    pub free_spins_award: u32,
    pub clover_multiplier: f64,
    /// Free and auto spins chained onto one `spin` call at most.
    pub max_chained_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_rtp: DEFAULT_TARGET_RTP,
            low_weights: WeightTable::low(),
            high_weights: WeightTable::high(),
            min_cluster: MIN_CLUSTER,
            max_cascades: MAX_CASCADES,
            cluster_pay_factor: 0.2,
            luck_credit_factor: 0.25,
            pot_credit_factor: 0.05,
            free_spins_award: FREE_SPINS_AWARD,
            clover_multiplier: CLOVER_MULTIPLIER,
            max_chained_rounds: 1_000,
        }
    }
}

impl EngineConfig {
    /// Uses `table` at both ends of the RTP range, so RTP has no effect.
    pub fn with_fixed_weights(table: WeightTable) -> Self {
        Self {
            low_weights: table,
            high_weights: table,
            ..Self::default()
        }
    }

    pub fn with_target_rtp(mut self, target_rtp: f64) -> Self {
        self.target_rtp = target_rtp;
        self
    }

    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::Configuration(format!("invalid engine config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Weights for the configured target RTP.
    pub fn weight_table(&self) -> WeightTable {
        self.weight_table_for(self.target_rtp)
    }

    pub fn weight_table_for(&self, target_rtp: f64) -> WeightTable {
        WeightTable::for_rtp(target_rtp, &self.low_weights, &self.high_weights)
    }

    /// Out-of-range RTP is not checked here: it is clamped when used.
    pub fn validate(&self) -> EngineResult<()> {
        self.low_weights.validate()?;
        self.high_weights.validate()?;
        if self.min_cluster == 0 {
            return Err(EngineError::Configuration("min_cluster must be positive".into()));
        }
        if self.max_cascades == 0 {
            return Err(EngineError::Configuration("max_cascades must be positive".into()));
        }
        let factors = [
            ("cluster_pay_factor", self.cluster_pay_factor),
            ("luck_credit_factor", self.luck_credit_factor),
            ("pot_credit_factor", self.pot_credit_factor),
        ];
        for (name, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !self.clover_multiplier.is_finite() || self.clover_multiplier < 1.0 {
            return Err(EngineError::Configuration(format!(
                "clover_multiplier must be at least 1, got {}",
                self.clover_multiplier
            )));
        }
        Ok(())
    }
}
