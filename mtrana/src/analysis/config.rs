//! Analysis pass configuration.
//!
//! Every field has a default, so a JSON file only needs to list what differs.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use mtrcore::algorithm::decision::KeepPolicy;
use mtrcore::algorithm::resolve::PlaneConvention;
use mtrcore::data::hit_pattern::BENDING_CATHODE;
use mtrcore::efficiency::table::ValueCheck;

use crate::error::{Error, Result};

/// Settings of one analysis pass over a track sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // Sampling switch: without it every eligible track counts as kept
    pub apply_efficiencies: bool,

    // Random stream, None draws a seed from the operating system
    pub seed: Option<u64>,

    pub policy: KeepPolicy,
    pub plane_convention: PlaneConvention,

    // Efficiency text files: cathode number of the bending plane
    pub bending_cathode: u8,
    pub value_check: ValueCheck,

    // Output: drop rejected tracks instead of writing them unmarked
    pub drop_rejected: bool,

    // Worker threads of the parallel pass, 0 = all cores
    pub threads: usize,

    // Confidence level of the efficiency interval in the summary
    pub confidence_level: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            apply_efficiencies: true,
            seed: None,
            policy: KeepPolicy::default(),
            plane_convention: PlaneConvention::default(),
            bending_cathode: BENDING_CATHODE as u8,
            value_check: ValueCheck::default(),
            drop_rejected: false,
            threads: 1,
            confidence_level: 0.683,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = BufReader::new(File::open(path)?);
        let config: AnalysisConfig = serde_json::from_reader(f)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bending_cathode > 1 {
            return Err(Error::Config(format!("bending_cathode must be 0 or 1, got {}", self.bending_cathode)));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "confidence_level must be in (0, 1), got {}", self.confidence_level
            )));
        }
        Ok(())
    }

    /// seed in use: the configured one, or a fresh one from the operating system
    pub fn resolve_seed(&self) -> Result<u64> {
        match self.seed {
            Some(seed) => Ok(seed),
            None => {
                let mut bytes = [0u8; 8];
                OsRng.try_fill_bytes(&mut bytes).map_err(|e| Error::RandomSource(e.to_string()))?;
                Ok(u64::from_le_bytes(bytes))
            }
        }
    }

    /// random stream of a sequential pass
    pub fn make_rng(&self) -> Result<StdRng> {
        Ok(StdRng::seed_from_u64(self.resolve_seed()?))
    }
}
