use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};

use mtrcore::algorithm::decision::TrackDecision;
use mtrcore::chamber::constants::N_TRIGGER_CHAMBERS;
use mtrcore::data::hit_pattern::{BENDING_CATHODE, NON_BENDING_CATHODE};
use mtrcore::data::track::MuonTrack;

/// Track bookkeeping of an analysis pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCounters {
    /// every track seen
    pub all: u64,
    /// matched tracks that went through the sampling
    pub eligible: u64,
    pub kept: u64,
    pub rejected: u64,
    /// matched tracks without usable efficiency information
    pub excluded: u64,
    /// tracks dropped because their efficiency information is corrupt
    pub skipped: u64,
    /// matched tracks per efficiency flag
    pub eff_flags: [u64; 4],
    /// matched tracks per number of fired bending chambers (0 to 4)
    pub bending_hits: [u64; N_TRIGGER_CHAMBERS + 1],
    pub non_bending_hits: [u64; N_TRIGGER_CHAMBERS + 1],
}

impl TrackCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// book the trigger content of a track matched in tracker and trigger
    pub fn record_matched(&mut self, track: &MuonTrack) {
        let pattern = track.hit_pattern;
        self.eff_flags[pattern.eff_flag() as usize] += 1;
        self.bending_hits[pattern.n_hits(BENDING_CATHODE)] += 1;
        self.non_bending_hits[pattern.n_hits(NON_BENDING_CATHODE)] += 1;
    }

    pub fn record_decision(&mut self, decision: TrackDecision) {
        if decision.is_eligible() {
            self.eligible += 1;
        }
        match decision {
            TrackDecision::Excluded => self.excluded += 1,
            TrackDecision::Rejected => self.rejected += 1,
            TrackDecision::Kept => self.kept += 1,
        }
    }

    pub fn merge(&mut self, other: &TrackCounters) {
        self.all += other.all;
        self.eligible += other.eligible;
        self.kept += other.kept;
        self.rejected += other.rejected;
        self.excluded += other.excluded;
        self.skipped += other.skipped;
        for (a, b) in self.eff_flags.iter_mut().zip(other.eff_flags.iter()) {
            *a += b;
        }
        for (a, b) in self.bending_hits.iter_mut().zip(other.bending_hits.iter()) {
            *a += b;
        }
        for (a, b) in self.non_bending_hits.iter_mut().zip(other.non_bending_hits.iter()) {
            *a += b;
        }
    }

    /// fraction of eligible tracks that were kept, None without eligible tracks
    pub fn efficiency(&self) -> Option<f64> {
        if self.eligible == 0 {
            return None;
        }
        Some(self.kept as f64 / self.eligible as f64)
    }

    /// Clopper-Pearson interval of the efficiency
    ///
    /// Arguments:
    ///
    /// * `confidence_level` - coverage of the interval, e.g. 0.683
    ///
    /// Returns:
    ///
    /// * `Option<(f64, f64)>` - lower and upper bound, None without eligible tracks
    pub fn efficiency_interval(&self, confidence_level: f64) -> Option<(f64, f64)> {
        clopper_pearson(self.kept, self.eligible, confidence_level)
    }

    pub fn summary(&self, confidence_level: f64) -> PassSummary {
        PassSummary {
            counters: self.clone(),
            efficiency: self.efficiency(),
            interval: self.efficiency_interval(confidence_level),
            confidence_level,
        }
    }
}

/// Counters with the derived efficiency, as reported at the end of a pass
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassSummary {
    pub counters: TrackCounters,
    pub efficiency: Option<f64>,
    pub interval: Option<(f64, f64)>,
    pub confidence_level: f64,
}

/// exact binomial interval for `k` successes out of `n` trials
pub fn clopper_pearson(k: u64, n: u64, confidence_level: f64) -> Option<(f64, f64)> {
    if n == 0 || k > n {
        return None;
    }
    let alpha = 1.0 - confidence_level;
    let (kf, nf) = (k as f64, n as f64);

    let lower = if k == 0 {
        0.0
    } else {
        Beta::new(kf, nf - kf + 1.0).ok()?.inverse_cdf(alpha / 2.0)
    };
    let upper = if k == n {
        1.0
    } else {
        Beta::new(kf + 1.0, nf - kf).ok()?.inverse_cdf(1.0 - alpha / 2.0)
    };
    Some((lower, upper))
}
