use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mtrcore::algorithm::decision::{EfficiencyCombinator, TrackDecision};
use mtrcore::chamber::rpc::RpcPartition;
use mtrcore::data::track::MuonTrack;
use mtrcore::efficiency::table::EfficiencyTable;

use crate::analysis::config::AnalysisConfig;
use crate::analysis::counters::TrackCounters;
use crate::error::Result;
use crate::io::events::Event;

/// Output of a pass: the selected tracks and the bookkeeping
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassResult {
    pub events: Vec<Event>,
    pub counters: TrackCounters,
    /// seed the random stream started from
    pub seed: u64,
}

/// Efficiency application over a sample of events
#[derive(Clone, Debug)]
pub struct Analysis {
    combinator: EfficiencyCombinator,
    config: AnalysisConfig,
}

impl Analysis {
    pub fn new(table: EfficiencyTable, partition: &RpcPartition, config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        if table.planes_identical() {
            warn!("bending and non-bending efficiencies are identical, the plane assignment cannot be checked");
        }
        let combinator = EfficiencyCombinator::new(table, partition, config.plane_convention);
        Ok(Analysis { combinator, config })
    }

    pub fn combinator(&self) -> &EfficiencyCombinator {
        &self.combinator
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// decide on one track and book it
    ///
    /// Tracks not matched in both tracker and trigger are only counted in `all`.
    /// Corrupt efficiency information is logged and counted as skipped.
    pub fn process_track<R: Rng + ?Sized>(&self, track: &MuonTrack, rng: &mut R, counters: &mut TrackCounters) -> Option<TrackDecision> {
        counters.all += 1;
        if !(track.contains_trigger && track.contains_tracker) {
            return None;
        }
        counters.record_matched(track);

        let decision = if self.config.apply_efficiencies {
            match self.combinator.decide(track, self.config.policy, rng) {
                Ok(decision) => decision,
                Err(e) => {
                    warn!(lo_circuit = track.lo_circuit, hit_pattern = track.hit_pattern.raw(), "track skipped: {}", e);
                    counters.skipped += 1;
                    return None;
                }
            }
        } else if track.is_eligible() {
            TrackDecision::Kept
        } else {
            TrackDecision::Excluded
        };

        counters.record_decision(decision);
        Some(decision)
    }

    /// run the tracks of one event through the decision, in order
    ///
    /// Arguments:
    ///
    /// * `event` - input event
    /// * `rng` - random stream, consumed in track order
    /// * `counters` - bookkeeping to update
    ///
    /// Returns:
    ///
    /// * `Event` - the event with the sampled tracks, kept tracks marked when
    ///   efficiencies are applied
    pub fn process_event<R: Rng + ?Sized>(&self, event: &Event, rng: &mut R, counters: &mut TrackCounters) -> Event {
        let mut tracks = Vec::with_capacity(event.tracks.len());

        for track in &event.tracks {
            match self.process_track(track, rng, counters) {
                Some(TrackDecision::Kept) => {
                    let mut out = track.clone();
                    if self.config.apply_efficiencies {
                        out.hit_pattern = out.hit_pattern.mark_kept();
                    }
                    tracks.push(out);
                }
                Some(TrackDecision::Rejected) if !self.config.drop_rejected => tracks.push(track.clone()),
                _ => {}
            }
        }

        Event { file_name: event.file_name.clone(), event_number: event.event_number, tracks }
    }

    /// sequential pass with the configured seed
    pub fn run_pass(&self, events: &[Event]) -> Result<PassResult> {
        let seed = self.config.resolve_seed()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let (events, counters) = self.run_pass_with_rng(events, &mut rng);
        Ok(PassResult { events, counters, seed })
    }

    /// sequential pass drawing from a caller supplied stream
    pub fn run_pass_with_rng<R: Rng + ?Sized>(&self, events: &[Event], rng: &mut R) -> (Vec<Event>, TrackCounters) {
        info!(events = events.len(), policy = ?self.config.policy, "starting sequential pass");

        let mut counters = TrackCounters::new();
        let out = events.iter()
            .map(|event| self.process_event(event, rng, &mut counters))
            .collect();

        info!(all = counters.all, eligible = counters.eligible, kept = counters.kept, "pass finished");
        (out, counters)
    }

    /// parallel pass, every event draws from its own stream seeded with `seed + index`
    ///
    /// The outcome does not depend on the number of threads, but differs from
    /// `run_pass` with the same seed.
    ///
    /// Arguments:
    ///
    /// * `events` - input events
    /// * `num_threads` - worker threads, 0 uses all cores
    pub fn run_pass_par(&self, events: &[Event], num_threads: usize) -> Result<PassResult> {
        let seed = self.config.resolve_seed()?;
        let thread_pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
        info!(events = events.len(), threads = thread_pool.current_num_threads(), "starting parallel pass");

        let processed: Vec<(Event, TrackCounters)> = thread_pool.install(|| {
            events.par_iter()
                .enumerate()
                .map(|(index, event)| {
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
                    let mut counters = TrackCounters::new();
                    let out = self.process_event(event, &mut rng, &mut counters);
                    (out, counters)
                })
                .collect()
        });

        let mut counters = TrackCounters::new();
        let mut out = Vec::with_capacity(processed.len());
        for (event, event_counters) in processed {
            counters.merge(&event_counters);
            out.push(event);
        }

        info!(all = counters.all, eligible = counters.eligible, kept = counters.kept, "pass finished");
        Ok(PassResult { events: out, counters, seed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtrcore::data::hit_pattern::HitPattern;

    fn sample_events() -> Vec<Event> {
        let good = MuonTrack::new(HitPattern(0x00FF).with_eff_info(3, 0), 20);
        let no_eff = MuonTrack::new(HitPattern(0x00FF), 20);
        let mut unmatched = good.clone();
        unmatched.contains_tracker = false;
        let corrupt = MuonTrack::new(HitPattern(0x00FF).with_eff_info(2, 31), 20);
        vec![
            Event::new("a.root", 0, vec![good.clone(), no_eff]),
            Event::new("a.root", 1, vec![unmatched, corrupt, good]),
        ]
    }

    fn analysis(eff: f64, config: AnalysisConfig) -> Analysis {
        Analysis::new(EfficiencyTable::uniform(eff, eff), &RpcPartition::standard(), config).unwrap()
    }

    #[test]
    fn test_counters_of_a_pass() {
        let config = AnalysisConfig { seed: Some(1), ..Default::default() };
        let result = analysis(1.0, config).run_pass(&sample_events()).unwrap();

        let c = &result.counters;
        assert_eq!(c.all, 5);
        assert_eq!(c.eligible, 2);
        assert_eq!(c.kept, 2);
        assert_eq!(c.excluded, 1);
        assert_eq!(c.skipped, 1);
        assert_eq!(c.eff_flags, [1, 0, 1, 2]);
        assert_eq!(result.seed, 1);

        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].tracks.len(), 1);
        assert!(result.events[0].tracks[0].hit_pattern.is_kept());
        assert!(result.events[1].tracks.iter().all(|t| t.hit_pattern.is_kept()));
    }

    #[test]
    fn test_identical_planes_are_accepted() {
        // the warning for identical planes is not an error
        let config = AnalysisConfig { seed: Some(4), ..Default::default() };
        let analysis = analysis(0.8, config);
        assert!(analysis.combinator().table().planes_identical());
        assert!(analysis.run_pass(&sample_events()).is_ok());
    }

    #[test]
    fn test_rejected_tracks() {
        let config = AnalysisConfig { seed: Some(2), ..Default::default() };
        let result = analysis(0.0, config.clone()).run_pass(&sample_events()).unwrap();
        assert_eq!(result.counters.rejected, 2);
        assert_eq!(result.events[0].tracks.len(), 1);
        assert!(!result.events[0].tracks[0].hit_pattern.is_kept());

        let dropping = AnalysisConfig { drop_rejected: true, ..config };
        let result = analysis(0.0, dropping).run_pass(&sample_events()).unwrap();
        assert!(result.events.iter().all(|e| e.tracks.is_empty()));
    }

    #[test]
    fn test_without_efficiencies_everything_eligible_is_kept() {
        let config = AnalysisConfig { apply_efficiencies: false, seed: Some(3), ..Default::default() };
        let result = analysis(0.0, config).run_pass(&sample_events()).unwrap();
        assert_eq!(result.counters.kept, 3);
        assert_eq!(result.counters.skipped, 0);
        assert!(result.events.iter().flat_map(|e| e.tracks.iter()).all(|t| !t.hit_pattern.is_kept()));
    }
}
