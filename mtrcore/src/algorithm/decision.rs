use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::combinatorics::fire_probability;
use crate::algorithm::resampling::keep_track_resampled;
use crate::algorithm::resolve::{resolve_per_element_efficiencies, CrossedElements, PlaneConvention, PlaneEfficiencies};
use crate::chamber::rpc::RpcPartition;
use crate::data::track::MuonTrack;
use crate::efficiency::averaging::AveragedEfficiencies;
use crate::efficiency::table::{EfficiencySource, EfficiencyTable};
use crate::error::{Error, Result};

/// Outcome of the efficiency sampling for one track
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackDecision {
    /// no usable efficiency information, not part of the eligible sample
    Excluded,
    /// eligible, but the simulated trigger did not fire
    Rejected,
    /// eligible and the simulated trigger fired
    Kept,
}

impl TrackDecision {
    pub fn is_kept(self) -> bool {
        self == TrackDecision::Kept
    }

    pub fn is_eligible(self) -> bool {
        self != TrackDecision::Excluded
    }
}

/// How the trigger response of a track is simulated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// 3/4 probability per projection from board, RPC or chamber efficiencies, then two draws
    #[default]
    CrossedElements,
    /// per-chamber resampling of the fired planes with correlated bending/non-bending response
    Resampled,
}

/// 3/4 coincidence probabilities of both projections
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FireProbabilities {
    pub bending: f64,
    pub non_bending: f64,
}

impl FireProbabilities {
    pub fn from_efficiencies(effs: &PlaneEfficiencies) -> Self {
        FireProbabilities {
            bending: fire_probability(effs.bending),
            non_bending: fire_probability(effs.non_bending),
        }
    }
}

/// decide whether a track would have fired the trigger
///
/// Draws exactly two uniform numbers from `rng` (bending first) unless the track is
/// excluded, in which case nothing is drawn.
///
/// Arguments:
///
/// * `track` - the track to decide on
/// * `source` - per-board efficiency table
/// * `averages` - chamber and RPC averages of the same table
/// * `convention` - plane assignment of the averaged efficiencies
/// * `rng` - random source shared by the whole pass
///
/// Returns:
///
/// * `Result<TrackDecision>` - `Excluded` for tracks without efficiency data, a missing
///   board or missing table entries; errors for invalid categories or RPC indices
pub fn keep_track<S, R>(
    track: &MuonTrack,
    source: &S,
    averages: &AveragedEfficiencies,
    convention: PlaneConvention,
    rng: &mut R,
) -> Result<TrackDecision>
where
    S: EfficiencySource + ?Sized,
    R: Rng + ?Sized,
{
    let Some(probabilities) = fire_probabilities(track, source, averages, convention)? else {
        return Ok(TrackDecision::Excluded);
    };

    let hit_bending = rng.gen::<f64>() < probabilities.bending;
    let hit_non_bending = rng.gen::<f64>() < probabilities.non_bending;

    debug!(
        lo_circuit = track.lo_circuit,
        p_bending = probabilities.bending,
        p_non_bending = probabilities.non_bending,
        hit_bending,
        hit_non_bending,
        "track sampled"
    );

    if hit_bending && hit_non_bending {
        Ok(TrackDecision::Kept)
    } else {
        Ok(TrackDecision::Rejected)
    }
}

/// coincidence probabilities of a track, None if the track is excluded
pub fn fire_probabilities<S: EfficiencySource + ?Sized>(
    track: &MuonTrack,
    source: &S,
    averages: &AveragedEfficiencies,
    convention: PlaneConvention,
) -> Result<Option<FireProbabilities>> {
    let category = track.crossed_elements()?;
    if category == CrossedElements::NoEfficiencyData {
        return Ok(None);
    }

    match resolve_per_element_efficiencies(category, source, averages, track, convention) {
        Ok(effs) => Ok(Some(FireProbabilities::from_efficiencies(&effs))),
        Err(Error::MissingEfficiencyData { det_elem_id, board, plane }) => {
            debug!(det_elem_id, board, plane, "no efficiency data, track excluded");
            Ok(None)
        }
        Err(Error::InvalidBoard(board)) => {
            debug!(board, "track without local board, excluded");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Efficiency table together with its averages, ready to decide on tracks
#[derive(Clone, Debug)]
pub struct EfficiencyCombinator {
    table: EfficiencyTable,
    averages: AveragedEfficiencies,
    convention: PlaneConvention,
}

impl EfficiencyCombinator {
    /// average the table once and keep everything needed for per-track lookups
    ///
    /// # Examples
    ///
    /// ```
    /// use mtrcore::algorithm::decision::{EfficiencyCombinator, KeepPolicy, TrackDecision};
    /// use mtrcore::algorithm::resolve::PlaneConvention;
    /// use mtrcore::chamber::rpc::RpcPartition;
    /// use mtrcore::data::hit_pattern::HitPattern;
    /// use mtrcore::data::track::MuonTrack;
    /// use mtrcore::efficiency::table::EfficiencyTable;
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    ///
    /// let combinator = EfficiencyCombinator::new(
    ///     EfficiencyTable::uniform(1.0, 1.0), &RpcPartition::standard(), PlaneConvention::default(),
    /// );
    /// let track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 42);
    /// let mut rng = StdRng::seed_from_u64(7);
    ///
    /// let decision = combinator.decide(&track, KeepPolicy::CrossedElements, &mut rng).unwrap();
    /// assert_eq!(decision, TrackDecision::Kept);
    /// ```
    pub fn new(table: EfficiencyTable, partition: &RpcPartition, convention: PlaneConvention) -> Self {
        let averages = AveragedEfficiencies::from_table(&table, partition);
        EfficiencyCombinator { table, averages, convention }
    }

    pub fn table(&self) -> &EfficiencyTable {
        &self.table
    }

    pub fn averages(&self) -> &AveragedEfficiencies {
        &self.averages
    }

    pub fn convention(&self) -> PlaneConvention {
        self.convention
    }

    pub fn resolve(&self, track: &MuonTrack) -> Result<PlaneEfficiencies> {
        let category = track.crossed_elements()?;
        resolve_per_element_efficiencies(category, &self.table, &self.averages, track, self.convention)
    }

    pub fn fire_probabilities(&self, track: &MuonTrack) -> Result<Option<FireProbabilities>> {
        fire_probabilities(track, &self.table, &self.averages, self.convention)
    }

    pub fn keep_track<R: Rng + ?Sized>(&self, track: &MuonTrack, rng: &mut R) -> Result<TrackDecision> {
        keep_track(track, &self.table, &self.averages, self.convention, rng)
    }

    pub fn keep_track_resampled<R: Rng + ?Sized>(&self, track: &MuonTrack, rng: &mut R) -> Result<TrackDecision> {
        keep_track_resampled(track, &self.table, rng)
    }

    /// dispatch to the decision of the given policy
    pub fn decide<R: Rng + ?Sized>(&self, track: &MuonTrack, policy: KeepPolicy, rng: &mut R) -> Result<TrackDecision> {
        match policy {
            KeepPolicy::CrossedElements => self.keep_track(track, rng),
            KeepPolicy::Resampled => self.keep_track_resampled(track, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hit_pattern::HitPattern;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// counts the draws it hands out
    struct CountingRng {
        inner: StdRng,
        draws: usize,
    }

    impl RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.draws += 1;
            self.inner.next_u32()
        }

        fn next_u64(&mut self) -> u64 {
            self.draws += 1;
            self.inner.next_u64()
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.draws += 1;
            self.inner.fill_bytes(dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.draws += 1;
            self.inner.try_fill_bytes(dest)
        }
    }

    fn combinator(bending: f64, non_bending: f64) -> EfficiencyCombinator {
        EfficiencyCombinator::new(
            EfficiencyTable::uniform(bending, non_bending),
            &RpcPartition::standard(),
            PlaneConvention::AsRecorded,
        )
    }

    fn tracks() -> Vec<MuonTrack> {
        vec![
            MuonTrack::new(HitPattern::default().with_eff_info(1, 0), 10),
            MuonTrack::new(HitPattern::default().with_eff_info(2, 4), 20),
            MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 30),
            MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 234),
        ]
    }

    #[test]
    fn test_full_efficiency_keeps_everything() {
        let combinator = combinator(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            for track in tracks() {
                assert_eq!(combinator.keep_track(&track, &mut rng).unwrap(), TrackDecision::Kept);
            }
        }
    }

    #[test]
    fn test_zero_efficiency_rejects_everything() {
        let combinator = combinator(0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            for track in tracks() {
                assert_eq!(combinator.keep_track(&track, &mut rng).unwrap(), TrackDecision::Rejected);
            }
        }
    }

    #[test]
    fn test_one_dead_projection_rejects() {
        let combinator = combinator(1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        for track in tracks() {
            assert_eq!(combinator.keep_track(&track, &mut rng).unwrap(), TrackDecision::Rejected);
        }
    }

    #[test]
    fn test_no_efficiency_data_draws_nothing() {
        let combinator = combinator(0.5, 0.5);
        let mut rng = CountingRng { inner: StdRng::seed_from_u64(4), draws: 0 };
        let track = MuonTrack::new(HitPattern::default().with_eff_info(0, 0), 10);

        assert_eq!(combinator.keep_track(&track, &mut rng).unwrap(), TrackDecision::Excluded);
        assert_eq!(rng.draws, 0);

        let eligible = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 10);
        combinator.keep_track(&eligible, &mut rng).unwrap();
        assert_eq!(rng.draws, 2);
    }

    #[test]
    fn test_missing_board_is_excluded() {
        let combinator = combinator(1.0, 1.0);
        let mut rng = CountingRng { inner: StdRng::seed_from_u64(5), draws: 0 };
        let track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 0);
        assert_eq!(combinator.keep_track(&track, &mut rng).unwrap(), TrackDecision::Excluded);
        assert_eq!(rng.draws, 0);
    }

    #[test]
    fn test_invalid_rpc_is_an_error() {
        let combinator = combinator(1.0, 1.0);
        let mut rng = StdRng::seed_from_u64(6);
        let track = MuonTrack::new(HitPattern::default().with_eff_info(2, 30), 10);
        assert_eq!(combinator.keep_track(&track, &mut rng), Err(Error::InvalidRpc(30)));
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let combinator = combinator(0.8, 0.7);
        let run = |seed: u64| -> Vec<TrackDecision> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..200)
                .flat_map(|_| tracks())
                .map(|t| combinator.keep_track(&t, &mut rng).unwrap())
                .collect()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_keep_rate_follows_probability() {
        let combinator = combinator(0.8, 0.7);
        let track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 100);
        let expected = fire_probability([0.8; 4]) * fire_probability([0.7; 4]);

        let mut rng = StdRng::seed_from_u64(12);
        let n = 20_000;
        let kept = (0..n)
            .filter(|_| combinator.keep_track(&track, &mut rng).unwrap().is_kept())
            .count();
        let rate = kept as f64 / n as f64;
        assert!((rate - expected).abs() < 0.02, "rate {} expected {}", rate, expected);
    }

    #[test]
    fn test_bending_draw_comes_first() {
        // one projection always fires, so the decision follows a single draw of the stream
        let track = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 100);
        let bending_limited = combinator(0.6, 1.0);
        let non_bending_limited = combinator(1.0, 0.6);
        let p = fire_probability([0.6; 4]);

        let mut order_matters = 0;
        for seed in 0..200 {
            let mut reference = StdRng::seed_from_u64(seed);
            let u_first = reference.gen::<f64>();
            let u_second = reference.gen::<f64>();

            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(bending_limited.keep_track(&track, &mut rng).unwrap().is_kept(), u_first < p);

            let mut rng = StdRng::seed_from_u64(seed);
            assert_eq!(non_bending_limited.keep_track(&track, &mut rng).unwrap().is_kept(), u_second < p);

            if (u_first < p) != (u_second < p) {
                order_matters += 1;
            }
        }
        assert!(order_matters > 0);
    }

    #[test]
    fn test_averaged_planes_are_swapped_by_default() {
        let table = EfficiencyTable::uniform(0.9, 0.6);
        let swapped = EfficiencyCombinator::new(table.clone(), &RpcPartition::standard(), PlaneConvention::default());
        let recorded = EfficiencyCombinator::new(table, &RpcPartition::standard(), PlaneConvention::AsRecorded);
        let per_rpc = MuonTrack::new(HitPattern::default().with_eff_info(2, 7), 50);
        let per_board = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 50);

        let effs = swapped.resolve(&per_rpc).unwrap();
        assert_eq!(effs.bending, [0.6; 4]);
        assert_eq!(effs.non_bending, [0.9; 4]);
        assert_eq!(recorded.resolve(&per_rpc).unwrap().bending, [0.9; 4]);
        assert_eq!(swapped.resolve(&per_board).unwrap().bending, [0.9; 4]);

        let probabilities = swapped.fire_probabilities(&per_rpc).unwrap().unwrap();
        assert_eq!(probabilities.bending, fire_probability([0.6; 4]));
        assert_eq!(probabilities.non_bending, fire_probability([0.9; 4]));

        let excluded = MuonTrack::new(HitPattern::default().with_eff_info(3, 0), 0);
        assert_eq!(swapped.fire_probabilities(&excluded).unwrap(), None);
    }

    #[test]
    fn test_decision_eligibility() {
        assert!(!TrackDecision::Excluded.is_eligible());
        assert!(TrackDecision::Rejected.is_eligible());
        assert!(TrackDecision::Kept.is_eligible());
        assert!(!TrackDecision::Rejected.is_kept());
    }
}
