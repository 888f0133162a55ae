use serde::{Deserialize, Serialize};

use super::cluster::SimilarityGroup;
use super::fingerprint::ImageRecord;

/// Scores closer than this are treated as equal and fall back to identifier order
pub const SCORE_EPSILON: f64 = 1e-9;

/// Relative weight of each metric in the quality score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    #[serde(default = "default_resolution_weight")]
    pub resolution: f64,
    #[serde(default = "default_sharpness_weight")]
    pub sharpness: f64,
    #[serde(default = "default_size_weight")]
    pub size: f64,
}

fn default_resolution_weight() -> f64 {
    0.70
}
fn default_sharpness_weight() -> f64 {
    0.25
}
fn default_size_weight() -> f64 {
    0.05
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            resolution: default_resolution_weight(),
            sharpness: default_sharpness_weight(),
            size: default_size_weight(),
        }
    }
}

impl QualityWeights {
    /// All weights finite and non-negative, and at least one positive
    pub fn is_valid(&self) -> bool {
        let all = [self.resolution, self.sharpness, self.size];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && all.iter().any(|w| *w > 0.0)
    }
}

/// A record with its in-group quality score and the normalized inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: ImageRecord,
    pub score: f64,
    pub norm_resolution: f64,
    pub norm_sharpness: f64,
    pub norm_size: f64,
}

/// A group with its keeper chosen. `discard` is in descending score order,
/// so `discard[0]` is the runner-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedGroup {
    pub keeper: ScoredRecord,
    pub discard: Vec<ScoredRecord>,
}

impl RankedGroup {
    pub fn member_count(&self) -> usize {
        1 + self.discard.len()
    }

    /// Bytes freed by removing every discard candidate
    pub fn reclaimable_bytes(&self) -> u64 {
        self.discard
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.record.byte_len))
    }

    pub fn members(&self) -> impl Iterator<Item = &ScoredRecord> {
        std::iter::once(&self.keeper).chain(self.discard.iter())
    }
}

/// `value / max`, or 0 when the whole group has nothing in this dimension
fn normalize(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        value / max
    } else {
        0.0
    }
}

/// Score every member of a group, each metric normalized against the group
/// maximum so the best member in a dimension gets that dimension's full weight.
pub fn score_members(members: &[ImageRecord], weights: &QualityWeights) -> Vec<ScoredRecord> {
    let max_res = members.iter().map(|m| m.resolution() as f64).fold(0.0, f64::max);
    let max_sharp = members.iter().map(|m| m.sharpness).fold(0.0, f64::max);
    let max_size = members.iter().map(|m| m.byte_len as f64).fold(0.0, f64::max);

    members
        .iter()
        .map(|m| {
            let norm_resolution = normalize(m.resolution() as f64, max_res);
            let norm_sharpness = normalize(m.sharpness, max_sharp);
            let norm_size = normalize(m.byte_len as f64, max_size);
            ScoredRecord {
                record: m.clone(),
                score: weights.resolution * norm_resolution
                    + weights.sharpness * norm_sharpness
                    + weights.size * norm_size,
                norm_resolution,
                norm_sharpness,
                norm_size,
            }
        })
        .collect()
}

/// Order scored members best first.
///
/// Members are walked in descending raw score. A run starts at the best
/// remaining score and takes in every member within [`SCORE_EPSILON`] of it;
/// inside a run the smaller identifier wins. A member only outranks another
/// through score if it is more than epsilon ahead of its run's anchor.
fn order_by_quality(mut scored: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    let mut ordered = Vec::with_capacity(scored.len());
    let mut run: Vec<ScoredRecord> = Vec::new();
    for member in scored {
        let starts_new_run = run
            .first()
            .is_some_and(|anchor| anchor.score - member.score > SCORE_EPSILON);
        if starts_new_run {
            flush_tie_run(&mut run, &mut ordered);
        }
        run.push(member);
    }
    flush_tie_run(&mut run, &mut ordered);
    ordered
}

fn flush_tie_run(run: &mut Vec<ScoredRecord>, ordered: &mut Vec<ScoredRecord>) {
    run.sort_by(|a, b| a.record.id.cmp(&b.record.id));
    ordered.append(run);
}

/// Pick the keeper of a group and order the rest as discard candidates.
///
/// Returns `None` only for an empty group. A single-member group is its own
/// keeper with nothing to discard.
pub fn rank_group(group: &SimilarityGroup, weights: &QualityWeights) -> Option<RankedGroup> {
    let scored = order_by_quality(score_members(&group.members, weights));

    let mut iter = scored.into_iter();
    let keeper = iter.next()?;
    let discard: Vec<ScoredRecord> = iter.collect();

    tracing::debug!(
        keeper = %keeper.record.id,
        score = keeper.score,
        discard = discard.len(),
        "ranked group"
    );

    Some(RankedGroup { keeper, discard })
}

/// Rank every group, preserving group order
pub fn rank_all(groups: &[SimilarityGroup], weights: &QualityWeights) -> Vec<RankedGroup> {
    groups.iter().filter_map(|g| rank_group(g, weights)).collect()
}
