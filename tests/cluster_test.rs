use photoprune::duplicates::fingerprint::Fingerprint;
use photoprune::duplicates::scorer::rank_all;
use photoprune::duplicates::{cluster, DecisionSet, ImageRecord, QualityWeights};

fn record(id: &str, bits: u64, width: u32, sharpness: f64, byte_len: u64) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        byte_len,
        timestamp: None,
        width,
        height: width,
        hash: Fingerprint::from_bits(bits),
        sharpness,
    }
}

fn library() -> Vec<ImageRecord> {
    vec![
        // chain: a~b (2 bits), b~c (2 bits), a and c 4 bits apart
        record("a.jpg", 0b0000, 100, 5.0, 1_000),
        record("b.jpg", 0b0011, 200, 5.0, 2_000),
        record("c.jpg", 0b1111, 100, 9.0, 1_500),
        // far away pair
        record("d.jpg", u64::MAX, 50, 1.0, 500),
        record("e.jpg", u64::MAX ^ 1, 60, 1.0, 400),
        // loner
        record("f.jpg", 0x00ff_00ff_00ff_00ff, 80, 3.0, 900),
    ]
}

// ─── Grouping tests ──────────────────────────────────────────────────────────

#[test]
fn test_chains_are_grouped_transitively() {
    let groups = cluster(&library(), 2);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].ids(), vec!["a.jpg", "b.jpg", "c.jpg"]);
    assert_eq!(groups[0].max_distance(), 4);
    assert_eq!(groups[1].ids(), vec!["d.jpg", "e.jpg"]);
}

#[test]
fn test_threshold_zero_only_merges_exact_matches() {
    let mut records = library();
    records.push(record("a_copy.jpg", 0b0000, 100, 5.0, 1_000));
    let groups = cluster(&records, 0);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].ids(), vec!["a.jpg", "a_copy.jpg"]);
}

#[test]
fn test_full_threshold_merges_everything() {
    let groups = cluster(&library(), 64);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 6);
}

#[test]
fn test_no_image_lands_in_two_groups() {
    let groups = cluster(&library(), 2);
    let mut ids: Vec<&str> = groups.iter().flat_map(|g| g.ids()).collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);
}

#[test]
fn test_every_rotation_gives_the_same_plan() {
    let base = library();
    let weights = QualityWeights::default();
    let expected = DecisionSet::assemble(&rank_all(&cluster(&base, 2), &weights));

    for shift in 1..base.len() {
        let mut rotated = base.clone();
        rotated.rotate_left(shift);
        let plan = DecisionSet::assemble(&rank_all(&cluster(&rotated, 2), &weights));
        assert_eq!(plan, expected, "rotation by {} changed the plan", shift);
    }
}

// ─── Ranking tests ───────────────────────────────────────────────────────────

#[test]
fn test_resolution_outweighs_sharpness() {
    let ranked = rank_all(&cluster(&library(), 2), &QualityWeights::default());

    // b: 0.70 + 0.25*(5/9) + 0.05 ≈ 0.889; c: 0.175 + 0.25 + 0.0375 ≈ 0.4625
    assert_eq!(ranked[0].keeper.record.id, "b.jpg");
    let discards: Vec<&str> = ranked[0]
        .discard
        .iter()
        .map(|s| s.record.id.as_str())
        .collect();
    assert_eq!(discards, vec!["c.jpg", "a.jpg"]);
    assert_eq!(ranked[0].reclaimable_bytes(), 2_500);

    assert_eq!(ranked[1].keeper.record.id, "e.jpg");
}

#[test]
fn test_sharpness_only_weights_pick_sharpest() {
    let weights = QualityWeights {
        resolution: 0.0,
        sharpness: 1.0,
        size: 0.0,
    };
    let ranked = rank_all(&cluster(&library(), 2), &weights);
    assert_eq!(ranked[0].keeper.record.id, "c.jpg");
}
