use tempfile::TempDir;

use photoprune::common::errors::PhotoError;
use photoprune::duplicates::fingerprint::Fingerprint;
use photoprune::duplicates::{
    cluster, rank_group, DecisionLayout, DecisionSet, ImageRecord, QualityWeights, SpaceSavings,
};

fn record(id: &str, bits: u64, width: u32, byte_len: u64) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        byte_len,
        timestamp: None,
        width,
        height: width,
        hash: Fingerprint::from_bits(bits),
        sharpness: 2.0,
    }
}

fn sample_plan() -> DecisionSet {
    let records = vec![
        record("/photos/a.jpg", 0, 400, 4_000),
        record("/photos/b.jpg", 1, 300, 3_000),
        record("/photos/c.jpg", 2, 200, 2_000),
        record("/photos/x.jpg", u64::MAX, 100, 700),
        record("/photos/y.jpg", u64::MAX, 120, 800),
    ];
    let weights = QualityWeights::default();
    let ranked: Vec<_> = cluster(&records, 5)
        .iter()
        .filter_map(|g| rank_group(g, &weights))
        .collect();
    DecisionSet::assemble(&ranked)
}

// ─── Assembly tests ──────────────────────────────────────────────────────────

#[test]
fn test_assemble_numbers_groups_from_one() {
    let plan = sample_plan();
    assert_eq!(plan.group_count(), 2);

    let first = plan.get("1").unwrap();
    assert_eq!(first.keep[0].path, "/photos/a.jpg");
    assert_eq!(first.delete.len(), 2);
    assert_eq!(first.space_savings(), SpaceSavings::Known(5_000));

    let second = plan.get("2").unwrap();
    assert_eq!(second.keep[0].path, "/photos/y.jpg");
    assert_eq!(plan.space_savings(), SpaceSavings::Known(5_700));
}

#[test]
fn test_every_member_appears_exactly_once() {
    let plan = sample_plan();
    let mut all: Vec<&str> = plan.keep_paths();
    all.extend(plan.delete_paths());
    all.sort();
    assert_eq!(
        all,
        vec![
            "/photos/a.jpg",
            "/photos/b.jpg",
            "/photos/c.jpg",
            "/photos/x.jpg",
            "/photos/y.jpg"
        ]
    );
}

#[test]
fn test_saved_plan_reads_back_identically() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("decisions.json");
    let plan = sample_plan();
    plan.save(&file).unwrap();

    let (loaded, layout) = DecisionSet::load_with_layout(&file).unwrap();
    assert_eq!(loaded, plan);
    assert_eq!(layout, DecisionLayout::Current);

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(raw["1"]["keep"][0]["path"], "/photos/a.jpg");
    assert_eq!(raw["1"]["keep"][0]["size"], 4_000);
}

// ─── Fast-mode loading tests ─────────────────────────────────────────────────

#[test]
fn test_legacy_file_loads_without_sizes() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("old.json");
    std::fs::write(
        &file,
        r#"{
            "1": {"keep": ["/p/1.jpg"], "delete": ["/p/2.jpg"]},
            "2": {"keep": ["/p/3.jpg"], "delete": ["/p/4.jpg", "/p/5.jpg"]}
        }"#,
    )
    .unwrap();

    let (plan, layout) = DecisionSet::load_with_layout(&file).unwrap();
    assert_eq!(layout, DecisionLayout::Legacy);
    assert_eq!(plan.group_count(), 2);
    assert_eq!(plan.delete_paths(), vec!["/p/2.jpg", "/p/4.jpg", "/p/5.jpg"]);
    assert_eq!(plan.space_savings(), SpaceSavings::Unavailable);
}

#[test]
fn test_hand_edited_file_may_keep_everything() {
    let json = r#"{"7": {"keep": [{"path": "/p/a.jpg", "size": 10}, {"path": "/p/b.jpg", "size": 20}], "delete": []}}"#;
    let plan = DecisionSet::from_json(json, "edited.json").unwrap();
    assert_eq!(plan.keep_paths().len(), 2);
    assert_eq!(plan.space_savings(), SpaceSavings::Known(0));
}

#[test]
fn test_malformed_files_are_rejected() {
    let cases = [
        "not json",
        "[1, 2, 3]",
        r#"{"1": {"keep": [42]}}"#,
        r#"{"1": {"keep": ["/p/a.jpg"], "delete": ["/p/a.jpg"]}}"#,
        r#"{"1": {"keep": [{"path": ""}]}}"#,
        r#"{"1": {"keep": ["/p/x.jpg"], "delete": ["/p/y.jpg"]}, "1": {"keep": ["/p/y.jpg"], "delete": ["/p/x.jpg"]}}"#,
        r#"{"1": {"keep": ["/p/x.jpg"]}, "1": {"keep": ["/p/z.jpg"]}}"#,
    ];
    for json in cases {
        let err = DecisionSet::from_json(json, "bad.json").unwrap_err();
        assert!(
            matches!(err, PhotoError::MalformedDecisionInput { .. }),
            "expected malformed error for {}",
            json
        );
    }
}

#[test]
fn test_partial_sizes_report_a_lower_bound() {
    let json = r#"{
        "1": {"keep": [{"path": "/p/a.jpg", "size": 5}], "delete": [{"path": "/p/b.jpg", "size": 2048}]},
        "2": {"keep": ["/p/c.jpg"], "delete": ["/p/d.jpg", "/p/e.jpg"]}
    }"#;
    let (plan, layout) = DecisionSet::parse(json, "edited.json").unwrap();
    assert_eq!(layout, DecisionLayout::Mixed);
    assert_eq!(
        plan.space_savings(),
        SpaceSavings::Partial {
            known_bytes: 2048,
            unknown_entries: 2
        }
    );
    assert_eq!(plan.space_savings().bytes(), None);
    assert_eq!(
        plan.space_savings().to_string(),
        "at least 2.0 KB (2 sizes unknown)"
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = DecisionSet::load(&dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, PhotoError::Io { .. }));
}
