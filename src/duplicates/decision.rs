use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use super::scorer::{RankedGroup, ScoredRecord};
use crate::common::errors::{PhotoError, Result};
use crate::common::format::format_size;

/// One image in a decision file. `size: None` means unknown, never zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DecisionEntry {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl DecisionEntry {
    pub fn new(path: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

impl From<&ScoredRecord> for DecisionEntry {
    fn from(scored: &ScoredRecord) -> Self {
        Self::new(scored.record.id.clone(), Some(scored.record.byte_len))
    }
}

/// Keep/delete lists for one group. An edited file may keep several images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDecision {
    pub keep: Vec<DecisionEntry>,
    pub delete: Vec<DecisionEntry>,
}

impl GroupDecision {
    pub fn space_savings(&self) -> SpaceSavings {
        SpaceSavings::from_entries(&self.delete)
    }
}

/// Space freed by carrying out the delete lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceSavings {
    /// Every delete entry had a size
    Known(u64),
    /// Some sizes were missing; `known_bytes` is a lower bound
    Partial {
        known_bytes: u64,
        unknown_entries: usize,
    },
    /// No delete entry had a size
    Unavailable,
}

impl SpaceSavings {
    fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DecisionEntry>) -> Self {
        let mut known_bytes = 0u64;
        let mut known = 0usize;
        let mut unknown_entries = 0usize;
        for entry in entries {
            match entry.size {
                Some(size) => {
                    known_bytes = known_bytes.saturating_add(size);
                    known += 1;
                }
                None => unknown_entries += 1,
            }
        }
        match (known, unknown_entries) {
            (_, 0) => SpaceSavings::Known(known_bytes),
            (0, _) => SpaceSavings::Unavailable,
            _ => SpaceSavings::Partial {
                known_bytes,
                unknown_entries,
            },
        }
    }

    /// Exact byte count, when every size is known
    pub fn bytes(&self) -> Option<u64> {
        match self {
            SpaceSavings::Known(bytes) => Some(*bytes),
            _ => None,
        }
    }
}

impl fmt::Display for SpaceSavings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceSavings::Known(bytes) => write!(f, "{}", format_size(*bytes)),
            SpaceSavings::Partial {
                known_bytes,
                unknown_entries,
            } => write!(
                f,
                "at least {} ({} sizes unknown)",
                format_size(*known_bytes),
                unknown_entries
            ),
            SpaceSavings::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Shape a decision file was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionLayout {
    /// `{path, size}` objects
    Current,
    /// Bare path strings, no sizes
    Legacy,
    /// Both entry shapes in one file
    Mixed,
    /// No entries at all
    Empty,
}

impl fmt::Display for DecisionLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionLayout::Current => write!(f, "current"),
            DecisionLayout::Legacy => write!(f, "legacy"),
            DecisionLayout::Mixed => write!(f, "mixed"),
            DecisionLayout::Empty => write!(f, "empty"),
        }
    }
}

// ── On-disk shapes accepted by fast mode ─────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Legacy(String),
    Current {
        path: String,
        #[serde(default)]
        size: Option<u64>,
    },
}

#[derive(Deserialize)]
struct RawGroup {
    #[serde(default)]
    keep: Vec<RawEntry>,
    #[serde(default)]
    delete: Vec<RawEntry>,
}

/// Root object in file order. Repeated group keys are kept so they can be
/// rejected instead of silently overwriting each other.
struct RawPlan(Vec<(String, RawGroup)>);

impl<'de> Deserialize<'de> for RawPlan {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PlanVisitor;

        impl<'de> Visitor<'de> for PlanVisitor {
            type Value = RawPlan;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping group ids to {keep, delete}")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<RawPlan, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut groups = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, group)) = map.next_entry::<String, RawGroup>()? {
                    groups.push((id, group));
                }
                Ok(RawPlan(groups))
            }
        }

        deserializer.deserialize_map(PlanVisitor)
    }
}

/// Immutable keep/delete plan keyed by group id.
///
/// Serializes as `{"<group>": {"keep": [{path, size}], "delete": [...]}}`,
/// the format the report and executor collaborators exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DecisionSet {
    groups: BTreeMap<String, GroupDecision>,
}

impl DecisionSet {
    /// Build the plan from ranked groups. Group ids are 1-based in group order.
    pub fn assemble(ranked: &[RankedGroup]) -> Self {
        let groups = ranked
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let decision = GroupDecision {
                    keep: vec![DecisionEntry::from(&group.keeper)],
                    delete: group.discard.iter().map(DecisionEntry::from).collect(),
                };
                ((i + 1).to_string(), decision)
            })
            .collect();
        Self { groups }
    }

    /// Parse a decision file in the current or legacy layout ("fast mode").
    /// Nothing is recomputed; cached sizes are taken as-is.
    pub fn from_json(json: &str, source_name: &str) -> Result<Self> {
        Self::parse(json, source_name).map(|(set, _)| set)
    }

    /// Like [`DecisionSet::from_json`], also reporting which layout was found
    pub fn parse(json: &str, source_name: &str) -> Result<(Self, DecisionLayout)> {
        let RawPlan(raw) = serde_json::from_str(json)
            .map_err(|e| PhotoError::malformed(source_name, e.to_string()))?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut legacy_entries = 0usize;
        let mut current_entries = 0usize;
        let mut groups: BTreeMap<String, GroupDecision> = BTreeMap::new();

        for (group_id, raw_group) in raw {
            if groups.contains_key(&group_id) {
                return Err(PhotoError::malformed(
                    source_name,
                    format!("group '{}' appears more than once", group_id),
                ));
            }

            let mut convert = |entries: Vec<RawEntry>| -> Result<Vec<DecisionEntry>> {
                entries
                    .into_iter()
                    .map(|entry| {
                        let entry = match entry {
                            RawEntry::Legacy(path) => {
                                legacy_entries += 1;
                                DecisionEntry::new(path, None)
                            }
                            RawEntry::Current { path, size } => {
                                current_entries += 1;
                                DecisionEntry::new(path, size)
                            }
                        };
                        if entry.path.trim().is_empty() {
                            return Err(PhotoError::malformed(
                                source_name,
                                format!("group '{}' has an entry with an empty path", group_id),
                            ));
                        }
                        if !seen.insert(entry.path.clone()) {
                            return Err(PhotoError::malformed(
                                source_name,
                                format!("path '{}' appears more than once", entry.path),
                            ));
                        }
                        Ok(entry)
                    })
                    .collect()
            };

            let keep = convert(raw_group.keep)?;
            let delete = convert(raw_group.delete)?;

            if keep.is_empty() && !delete.is_empty() {
                tracing::warn!(group = %group_id, "group keeps nothing; every member is marked for deletion");
            }

            groups.insert(group_id, GroupDecision { keep, delete });
        }

        let layout = match (current_entries, legacy_entries) {
            (0, 0) => DecisionLayout::Empty,
            (_, 0) => DecisionLayout::Current,
            (0, _) => DecisionLayout::Legacy,
            _ => DecisionLayout::Mixed,
        };
        tracing::info!(source = source_name, %layout, groups = groups.len(), "loaded decisions");

        Ok((Self { groups }, layout))
    }

    /// Read and parse a decision file from disk
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_layout(path).map(|(set, _)| set)
    }

    pub fn load_with_layout(path: &Path) -> Result<(Self, DecisionLayout)> {
        let contents = std::fs::read_to_string(path).map_err(|e| PhotoError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&contents, &path.display().to_string())
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PhotoError::Serialize {
            message: e.to_string(),
        })
    }

    /// Write the plan as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| PhotoError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn get(&self, group_id: &str) -> Option<&GroupDecision> {
        self.groups.get(group_id)
    }

    /// Groups in natural id order ("2" before "10")
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupDecision)> {
        let mut entries: Vec<(&str, &GroupDecision)> =
            self.groups.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|(a, _), (b, _)| {
            (a.parse::<u64>().ok(), *a).cmp(&(b.parse::<u64>().ok(), *b))
        });
        entries.into_iter()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn keep_paths(&self) -> Vec<&str> {
        self.iter()
            .flat_map(|(_, g)| g.keep.iter().map(|e| e.path.as_str()))
            .collect()
    }

    pub fn delete_paths(&self) -> Vec<&str> {
        self.iter()
            .flat_map(|(_, g)| g.delete.iter().map(|e| e.path.as_str()))
            .collect()
    }

    pub fn space_savings(&self) -> SpaceSavings {
        SpaceSavings::from_entries(self.groups.values().flat_map(|g| g.delete.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_layout_has_unavailable_savings() {
        let json = r#"{"1": {"keep": ["/p/a.jpg"], "delete": ["/p/b.jpg", "/p/c.jpg"]}}"#;
        let set = DecisionSet::from_json(json, "legacy.json").unwrap();
        assert_eq!(set.space_savings(), SpaceSavings::Unavailable);
        assert_eq!(set.space_savings().to_string(), "unavailable");
        assert_eq!(set.delete_paths(), vec!["/p/b.jpg", "/p/c.jpg"]);
    }

    #[test]
    fn test_current_layout_sums_sizes() {
        let json = r#"{
            "1": {"keep": [{"path": "a.jpg", "size": 10}], "delete": [{"path": "b.jpg", "size": 7}]},
            "2": {"keep": [{"path": "c.jpg", "size": 1}], "delete": [{"path": "d.jpg", "size": 5}]}
        }"#;
        let set = DecisionSet::from_json(json, "d.json").unwrap();
        assert_eq!(set.space_savings(), SpaceSavings::Known(12));
        assert_eq!(set.space_savings().bytes(), Some(12));
    }

    #[test]
    fn test_mixed_entries_give_partial_savings() {
        let json = r#"{"1": {"keep": ["a.jpg"], "delete": [{"path": "b.jpg", "size": 7}, "c.jpg"]}}"#;
        let set = DecisionSet::from_json(json, "d.json").unwrap();
        assert_eq!(
            set.space_savings(),
            SpaceSavings::Partial { known_bytes: 7, unknown_entries: 1 }
        );
    }

    #[test]
    fn test_zero_size_is_known_zero() {
        let json = r#"{"1": {"keep": [{"path": "a"}], "delete": [{"path": "b", "size": 0}]}}"#;
        let set = DecisionSet::from_json(json, "d.json").unwrap();
        assert_eq!(set.space_savings(), SpaceSavings::Known(0));
        assert_eq!(set.get("1").unwrap().keep[0].size, None);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let set = DecisionSet::from_json(r#"{"1": {"keep": ["a.jpg"]}}"#, "d.json").unwrap();
        assert!(set.get("1").unwrap().delete.is_empty());
        assert_eq!(set.space_savings(), SpaceSavings::Known(0));
    }

    #[test]
    fn test_malformed_shapes_are_rejected() {
        let bad = [
            "[]",
            r#"{"1": ["a.jpg"]}"#,
            r#"{"1": {"keep": "a.jpg"}}"#,
            r#"{"1": {"keep": [42]}}"#,
            r#"{"1": {"delete": [{"size": 3}]}}"#,
            r#"{"1": {"delete": [{"path": "a", "size": -1}]}}"#,
            r#"{"1": {"keep": [""]}}"#,
            "not json",
        ];
        for json in bad {
            let err = DecisionSet::from_json(json, "bad.json").unwrap_err();
            assert!(
                matches!(err, PhotoError::MalformedDecisionInput { .. }),
                "expected malformed for {}",
                json
            );
        }
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let json = r#"{"1": {"keep": ["a.jpg"], "delete": ["a.jpg"]}}"#;
        assert!(DecisionSet::from_json(json, "d.json").is_err());
        let json = r#"{"1": {"keep": ["a.jpg"]}, "2": {"delete": ["a.jpg"]}}"#;
        assert!(DecisionSet::from_json(json, "d.json").is_err());
    }

    #[test]
    fn test_layout_detection() {
        let (_, layout) = DecisionSet::parse(r#"{"1": {"keep": ["a"]}}"#, "d").unwrap();
        assert_eq!(layout, DecisionLayout::Legacy);
        let (_, layout) = DecisionSet::parse(r#"{"1": {"keep": [{"path": "a", "size": 1}]}}"#, "d").unwrap();
        assert_eq!(layout, DecisionLayout::Current);
        let (_, layout) = DecisionSet::parse(r#"{"1": {"keep": ["a"], "delete": [{"path": "b"}]}}"#, "d").unwrap();
        assert_eq!(layout, DecisionLayout::Mixed);
        let (set, layout) = DecisionSet::parse("{}", "d").unwrap();
        assert_eq!(layout, DecisionLayout::Empty);
        assert!(set.is_empty());
    }

    #[test]
    fn test_natural_group_order() {
        let json = r#"{"10": {"keep": ["j"]}, "2": {"keep": ["b"]}, "1": {"keep": ["a"]}}"#;
        let set = DecisionSet::from_json(json, "d.json").unwrap();
        let ids: Vec<&str> = set.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_unknown_size_is_omitted_when_serialized() {
        let set = DecisionSet::from_json(r#"{"1": {"keep": ["a.jpg"]}}"#, "d.json").unwrap();
        let json = set.to_json_pretty().unwrap();
        assert!(json.contains("\"path\": \"a.jpg\""));
        assert!(!json.contains("size"));
    }

    #[test]
    fn test_repeated_group_id_is_malformed() {
        let json = r#"{
            "1": {"keep": ["x.jpg"], "delete": ["y.jpg"]},
            "1": {"keep": ["y.jpg"], "delete": ["x.jpg"]}
        }"#;
        let err = DecisionSet::from_json(json, "swapped.json").unwrap_err();
        assert!(matches!(err, PhotoError::MalformedDecisionInput { .. }));
        assert!(err.to_string().contains("group '1' appears more than once"));
    }

    #[test]
    fn test_repeated_list_inside_group_is_malformed() {
        let json = r#"{"1": {"keep": ["x.jpg"], "keep": ["y.jpg"], "delete": []}}"#;
        let err = DecisionSet::from_json(json, "d.json").unwrap_err();
        assert!(matches!(err, PhotoError::MalformedDecisionInput { .. }));
    }

    #[test]
    fn test_huge_sizes_saturate_instead_of_overflowing() {
        let json = format!(
            r#"{{"1": {{"keep": ["a"], "delete": [{{"path": "b", "size": {}}}, {{"path": "c", "size": 1}}]}}}}"#,
            u64::MAX
        );
        let set = DecisionSet::from_json(&json, "d.json").unwrap();
        assert_eq!(set.space_savings(), SpaceSavings::Known(u64::MAX));

        let partial = format!(
            r#"{{"1": {{"keep": ["a"], "delete": [{{"path": "b", "size": {}}}, {{"path": "c", "size": 9}}, "d"]}}}}"#,
            u64::MAX
        );
        let set = DecisionSet::from_json(&partial, "d.json").unwrap();
        assert_eq!(
            set.space_savings(),
            SpaceSavings::Partial { known_bytes: u64::MAX, unknown_entries: 1 }
        );
    }
}
