use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::fingerprint::ImageRecord;

/// Default Hamming distance threshold over the 64-bit hash
pub const DEFAULT_THRESHOLD: u32 = 15;

/// Disjoint-set forest over arena indices `0..n`.
///
/// Union always hangs the larger root under the smaller one, so the
/// representative of a set is its smallest index and the final partition
/// depends only on the order of the indices, never on merge history.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of `i`, compressing the path on the way up.
    pub fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`. Returns false when already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        match ra.cmp(&rb) {
            Ordering::Equal => false,
            Ordering::Less => {
                self.parent[rb] = ra;
                true
            }
            Ordering::Greater => {
                self.parent[ra] = rb;
                true
            }
        }
    }

    /// Sets with two or more members, each sorted, ordered by smallest member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        by_root.into_values().filter(|m| m.len() > 1).collect()
    }
}

/// Images whose hashes are transitively within the threshold of each other.
/// Members are in canonical (identifier) order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityGroup {
    pub members: Vec<ImageRecord>,
}

impl SimilarityGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }

    /// Largest pairwise distance inside the group
    pub fn max_distance(&self) -> u32 {
        let mut max = 0;
        for (i, a) in self.members.iter().enumerate() {
            for b in &self.members[i + 1..] {
                max = max.max(a.hash.distance(&b.hash));
            }
        }
        max
    }
}

/// Canonical arena order: identifier first, then the remaining fields so that
/// even duplicate identifiers sort the same way on every run.
fn canonical_order(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    a.id.cmp(&b.id)
        .then_with(|| a.hash.cmp(&b.hash))
        .then_with(|| a.byte_len.cmp(&b.byte_len))
        .then_with(|| (a.width, a.height).cmp(&(b.width, b.height)))
        .then_with(|| a.sharpness.total_cmp(&b.sharpness))
}

/// Group records whose hashes are within `threshold` of each other,
/// transitively: A~B and B~C put A, B and C together even if A and C are far
/// apart. Singletons are dropped.
///
/// Output is independent of input order: records are placed in an arena in
/// canonical order, pairs are compared in index order, and groups come back
/// sorted by their first member.
pub fn cluster(records: &[ImageRecord], threshold: u32) -> Vec<SimilarityGroup> {
    let mut arena: Vec<&ImageRecord> = records.iter().collect();
    arena.sort_by(|a, b| canonical_order(a, b));

    let n = arena.len();
    let mut sets = DisjointSet::new(n);
    let mut merges = 0usize;

    for i in 0..n {
        for j in (i + 1)..n {
            if arena[i].hash.distance(&arena[j].hash) <= threshold && sets.union(i, j) {
                merges += 1;
            }
        }
    }

    let groups: Vec<SimilarityGroup> = sets
        .components()
        .into_iter()
        .map(|indices| SimilarityGroup {
            members: indices.into_iter().map(|i| arena[i].clone()).collect(),
        })
        .collect();

    tracing::info!(
        records = n,
        merges,
        groups = groups.len(),
        threshold,
        "clustered fingerprints"
    );

    groups
}
