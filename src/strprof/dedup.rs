//! PCR duplicate removal.
//!
//! Reads that start at the same position on the same strand and carry the same allele call
//! are treated as copies of one fragment; only the best scoring copy is kept.

use crate::strprof::reads::AlignedRead;
use crate::strprof::workflows::ProfiledRead;
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub ref_pos: i64,
    pub is_reverse: bool,
    pub diff_from_ref: i64,
}

impl DuplicateKey {
    pub fn of(read: &ProfiledRead) -> Self {
        DuplicateKey {
            ref_pos: read.read.ref_pos,
            is_reverse: read.read.is_reverse,
            diff_from_ref: read.call.diff_from_ref,
        }
    }
}

/// Mean base quality of the read; 0 for a read without bases.
pub fn score(read: &AlignedRead) -> f64 {
    if read.quals.is_empty() {
        return 0.0;
    }
    let total: u64 = read.quals.iter().map(|&q| q as u64).sum();
    total as f64 / read.quals.len() as f64
}

/// Highest scoring member of `cluster`; the first one wins ties.
pub fn representative(cluster: &[ProfiledRead]) -> Option<&ProfiledRead> {
    representative_index(cluster).map(|index| &cluster[index])
}

fn representative_index(cluster: &[ProfiledRead]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, member) in cluster.iter().enumerate() {
        let member_score = score(&member.read);
        match best {
            Some((_, best_score)) if member_score <= best_score => {}
            _ => best = Some((index, member_score)),
        }
    }
    best.map(|(index, _)| index)
}

/// Collapses duplicate clusters to their representatives.
///
/// Clusters are emitted in the order their first member appears in `reads`.
pub fn remove_duplicates(reads: Vec<ProfiledRead>) -> Vec<ProfiledRead> {
    let mut cluster_index: HashMap<DuplicateKey, usize> = HashMap::new();
    let mut clusters: Vec<Vec<ProfiledRead>> = Vec::new();
    for read in reads {
        let key = DuplicateKey::of(&read);
        let index = *cluster_index.entry(key).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[index].push(read);
    }

    clusters
        .into_par_iter()
        .filter_map(|mut cluster| {
            let index = representative_index(&cluster)?;
            Some(cluster.swap_remove(index))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strprof::align::AlleleCall;
    use crate::strprof::reads::test_utils::make_read;

    fn profiled(id: &str, ref_pos: i64, is_reverse: bool, diff: i64, qual: u8) -> ProfiledRead {
        let mut read = make_read("ACGTACGTAC", ref_pos, "10M", is_reverse);
        read.id = id.to_string();
        read.quals = vec![qual; 10];
        ProfiledRead {
            read,
            call: AlleleCall {
                diff_from_ref: diff,
                detected_repeat: String::new(),
            },
            mismatch_score: 0,
        }
    }

    fn ids(reads: &[ProfiledRead]) -> Vec<&str> {
        reads.iter().map(|r| r.read.id.as_str()).collect()
    }

    #[test]
    fn score_is_mean_quality() {
        let mut read = make_read("ACGT", 0, "4M", false);
        read.quals = vec![10, 20, 30, 40];
        assert_eq!(score(&read), 25.0);
        read.bases.clear();
        read.quals.clear();
        assert_eq!(score(&read), 0.0);
    }

    #[test]
    fn representative_prefers_quality_then_order() {
        let cluster = vec![
            profiled("a", 100, false, 0, 20),
            profiled("b", 100, false, 0, 35),
            profiled("c", 100, false, 0, 35),
        ];
        assert_eq!(representative(&cluster).unwrap().read.id, "b");
        assert!(representative(&[]).is_none());
    }

    #[test]
    fn duplicates_collapse_per_key() {
        let reads = vec![
            profiled("a", 100, false, 0, 20),
            profiled("b", 100, true, 0, 20),
            profiled("c", 100, false, 0, 30),
            profiled("d", 100, false, 3, 20),
            profiled("e", 200, false, 0, 20),
        ];
        let deduped = remove_duplicates(reads);
        assert_eq!(ids(&deduped), vec!["c", "b", "d", "e"]);
    }

    #[test]
    fn equal_scores_keep_first_read() {
        let reads = vec![
            profiled("first", 100, false, -2, 30),
            profiled("second", 100, false, -2, 30),
        ];
        assert_eq!(ids(&remove_duplicates(reads)), vec!["first"]);
    }

    #[test]
    fn removal_is_idempotent() {
        let reads = vec![
            profiled("a", 100, false, 0, 20),
            profiled("b", 100, false, 0, 25),
            profiled("c", 150, true, 4, 20),
            profiled("d", 150, true, 4, 20),
            profiled("e", 150, true, 2, 20),
        ];
        let once = remove_duplicates(reads);
        let twice = remove_duplicates(once.clone());
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["b", "c", "e"]);
    }
}
