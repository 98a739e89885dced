use crate::strprof::{align::AlleleCall, reads::AlignedRead, reads::FilterReason};
use std::collections::BTreeMap;

/// A read that passed all filters, together with its allele call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfiledRead {
    pub read: AlignedRead,
    pub call: AlleleCall,
    /// Sum of the qualities of mismatched bases
    pub mismatch_score: u32,
}

#[derive(Debug, Default)]
pub struct LocusResult {
    pub reads: Vec<ProfiledRead>,
    /// Reads that overlapped the repeat but failed a filter, by reason
    pub filtered: BTreeMap<FilterReason, usize>,
    /// Reads that could not be analyzed at all
    pub num_unusable: usize,
    /// Reads dropped as PCR duplicates
    pub num_duplicates: usize,
}

impl LocusResult {
    pub fn empty() -> LocusResult {
        LocusResult::default()
    }

    pub fn num_filtered(&self) -> usize {
        self.filtered.values().sum()
    }
}
