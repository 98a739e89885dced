//! Alignment-quality filters applied to individual reads.
//!
//! The pure functions here only look at a read's edit operations and, where needed, a window
//! of reference sequence; `ReadFilter` combines them with the thresholds from `FilterParams`.

use super::{
    cigar::{Cigar, CigarOp},
    AlignedRead,
};
use crate::strprof::align::AlleleCall;
use std::fmt;

/// Number of `Match` bases from each end of the aligned region to the nearest indel.
///
/// Leading and trailing clips are ignored. The left value is measured to the first indel and
/// the right value from the last one; `(-1, -1)` means the alignment has no indel at all.
pub fn dist_to_indel(ops: &[CigarOp]) -> (i64, i64) {
    let aligned = ops.iter().filter(|op| !op.is_clip()).collect::<Vec<_>>();
    let first_indel = aligned.iter().position(|op| op.is_indel());
    let last_indel = aligned.iter().rposition(|op| op.is_indel());

    let (first_indel, last_indel) = match (first_indel, last_indel) {
        (Some(first), Some(last)) => (first, last),
        _ => return (-1, -1),
    };

    let count_matches = |ops: &[&CigarOp]| -> i64 {
        ops.iter()
            .map(|op| match op {
                CigarOp::Match(len) => *len as i64,
                _ => 0,
            })
            .sum()
    };

    (
        count_matches(&aligned[..first_indel]),
        count_matches(&aligned[last_indel + 1..]),
    )
}

/// A run of `Match` bases: read offset, reference position and length.
#[derive(Debug, Clone, Copy, PartialEq)]
struct MatchRun {
    query_pos: usize,
    ref_pos: i64,
    len: usize,
}

fn match_runs(ops: &[CigarOp], ref_pos: i64) -> Vec<MatchRun> {
    let mut runs = Vec::new();
    let mut query_pos = 0;
    let mut ref_pos = ref_pos;
    for op in ops {
        if let CigarOp::Match(len) = op {
            runs.push(MatchRun {
                query_pos,
                ref_pos,
                len: *len as usize,
            });
        }
        query_pos += op.get_query_len() as usize;
        ref_pos += op.get_ref_len();
    }
    runs
}

fn base_matches(bases: &[u8], query_pos: usize, window: &[u8], window_pos: i64) -> Option<bool> {
    if window_pos < 0 {
        return None;
    }
    let ref_base = window.get(window_pos as usize)?;
    Some(bases.get(query_pos) == Some(ref_base))
}

/// Consecutive matches walking right from the start of a run placed `shift` bases off its
/// aligned position. `None` if the placement leaves the window.
fn leading_matches(
    bases: &[u8],
    run: &MatchRun,
    window: &[u8],
    window_start: i64,
    shift: i64,
) -> Option<usize> {
    let start = run.ref_pos + shift - window_start;
    let mut count = 0;
    for offset in 0..run.len {
        if !base_matches(bases, run.query_pos + offset, window, start + offset as i64)? {
            break;
        }
        count += 1;
    }
    Some(count)
}

/// Consecutive matches walking left from the end of a run placed `shift` bases off its
/// aligned position. `None` if the placement leaves the window.
fn trailing_matches(
    bases: &[u8],
    run: &MatchRun,
    window: &[u8],
    window_start: i64,
    shift: i64,
) -> Option<usize> {
    let end = run.ref_pos + run.len as i64 + shift - window_start;
    let query_end = run.query_pos + run.len;
    let mut count = 0;
    for offset in 1..=run.len {
        if !base_matches(bases, query_end - offset, window, end - offset as i64)? {
            break;
        }
        count += 1;
    }
    Some(count)
}

fn window_covers(alignment: &Cigar, window: &[u8], window_start: i64) -> bool {
    alignment.ref_pos >= window_start && alignment.ref_end() <= window_start + window.len() as i64
}

/// Counts exact matches against the reference at each end of the alignment.
///
/// The left count starts at the first compared base and stops at the first mismatch or at the
/// end of the first `Match` run; the right count mirrors it from the last compared base.
/// Soft-clipped bases are skipped without comparison. Returns `(-1, -1)` when `ref_window`
/// (starting at `window_start`) does not cover the full reference span of the alignment.
pub fn count_end_matches(read: &AlignedRead, ref_window: &[u8], window_start: i64) -> (i64, i64) {
    let alignment = read.ref_cigar();
    if !window_covers(&alignment, ref_window, window_start) {
        return (-1, -1);
    }

    let bases = read.ref_oriented_bases();
    let runs = match_runs(&alignment.ops, alignment.ref_pos);
    let (first, last) = match (runs.first(), runs.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return (0, 0),
    };

    let left = leading_matches(&bases, first, ref_window, window_start, 0);
    let right = trailing_matches(&bases, last, ref_window, window_start, 0);
    match (left, right) {
        (Some(left), Some(right)) => (left as i64, right as i64),
        _ => (-1, -1),
    }
}

/// Checks that neither end of the read would match the reference equally well or better if
/// the read were shifted by up to `max_shift` bases in either direction.
///
/// Reads whose shifted placements fall outside the window cannot be checked and fail.
pub fn has_maximal_end_matches(
    read: &AlignedRead,
    ref_window: &[u8],
    window_start: i64,
    max_shift: usize,
) -> bool {
    let ops = read.ref_oriented_ops();
    let bases = read.ref_oriented_bases();
    let runs = match_runs(&ops, read.ref_pos);
    let (first, last) = match (runs.first(), runs.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return false,
    };

    let max_shift = max_shift as i64;
    let shifts = (-max_shift..=max_shift).filter(|shift| *shift != 0);

    let left_ok = match leading_matches(&bases, first, ref_window, window_start, 0) {
        Some(aligned) => shifts.clone().all(|shift| {
            leading_matches(&bases, first, ref_window, window_start, shift)
                .is_some_and(|shifted| shifted < aligned)
        }),
        None => false,
    };
    if !left_ok {
        return false;
    }

    match trailing_matches(&bases, last, ref_window, window_start, 0) {
        Some(aligned) => shifts.clone().all(|shift| {
            trailing_matches(&bases, last, ref_window, window_start, shift)
                .is_some_and(|shifted| shifted < aligned)
        }),
        None => false,
    }
}

/// Thresholds used by `ReadFilter`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    /// Minimum number of matched bases between either read end and the nearest indel
    pub min_bp_before_indel: i64,
    /// Minimum number of exact matches at each read end
    pub min_read_end_match: i64,
    /// Window (in bases) for the maximal end match check; 0 disables it
    pub maximal_end_match_window: usize,
    /// Maximum allowed mismatch score
    pub max_mapq: u32,
    /// Reject reads carrying soft or hard clips
    pub filter_clipped: bool,
    /// Reject reads whose length difference is not a whole number of repeat units
    pub require_unit: bool,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            min_bp_before_indel: 7,
            min_read_end_match: 5,
            maximal_end_match_window: 15,
            max_mapq: 100,
            filter_clipped: false,
            require_unit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterReason {
    Clipped,
    NearIndel,
    ShortEndMatch,
    NotMaximalEndMatch,
    HighMapq,
    NonUnitLength,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FilterReason::Clipped => "clipped",
            FilterReason::NearIndel => "indel near read end",
            FilterReason::ShortEndMatch => "short end match",
            FilterReason::NotMaximalEndMatch => "end match not maximal",
            FilterReason::HighMapq => "high mismatch score",
            FilterReason::NonUnitLength => "non-unit length difference",
        };
        write!(f, "{}", label)
    }
}

/// Reference context a read is filtered against.
pub struct RefWindow<'a> {
    pub seq: &'a [u8],
    pub start: i64,
    pub motif_len: usize,
}

pub struct ReadFilter<'a> {
    params: &'a FilterParams,
}

impl<'a> ReadFilter<'a> {
    pub fn new(params: &'a FilterParams) -> Self {
        ReadFilter { params }
    }

    /// Returns the first filter the read fails, or `None` if it passes all of them.
    pub fn check(
        &self,
        read: &AlignedRead,
        call: &AlleleCall,
        mapq: u32,
        window: &RefWindow,
    ) -> Option<FilterReason> {
        let params = self.params;

        if params.filter_clipped && read.cigar.iter().any(|op| op.is_clip()) {
            return Some(FilterReason::Clipped);
        }

        let (left_dist, right_dist) = dist_to_indel(&read.ref_oriented_ops());
        if left_dist >= 0
            && (left_dist < params.min_bp_before_indel || right_dist < params.min_bp_before_indel)
        {
            return Some(FilterReason::NearIndel);
        }

        let (left_matches, right_matches) = count_end_matches(read, window.seq, window.start);
        if left_matches < params.min_read_end_match || right_matches < params.min_read_end_match
        {
            return Some(FilterReason::ShortEndMatch);
        }

        if params.maximal_end_match_window > 0
            && !has_maximal_end_matches(
                read,
                window.seq,
                window.start,
                params.maximal_end_match_window,
            )
        {
            return Some(FilterReason::NotMaximalEndMatch);
        }

        if mapq > params.max_mapq {
            return Some(FilterReason::HighMapq);
        }

        if params.require_unit
            && window.motif_len > 0
            && call.diff_from_ref % window.motif_len as i64 != 0
        {
            return Some(FilterReason::NonUnitLength);
        }

        None
    }
}
