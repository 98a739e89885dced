use super::ReadAligner;
use crate::strprof::error::{ReadError, ReadResult};
use crate::strprof::reads::{cigar, AlignedRead, CigarOp};

/// Reference coordinates of an annotated repeat.
///
/// Indel anchors are attributed to the repeat when `start <= anchor <= end`; covered bases
/// are counted over the half-open span `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInterval {
    pub start: i64,
    pub end: i64,
}

impl RepeatInterval {
    pub fn new(start: i64, end: i64) -> Self {
        RepeatInterval { start, end }
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub(super) fn anchors(&self, pos: i64) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub(super) fn covers(&self, pos: i64) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// The side of the repeat (in reference coordinates) that a partial read reliably reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Right,
}

/// Repeat length call derived from a single read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlleleCall {
    /// Signed difference between the read's repeat length and the reference repeat length
    pub diff_from_ref: i64,
    /// Read bases attributed to the repeat, in sequencing orientation
    pub detected_repeat: String,
}

/// Tracks the reference-ordered read positions attributed to the repeat.
#[derive(Debug, Default)]
pub(super) struct RepeatBases {
    first: Option<usize>,
    last: usize,
    count: usize,
}

impl RepeatBases {
    pub(super) fn add(&mut self, pos: usize) {
        self.add_run(pos, 1);
    }

    pub(super) fn add_run(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        self.first = Some(self.first.map_or(pos, |first| first.min(pos)));
        self.last = self.last.max(pos + len);
        self.count += len;
    }

    pub(super) fn count(&self) -> usize {
        self.count
    }

    /// Half-open span from the first to the last attributed position.
    pub(super) fn span(&self) -> Option<(usize, usize)> {
        self.first.map(|first| (first, self.last))
    }

    /// Span of `count` positions starting at the first attributed one.
    pub(super) fn span_from_first(&self) -> Option<(usize, usize)> {
        self.first.map(|first| (first, first + self.count))
    }

    /// Span of `count` positions ending at the last attributed one.
    pub(super) fn span_to_last(&self) -> Option<(usize, usize)> {
        self.first
            .map(|_| (self.last.saturating_sub(self.count), self.last))
    }
}

/// Extracts a reference-ordered span from the read, mirroring it onto the stored sequence for
/// reverse strand reads.
pub(super) fn extract_repeat(read: &AlignedRead, span: Option<(usize, usize)>) -> String {
    let Some((start, end)) = span else {
        return String::new();
    };
    let end = end.min(read.len());
    let start = start.min(end);
    let (start, end) = read.stored_range(start, end);
    String::from_utf8_lossy(&read.bases[start..end]).into_owned()
}

impl ReadAligner<'_> {
    /// Infers how much longer or shorter the repeat is in `read` than in the reference.
    ///
    /// `ops` are in the read's sequencing orientation (as stored on `read`); they are reversed
    /// into reference order for reverse strand reads. Walking from `read.ref_pos`, every
    /// insertion or deletion anchored inside `repeat` (boundaries included) adds its signed
    /// length; indels in the flanks are ignored.
    pub fn get_str_allele(
        &self,
        read: &AlignedRead,
        ops: &[CigarOp],
        repeat: &RepeatInterval,
    ) -> ReadResult<AlleleCall> {
        let ops_len = cigar::query_len(ops);
        if ops_len != read.len() {
            return Err(ReadError::inconsistent(
                &read.id,
                format!(
                    "CIGAR {} covers {} bases, read has {}",
                    cigar::format_cigar(ops),
                    ops_len,
                    read.len()
                ),
            ));
        }

        let mut ref_cursor = read.ref_pos;
        let mut read_cursor = 0;
        let mut diff_from_ref = 0;
        let mut repeat_bases = RepeatBases::default();

        for op in cigar::ref_oriented(ops, read.is_reverse) {
            match op {
                CigarOp::Match(len) => {
                    for offset in 0..len as usize {
                        if repeat.covers(ref_cursor + offset as i64) {
                            repeat_bases.add(read_cursor + offset);
                        }
                    }
                    ref_cursor += len as i64;
                    read_cursor += len as usize;
                }
                CigarOp::Ins(len) => {
                    if repeat.anchors(ref_cursor) {
                        diff_from_ref += len as i64;
                        repeat_bases.add_run(read_cursor, len as usize);
                    }
                    read_cursor += len as usize;
                }
                CigarOp::Del(len) => {
                    if repeat.anchors(ref_cursor) {
                        diff_from_ref -= len as i64;
                    }
                    ref_cursor += len as i64;
                }
                CigarOp::SoftClip(len) => read_cursor += len as usize,
                CigarOp::HardClip(_) => {}
            }
        }

        let call = AlleleCall {
            diff_from_ref,
            detected_repeat: extract_repeat(read, repeat_bases.span()),
        };
        log::trace!(
            "{}: diff {} over {}-{}",
            read.id,
            call.diff_from_ref,
            repeat.start,
            repeat.end
        );
        Ok(call)
    }
}
