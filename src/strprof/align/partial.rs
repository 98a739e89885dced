use super::allele::{extract_repeat, RepeatBases};
use super::{AlleleCall, Anchor, ReadAligner, RepeatInterval};
use crate::strprof::error::{ReadError, ReadResult};
use crate::strprof::reads::{cigar, AlignedRead, CigarOp};

impl ReadAligner<'_> {
    /// Estimates the repeat length difference for a read that reaches only the `anchor` side
    /// of the repeat.
    ///
    /// The reference span of matches and deletions inside `[start, end)` counts as covered.
    /// Insertions at or past the
    /// unobserved boundary cannot be placed in a flank with any confidence and are charged to
    /// the repeat in full. The detected repeat is anchored at the observed boundary. The
    /// read's `partial` flag is left as is.
    pub fn adjust_partial_alignment(
        &self,
        read: &AlignedRead,
        ops: &[CigarOp],
        anchor: Anchor,
        effective_start: i64,
        read_length: usize,
        repeat: &RepeatInterval,
    ) -> ReadResult<AlleleCall> {
        if read_length != read.len() {
            return Err(ReadError::inconsistent(
                &read.id,
                format!(
                    "declared length {} differs from read length {}",
                    read_length,
                    read.len()
                ),
            ));
        }
        let ops_len = cigar::query_len(ops);
        if ops_len != read_length {
            return Err(ReadError::inconsistent(
                &read.id,
                format!(
                    "CIGAR {} covers {} bases, read has {}",
                    cigar::format_cigar(ops),
                    ops_len,
                    read_length
                ),
            ));
        }
        if effective_start < 0 {
            return Err(ReadError::inconsistent(
                &read.id,
                format!("negative alignment start {}", effective_start),
            ));
        }

        let mut ref_cursor = effective_start;
        let mut read_cursor = 0;
        let mut repeat_bases = RepeatBases::default();
        let mut deleted_in_repeat = 0;

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
                    let unobserved = match anchor {
                        Anchor::Left => ref_cursor >= repeat.start,
                        Anchor::Right => ref_cursor <= repeat.end,
                    };
                    if unobserved {
                        repeat_bases.add_run(read_cursor, len as usize);
                    }
                    read_cursor += len as usize;
                }
                CigarOp::Del(len) => {
                    deleted_in_repeat += (ref_cursor..ref_cursor + len as i64)
                        .filter(|pos| repeat.covers(*pos))
                        .count();
                    ref_cursor += len as i64;
                }
                CigarOp::SoftClip(len) => read_cursor += len as usize,
                CigarOp::HardClip(_) => {}
            }
        }

        let span = match anchor {
            Anchor::Left => repeat_bases.span_from_first(),
            Anchor::Right => repeat_bases.span_to_last(),
        };
        let call = AlleleCall {
            diff_from_ref: (repeat_bases.count() + deleted_in_repeat) as i64 - repeat.len(),
            detected_repeat: extract_repeat(read, span),
        };
        log::trace!(
            "{}: partial ({:?}) diff {}",
            read.id,
            anchor,
            call.diff_from_ref
        );
        Ok(call)
    }
}
