//! Module for representing and building read information from alignment records.
//!

use super::cigar::{self, Cigar, CigarOp};
use crate::strprof::error::{ReadError, ReadResult};
use crate::utils::reverse_complement;
use rust_htslib::bam;
use std::str;

/// A read placed on the reference by the upstream aligner.
///
/// `bases`, `quals` and `cigar` are kept in sequencing orientation, i.e. for reverse strand
/// reads they run opposite to the reference. `ref_pos` is always the leftmost reference
/// coordinate of the alignment.
#[derive(PartialEq, Clone)]
pub struct AlignedRead {
    /// Unique identifier for the read.
    pub id: String,
    /// Flag indicating if the read is from the reverse strand.
    pub is_reverse: bool,
    /// Bases in sequencing orientation.
    pub bases: Vec<u8>,
    /// Raw Phred qualities, one per base.
    pub quals: Vec<u8>,
    /// Leftmost (0-based) reference coordinate of the alignment.
    pub ref_pos: i64,
    /// Edit operations in sequencing orientation.
    pub cigar: Vec<CigarOp>,
    /// Mapping quality reported by the aligner.
    pub mapq: u8,
    /// Set when the read reaches only one side of the repeat. Never cleared once set.
    pub partial: bool,
}

impl std::fmt::Debug for AlignedRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Read")
            .field("id", &self.id)
            .field("bases", &String::from_utf8_lossy(&self.bases))
            .field("ref_pos", &self.ref_pos)
            .field("is_reverse", &self.is_reverse)
            .field("cigar", &cigar::format_cigar(&self.cigar))
            .field("partial", &self.partial)
            .finish()
    }
}

impl AlignedRead {
    /// Creates an `AlignedRead` from an HTSlib record.
    ///
    /// BAM stores reverse strand reads reverse complemented; they are flipped back into
    /// sequencing orientation here.
    pub fn from_hts_rec(rec: &bam::Record) -> ReadResult<AlignedRead> {
        let id = str::from_utf8(rec.qname())
            .map_err(|e| ReadError::inconsistent("?", format!("read name is not UTF-8: {}", e)))?
            .to_string();
        let is_reverse = rec.is_reverse();
        let mut bases = rec.seq().as_bytes();
        let mut quals = rec.qual().to_vec();
        let mut ops = rec
            .cigar()
            .iter()
            .map(CigarOp::try_from)
            .collect::<ReadResult<Vec<_>>>()?;

        if is_reverse {
            bases = reverse_complement(&bases);
            quals.reverse();
            ops.reverse();
        }

        let read = AlignedRead {
            id,
            is_reverse,
            bases,
            quals,
            ref_pos: rec.pos(),
            cigar: ops,
            mapq: rec.mapq(),
            partial: false,
        };
        read.check_consistency(&read.cigar)?;
        Ok(read)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// One past the rightmost reference coordinate covered by the alignment.
    pub fn ref_end(&self) -> i64 {
        self.ref_cigar().ref_end()
    }

    /// The alignment in reference order, anchored at `ref_pos`.
    pub fn ref_cigar(&self) -> Cigar {
        Cigar {
            ref_pos: self.ref_pos,
            ops: self.ref_oriented_ops(),
        }
    }

    pub fn ref_oriented_ops(&self) -> Vec<CigarOp> {
        cigar::ref_oriented(&self.cigar, self.is_reverse)
    }

    pub fn ref_oriented_bases(&self) -> Vec<u8> {
        if self.is_reverse {
            reverse_complement(&self.bases)
        } else {
            self.bases.clone()
        }
    }

    pub fn ref_oriented_quals(&self) -> Vec<u8> {
        if self.is_reverse {
            self.quals.iter().rev().copied().collect()
        } else {
            self.quals.clone()
        }
    }

    /// Maps a half-open range of reference-ordered read positions onto the stored sequence.
    pub fn stored_range(&self, start: usize, end: usize) -> (usize, usize) {
        if self.is_reverse {
            (self.len() - end, self.len() - start)
        } else {
            (start, end)
        }
    }

    /// Checks that `ops` account for exactly the stored bases and qualities.
    pub fn check_consistency(&self, ops: &[CigarOp]) -> ReadResult<()> {
        if self.quals.len() != self.bases.len() {
            return Err(ReadError::inconsistent(
                &self.id,
                format!(
                    "{} qualities for {} bases",
                    self.quals.len(),
                    self.bases.len()
                ),
            ));
        }
        let ops_len = cigar::query_len(ops);
        if ops_len != self.bases.len() {
            return Err(ReadError::inconsistent(
                &self.id,
                format!(
                    "CIGAR {} covers {} bases, read has {}",
                    cigar::format_cigar(ops),
                    ops_len,
                    self.bases.len()
                ),
            ));
        }
        Ok(())
    }
}
