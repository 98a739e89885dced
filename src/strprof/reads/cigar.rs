use crate::strprof::error::{ReadError, ReadResult};
use itertools::Itertools;
use rust_htslib::bam::record::Cigar as HtsCigarOp;
use std::fmt;

/// A single run-length encoded edit operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum CigarOp {
    Match(u32),
    Ins(u32),
    Del(u32),
    SoftClip(u32),
    HardClip(u32),
}

impl CigarOp {
    pub fn run_len(&self) -> u32 {
        match self {
            CigarOp::Match(len)
            | CigarOp::Ins(len)
            | CigarOp::Del(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len) => *len,
        }
    }

    pub fn get_ref_len(&self) -> i64 {
        match self {
            CigarOp::Match(len) | CigarOp::Del(len) => *len as i64,
            CigarOp::Ins(_) | CigarOp::SoftClip(_) | CigarOp::HardClip(_) => 0,
        }
    }

    pub fn get_query_len(&self) -> i64 {
        match self {
            CigarOp::Match(len) | CigarOp::Ins(len) | CigarOp::SoftClip(len) => *len as i64,
            CigarOp::Del(_) | CigarOp::HardClip(_) => 0,
        }
    }

    pub fn is_indel(&self) -> bool {
        matches!(self, CigarOp::Ins(_) | CigarOp::Del(_))
    }

    pub fn is_clip(&self) -> bool {
        matches!(self, CigarOp::SoftClip(_) | CigarOp::HardClip(_))
    }

    pub fn char(&self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Ins(_) => 'I',
            CigarOp::Del(_) => 'D',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
        }
    }

    fn from_char(kind: char, len: u32) -> Option<CigarOp> {
        match kind {
            'M' => Some(CigarOp::Match(len)),
            'I' => Some(CigarOp::Ins(len)),
            'D' => Some(CigarOp::Del(len)),
            'S' => Some(CigarOp::SoftClip(len)),
            'H' => Some(CigarOp::HardClip(len)),
            _ => None,
        }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.run_len(), self.char())
    }
}

impl TryFrom<&HtsCigarOp> for CigarOp {
    type Error = ReadError;

    fn try_from(op: &HtsCigarOp) -> ReadResult<Self> {
        match op {
            HtsCigarOp::Match(len) | HtsCigarOp::Equal(len) | HtsCigarOp::Diff(len) => {
                Ok(CigarOp::Match(*len))
            }
            HtsCigarOp::Ins(len) => Ok(CigarOp::Ins(*len)),
            HtsCigarOp::Del(len) => Ok(CigarOp::Del(*len)),
            HtsCigarOp::SoftClip(len) => Ok(CigarOp::SoftClip(*len)),
            HtsCigarOp::HardClip(len) => Ok(CigarOp::HardClip(*len)),
            HtsCigarOp::RefSkip(_) | HtsCigarOp::Pad(_) => Err(ReadError::format(
                op.to_string(),
                "reference skips and padding are not supported",
            )),
        }
    }
}

impl From<&CigarOp> for HtsCigarOp {
    fn from(op: &CigarOp) -> Self {
        match *op {
            CigarOp::Match(len) => HtsCigarOp::Match(len),
            CigarOp::Ins(len) => HtsCigarOp::Ins(len),
            CigarOp::Del(len) => HtsCigarOp::Del(len),
            CigarOp::SoftClip(len) => HtsCigarOp::SoftClip(len),
            CigarOp::HardClip(len) => HtsCigarOp::HardClip(len),
        }
    }
}

/// Parses compact CIGAR text such as `5H3S1M5D33M7S`.
///
/// Runs are kept exactly as written; adjacent runs of the same kind are not merged.
pub fn parse_cigar(text: &str) -> ReadResult<Vec<CigarOp>> {
    let mut ops = Vec::new();
    let mut len: Option<u32> = None;

    for c in text.chars() {
        if let Some(digit) = c.to_digit(10) {
            let current = len.unwrap_or(0);
            let extended = current
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| ReadError::format(text, "operation length overflows"))?;
            len = Some(extended);
            continue;
        }

        let run_len = len
            .take()
            .ok_or_else(|| ReadError::format(text, format!("operation '{}' has no length", c)))?;
        if run_len == 0 {
            return Err(ReadError::format(
                text,
                format!("operation '{}' has zero length", c),
            ));
        }
        let op = CigarOp::from_char(c, run_len)
            .ok_or_else(|| ReadError::format(text, format!("unknown operation '{}'", c)))?;
        ops.push(op);
    }

    if len.is_some() {
        return Err(ReadError::format(text, "trailing length without operation"));
    }

    Ok(ops)
}

pub fn format_cigar(ops: &[CigarOp]) -> String {
    ops.iter().join("")
}

/// Reference-orders a sequencing-ordered op list.
pub fn ref_oriented(ops: &[CigarOp], is_reverse: bool) -> Vec<CigarOp> {
    if is_reverse {
        ops.iter().rev().copied().collect()
    } else {
        ops.to_vec()
    }
}

pub fn query_len(ops: &[CigarOp]) -> usize {
    ops.iter().map(|op| op.get_query_len() as usize).sum()
}

pub fn ref_len(ops: &[CigarOp]) -> i64 {
    ops.iter().map(|op| op.get_ref_len()).sum()
}

/// Edit operations anchored at a reference coordinate.
#[derive(Debug, PartialEq, Clone)]
pub struct Cigar {
    pub ref_pos: i64,
    pub ops: Vec<CigarOp>,
}

impl Cigar {
    pub fn query_len(&self) -> usize {
        query_len(&self.ops)
    }

    pub fn ref_len(&self) -> i64 {
        ref_len(&self.ops)
    }

    pub fn ref_end(&self) -> i64 {
        self.ref_pos + self.ref_len()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_cigar(&self.ops))
    }
}
