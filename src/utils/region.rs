use crate::utils::Result;
use std::fmt;

/// Half-open, 0-based interval on a reference contig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicRegion {
    pub contig: String,
    pub start: u32,
    pub end: u32,
}

impl GenomicRegion {
    pub fn new(contig: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        if start >= end {
            return Err(format!("Invalid region: start {} >= end {}", start, end));
        }

        Ok(Self {
            contig: contig.into(),
            start,
            end,
        })
    }

    pub fn from_string(encoding: &str) -> Result<Self> {
        let error_msg = || format!("Invalid region encoding: {}", encoding);
        let (contig, interval) = encoding.rsplit_once(':').ok_or_else(error_msg)?;
        let (start, end) = interval.split_once('-').ok_or_else(error_msg)?;
        if contig.is_empty() || contig.contains(':') {
            return Err(error_msg());
        }

        let start: u32 = start.parse().map_err(|_| error_msg())?;
        let end: u32 = end.parse().map_err(|_| error_msg())?;

        Self::new(contig, start, end)
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Region widened by `pad` bases on each side, as a BAM fetch definition.
    pub fn padded(&self, pad: u32) -> (&str, i64, i64) {
        (
            self.contig.as_str(),
            self.start.saturating_sub(pad) as i64,
            self.end as i64 + pad as i64,
        )
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}
