use super::ReadAligner;
use crate::strprof::error::{ReadError, ReadResult};

impl ReadAligner<'_> {
    /// Sums the Phred qualities of every read base that disagrees with the reference.
    ///
    /// `aligned` and `reference` are the two rows of a rendered alignment and must be the
    /// same length. Columns with a gap on either side never count as mismatches, and `quals`
    /// (Phred+33) is indexed by read base so it only advances on non-gap `aligned` columns.
    pub fn get_mapq(&self, aligned: &[u8], reference: &[u8], quals: &[u8]) -> ReadResult<u32> {
        if aligned.len() != reference.len() {
            return Err(ReadError::inconsistent(
                String::from_utf8_lossy(aligned),
                format!(
                    "aligned row has {} columns, reference row has {}",
                    aligned.len(),
                    reference.len()
                ),
            ));
        }

        let gap = self.params.gap;
        let mut score = 0;
        let mut qual_pos = 0;
        for (&read_base, &ref_base) in aligned.iter().zip(reference) {
            if read_base == gap {
                continue;
            }
            if ref_base != gap && read_base != ref_base {
                score += quals
                    .get(qual_pos)
                    .map_or(0, |qual| qual.saturating_sub(33) as u32);
            }
            qual_pos += 1;
        }
        Ok(score)
    }
}
