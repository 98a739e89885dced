use super::ReadAligner;
use crate::strprof::reads::{RawRead, ReadPair};
use crate::utils::reverse_complement;

/// Largest fraction of overlap bases that may differ from the base one period earlier for the
/// overlap to still count as a short-period repeat.
const MAX_PERIODIC_MISMATCH_FRACTION: f64 = 0.1;

/// Placement of the downstream read relative to the upstream one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Overlap {
    /// True when mate 2 is the upstream read
    mate2_first: bool,
    offset: usize,
    len: usize,
    identity: f64,
}

impl ReadAligner<'_> {
    /// Merges two mates whose sequenced ranges overlap into a single consensus read.
    ///
    /// Mate 2 is reverse complemented onto mate 1's strand and both orders (mate 1 upstream
    /// or mate 2 upstream) are scanned. The best overlap must reach the identity threshold,
    /// must be the only placement with that score and must not be a short-period repeat. On
    /// success `pair.stitched` is set and `true` returned; otherwise the pair is unchanged.
    pub fn stitch_reads(&self, pair: &mut ReadPair) -> bool {
        let mate1 = &pair.mate1;
        if mate1.is_empty() || pair.mate2.is_empty() {
            return false;
        }
        if [mate1, &pair.mate2]
            .iter()
            .any(|mate| mate.bases.len() != mate.quals.len())
        {
            log::trace!("{}: mate qualities do not match bases", mate1.id);
            return false;
        }
        let mate2 = RawRead {
            id: pair.mate2.id.clone(),
            bases: reverse_complement(&pair.mate2.bases),
            quals: pair.mate2.quals.iter().rev().copied().collect(),
        };

        let candidates = self
            .scan_overlaps(&mate1.bases, &mate2.bases, false)
            .chain(self.scan_overlaps(&mate2.bases, &mate1.bases, true))
            .collect::<Vec<_>>();

        let Some(best) = unique_best(&candidates) else {
            log::trace!("{}: no unique overlap between mates", mate1.id);
            return false;
        };
        if best.identity < self.params.min_stitch_identity {
            log::trace!(
                "{}: best overlap identity {:.3} below threshold",
                mate1.id,
                best.identity
            );
            return false;
        }

        let (upstream, downstream) = if best.mate2_first {
            (&mate2, mate1)
        } else {
            (mate1, &mate2)
        };
        let overlap = &upstream.bases[best.offset..best.offset + best.len];
        if let Some(period) = short_period(overlap, self.params.max_stitch_period) {
            log::trace!(
                "{}: overlap is a period {} repeat, not stitching",
                mate1.id,
                period
            );
            return false;
        }

        let stitched = merge(upstream, downstream, best.offset, best.len);
        log::debug!(
            "{}: stitched mates into {} bases (overlap {}, identity {:.3})",
            mate1.id,
            stitched.len(),
            best.len,
            best.identity
        );
        pair.stitched = Some(stitched);
        true
    }

    /// Scores every placement of `downstream` starting inside `upstream` with enough overlap.
    fn scan_overlaps<'b>(
        &self,
        upstream: &'b [u8],
        downstream: &'b [u8],
        mate2_first: bool,
    ) -> impl Iterator<Item = Overlap> + 'b {
        let min_overlap = self.params.min_stitch_overlap.max(1);
        let last_offset = upstream.len().saturating_sub(min_overlap);
        let scannable = upstream.len() >= min_overlap && downstream.len() >= min_overlap;

        (0..=last_offset)
            .filter(move |_| scannable)
            .map(move |offset| {
                let len = (upstream.len() - offset).min(downstream.len());
                let matches = upstream[offset..offset + len]
                    .iter()
                    .zip(downstream)
                    .filter(|(a, b)| a == b)
                    .count();
                Overlap {
                    mate2_first,
                    offset,
                    len,
                    identity: matches as f64 / len as f64,
                }
            })
    }
}

/// Highest scoring overlap, or `None` if there are none or the top score is shared.
fn unique_best(candidates: &[Overlap]) -> Option<&Overlap> {
    let best = candidates
        .iter()
        .max_by(|a, b| a.identity.total_cmp(&b.identity))?;
    let ties = candidates
        .iter()
        .filter(|candidate| candidate.identity == best.identity)
        .count();
    (ties == 1).then_some(best)
}

/// Returns the shortest period up to `max_period` at which `seq` repeats itself, allowing a
/// small fraction of mismatches.
fn short_period(seq: &[u8], max_period: usize) -> Option<usize> {
    (1..=max_period)
        .filter(|period| seq.len() >= 2 * period)
        .find(|&period| {
            let mismatches = seq
                .iter()
                .skip(period)
                .zip(seq)
                .filter(|(a, b)| a != b)
                .count();
            mismatches as f64 <= MAX_PERIODIC_MISMATCH_FRACTION * (seq.len() - period) as f64
        })
}

/// Builds the consensus of two reads where `downstream` starts at `offset` in `upstream` and
/// the two share `overlap_len` bases.
fn merge(upstream: &RawRead, downstream: &RawRead, offset: usize, overlap_len: usize) -> RawRead {
    let total_len = (offset + downstream.len()).max(upstream.len());
    let mut bases = Vec::with_capacity(total_len);
    let mut quals = Vec::with_capacity(total_len);

    bases.extend_from_slice(&upstream.bases[..offset]);
    quals.extend_from_slice(&upstream.quals[..offset]);

    for i in 0..overlap_len {
        let up_qual = upstream.quals.get(offset + i).copied().unwrap_or(0);
        let down_qual = downstream.quals.get(i).copied().unwrap_or(0);
        if up_qual >= down_qual {
            bases.push(upstream.bases[offset + i]);
            quals.push(up_qual);
        } else {
            bases.push(downstream.bases[i]);
            quals.push(down_qual);
        }
    }

    if downstream.len() > overlap_len {
        bases.extend_from_slice(&downstream.bases[overlap_len..]);
        quals.extend(downstream.quals.iter().skip(overlap_len));
    } else if upstream.len() > offset + overlap_len {
        bases.extend_from_slice(&upstream.bases[offset + overlap_len..]);
        quals.extend(upstream.quals.iter().skip(offset + overlap_len));
    }

    RawRead {
        id: upstream.id.clone(),
        bases,
        quals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strprof::align::AlignerParams;

    fn stitch(nuc1: &str, qual1: &str, nuc2: &str, qual2: &str) -> Option<RawRead> {
        stitch_with(&AlignerParams::default(), nuc1, qual1, nuc2, qual2)
    }

    fn stitch_with(
        params: &AlignerParams,
        nuc1: &str,
        qual1: &str,
        nuc2: &str,
        qual2: &str,
    ) -> Option<RawRead> {
        let aligner = ReadAligner::new(params);
        let mut pair = ReadPair::new(
            RawRead::new("frag", nuc1.as_bytes(), qual1.as_bytes()),
            RawRead::new("frag", nuc2.as_bytes(), qual2.as_bytes()),
        );
        let before = pair.clone();
        let stitched = aligner.stitch_reads(&mut pair);
        assert_eq!(stitched, pair.is_stitched());
        if !stitched {
            assert_eq!(pair, before);
        }
        pair.stitched
    }

    fn as_str(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn mate1_upstream_overlap_is_stitched() {
        let nuc1 = "AACCTACAGAAAATATTTCAGTATTTTGGTACATGAAGATCCATGTTGAGAGAGAAAGAAACAGAGAGTGAGAGAGAGACAGAGAGAGAGAGAGAGATTTG";
        let qual1 = "ffffefffffee``ceeedeeeeeeeeeeaeeeeeee`eeeeeeeedeeedadeeeeeeedde`deeededaaedededadeaecdad`d_dadaba\\Y^`";
        let nuc2 = "NAAGNACATTGGAAGTTTCTNTTCCNAATCTCTCTCTCTCTCTCTGTCTCTCTCTCACTCTCTGTTTCTTTCTCTCTCAACATGGATCTTCATGTACCAAA";
        let qual2 = "BQQIBIIGJJ_``__BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";

        let stitched = stitch(nuc1, qual1, nuc2, qual2).unwrap();
        assert_eq!(
            as_str(&stitched.bases),
            format!("{}GAANAGAAACTTCCAATGTNCTTN", nuc1)
        );
        assert_eq!(
            as_str(&stitched.quals),
            format!("{}BBBBBBBBB__``_JJGIIBIQQB", qual1)
        );
    }

    #[test]
    fn overlap_with_mismatches_is_stitched() {
        let nuc1 = "ACGTAATTAATAATAATAATAATAATAATAATAATAATAATAATAAAGTAGCCAGGTATGGAGGCACAGGTCTGTAGTACCAGCTG";
        let qual1 = "26:=67;>:;?>:?><>>=<A=>9<<>=?>><;2996;98<<>:B>?<>A>:44?;=?;<;=;8585:8:73578:3461222010";
        let nuc2 = "TGAGCTCAAGTTGTCCTTCTGCTTCAGCTTCCCAAGTAGCTGGGACTACAGACCTGTGCCTCCATACCTGGCTACTTTATTATTATTATTATTATTATTAT";
        let qual2 = ".4339638<4=7;==;@>=@?<B@?@><?=::;;>::?;8=<?A>:==:=?:=7<:<>96767997456=:55516886:7474685356174443/5031";

        let stitched = stitch(nuc1, qual1, nuc2, qual2).unwrap();
        assert_eq!(
            as_str(&stitched.bases),
            "ACGTAATTAATAATAATAATAATAATAATAATAATAATAATAATAAAGTAGCCAGGTATGGAGGCACAGGTCTGTAGTCCCAGCTACTTGGGAAGCTGAAGCAGAAGGACAACTTGAGCTCA"
        );
        assert_eq!(stitched.quals.len(), stitched.bases.len());
    }

    #[test]
    fn mate2_upstream_overlap_is_stitched() {
        let nuc1 = "TGTATTTCATGTGTACATTCGTATCTATCTATCTATCTATCTATCTATCCATCTATCTATCTATTCCCCACAGTGAAAATAATCTACAGGATAGGTAAATA";
        let nuc2 = "ATTTACCTATCCTGTAGATTATTTTCACTGTGGGGAATAGATAGATAGATGGATAGATAGATAGATAGATAGATAGATACGAATGTACACATGAAATACAA";

        let stitched = stitch(nuc1, nuc1, nuc2, nuc2).unwrap();
        assert_eq!(
            as_str(&stitched.bases),
            "TTGTATTTCATGTGTACATTCGTATCTATCTATCTATCTATCTATCTATCCATCTATCTATCTATTCCCCACAGTGAAAATAATCTACAGGATAGGTAAATA"
        );
    }

    #[test]
    fn poor_overlap_is_not_stitched() {
        let nuc1 = "AACCTACAGAAAATATTTCAGTATTTTGGTACATGAAGATCCATGTTGCTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCT";
        let qual1 = "AACCTACAGAAAATATTTCAGTATTTTGGTACATGAAGATCCATGTTGAGAGAGAAAGAAACAGAGAGTGAAGAGAGAGAGAGAGAGAGAGAGAGAGAGAG";
        let nuc2 = "GTTTCTTTCTCTCTCAACATGGATCTTCATGTACCAAAATACTGAAATATTTTCTGTAGGTTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCT";
        assert_eq!(stitch(nuc1, qual1, nuc2, nuc2), None);

        let nuc1 = "AACCTACAGAAAATATTTCAGTATTTTGGTACATGAAGATCCATGTTGAGAGAGAAAGAAACAGAGAGTGAAGAGAGAGAGAGAGAGAGAGAGAGAGAGAG";
        let nuc2 = "AGAGAGAGAGAGAGAGAGAGAGAGAGAGAGAACCTACAGAAAATATTTCAGTATTTTGGTACATGAAGATCCATGTTGAGAGAGAAAGAAAC";
        let qual2 = "GTTTCTTTCTCTCTCAACATGGATCTTCATGTACCAAAATACTGAAATATTTTCTGTAGGTTCTCTCTCTCTCTCTCTCTCTCTCTCTCTCT";
        assert_eq!(stitch(nuc1, nuc1, nuc2, qual2), None);
    }

    #[test]
    fn ambiguous_repetitive_overlap_is_not_stitched() {
        let fragment = format!(
            "{}{}{}",
            "AACCTACAGAAAATATTTCAGTATTTTGG",
            "CA".repeat(30),
            "GGTCTGTAGTACCAGCTGATTGCAAGT"
        );
        let nuc1 = &fragment[..75];
        let nuc2 = as_str(&reverse_complement(fragment[fragment.len() - 75..].as_bytes())).to_string();
        let quals = "I".repeat(75);
        assert_eq!(stitch(nuc1, &quals, &nuc2, &quals), None);
    }

    #[test]
    fn short_period_overlap_is_rejected() {
        let tail = "GGTCTGTAGTACCAGCTGATTGCAAGT";
        let nuc1 = format!("GATTACAGGCTCATGCCTAGGATT{}", "CA".repeat(8));
        let nuc2 = as_str(&reverse_complement(format!("{}{}", "CA".repeat(8), tail).as_bytes()))
            .to_string();
        let qual1 = "I".repeat(nuc1.len());
        let qual2 = "I".repeat(nuc2.len());
        assert_eq!(stitch(&nuc1, &qual1, &nuc2, &qual2), None);

        let params = AlignerParams {
            max_stitch_period: 0,
            ..Default::default()
        };
        let stitched = stitch_with(&params, &nuc1, &qual1, &nuc2, &qual2).unwrap();
        assert_eq!(as_str(&stitched.bases), format!("{}{}", nuc1, tail));
    }

    #[test]
    fn mismatched_quality_length_is_not_stitched() {
        let fragment = "GATTACAGGCTCATGCCTAGGATCCGTTAACGGATCCTTGACTGAACGT";
        let nuc1 = &fragment[..40];
        let nuc2 = as_str(&reverse_complement(fragment[10..].as_bytes())).to_string();
        assert_eq!(stitch(nuc1, "IIIII", &nuc2, &"I".repeat(nuc2.len())), None);

        let quals1 = "I".repeat(nuc1.len());
        assert!(stitch(nuc1, &quals1, &nuc2, &"I".repeat(nuc2.len())).is_some());
    }

    #[test]
    fn empty_mate_is_not_stitched() {
        assert_eq!(stitch("", "", "ACGTACGTACGTACGTACGT", "IIIIIIIIIIIIIIIIIIII"), None);
    }

    #[test]
    fn period_detection() {
        assert_eq!(short_period(b"CACACACACACACACA", 6), Some(2));
        assert_eq!(short_period(b"AAAAAAAAAAAAAAAA", 6), Some(1));
        assert_eq!(short_period(b"AACCTACAGAAAATATTTCAG", 6), None);
        assert_eq!(short_period(b"ACGTACGTACGTAC", 3), None);
    }
}
