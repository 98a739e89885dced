use super::{LocusResult, ProfiledRead};
use crate::strprof::align::{
    render_alignment, AlignerParams, Anchor, ReadAligner, RepeatInterval,
};
use crate::strprof::dedup::remove_duplicates;
use crate::strprof::error::ReadResult;
use crate::strprof::locus::Locus;
use crate::strprof::reads::{AlignedRead, FilterParams, FilterReason, ReadFilter, RefWindow};
use crate::utils::Result;
use rust_htslib::bam::{self, Read, Record};

#[derive(Debug, Clone)]
pub struct Params {
    pub aligner: AlignerParams,
    pub filters: FilterParams,
    /// Minimum number of flanking bases a read must cover on a side to count as reaching it
    pub min_flank: usize,
    pub max_depth: usize,
    pub remove_duplicates: bool,
}

/// How a read relates to the repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Reaches both flanks
    Complete,
    /// Reaches only the given flank
    Partial(Anchor),
    /// Does not overlap the repeat or reaches neither flank
    Uninformative,
}

pub fn classify_span(read: &AlignedRead, repeat: &RepeatInterval, min_flank: usize) -> Span {
    let (read_start, read_end) = (read.ref_pos, read.ref_end());
    if read_end <= repeat.start || read_start >= repeat.end {
        return Span::Uninformative;
    }

    let min_flank = min_flank as i64;
    let reaches_left = read_start <= repeat.start - min_flank;
    let reaches_right = read_end >= repeat.end + min_flank;
    match (reaches_left, reaches_right) {
        (true, true) => Span::Complete,
        (true, false) => Span::Partial(Anchor::Left),
        (false, true) => Span::Partial(Anchor::Right),
        (false, false) => Span::Uninformative,
    }
}

enum Outcome {
    Profiled(ProfiledRead),
    Filtered(FilterReason),
    Uninformative,
    Unusable,
}

pub fn analyze(
    locus: &Locus,
    params: &Params,
    bam: &mut bam::IndexedReader,
) -> Result<LocusResult> {
    let mut result = LocusResult::empty();
    let reads = extract_reads(locus, params, bam, &mut result.num_unusable)?;
    log::debug!("{}: {} reads overlap the locus", locus.id, reads.len());

    let aligner = ReadAligner::new(&params.aligner);
    let filter = ReadFilter::new(&params.filters);
    let repeat = locus.repeat();
    let window_seq = locus.window();
    let window = RefWindow {
        seq: &window_seq,
        start: locus.window_start(),
        motif_len: locus.motif.len(),
    };

    let mut profiled = Vec::new();
    for read in reads {
        let read_id = read.id.clone();
        match profile_read(&aligner, &filter, read, &repeat, &window, params.min_flank) {
            Ok(Outcome::Profiled(read)) => profiled.push(read),
            Ok(Outcome::Filtered(reason)) => {
                log::trace!("{}: read {} filtered ({})", locus.id, read_id, reason);
                *result.filtered.entry(reason).or_default() += 1;
            }
            Ok(Outcome::Uninformative) => {}
            Ok(Outcome::Unusable) => result.num_unusable += 1,
            Err(err) => {
                log::debug!("{}: {}", locus.id, err);
                result.num_unusable += 1;
            }
        }
    }
    for (reason, count) in &result.filtered {
        log::debug!("{}: {} reads filtered ({})", locus.id, count, reason);
    }

    if params.remove_duplicates {
        let num_reads = profiled.len();
        profiled = remove_duplicates(profiled);
        result.num_duplicates = num_reads - profiled.len();
        log::debug!(
            "{}: removed {} duplicate reads",
            locus.id,
            result.num_duplicates
        );
    }

    if profiled.len() > params.max_depth {
        log::warn!(
            "{}: keeping {} of {} profiled reads",
            locus.id,
            params.max_depth,
            profiled.len()
        );
        profiled.truncate(params.max_depth);
    }

    log::debug!("{}: {} reads profiled", locus.id, profiled.len());
    result.reads = profiled;
    Ok(result)
}

fn profile_read(
    aligner: &ReadAligner,
    filter: &ReadFilter,
    mut read: AlignedRead,
    repeat: &RepeatInterval,
    window: &RefWindow,
    min_flank: usize,
) -> ReadResult<Outcome> {
    let call = match classify_span(&read, repeat, min_flank) {
        Span::Complete => aligner.get_str_allele(&read, &read.cigar, repeat)?,
        Span::Partial(anchor) => {
            read.partial = true;
            aligner.adjust_partial_alignment(
                &read,
                &read.cigar,
                anchor,
                read.ref_pos,
                read.len(),
                repeat,
            )?
        }
        Span::Uninformative => return Ok(Outcome::Uninformative),
    };

    let Some(rendered) = render_alignment(&read, window.seq, window.start, aligner.params().gap)
    else {
        log::trace!("{}: alignment runs outside the reference window", read.id);
        return Ok(Outcome::Unusable);
    };
    let mismatch_score =
        aligner.get_mapq(&rendered.aligned, &rendered.reference, &rendered.quals)?;

    if let Some(reason) = filter.check(&read, &call, mismatch_score, window) {
        return Ok(Outcome::Filtered(reason));
    }

    Ok(Outcome::Profiled(ProfiledRead {
        read,
        call,
        mismatch_score,
    }))
}

fn extract_reads(
    locus: &Locus,
    params: &Params,
    bam: &mut bam::IndexedReader,
    num_unusable: &mut usize,
) -> Result<Vec<AlignedRead>> {
    let mut reads = Vec::new();
    let extraction_region = locus.region.padded(params.min_flank as u32);
    if let Err(msg) = bam.fetch(extraction_region) {
        log::warn!("{}: fetch error: {}", locus.id, msg);
        return Ok(reads);
    }

    let mut record = Record::new();
    while let Some(result) = bam.read(&mut record) {
        result.map_err(|e| format!("{}: {}", locus.id, e))?;
        if record.is_unmapped()
            || record.is_secondary()
            || record.is_supplementary()
            || record.is_quality_check_failed()
        {
            continue;
        }

        match AlignedRead::from_hts_rec(&record) {
            Ok(read) => reads.push(read),
            Err(err) => {
                log::debug!("{}: {}", locus.id, err);
                *num_unusable += 1;
            }
        }
    }
    Ok(reads)
}


#[cfg(test)]
mod tests {
    use super::test_utils::{write_bam, TestRecord};
    use super::*;
    use crate::strprof::locus::test_utils::{write_genome, CHR1};
    use crate::strprof::locus::{create_chrom_lookup, Locus};
    use crate::strprof::reads::test_utils::make_read;
    use crate::utils::open_genome_reader;
    use rust_htslib::bam::record::Cigar as HtsCigarOp;
    use tempfile::TempDir;

    const REVERSE: u16 = 0x10;
    const SECONDARY: u16 = 0x100;

    fn params() -> Params {
        Params {
            aligner: AlignerParams::default(),
            filters: FilterParams {
                maximal_end_match_window: 2,
                ..Default::default()
            },
            min_flank: 5,
            max_depth: 100,
            remove_duplicates: true,
        }
    }

    #[test]
    fn spans_are_classified_by_flank_coverage() {
        let repeat = RepeatInterval::new(20, 30);
        let complete = make_read(&"A".repeat(20), 15, "20M", false);
        assert_eq!(classify_span(&complete, &repeat, 5), Span::Complete);
        assert_eq!(classify_span(&complete, &repeat, 6), Span::Uninformative);

        let left = make_read(&"A".repeat(12), 12, "12M", false);
        assert_eq!(
            classify_span(&left, &repeat, 5),
            Span::Partial(Anchor::Left)
        );

        let right = make_read(&"A".repeat(12), 24, "12M", true);
        assert_eq!(
            classify_span(&right, &repeat, 5),
            Span::Partial(Anchor::Right)
        );

        let outside = make_read(&"A".repeat(10), 30, "10M", false);
        assert_eq!(classify_span(&outside, &repeat, 5), Span::Uninformative);
    }

    #[test]
    fn analyze_profiles_filters_and_deduplicates() {
        let dir = TempDir::new().unwrap();
        let genome = open_genome_reader(&write_genome(&dir)).unwrap();
        let lookup = create_chrom_lookup(&genome).unwrap();
        let locus = Locus::new(&genome, &lookup, "chr1\t20\t30\tID=rep1;MOTIF=CA", 10).unwrap();

        let records = vec![
            TestRecord {
                name: "ref",
                pos: 12,
                bases: CHR1[12..38].to_string(),
                cigar: vec![HtsCigarOp::Match(26)],
                qual: 30,
                flags: 0,
            },
            TestRecord {
                name: "del",
                pos: 12,
                bases: format!("{}{}", &CHR1[12..22], &CHR1[24..38]),
                cigar: vec![
                    HtsCigarOp::Match(10),
                    HtsCigarOp::Del(2),
                    HtsCigarOp::Match(14),
                ],
                qual: 30,
                flags: 0,
            },
            TestRecord {
                name: "ref_dup",
                pos: 12,
                bases: CHR1[12..38].to_string(),
                cigar: vec![HtsCigarOp::Match(26)],
                qual: 20,
                flags: 0,
            },
            TestRecord {
                name: "ins",
                pos: 12,
                bases: format!("{}CA{}", &CHR1[12..24], &CHR1[24..38]),
                cigar: vec![
                    HtsCigarOp::Match(12),
                    HtsCigarOp::Ins(2),
                    HtsCigarOp::Match(14),
                ],
                qual: 30,
                flags: REVERSE,
            },
            TestRecord {
                name: "secondary",
                pos: 12,
                bases: CHR1[12..38].to_string(),
                cigar: vec![HtsCigarOp::Match(26)],
                qual: 40,
                flags: SECONDARY,
            },
            TestRecord {
                name: "bad_start",
                pos: 13,
                bases: format!("G{}", &CHR1[14..38]),
                cigar: vec![HtsCigarOp::Match(25)],
                qual: 30,
                flags: 0,
            },
            TestRecord {
                name: "partial",
                pos: 24,
                bases: CHR1[24..38].to_string(),
                cigar: vec![HtsCigarOp::Match(14)],
                qual: 30,
                flags: 0,
            },
        ];
        let bam_path = write_bam(dir.path(), &records);
        let mut bam = bam::IndexedReader::from_path(&bam_path).unwrap();

        let result = analyze(&locus, &params(), &mut bam).unwrap();
        let calls = result
            .reads
            .iter()
            .map(|r| (r.read.id.as_str(), r.call.diff_from_ref, r.read.partial))
            .collect::<Vec<_>>();
        assert_eq!(
            calls,
            vec![
                ("ref", 0, false),
                ("del", -2, false),
                ("ins", 2, false),
                ("partial", -4, true),
            ]
        );
        assert_eq!(result.num_duplicates, 1);
        assert_eq!(result.filtered.get(&FilterReason::ShortEndMatch), Some(&1));
        assert!(result.reads.iter().all(|r| r.mismatch_score == 0));

        let ins = &result.reads[2];
        assert!(ins.read.is_reverse);
        assert_eq!(ins.call.detected_repeat, "TGTGTGTGTGTG");
    }

    #[test]
    fn depth_is_capped() {
        let dir = TempDir::new().unwrap();
        let genome = open_genome_reader(&write_genome(&dir)).unwrap();
        let lookup = create_chrom_lookup(&genome).unwrap();
        let locus = Locus::new(&genome, &lookup, "chr1\t20\t30\tID=rep1;MOTIF=CA", 10).unwrap();

        let records = (0..3)
            .map(|offset| TestRecord {
                name: ["a", "b", "c"][offset],
                pos: 12 + offset as i64,
                bases: CHR1[12 + offset..37].to_string(),
                cigar: vec![HtsCigarOp::Match(25 - offset as u32)],
                qual: 30,
                flags: 0,
            })
            .collect::<Vec<_>>();
        let bam_path = write_bam(dir.path(), &records);
        let mut bam = bam::IndexedReader::from_path(&bam_path).unwrap();

        let params = Params {
            max_depth: 2,
            ..params()
        };
        let result = analyze(&locus, &params, &mut bam).unwrap();
        let ids = result
            .reads
            .iter()
            .map(|r| r.read.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
