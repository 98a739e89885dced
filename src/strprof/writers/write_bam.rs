//! Defines the `BamWriter` struct for writing profiled reads to a BAM file.
//!
use crate::cli;
use crate::strprof::{locus::Locus, workflows::LocusResult};
use crate::utils::Result;
use itertools::Itertools;
use rust_htslib::bam::{
    self,
    header::HeaderRecord,
    record::{Aux, Cigar as HtsCigarOp, CigarString},
};
use std::env;

/// Writes profiled reads, annotated with their allele calls.
///
/// Tags: `TR` locus id, `XD` difference from the reference repeat length, `XR` detected
/// repeat sequence, `XP` partial flag, `XQ` mismatch score.
pub struct BamWriter {
    writer: bam::Writer,
}

impl BamWriter {
    pub fn new(output_bam_path: &str, template_header: bam::Header) -> Result<BamWriter> {
        let header = Self::create_header(template_header);
        let writer = bam::Writer::from_path(output_bam_path, &header, bam::Format::Bam)
            .map_err(|e| format!("Failed to create {}: {}", output_bam_path, e))?;
        Ok(BamWriter { writer })
    }

    /// Adds a `@PG` line describing this run to the input header.
    fn create_header(template_header: bam::Header) -> bam::Header {
        let mut header = template_header;
        let command_line = env::args().join(" ");

        let mut record = HeaderRecord::new(b"PG");
        record.push_tag(b"ID", env!("CARGO_PKG_NAME"));
        record.push_tag(b"PN", env!("CARGO_PKG_NAME"));
        record.push_tag(b"CL", command_line);
        record.push_tag(b"VN", (*cli::FULL_VERSION).to_string());
        header.push_record(&record);

        header
    }

    pub fn write(&mut self, locus: &Locus, results: &LocusResult) -> Result<()> {
        let contig_id = self
            .writer
            .header()
            .tid(locus.region.contig.as_bytes())
            .ok_or_else(|| {
                format!(
                    "Contig {} of locus {} is missing from the BAM header",
                    locus.region.contig, locus.id
                )
            })?;

        for profiled in &results.reads {
            let read = &profiled.read;
            let cigar = CigarString(
                read.ref_oriented_ops()
                    .iter()
                    .map(HtsCigarOp::from)
                    .collect(),
            );

            let mut rec = bam::Record::new();
            rec.set(
                read.id.as_bytes(),
                Some(&cigar),
                &read.ref_oriented_bases(),
                &read.ref_oriented_quals(),
            );
            rec.set_tid(contig_id as i32);
            rec.set_pos(read.ref_pos);
            rec.set_mtid(-1);
            rec.set_mpos(-1);
            rec.set_mapq(read.mapq);
            if read.is_reverse {
                rec.set_reverse();
            }

            let tags = [
                (b"TR", Aux::String(&locus.id)),
                (b"XD", Aux::I32(profiled.call.diff_from_ref as i32)),
                (b"XR", Aux::String(&profiled.call.detected_repeat)),
                (b"XP", Aux::U8(read.partial as u8)),
                (b"XQ", Aux::U32(profiled.mismatch_score)),
            ];
            for (tag, value) in tags {
                rec.push_aux(tag, value)
                    .map_err(|e| format!("Failed to tag read {}: {}", read.id, e))?;
            }

            self.writer
                .write(&rec)
                .map_err(|e| format!("Failed to write read {}: {}", read.id, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strprof::align::AlleleCall;
    use crate::strprof::workflows::ProfiledRead;
    use crate::strprof::{reads::test_utils::make_read, workflows::test_utils::header};
    use crate::utils::GenomicRegion;
    use rust_htslib::bam::Read;
    use tempfile::TempDir;

    #[test]
    fn reads_are_written_in_reference_orientation_with_tags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.profiled.bam");
        let path_str = path.to_str().unwrap();

        let locus = Locus {
            id: "rep1".to_string(),
            motif: "CA".to_string(),
            left_flank: String::new(),
            tr: "CACACACACA".to_string(),
            right_flank: String::new(),
            region: GenomicRegion::new("chr1", 20, 30).unwrap(),
        };
        let mut read = make_read("TGTGTGTGTGTG", 18, "1S10M1S", true);
        read.partial = true;
        let results = LocusResult {
            reads: vec![ProfiledRead {
                read,
                call: AlleleCall {
                    diff_from_ref: -2,
                    detected_repeat: "TGTGTGTG".to_string(),
                },
                mismatch_score: 7,
            }],
            ..Default::default()
        };

        {
            let mut writer = BamWriter::new(path_str, header()).unwrap();
            writer.write(&locus, &results).unwrap();
        }

        let mut reader = bam::Reader::from_path(&path).unwrap();
        let header_text = String::from_utf8(reader.header().as_bytes().to_vec()).unwrap();
        assert!(header_text.contains("@PG\tID:strprof"));

        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>().unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.qname(), b"read");
        assert_eq!(rec.pos(), 18);
        assert!(rec.is_reverse());
        assert_eq!(rec.seq().as_bytes(), b"CACACACACACA".to_vec());
        assert_eq!(rec.cigar().to_string(), "1S10M1S");
        assert_eq!(rec.aux(b"TR").unwrap(), Aux::String("rep1"));
        assert_eq!(rec.aux(b"XD").unwrap(), Aux::I32(-2));
        assert_eq!(rec.aux(b"XR").unwrap(), Aux::String("TGTGTGTG"));
        assert_eq!(rec.aux(b"XP").unwrap(), Aux::U8(1));
        assert_eq!(rec.aux(b"XQ").unwrap(), Aux::U32(7));
    }

    #[test]
    fn unknown_contig_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.profiled.bam");
        let mut writer = BamWriter::new(path.to_str().unwrap(), header()).unwrap();
        let locus = Locus {
            id: "rep2".to_string(),
            motif: "A".to_string(),
            left_flank: String::new(),
            tr: "AAAA".to_string(),
            right_flank: String::new(),
            region: GenomicRegion::new("chrX", 5, 9).unwrap(),
        };
        assert!(writer
            .write(&locus, &LocusResult::empty())
            .unwrap_err()
            .contains("chrX"));
    }
}
