use crate::strprof::align::RepeatInterval;
use crate::utils::{open_catalog_reader, open_genome_reader, GenomicRegion, Result};
use crossbeam_channel::Sender;
use rust_htslib::faidx;
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Read as ioRead},
    path::Path,
};

#[derive(Debug)]
pub struct Locus {
    pub id: String,
    pub motif: String,
    pub left_flank: String,
    pub tr: String,
    pub right_flank: String,
    pub region: GenomicRegion,
}

impl Locus {
    pub fn new(
        genome_reader: &faidx::Reader,
        chrom_lookup: &HashMap<String, u32>,
        line: &str,
        flank_len: usize,
    ) -> Result<Self> {
        const EXPECTED_FIELD_COUNT: usize = 4;
        let split_line: Vec<&str> = line.split_whitespace().collect();
        let (chrom, start, end, info_fields) = match &split_line[..] {
            [chrom, start, end, info_fields] => (*chrom, *start, *end, *info_fields),
            _ => {
                return Err(format!(
                    "Expected {} fields in the format 'chrom start end info', found {}: {}",
                    EXPECTED_FIELD_COUNT,
                    split_line.len(),
                    line
                ))
            }
        };

        let region = GenomicRegion::from_string(&format!("{}:{}-{}", chrom, start, end))?;
        check_region_bounds(&region, flank_len, chrom_lookup)?;

        let fields = decode_fields(info_fields)?;
        let get_field = |key: &str| {
            fields
                .get(key)
                .ok_or_else(|| format!("{} field missing", key))
                .map(|s| s.to_string())
        };

        let id = get_field("ID")?;
        let motif = get_field("MOTIF")?.to_uppercase();
        if !motif.bytes().all(|b| b"ACGTN".contains(&b)) {
            return Err(format!("Invalid motif '{}' for locus {}", motif, id));
        }

        let (left_flank, tr, right_flank) = get_tr_and_flanks(genome_reader, &region, flank_len)?;

        Ok(Locus {
            id,
            motif,
            left_flank,
            tr,
            right_flank,
            region,
        })
    }

    pub fn repeat(&self) -> RepeatInterval {
        RepeatInterval::new(self.region.start as i64, self.region.end as i64)
    }

    /// Reference coordinate of the first base of the left flank.
    pub fn window_start(&self) -> i64 {
        self.region.start as i64 - self.left_flank.len() as i64
    }

    /// Left flank, repeat and right flank as one contiguous reference window.
    pub fn window(&self) -> Vec<u8> {
        [&self.left_flank, &self.tr, &self.right_flank]
            .iter()
            .flat_map(|seq| seq.bytes())
            .collect()
    }
}

pub fn create_chrom_lookup(reader: &faidx::Reader) -> Result<HashMap<String, u32>> {
    let num_seqs = reader.n_seqs() as usize;
    let mut map = HashMap::with_capacity(num_seqs);
    for i in 0..num_seqs {
        let name = reader.seq_name(i as i32).map_err(|e| e.to_string())?;
        let len = reader.fetch_seq_len(&name);
        let len_u32 = u32::try_from(len).map_err(|_| {
            format!(
                "Sequence length for '{}' is negative and cannot be converted to u32",
                &name
            )
        })?;
        map.insert(name, len_u32);
    }
    Ok(map)
}

pub fn stream_loci_into_channel(
    repeats_path: &Path,
    genome_path: &Path,
    flank_len: usize,
    sender: Sender<Result<Locus>>,
) -> Result<()> {
    let catalog_reader = open_catalog_reader(repeats_path)?;
    let genome_reader = open_genome_reader(genome_path)?;

    for locus in get_loci(catalog_reader, genome_reader, flank_len)? {
        sender
            .send(locus)
            .map_err(|e| format!("Failed to send locus through channel: {}", e))?;
    }
    Ok(())
}

pub fn get_loci(
    catalog_reader: BufReader<Box<dyn ioRead>>,
    genome_reader: faidx::Reader,
    flank_len: usize,
) -> Result<impl Iterator<Item = Result<Locus>>> {
    let chrom_lookup = create_chrom_lookup(&genome_reader)?;

    Ok(catalog_reader
        .lines()
        .enumerate()
        .filter(|(_, result_line)| {
            result_line
                .as_ref()
                .map_or(true, |line| !line.trim().is_empty() && !line.starts_with('#'))
        })
        .map(move |(line_number, result_line)| {
            result_line
                .map_err(|e| format!("Error at BED line {}: {}", line_number + 1, e))
                .and_then(|line| {
                    Locus::new(&genome_reader, &chrom_lookup, &line, flank_len)
                        .map_err(|e| format!("Error at BED line {}: {}", line_number + 1, e))
                })
        }))
}

fn get_tr_and_flanks(
    genome: &faidx::Reader,
    region: &GenomicRegion,
    flank_len: usize,
) -> Result<(String, String, String)> {
    let fetch_seq = |start: usize, end: usize| {
        if end < start {
            return Ok(String::new());
        }
        genome
            .fetch_seq_string(&region.contig, start, end)
            .map_err(|e| {
                format!(
                    "Error fetching sequence for region {}:{}-{}: {}",
                    &region.contig, start, end, e
                )
            })
            .map(|seq| seq.to_uppercase())
    };

    let start = region.start as usize;
    let end = region.end as usize;
    let left_flank = fetch_seq(start - flank_len, start - 1)?;
    let tr = fetch_seq(start, end - 1)?;
    let right_flank = fetch_seq(end, end + flank_len - 1)?;

    Ok((left_flank, tr, right_flank))
}

fn decode_fields(info_fields: &str) -> Result<HashMap<&str, String>> {
    let mut fields = HashMap::new();
    for field_encoding in info_fields.split(';') {
        let (name, value) = decode_info_field(field_encoding)?;
        if fields.insert(name, value.to_string()).is_some() {
            return Err(format!("Duplicate field name: '{}'", name));
        }
    }
    Ok(fields)
}

fn decode_info_field(encoding: &str) -> Result<(&str, &str)> {
    match encoding.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => Ok((name, value)),
        _ => Err(format!(
            "Field must be in 'name=value' format: '{}'",
            encoding
        )),
    }
}

fn check_region_bounds(
    region: &GenomicRegion,
    flank_len: usize,
    chrom_lookup: &HashMap<String, u32>,
) -> Result<()> {
    let chrom_length = *chrom_lookup.get(&region.contig).ok_or_else(|| {
        format!(
            "FASTA reference does not contain chromosome '{}' in BED file",
            &region.contig
        )
    })?;

    let flank_len_u32 = u32::try_from(flank_len)
        .map_err(|_| format!("Flank length '{}' is too large", flank_len))?;

    if region.start < flank_len_u32 + 1 {
        return Err(format!(
            "Region start '{}' with flank length '{}' underflows for chromosome '{}'.",
            region.start, flank_len, &region.contig
        ));
    }

    let adjusted_end = region.end.checked_add(flank_len_u32).ok_or_else(|| {
        format!(
            "Region end '{}' with flank length '{}' overflows for chromosome '{}'.",
            region.end, flank_len, &region.contig
        )
    })?;

    if adjusted_end > chrom_length {
        return Err(format!(
            "Region end '{}' with flank length '{}' exceeds chromosome '{}' bounds (0..{}).",
            adjusted_end, flank_len, &region.contig, chrom_length
        ));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_utils {
    use std::{fs, path::PathBuf};
    use tempfile::TempDir;

    pub const CHR1: &str = "GATTACAGGCTCATGCCTAGCACACACACAGGATCCGTTAACGGATCCTTGACTGAACGTAAGT";

    /// Writes a single-contig FASTA with its index into `dir`.
    pub fn write_genome(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("genome.fa");
        fs::write(&path, format!(">chr1\n{}\n", CHR1)).unwrap();
        fs::write(
            dir.path().join("genome.fa.fai"),
            format!("chr1\t{}\t6\t{}\t{}\n", CHR1.len(), CHR1.len(), CHR1.len() + 1),
        )
        .unwrap();
        path
    }
}
