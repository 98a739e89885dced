use crate::utils::Result;
use rust_htslib::bam::{self, Read};
use std::path::Path;

pub fn get_bam_header(bam_path: &Path) -> Result<bam::Header> {
    let bam = bam::IndexedReader::from_path(bam_path)
        .map_err(|e| format!("Failed to create bam reader: {}", e))?;
    Ok(bam::Header::from_template(bam.header()))
}

/// A BAM can only be fetched by region if its header names the reference sequences.
pub fn is_bam_mapped(bam_header: &bam::Header) -> bool {
    String::from_utf8_lossy(&bam_header.to_bytes())
        .lines()
        .any(|line| line.starts_with("@SQ"))
}
