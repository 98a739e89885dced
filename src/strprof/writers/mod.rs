mod write_bam;
pub use write_bam::BamWriter;
