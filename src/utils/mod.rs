mod bam_utils;
mod dna;
mod io_utils;
mod readers;
mod region;

pub use bam_utils::{get_bam_header, is_bam_mapped};
pub use dna::{complement_base, reverse_complement};
pub use io_utils::{create_writer, output_path};
pub use readers::{open_catalog_reader, open_genome_reader};
pub use region::GenomicRegion;

pub type Result<T> = std::result::Result<T, String>;

pub fn handle_error_and_exit(err: String) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}
