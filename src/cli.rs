use crate::utils::Result;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="strprof",
          version=&**FULL_VERSION,
          about="Short tandem repeat profiler for short-read alignments",
          long_about = None,
          disable_help_subcommand = true,
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Infer per-read repeat alleles at catalog loci")]
    Profile(ProfileArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("profile")))]
#[command(arg_required_else_help(true))]
pub struct ProfileArgs {
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reads")]
    #[clap(help = "Indexed BAM file with aligned short reads")]
    #[clap(value_name = "READS")]
    #[arg(value_parser = check_file_exists)]
    pub reads_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "repeats")]
    #[clap(help = "BED file with repeat coordinates")]
    #[clap(value_name = "REPEATS")]
    #[arg(value_parser = check_file_exists)]
    pub repeats_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "flank-len")]
    #[clap(value_name = "FLANK_LEN")]
    #[clap(help = "Length of reference sequence fetched on each side of a repeat")]
    #[clap(default_value = "250")]
    pub flank_len: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-flank")]
    #[clap(value_name = "MIN_FLANK")]
    #[clap(help = "Minimum number of flanking bases a read must cover to reach a side of the repeat")]
    #[clap(default_value = "10")]
    pub min_flank: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "max-depth")]
    #[clap(value_name = "MAX_DEPTH")]
    #[clap(help = "Maximum number of reads reported per locus")]
    #[clap(default_value = "1000")]
    pub max_depth: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "no-rmdup")]
    #[clap(help = "Keep PCR duplicates")]
    pub no_rmdup: bool,

    #[clap(help_heading("Filters"))]
    #[clap(long = "min-bp-before-indel")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Minimum number of matched bases between a read end and the nearest indel")]
    #[clap(default_value = "7")]
    pub min_bp_before_indel: u32,

    #[clap(help_heading("Filters"))]
    #[clap(long = "min-read-end-match")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Minimum number of exact matches at each read end")]
    #[clap(default_value = "5")]
    pub min_read_end_match: u32,

    #[clap(help_heading("Filters"))]
    #[clap(long = "maximal-end-match")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Reject reads whose ends align as well after a shift of up to this many bases (0 disables)")]
    #[clap(default_value = "15")]
    pub maximal_end_match: usize,

    #[clap(help_heading("Filters"))]
    #[clap(long = "max-mapq")]
    #[clap(value_name = "SCORE")]
    #[clap(help = "Maximum sum of qualities of mismatched bases")]
    #[clap(default_value = "100")]
    pub max_mapq: u32,

    #[clap(help_heading("Filters"))]
    #[clap(long = "filter-clipped")]
    #[clap(help = "Reject soft or hard clipped reads")]
    pub filter_clipped: bool,

    #[clap(help_heading("Filters"))]
    #[clap(long = "unit")]
    #[clap(help = "Reject reads whose length difference is not a multiple of the motif length")]
    pub unit: bool,
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn thread_count_must_be_positive() {
        assert_eq!(threads_in_range("4"), Ok(4));
        assert!(threads_in_range("0").is_err());
        assert!(threads_in_range("x").is_err());
    }

    #[test]
    fn profile_args_parse_with_defaults() {
        let dir = TempDir::new().unwrap();
        let touch = |name: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, "").unwrap();
            path.to_str().unwrap().to_string()
        };
        let genome = touch("genome.fa");
        let reads = touch("reads.bam");
        let repeats = touch("repeats.bed");
        let prefix = dir.path().join("sample");

        let cli = Cli::try_parse_from([
            "strprof",
            "-vv",
            "profile",
            "-g",
            genome.as_str(),
            "-r",
            reads.as_str(),
            "-b",
            repeats.as_str(),
            "-o",
            prefix.to_str().unwrap(),
            "--unit",
        ])
        .unwrap();
        assert_eq!(cli.verbosity, 2);
        let Command::Profile(args) = cli.command;
        assert_eq!(args.num_threads, 1);
        assert_eq!(args.flank_len, 250);
        assert_eq!(args.min_bp_before_indel, 7);
        assert_eq!(args.maximal_end_match, 15);
        assert!(args.unit);
        assert!(!args.no_rmdup);
    }

    #[test]
    fn missing_input_is_rejected() {
        let result = Cli::try_parse_from([
            "strprof",
            "profile",
            "-g",
            "/nonexistent/genome.fa",
            "-r",
            "/nonexistent/reads.bam",
            "-b",
            "/nonexistent/repeats.bed",
            "-o",
            "out",
        ]);
        assert!(result.is_err());
    }
}
