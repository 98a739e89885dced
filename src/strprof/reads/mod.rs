pub mod cigar;
pub mod filters;
mod pair;
mod read;

pub use cigar::{format_cigar, parse_cigar, Cigar, CigarOp};
pub use filters::{
    count_end_matches, dist_to_indel, has_maximal_end_matches, FilterParams, FilterReason,
    ReadFilter, RefWindow,
};
pub use pair::{RawRead, ReadPair};
pub use read::AlignedRead;

#[cfg(test)]
pub(crate) use read::test_utils;
