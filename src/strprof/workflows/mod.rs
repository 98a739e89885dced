mod locus_result;
mod profile;

pub use locus_result::{LocusResult, ProfiledRead};
pub use profile::{analyze as analyze_locus, classify_span, Params, Span};

#[cfg(test)]
pub(crate) use profile::test_utils;
