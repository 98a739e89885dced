//! Read-level repeat analyses: mate stitching, mismatch scoring, allele inference from edit
//! operations and adjustment of alignments that reach only one side of a repeat.

mod aligner;
mod allele;
mod mapq;
mod partial;
mod render;
mod stitch;

pub use aligner::{AlignerParams, ReadAligner};
pub use allele::{AlleleCall, Anchor, RepeatInterval};
pub use render::{render_alignment, RenderedAlignment};
