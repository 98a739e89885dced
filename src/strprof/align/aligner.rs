/// Tunable constants shared by every analysis of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignerParams {
    /// Minimum number of overlapping bases for two mates to be stitched
    pub min_stitch_overlap: usize,
    /// Minimum fraction of identical bases in the overlap
    pub min_stitch_identity: f64,
    /// Longest motif period checked when rejecting low-complexity overlaps
    pub max_stitch_period: usize,
    /// Gap marker used in rendered alignments
    pub gap: u8,
}

impl Default for AlignerParams {
    fn default() -> Self {
        AlignerParams {
            min_stitch_overlap: 16,
            min_stitch_identity: 0.9,
            max_stitch_period: 6,
            gap: b'-',
        }
    }
}

/// Entry point for the per-read analyses.
///
/// Holds nothing but a shared reference to the run parameters, so a single instance can be
/// used from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct ReadAligner<'a> {
    pub(super) params: &'a AlignerParams,
}

impl<'a> ReadAligner<'a> {
    pub fn new(params: &'a AlignerParams) -> Self {
        ReadAligner { params }
    }

    pub fn params(&self) -> &AlignerParams {
        self.params
    }
}
