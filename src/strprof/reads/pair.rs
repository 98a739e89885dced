/// An unaligned read as produced by the sequencer.
///
/// Qualities are kept in whatever encoding the source uses; they are only ever compared with
/// each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRead {
    pub id: String,
    pub bases: Vec<u8>,
    pub quals: Vec<u8>,
}

impl RawRead {
    pub fn new(id: impl Into<String>, bases: &[u8], quals: &[u8]) -> Self {
        RawRead {
            id: id.into(),
            bases: bases.to_vec(),
            quals: quals.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

/// Both mates of a sequenced fragment, each in its own sequencing orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    pub mate1: RawRead,
    pub mate2: RawRead,
    /// Consensus read, present once the mates have been stitched.
    pub stitched: Option<RawRead>,
}

impl ReadPair {
    pub fn new(mate1: RawRead, mate2: RawRead) -> Self {
        ReadPair {
            mate1,
            mate2,
            stitched: None,
        }
    }

    pub fn is_stitched(&self) -> bool {
        self.stitched.is_some()
    }
}
