use crate::strprof::reads::{cigar, AlignedRead, CigarOp};

/// Gapped alignment of the aligned part of a read against the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAlignment {
    pub aligned: Vec<u8>,
    pub reference: Vec<u8>,
    /// Phred+33 qualities of the read bases in `aligned`
    pub quals: Vec<u8>,
}

/// Lays `read` out against `ref_window` (starting at `window_start`) in reference orientation.
///
/// Clipped bases are left out. Returns `None` when the window does not cover the alignment.
pub fn render_alignment(
    read: &AlignedRead,
    ref_window: &[u8],
    window_start: i64,
    gap: u8,
) -> Option<RenderedAlignment> {
    let ops = read.ref_oriented_ops();
    let offset = read.ref_pos - window_start;
    if offset < 0 || offset + cigar::ref_len(&ops) > ref_window.len() as i64 {
        return None;
    }

    let bases = read.ref_oriented_bases();
    let quals = read.ref_oriented_quals();
    let mut rendered = RenderedAlignment {
        aligned: Vec::with_capacity(bases.len()),
        reference: Vec::with_capacity(bases.len()),
        quals: Vec::with_capacity(bases.len()),
    };

    let mut read_pos = 0;
    let mut ref_pos = offset as usize;
    for op in ops {
        let len = op.run_len() as usize;
        match op {
            CigarOp::Match(_) => {
                rendered.aligned.extend(bases.get(read_pos..read_pos + len)?);
                rendered.reference.extend(&ref_window[ref_pos..ref_pos + len]);
                rendered.quals.extend(phred33(quals.get(read_pos..read_pos + len)?));
                read_pos += len;
                ref_pos += len;
            }
            CigarOp::Ins(_) => {
                rendered.aligned.extend(bases.get(read_pos..read_pos + len)?);
                rendered.reference.extend(std::iter::repeat(gap).take(len));
                rendered.quals.extend(phred33(quals.get(read_pos..read_pos + len)?));
                read_pos += len;
            }
            CigarOp::Del(_) => {
                rendered.aligned.extend(std::iter::repeat(gap).take(len));
                rendered.reference.extend(&ref_window[ref_pos..ref_pos + len]);
                ref_pos += len;
            }
            CigarOp::SoftClip(_) => read_pos += len,
            CigarOp::HardClip(_) => {}
        }
    }
    Some(rendered)
}

fn phred33(quals: &[u8]) -> impl Iterator<Item = u8> + '_ {
    quals.iter().map(|qual| qual.saturating_add(33))
}
