pub mod align;
pub mod dedup;
pub mod error;
pub mod locus;
pub mod reads;
pub mod workflows;
pub mod writers;
