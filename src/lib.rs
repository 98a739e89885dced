pub mod cli;
pub mod commands;
pub mod strprof;
pub mod utils;
