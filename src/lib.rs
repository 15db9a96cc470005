pub mod chart;
pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod fonts;
pub mod input;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod util;
