//! Module and toolchain extraction from job scripts.

pub mod commands;
pub mod extractor;

pub use commands::ExtractorConfig;
pub use extractor::Extractor;
