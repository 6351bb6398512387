// Application layer: the analyzers that turn report rows into recommendations

pub mod analyzers;

pub use analyzers::{AnalyzerInfo, AnalyzerRegistry};
