//! Data layer for tweet-hours.
//!
//! Responsible for discovering and reading record files, parsing records
//! into hour buckets, aggregating histograms (sequentially or on a rayon
//! pool), writing output and running the top-level job pipeline.

pub mod aggregator;
pub mod parser;
pub mod pipeline;
pub mod reader;
pub mod writer;
