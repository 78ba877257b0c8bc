//! Capture a time window of a radio station's archived HLS stream into one audio file.
//!
//! The pipeline normalizes a local start time, resolves the catalog pages that cover the
//! requested hours into an ordered chunk list, downloads the chunks with an on-disk cache,
//! and joins them into a single output file.

pub mod app;
pub mod assemble;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod http;
pub mod output;
pub mod resolver;
pub mod timestamp;
