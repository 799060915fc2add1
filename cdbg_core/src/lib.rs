//! Core graph-engineering pipeline for a compacted de Bruijn graph bacterial
//! GWAS tool: unitig construction, edge reconstruction, parallel strain
//! mapping, pattern deduplication, neighbourhood extraction and annotation
//! aggregation. [`kmer_index`] is the thin
//! surface the rest of the crate consumes.

pub mod annotation;
pub mod dna;
pub mod edge_builder;
pub mod error;
pub mod external;
pub mod fasta;
pub mod kmer_index;
pub mod manifest;
pub mod neighbourhood;
pub mod pattern_table;
pub mod sff;
pub mod strain_mapper;
pub mod unitig_builder;

pub use error::{PipelineError, Result};
