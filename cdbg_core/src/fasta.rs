//! A minimal FASTA reader. The core does not depend on any particular
//! sequence-format crate: strain assemblies are small enough to read and
//! concatenate per-record in memory.

use crate::error::{PipelineError, Result};
use std::io::BufRead;
use std::path::Path;

/// One FASTA record: header line (without the leading `>`) and raw sequence bytes.
pub struct Record {
    pub header: String,
    pub sequence: Vec<u8>,
}

/// Reads every record of a FASTA file. Lines are concatenated until the next
/// `>` header or end of file, matching standard multi-line FASTA.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let reader = std::io::BufReader::new(file);

    let mut records = Vec::new();
    let mut current_header: Option<String> = None;
    let mut current_seq: Vec<u8> = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| PipelineError::io(path, e))?;
        if let Some(rest) = line.strip_prefix('>') {
            if let Some(header) = current_header.take() {
                records.push(Record {
                    header,
                    sequence: std::mem::take(&mut current_seq),
                });
            }
            current_header = Some(rest.to_string());
        } else {
            current_seq.extend_from_slice(line.trim_end().as_bytes());
        }
    }
    if let Some(header) = current_header {
        records.push(Record {
            header,
            sequence: current_seq,
        });
    }

    Ok(records)
}
