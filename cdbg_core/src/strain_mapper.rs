//! Strain mapping: for each strain, computes a dense bitmap over
//! unitigs recording which unitigs the strain's sequences touch.
//! Runs one task per strain via rayon; the unitig index is read-only and
//! shared across workers without synchronization.

use crate::error::Result;
use crate::fasta;
use crate::kmer_index::KmerIndex;
use crate::unitig_builder::UnitigIndexEntry;
use bit_set::BitSet;
use rayon::prelude::*;
use std::path::Path;

/// Bit `j` is set iff at least one k-mer of the strain's sequences maps into
/// unitig `j`.
pub type PresenceBitmap = BitSet;

/// Maps every strain in `paths` to a [`PresenceBitmap`], one task per strain
/// A failure on any strain aborts the whole batch; partial
/// results from other workers are discarded, matching the documented
/// fail-fast cancellation policy.
pub fn map_strains(
    paths: &[impl AsRef<Path> + Sync],
    kmer_index: &KmerIndex,
    unitig_index: &[Option<UnitigIndexEntry>],
    num_unitigs: usize,
) -> Result<Vec<PresenceBitmap>> {
    let result = paths
        .par_iter()
        .map(|path| map_one_strain(path.as_ref(), kmer_index, unitig_index, num_unitigs))
        .collect::<Result<Vec<_>>>()?;

    log::info!("mapped {} strains onto {} unitigs", result.len(), num_unitigs);
    Ok(result)
}

/// Maps a single strain's FASTA file to a [`PresenceBitmap`].
pub fn map_one_strain(
    path: &Path,
    kmer_index: &KmerIndex,
    unitig_index: &[Option<UnitigIndexEntry>],
    num_unitigs: usize,
) -> Result<PresenceBitmap> {
    let k = kmer_index.kmer_size();
    let mut bitmap = BitSet::with_capacity(num_unitigs);
    let records = fasta::read_records(path)?;

    for record in &records {
        let seq = &record.sequence;
        if seq.len() < k {
            continue;
        }
        let mut last_unitig: Option<usize> = None;
        for offset in 0..=seq.len() - k {
            let Some(mphf_index) = kmer_index.try_mphf_index_of_window(seq, offset) else {
                last_unitig = None;
                continue;
            };
            let entry = unitig_index[mphf_index as usize]
                .expect("every solid k-mer was assigned a unitig during construction");
            if last_unitig != Some(entry.unitig_id) {
                bitmap.insert(entry.unitig_id);
                last_unitig = Some(entry.unitig_id);
            }
        }
    }

    Ok(bitmap)
}
