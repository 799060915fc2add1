//! Unitig construction: partitions every solid k-mer into maximal
//! non-branching paths of the de Bruijn graph and records, per k-mer, which
//! unitig it belongs to, on which strand, and at which offset.

use crate::dna::Strand;
use crate::error::{PipelineError, Result};
use crate::kmer_index::{KmerIndex, Node};
use std::collections::HashSet;

/// Where one k-mer sits within its unitig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitigIndexEntry {
    pub unitig_id: usize,
    pub strand: Strand,
    pub offset: usize,
    pub unitig_length: usize,
    pub k: usize,
}

/// The unitig sequences, indexed by `unitig_id`.
pub struct UnitigBank {
    pub sequences: Vec<String>,
}

pub struct UnitigBuildResult {
    pub bank: UnitigBank,
    /// Indexed by MPHF node index; `None` only transiently during
    /// construction, never in the returned result (checked below).
    pub index: Vec<Option<UnitigIndexEntry>>,
}

/// Builds every unitig of `kmer_index`. Enforces the invariant that every solid
/// k-mer is assigned to exactly one unitig, at exactly one offset, before
/// returning.
pub fn build(kmer_index: &KmerIndex) -> Result<UnitigBuildResult> {
    let k = kmer_index.kmer_size();
    let n = kmer_index.node_count();
    let mut visited = vec![false; n];
    let mut bank = Vec::new();
    let mut index: Vec<Option<UnitigIndexEntry>> = vec![None; n];

    let mut unitig_id = 0usize;
    for seed in kmer_index.iter_nodes() {
        let seed_idx = kmer_index.node_mphf_index(seed) as usize;
        if visited[seed_idx] {
            continue;
        }

        let right_path = extend_chain(kmer_index, seed, &visited, &HashSet::new());

        // A purely circular unitig (every node non-branching, no repeat
        // induces a branch point — a closed bacterial chromosome/plasmid is
        // the common case) has `right_path` already walk the whole ring back
        // to just short of `seed`: the forward walk's own `seen_this_chain`
        // stops it there. Seed the left walk's stop set with every node
        // `right_path` already claimed (plus the seed itself) so that on a
        // true cycle the left walk immediately recognises it would be
        // re-entering the ring and stops without re-claiming a single node.
        let mut claimed: HashSet<u64> = right_path
            .iter()
            .map(|node| kmer_index.node_mphf_index(*node))
            .collect();
        claimed.insert(kmer_index.node_mphf_index(seed));

        let reversed_seed = kmer_index.reverse(seed);
        let left_path = extend_chain(kmer_index, reversed_seed, &visited, &claimed);

        let l = left_path.len();
        let r = right_path.len();
        let unitig_length = k + l + r;

        let left_ext_chars: String = left_path
            .iter()
            .map(|n| last_char(kmer_index.to_string(*n)))
            .collect();
        let right_ext_chars: String = right_path
            .iter()
            .map(|n| last_char(kmer_index.to_string(*n)))
            .collect();
        let seed_str = kmer_index.to_string(seed);
        let unitig_seq = format!(
            "{}{}{}",
            revcomp_string(&left_ext_chars),
            seed_str,
            right_ext_chars
        );

        assign_entry(
            kmer_index,
            &mut index,
            &mut visited,
            seed,
            unitig_id,
            l,
            unitig_length,
            k,
            false,
        )?;
        for (i, node) in right_path.iter().enumerate() {
            assign_entry(
                kmer_index,
                &mut index,
                &mut visited,
                *node,
                unitig_id,
                l + 1 + i,
                unitig_length,
                k,
                false,
            )?;
        }
        for (i, node) in left_path.iter().enumerate() {
            assign_entry(
                kmer_index,
                &mut index,
                &mut visited,
                *node,
                unitig_id,
                l - 1 - i,
                unitig_length,
                k,
                true,
            )?;
        }

        bank.push(unitig_seq);
        unitig_id += 1;
    }

    if index.iter().any(Option::is_none) {
        return Err(PipelineError::invariant(
            "not every solid k-mer was assigned to a unitig",
        ));
    }

    log::info!(
        "built {} unitigs from {} solid k-mers (k={})",
        bank.len(),
        n,
        k
    );

    Ok(UnitigBuildResult {
        bank: UnitigBank { sequences: bank },
        index,
    })
}

/// Extends `start` forward along the unique-successor chain: stops at a
/// branching node (more than one successor, or the successor has more than
/// one predecessor — an inbound branch), a dead end, a node visited by an
/// earlier unitig, a node already seen earlier in this same chain (a
/// closed/circular unitig walked from its own seed), or a node in
/// `stop_at` — nodes the chain extending in the *other* direction from the
/// same seed has already claimed, so a pure cycle closes here instead of
/// re-walking the ring a second time.
fn extend_chain(kmer_index: &KmerIndex, start: Node, visited: &[bool], stop_at: &HashSet<u64>) -> Vec<Node> {
    let mut path = Vec::new();
    let mut seen_this_chain: HashSet<u64> = HashSet::new();
    seen_this_chain.insert(kmer_index.node_mphf_index(start));

    let mut current = start;
    loop {
        if kmer_index.is_branching_forward(current) {
            break;
        }
        let succs = kmer_index.successors(current);
        if succs.is_empty() {
            break;
        }
        let next = succs[0];
        if kmer_index.predecessors(next).len() != 1 {
            break;
        }
        let next_idx = kmer_index.node_mphf_index(next);
        if visited[next_idx as usize] || seen_this_chain.contains(&next_idx) || stop_at.contains(&next_idx) {
            break;
        }
        seen_this_chain.insert(next_idx);
        path.push(next);
        current = next;
    }
    path
}

fn assign_entry(
    kmer_index: &KmerIndex,
    index: &mut [Option<UnitigIndexEntry>],
    visited: &mut [bool],
    node: Node,
    unitig_id: usize,
    offset: usize,
    unitig_length: usize,
    k: usize,
    is_left_extension: bool,
) -> Result<()> {
    let idx = kmer_index.node_mphf_index(node) as usize;
    if index[idx].is_some() {
        return Err(PipelineError::invariant(format!(
            "k-mer index {idx} assigned to more than one unitig"
        )));
    }
    let rel = kmer_index.canonical_strand(node);
    let strand = if is_left_extension { rel.flip() } else { rel };
    index[idx] = Some(UnitigIndexEntry {
        unitig_id,
        strand,
        offset,
        unitig_length,
        k,
    });
    visited[idx] = true;
    Ok(())
}

fn last_char(s: String) -> char {
    s.chars().next_back().expect("k-mer string is non-empty")
}

fn revcomp_string(s: &str) -> String {
    s.chars()
        .rev()
        .map(|c| match c {
            'A' => 'T',
            'C' => 'G',
            'G' => 'C',
            'T' => 'A',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kmer_index::BuildParams;
    use std::io::Write;

    fn fasta_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    /// Two strains sharing one linear chromosome, k=4,
    /// should compact to a single unitig spanning the whole sequence.
    #[test]
    fn linear_chromosome_compacts_to_one_unitig() {
        let file = fasta_fixture(">chr\nACGTACGGT\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        let result = build(&index).unwrap();

        assert_eq!(result.bank.sequences.len(), 1);
        let seq = &result.bank.sequences[0];
        assert_eq!(seq.len(), 9);

        for entry in result.index.iter().flatten() {
            assert_eq!(entry.unitig_id, 0);
            assert_eq!(entry.unitig_length, seq.len());
        }
    }

    /// The recorded strand must correctly predict whether
    /// the k-mer or its reverse complement appears at `offset`.
    #[test]
    fn strand_and_offset_round_trip_every_kmer() {
        let file = fasta_fixture(">seq\nGATTACAGATTACA\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 5,
                min_abundance: 1,
            },
        )
        .unwrap();
        let result = build(&index).unwrap();

        for node in index.iter_nodes() {
            let idx = index.node_mphf_index(node) as usize;
            let entry = result.index[idx].expect("every node must be assigned");
            let unitig = &result.bank.sequences[entry.unitig_id];
            let window = &unitig[entry.offset..entry.offset + entry.k];
            let forward = index.to_string(node);
            let rc: String = forward
                .chars()
                .rev()
                .map(|c| match c {
                    'A' => 'T',
                    'C' => 'G',
                    'G' => 'C',
                    'T' => 'A',
                    other => other,
                })
                .collect();
            match entry.strand {
                Strand::Forward => assert_eq!(window, forward),
                Strand::Reverse => assert_eq!(window, rc),
            }
        }
    }

    /// A branching node (two distinct successors) must end its own unitig
    /// rather than being silently absorbed into a neighbour's path.
    #[test]
    fn branching_node_terminates_its_unitig() {
        // AAAC -> AACA and AAAC -> AACG: AAAC branches.
        let file = fasta_fixture(">a\nAAAACA\n>b\nAAAACG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        let result = build(&index).unwrap();

        // every k-mer assigned exactly once, regardless of unitig count.
        assert!(result.index.iter().all(Option::is_some));
        let branch_node = index.build_node("AAAC").unwrap();
        let idx = index.node_mphf_index(branch_node) as usize;
        let entry = result.index[idx].unwrap();
        // AAAC has two successors, so it cannot have been extended rightward
        // past itself: it must sit at the right edge of its unitig.
        assert_eq!(entry.offset + entry.k, entry.unitig_length);
    }

    /// A tandem repeat whose de Bruijn graph is a pure cycle (every node has
    /// exactly one successor and one predecessor, as in a closed bacterial
    /// chromosome or plasmid) must compact to a single unitig, not fail with
    /// an invariant violation from the forward and backward walks both
    /// independently claiming the whole ring.
    #[test]
    fn closed_cycle_compacts_to_one_unitig_without_error() {
        // k=3 de Bruijn graph of ACGACGACG is the 3-cycle ACG -> CGA -> GAC -> ACG.
        let file = fasta_fixture(">plasmid\nACGACGACG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 3,
                min_abundance: 1,
            },
        )
        .unwrap();
        let result = build(&index).unwrap();

        assert_eq!(result.bank.sequences.len(), 1);
        assert!(result.index.iter().all(Option::is_some));
        for entry in result.index.iter().flatten() {
            assert_eq!(entry.unitig_id, 0);
        }
    }
}
