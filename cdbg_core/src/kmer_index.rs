//! The k-mer graph library surface the core consumes.
//!
//! This is an external collaborator treated as opaque: a canonical
//! k-mer model, a de Bruijn graph built from a set of FASTA files, and a
//! minimum perfect hash from node identity to a dense index. The core
//! only ever calls through this surface, so a production
//! reimplementation could swap this module for a wrapper around GATB,
//! BCALM2, or any other cDBG library without touching the rest of the pipeline.

use crate::dna::{self, Strand};
use crate::error::{PipelineError, Result};
use crate::fasta;
use boomphf::Mphf;
use std::collections::HashMap;
use std::path::Path;

/// A node of the de Bruijn graph: a k-mer in a specific orientation. Two
/// `Node`s with the same underlying k-mer but opposite strand are related by
/// [`KmerIndex::reverse`]; [`KmerIndex::node_mphf_index`] is identical for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    /// The 2-bit packed sequence in the orientation this `Node` represents.
    value: u64,
}

impl Node {
    fn new(value: u64) -> Self {
        Self { value }
    }
}

/// Parameters controlling de Bruijn graph construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
    pub k: usize,
    pub min_abundance: u32,
}

/// The de Bruijn graph over the solid (sufficiently abundant) canonical
/// k-mers of a set of input FASTA files.
pub struct KmerIndex {
    k: usize,
    /// Canonical k-mer values, sorted ascending. Index into this vector is
    /// not the MPHF index (the MPHF index is independent of sort order and
    /// stable across lookups within a build); this vector
    /// just backs node iteration and existence checks.
    solid_canonical: Vec<u64>,
    present: std::collections::HashSet<u64>,
    mphf: Mphf<u64>,
}

impl KmerIndex {
    /// Builds the graph from a list of FASTA paths with the given k-mer size
    /// and minimum abundance. Slides a k-window over every
    /// sequence, skipping windows containing a base outside `{A,C,G,T}`
    /// (case-insensitive) — the same silent-skip behaviour strain mapping
    /// requires downstream in strain mapping.
    pub fn build(paths: &[impl AsRef<Path>], params: BuildParams) -> Result<Self> {
        let k = params.k;
        // k is conventionally odd (to avoid palindromic k-mers that are
        // their own reverse complement), but the two-strain linear-chromosome fixture
        // exercises k=4; we only enforce the hard bounds here and leave
        // odd/even a caller concern (see DESIGN.md).
        if k == 0 || k > dna::MAX_LEN {
            return Err(PipelineError::input_validation(format!(
                "k must be >= 1 and <= {}, got {}",
                dna::MAX_LEN,
                k
            )));
        }

        let mut counts: HashMap<u64, u32> = HashMap::new();
        for path in paths {
            let path = path.as_ref();
            let records = fasta::read_records(path)?;
            for record in &records {
                let seq = &record.sequence;
                if seq.len() < k {
                    continue;
                }
                for offset in 0..=seq.len() - k {
                    if let Some(value) = dna::encode(seq, offset, k) {
                        let (canon, _) = dna::canonical(value, k);
                        *counts.entry(canon).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut solid_canonical: Vec<u64> = counts
            .into_iter()
            .filter(|&(_, count)| count >= params.min_abundance.max(1))
            .map(|(value, _)| value)
            .collect();
        solid_canonical.sort_unstable();

        log::info!(
            "built de Bruijn graph: k={} solid k-mers={}",
            k,
            solid_canonical.len()
        );

        let present = solid_canonical.iter().copied().collect();
        let mphf = Mphf::new(1.7, &solid_canonical);

        Ok(Self {
            k,
            solid_canonical,
            present,
            mphf,
        })
    }

    pub fn kmer_size(&self) -> usize {
        self.k
    }

    pub fn node_count(&self) -> usize {
        self.solid_canonical.len()
    }

    /// Iterates every node of the graph, one per solid canonical k-mer, in
    /// the orientation that matches its canonical form.
    pub fn iter_nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.solid_canonical.iter().map(|&value| Node::new(value))
    }

    /// Builds a `Node` from a literal k-mer string, in whatever orientation
    /// the string is written — not necessarily canonical (matching the
    /// original's comment: "GATB kmer is any kmer... not necessarily the
    /// canonical one").
    pub fn build_node(&self, kmer: &str) -> Option<Node> {
        let value = dna::encode(kmer.as_bytes(), 0, self.k)?;
        Some(Node::new(value))
    }

    /// The node in the opposite orientation.
    pub fn reverse(&self, node: Node) -> Node {
        Node::new(dna::reverse_complement(node.value, self.k))
    }

    /// Renders a node to its ASCII sequence, in its current orientation.
    pub fn to_string(&self, node: Node) -> String {
        dna::decode(node.value, self.k)
    }

    fn is_solid(&self, value: u64) -> bool {
        let (canon, _) = dna::canonical(value, self.k);
        self.present.contains(&canon)
    }

    /// The node reached by extending `node`'s sequence one base to the
    /// right with `base` (`A`, `C`, `G`, or `T`), if that extension is a
    /// solid k-mer.
    pub fn successor(&self, node: Node, base: u8) -> Option<Node> {
        let shifted = (node.value << 2) & ((1u64 << (2 * self.k)) - 1);
        let code = match base.to_ascii_uppercase() {
            b'A' => 0u64,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => return None,
        };
        let extended = shifted | code;
        self.is_solid(extended).then(|| Node::new(extended))
    }

    /// All (at most 4) solid one-base extensions of `node`.
    pub fn successors(&self, node: Node) -> Vec<Node> {
        [b'A', b'C', b'G', b'T']
            .into_iter()
            .filter_map(|base| self.successor(node, base))
            .collect()
    }

    /// True iff `node` has more than one solid successor, i.e. it branches
    /// (used by unitig construction to decide when a non-branching path must terminate).
    pub fn is_branching_forward(&self, node: Node) -> bool {
        self.successors(node).len() > 1
    }

    /// All solid nodes `p` such that `p`'s forward extension reaches `node`.
    /// Computed symmetrically to `successors` via `reverse`.
    pub fn predecessors(&self, node: Node) -> Vec<Node> {
        let reversed = self.reverse(node);
        self.successors(reversed)
            .into_iter()
            .map(|s| self.reverse(s))
            .collect()
    }

    /// The strand of `node`'s current orientation relative to its canonical
    /// form: `Forward` iff `node`'s value already equals the canonical form.
    pub fn canonical_strand(&self, node: Node) -> Strand {
        dna::canonical(node.value, self.k).1
    }

    /// The minimum perfect hash index of `node`'s underlying k-mer,
    /// independent of which strand `node` currently represents.
    pub fn node_mphf_index(&self, node: Node) -> u64 {
        self.try_node_mphf_index(node)
            .expect("node_mphf_index called on a non-solid k-mer")
    }

    /// Like [`Self::node_mphf_index`], but returns `None` instead of
    /// panicking when `node`'s k-mer never made it into the solid set (e.g.
    /// it fell below the minimum-abundance threshold during the index build).
    pub fn try_node_mphf_index(&self, node: Node) -> Option<u64> {
        let (canon, _) = dna::canonical(node.value, self.k);
        if !self.present.contains(&canon) {
            return None;
        }
        self.mphf.try_hash(&canon)
    }

    /// Encodes `seq[offset..offset+k]`, canonicalizes it, and resolves the
    /// MPHF index directly — skipping the non-solid or non-ACGT window by
    /// returning `None` rather than constructing an intermediate `Node`.
    /// Used by strain mapping, which only needs the index.
    pub fn try_mphf_index_of_window(&self, seq: &[u8], offset: usize) -> Option<u64> {
        let value = dna::encode(seq, offset, self.k)?;
        let (canon, _) = dna::canonical(value, self.k);
        if !self.present.contains(&canon) {
            return None;
        }
        self.mphf.try_hash(&canon)
    }

    /// Encodes and canonicalizes an arbitrary-length seed (used for the
    /// (k-1)-mer model in edge reconstruction), mirroring `codeSeed`.
    pub fn code_seed(&self, seq: &[u8], offset: usize, len: usize) -> Option<(u64, Strand)> {
        dna::code_seed(seq, offset, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fasta_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn builds_solid_kmer_set_from_single_sequence() {
        let file = fasta_fixture(">seq\nAAAACCCCGGGG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        // AAAACCCCGGGG has 9 4-mers, all distinct canonical values expected (no repeats for this sequence).
        assert_eq!(index.node_count(), 9);
        assert_eq!(index.kmer_size(), 4);
    }

    #[test]
    fn successor_extends_by_one_base() {
        let file = fasta_fixture(">seq\nAAAACCCCGGGG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        let node = index.build_node("AAAA").unwrap();
        let succ = index.successor(node, b'C').unwrap();
        assert_eq!(index.to_string(succ), "AAAC");
    }

    #[test]
    fn reverse_is_an_involution() {
        let file = fasta_fixture(">seq\nAAAACCCCGGGG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        let node = index.build_node("AAAC").unwrap();
        let reversed = index.reverse(node);
        assert_eq!(index.reverse(reversed), node);
    }

    #[test]
    fn node_mphf_index_is_strand_independent() {
        let file = fasta_fixture(">seq\nAAAACCCCGGGG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        let node = index.build_node("AAAC").unwrap();
        let reversed = index.reverse(node);
        assert_eq!(index.node_mphf_index(node), index.node_mphf_index(reversed));
    }

    #[test]
    fn skips_windows_with_non_acgt() {
        let file = fasta_fixture(">seq\nAAAANCCCGGGG\n");
        let index = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: 4,
                min_abundance: 1,
            },
        )
        .unwrap();
        // windows overlapping the N (positions 1..=4) are all dropped.
        assert!(index.node_count() < 9);
    }

    #[test]
    fn rejects_k_above_max_len() {
        let file = fasta_fixture(">seq\nAAAA\n");
        let err = KmerIndex::build(
            &[file.path()],
            BuildParams {
                k: dna::MAX_LEN + 1,
                min_abundance: 1,
            },
        );
        assert!(err.is_err());
    }
}
