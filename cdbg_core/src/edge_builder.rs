//! Edge reconstruction: links unitigs through their terminal (k−1)-mers
//! and assigns each adjacency an `FF`/`FR`/`RF`/`RR` orientation label.

use crate::dna::Strand;
use crate::error::Result;
use crate::kmer_index::{KmerIndex, Node};
use crate::unitig_builder::UnitigBank;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Which end of a unitig a terminal (k−1)-mer was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// The relative orientation of a unitig-graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Ff,
    Fr,
    Rf,
    Rr,
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Ff => "FF",
            Orientation::Fr => "FR",
            Orientation::Rf => "RF",
            Orientation::Rr => "RR",
        }
    }
}

/// One unitig-level adjacency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
    pub orientation: Orientation,
}

struct Terminal {
    unitig_id: usize,
    strand: Strand,
    side: Side,
}

/// Reconstructs unitig-graph edges from the terminal (k−1)-mers of every
/// unitig in `bank`, verifying each candidate adjacency against `kmer_index`
/// before emitting it. Never emits a self-loop and emits
/// each `(u, v, label)` triple at most once.
pub fn build(bank: &UnitigBank, kmer_index: &KmerIndex) -> Result<Vec<Edge>> {
    let k = kmer_index.kmer_size();
    let km1 = k - 1;
    let n = bank.sequences.len();

    // A canonical (k-1)-mer is shared by at most the 4 possible one-base
    // extensions on each side, so the common case fits inline without a
    // heap allocation per bucket.
    let mut terminals: HashMap<u64, SmallVec<[Terminal; 4]>> = HashMap::new();
    let mut lefts: Vec<(u64, Strand)> = Vec::with_capacity(n);
    let mut rights: Vec<(u64, Strand)> = Vec::with_capacity(n);

    for (id, seq) in bank.sequences.iter().enumerate() {
        let bytes = seq.as_bytes();
        let (left_canon, left_strand) = kmer_index
            .code_seed(bytes, 0, km1)
            .expect("unitig sequence is always valid ACGT of length >= k-1");
        let (right_canon, right_strand) = kmer_index
            .code_seed(bytes, seq.len() - km1, km1)
            .expect("unitig sequence is always valid ACGT of length >= k-1");

        terminals.entry(left_canon).or_default().push(Terminal {
            unitig_id: id,
            strand: left_strand,
            side: Side::Left,
        });
        terminals.entry(right_canon).or_default().push(Terminal {
            unitig_id: id,
            strand: right_strand,
            side: Side::Right,
        });

        lefts.push((left_canon, left_strand));
        rights.push((right_canon, right_strand));
    }

    let mut seen: HashSet<(usize, usize, Orientation)> = HashSet::new();
    let mut edges = Vec::new();

    for u in 0..n {
        for &(u_side, u_canon, u_strand) in &[
            (Side::Left, lefts[u].0, lefts[u].1),
            (Side::Right, rights[u].0, rights[u].1),
        ] {
            let Some(candidates) = terminals.get(&u_canon) else {
                continue;
            };
            for candidate in candidates {
                if candidate.unitig_id == u {
                    continue;
                }
                let strand_eq = candidate.strand == u_strand;
                let Some(orientation) = derive_orientation(u_side, candidate.side, strand_eq)
                else {
                    continue;
                };
                if !verify_adjacency(kmer_index, bank, u, u_side, candidate.unitig_id, candidate.side, orientation) {
                    continue;
                }
                let key = (u, candidate.unitig_id, orientation);
                if seen.insert(key) {
                    edges.push(Edge {
                        source: u,
                        target: candidate.unitig_id,
                        orientation,
                    });
                }
            }
        }
    }

    log::info!("reconstructed {} unitig-graph edges from {} unitigs", edges.len(), n);
    Ok(edges)
}

/// The orientation-decision table, `u`'s side as anchor.
fn derive_orientation(u_side: Side, v_side: Side, strand_eq: bool) -> Option<Orientation> {
    use Side::{Left, Right};
    match (u_side, v_side, strand_eq) {
        (Right, Left, true) => Some(Orientation::Ff),
        (Right, Left, false) => None,
        (Right, Right, true) => None,
        (Right, Right, false) => Some(Orientation::Fr),
        (Left, Left, true) => None,
        (Left, Left, false) => Some(Orientation::Rf),
        (Left, Right, true) => Some(Orientation::Rr),
        (Left, Right, false) => None,
    }
}

fn terminal_kmer<'a>(bank: &'a UnitigBank, unitig_id: usize, side: Side, k: usize) -> &'a str {
    let seq = &bank.sequences[unitig_id];
    match side {
        Side::Left => &seq[0..k],
        Side::Right => &seq[seq.len() - k..],
    }
}

fn oriented_endpoint(kmer_index: &KmerIndex, node: Node, flip: bool) -> Node {
    if flip {
        kmer_index.reverse(node)
    } else {
        node
    }
}

fn verify_adjacency(
    kmer_index: &KmerIndex,
    bank: &UnitigBank,
    u: usize,
    u_side: Side,
    v: usize,
    v_side: Side,
    orientation: Orientation,
) -> bool {
    let k = kmer_index.kmer_size();
    let u_raw = kmer_index
        .build_node(terminal_kmer(bank, u, u_side, k))
        .expect("unitig terminal is a valid k-mer");
    let v_raw = kmer_index
        .build_node(terminal_kmer(bank, v, v_side, k))
        .expect("unitig terminal is a valid k-mer");

    let label = orientation.as_str().as_bytes();
    let u_endpoint = oriented_endpoint(kmer_index, u_raw, label[0] == b'R');
    let v_endpoint = oriented_endpoint(kmer_index, v_raw, label[1] == b'R');

    kmer_index.successors(u_endpoint).contains(&v_endpoint)
}
