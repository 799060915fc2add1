//! Pattern deduplication: transposes the strain × unitig presence
//! bitmaps into unitig × strain patterns, groups unitigs sharing an
//! identical pattern, and emits the three pattern artifacts.

use crate::error::{PipelineError, Result};
use crate::strain_mapper::PresenceBitmap;
use bit_set::BitSet;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// The grouped, transposed view of a set of strain bitmaps.
pub struct PatternTable {
    /// Unitig-major bitmaps: `unitig_strain_bitmaps[u]` has bit `s` set iff
    /// strain `s` contains unitig `u`.
    pub unitig_strain_bitmaps: Vec<BitSet>,
    /// The `"0"`/`"1"` row, one character per strain, for each unique
    /// pattern, in ascending (lexicographic) pattern-id order.
    pub pattern_rows: Vec<String>,
    /// Unitig ids sharing each pattern, ascending, parallel to `pattern_rows`.
    pub pattern_to_unitigs: Vec<Vec<usize>>,
    /// Pattern id of each unitig, indexed by unitig id.
    pub unitig_pattern_id: Vec<usize>,
}

/// Transposes `strain_bitmaps` (one per strain, each of length `num_unitigs`)
/// and groups unitigs by identical pattern. Pattern ids
/// are assigned by ascending lexicographic order of the pattern row, so
/// rebuilding from the same bitmaps is byte-identical.
pub fn build(strain_bitmaps: &[PresenceBitmap], num_unitigs: usize) -> PatternTable {
    let num_strains = strain_bitmaps.len();
    let mut unitig_strain_bitmaps: Vec<BitSet> =
        (0..num_unitigs).map(|_| BitSet::with_capacity(num_strains)).collect();

    for (strain_id, bitmap) in strain_bitmaps.iter().enumerate() {
        for unitig_id in bitmap.iter() {
            unitig_strain_bitmaps[unitig_id].insert(strain_id);
        }
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (unitig_id, bitmap) in unitig_strain_bitmaps.iter().enumerate() {
        let row = render_row(bitmap, num_strains);
        groups.entry(row).or_default().push(unitig_id);
    }

    let mut pattern_rows = Vec::with_capacity(groups.len());
    let mut pattern_to_unitigs = Vec::with_capacity(groups.len());
    let mut unitig_pattern_id = vec![0usize; num_unitigs];
    for (pattern_id, (row, mut unitig_ids)) in groups.into_iter().enumerate() {
        unitig_ids.sort_unstable();
        for &u in &unitig_ids {
            unitig_pattern_id[u] = pattern_id;
        }
        pattern_rows.push(row);
        pattern_to_unitigs.push(unitig_ids);
    }

    log::info!(
        "{} unitigs collapse to {} unique patterns across {} strains",
        num_unitigs,
        pattern_rows.len(),
        num_strains
    );

    PatternTable {
        unitig_strain_bitmaps,
        pattern_rows,
        pattern_to_unitigs,
        unitig_pattern_id,
    }
}

fn render_row(bitmap: &BitSet, num_strains: usize) -> String {
    (0..num_strains)
        .map(|i| if bitmap.contains(i) { '1' } else { '0' })
        .collect()
}

/// Rewrites each pattern row so that `0` denotes the allele (presence or
/// absence) carried by the majority of strains, flipping rows where the `1`
/// count exceeds half the strains (ties keep the original encoding). Mirrors
/// the original pipeline's `generateBugwasInput` re-encoding step ahead of
/// handing the `.Rtab` off to the association engine; not exercised by any
/// end-to-end fixture, so it is an opt-in transform rather than the default
/// `write_artifacts` behaviour.
pub fn major_allele_encoding(table: &PatternTable, num_strains: usize) -> Vec<String> {
    table
        .pattern_rows
        .iter()
        .map(|row| {
            let ones = row.chars().filter(|&c| c == '1').count();
            if ones * 2 > num_strains {
                row.chars()
                    .map(|c| if c == '1' { '0' } else { '1' })
                    .collect()
            } else {
                row.clone()
            }
        })
        .collect()
}

/// Writes the three pattern artifacts into `output_dir`.
pub fn write_artifacts(
    table: &PatternTable,
    unitig_bank: &[String],
    strain_ids: &[String],
    output_dir: &Path,
) -> Result<()> {
    write_unitigs_txt(table, unitig_bank, strain_ids, &output_dir.join("unitigs.txt"))?;
    write_unique_rows_to_all_rows(
        table,
        &output_dir.join("unitigs.unique_rows_to_all_rows.txt"),
    )?;
    write_rtab(table, strain_ids, &output_dir.join("unitigs.unique_rows.Rtab"))?;
    Ok(())
}

fn write_unitigs_txt(
    table: &PatternTable,
    unitig_bank: &[String],
    strain_ids: &[String],
    path: &Path,
) -> Result<()> {
    let mut out = std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    for (unitig_id, seq) in unitig_bank.iter().enumerate() {
        let members = table.unitig_strain_bitmaps[unitig_id]
            .iter()
            .map(|s| format!("{}:1", strain_ids[s]))
            .join(" ");
        writeln!(out, "{} | {}", seq, members).map_err(|e| PipelineError::io(path, e))?;
    }
    Ok(())
}

fn write_unique_rows_to_all_rows(table: &PatternTable, path: &Path) -> Result<()> {
    let mut out = std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    for (pattern_id, unitig_ids) in table.pattern_to_unitigs.iter().enumerate() {
        let ids = unitig_ids.iter().join(" ");
        writeln!(out, "{} = {}", pattern_id, ids).map_err(|e| PipelineError::io(path, e))?;
    }
    Ok(())
}

fn write_rtab(table: &PatternTable, strain_ids: &[String], path: &Path) -> Result<()> {
    let mut out = std::fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    writeln!(out, "pattern_id\t{}", strain_ids.join("\t")).map_err(|e| PipelineError::io(path, e))?;
    for (pattern_id, row) in table.pattern_rows.iter().enumerate() {
        let cells = row.chars().join("\t");
        writeln!(out, "{}\t{}", pattern_id, cells).map_err(|e| PipelineError::io(path, e))?;
    }
    Ok(())
}
