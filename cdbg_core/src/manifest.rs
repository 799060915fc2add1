//! Strain manifest parsing: a line-oriented TSV with one header line naming
//! `id`, optional `phenotype`, and `path` columns.

use crate::error::{PipelineError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A strain's case/control label. Absent entirely when the manifest has no
/// `phenotype` column; strains whose value is `NA` are excluded before this
/// type is ever constructed for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phenotype {
    Control,
    Case,
}

/// One parsed, validated manifest row.
#[derive(Debug, Clone)]
pub struct Strain {
    pub id: String,
    pub phenotype: Option<Phenotype>,
    pub path: PathBuf,
}

/// Parses and validates a strain manifest. Duplicate ids and
/// malformed phenotype values are fatal `InputValidation` errors; strains
/// with phenotype `NA` are warned about and dropped from the result.
pub fn read_manifest(path: &Path) -> Result<Vec<Strain>> {
    let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let mut lines = contents.lines();

    let header = lines
        .next()
        .ok_or_else(|| PipelineError::input_validation("strain manifest is empty"))?;
    let columns: Vec<&str> = header.split('\t').collect();
    let id_col = columns
        .iter()
        .position(|&c| c == "id")
        .ok_or_else(|| PipelineError::input_validation("manifest header is missing required column 'id'"))?;
    let path_col = columns
        .iter()
        .position(|&c| c == "path")
        .ok_or_else(|| PipelineError::input_validation("manifest header is missing required column 'path'"))?;
    let phenotype_col = columns.iter().position(|&c| c == "phenotype");

    let mut strains = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (offset, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = offset + 2; // header occupies line 1
        let fields: Vec<&str> = line.split('\t').collect();

        let id = field(&fields, id_col, "id", line_number)?.to_string();
        if !seen_ids.insert(id.clone()) {
            return Err(PipelineError::input_validation(format!(
                "manifest line {line_number}: duplicate strain id '{id}'"
            )));
        }

        let phenotype = match phenotype_col {
            Some(col) => match field(&fields, col, "phenotype", line_number)? {
                "0" => Some(Phenotype::Control),
                "1" => Some(Phenotype::Case),
                "NA" => {
                    log::warn!("manifest line {line_number}: strain '{id}' has phenotype NA, excluding");
                    None
                }
                other => {
                    return Err(PipelineError::input_validation(format!(
                        "manifest line {line_number}: invalid phenotype '{other}' (expected 0, 1, or NA)"
                    )))
                }
            },
            None => None,
        };
        if phenotype_col.is_some() && phenotype.is_none() {
            continue;
        }

        let raw_path = field(&fields, path_col, "path", line_number)?;
        let resolved = std::fs::canonicalize(raw_path).map_err(|_| {
            PipelineError::input_validation(format!(
                "manifest line {line_number}: path '{raw_path}' is not a readable file"
            ))
        })?;

        strains.push(Strain {
            id,
            phenotype,
            path: resolved,
        });
    }

    if strains.is_empty() {
        return Err(PipelineError::input_validation(
            "strain manifest contains no usable strains",
        ));
    }

    Ok(strains)
}

fn field<'a>(fields: &[&'a str], col: usize, name: &str, line_number: usize) -> Result<&'a str> {
    fields.get(col).copied().ok_or_else(|| {
        PipelineError::input_validation(format!("manifest line {line_number}: missing '{name}' field"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn manifest_fixture(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = dir.path().join("a.fasta");
        std::fs::write(&fasta_path, ">seq\nACGT\n").unwrap();
        let manifest_path = dir.path().join("manifest.tsv");
        let mut file = std::fs::File::create(&manifest_path).unwrap();
        write!(file, "{}", contents.replace("FASTA_PATH", fasta_path.to_str().unwrap())).unwrap();
        (dir, manifest_path)
    }

    #[test]
    fn parses_id_phenotype_path() {
        let (_dir, path) = manifest_fixture("id\tphenotype\tpath\nstrain1\t1\tFASTA_PATH\n");
        let strains = read_manifest(&path).unwrap();
        assert_eq!(strains.len(), 1);
        assert_eq!(strains[0].id, "strain1");
        assert_eq!(strains[0].phenotype, Some(Phenotype::Case));
    }

    #[test]
    fn excludes_na_phenotype_strains() {
        let (_dir, path) = manifest_fixture(
            "id\tphenotype\tpath\nstrain1\tNA\tFASTA_PATH\nstrain2\t0\tFASTA_PATH\n",
        );
        let strains = read_manifest(&path).unwrap();
        assert_eq!(strains.len(), 1);
        assert_eq!(strains[0].id, "strain2");
    }

    #[test]
    fn rejects_duplicate_ids() {
        let (_dir, path) = manifest_fixture("id\tpath\nstrain1\tFASTA_PATH\nstrain1\tFASTA_PATH\n");
        assert!(read_manifest(&path).is_err());
    }

    #[test]
    fn rejects_invalid_phenotype_value() {
        let (_dir, path) = manifest_fixture("id\tphenotype\tpath\nstrain1\tmaybe\tFASTA_PATH\n");
        assert!(read_manifest(&path).is_err());
    }

    #[test]
    fn manifest_without_phenotype_column_keeps_every_strain() {
        let (_dir, path) = manifest_fixture("id\tpath\nstrain1\tFASTA_PATH\n");
        let strains = read_manifest(&path).unwrap();
        assert_eq!(strains.len(), 1);
        assert_eq!(strains[0].phenotype, None);
    }
}
