//! End-to-end tests driving the `cdbg-gwas` binary over the `build-dbg` and
//! `map-reads` sub-steps.

use std::fs;
use std::process::Command;

fn cdbg_gwas() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cdbg-gwas"))
}

fn write_manifest(dir: &std::path::Path, rows: &[(&str, &str)]) -> std::path::PathBuf {
    let manifest_path = dir.join("manifest.tsv");
    let mut contents = String::from("id\tpath\n");
    for (id, seq) in rows {
        let fasta_path = dir.join(format!("{id}.fasta"));
        fs::write(&fasta_path, format!(">seq\n{seq}\n")).unwrap();
        contents.push_str(&format!("{id}\t{}\n", fasta_path.display()));
    }
    fs::write(&manifest_path, contents).unwrap();
    manifest_path
}

/// Two strains sharing a linear chromosome, k=4, should compact to exactly
/// 4 unitigs with no self-loop edges.
#[test]
fn build_dbg_writes_unitigs_and_edges_for_two_strains() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        dir.path(),
        &[("a", "AAAACCCCGGGG"), ("b", "AAAATTTTGGGG")],
    );
    let output = dir.path().join("out");

    let status = cdbg_gwas()
        .args(["build-dbg", "--strains"])
        .arg(&manifest)
        .args(["-k", "4", "--output"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let nodes = fs::read_to_string(output.join("graph.nodes")).unwrap();
    assert_eq!(nodes.lines().count(), 4);

    let edges = fs::read_to_string(output.join("graph.edges.dbg")).unwrap();
    for line in edges.lines() {
        let mut fields = line.split('\t');
        let from: usize = fields.next().unwrap().parse().unwrap();
        let to: usize = fields.next().unwrap().parse().unwrap();
        assert_ne!(from, to, "no self-loop edges");
    }
}

#[test]
fn map_reads_then_dedup_produces_pattern_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_manifest(
        dir.path(),
        &[("a", "AAAACCCCGGGG"), ("b", "AAAATTTTGGGG")],
    );
    let output = dir.path().join("out");

    let status = cdbg_gwas()
        .args(["map-reads", "--strains"])
        .arg(&manifest)
        .args(["-k", "4", "--output"])
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());

    let rtab = fs::read_to_string(output.join("unitigs.unique_rows.Rtab")).unwrap();
    let mut lines = rtab.lines();
    assert_eq!(lines.next().unwrap(), "pattern_id\ta\tb");
    // 2 unique patterns among the 4 unitigs.
    assert_eq!(lines.count(), 2);

    let unitigs_txt = fs::read_to_string(output.join("unitigs.txt")).unwrap();
    assert_eq!(unitigs_txt.lines().count(), 4);
}

#[test]
fn rejects_manifest_with_duplicate_strain_ids() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = dir.path().join("a.fasta");
    fs::write(&fasta, ">seq\nACGTACGT\n").unwrap();
    let manifest = dir.path().join("manifest.tsv");
    fs::write(
        &manifest,
        format!(
            "id\tpath\nstrain1\t{0}\nstrain1\t{0}\n",
            fasta.display()
        ),
    )
    .unwrap();

    let status = cdbg_gwas()
        .args(["build-dbg", "--strains"])
        .arg(&manifest)
        .args(["-k", "4", "--output"])
        .arg(dir.path().join("out"))
        .status()
        .unwrap();
    assert!(!status.success());
}
