use anyhow::{Context, Result};
use cdbg_core::annotation::{AnnotationRecord, Hit};
use cdbg_core::edge_builder;
use cdbg_core::kmer_index::{BuildParams, KmerIndex};
use cdbg_core::manifest;
use cdbg_core::neighbourhood;
use cdbg_core::pattern_table;
use cdbg_core::sff::SignificanceFilter;
use cdbg_core::strain_mapper;
use cdbg_core::unitig_builder;
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::io::Write as _;
use std::path::{Path, PathBuf};

#[cfg(target_os = "linux")]
#[path = "memory_meter.rs"]
mod memory_meter;
#[cfg(not(target_os = "linux"))]
#[path = "memory_meter_dummy.rs"]
mod memory_meter;

use memory_meter::MemoryMeter;

/// Bacterial GWAS over compacted de Bruijn graphs: builds a unitig graph
/// from strain assemblies, maps strains onto it, and prepares
/// association-test and visualisation inputs.
#[derive(Parser, Debug)]
#[command(name = "cdbg-gwas")]
struct Cli {
    #[command(subcommand)]
    command: Step,

    /// The desired log level.
    #[arg(long, default_value = "Info", global = true)]
    log_level: LevelFilter,

    /// Report RSS memory usage between pipeline stages.
    #[arg(long = "report-memory", global = true)]
    report_memory: bool,
}

#[derive(Subcommand, Debug)]
enum Step {
    /// Build the de Bruijn graph, compact it into unitigs, and
    /// reconstruct unitig-graph edges. Writes `graph.nodes` and `graph.edges.dbg`.
    BuildDbg(BuildDbgArgs),
    /// Map every strain onto the unitig graph and deduplicate the
    /// resulting presence patterns. Writes the three pattern artifacts.
    MapReads(MapReadsArgs),
    /// Dispatches the (out-of-core-scope) association engine as an external
    /// process — typically an `Rscript` invocation.
    StatTest(StatTestArgs),
    /// Extract a neighbourhood of significant unitigs, aggregate
    /// annotation hits per component, and optionally dispatch the renderer.
    GenerateOutput(GenerateOutputArgs),
}

#[derive(clap::Args, Debug)]
struct BuildDbgArgs {
    /// Strain manifest (TSV: id, optional phenotype, path).
    #[arg(long = "strains")]
    strains: PathBuf,
    /// k-mer size.
    #[arg(short = 'k', long)]
    k: usize,
    /// Minimum k-mer abundance to be considered solid.
    #[arg(long = "min-abundance", default_value_t = 1)]
    min_abundance: u32,
    /// Output directory for `graph.nodes` and `graph.edges.dbg`.
    #[arg(long = "output")]
    output: PathBuf,
}

#[derive(clap::Args, Debug)]
struct MapReadsArgs {
    #[arg(long = "strains")]
    strains: PathBuf,
    #[arg(short = 'k', long)]
    k: usize,
    #[arg(long = "min-abundance", default_value_t = 1)]
    min_abundance: u32,
    /// Worker threads for the strain-mapping stage.
    #[arg(long = "nb-cores")]
    nb_cores: Option<usize>,
    /// Output directory for the pattern artifacts.
    #[arg(long = "output")]
    output: PathBuf,
}

#[derive(clap::Args, Debug)]
struct StatTestArgs {
    /// Path to the `Rscript` (or equivalent) executable.
    executable: PathBuf,
    /// Arguments forwarded verbatim to the child process.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

#[derive(clap::Args, Debug)]
struct GenerateOutputArgs {
    #[arg(long = "strains")]
    strains: PathBuf,
    #[arg(short = 'k', long)]
    k: usize,
    #[arg(long = "min-abundance", default_value_t = 1)]
    min_abundance: u32,
    /// Neighbourhood radius (edge-count distance).
    #[arg(long = "nh", default_value_t = 1)]
    nh: usize,
    /// Significant Features Filter: an integer top-N or a float q-value
    /// threshold.
    #[arg(long = "SFF")]
    sff: Option<String>,
    /// Ascending-by-q-value `unitig_id<TAB>qvalue` file driving `-SFF`; if
    /// omitted, `--seed` gives the seed set directly.
    #[arg(long = "qvalues")]
    qvalues: Option<PathBuf>,
    /// Explicit seed unitig ids, used when `--qvalues` is not given.
    #[arg(long = "seed")]
    seed: Vec<usize>,
    /// Sequence-similarity hits:
    /// `unitig_id<TAB>evalue<TAB>header<TAB>general<TAB>specific`. `general`
    /// and `specific` may be left empty to fall back to `header`.
    #[arg(long = "hits")]
    hits: Option<PathBuf>,
    /// Optional headless-renderer executable, run once the outputs are written.
    #[arg(long = "renderer")]
    renderer: Option<PathBuf>,
    #[arg(long = "output")]
    output: PathBuf,
}

fn initialise_logging(log_level: LevelFilter) {
    CombinedLogger::init(vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .expect("logging must only be initialised once");
    info!("logging initialised");
}

/// Re-derives the de Bruijn graph, unitigs, and manifest shared by every
/// subcommand. The CLI does not persist a serialized graph between
/// invocations (see DESIGN.md); each step rebuilds what it needs from the
/// strain manifest and `k`, which is deterministic and cheap relative to
/// spawning the external tools the pipeline otherwise depends on.
fn rebuild_graph(
    strains_path: &Path,
    k: usize,
    min_abundance: u32,
) -> Result<(Vec<manifest::Strain>, KmerIndex, unitig_builder::UnitigBuildResult)> {
    let strains = manifest::read_manifest(strains_path).context("reading strain manifest")?;
    let paths: Vec<&Path> = strains.iter().map(|s| s.path.as_path()).collect();
    let index = KmerIndex::build(&paths, BuildParams { k, min_abundance })
        .context("building de Bruijn graph")?;
    let built = unitig_builder::build(&index).context("building unitigs")?;
    Ok((strains, index, built))
}

fn run_build_dbg(args: BuildDbgArgs, meter: &mut MemoryMeter) -> Result<()> {
    let (_strains, index, built) = rebuild_graph(&args.strains, args.k, args.min_abundance)?;
    meter.report();

    let edges = edge_builder::build(&built.bank, &index).context("reconstructing edges")?;
    meter.report();

    std::fs::create_dir_all(&args.output).context("creating output directory")?;
    write_nodes(&args.output.join("graph.nodes"), &built.bank.sequences)?;
    write_edges(&args.output.join("graph.edges.dbg"), &edges)?;

    info!(
        "wrote {} unitigs and {} edges to {:?}",
        built.bank.sequences.len(),
        edges.len(),
        args.output
    );
    Ok(())
}

fn write_nodes(path: &Path, sequences: &[String]) -> Result<()> {
    let mut out = std::fs::File::create(path).with_context(|| format!("creating {path:?}"))?;
    for (id, seq) in sequences.iter().enumerate() {
        writeln!(out, "{id}\t{seq}")?;
    }
    Ok(())
}

fn write_edges(path: &Path, edges: &[edge_builder::Edge]) -> Result<()> {
    let mut out = std::fs::File::create(path).with_context(|| format!("creating {path:?}"))?;
    for edge in edges {
        writeln!(out, "{}\t{}\t{}", edge.source, edge.target, edge.orientation.as_str())?;
    }
    Ok(())
}

fn run_map_reads(args: MapReadsArgs, meter: &mut MemoryMeter) -> Result<()> {
    if let Some(nb_cores) = args.nb_cores {
        rayon::ThreadPoolBuilder::new()
            .num_threads(nb_cores)
            .build_global()
            .context("configuring worker pool")?;
    }

    let (strains, index, built) = rebuild_graph(&args.strains, args.k, args.min_abundance)?;
    meter.report();

    let num_unitigs = built.bank.sequences.len();
    let paths: Vec<PathBuf> = strains.iter().map(|s| s.path.clone()).collect();
    let bitmaps = strain_mapper::map_strains(&paths, &index, &built.index, num_unitigs)
        .context("mapping strains onto the unitig graph")?;
    meter.report();

    let table = pattern_table::build(&bitmaps, num_unitigs);
    std::fs::create_dir_all(&args.output).context("creating output directory")?;
    let strain_ids: Vec<String> = strains.iter().map(|s| s.id.clone()).collect();
    pattern_table::write_artifacts(&table, &built.bank.sequences, &strain_ids, &args.output)
        .context("writing pattern artifacts")?;

    info!(
        "{} strains mapped, {} unique patterns written to {:?}",
        strains.len(),
        table.pattern_rows.len(),
        args.output
    );
    Ok(())
}

fn run_stat_test(args: StatTestArgs) -> Result<()> {
    let executable = args
        .executable
        .to_str()
        .context("executable path is not valid UTF-8")?;
    let arg_refs: Vec<&str> = args.args.iter().map(String::as_str).collect();
    let stdout = cdbg_core::external::run(executable, &arg_refs)
        .context("running the association-test engine")?;
    print!("{stdout}");
    Ok(())
}

fn read_hits(path: &Path) -> Result<Vec<Hit>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let mut hits = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let unitig_id: usize = fields[0].parse().with_context(|| format!("parsing hit line {line:?}"))?;
        let e_value: f64 = fields[1].parse().with_context(|| format!("parsing hit line {line:?}"))?;
        let header = fields.get(2).copied().unwrap_or("");
        let general = fields.get(3).copied();
        let specific = fields.get(4).copied();
        hits.push(Hit::new(unitig_id, e_value, header, general, specific));
    }
    Ok(hits)
}

fn read_qvalues(path: &Path) -> Result<Vec<(usize, f64)>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t');
            let id: usize = fields
                .next()
                .context("missing unitig id")?
                .parse()
                .context("invalid unitig id")?;
            let q: f64 = fields
                .next()
                .context("missing q-value")?
                .parse()
                .context("invalid q-value")?;
            Ok((id, q))
        })
        .collect()
}

fn resolve_seeds(args: &GenerateOutputArgs) -> Result<Vec<usize>> {
    match (&args.qvalues, &args.sff) {
        (Some(path), Some(raw)) => {
            let filter = SignificanceFilter::parse(raw).context("parsing -SFF")?;
            let ranked = read_qvalues(path)?;
            let selected = filter.select(&ranked, |(_, q)| *q);
            Ok(selected.iter().map(|(id, _)| *id).collect())
        }
        _ => Ok(args.seed.clone()),
    }
}

fn run_generate_output(args: GenerateOutputArgs, meter: &mut MemoryMeter) -> Result<()> {
    let (_strains, index, built) = rebuild_graph(&args.strains, args.k, args.min_abundance)?;
    let edges = edge_builder::build(&built.bank, &index).context("reconstructing edges")?;
    meter.report();

    let graph = neighbourhood::build_graph(built.bank.sequences.len(), &edges);
    let seeds = resolve_seeds(&args)?;
    let extracted = neighbourhood::extract(&graph, &seeds, args.nh)
        .context("extracting neighbourhood")?;

    let hits = match &args.hits {
        Some(path) => read_hits(path)?,
        None => Vec::new(),
    };

    std::fs::create_dir_all(&args.output).context("creating output directory")?;
    for (component_index, component) in extracted.components.iter().enumerate() {
        let members: std::collections::HashSet<usize> = component.iter().copied().collect();
        let mut record = AnnotationRecord::new();
        for hit in hits.iter().filter(|h| members.contains(&h.unitig_id)) {
            record.add_hit(hit.clone());
        }
        write_component(&args.output, component_index, component, &record)?;
    }

    info!(
        "neighbourhood of {} seeds (radius {}) split into {} components, written to {:?}",
        seeds.len(),
        args.nh,
        extracted.components.len(),
        args.output
    );

    if let Some(renderer) = &args.renderer {
        let renderer = renderer.to_str().context("renderer path is not valid UTF-8")?;
        let output_dir = args.output.to_str().context("output path is not valid UTF-8")?;
        cdbg_core::external::run(renderer, &[output_dir]).context("running the renderer")?;
    }

    Ok(())
}

fn write_component(
    output_dir: &Path,
    component_index: usize,
    component: &[usize],
    record: &AnnotationRecord,
) -> Result<()> {
    let path = output_dir.join(format!("component_{component_index}.tsv"));
    let mut out = std::fs::File::create(&path).with_context(|| format!("creating {path:?}"))?;
    writeln!(out, "unitig_id\ttag_id\ttag\te_value")?;
    for &unitig_id in component {
        match record.by_unitig(unitig_id) {
            Some(hits) if !hits.is_empty() => {
                for &(tag_id, e_value) in hits {
                    let tag = &record.tag_order()[tag_id];
                    writeln!(out, "{unitig_id}\t{tag_id}\t{tag}\t{e_value}")?;
                }
            }
            _ => writeln!(out, "{unitig_id}\t\t\t")?,
        }
    }

    let json_path = output_dir.join(format!("component_{component_index}.json"));
    let json = record.to_json().context("serializing component annotations")?;
    std::fs::write(&json_path, json).with_context(|| format!("writing {json_path:?}"))?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    initialise_logging(cli.log_level);
    let mut meter = MemoryMeter::new(cli.report_memory);

    match cli.command {
        Step::BuildDbg(args) => run_build_dbg(args, &mut meter),
        Step::MapReads(args) => run_map_reads(args, &mut meter),
        Step::StatTest(args) => run_stat_test(args),
        Step::GenerateOutput(args) => run_generate_output(args, &mut meter),
    }
}
