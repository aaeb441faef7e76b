use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use leaderless_taxa::config::{GuardPolicy, Group, RenderOptions, TreeConfig};
use leaderless_taxa::errors::Result;
use leaderless_taxa::genome_stats::{extract_genome_stats, read_genome_list, ExtractOptions};
use leaderless_taxa::summarize;
use leaderless_taxa::taxdb::load_taxonomy;

/// Summarize leaderless genes and operon starts over the NCBI taxonomy.
#[derive(Parser, Debug)]
#[command(name = "leaderless-taxa", version, about)]
struct Args {
    /// Genome list: `<accession> <genetic code> <taxid>` per line
    list: PathBuf,
    /// Taxonomy nodes dump (nodes.dmp, optionally gzipped)
    taxonomy: PathBuf,
    /// Directory holding one run folder per genome accession
    datapath: PathBuf,
    /// Taxonomy names dump (names.dmp, optionally gzipped)
    names: PathBuf,

    /// Genome group to summarize
    #[arg(long, value_parser = clap::value_parser!(Group))]
    gtype: Group,

    /// Run directory name under `<datapath>/<accession>/runs/`
    #[arg(long, default_value = "gms2")]
    run_dir: String,

    /// Take the genome type from a yes/no class file
    #[arg(long)]
    type_from_class_file: bool,

    /// Name of the class file inside the run directory
    #[arg(long, default_value = "class")]
    class_file: String,

    /// Use the historical zero-count guards for the percentage sums
    #[arg(long)]
    legacy_guards: bool,

    /// Do not expand taxa without any genome of the selected group
    #[arg(long)]
    prune_untyped: bool,

    /// Print a column header above the report
    #[arg(long)]
    header: bool,

    /// Show progress bars
    #[arg(long)]
    progress: bool,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn progress_bar(len: usize, enabled: bool, msg: &'static str) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style.progress_chars("=> "));
    pb.set_message(msg);
    pb
}

fn run(args: &Args) -> Result<String> {
    let config = TreeConfig::new(args.gtype)
        .with_guard_policy(if args.legacy_guards {
            GuardPolicy::Legacy
        } else {
            GuardPolicy::Denominator
        })
        .with_render_options(RenderOptions {
            prune_untyped: args.prune_untyped,
            ..RenderOptions::default()
        });

    let options = ExtractOptions {
        run_dir: args.run_dir.clone(),
        type_from_class_file: args.type_from_class_file,
        class_file: args.class_file.clone(),
        ..ExtractOptions::new(&args.datapath)
    };

    log::info!("Reading genome list...");
    let listed = read_genome_list(&args.list)?;

    let pb = progress_bar(listed.len(), args.progress, "Reading genome info");
    let mut genomes = Vec::with_capacity(listed.len());
    for mut genome in listed {
        match extract_genome_stats(&mut genome, &options, &config) {
            Ok(()) => genomes.push(genome),
            Err(e) => log::warn!("Skipping {}: {}", genome.accession, e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    log::info!("Reading taxonomy...");
    let taxonomy = load_taxonomy(&args.taxonomy, &args.names)?;

    let pb = progress_bar(genomes.len(), args.progress, "Updating record tree");
    let summary = summarize(taxonomy, pb.wrap_iter(genomes.iter()), config)?;
    pb.finish_and_clear();

    Ok(summary.get_report(args.header))
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let written = match &args.output {
        Some(path) => fs::write(path, report),
        None => {
            print!("{}", report);
            Ok(())
        }
    };
    if let Err(e) = written {
        eprintln!("Error: could not write report: {}", e);
        process::exit(1);
    }
}
