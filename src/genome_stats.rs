// src/genome_stats.rs

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Group, TreeConfig};
use crate::errors::{Result, TaxTreeError};
use crate::taxdb::open_text;
use crate::types::{GenomeRecord, GenomeType, StatField};

/// Model file written by the gene finder in each run directory.
pub const MODEL_FILE: &str = "GMS2.mod";
/// Final gene prediction in each run directory.
pub const PREDICTION_FILE: &str = "gms2.lst";

/// Genes shorter than this are ignored unless the group keeps short native genes.
const MIN_GENE_LENGTH: u64 = 300;
/// Largest gap (nt) between two same-strand genes that still share an operon.
const MAX_OPERON_GAP: i64 = 25;

static GENE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\d+\s+([+-])\s+(\d+)\s+(\d+)\s+(\d+)\s+(atypical|native)").expect("valid gene line pattern")
});
static START_MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"native\s+[ACGT]+\s+\d+\s+(\d+)").expect("valid start model pattern"));

/// Reads a genome list with `<accession> <genetic code> <taxid>` per line.
pub fn read_genome_list<P: AsRef<Path>>(filepath: P) -> Result<Vec<GenomeRecord>> {
    let path = filepath.as_ref();
    let reader = open_text(path)?;
    let mut genomes = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }
        if parts.len() < 3 {
            return Err(TaxTreeError::InvalidRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: "expected `accession gcode taxid`".to_string(),
            });
        }

        let mut genome = GenomeRecord::new(parts[0], parts[2]);
        genome.genetic_code = parts[1].to_string();
        genomes.push(genome);
    }

    log::info!("Read {} genomes from {}", genomes.len(), path.display());
    Ok(genomes)
}

/// Where per-genome run directories live and how to read them.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub data_dir: PathBuf,
    /// Run directory name under `<data_dir>/<accession>/runs/`.
    pub run_dir: String,
    /// Take the genome type from a yes/no class file instead of the model file.
    pub type_from_class_file: bool,
    pub class_file: String,
}

impl ExtractOptions {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            run_dir: "gms2".to_string(),
            type_from_class_file: false,
            class_file: "class".to_string(),
        }
    }

    pub fn run_path(&self, accession: &str) -> PathBuf {
        self.data_dir.join(accession).join("runs").join(&self.run_dir)
    }
}

/// Values scraped from a model file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSummary {
    pub genome_type: Option<String>,
    pub num_leaderless: Option<String>,
    pub num_fgio: Option<String>,
    pub consensus_rbs: Option<String>,
    pub consensus_promoter: Option<String>,
}

/// Most probable letter per column of an A/C/G/T position matrix. Each row
/// starts with its letter label. Ties go to the later letter.
pub fn consensus_from_matrix(rows: &[Vec<&str>; 4], field: &str, genome: &str) -> Result<String> {
    const LETTERS: [char; 4] = ['A', 'C', 'G', 'T'];

    let width = rows[0].len();
    if rows.iter().any(|r| r.len() < width) {
        return Err(TaxTreeError::MalformedStatistic {
            genome: genome.to_string(),
            field: field.to_string(),
            value: "ragged position matrix".to_string(),
        });
    }

    let parse = |raw: &str| {
        raw.parse::<f64>().map_err(|_| TaxTreeError::MalformedStatistic {
            genome: genome.to_string(),
            field: field.to_string(),
            value: raw.to_string(),
        })
    };

    let mut consensus = String::with_capacity(width.saturating_sub(1));
    for col in 1..width {
        let mut best = parse(rows[0][col])?;
        let mut letter = LETTERS[0];
        for (row, &candidate) in rows.iter().zip(LETTERS.iter()).skip(1) {
            let value = parse(row[col])?;
            if best <= value {
                best = value;
                letter = candidate;
            }
        }
        consensus.push(letter);
    }
    Ok(consensus)
}

/// Scans a model file for the genome type, training counts and the RBS and
/// promoter position matrices.
pub fn parse_model_file<P: AsRef<Path>>(filepath: P, genome: &str) -> Result<ModelSummary> {
    let reader = open_text(filepath.as_ref())?;
    let lines: Vec<String> = reader.lines().collect::<std::io::Result<_>>()?;
    let mut summary = ModelSummary::default();

    let second_token = |line: &str| line.split_whitespace().nth(1).map(str::to_string);

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        i += 1;

        let matrix_field = if line.contains("$RBS_MAT") {
            Some("consensus-rbs")
        } else if line.contains("$PROMOTER_MAT") {
            Some("consensus-promoter")
        } else {
            None
        };

        if let Some(field) = matrix_field {
            if i + 4 > lines.len() {
                return Err(TaxTreeError::MalformedStatistic {
                    genome: genome.to_string(),
                    field: field.to_string(),
                    value: "truncated position matrix".to_string(),
                });
            }
            let rows: [Vec<&str>; 4] = std::array::from_fn(|k| lines[i + k].split_whitespace().collect());
            let consensus = consensus_from_matrix(&rows, field, genome)?;
            i += 4;

            if field == "consensus-rbs" {
                summary.consensus_rbs = Some(consensus);
            } else {
                summary.consensus_promoter = Some(consensus);
            }
        } else if line.contains("GENOME_TYPE") {
            summary.genome_type = second_token(line);
        } else if line.contains("NUM_LEADERLESS") {
            summary.num_leaderless = second_token(line);
        } else if line.contains("NUM_FGIO") {
            summary.num_fgio = second_token(line);
        }
    }

    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictedGene {
    pub strand: Strand,
    pub left: u64,
    pub right: u64,
    pub length: u64,
    pub native: bool,
    /// Only native genes report a start model type; `2` marks a leaderless start.
    pub start_model_type: Option<String>,
}

impl PredictedGene {
    pub fn is_leaderless(&self) -> bool {
        self.start_model_type.as_deref() == Some("2")
    }
}

/// Reads the genes of a prediction listing, dropping short genes except
/// native ones for groups that keep them.
pub fn parse_gene_list<P: AsRef<Path>>(filepath: P, group: Group) -> Result<Vec<PredictedGene>> {
    let path = filepath.as_ref();
    let reader = open_text(path)?;
    let mut genes = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let caps = match GENE_LINE.captures(&line) {
            Some(c) => c,
            None => continue,
        };

        let number = |k: usize| {
            caps[k].parse::<u64>().map_err(|_| TaxTreeError::InvalidRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                reason: format!("coordinate out of range: {}", &caps[k]),
            })
        };

        let gene = PredictedGene {
            strand: if &caps[1] == "+" { Strand::Forward } else { Strand::Reverse },
            left: number(2)?,
            right: number(3)?,
            length: number(4)?,
            native: &caps[5] == "native",
            start_model_type: START_MODEL.captures(&line).map(|c| c[1].to_string()),
        };

        if gene.length > MIN_GENE_LENGTH || (group.keeps_short_native_genes() && gene.native) {
            genes.push(gene);
        }
    }
    Ok(genes)
}

/// Gene, FGIO and leaderless counts over one prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionSummary {
    pub total_genes: u64,
    pub fgio: u64,
    pub leaderless_in_fgio: u64,
    pub leaderless_in_all: u64,
}

/// Whether gene `n` opens its operon: nothing upstream of it on the same
/// strand within [`MAX_OPERON_GAP`] nucleotides.
pub fn is_first_in_operon(genes: &[PredictedGene], n: usize) -> bool {
    let gene = &genes[n];
    match gene.strand {
        Strand::Forward => {
            if n == 0 {
                return true;
            }
            let prev = &genes[n - 1];
            prev.strand == Strand::Reverse || gene.left as i64 - prev.right as i64 > MAX_OPERON_GAP
        }
        Strand::Reverse => {
            if n + 1 == genes.len() {
                return true;
            }
            let next = &genes[n + 1];
            next.strand == Strand::Forward || next.left as i64 - gene.right as i64 > MAX_OPERON_GAP
        }
    }
}

pub fn summarize_prediction(genes: &[PredictedGene]) -> PredictionSummary {
    let mut summary = PredictionSummary {
        total_genes: genes.len() as u64,
        ..Default::default()
    };

    for (n, gene) in genes.iter().enumerate() {
        let leaderless = gene.is_leaderless();
        if is_first_in_operon(genes, n) {
            summary.fgio += 1;
            if leaderless {
                summary.leaderless_in_fgio += 1;
            }
        }
        if leaderless {
            summary.leaderless_in_all += 1;
        }
    }
    summary
}

/// The training listing used for gene counts: the next-to-last `itr_<n>.lst`
/// by iteration number (the last one when only one exists).
pub fn training_listing(run_path: &Path) -> Result<Option<PathBuf>> {
    if !run_path.is_dir() {
        return Ok(None);
    }

    let mut iterations: Vec<(u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(run_path)? {
        let path = entry?.path();
        let iteration = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("itr_"))
            .and_then(|n| n.strip_suffix(".lst"))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(it) = iteration {
            iterations.push((it, path));
        }
    }

    iterations.sort_by_key(|(it, _)| *it);
    let pick = match iterations.len() {
        0 => None,
        1 => iterations.pop(),
        n => iterations.into_iter().nth(n - 2),
    };
    Ok(pick.map(|(_, path)| path))
}

fn read_class_file(path: &Path) -> Result<Option<GenomeType>> {
    let reader = open_text(path)?;
    let answer = reader.lines().next().transpose()?.unwrap_or_default();
    Ok(match answer.trim() {
        "yes" => Some(GenomeType::B),
        "no" => Some(GenomeType::Other("other".to_string())),
        _ => None,
    })
}

/// Fills in genome type, training and prediction statistics and consensus
/// sequences for one genome from its run directory.
pub fn extract_genome_stats(genome: &mut GenomeRecord, options: &ExtractOptions, config: &TreeConfig) -> Result<()> {
    let run_path = options.run_path(&genome.accession);
    let group = config.group;

    let model_path = run_path.join(MODEL_FILE);
    let model = if model_path.is_file() {
        parse_model_file(&model_path, &genome.accession)?
    } else {
        log::debug!("{}: no model file at {}", genome.accession, model_path.display());
        ModelSummary::default()
    };

    genome.genome_type = model.genome_type.as_deref().map(GenomeType::from_label);
    if options.type_from_class_file {
        let class_type = read_class_file(&run_path.join(&options.class_file))?;
        if class_type.is_some() {
            genome.genome_type = class_type;
        }
    }

    let leaderless = model.num_leaderless.as_deref().unwrap_or("0");
    genome.set_raw(StatField::LeaderlessInFgioInTraining, leaderless);
    genome.set_raw(StatField::LeaderlessInAllInTraining, leaderless);
    genome.set_raw(StatField::FgioInTraining, model.num_fgio.as_deref().unwrap_or("0"));

    let typed = genome.genome_type.as_ref().is_some_and(|t| config.matches(t));
    if typed {
        genome.consensus_rbs = model.consensus_rbs;
        if matches!(group, Group::A | Group::A2 | Group::B) {
            genome.consensus_promoter = model.consensus_promoter;
        }
    }

    match training_listing(&run_path)? {
        Some(listing) => {
            let genes = parse_gene_list(&listing, group)?;
            genome.set_count(StatField::TotalGenesInTraining, genes.len() as u64);
        }
        None => log::debug!("{}: no training listing in {}", genome.accession, run_path.display()),
    }

    let prediction_path = run_path.join(PREDICTION_FILE);
    let prediction = if prediction_path.is_file() {
        summarize_prediction(&parse_gene_list(&prediction_path, group)?)
    } else {
        PredictionSummary::default()
    };
    genome.set_count(StatField::TotalGenesInPrediction, prediction.total_genes);
    genome.set_count(StatField::FgioInPrediction, prediction.fgio);
    genome.set_count(StatField::LeaderlessInFgioInPrediction, prediction.leaderless_in_fgio);
    genome.set_count(StatField::LeaderlessInAllInPrediction, prediction.leaderless_in_all);

    Ok(())
}
