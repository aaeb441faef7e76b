//src/types.rs

use std::fmt;

use ahash::AHashMap;

use crate::errors::{Result, TaxTreeError};

/// One entry of the taxonomy table, keyed by its taxid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonRecord {
    pub parent: String,
    pub name: String,
    pub rank: String,
}

impl TaxonRecord {
    pub fn new(parent: &str, name: &str) -> Self {
        Self {
            parent: parent.to_string(),
            name: name.to_string(),
            rank: String::new(),
        }
    }
}

/// Genome classification assigned upstream by the gene-prediction model.
///
/// Older model files use descriptive labels (`archaea-promoter`, `pure-rbs`, ...);
/// both spellings map onto the same variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenomeType {
    A,
    B,
    C,
    D,
    E,
    Other(String),
}

impl GenomeType {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "A" | "group-a" | "archaea-promoter" | "archaea-promoter-2" => GenomeType::A,
            "B" | "group-b" | "bacteria-promoter" => GenomeType::B,
            "C" | "group-c" | "class-c" => GenomeType::C,
            "D" | "group-d" | "pure-rbs" => GenomeType::D,
            "E" | "group-e" | "upstream-signature" => GenomeType::E,
            other => GenomeType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            GenomeType::A => "group-a",
            GenomeType::B => "group-b",
            GenomeType::C => "group-c",
            GenomeType::D => "group-d",
            GenomeType::E => "group-e",
            GenomeType::Other(label) => label,
        }
    }
}

impl fmt::Display for GenomeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named per-genome statistics produced by the extraction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatField {
    TotalGenesInTraining,
    FgioInTraining,
    LeaderlessInFgioInTraining,
    LeaderlessInAllInTraining,
    TotalGenesInPrediction,
    FgioInPrediction,
    LeaderlessInFgioInPrediction,
    LeaderlessInAllInPrediction,
}

impl StatField {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatField::TotalGenesInTraining => "total-genes-in-training",
            StatField::FgioInTraining => "fgio-in-training",
            StatField::LeaderlessInFgioInTraining => "total-leaderless-genes-in-fgio-in-training",
            StatField::LeaderlessInAllInTraining => "total-leaderless-genes-in-all-genes-in-training",
            StatField::TotalGenesInPrediction => "total-genes-in-prediction",
            StatField::FgioInPrediction => "fgio-in-prediction",
            StatField::LeaderlessInFgioInPrediction => "total-leaderless-genes-in-fgio-in-prediction",
            StatField::LeaderlessInAllInPrediction => "total-leaderless-genes-in-all-genes-in-prediction",
        }
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statistic is either a count we computed ourselves or a raw token scraped
/// from a model file, which is only interpreted when the genome is aggregated.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Count(u64),
    Raw(String),
}

/// A genome and whatever statistics the extraction step managed to collect.
#[derive(Debug, Clone, Default)]
pub struct GenomeRecord {
    pub accession: String,
    pub genetic_code: String,
    pub taxid: String,
    pub genome_type: Option<GenomeType>,
    pub stats: AHashMap<StatField, StatValue>,
    pub consensus_rbs: Option<String>,
    pub consensus_promoter: Option<String>,
}

impl GenomeRecord {
    pub fn new(accession: &str, taxid: &str) -> Self {
        Self {
            accession: accession.to_string(),
            taxid: taxid.to_string(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, genome_type: GenomeType) -> Self {
        self.genome_type = Some(genome_type);
        self
    }

    pub fn with_count(mut self, field: StatField, count: u64) -> Self {
        self.stats.insert(field, StatValue::Count(count));
        self
    }

    pub fn set_count(&mut self, field: StatField, count: u64) {
        self.stats.insert(field, StatValue::Count(count));
    }

    pub fn set_raw(&mut self, field: StatField, raw: &str) {
        self.stats.insert(field, StatValue::Raw(raw.to_string()));
    }

    /// Numeric value of `field`, `None` when the field was never populated.
    pub fn stat(&self, field: StatField) -> Result<Option<f64>> {
        match self.stats.get(&field) {
            None => Ok(None),
            Some(StatValue::Count(n)) => Ok(Some(*n as f64)),
            Some(StatValue::Raw(raw)) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(TaxTreeError::MalformedStatistic {
                    genome: self.accession.clone(),
                    field: field.as_str().to_string(),
                    value: raw.clone(),
                }),
            },
        }
    }
}

/// Mean per-genome percentages at one node (sum of percentages / total-of-type).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PercentMeans {
    pub fgio_in_training: f64,
    pub fgio_in_prediction: f64,
    pub leaderless_in_fgio_in_prediction: f64,
    pub leaderless_in_all_in_prediction: f64,
    /// Only tracked by the extended (group B) accumulator set.
    pub leaderless_in_fgio_in_training: Option<f64>,
    pub leaderless_in_all_in_training: Option<f64>,
}

/// A structured representation of one row in the taxonomy report.
#[derive(Debug, Clone)]
pub struct TaxonReportRow {
    pub tax_id: String,
    pub tax_name: String,
    pub depth: usize,
    pub total: u64,
    pub total_of_type: u64,
    pub pct_of_type: f64,
    pub means: Option<PercentMeans>,
    pub consensus_rbs: Option<String>,
    pub consensus_promoter: Option<String>,
}
