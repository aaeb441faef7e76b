// src/lib.rs
pub mod aggregation_tree;
pub mod config;
pub mod errors;
pub mod genome_stats;
pub mod taxdb;
pub mod tree_report;
pub mod types;

use crate::aggregation_tree::{AggregationTree, UpdateSummary};
use crate::config::TreeConfig;
use crate::errors::Result;
use crate::taxdb::TaxonTable;
use crate::tree_report::{format_row, report_header, report_rows};
use crate::types::{GenomeRecord, TaxonReportRow};

/// Outcome of one aggregation run. Text is generated on demand from the rows.
pub struct LeaderlessSummary {
    pub tree: AggregationTree,
    /// Report rows in print order (depth-first, children by total-of-type).
    pub report_rows: Vec<TaxonReportRow>,
    pub update_summary: UpdateSummary,
}

impl LeaderlessSummary {
    pub fn report_lines(&self) -> Vec<String> {
        let options = &self.tree.config().render;
        self.report_rows.iter().map(|row| format_row(row, options)).collect()
    }

    /// Report as one string, one line per row, optionally with a header line.
    pub fn get_report(&self, with_header: bool) -> String {
        let mut output = String::new();
        if with_header && !self.report_rows.is_empty() {
            output.push_str(&report_header(self.tree.config()));
            output.push('\n');
        }
        for line in self.report_lines() {
            output.push_str(&line);
            output.push('\n');
        }
        output
    }
}

/// Builds the taxonomy tree, aggregates every genome onto it and renders it.
///
/// Taxonomy problems abort the run; genomes with malformed statistics are
/// skipped (see [`AggregationTree::update_all`]).
pub fn summarize<'a, I>(taxonomy: TaxonTable, genomes: I, config: TreeConfig) -> Result<LeaderlessSummary>
where
    I: IntoIterator<Item = &'a GenomeRecord>,
{
    let mut tree = AggregationTree::new(taxonomy, config)?;
    let update_summary = tree.update_all(genomes)?;
    let report_rows = report_rows(&tree);

    Ok(LeaderlessSummary {
        tree,
        report_rows,
        update_summary,
    })
}
