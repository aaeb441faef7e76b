// src/tree_report.rs

use std::cmp::Reverse;
use std::fmt::Write as _;

use crate::aggregation_tree::{AggregationTree, TreeNode};
use crate::config::{AccumulatorSet, RenderOptions, TreeConfig};
use crate::types::TaxonReportRow;

/// Children in report order: most genomes of the target type first, then
/// most genomes overall, then by taxid so the order is stable across runs.
pub fn sorted_children(node: &TreeNode) -> Vec<&TreeNode> {
    let mut kids: Vec<&TreeNode> = node.children.values().collect();
    kids.sort_by(|a, b| {
        (Reverse(a.total_of_type), Reverse(a.total), &a.tax_id)
            .cmp(&(Reverse(b.total_of_type), Reverse(b.total), &b.tax_id))
    });
    kids
}

/// Depth-first, pre-order rows for every node that saw at least one genome.
pub fn report_rows(tree: &AggregationTree) -> Vec<TaxonReportRow> {
    let mut rows = Vec::new();
    collect_rows(tree.root(), 0, &tree.config().render, &mut rows);
    rows
}

fn collect_rows(node: &TreeNode, depth: usize, options: &RenderOptions, rows: &mut Vec<TaxonReportRow>) {
    if node.total == 0 {
        return;
    }

    let pct_of_type = 100.0 * node.total_of_type as f64 / node.total as f64;
    rows.push(TaxonReportRow {
        tax_id: node.tax_id.clone(),
        tax_name: node.name.clone(),
        depth,
        total: node.total,
        total_of_type: node.total_of_type,
        pct_of_type,
        means: node.sums.means(node.total_of_type),
        consensus_rbs: node.consensus_rbs.clone(),
        consensus_promoter: node.consensus_promoter.clone(),
    });

    for child in sorted_children(node) {
        if options.prune_untyped && child.total_of_type == 0 {
            continue;
        }
        collect_rows(child, depth + 1, options, rows);
    }
}

/// Formats one row as a report line (without trailing newline).
pub fn format_row(row: &TaxonReportRow, options: &RenderOptions) -> String {
    let mut line = options.indent_token.repeat(row.depth);
    if row.depth > 0 {
        line.push_str(&options.branch_marker);
    }
    line.push_str(&row.tax_name);

    let used = line.chars().count();
    if used < options.name_width {
        line.push_str(&" ".repeat(options.name_width - used));
    }

    let _ = write!(line, "{}\t{}\t{:.1}", row.total, row.total_of_type, row.pct_of_type);

    if let Some(means) = &row.means {
        let _ = write!(
            line,
            "\t{:.1}\t{:.1}\t{:.1}",
            means.fgio_in_prediction, means.leaderless_in_fgio_in_prediction, means.leaderless_in_all_in_prediction
        );
    }

    if let Some(rbs) = &row.consensus_rbs {
        line.push('\t');
        line.push_str(rbs);
    }
    if let Some(promoter) = &row.consensus_promoter {
        line.push('\t');
        line.push_str(promoter);
    }
    line
}

/// Renders the whole tree. An empty tree (no genomes) yields no lines.
pub fn render(tree: &AggregationTree) -> Vec<String> {
    let options = &tree.config().render;
    report_rows(tree)
        .iter()
        .map(|row| format_row(row, options))
        .collect()
}

/// Column names matching [`render`]'s output for this configuration.
pub fn report_header(config: &TreeConfig) -> String {
    let mut header = format!("{:<width$}total\tof-type\t%of-type", "taxName", width = config.render.name_width);
    if config.accumulators() != AccumulatorSet::CountsOnly {
        header.push_str("\t%fgio\t%leaderless-in-fgio\t%leaderless-in-all");
    }
    header.push_str("\tconsensus-rbs\tconsensus-promoter");
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Group;
    use crate::taxdb::table_from;
    use crate::types::{GenomeRecord, GenomeType, StatField};

    fn genome(accession: &str, taxid: &str, genome_type: GenomeType) -> GenomeRecord {
        GenomeRecord::new(accession, taxid)
            .with_type(genome_type)
            .with_count(StatField::TotalGenesInPrediction, 10)
            .with_count(StatField::FgioInPrediction, 5)
            .with_count(StatField::LeaderlessInFgioInPrediction, 2)
            .with_count(StatField::LeaderlessInAllInPrediction, 2)
    }

    fn narrow(group: Group) -> TreeConfig {
        TreeConfig::new(group).with_render_options(RenderOptions {
            name_width: 0,
            ..RenderOptions::default()
        })
    }

    #[test]
    fn empty_tree_renders_nothing() {
        let table = table_from(&[("1", "1", "root"), ("2", "1", "a")]);
        let tree = AggregationTree::new(table, TreeConfig::new(Group::A)).unwrap();
        assert!(render(&tree).is_empty());
    }

    #[test]
    fn single_lineage_report() {
        let table = table_from(&[("1", "1", "root"), ("2", "1", "A"), ("3", "2", "B"), ("4", "1", "unused")]);
        let mut tree = AggregationTree::new(table, narrow(Group::A)).unwrap();
        let mut g = genome("g1", "3", GenomeType::A);
        g.consensus_rbs = Some("AGGAGG".to_string());
        tree.update_tree(&g).unwrap();

        let lines = render(&tree);
        assert_eq!(
            lines,
            vec![
                "root1\t1\t100.0\t50.0\t40.0\t20.0".to_string(),
                "    |__ A1\t1\t100.0\t50.0\t40.0\t20.0".to_string(),
                "    |    |__ B1\t1\t100.0\t50.0\t40.0\t20.0\tAGGAGG".to_string(),
            ]
        );
    }

    #[test]
    fn names_are_padded_to_width() {
        let table = table_from(&[("1", "1", "root"), ("2", "1", "leaf")]);
        let config = TreeConfig::new(Group::C).with_render_options(RenderOptions {
            name_width: 20,
            ..RenderOptions::default()
        });
        let mut tree = AggregationTree::new(table, config).unwrap();
        tree.update_tree(&GenomeRecord::new("g", "2").with_type(GenomeType::D))
            .unwrap();

        let lines = render(&tree);
        assert_eq!(lines[0], format!("{:<20}1\t0\t0.0", "root"));
        assert_eq!(lines[1], format!("{:<20}1\t0\t0.0", "    |__ leaf"));
    }

    #[test]
    fn children_sorted_by_total_of_type_with_stable_ties() {
        let table = table_from(&[("1", "1", "root"), ("10", "1", "x"), ("11", "1", "y"), ("12", "1", "z")]);
        let mut tree = AggregationTree::new(table, narrow(Group::A)).unwrap();
        let mut n = 0;
        for (taxid, typed, other) in [("10", 5, 0), ("11", 1, 0), ("12", 5, 2)] {
            for _ in 0..typed {
                n += 1;
                tree.update_tree(&genome(&format!("g{n}"), taxid, GenomeType::A)).unwrap();
            }
            for _ in 0..other {
                n += 1;
                tree.update_tree(&genome(&format!("g{n}"), taxid, GenomeType::B)).unwrap();
            }
        }

        let rows = report_rows(&tree);
        let order: Vec<&str> = rows.iter().skip(1).map(|r| r.tax_id.as_str()).collect();
        // 12 ties with 10 on total-of-type but has more genomes overall
        assert_eq!(order, vec!["12", "10", "11"]);
        assert!(rows.iter().skip(1).all(|r| r.depth == 1));
    }

    #[test]
    fn exact_ties_fall_back_to_taxid() {
        let table = table_from(&[("1", "1", "root"), ("7", "1", "b"), ("5", "1", "a")]);
        let mut tree = AggregationTree::new(table, narrow(Group::A)).unwrap();
        tree.update_tree(&genome("g1", "7", GenomeType::A)).unwrap();
        tree.update_tree(&genome("g2", "5", GenomeType::A)).unwrap();

        let ids: Vec<String> = report_rows(&tree).into_iter().map(|r| r.tax_id).collect();
        assert_eq!(ids, vec!["1", "5", "7"]);
    }

    #[test]
    fn prune_untyped_hides_children_without_target_genomes() {
        let table = table_from(&[("1", "1", "root"), ("2", "1", "typed"), ("3", "1", "untyped")]);
        let mut tree = AggregationTree::new(table.clone(), narrow(Group::A)).unwrap();
        tree.update_tree(&genome("g1", "2", GenomeType::A)).unwrap();
        tree.update_tree(&genome("g2", "3", GenomeType::B)).unwrap();
        assert_eq!(render(&tree).len(), 3);

        let config = TreeConfig::new(Group::A).with_render_options(RenderOptions {
            prune_untyped: true,
            name_width: 0,
            ..RenderOptions::default()
        });
        let mut pruned = AggregationTree::new(table, config).unwrap();
        pruned.update_tree(&genome("g1", "2", GenomeType::A)).unwrap();
        pruned.update_tree(&genome("g2", "3", GenomeType::B)).unwrap();
        let ids: Vec<String> = report_rows(&pruned).into_iter().map(|r| r.tax_id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn means_are_zero_without_typed_genomes() {
        let table = table_from(&[("1", "1", "root")]);
        let mut tree = AggregationTree::new(table, narrow(Group::B)).unwrap();
        tree.update_tree(&genome("g1", "1", GenomeType::A)).unwrap();
        assert_eq!(render(&tree), vec!["root1\t0\t0.0\t0.0\t0.0\t0.0".to_string()]);
    }

    #[test]
    fn rendering_is_repeatable() {
        let table = table_from(&[("1", "1", "root"), ("2", "1", "a"), ("3", "1", "b")]);
        let mut tree = AggregationTree::new(table, TreeConfig::new(Group::A)).unwrap();
        tree.update_tree(&genome("g1", "2", GenomeType::A)).unwrap();
        tree.update_tree(&genome("g2", "3", GenomeType::A)).unwrap();
        assert_eq!(render(&tree), render(&tree));
    }

    #[test]
    fn header_lists_prediction_columns_for_a_and_b() {
        let header = report_header(&narrow(Group::B));
        assert!(header.starts_with("taxNametotal\t"));
        assert!(header.contains("%leaderless-in-all"));
        assert!(!report_header(&narrow(Group::E)).contains("%fgio"));
    }
}
