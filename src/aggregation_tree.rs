//src/aggregation_tree.rs

use std::collections::hash_map::Entry;

use ahash::AHashMap;

use crate::config::{AccumulatorSet, GuardPolicy, TreeConfig};
use crate::errors::{Result, TaxTreeError};
use crate::taxdb::{full_ancestry, TaxonTable, ROOT_TAXID};
use crate::types::{GenomeRecord, PercentMeans, StatField};

/// Running sums shared by groups A and B. Each one is a sum of per-genome
/// percentages, not a ratio of summed counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreSums {
    pub fgio_in_training: f64,
    pub fgio_in_prediction: f64,
    pub leaderless_in_fgio_in_prediction: f64,
    pub leaderless_in_all_in_prediction: f64,
}

/// Extra running sums kept for group B only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSums {
    pub leaderless_in_fgio_in_training: f64,
    pub leaderless_in_all_in_training: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PercentSums {
    CountsOnly,
    Core(CoreSums),
    Extended { core: CoreSums, training: TrainingSums },
}

impl PercentSums {
    pub fn for_set(set: AccumulatorSet) -> Self {
        match set {
            AccumulatorSet::CountsOnly => PercentSums::CountsOnly,
            AccumulatorSet::Core => PercentSums::Core(CoreSums::default()),
            AccumulatorSet::Extended => PercentSums::Extended {
                core: CoreSums::default(),
                training: TrainingSums::default(),
            },
        }
    }

    fn add(&mut self, c: &Contribution) {
        match self {
            PercentSums::CountsOnly => {}
            PercentSums::Core(core) => add_core(core, c),
            PercentSums::Extended { core, training } => {
                add_core(core, c);
                training.leaderless_in_fgio_in_training += c.leaderless_in_fgio_in_training.unwrap_or(0.0);
                training.leaderless_in_all_in_training += c.leaderless_in_all_in_training.unwrap_or(0.0);
            }
        }
    }

    /// Mean percentage per genome of the target type; zero when there are none.
    pub fn means(&self, total_of_type: u64) -> Option<PercentMeans> {
        let mean = |sum: f64| {
            if total_of_type == 0 {
                0.0
            } else {
                sum / total_of_type as f64
            }
        };
        let core_means = |core: &CoreSums| PercentMeans {
            fgio_in_training: mean(core.fgio_in_training),
            fgio_in_prediction: mean(core.fgio_in_prediction),
            leaderless_in_fgio_in_prediction: mean(core.leaderless_in_fgio_in_prediction),
            leaderless_in_all_in_prediction: mean(core.leaderless_in_all_in_prediction),
            leaderless_in_fgio_in_training: None,
            leaderless_in_all_in_training: None,
        };

        match self {
            PercentSums::CountsOnly => None,
            PercentSums::Core(core) => Some(core_means(core)),
            PercentSums::Extended { core, training } => Some(PercentMeans {
                leaderless_in_fgio_in_training: Some(mean(training.leaderless_in_fgio_in_training)),
                leaderless_in_all_in_training: Some(mean(training.leaderless_in_all_in_training)),
                ..core_means(core)
            }),
        }
    }
}

fn add_core(core: &mut CoreSums, c: &Contribution) {
    core.fgio_in_training += c.fgio_in_training.unwrap_or(0.0);
    core.fgio_in_prediction += c.fgio_in_prediction.unwrap_or(0.0);
    core.leaderless_in_fgio_in_prediction += c.leaderless_in_fgio_in_prediction.unwrap_or(0.0);
    core.leaderless_in_all_in_prediction += c.leaderless_in_all_in_prediction.unwrap_or(0.0);
}

/// Percentages one genome adds to every node on its lineage.
/// `None` means the guard failed or an input was missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contribution {
    pub fgio_in_training: Option<f64>,
    pub fgio_in_prediction: Option<f64>,
    pub leaderless_in_fgio_in_prediction: Option<f64>,
    pub leaderless_in_all_in_prediction: Option<f64>,
    pub leaderless_in_fgio_in_training: Option<f64>,
    pub leaderless_in_all_in_training: Option<f64>,
}

fn percent(num: Option<f64>, den: Option<f64>, guard: bool) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if guard && d > 0.0 => Some(100.0 * n / d),
        _ => None,
    }
}

fn positive(v: Option<f64>) -> bool {
    v.is_some_and(|v| v > 0.0)
}

impl Contribution {
    /// Computes every percentage the configured accumulator set needs.
    /// Fails on the first statistic that is present but not numeric.
    pub fn from_genome(genome: &GenomeRecord, config: &TreeConfig) -> Result<Self> {
        let set = config.accumulators();
        if set == AccumulatorSet::CountsOnly {
            return Ok(Self::default());
        }
        let legacy = config.guard_policy == GuardPolicy::Legacy;

        let total_train = genome.stat(StatField::TotalGenesInTraining)?;
        let fgio_train = genome.stat(StatField::FgioInTraining)?;
        let total_pred = genome.stat(StatField::TotalGenesInPrediction)?;
        let fgio_pred = genome.stat(StatField::FgioInPrediction)?;
        let leaderless_fgio_pred = genome.stat(StatField::LeaderlessInFgioInPrediction)?;
        let leaderless_all_pred = genome.stat(StatField::LeaderlessInAllInPrediction)?;

        // Legacy guards test these counts instead of the denominator.
        let guard_fgio_train = !legacy || positive(total_pred);
        let guard_fgio_pred = !legacy || positive(fgio_pred);

        let mut contribution = Self {
            fgio_in_training: percent(fgio_train, total_train, guard_fgio_train),
            fgio_in_prediction: percent(fgio_pred, total_pred, guard_fgio_pred),
            leaderless_in_fgio_in_prediction: percent(leaderless_fgio_pred, fgio_pred, true),
            leaderless_in_all_in_prediction: percent(leaderless_all_pred, total_pred, true),
            ..Self::default()
        };

        if set == AccumulatorSet::Extended {
            let leaderless_fgio_train = genome.stat(StatField::LeaderlessInFgioInTraining)?;
            let leaderless_all_train = genome.stat(StatField::LeaderlessInAllInTraining)?;

            let guard_fgio = !legacy || positive(total_train);
            let guard_all = !legacy || positive(total_pred);

            contribution.leaderless_in_fgio_in_training = percent(leaderless_fgio_train, fgio_train, guard_fgio);
            contribution.leaderless_in_all_in_training = percent(leaderless_all_train, total_train, guard_all);
        }

        Ok(contribution)
    }
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub tax_id: String,
    pub parent_id: String,
    pub name: String,
    pub children: AHashMap<String, TreeNode>,
    /// Genomes whose lineage passes through this node.
    pub total: u64,
    /// Subset of `total` whose genome type matches the configured group.
    pub total_of_type: u64,
    pub sums: PercentSums,
    pub consensus_rbs: Option<String>,
    pub consensus_promoter: Option<String>,
}

impl TreeNode {
    fn new(tax_id: &str, parent_id: &str, name: &str, set: AccumulatorSet) -> Self {
        Self {
            tax_id: tax_id.to_string(),
            parent_id: parent_id.to_string(),
            name: name.to_string(),
            children: AHashMap::new(),
            total: 0,
            total_of_type: 0,
            sums: PercentSums::for_set(set),
            consensus_rbs: None,
            consensus_promoter: None,
        }
    }

    /// Number of nodes in this subtree, self included.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.values().map(TreeNode::subtree_size).sum::<usize>()
    }

    fn update(&mut self, typed: bool, contribution: &Contribution) {
        self.total += 1;
        if typed {
            self.total_of_type += 1;
            self.sums.add(contribution);
        }
    }
}

/// What happened to one genome passed to [`AggregationTree::update_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Counted,
    /// The genome has no genome type and was left out entirely.
    Untyped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub counted: usize,
    pub untyped: usize,
    pub malformed: usize,
}

/// The whole taxonomy as a tree of statistics-bearing nodes.
pub struct AggregationTree {
    config: TreeConfig,
    taxonomy: TaxonTable,
    root: TreeNode,
}

impl AggregationTree {
    /// Builds one node per taxon in `taxonomy`. Every taxon must have a
    /// complete lineage up to [`ROOT_TAXID`].
    pub fn new(taxonomy: TaxonTable, config: TreeConfig) -> Result<Self> {
        let set = config.accumulators();
        let root_record = taxonomy
            .get(ROOT_TAXID)
            .ok_or_else(|| TaxTreeError::MissingTaxon {
                taxid: ROOT_TAXID.to_string(),
            })?;
        let mut root = TreeNode::new(ROOT_TAXID, ROOT_TAXID, &root_record.name, set);

        for taxid in taxonomy.keys() {
            let ancestry = full_ancestry(taxid, &taxonomy)?;

            let mut node = &mut root;
            for pair in ancestry.windows(2) {
                let (parent_id, child_id) = (&pair[0], &pair[1]);
                node = match node.children.entry(child_id.clone()) {
                    Entry::Occupied(e) => e.into_mut(),
                    Entry::Vacant(e) => {
                        let record = taxonomy
                            .get(child_id)
                            .ok_or_else(|| TaxTreeError::MissingTaxon {
                                taxid: child_id.clone(),
                            })?;
                        e.insert(TreeNode::new(child_id, parent_id, &record.name, set))
                    }
                };
            }
        }

        log::info!(
            "Built {} tree with {} nodes",
            config.group,
            root.subtree_size()
        );

        Ok(Self {
            config,
            taxonomy,
            root,
        })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &TaxonTable {
        &self.taxonomy
    }

    pub fn node_count(&self) -> usize {
        self.root.subtree_size()
    }

    /// Looks a node up by following its lineage from the root.
    pub fn node(&self, taxid: &str) -> Option<&TreeNode> {
        let ancestry = full_ancestry(taxid, &self.taxonomy).ok()?;
        let mut node = &self.root;
        for id in ancestry.iter().skip(1) {
            node = node.children.get(id)?;
        }
        Some(node)
    }

    /// Adds one genome to every node on its lineage, root included.
    ///
    /// Lineage errors are returned as is. A malformed statistic is returned
    /// before any node is touched, so the caller can skip the genome.
    pub fn update_tree(&mut self, genome: &GenomeRecord) -> Result<UpdateOutcome> {
        let ancestry = full_ancestry(&genome.taxid, &self.taxonomy)?;

        let genome_type = match &genome.genome_type {
            Some(t) => t,
            None => return Ok(UpdateOutcome::Untyped),
        };

        let typed = self.config.matches(genome_type);
        let contribution = if typed {
            Contribution::from_genome(genome, &self.config)?
        } else {
            Contribution::default()
        };

        let mut node = &mut self.root;
        node.update(typed, &contribution);
        for id in ancestry.iter().skip(1) {
            node = node
                .children
                .get_mut(id)
                .ok_or_else(|| TaxTreeError::MissingTaxon { taxid: id.clone() })?;
            node.update(typed, &contribution);
        }

        // last genome reaching a taxon wins
        if let Some(rbs) = &genome.consensus_rbs {
            node.consensus_rbs = Some(rbs.clone());
        }
        if let Some(promoter) = &genome.consensus_promoter {
            node.consensus_promoter = Some(promoter.clone());
        }

        Ok(UpdateOutcome::Counted)
    }

    /// Feeds every genome through [`update_tree`](Self::update_tree).
    ///
    /// Genomes with malformed statistics are logged and skipped; any other
    /// error aborts the pass.
    pub fn update_all<'a, I>(&mut self, genomes: I) -> Result<UpdateSummary>
    where
        I: IntoIterator<Item = &'a GenomeRecord>,
    {
        let mut summary = UpdateSummary::default();
        for genome in genomes {
            match self.update_tree(genome) {
                Ok(UpdateOutcome::Counted) => summary.counted += 1,
                Ok(UpdateOutcome::Untyped) => {
                    log::debug!("Skipping {}: no genome type", genome.accession);
                    summary.untyped += 1;
                }
                Err(e @ TaxTreeError::MalformedStatistic { .. }) => {
                    log::warn!("Skipping {}: {}", genome.accession, e);
                    summary.malformed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Aggregated {} genomes ({} untyped, {} malformed skipped)",
            summary.counted,
            summary.untyped,
            summary.malformed
        );
        Ok(summary)
    }
}
