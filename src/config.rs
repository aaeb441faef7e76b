//src/config.rs

use std::fmt;
use std::str::FromStr;

use crate::types::GenomeType;

/// Genome group the tree is summarizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    A,
    /// Second-generation group A models; matches genomes typed `group-a`.
    A2,
    B,
    C,
    D,
    E,
}

impl Group {
    pub fn tag(&self) -> &'static str {
        match self {
            Group::A => "group-a",
            Group::A2 => "group-a2",
            Group::B => "group-b",
            Group::C => "group-c",
            Group::D => "group-d",
            Group::E => "group-e",
        }
    }

    /// Short native genes are kept when counting genes for the A groups.
    pub fn keeps_short_native_genes(&self) -> bool {
        matches!(self, Group::A | Group::A2)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Group {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group-a" | "A" => Ok(Group::A),
            "group-a2" | "A2" => Ok(Group::A2),
            "group-b" | "B" => Ok(Group::B),
            "group-c" | "C" => Ok(Group::C),
            "group-d" | "D" => Ok(Group::D),
            "group-e" | "E" => Ok(Group::E),
            other => Err(format!("unknown genome group `{other}`")),
        }
    }
}

/// Which percentage accumulators each tree node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorSet {
    CountsOnly,
    /// fgio (training, prediction) and leaderless (fgio, all) in prediction.
    Core,
    /// `Core` plus leaderless (fgio, all) in training.
    Extended,
}

/// How the zero-denominator guards on each percentage are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardPolicy {
    /// Each ratio is guarded on its own denominator.
    #[default]
    Denominator,
    /// Reproduce the historical guards, some of which test a different count
    /// than the one divided by. A zero denominator still contributes nothing.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Repeated once per depth level in front of the name.
    pub indent_token: String,
    /// Placed between the indentation and the name below the root.
    pub branch_marker: String,
    /// Name cell is right-padded with spaces to this many characters.
    pub name_width: usize,
    /// Do not descend into children that have no genome of the target type.
    pub prune_untyped: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            indent_token: "    |".to_string(),
            branch_marker: "__ ".to_string(),
            name_width: 120,
            prune_untyped: false,
        }
    }
}

/// Everything the aggregation tree needs to know about the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    pub group: Group,
    pub guard_policy: GuardPolicy,
    pub render: RenderOptions,
}

impl TreeConfig {
    pub fn new(group: Group) -> Self {
        Self {
            group,
            guard_policy: GuardPolicy::default(),
            render: RenderOptions::default(),
        }
    }

    pub fn with_guard_policy(mut self, guard_policy: GuardPolicy) -> Self {
        self.guard_policy = guard_policy;
        self
    }

    pub fn with_render_options(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }

    /// Genome type a genome must carry to count towards `total-of-type`.
    pub fn target_type(&self) -> GenomeType {
        match self.group {
            Group::A | Group::A2 => GenomeType::A,
            Group::B => GenomeType::B,
            Group::C => GenomeType::C,
            Group::D => GenomeType::D,
            Group::E => GenomeType::E,
        }
    }

    pub fn matches(&self, genome_type: &GenomeType) -> bool {
        *genome_type == self.target_type()
    }

    pub fn accumulators(&self) -> AccumulatorSet {
        match self.group {
            Group::A | Group::A2 => AccumulatorSet::Core,
            Group::B => AccumulatorSet::Extended,
            Group::C | Group::D | Group::E => AccumulatorSet::CountsOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a2_behaves_like_a() {
        let config = TreeConfig::new(Group::A2);
        assert_eq!(config.target_type(), GenomeType::A);
        assert_eq!(config.accumulators(), AccumulatorSet::Core);
        assert!(config.matches(&GenomeType::from_label("group-a")));
        assert!(!config.matches(&GenomeType::B));
    }

    #[test]
    fn accumulator_sets_per_group() {
        assert_eq!(TreeConfig::new(Group::B).accumulators(), AccumulatorSet::Extended);
        assert_eq!(TreeConfig::new(Group::D).accumulators(), AccumulatorSet::CountsOnly);
    }

    #[test]
    fn group_parses_cli_tags() {
        assert_eq!("group-a2".parse::<Group>().unwrap(), Group::A2);
        assert_eq!("B".parse::<Group>().unwrap(), Group::B);
        assert!("group-z".parse::<Group>().is_err());
    }
}
