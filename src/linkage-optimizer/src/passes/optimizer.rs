//! The optimizer driver.
//!
//! Runs the passes as a fixed state machine. Only the merge/rollup cycle
//! repeats, until the tree's node count stops changing or the iteration
//! limit is reached.

use common_config::{FieldConventions, LinkageConfig};
use common_error::LinkageResult;
use linkage_ast::{ParentheticalRollup, QueryTree, TreeNormalizer, UsedIndexes};
use linkage_metadata::IndexMetadata;
use log::debug;

use super::pass::{OptimizationPass, OptimizedQuery, PassContext, PassOutcome, PassTrace};
use super::{
    AggregateLinks, ExpansionInjection, ExpansionMerge, FieldLinkResolution, IndirectLinkRewrite,
};

/// Configuration for the optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of merge/rollup iterations before stopping.
    pub max_iterations: usize,
    /// Whether to enable detailed tracing.
    pub enable_trace: bool,
    /// Reserved field and index names.
    pub conventions: FieldConventions,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            enable_trace: false,
            conventions: FieldConventions::default(),
        }
    }
}

impl OptimizerConfig {
    /// Create a new config with the given max iterations.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Enable or disable tracing.
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }

    /// Use the given field conventions.
    pub fn with_conventions(mut self, conventions: FieldConventions) -> Self {
        self.conventions = conventions;
        self
    }
}

impl From<&LinkageConfig> for OptimizerConfig {
    fn from(config: &LinkageConfig) -> Self {
        Self {
            max_iterations: config.optimizer.max_rollup_iterations,
            enable_trace: config.optimizer.enable_trace,
            conventions: config.conventions.clone(),
        }
    }
}

/// Stages of one optimizer run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizerState {
    /// Assign links to fields.
    ResolveFields,
    /// Roll up groups, then wrap foreign subtrees in expansions.
    InjectExpansions,
    /// Merge and roll up until the node count is stable.
    MergeRollup,
    /// Defer sentinel-named hops.
    RewriteIndirectLinks,
    /// Record aggregate links.
    CollectAggregateLinks,
    /// Publish the used links.
    Done,
}

impl OptimizerState {
    /// The state that follows this one.
    pub const fn next(self) -> Self {
        match self {
            Self::ResolveFields => Self::InjectExpansions,
            Self::InjectExpansions => Self::MergeRollup,
            Self::MergeRollup => Self::RewriteIndirectLinks,
            Self::RewriteIndirectLinks => Self::CollectAggregateLinks,
            Self::CollectAggregateLinks | Self::Done => Self::Done,
        }
    }
}

/// The optimizer for linked-index query trees.
///
/// One optimizer may serve many runs, including concurrent ones on
/// different trees; each run keeps its own used-link set.
pub struct Optimizer {
    /// Configuration.
    config: OptimizerConfig,
    /// Grouping normalizer run before injection and after every merge round.
    normalizer: Box<dyn TreeNormalizer>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::with_config(OptimizerConfig::default())
    }
}

impl Optimizer {
    /// Create a new optimizer with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new optimizer with custom config.
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self {
            config,
            normalizer: Box::new(ParentheticalRollup),
        }
    }

    /// Replace the grouping normalizer.
    pub fn with_normalizer<N: TreeNormalizer + 'static>(mut self, normalizer: N) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize a query tree in place.
    ///
    /// On success the links the run touched are handed to
    /// [`IndexMetadata::record_used_indexes`] and returned. Any error
    /// aborts the run; the tree is then left partially rewritten.
    pub fn optimize(
        &self,
        tree: &mut QueryTree,
        metadata: &mut dyn IndexMetadata,
    ) -> LinkageResult<OptimizedQuery> {
        let mut used = UsedIndexes::new();
        let mut result = OptimizedQuery::default();

        {
            let mut ctx = PassContext::new(&*metadata, &self.config.conventions, &mut used);
            let mut state = OptimizerState::ResolveFields;
            while state != OptimizerState::Done {
                debug!("Optimizer entering {state:?}");
                match state {
                    OptimizerState::ResolveFields => {
                        self.run_pass(&FieldLinkResolution, tree, &mut ctx, &mut result)?;
                    }
                    OptimizerState::InjectExpansions => {
                        self.run_pass(&self.rollup(), tree, &mut ctx, &mut result)?;
                        self.run_pass(&ExpansionInjection, tree, &mut ctx, &mut result)?;
                    }
                    OptimizerState::MergeRollup => {
                        self.merge_until_stable(tree, &mut ctx, &mut result)?;
                    }
                    OptimizerState::RewriteIndirectLinks => {
                        self.run_pass(&IndirectLinkRewrite, tree, &mut ctx, &mut result)?;
                    }
                    OptimizerState::CollectAggregateLinks => {
                        self.run_pass(&AggregateLinks, tree, &mut ctx, &mut result)?;
                    }
                    OptimizerState::Done => {}
                }
                state = state.next();
            }
        }

        debug!(
            "Optimizer done: {} links used, {} merges in {} iterations",
            used.len(),
            result.merges,
            result.outer_iterations
        );
        metadata.record_used_indexes(&used);
        result.used_indexes = used;
        Ok(result)
    }

    /// Merge until a pass finds nothing, roll up, and repeat while the
    /// node count keeps changing.
    fn merge_until_stable(
        &self,
        tree: &mut QueryTree,
        ctx: &mut PassContext<'_>,
        result: &mut OptimizedQuery,
    ) -> LinkageResult<()> {
        loop {
            if result.outer_iterations >= self.config.max_iterations {
                debug!(
                    "Optimizer reached max iterations ({}), stopping",
                    self.config.max_iterations
                );
                return Ok(());
            }
            result.outer_iterations += 1;

            let before = tree.count_nodes();
            loop {
                let merged = self.run_pass(&ExpansionMerge, tree, ctx, result)?.events;
                if merged == 0 {
                    break;
                }
                result.merges += merged;
            }
            self.run_pass(&self.rollup(), tree, ctx, result)?;

            let after = tree.count_nodes();
            if after == before {
                debug!(
                    "Node count stable at {after} in iteration {}, reached fixpoint",
                    result.outer_iterations
                );
                return Ok(());
            }
        }
    }

    fn rollup(&self) -> Rollup<'_> {
        Rollup(self.normalizer.as_ref())
    }

    fn run_pass(
        &self,
        pass: &dyn OptimizationPass,
        tree: &mut QueryTree,
        ctx: &mut PassContext<'_>,
        result: &mut OptimizedQuery,
    ) -> LinkageResult<PassOutcome> {
        let before = if self.config.enable_trace {
            Some(tree.explain())
        } else {
            None
        };

        let outcome = pass.apply(tree, ctx)?;

        if outcome.changed {
            result.passes_applied += 1;
            debug!("Pass '{}' applied ({} events)", pass.name(), outcome.events);

            if self.config.enable_trace {
                result.trace.push(PassTrace::new(
                    pass.name(),
                    before.unwrap_or_default(),
                    tree.explain(),
                    true,
                ));
            }
        }

        Ok(outcome)
    }
}

/// Runs the configured normalizer as a pass.
struct Rollup<'a>(&'a dyn TreeNormalizer);

impl OptimizationPass for Rollup<'_> {
    fn name(&self) -> &'static str {
        "ParentheticalRollup"
    }

    fn description(&self) -> &'static str {
        "Remove redundant grouping nodes"
    }

    fn apply(&self, tree: &mut QueryTree, _ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome> {
        let removed = self.0.rollup_parenthetical_groups(tree)?;
        Ok(PassOutcome::from_events(removed))
    }
}
