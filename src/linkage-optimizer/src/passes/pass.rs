//! Optimization pass trait and framework.
//!
//! Passes rewrite a [`QueryTree`] in place. Each pass reports whether it
//! changed the tree and how many rewrite events it performed, so the
//! driver can detect its fixed point.

use common_config::FieldConventions;
use common_error::LinkageResult;
use linkage_ast::{IndexLink, LinkRef, QueryTree, UsedIndexes};
use linkage_metadata::IndexMetadata;

/// State shared by every pass of one optimizer run.
pub struct PassContext<'a> {
    /// Metadata lookups.
    pub metadata: &'a dyn IndexMetadata,
    /// Reserved field and index names.
    pub conventions: &'a FieldConventions,
    /// Links touched so far in this run.
    pub used: &'a mut UsedIndexes,
    /// Hop links synthesized during this run.
    hops: Vec<LinkRef>,
}

impl<'a> PassContext<'a> {
    /// Create a context for one optimizer run.
    pub fn new(
        metadata: &'a dyn IndexMetadata,
        conventions: &'a FieldConventions,
        used: &'a mut UsedIndexes,
    ) -> Self {
        Self {
            metadata,
            conventions,
            used,
            hops: Vec::new(),
        }
    }

    /// The run's instance of a synthesized hop link.
    ///
    /// Equal hops share one instance so that expansions injected over the
    /// same join path can be merged.
    pub fn hop_link(&mut self, link: IndexLink) -> LinkRef {
        if let Some(existing) = self.hops.iter().find(|hop| ***hop == link) {
            return existing.clone();
        }
        let hop = LinkRef::new(link);
        self.hops.push(hop.clone());
        hop
    }
}

/// A single rewrite pass over a query tree.
pub trait OptimizationPass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Apply this pass to the tree.
    fn apply(&self, tree: &mut QueryTree, ctx: &mut PassContext<'_>) -> LinkageResult<PassOutcome>;
}

/// The result of applying an optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassOutcome {
    /// Whether the tree was actually changed.
    pub changed: bool,
    /// Number of rewrite events (merges, injections, assignments, ...).
    pub events: usize,
}

impl PassOutcome {
    /// The tree changed through `events` rewrites.
    pub fn yes(events: usize) -> Self {
        Self {
            changed: true,
            events,
        }
    }

    /// The tree was left unchanged.
    pub fn no() -> Self {
        Self::default()
    }

    /// Changed exactly when at least one event happened.
    pub fn from_events(events: usize) -> Self {
        Self {
            changed: events > 0,
            events,
        }
    }
}

/// A trace entry for a single pass application.
#[derive(Debug, Clone)]
pub struct PassTrace {
    /// The name of the pass that was applied.
    pub pass_name: String,
    /// The tree before the pass was applied (as explain string).
    pub before: String,
    /// The tree after the pass was applied (as explain string).
    pub after: String,
    /// Whether the pass actually changed the tree.
    pub changed: bool,
}

impl PassTrace {
    /// Create a new trace entry.
    pub fn new(
        pass_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            pass_name: pass_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The result of optimization with optional trace information.
#[derive(Debug, Clone, Default)]
pub struct OptimizedQuery {
    /// Every link the run touched, as handed to the metadata collaborator.
    pub used_indexes: UsedIndexes,
    /// Outer merge/rollup iterations performed.
    pub outer_iterations: usize,
    /// Number of pass applications that changed the tree.
    pub passes_applied: usize,
    /// Total expansion merge events.
    pub merges: usize,
    /// Detailed trace of pass applications (if tracing was enabled).
    pub trace: Vec<PassTrace>,
}

impl OptimizedQuery {
    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Optimization completed in {} iterations, {} passes applied, {} merges\n",
            self.outer_iterations, self.passes_applied, self.merges
        ));

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Pass {} applied: {} ---\n",
                    i + 1,
                    entry.pass_name
                ));
                output.push_str("Before:\n");
                output.push_str(&entry.before);
                output.push_str("\nAfter:\n");
                output.push_str(&entry.after);
            }
        }

        output
    }
}
