//! Logging and debugging facilities for Canopy.
//!
//! This module provides:
//! - Target names for filtering the crate's `tracing` output
//! - Debug visualization for hierarchies
//! - Performance tracing hooks for profiling
//!
//! # Tracing Integration
//!
//! Canopy uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("canopy_core::notify=trace")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```
//! use canopy_core::{Hierarchy, HierarchyTreeDebug};
//!
//! let mut tree = Hierarchy::new();
//! let root = tree.insert("window");
//! let button = tree.insert("button");
//! tree.add_child(root, button).unwrap();
//!
//! let output = HierarchyTreeDebug::new().format_subtree(&tree, root).unwrap();
//! assert!(output.contains("button"));
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::node::NodeId;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Crate-wide target.
    pub const CORE: &str = "canopy_core";
    /// Structural mutations (attach, detach, move, removal).
    pub const HIERARCHY: &str = "canopy_core::hierarchy";
    /// Observer registration and event delivery, including muted moves.
    pub const NOTIFY: &str = "canopy_core::notify";
    /// Signal emission.
    pub const SIGNAL: &str = "canopy_core::signal";
    /// Spans created by [`PerfSpan`](super::PerfSpan).
    pub const PERF: &str = "canopy_core::perf";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show node IDs.
    pub show_ids: bool,
    /// Whether to show the number of external observers per node.
    pub show_observers: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_observers: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_observers: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_observers: false,
            ..Default::default()
        }
    }
}

/// Debug utility for visualizing hierarchies.
///
/// Node labels come from the payload's `Display` implementation.
#[derive(Debug, Clone, Default)]
pub struct HierarchyTreeDebug {
    options: TreeFormatOptions,
}

impl HierarchyTreeDebug {
    /// Create a new debug visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a debug visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format every tree of the forest, one root after the other.
    pub fn format_all<T: fmt::Display>(&self, tree: &Hierarchy<T>) -> Result<String> {
        let roots: Vec<NodeId> = tree.roots().collect();

        let mut output = String::new();
        writeln!(output, "Hierarchy ({} nodes, {} roots):", tree.len(), roots.len())
            .expect("write to String");

        if roots.is_empty() {
            writeln!(output, "  (empty)").expect("write to String");
        } else {
            for root in roots {
                self.format_subtree_into(tree, root, &mut output)?;
            }
        }

        Ok(output)
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree<T: fmt::Display>(&self, tree: &Hierarchy<T>, root: NodeId) -> Result<String> {
        let mut output = String::new();
        self.format_subtree_into(tree, root, &mut output)?;
        Ok(output)
    }

    /// Depth-first rendering with an explicit stack, so arbitrarily deep
    /// chains do not grow the call stack.
    fn format_subtree_into<T: fmt::Display>(
        &self,
        tree: &Hierarchy<T>,
        root: NodeId,
        output: &mut String,
    ) -> Result<()> {
        let mut stack = vec![(root, 0usize, true)];

        while let Some((id, depth, is_last)) = stack.pop() {
            if self.options.max_depth.is_some_and(|max| depth > max) {
                continue;
            }

            let children = tree.children(id)?;

            output.push_str(&self.build_prefix(depth, is_last));
            if let Some(payload) = tree.get(id) {
                write!(output, "{payload}").expect("write to String");
            }
            if self.options.show_ids {
                write!(output, " [{id:?}]").expect("write to String");
            }
            if self.options.show_observers {
                let count = tree.observer_count(id)?;
                write!(output, " ({count} observers)").expect("write to String");
            }
            output.push('\n');

            // Reversed so the first child is popped first.
            let last = children.len().saturating_sub(1);
            for (i, &child) in children.iter().enumerate().rev() {
                stack.push((child, depth + 1, i == last));
            }
        }

        Ok(())
    }

    /// Build the prefix string for a tree node.
    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, corner, last) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            for _ in 0..self.options.indent_size {
                prefix.push(' ');
            }
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level event with the crate target.
#[macro_export]
macro_rules! canopy_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: $crate::logging::targets::CORE, $($arg)*)
    };
}

/// Debug-level event with the crate target.
#[macro_export]
macro_rules! canopy_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: $crate::logging::targets::CORE, $($arg)*)
    };
}
