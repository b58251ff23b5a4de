//! Reuse-or-install decisions for content-addressed package databases
//!
//! Walks a resolved plan in install order. For each node the database at its
//! content-addressed path is probed: a populated database already registered
//! with this project is skipped, a populated database built by some other
//! project is adopted, and everything else is installed. Databases are
//! append-only; an existing one is never deleted or recreated.

use crate::error::{CoupError, CoupResult};
use crate::plan::{InstallPlan, PlanNode};
use crate::state::InstallRegistry;
use crate::toolchain::{ExecutionContext, InstallTarget, Toolchain};
use console::style;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// What the walk decided to do with one plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    /// Database is populated and already registered with this project
    Skip,
    /// Database was populated by another project; adopt it without installing
    Register,
    /// Database is absent or incomplete; run the installer
    Install,
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Register => write!(f, "register"),
            Self::Install => write!(f, "install"),
        }
    }
}

/// Counts of what a plan walk did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub skipped: usize,
    pub registered: usize,
    pub installed: usize,
}

/// One walk over a resolved plan
pub struct CacheWalk<'a> {
    toolchain: &'a dyn Toolchain,
    plan: &'a InstallPlan,
    /// Top-level tokens the user asked for (used by `deps_only`)
    requested: &'a [String],
    /// Install dependencies only; requested packages and the local target
    /// are forced to skip
    deps_only: bool,
    /// Package name of the current-directory target, when installing the
    /// local package. The local node is never skipped on a populated
    /// database: the source may have changed since it was built.
    local_name: Option<&'a str>,
}

impl<'a> CacheWalk<'a> {
    pub fn new(
        toolchain: &'a dyn Toolchain,
        plan: &'a InstallPlan,
        requested: &'a [String],
        deps_only: bool,
        local_name: Option<&'a str>,
    ) -> Self {
        Self {
            toolchain,
            plan,
            requested,
            deps_only,
            local_name,
        }
    }

    /// Walk every node in plan order, registering each successful outcome
    /// durably before moving on. Any install failure aborts the walk; nodes
    /// already committed stay registered.
    pub async fn run(
        &self,
        registry: &mut InstallRegistry,
        ctx: &ExecutionContext,
    ) -> CoupResult<WalkSummary> {
        let mut summary = WalkSummary::default();

        for node in self.plan.nodes() {
            match self.decide(node, registry).await? {
                NodeAction::Skip => {
                    if self.is_forced_skip(node) {
                        println!(
                            "{} Skipping {}, dependencies only",
                            style("·").dim(),
                            style(&node.name).cyan()
                        );
                    } else {
                        println!(
                            "{} Skipping {}, already installed for this project",
                            style("·").dim(),
                            style(&node.name).cyan()
                        );
                    }
                    summary.skipped += 1;
                }
                NodeAction::Register => {
                    println!(
                        "{} Registering existing package {} with this project",
                        style("✓").green(),
                        style(&node.name).cyan()
                    );
                    registry.append(&node.db_path).await?;
                    summary.registered += 1;
                }
                NodeAction::Install => {
                    self.install_node(node, registry, ctx).await?;
                    registry.append(&node.db_path).await?;
                    summary.installed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Decide the action for one node
    async fn decide(&self, node: &PlanNode, registry: &InstallRegistry) -> CoupResult<NodeAction> {
        if self.is_forced_skip(node) {
            debug!("{}: requested target in deps-only mode", node.name);
            return Ok(NodeAction::Skip);
        }

        let populated = self
            .toolchain
            .is_registered(&node.name, &node.db_path)
            .await?;
        if !populated {
            return Ok(NodeAction::Install);
        }
        if self.is_local(node) {
            // never trust a cached build of the local source
            return Ok(NodeAction::Install);
        }
        if registry.contains(&node.db_path) {
            Ok(NodeAction::Skip)
        } else {
            Ok(NodeAction::Register)
        }
    }

    /// In deps-only mode the requested packages themselves (and the local
    /// target) never install
    fn is_forced_skip(&self, node: &PlanNode) -> bool {
        self.deps_only && (self.is_local(node) || self.requested.contains(&node.name))
    }

    async fn install_node(
        &self,
        node: &PlanNode,
        registry: &InstallRegistry,
        ctx: &ExecutionContext,
    ) -> CoupResult<()> {
        if !node.db_path.exists() {
            self.toolchain.init_db(&node.db_path).await?;
        }

        let search_paths = self.search_paths(node, registry);
        let target = if self.is_local(node) {
            InstallTarget::LocalDirectory {
                name: node.name.clone(),
            }
        } else {
            InstallTarget::Package(node.name.clone())
        };

        // The installer re-resolves on its own; make sure it still agrees
        // with the plan before touching anything.
        let proposed = self
            .toolchain
            .proposed_installs(&target, &search_paths, ctx)
            .await?;
        if proposed.len() != 1 || proposed[0] != node.name {
            return Err(CoupError::PlanInconsistent {
                name: node.name.clone(),
                proposed,
            });
        }

        println!(
            "{} Installing {}",
            style("→").cyan(),
            style(&node.name).cyan()
        );
        self.toolchain
            .install(&target, &node.cache_path, &search_paths, ctx)
            .await
    }

    /// Search paths for one install: the project's registered databases, the
    /// node's transitive dependency databases, and the node's own database
    /// last so the toolchain registers the new artifact there.
    fn search_paths(&self, node: &PlanNode, registry: &InstallRegistry) -> Vec<PathBuf> {
        let mut dbs: Vec<PathBuf> = registry
            .paths()
            .iter()
            .filter(|p| *p != &node.db_path)
            .cloned()
            .collect();

        for db in self.plan.dependency_dbs(node) {
            if db != node.db_path && !dbs.contains(&db) {
                dbs.push(db);
            }
        }

        dbs.push(node.db_path.clone());
        dbs
    }

    fn is_local(&self, node: &PlanNode) -> bool {
        let Some(local) = self.local_name else {
            return false;
        };
        // node names are full name-version tokens; compare the name half
        node.name
            .rsplit_once('-')
            .is_some_and(|(name, _)| name == local)
    }
}
