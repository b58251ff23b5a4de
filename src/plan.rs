//! Install plan resolution
//!
//! Turns the external resolver's dry-run output into an ordered plan of
//! content-addressed cache locations. Line order is install order and is
//! preserved exactly; later lines may depend on earlier ones.

use crate::declaration::PackageSpec;
use crate::digest::dependency_digest;
use crate::error::{CoupError, CoupResult};
use crate::toolchain::{ExecutionContext, Toolchain};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::debug;

/// One entry of a resolved install plan
#[derive(Debug, Clone)]
pub struct PlanNode {
    /// Full `name-version` token of the package to install
    pub name: String,

    /// Dependency tokens exactly as the resolver listed them
    pub deps: Vec<String>,

    /// Content address of the dependency set
    pub digest: String,

    /// Isolated cache directory for this (package, dependency-set) pair
    pub cache_path: PathBuf,

    /// The package database inside `cache_path`
    pub db_path: PathBuf,
}

/// A resolved plan: nodes in install order plus a name index for closure
/// lookups
#[derive(Debug, Default)]
pub struct InstallPlan {
    nodes: Vec<PlanNode>,
    index: HashMap<String, usize>,
}

impl InstallPlan {
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&PlanNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Database paths provided by `node`'s full dependency closure, in
    /// discovery order. Dependencies that are not in the plan live in the
    /// global database and contribute nothing. The visited set bounds the
    /// traversal even if the resolver ever emitted a dependency cycle.
    pub fn dependency_dbs(&self, node: &PlanNode) -> Vec<PathBuf> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: Vec<&str> = node.deps.iter().map(String::as_str).collect();
        let mut dbs = Vec::new();

        while let Some(name) = queue.pop() {
            if !visited.insert(name) {
                continue;
            }
            if let Some(dep) = self.get(name) {
                if !dbs.contains(&dep.db_path) {
                    dbs.push(dep.db_path.clone());
                }
                queue.extend(dep.deps.iter().map(String::as_str));
            }
        }

        dbs
    }
}

/// Computes install plans through the toolchain's dry-run planner
pub struct PlanResolver<'a> {
    toolchain: &'a dyn Toolchain,
    /// Versioned packages root the cache paths live under,
    /// e.g. `~/.coup/packages/ghc-9.4.8`
    packages_root: PathBuf,
}

impl<'a> PlanResolver<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, packages_root: PathBuf) -> Self {
        Self {
            toolchain,
            packages_root,
        }
    }

    /// Resolve an install plan for `targets` (empty = the package in the
    /// current directory). `registered` databases are passed to the resolver
    /// as already-available search paths so it does not propose reinstalling
    /// what the project already has; `extra_flags` go through verbatim.
    pub async fn resolve(
        &self,
        targets: &[String],
        extra_flags: &[String],
        registered: &[PathBuf],
        ctx: &ExecutionContext,
    ) -> CoupResult<InstallPlan> {
        let out = self
            .toolchain
            .plan_dry_run(targets, extra_flags, registered, ctx)
            .await?;
        let plan = self.parse(&out)?;
        debug!("Resolved plan with {} nodes", plan.len());
        Ok(plan)
    }

    /// Parse raw planner output: one line per package, first token the
    /// package, remaining tokens its dependencies. An unparseable head token
    /// means the adapter and the external tool disagree about the output
    /// format, which is not recoverable.
    fn parse(&self, out: &str) -> CoupResult<InstallPlan> {
        let mut nodes = Vec::new();
        let mut index = HashMap::new();

        for line in out.lines() {
            let mut tokens = line.split_whitespace();
            let Some(head) = tokens.next() else {
                continue;
            };
            PackageSpec::parse(head).map_err(|_| CoupError::PlanParse(line.to_string()))?;

            let deps: Vec<String> = tokens.map(str::to_string).collect();
            let digest = dependency_digest(&deps);
            let cache_path = self.packages_root.join(format!("{}-{}", head, digest));
            let db_path = cache_path.join("package.conf.d");

            index.entry(head.to_string()).or_insert(nodes.len());
            nodes.push(PlanNode {
                name: head.to_string(),
                deps,
                digest,
                cache_path,
                db_path,
            });
        }

        Ok(InstallPlan { nodes, index })
    }
}
