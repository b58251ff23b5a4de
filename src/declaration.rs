//! Project package declarations (`*.hackage` files)
//!
//! A declaration is a line-oriented list of `name-version` tokens, optionally
//! grouped into `[url]` sections naming the registry each group comes from.
//! Lines starting with `#` and blank lines are ignored.

use crate::error::{CoupError, CoupResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Registry used for packages listed before any `[url]` section
pub const DEFAULT_REPO_URL: &str = "http://hackage.haskell.org/packages/archive";

/// A single requested package, split from its `name-version` token
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl PackageSpec {
    /// Parse a `name-version` token. The split is on the last `-`, so the
    /// name itself may contain hyphens; both halves must be non-empty.
    pub fn parse(token: &str) -> CoupResult<Self> {
        let (name, version) = token.rsplit_once('-').ok_or_else(|| CoupError::MalformedSpec {
            token: token.to_string(),
        })?;

        if name.is_empty() || version.is_empty() {
            return Err(CoupError::MalformedSpec {
                token: token.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// The original `name-version` token
    pub fn token(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Parsed declaration: requested packages grouped by registry URL.
///
/// Exact duplicate `(name, version)` pairs collapse, even across sections.
#[derive(Debug, Clone, Default)]
pub struct Declaration {
    sections: BTreeMap<String, BTreeSet<PackageSpec>>,
}

impl Declaration {
    /// Parse declaration text. `path` is only used for error context.
    pub fn parse(text: &str, path: &Path) -> CoupResult<Self> {
        let mut sections: BTreeMap<String, BTreeSet<PackageSpec>> = BTreeMap::new();
        let mut current = DEFAULT_REPO_URL.to_string();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(url) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = url.to_string();
                continue;
            }

            let spec = PackageSpec::parse(line).map_err(|_| CoupError::MalformedDeclaration {
                token: line.to_string(),
                path: path.to_path_buf(),
                line: idx + 1,
            })?;
            sections.entry(current.clone()).or_default().insert(spec);
        }

        Ok(Self { sections })
    }

    /// Load and parse a declaration file
    pub fn load(path: &Path) -> CoupResult<Self> {
        if !path.exists() {
            return Err(CoupError::DeclarationNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoupError::io(format!("reading declaration {}", path.display()), e))?;
        Self::parse(&text, path)
    }

    /// Requested packages grouped by registry URL
    pub fn sections(&self) -> impl Iterator<Item = (&str, &BTreeSet<PackageSpec>)> {
        self.sections.iter().map(|(url, set)| (url.as_str(), set))
    }

    /// All requested tokens, deduplicated and sorted lexicographically on the
    /// full `name-version` token. This ordering feeds the project digest, so
    /// it must not depend on section order or insertion order.
    pub fn flatten(&self) -> Vec<String> {
        let tokens: BTreeSet<String> = self
            .sections
            .values()
            .flat_map(|set| set.iter().map(|s| s.token()))
            .collect();
        tokens.into_iter().collect()
    }

    /// Warnings for ambiguous requests: the same package name appearing with
    /// more than one version. Both versions stay in the flattened list; the
    /// external resolver's own conflict detection decides what happens.
    pub fn validate(&self) -> Vec<String> {
        let mut versions: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for set in self.sections.values() {
            for spec in set {
                versions
                    .entry(spec.name.as_str())
                    .or_default()
                    .insert(spec.version.as_str());
            }
        }

        versions
            .into_iter()
            .filter(|(_, vs)| vs.len() > 1)
            .map(|(name, vs)| {
                let list = vs.into_iter().collect::<Vec<_>>().join(", ");
                format!("multiple versions of {} requested: {}", name, list)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(|s| s.is_empty())
    }
}

/// Find the project declaration by walking from `start` up to the filesystem
/// root. Each directory must contain at most one `*.hackage` file; the first
/// directory that contains exactly one wins.
pub fn find_declaration(start: &Path) -> CoupResult<PathBuf> {
    let mut dir = start;

    loop {
        let mut found = Vec::new();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CoupError::io(format!("reading directory {}", dir.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CoupError::io("reading directory entry", e))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "hackage") {
                found.push(path);
            }
        }

        match found.len() {
            0 => match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(CoupError::NoDeclarationFound(start.to_path_buf())),
            },
            1 => return Ok(found.remove(0)),
            _ => return Err(CoupError::MultipleDeclarationsFound(dir.to_path_buf())),
        }
    }
}
