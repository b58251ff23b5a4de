//! Content addressing for dependency sets
//!
//! A package database's identity is the hash of the dependency names it was
//! built against. Same set of names, same digest, same cache directory, which
//! is what makes databases shareable across projects.

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Length of the hex digest used in cache paths (128 bits)
pub const DIGEST_LEN: usize = 32;

/// Hash a set of package names into a fixed-length hex cache key.
///
/// Input order and duplicates are irrelevant: names are deduplicated and
/// sorted before hashing, so any two equal sets map to the same digest.
pub fn dependency_digest<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sorted: BTreeSet<String> = names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect();
    let joined = sorted.into_iter().collect::<Vec<_>>().join(" ");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let result = hasher.finalize();

    let mut hash = hex::encode(result);
    hash.truncate(DIGEST_LEN);
    hash
}
