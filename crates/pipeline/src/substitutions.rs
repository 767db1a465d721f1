//! Substitution Merger: the dispatch-time variables every build receives.
//!
//! The names mirror Cloud Build's built-ins with a leading underscore, because
//! user-defined substitutions must start with `_`:
//!
//! | Key | Value | Built-in it shadows |
//! |-----|-------|---------------------|
//! | `_PROJECT_ID` | GCP project ID | `$PROJECT_ID` |
//! | `_REPO_NAME` | `<owner-login>-<repo-name>` | `$REPO_NAME` |
//! | `_COMMIT_SHA` | head commit | `$COMMIT_SHA` |
//! | `_PR_NUMBER` | pull request number, base 10 | – |

use std::collections::BTreeMap;

use crate::{CommitSha, ProjectId, PullRequestNumber};

/// `_PROJECT_ID` substitution key.
pub const PROJECT_ID_KEY: &str = "_PROJECT_ID";
/// `_REPO_NAME` substitution key.
pub const REPO_NAME_KEY: &str = "_REPO_NAME";
/// `_COMMIT_SHA` substitution key.
pub const COMMIT_SHA_KEY: &str = "_COMMIT_SHA";
/// `_PR_NUMBER` substitution key.
pub const PR_NUMBER_KEY: &str = "_PR_NUMBER";

/// All reserved keys, in the order they are documented.
pub const RESERVED_KEYS: [&str; 4] = [PROJECT_ID_KEY, REPO_NAME_KEY, COMMIT_SHA_KEY, PR_NUMBER_KEY];

/// The four computed substitutions for one dispatch.
///
/// Always holds exactly the [`RESERVED_KEYS`]; there is no way to add or
/// remove entries after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionSet {
    entries: BTreeMap<String, String>,
}

impl SubstitutionSet {
    /// Computes the set for one dispatch.
    ///
    /// `repo_name` is the `<owner-login>-<repo-name>` identity from
    /// [`crate::HeadRepository::build_repo_name`].
    pub fn compute(
        project_id: &ProjectId,
        repo_name: &str,
        commit_sha: &CommitSha,
        pr_number: PullRequestNumber,
    ) -> Self {
        let entries = BTreeMap::from([
            (PROJECT_ID_KEY.to_owned(), project_id.to_string()),
            (REPO_NAME_KEY.to_owned(), repo_name.to_owned()),
            (COMMIT_SHA_KEY.to_owned(), commit_sha.to_string()),
            (PR_NUMBER_KEY.to_owned(), pr_number.to_string()),
        ]);
        Self { entries }
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Writes the computed values into `target`, overwriting any document
    /// value under a reserved key. Other keys in `target` are left alone.
    pub fn apply_to(&self, target: &mut BTreeMap<String, String>) {
        for (key, value) in self.iter() {
            target.insert(key.to_owned(), value.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> SubstitutionSet {
        SubstitutionSet::compute(
            &ProjectId::new("proj-1").unwrap(),
            "octo-widgets",
            &CommitSha::new("abc123").unwrap(),
            PullRequestNumber::new(42),
        )
    }

    #[test]
    fn holds_exactly_the_reserved_keys() {
        let set = set();
        let keys: Vec<&str> = set.iter().map(|(k, _)| k).collect();
        let mut expected = RESERVED_KEYS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);
    }

    #[test]
    fn values_are_computed_from_inputs() {
        let set = set();
        let values: BTreeMap<&str, &str> = set.iter().collect();
        assert_eq!(values[PROJECT_ID_KEY], "proj-1");
        assert_eq!(values[REPO_NAME_KEY], "octo-widgets");
        assert_eq!(values[COMMIT_SHA_KEY], "abc123");
        assert_eq!(values[PR_NUMBER_KEY], "42");
    }

    #[test]
    fn apply_overwrites_reserved_and_keeps_custom_keys() {
        let mut target = BTreeMap::from([
            ("_PR_NUMBER".to_owned(), "999".to_owned()),
            ("_DEPLOY_ENV".to_owned(), "staging".to_owned()),
        ]);
        set().apply_to(&mut target);

        assert_eq!(target.len(), 5);
        assert_eq!(target["_PR_NUMBER"], "42");
        assert_eq!(target["_DEPLOY_ENV"], "staging");
    }
}
