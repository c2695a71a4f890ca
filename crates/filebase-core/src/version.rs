//! Revision lineage: filename parsing and next-revision planning.
//!
//! A file checked out for editing is named
//! `<root>-v<revision>-<fingerprint>[.<ext>]`, where `revision` and
//! `fingerprint` identify the revision it was derived from. Parsing is
//! purely syntactic. The embedded revision number is advisory; the
//! authoritative number is planned from the stored predecessor by
//! [`plan_next_revision`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CatalogError;
use crate::models::NodeId;

static VERSIONED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<root>.+)-v(?P<version>\d+)-(?P<hash>[0-9a-fA-F]{64})(?:\.(?P<ext>.+))?$",
    )
    .expect("versioned filename pattern is valid")
});

/// Lineage extracted from a versioned filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameVersion {
    pub root_name: String,
    /// Revision the filename claims its predecessor had. Advisory only.
    pub version_number: u32,
    /// Fingerprint of the predecessor, lowercased.
    pub prior_fingerprint: String,
    pub extension: Option<String>,
}

/// Parse `filename`. `None` means "not versioned": treat as a first revision.
pub fn parse_versioned_filename(filename: &str) -> Option<FilenameVersion> {
    let caps = VERSIONED_NAME.captures(filename)?;
    let version_number = caps["version"].parse::<u32>().ok()?;
    Some(FilenameVersion {
        root_name: caps["root"].to_string(),
        version_number,
        prior_fingerprint: caps["hash"].to_ascii_lowercase(),
        extension: caps.name("ext").map(|m| m.as_str().to_string()),
    })
}

/// Build the checkout name for a stored revision. Inverse of
/// [`parse_versioned_filename`].
pub fn versioned_filename(
    root_name: &str,
    revision: u32,
    fingerprint: &str,
    extension: &str,
) -> String {
    let stem = format!("{}-v{}-{}", root_name, revision, fingerprint);
    if extension.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, extension)
    }
}

/// What the store knows about a named predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorRevision {
    pub id: NodeId,
    pub revision: u32,
    /// The version group the predecessor belongs to, if any.
    pub group: Option<NodeId>,
    /// Highest revision currently in that group.
    pub latest_in_group: Option<u32>,
}

/// How the new revision attaches to its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPlan {
    /// The predecessor already has a group; join it.
    JoinGroup { group: NodeId, revision: u32 },
    /// First edit of an ungrouped file: create a group holding both.
    StartGroup { prior: NodeId, revision: u32 },
}

impl VersionPlan {
    pub fn revision(&self) -> u32 {
        match self {
            VersionPlan::JoinGroup { revision, .. } | VersionPlan::StartGroup { revision, .. } => {
                *revision
            }
        }
    }
}

/// Decide the new revision number and group action.
///
/// Never repairs: an ungrouped predecessor that is not revision 1 is a
/// corrupt chain, and a predecessor that is not the group's latest revision
/// would branch the chain.
pub fn plan_next_revision(prior: &PriorRevision) -> Result<VersionPlan, CatalogError> {
    match prior.group {
        Some(group) => {
            let latest = prior.latest_in_group.unwrap_or(prior.revision);
            if latest > prior.revision {
                return Err(CatalogError::UnsupportedBranch {
                    prior: prior.id,
                    prior_revision: prior.revision,
                    latest_revision: latest,
                });
            }
            let revision = prior.revision.checked_add(1).ok_or_else(|| {
                CatalogError::VersionChainCorrupt {
                    node: prior.id,
                    detail: "revision number overflow".to_string(),
                }
            })?;
            Ok(VersionPlan::JoinGroup { group, revision })
        }
        None if prior.revision == 1 => Ok(VersionPlan::StartGroup {
            prior: prior.id,
            revision: 2,
        }),
        None => Err(CatalogError::VersionChainCorrupt {
            node: prior.id,
            detail: format!(
                "revision {} is not in a version group",
                prior.revision
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    #[test]
    fn parses_versioned_name() {
        let parsed = parse_versioned_filename(&format!("report-v1-{}.txt", H)).unwrap();
        assert_eq!(parsed.root_name, "report");
        assert_eq!(parsed.version_number, 1);
        assert_eq!(parsed.prior_fingerprint, H);
        assert_eq!(parsed.extension.as_deref(), Some("txt"));
    }

    #[test]
    fn root_name_may_contain_dashes_and_versions() {
        let name = format!("q3-plan-v2-final-v7-{}.tar.gz", H);
        let parsed = parse_versioned_filename(&name).unwrap();
        assert_eq!(parsed.root_name, "q3-plan-v2-final");
        assert_eq!(parsed.version_number, 7);
        assert_eq!(parsed.extension.as_deref(), Some("tar.gz"));
    }

    #[test]
    fn extension_is_optional() {
        let parsed = parse_versioned_filename(&format!("Makefile-v3-{}", H)).unwrap();
        assert_eq!(parsed.root_name, "Makefile");
        assert_eq!(parsed.extension, None);
    }

    #[test]
    fn hash_is_lowercased() {
        let upper = H.to_uppercase();
        let parsed = parse_versioned_filename(&format!("a-v1-{}.md", upper)).unwrap();
        assert_eq!(parsed.prior_fingerprint, H);
    }

    #[test]
    fn plain_names_do_not_match() {
        assert_eq!(parse_versioned_filename("report.txt"), None);
        assert_eq!(parse_versioned_filename("report-v1.txt"), None);
        assert_eq!(parse_versioned_filename(&format!("report-v1-{}.txt", &H[..63])), None);
        assert_eq!(parse_versioned_filename(&format!("-v1-{}.txt", H)), None);
        assert_eq!(
            parse_versioned_filename(&format!("a-v99999999999-{}.txt", H)),
            None
        );
    }

    #[test]
    fn versioned_filename_round_trips() {
        let name = versioned_filename("report", 4, H, "txt");
        assert_eq!(name, format!("report-v4-{}.txt", H));
        let parsed = parse_versioned_filename(&name).unwrap();
        assert_eq!(parsed.root_name, "report");
        assert_eq!(parsed.version_number, 4);

        assert_eq!(versioned_filename("notes", 1, H, ""), format!("notes-v1-{}", H));
    }

    #[test]
    fn ungrouped_first_revision_starts_group() {
        let prior = PriorRevision {
            id: NodeId(5),
            revision: 1,
            group: None,
            latest_in_group: None,
        };
        assert_eq!(
            plan_next_revision(&prior).unwrap(),
            VersionPlan::StartGroup {
                prior: NodeId(5),
                revision: 2
            }
        );
    }

    #[test]
    fn grouped_latest_revision_joins_group() {
        let prior = PriorRevision {
            id: NodeId(8),
            revision: 3,
            group: Some(NodeId(6)),
            latest_in_group: Some(3),
        };
        let plan = plan_next_revision(&prior).unwrap();
        assert_eq!(
            plan,
            VersionPlan::JoinGroup {
                group: NodeId(6),
                revision: 4
            }
        );
        assert_eq!(plan.revision(), 4);
    }

    #[test]
    fn ungrouped_later_revision_is_corrupt() {
        let prior = PriorRevision {
            id: NodeId(9),
            revision: 2,
            group: None,
            latest_in_group: None,
        };
        assert!(matches!(
            plan_next_revision(&prior),
            Err(CatalogError::VersionChainCorrupt { node: NodeId(9), .. })
        ));
    }

    #[test]
    fn editing_a_stale_revision_is_a_branch() {
        let prior = PriorRevision {
            id: NodeId(5),
            revision: 1,
            group: Some(NodeId(6)),
            latest_in_group: Some(2),
        };
        assert_eq!(
            plan_next_revision(&prior),
            Err(CatalogError::UnsupportedBranch {
                prior: NodeId(5),
                prior_revision: 1,
                latest_revision: 2
            })
        );
    }
}
