//! Cross-validation of the node-name → extension-descriptor mapping.
//!
//! Every pair is checked against the local filesystem, the MTA metadata
//! and the remote node list; all problems are collected before failing so
//! one run reports everything that is wrong.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::local_files::FileAccess;
use crate::tms::Node;

/// Categories of mapping problems, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueCategory {
    UnparsableDescriptor,
    VersionMismatch,
    WrongDescriptorId,
    MissingFile,
    UnknownNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub category: IssueCategory,
    pub subject: String,
}

/// All problems found in one validation run, sorted within category.
#[derive(Debug)]
pub struct ValidationIssues(pub Vec<ValidationIssue>);

impl ValidationIssues {
    fn subjects(&self, category: IssueCategory) -> Vec<&str> {
        self.0
            .iter()
            .filter(|issue| issue.category == category)
            .map(|issue| issue.subject.as_str())
            .collect()
    }
}

impl fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = Vec::new();

        for subject in self.subjects(IssueCategory::UnparsableDescriptor) {
            lines.push(format!(
                "tried to parse {} as YAML, but got an error",
                subject
            ));
        }
        if !self.subjects(IssueCategory::VersionMismatch).is_empty() {
            lines.push(
                "parameter 'mtaVersion' does not match the MTA version in mta.yaml".to_string(),
            );
        }
        let wrong_ids = self.subjects(IssueCategory::WrongDescriptorId);
        if !wrong_ids.is_empty() {
            lines.push(format!(
                "parameter 'extends' in MTA extension descriptor files [{}] is not the same as MTA ID or is missing at all",
                wrong_ids.join(", ")
            ));
        }
        let missing = self.subjects(IssueCategory::MissingFile);
        if !missing.is_empty() {
            lines.push(format!(
                "MTA extension descriptor files [{}] do not exist",
                missing.join(", ")
            ));
        }
        let unknown = self.subjects(IssueCategory::UnknownNode);
        if !unknown.is_empty() {
            lines.push(format!(
                "nodes [{}] do not exist. Please check node names provided in the node mapping or create these nodes",
                unknown.join(", ")
            ));
        }

        write!(f, "{}", lines.join("\n"))
    }
}

/// The MTA's own identity, read from mta.yaml.
#[derive(Debug, Clone, Deserialize)]
pub struct MtaSpec {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub version: String,
}

pub fn read_mta_spec(files: &dyn FileAccess, path: &Path) -> Result<MtaSpec> {
    let content = files.read(path)?;
    Ok(serde_yml::from_str(&content)?)
}

#[derive(Debug, Default, Deserialize)]
struct ExtDescriptorDoc {
    #[serde(default)]
    extends: String,
}

/// Validates the user-supplied node-name → descriptor-file mapping and
/// converts it into a node-id keyed mapping.
///
/// All problems across all pairs are accumulated; the mapping is returned
/// only when there are none. Partial validity is total failure. The
/// version check is skipped for the `"*"` wildcard.
pub fn validate_mapping(
    files: &dyn FileAccess,
    mapping: &BTreeMap<String, String>,
    nodes: &[Node],
    mta: &MtaSpec,
    mta_version: &str,
) -> Result<HashMap<i64, String>> {
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut node_id_mapping: HashMap<i64, String> = HashMap::new();

    for (node_name, file) in mapping {
        let path = Path::new(file);
        if files.exists(path) {
            match files.read(path).and_then(|content| {
                Ok(serde_yml::from_str::<ExtDescriptorDoc>(&content)?)
            }) {
                Ok(descriptor) => {
                    if descriptor.extends != mta.id {
                        issues.push(ValidationIssue {
                            category: IssueCategory::WrongDescriptorId,
                            subject: file.clone(),
                        });
                    }
                }
                Err(_) => {
                    issues.push(ValidationIssue {
                        category: IssueCategory::UnparsableDescriptor,
                        subject: file.clone(),
                    });
                }
            }
        } else {
            issues.push(ValidationIssue {
                category: IssueCategory::MissingFile,
                subject: file.clone(),
            });
        }

        match nodes.iter().find(|node| node.name == *node_name) {
            Some(node) => {
                node_id_mapping.insert(node.id, file.clone());
            }
            None => {
                issues.push(ValidationIssue {
                    category: IssueCategory::UnknownNode,
                    subject: node_name.clone(),
                });
            }
        }
    }

    if mta_version != "*" && mta_version != mta.version {
        issues.push(ValidationIssue {
            category: IssueCategory::VersionMismatch,
            subject: mta_version.to_string(),
        });
    }

    if issues.is_empty() {
        Ok(node_id_mapping)
    } else {
        issues.sort_by(|a, b| (a.category, &a.subject).cmp(&(b.category, &b.subject)));
        Err(Error::Validation(ValidationIssues(issues)))
    }
}
