//! Backlog assembly for the tag-creation step.
//!
//! Four sources contribute to the backlog: the addon descriptor's
//! repository list, an explicit repository/commit pair, the addon product
//! version tag and a generic extra tag. The latter two broadcast to every
//! item already in the backlog.

use serde::Deserialize;

use crate::abap::CreateTagConfig;
use crate::error::{Error, Result};
use crate::local_files::FileAccess;

/// Description attached to tags this step generates on its own.
pub const GENERATED_TAG_DESCRIPTION: &str = "Generated by the ABAP Environment Pipeline";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub description: String,
}

/// One independent unit of work: a repository at a commit, plus the tags
/// to create for it, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub repository_name: String,
    pub commit_id: String,
    pub tags: Vec<Tag>,
}

/// Addon descriptor as declared in the repository's addon.yml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddonDescriptor {
    pub addon_product: String,
    pub addon_version: String,
    pub repositories: Vec<RepositoryDescriptor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryDescriptor {
    pub name: String,
    #[serde(rename = "commitID")]
    pub commit_id: String,
    pub version: String,
}

/// Reads and parses the addon descriptor file.
pub fn read_addon_descriptor(
    files: &dyn FileAccess,
    path: &std::path::Path,
) -> Result<AddonDescriptor> {
    if !files.exists(path) {
        return Err(Error::Descriptor(format!(
            "addon descriptor not found: {}",
            path.display()
        )));
    }
    let content = files.read(path)?;
    Ok(serde_yml::from_str(&content)?)
}

/// Assembles the ordered backlog of work items from the step configuration.
///
/// Descriptor read or parse errors propagate verbatim; an empty backlog is
/// not an error and yields a zero-length batch.
pub fn build_backlog(config: &CreateTagConfig, files: &dyn FileAccess) -> Result<Vec<WorkItem>> {
    let mut backlog: Vec<WorkItem> = Vec::new();
    let mut descriptor = AddonDescriptor::default();

    if let Some(path) = &config.repositories {
        descriptor = read_addon_descriptor(files, path)?;
        for repo in &descriptor.repositories {
            let mut item = WorkItem {
                repository_name: repo.name.clone(),
                commit_id: repo.commit_id.clone(),
                tags: Vec::new(),
            };
            if !repo.version.is_empty() {
                item.tags.push(Tag {
                    name: format!("v{}", repo.version),
                    description: GENERATED_TAG_DESCRIPTION.to_string(),
                });
            }
            backlog.push(item);
        }
    }

    match (&config.repository_name, &config.commit_id) {
        (Some(name), Some(commit)) if !name.is_empty() && !commit.is_empty() => {
            backlog.push(WorkItem {
                repository_name: name.clone(),
                commit_id: commit.clone(),
                tags: Vec::new(),
            });
        }
        _ => {}
    }

    if config.create_tag_for_addon_product_version
        && !descriptor.addon_product.is_empty()
        && !descriptor.addon_version.is_empty()
    {
        add_tag_to_all(
            &mut backlog,
            &format!("{}-{}", descriptor.addon_product, descriptor.addon_version),
            GENERATED_TAG_DESCRIPTION,
        );
    }

    if let Some(tag_name) = &config.tag_name {
        if !tag_name.is_empty() {
            add_tag_to_all(
                &mut backlog,
                tag_name,
                config.tag_description.as_deref().unwrap_or_default(),
            );
        }
    }

    Ok(backlog)
}

/// Appends the given tag to every item in the backlog (broadcast, not
/// targeted).
pub fn add_tag_to_all(backlog: &mut [WorkItem], name: &str, description: &str) {
    for item in backlog.iter_mut() {
        item.tags.push(Tag {
            name: name.to_string(),
            description: description.to_string(),
        });
    }
}
