//! Tags and installed software, and the per-owner association sets that
//! link them to agents and jobs.
//!
//! A [`Tag`] or [`Software`] row is shared: many owners may reference it
//! and detaching never removes the row itself. The association entries in
//! a [`CapabilitySet`] belong to their owner and go away with it.

use crate::ids::{SoftwareId, TagId};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Tag {
    pub id: TagId,
    pub tag: String,
}

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: TagId::new(),
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Software {
    pub id: SoftwareId,
    pub software: String,
    pub version: String,
}

impl Software {
    pub fn new(software: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: SoftwareId::new(),
            software: software.into(),
            version: version.into(),
        }
    }

    /// Whether this row names the same software release as `other`.
    pub fn same_release(&self, other: &Software) -> bool {
        self.software == other.software && self.version == other.version
    }
}

/// The tags and software attached to one owner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CapabilitySet {
    tags: Vec<Tag>,
    software: Vec<Software>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn software(&self) -> &[Software] {
        &self.software
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.software.is_empty()
    }

    /// Attach a tag.
    ///
    /// Re-attaching the same tag row is a no-op and returns `false`. Two
    /// distinct rows carrying the same label may both be attached.
    pub fn attach_tag(&mut self, tag: Tag) -> bool {
        if self.has_tag(tag.id) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    /// Attach a software release, rejecting a second row for the same
    /// `(software, version)` pair.
    pub fn attach_software(&mut self, software: Software) -> Result<()> {
        if self.software.iter().any(|s| s.same_release(&software)) {
            return Err(Error::DuplicateCapability {
                software: software.software,
                version: software.version,
            });
        }
        self.software.push(software);
        Ok(())
    }

    /// Remove the association with a tag, returning the shared row.
    pub fn detach_tag(&mut self, id: TagId) -> Option<Tag> {
        let index = self.tags.iter().position(|t| t.id == id)?;
        Some(self.tags.remove(index))
    }

    pub fn detach_software(&mut self, software: &str, version: &str) -> Option<Software> {
        let index = self
            .software
            .iter()
            .position(|s| s.software == software && s.version == version)?;
        Some(self.software.remove(index))
    }

    pub fn has_tag(&self, id: TagId) -> bool {
        self.tags.iter().any(|t| t.id == id)
    }

    pub fn has_tag_label(&self, label: &str) -> bool {
        self.tags.iter().any(|t| t.tag == label)
    }

    pub fn has_software(&self, software: &str, version: &str) -> bool {
        self.software
            .iter()
            .any(|s| s.software == software && s.version == version)
    }

    /// Drop every association, as when the owner is removed.
    pub fn clear(&mut self) -> (Vec<Tag>, Vec<Software>) {
        (
            std::mem::take(&mut self.tags),
            std::mem::take(&mut self.software),
        )
    }
}
