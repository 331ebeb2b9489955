//! Typed documents.

use std::ops::{Deref, DerefMut};

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use tool_shared::{DocumentId, Result, ToolError};

use crate::store::DocumentStore;

/// A serde-mapped record stored in one collection.
///
/// `prepare` fills in derived or defaulted fields before every save and
/// `validate` rejects invalid documents; both default to doing nothing.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection (table namespace) the documents live in.
    const COLLECTION: &'static str;

    /// Human-readable label, used by listings and the admin.
    fn label(&self) -> String {
        Self::COLLECTION.to_string()
    }

    fn prepare(&mut self) {}

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Field validators returning [`ToolError::Validation`].
pub mod validators {
    use super::*;

    /// The value must not be empty or whitespace.
    pub fn required(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ToolError::validation(format!("{field}: this field is required")));
        }
        Ok(())
    }

    /// Character count must lie in `min..=max`.
    pub fn length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
        let len = value.chars().count();
        if len < min || len > max {
            return Err(ToolError::validation(format!(
                "{field}: must be between {min} and {max} characters long"
            )));
        }
        Ok(())
    }
}

/// A document together with its primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<D> {
    pub pk: DocumentId,
    pub doc: D,
}

impl<D: Document> Stored<D> {
    pub fn pk(&self) -> &DocumentId {
        &self.pk
    }

    pub fn into_inner(self) -> D {
        self.doc
    }

    /// Write the document back under its key.
    pub async fn save(&mut self, store: &DocumentStore) -> Result<()> {
        store.update(self).await
    }

    pub async fn delete(self, store: &DocumentStore) -> Result<bool> {
        store.delete::<D>(&self.pk).await
    }
}

impl<D> Deref for Stored<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.doc
    }
}

impl<D> DerefMut for Stored<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.doc
    }
}

/// Serializes as the document's fields plus `pk`, the shape templates see.
impl<D: Serialize> Serialize for Stored<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flat<'a, D> {
            pk: &'a DocumentId,
            #[serde(flatten)]
            doc: &'a D,
        }
        Flat {
            pk: &self.pk,
            doc: &self.doc,
        }
        .serialize(serializer)
    }
}
