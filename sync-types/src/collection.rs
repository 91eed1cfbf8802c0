//! Collection descriptors: sort order, named collections and subject bindings.

use serde::{Deserialize, Serialize};

use crate::ids::{CollectionPath, Subject};

/// Sort direction of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest first (message histories).
    Ascending,
    /// Newest first (upload listings).
    Descending,
}

/// The field and direction a subscription is ordered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderBy {
    /// Name of the payload field the remote sorts on.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderBy {
    /// Ascending order on `field`.
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending order on `field`.
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Descending,
        }
    }
}

/// A named per-subject collection and the order it is viewed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name under the subject, e.g. `messages`.
    pub name: String,
    /// Subscription ordering.
    pub order_by: OrderBy,
}

impl CollectionSpec {
    /// Create a collection spec.
    pub fn new(name: &str, order_by: OrderBy) -> Self {
        Self {
            name: name.to_string(),
            order_by,
        }
    }

    /// Chat history: `messages`, chronological by `timestamp`.
    pub fn chat_history() -> Self {
        Self::new("messages", OrderBy::ascending("timestamp"))
    }

    /// Upload listing: `plans`, newest first by `uploadDate`.
    pub fn uploads() -> Self {
        Self::new("plans", OrderBy::descending("uploadDate"))
    }

    /// Resolve the remote path of this collection for a subject.
    pub fn path_for(&self, subject: &Subject) -> CollectionPath {
        CollectionPath::new(format!("users/{}/{}", subject, self.name))
    }

    /// Bind this collection to a subject (or to none).
    pub fn bind(&self, subject: Option<Subject>) -> CollectionRef {
        CollectionRef {
            spec: self.clone(),
            subject,
        }
    }
}

/// A collection spec bound to the subject it currently belongs to.
///
/// Mutations require a bound subject; an unbound ref stands for
/// "nobody is signed in / nothing is selected".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    spec: CollectionSpec,
    subject: Option<Subject>,
}

impl CollectionRef {
    /// The collection spec.
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// The bound subject, if any.
    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// The resolved remote path, or `None` when no subject is bound.
    pub fn path(&self) -> Option<CollectionPath> {
        self.subject.as_ref().map(|s| self.spec.path_for(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_expected_order() {
        assert_eq!(
            CollectionSpec::chat_history().order_by.direction,
            SortDirection::Ascending
        );
        assert_eq!(
            CollectionSpec::uploads().order_by.direction,
            SortDirection::Descending
        );
    }

    #[test]
    fn path_is_scoped_by_subject() {
        let spec = CollectionSpec::chat_history();
        assert_eq!(
            spec.path_for(&Subject::from("alice")).as_str(),
            "users/alice/messages"
        );
    }

    #[test]
    fn unbound_ref_has_no_path() {
        let r = CollectionSpec::uploads().bind(None);
        assert!(r.path().is_none());
        assert!(r.subject().is_none());
    }

    #[test]
    fn spec_from_toml_like_json() {
        let spec: CollectionSpec = serde_json::from_str(
            r#"{"name":"plans","order_by":{"field":"uploadDate","direction":"descending"}}"#,
        )
        .unwrap();
        assert_eq!(spec, CollectionSpec::uploads());
    }
}
