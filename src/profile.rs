use tracing::info;

use crate::entity::Relation;
use crate::error::ImportError;
use crate::graph::EntityGraph;

/// The MADICES-2025 RO-Crate profile.
pub const MADICES_PROFILE_PID: &str = "https://github.com/MADICES/MADICES-2025/discussions/25";

/// Compatibility gate: the root dataset must conform to exactly one
/// profile, and it must be the configured one.
#[derive(Debug, Clone)]
pub struct ProfileValidator {
    profile: String,
}

impl Default for ProfileValidator {
    fn default() -> Self {
        Self::new(MADICES_PROFILE_PID)
    }
}

impl ProfileValidator {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn check(&self, graph: &EntityGraph) -> Result<(), ImportError> {
        let declared = graph.resolve_relationship(graph.root(), "conformsTo");
        let found = match declared.as_slice() {
            [single] => single.id(),
            [] => return Err(self.unsupported("none".to_string())),
            many => {
                let ids: Vec<&str> = many.iter().map(Relation::id).collect();
                return Err(self.unsupported(ids.join(", ")));
            }
        };

        if found != self.profile {
            return Err(self.unsupported(found.to_string()));
        }
        info!(profile = %self.profile, "crate conforms to supported profile");
        Ok(())
    }

    fn unsupported(&self, found: String) -> ImportError {
        ImportError::UnsupportedProfile {
            found,
            expected: self.profile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::entity::{Entity, PropertyValue};

    fn graph_with(conforms_to: Option<PropertyValue>) -> EntityGraph {
        let mut root = Entity::new("./", &["Dataset"]);
        if let Some(value) = conforms_to {
            root = root.with_property("conformsTo", value);
        }
        EntityGraph::from_entities(vec![root]).unwrap()
    }

    #[test]
    fn accepts_supported_profile() {
        let graph = graph_with(Some(PropertyValue::reference(MADICES_PROFILE_PID)));
        ProfileValidator::default().check(&graph).unwrap();
    }

    #[test]
    fn accepts_profile_declared_as_contextual_entity() {
        let root = Entity::new("./", &["Dataset"])
            .with_property("conformsTo", PropertyValue::reference(MADICES_PROFILE_PID));
        let profile = Entity::new(MADICES_PROFILE_PID, &["CreativeWork", "Profile"]);
        let graph = EntityGraph::from_entities(vec![root, profile]).unwrap();
        ProfileValidator::default().check(&graph).unwrap();
    }

    #[test]
    fn rejects_other_profile() {
        let graph = graph_with(Some(PropertyValue::reference(
            "https://w3id.org/ro/crate/1.1",
        )));
        let err = ProfileValidator::default().check(&graph).unwrap_err();
        assert_matches!(
            err,
            ImportError::UnsupportedProfile { found, .. } if found == "https://w3id.org/ro/crate/1.1"
        );
    }

    #[test]
    fn rejects_missing_profile() {
        let graph = graph_with(None);
        assert_matches!(
            ProfileValidator::default().check(&graph),
            Err(ImportError::UnsupportedProfile { .. })
        );
    }

    #[test]
    fn injected_profile_replaces_default() {
        let graph = graph_with(Some(PropertyValue::reference("https://example.org/p/1")));
        ProfileValidator::new("https://example.org/p/1")
            .check(&graph)
            .unwrap();
        assert!(ProfileValidator::default().check(&graph).is_err());
    }
}
