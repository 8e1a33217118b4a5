use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::entity::{Entity, PropertyValue, ROOT_ID, Relation};
use crate::error::ImportError;

/// All entities of one crate, in the order the descriptor lists them.
///
/// Entities written inline inside another entity's property are indexed
/// too, so a later reference by id finds them. A top-level entity always
/// shadows an inline one with the same id.
#[derive(Debug, Clone)]
pub struct EntityGraph {
    entities: Vec<Entity>,
    nested: Vec<Entity>,
    index: HashMap<String, Slot>,
    root: usize,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    TopLevel(usize),
    Nested(usize),
}

impl EntityGraph {
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self, ImportError> {
        let mut index = HashMap::with_capacity(entities.len());
        for (position, entity) in entities.iter().enumerate() {
            if index
                .insert(entity.id().to_string(), Slot::TopLevel(position))
                .is_some()
            {
                return Err(ImportError::InvalidArchive(format!(
                    "duplicate entity id {}",
                    entity.id()
                )));
            }
        }
        let Some(&Slot::TopLevel(root)) = index.get(ROOT_ID) else {
            return Err(ImportError::InvalidArchive(
                "no root data entity with @id \"./\"".to_string(),
            ));
        };

        let mut inline = Vec::new();
        for entity in &entities {
            for (_, value) in entity.properties() {
                collect_inline(value, &mut inline);
            }
        }

        let mut nested: Vec<Entity> = Vec::new();
        for entity in inline {
            match index.get(entity.id()) {
                Some(Slot::TopLevel(_)) => {}
                Some(Slot::Nested(position)) if nested[*position] == *entity => {}
                Some(Slot::Nested(_)) => {
                    return Err(ImportError::InvalidArchive(format!(
                        "conflicting inline definitions of entity id {}",
                        entity.id()
                    )));
                }
                None => {
                    index.insert(entity.id().to_string(), Slot::Nested(nested.len()));
                    nested.push(entity.clone());
                }
            }
        }
        if !nested.is_empty() {
            debug!(count = nested.len(), "indexed inline entities");
        }

        Ok(Self {
            entities,
            nested,
            index,
            root,
        })
    }

    /// Build the graph from a flattened JSON-LD document with a top-level
    /// `@graph` array.
    pub fn from_json_ld(document: &Value) -> Result<Self, ImportError> {
        let nodes = document
            .get("@graph")
            .and_then(Value::as_array)
            .ok_or_else(|| ImportError::InvalidArchive("missing @graph array".to_string()))?;

        let entities = nodes
            .iter()
            .map(|node| {
                let object = node.as_object().ok_or_else(|| {
                    ImportError::InvalidArchive(format!("@graph member is not an object: {node}"))
                })?;
                Entity::from_json(object)
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = entities.len(), "parsed crate entities");

        Self::from_entities(entities)
    }

    /// Look up an entity by id, whether it is listed in `@graph` or only
    /// written inline somewhere.
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|slot| match *slot {
            Slot::TopLevel(position) => &self.entities[position],
            Slot::Nested(position) => &self.nested[position],
        })
    }

    pub fn root(&self) -> &Entity {
        &self.entities[self.root]
    }

    pub fn all_entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Read `property` of `entity` as an ordered sequence of targets.
    ///
    /// A single value and a one-element list produce the same result.
    /// References to ids present in the graph are resolved; other
    /// references and bare strings come back as [`Relation::Unresolved`].
    /// An absent property yields an empty sequence.
    pub fn resolve_relationship<'g>(
        &'g self,
        entity: &'g Entity,
        property: &str,
    ) -> Vec<Relation<'g>> {
        let mut targets = Vec::new();
        if let Some(value) = entity.get(property) {
            self.collect_targets(value, &mut targets);
        }
        targets
    }

    fn collect_targets<'g>(&'g self, value: &'g PropertyValue, out: &mut Vec<Relation<'g>>) {
        match value {
            PropertyValue::List(items) => {
                for item in items {
                    self.collect_targets(item, out);
                }
            }
            PropertyValue::Inline(entity) => out.push(Relation::Resolved(entity)),
            PropertyValue::Reference(id) => match self.entity(id) {
                Some(entity) => out.push(Relation::Resolved(entity)),
                None => out.push(Relation::Unresolved(id)),
            },
            PropertyValue::Literal(Value::String(text)) => out.push(Relation::Unresolved(text)),
            PropertyValue::Literal(_) => {}
        }
    }
}

/// Inline entities below `value`, parents before their own inline parts.
fn collect_inline<'a>(value: &'a PropertyValue, out: &mut Vec<&'a Entity>) {
    match value {
        PropertyValue::List(items) => {
            for item in items {
                collect_inline(item, out);
            }
        }
        PropertyValue::Inline(entity) => {
            out.push(entity.as_ref());
            for (_, nested) in entity.properties() {
                collect_inline(nested, out);
            }
        }
        PropertyValue::Reference(_) | PropertyValue::Literal(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn graph() -> EntityGraph {
        EntityGraph::from_json_ld(&json!({
            "@context": "https://w3id.org/ro/crate/1.1/context",
            "@graph": [
                {
                    "@id": "./",
                    "@type": "Dataset",
                    "hasPart": {"@id": "data.csv"},
                    "conformsTo": {"@id": "https://example.org/profile"}
                },
                {"@id": "data.csv", "@type": "File"},
                {"@id": "listing", "@type": "Dataset", "hasPart": [{"@id": "data.csv"}]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn single_value_and_one_element_list_agree() {
        let graph = graph();
        let single = graph.resolve_relationship(graph.root(), "hasPart");
        let listing = graph.entity("listing").unwrap();
        let list = graph.resolve_relationship(listing, "hasPart");
        assert_eq!(single, list);
        assert_eq!(single.len(), 1);
        assert!(single[0].entity().is_some_and(|e| e.is_exactly("File")));
    }

    #[test]
    fn unknown_reference_stays_unresolved() {
        let graph = graph();
        let targets = graph.resolve_relationship(graph.root(), "conformsTo");
        assert_eq!(
            targets,
            vec![Relation::Unresolved("https://example.org/profile")]
        );
    }

    #[test]
    fn absent_property_is_empty() {
        let graph = graph();
        let file = graph.entity("data.csv").unwrap();
        assert!(graph.resolve_relationship(file, "hasPart").is_empty());
    }

    #[test]
    fn keeps_descriptor_order() {
        let graph = graph();
        let ids: Vec<_> = graph.all_entities().iter().map(Entity::id).collect();
        assert_eq!(ids, vec!["./", "data.csv", "listing"]);
    }

    #[test]
    fn inline_entities_are_reachable_by_id() {
        let graph = EntityGraph::from_json_ld(&json!({
            "@graph": [
                {
                    "@id": "./",
                    "@type": "Dataset",
                    "hasPart": [{"@id": "#frag", "@type": "RepositoryObject"}]
                },
                {"@id": "sample-001", "@type": "RepositoryObject", "hasPart": [{"@id": "#frag"}]}
            ]
        }))
        .unwrap();
        let sample = graph.entity("sample-001").unwrap();
        let parts = graph.resolve_relationship(sample, "hasPart");
        assert_eq!(parts.len(), 1);
        assert!(parts[0].entity().is_some_and(|e| e.is_exactly("RepositoryObject")));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn top_level_entity_shadows_inline_copy() {
        let graph = EntityGraph::from_json_ld(&json!({
            "@graph": [
                {"@id": "./", "@type": "Dataset", "name": "crate"},
                {"@id": "#frag", "@type": "RepositoryObject", "hasPart": {"@id": "./", "@type": "Dataset"}}
            ]
        }))
        .unwrap();
        assert!(graph.entity("./").unwrap().get("name").is_some());
    }

    #[test]
    fn conflicting_inline_definitions_are_rejected() {
        let err = EntityGraph::from_json_ld(&json!({
            "@graph": [
                {
                    "@id": "./",
                    "@type": "Dataset",
                    "hasPart": [
                        {"@id": "#frag", "@type": "RepositoryObject"},
                        {"@id": "#frag", "@type": "Dataset"}
                    ]
                }
            ]
        }))
        .unwrap_err();
        assert!(matches!(err, ImportError::InvalidArchive(message) if message.contains("#frag")));
    }

    #[test]
    fn rejects_missing_root() {
        let err = EntityGraph::from_json_ld(&json!({"@graph": [{"@id": "a", "@type": "File"}]}))
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidArchive(_)));
    }
}
