//! Discovery of the RepositoryObject hierarchy inside a crate.
//!
//! A crate may carry several entities typed `RepositoryObject`. The base is
//! one whose id is not a fragment. When the base lists a fragment
//! (`#...`) RepositoryObject among its parts, and that fragment in turn
//! claims the root dataset `./` as a part, the fragment is the nested
//! object that should receive the upload.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::entity::{Entity, ROOT_ID, Relation};
use crate::error::ImportError;
use crate::graph::EntityGraph;

pub const REPOSITORY_OBJECT: &str = "RepositoryObject";

/// What to do when the scan finds more than one base or child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Keep the last match and log a warning.
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepositoryObjectPair<'g> {
    pub base: &'g Entity,
    pub child: Option<&'g Entity>,
}

impl<'g> RepositoryObjectPair<'g> {
    /// The entity that will receive the crate's files.
    pub fn upload_target(&self) -> &'g Entity {
        self.child.unwrap_or(self.base)
    }
}

#[derive(Default)]
struct Scan<'g> {
    bases: Vec<&'g Entity>,
    children: Vec<&'g Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryObjectResolver {
    policy: AmbiguityPolicy,
}

impl RepositoryObjectResolver {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self { policy }
    }

    /// Scan every base candidate in descriptor order. Later bases replace
    /// earlier ones and later confirmed children replace earlier ones, so
    /// the pair is the last base together with the last confirmed child.
    pub fn resolve<'g>(
        &self,
        graph: &'g EntityGraph,
    ) -> Result<RepositoryObjectPair<'g>, ImportError> {
        let scan = graph
            .all_entities()
            .iter()
            .filter(|entity| is_base_candidate(entity))
            .fold(Scan::default(), |mut scan, base| {
                scan.children.extend(confirmed_children(graph, base));
                scan.bases.push(base);
                scan
            });

        let Some(&base) = scan.bases.last() else {
            return Err(ImportError::RepositoryObjectNotFound);
        };
        let pair = RepositoryObjectPair {
            base,
            child: scan.children.last().copied(),
        };

        if scan.bases.len() > 1 || scan.children.len() > 1 {
            let bases: Vec<String> = scan.bases.iter().map(|e| e.id().to_string()).collect();
            let children: Vec<String> =
                scan.children.iter().map(|e| e.id().to_string()).collect();
            match self.policy {
                AmbiguityPolicy::Error => {
                    return Err(ImportError::AmbiguousRepositoryObject { bases, children });
                }
                AmbiguityPolicy::Warn => warn!(
                    bases = ?bases,
                    children = ?children,
                    selected = pair.upload_target().id(),
                    "multiple RepositoryObject candidates; using the last one"
                ),
            }
        }

        match pair.child {
            Some(child) => info!(
                base = pair.base.id(),
                child = child.id(),
                "continuing with child RepositoryObject"
            ),
            None => info!(base = pair.base.id(), "continuing with base RepositoryObject"),
        }
        Ok(pair)
    }
}

fn is_base_candidate(entity: &Entity) -> bool {
    entity.has_type(REPOSITORY_OBJECT) && !entity.is_fragment()
}

/// Fragment RepositoryObjects among `base`'s parts that contain the root
/// dataset.
fn confirmed_children<'g>(
    graph: &'g EntityGraph,
    base: &'g Entity,
) -> impl Iterator<Item = &'g Entity> {
    graph
        .resolve_relationship(base, "hasPart")
        .into_iter()
        .filter_map(|part| part.entity())
        .filter(|part| part.is_fragment() && part.is_exactly(REPOSITORY_OBJECT))
        .filter(move |part| contains_root_dataset(graph, part))
}

fn contains_root_dataset(graph: &EntityGraph, part: &Entity) -> bool {
    graph
        .resolve_relationship(part, "hasPart")
        .iter()
        .filter_map(Relation::entity)
        .any(|sub| sub.id() == ROOT_ID && sub.is_exactly("Dataset"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::entity::PropertyValue;

    fn root() -> Entity {
        Entity::new("./", &["Dataset"])
    }

    fn fragment(id: &str, with_root: bool) -> Entity {
        let mut frag = Entity::new(id, &[REPOSITORY_OBJECT]);
        if with_root {
            frag = frag.with_property(
                "hasPart",
                PropertyValue::List(vec![PropertyValue::reference("./")]),
            );
        }
        frag
    }

    #[test]
    fn single_base_without_children() {
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT]);
        let graph = EntityGraph::from_entities(vec![root(), base]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.base.id(), "sample-001");
        assert!(pair.child.is_none());
    }

    #[test]
    fn fragment_with_root_dataset_becomes_child() {
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#frag"));
        let graph =
            EntityGraph::from_entities(vec![root(), base, fragment("#frag", true)]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.base.id(), "sample-001");
        assert_eq!(pair.child.map(Entity::id), Some("#frag"));
        assert_eq!(pair.upload_target().id(), "#frag");
    }

    #[test]
    fn inline_fragment_is_inspected() {
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT]).with_property(
            "hasPart",
            PropertyValue::inline(fragment("#inline", true)),
        );
        let graph = EntityGraph::from_entities(vec![root(), base]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.child.map(Entity::id), Some("#inline"));
    }

    #[test]
    fn fragment_without_root_dataset_is_ignored() {
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#frag"));
        let graph =
            EntityGraph::from_entities(vec![root(), base, fragment("#frag", false)]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert!(pair.child.is_none());
    }

    #[test]
    fn unresolved_parts_are_skipped() {
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#missing"));
        let graph = EntityGraph::from_entities(vec![root(), base]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert!(pair.child.is_none());
    }

    #[test]
    fn multi_typed_fragment_is_not_a_child() {
        let frag = Entity::new("#frag", &["Dataset", REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("./"));
        let base = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#frag"));
        let graph = EntityGraph::from_entities(vec![root(), base, frag]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert!(pair.child.is_none());
    }

    #[test]
    fn no_repository_object_fails() {
        let graph = EntityGraph::from_entities(vec![root(), fragment("#frag", true)]).unwrap();
        assert_matches!(
            RepositoryObjectResolver::default().resolve(&graph),
            Err(ImportError::RepositoryObjectNotFound)
        );
    }

    #[test]
    fn last_base_wins_by_default() {
        let first = Entity::new("sample-001", &[REPOSITORY_OBJECT]);
        let second = Entity::new("sample-002", &[REPOSITORY_OBJECT]);
        let graph = EntityGraph::from_entities(vec![root(), first, second]).unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.base.id(), "sample-002");
    }

    #[test]
    fn later_base_replaces_earlier_one_but_child_is_kept() {
        let first = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#frag"));
        let second = Entity::new("sample-002", &[REPOSITORY_OBJECT]);
        let graph =
            EntityGraph::from_entities(vec![root(), fragment("#frag", true), first, second])
                .unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.base.id(), "sample-002");
        assert_eq!(pair.child.map(Entity::id), Some("#frag"));
    }

    #[test]
    fn last_confirmed_child_wins() {
        let first = Entity::new("sample-001", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#a"));
        let second = Entity::new("sample-002", &[REPOSITORY_OBJECT])
            .with_property("hasPart", PropertyValue::reference("#b"));
        let third = Entity::new("sample-003", &[REPOSITORY_OBJECT]);
        let graph = EntityGraph::from_entities(vec![
            root(),
            first,
            second,
            third,
            fragment("#a", true),
            fragment("#b", true),
        ])
        .unwrap();
        let pair = RepositoryObjectResolver::default().resolve(&graph).unwrap();
        assert_eq!(pair.base.id(), "sample-003");
        assert_eq!(pair.child.map(Entity::id), Some("#b"));
    }

    #[test]
    fn strict_policy_rejects_multiple_bases() {
        let first = Entity::new("sample-001", &[REPOSITORY_OBJECT]);
        let second = Entity::new("sample-002", &[REPOSITORY_OBJECT]);
        let graph = EntityGraph::from_entities(vec![root(), first, second]).unwrap();
        let err = RepositoryObjectResolver::new(AmbiguityPolicy::Error)
            .resolve(&graph)
            .unwrap_err();
        assert_matches!(
            err,
            ImportError::AmbiguousRepositoryObject { bases, .. } if bases == ["sample-001", "sample-002"]
        );
    }
}
