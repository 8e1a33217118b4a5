use std::fmt;

use serde_json::{Map, Value};

use crate::error::ImportError;

pub const ROOT_ID: &str = "./";

/// A typed, identified node of the crate's metadata graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: String,
    types: Vec<String>,
    properties: Vec<(String, PropertyValue)>,
}

/// A property value as it appears in the JSON-LD node object.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Literal(Value),
    Reference(String),
    Inline(Box<Entity>),
    List(Vec<PropertyValue>),
}

/// One element of a relationship after single values have been normalized
/// into a sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relation<'g> {
    Resolved(&'g Entity),
    Unresolved(&'g str),
}

impl<'g> Relation<'g> {
    pub fn entity(&self) -> Option<&'g Entity> {
        match self {
            Relation::Resolved(entity) => Some(entity),
            Relation::Unresolved(_) => None,
        }
    }

    pub fn id(&self) -> &'g str {
        match self {
            Relation::Resolved(entity) => entity.id(),
            Relation::Unresolved(id) => id,
        }
    }

    /// Node label used by the preview: `"<types>: <id>"`, or the bare
    /// reference string when the target is unknown.
    pub fn label(&self) -> String {
        match self {
            Relation::Resolved(entity) => entity.label(),
            Relation::Unresolved(id) => (*id).to_string(),
        }
    }
}

impl Entity {
    pub fn new(id: impl Into<String>, types: &[&str]) -> Self {
        Self {
            id: id.into(),
            types: types.iter().map(|t| t.to_string()).collect(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        let name = name.into();
        self.properties.retain(|(key, _)| *key != name);
        self.properties.push((name, value));
        self
    }

    /// Parse a JSON-LD node object. Nested node objects carrying more than
    /// an `@id` become inline entities.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, ImportError> {
        let id = match object.get("@id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => {
                return Err(ImportError::InvalidArchive(format!(
                    "@id must be a string, got {other}"
                )));
            }
            None => {
                return Err(ImportError::InvalidArchive(
                    "entity without @id".to_string(),
                ));
            }
        };

        let types = match object.get("@type") {
            None => Vec::new(),
            Some(Value::String(single)) => vec![single.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ImportError::InvalidArchive(format!("non-string @type on {id}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(ImportError::InvalidArchive(format!(
                    "invalid @type on {id}: {other}"
                )));
            }
        };

        let properties = object
            .iter()
            .filter(|(key, _)| key.as_str() != "@id" && key.as_str() != "@type")
            .map(|(key, value)| Ok((key.clone(), PropertyValue::from_json(value)?)))
            .collect::<Result<Vec<_>, ImportError>>()?;

        Ok(Self {
            id,
            types,
            properties,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }

    /// True when `type_name` is the entity's only type tag.
    pub fn is_exactly(&self, type_name: &str) -> bool {
        matches!(self.types.as_slice(), [only] if only == type_name)
    }

    pub fn is_fragment(&self) -> bool {
        self.id.starts_with('#')
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    pub fn type_label(&self) -> String {
        self.types.join(", ")
    }

    pub fn label(&self) -> String {
        format!("{}: {}", self.type_label(), self.id)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.id, self.type_label())
    }
}

impl PropertyValue {
    pub fn from_json(value: &Value) -> Result<Self, ImportError> {
        match value {
            Value::Array(items) => Ok(PropertyValue::List(
                items
                    .iter()
                    .map(PropertyValue::from_json)
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Value::Object(object) => match object.get("@id") {
                Some(Value::String(id)) if object.len() == 1 => {
                    Ok(PropertyValue::Reference(id.clone()))
                }
                Some(_) => Ok(PropertyValue::Inline(Box::new(Entity::from_json(object)?))),
                None => Ok(PropertyValue::Literal(value.clone())),
            },
            other => Ok(PropertyValue::Literal(other.clone())),
        }
    }

    pub fn reference(id: impl Into<String>) -> Self {
        PropertyValue::Reference(id.into())
    }

    pub fn inline(entity: Entity) -> Self {
        PropertyValue::Inline(Box::new(entity))
    }
}
