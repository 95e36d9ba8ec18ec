//! Explicit store for modeling sessions opened against a metamodel.
//!
//! No tool backend in this crate hosts sessions; the store is the building
//! block for an EMF tool server and is exercised on its own.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Session {0} not found. Start a session first.")]
    NotFound(String),

    #[error("class {class} is not part of the metamodel of session {session}")]
    UnknownClass { session: String, class: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metamodel {
    pub name: String,
    #[serde(default)]
    pub classes: Vec<ClassDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Class,
    Feature,
}

/// Something a session can act on. Features are keyed as `Class.feature`.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub kind: EntityKind,
    pub owner: Option<String>,
    pub name: String,
}

/// Object ids as users type them: numeric when they parse, otherwise verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Index(i64),
    Name(String),
}

impl ObjectId {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        trimmed
            .parse::<i64>()
            .map(ObjectId::Index)
            .unwrap_or_else(|_| ObjectId::Name(trimmed.to_string()))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Index(i) => write!(f, "{i}"),
            ObjectId::Name(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub handle: SessionHandle,
    pub metamodel: Metamodel,
    capabilities: BTreeMap<(EntityKind, String), Capability>,
    objects: BTreeMap<String, Vec<ObjectId>>,
}

impl Session {
    fn new(handle: SessionHandle, metamodel: Metamodel) -> Self {
        let mut capabilities = BTreeMap::new();
        for class in &metamodel.classes {
            capabilities.insert(
                (EntityKind::Class, class.name.clone()),
                Capability {
                    kind: EntityKind::Class,
                    owner: None,
                    name: class.name.clone(),
                },
            );
            for feature in &class.features {
                capabilities.insert(
                    (EntityKind::Feature, format!("{}.{feature}", class.name)),
                    Capability {
                        kind: EntityKind::Feature,
                        owner: Some(class.name.clone()),
                        name: feature.clone(),
                    },
                );
            }
        }

        Self {
            handle,
            metamodel,
            capabilities,
            objects: BTreeMap::new(),
        }
    }

    pub fn capability(&self, kind: EntityKind, name: &str) -> Option<&Capability> {
        self.capabilities.get(&(kind, name.to_string()))
    }

    pub fn capabilities(&self, kind: EntityKind) -> impl Iterator<Item = &Capability> {
        self.capabilities
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|(_, capability)| capability)
    }

    pub fn objects(&self, class: &str) -> &[ObjectId] {
        self.objects.get(class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_objects(&self) -> &BTreeMap<String, Vec<ObjectId>> {
        &self.objects
    }
}

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionHandle, Session>,
    next_id: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, metamodel: Metamodel) -> SessionHandle {
        self.next_id += 1;
        let handle = SessionHandle(format!("session-{}", self.next_id));
        debug!(session = %handle, metamodel = %metamodel.name, "session started");
        self.sessions
            .insert(handle.clone(), Session::new(handle.clone(), metamodel));
        handle
    }

    pub fn get(&self, handle: &SessionHandle) -> Result<&Session, SessionError> {
        self.sessions
            .get(handle)
            .ok_or_else(|| SessionError::NotFound(handle.to_string()))
    }

    fn get_mut(&mut self, handle: &SessionHandle) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(handle)
            .ok_or_else(|| SessionError::NotFound(handle.to_string()))
    }

    pub fn destroy(&mut self, handle: &SessionHandle) -> Result<Session, SessionError> {
        let session = self
            .sessions
            .remove(handle)
            .ok_or_else(|| SessionError::NotFound(handle.to_string()))?;
        debug!(session = %handle, "session closed");
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn add_object(&mut self, handle: &SessionHandle, class: &str, id: ObjectId) -> Result<(), SessionError> {
        let session = self.get_mut(handle)?;
        if session.capability(EntityKind::Class, class).is_none() {
            return Err(SessionError::UnknownClass {
                session: handle.to_string(),
                class: class.to_string(),
            });
        }
        session.objects.entry(class.to_string()).or_default().push(id);
        Ok(())
    }

    /// Returns whether the object was tracked.
    pub fn remove_object(&mut self, handle: &SessionHandle, class: &str, id: &ObjectId) -> Result<bool, SessionError> {
        let session = self.get_mut(handle)?;
        let Some(ids) = session.objects.get_mut(class) else {
            return Ok(false);
        };
        match ids.iter().position(|tracked| tracked == id) {
            Some(index) => {
                ids.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn objects(&self, handle: &SessionHandle, class: &str) -> Result<Vec<ObjectId>, SessionError> {
        Ok(self.get(handle)?.objects(class).to_vec())
    }
}
