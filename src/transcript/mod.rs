//! Ordered, id-addressable conversation log.
//!
//! A [`Transcript`] stores its elements in a growth-only vector and keeps a
//! map from [`TranscriptElementId`] to the element's current position. Every
//! mutating entry point goes through [`Transcript::reindex_from`] so that the
//! map never holds stale or missing entries:
//!
//! - append: O(1) amortized
//! - insert / remove at `i`: O(n), every element after `i` is re-indexed
//! - lookup by id: O(1)
//!
//! The persisted form is the ordered element list. The index is rebuilt on
//! load and a payload containing the same id twice is rejected.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::types::{Message, Role};

/// Opaque, unique identifier of a transcript element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptElementId(Uuid);

impl TranscriptElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TranscriptElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TranscriptElementId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for TranscriptElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message plus its stable identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptElement {
    pub id: TranscriptElementId,
    pub message: Message,
}

impl TranscriptElement {
    /// Wrap a message with a freshly generated id.
    pub fn new(message: Message) -> Self {
        Self {
            id: TranscriptElementId::new(),
            message,
        }
    }

    pub fn with_id(id: TranscriptElementId, message: Message) -> Self {
        Self { id, message }
    }
}

/// Ordered conversation log with O(1) lookup by element id.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    elements: Vec<TranscriptElement>,
    positions: HashMap<TranscriptElementId, usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an ordered element list, rejecting duplicate ids.
    pub fn from_elements(elements: Vec<TranscriptElement>) -> Result<Self, DuplicateElementId> {
        let mut positions = HashMap::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            if positions.insert(element.id, index).is_some() {
                return Err(DuplicateElementId(element.id));
            }
        }
        Ok(Self {
            elements,
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[TranscriptElement] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptElement> {
        self.elements.iter()
    }

    /// Messages in order, as sent to the backend.
    pub fn messages(&self) -> Vec<Message> {
        self.elements.iter().map(|e| e.message.clone()).collect()
    }

    pub fn contains(&self, id: TranscriptElementId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Append an element.
    ///
    /// # Panics
    ///
    /// Panics if an element with the same id is already present.
    pub fn append(&mut self, element: TranscriptElement) {
        self.assert_unique(element.id, None);
        self.positions.insert(element.id, self.elements.len());
        self.elements.push(element);
    }

    /// Append a message under a fresh id and return that id.
    pub fn push_message(&mut self, message: Message) -> TranscriptElementId {
        let element = TranscriptElement::new(message);
        let id = element.id;
        self.append(element);
        id
    }

    /// Insert an element at `index`, shifting later elements back.
    ///
    /// # Panics
    ///
    /// Panics if `index > len` or if the id is already present.
    pub fn insert(&mut self, element: TranscriptElement, index: usize) {
        assert!(
            index <= self.elements.len(),
            "insert index {index} out of bounds (len {})",
            self.elements.len()
        );
        self.assert_unique(element.id, None);
        self.elements.insert(index, element);
        self.reindex_from(index);
    }

    /// Remove the element with `id`, returning it if present.
    pub fn remove_element(&mut self, id: TranscriptElementId) -> Option<TranscriptElement> {
        let index = *self.positions.get(&id)?;
        Some(self.remove_element_at(index))
    }

    /// Remove the element at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove_element_at(&mut self, index: usize) -> TranscriptElement {
        let removed = self.elements.remove(index);
        self.positions.remove(&removed.id);
        self.reindex_from(index);
        removed
    }

    pub fn get(&self, index: usize) -> Option<&TranscriptElement> {
        self.elements.get(index)
    }

    /// Lookup by id.
    pub fn element(&self, id: TranscriptElementId) -> Option<&TranscriptElement> {
        self.positions.get(&id).map(|&index| &self.elements[index])
    }

    pub fn position(&self, id: TranscriptElementId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Mutable access to a message. Identity cannot change through this.
    pub fn message_mut(&mut self, id: TranscriptElementId) -> Option<&mut Message> {
        let index = *self.positions.get(&id)?;
        Some(&mut self.elements[index].message)
    }

    /// Replace the element at `index`, returning the previous one.
    ///
    /// The new element may carry a different id as long as that id is not
    /// already used by another element.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the new id already belongs to a
    /// different element.
    pub fn set(&mut self, index: usize, element: TranscriptElement) -> TranscriptElement {
        assert!(
            index < self.elements.len(),
            "set index {index} out of bounds (len {})",
            self.elements.len()
        );
        self.assert_unique(element.id, Some(index));
        let previous = std::mem::replace(&mut self.elements[index], element);
        self.positions.remove(&previous.id);
        self.positions.insert(self.elements[index].id, index);
        previous
    }

    /// Elements with the given role, in order.
    pub fn filter(&self, role: Role) -> Vec<&TranscriptElement> {
        self.elements
            .iter()
            .filter(|e| e.message.role == role)
            .collect()
    }

    pub fn first_message(&self, role: Role) -> Option<&Message> {
        self.elements
            .iter()
            .find(|e| e.message.role == role)
            .map(|e| &e.message)
    }

    pub fn last_message(&self, role: Role) -> Option<&Message> {
        self.elements
            .iter()
            .rev()
            .find(|e| e.message.role == role)
            .map(|e| &e.message)
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.positions.clear();
    }

    fn reindex_from(&mut self, start: usize) {
        for (offset, element) in self.elements[start..].iter().enumerate() {
            self.positions.insert(element.id, start + offset);
        }
    }

    fn assert_unique(&self, id: TranscriptElementId, allowed_at: Option<usize>) {
        if let Some(&existing) = self.positions.get(&id) {
            assert!(
                Some(existing) == allowed_at,
                "transcript element id {id} already present at index {existing}"
            );
        }
    }
}

impl Index<usize> for Transcript {
    type Output = TranscriptElement;

    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

impl Index<TranscriptElementId> for Transcript {
    type Output = TranscriptElement;

    fn index(&self, id: TranscriptElementId) -> &Self::Output {
        match self.element(id) {
            Some(element) => element,
            None => panic!("no transcript element with id {id}"),
        }
    }
}

impl PartialEq for Transcript {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptElement;
    type IntoIter = std::slice::Iter<'a, TranscriptElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// A persisted transcript listed the same element id twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("duplicate transcript element id {0}")]
pub struct DuplicateElementId(pub TranscriptElementId);

impl Serialize for Transcript {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.elements.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<TranscriptElement>::deserialize(deserializer)?;
        Transcript::from_elements(elements).map_err(serde::de::Error::custom)
    }
}
