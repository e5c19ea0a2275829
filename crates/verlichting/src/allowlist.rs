//! Ordered allow-lists of exposed entity ids.
//!
//! An allow-list does double duty: membership decides which entities may be
//! listed and commanded, and the position of an id decides where it appears
//! in a listing.

use std::collections::HashMap;

use crate::entity::HasId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl AllowList {
    /// Build an allow-list. Every id may appear only once.
    pub fn new<I, S>(ids: I) -> Result<Self, DuplicateEntry>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();

        for id in ids {
            let id = id.into();
            if list.positions.contains_key(&id) {
                return Err(DuplicateEntry(id));
            }
            list.positions.insert(id.clone(), list.ids.len());
            list.ids.push(id);
        }

        Ok(list)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Keep the allowed entities, ordered by their position in the list.
    ///
    /// Allowed ids missing from `entities` are simply absent from the result.
    /// If `entities` holds the same id twice only the first one is kept.
    pub fn filter<T, I>(&self, entities: I) -> Vec<T>
    where
        T: HasId,
        I: IntoIterator<Item = T>,
    {
        let mut kept: Vec<(usize, T)> = entities
            .into_iter()
            .filter_map(|entity| self.position(entity.id()).map(|pos| (pos, entity)))
            .collect();

        // Stable, so dedup keeps the first occurrence.
        kept.sort_by_key(|(pos, _)| *pos);
        kept.dedup_by_key(|(pos, _)| *pos);

        kept.into_iter().map(|(_, entity)| entity).collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is listed more than once")]
pub struct DuplicateEntry(pub String);
