// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A wrapper around a `typed_generational_arena::Arena` that also provides lookup by name.
//!
//! Nodes, interfaces, unions and relationship-property types are stored in `MappedArena`s. Fields
//! refer to their targets through the arena index, while incoming requests (and the model builder,
//! while linking) look types up by their name.

use std::{collections::HashMap, ops};

use serde::{Deserialize, Serialize};

use typed_generational_arena::{Arena, IgnoreGeneration, Index};

pub type SerializableSlab<T> = Arena<T, usize, IgnoreGeneration>;
pub type SerializableSlabIndex<T> = Index<T, usize, IgnoreGeneration>;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MappedArena<V> {
    values: SerializableSlab<V>,
    map: HashMap<String, SerializableSlabIndex<V>>,
}

impl<V> MappedArena<V> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get_id(&self, key: &str) -> Option<SerializableSlabIndex<V>> {
        self.map.get(key).copied()
    }

    pub fn get_by_key(&self, key: &str) -> Option<&V> {
        self.get_id(key).map(|id| &self[id])
    }

    /// Add a value under `key`. If the key is already present, the existing index is returned and
    /// `value` is dropped.
    pub fn add(&mut self, key: &str, value: V) -> SerializableSlabIndex<V> {
        if let Some(existing) = self.get_id(key) {
            return existing;
        }

        let id = self.values.insert(value);
        self.map.insert(key.to_string(), id);
        id
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> typed_generational_arena::Iter<'_, V, usize, IgnoreGeneration> {
        self.values.iter()
    }
}

impl<V> Default for MappedArena<V> {
    fn default() -> Self {
        MappedArena {
            values: SerializableSlab::new(),
            map: HashMap::default(),
        }
    }
}

impl<V> ops::Index<SerializableSlabIndex<V>> for MappedArena<V> {
    type Output = V;

    #[inline]
    fn index(&self, id: SerializableSlabIndex<V>) -> &V {
        &self.values[id]
    }
}

impl<V> ops::IndexMut<SerializableSlabIndex<V>> for MappedArena<V> {
    #[inline]
    fn index_mut(&mut self, id: SerializableSlabIndex<V>) -> &mut V {
        &mut self.values[id]
    }
}
