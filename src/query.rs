//! Query construction, canonicalization and incremental maintenance.
//!
//! Each query's membership is re-evaluated against an entity's current
//! component set on every attach/detach, rather than recomputed from
//! scratch on read. Component type identity is an unbounded id rather
//! than a fixed-width bitmask, so the number of registered component
//! types is not capped.

use std::collections::{HashMap, HashSet};

use crate::component::ComponentTypeId;
use crate::entity::EntityHandle;
use crate::error::{EcsError, Result};
use crate::event::EventBus;

/// Tags a component type for the exclusion side of a `get_query([...])` call:
/// `world.get_query(&[Include(a), Not(b).into()])`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Not(pub ComponentTypeId);

/// One entry in a `getQuery([...])` call: either a bare component type
/// (inclusion) or a [`Not`]-wrapped one (exclusion).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTerm {
    Include(ComponentTypeId),
    Exclude(ComponentTypeId),
}

impl From<ComponentTypeId> for QueryTerm {
    fn from(id: ComponentTypeId) -> Self {
        QueryTerm::Include(id)
    }
}

impl From<Not> for QueryTerm {
    fn from(not: Not) -> Self {
        QueryTerm::Exclude(not.0)
    }
}

/// Splits a mixed `[C..., Not(C)...]` spec into separate inclusion and
/// exclusion id lists.
pub fn split_terms(terms: &[QueryTerm]) -> (Vec<ComponentTypeId>, Vec<ComponentTypeId>) {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for term in terms {
        match term {
            QueryTerm::Include(id) => include.push(*id),
            QueryTerm::Exclude(id) => exclude.push(*id),
        }
    }
    (include, exclude)
}

/// Builds the canonical query key: component names sorted lexicographically
/// and joined with `-`, exclusions prefixed with `!`. Two requests with the
/// same inclusion/exclusion sets, regardless of the order they were written
/// in, always produce the same key and therefore share one [`Query`].
pub fn canonical_key(
    include: &[ComponentTypeId],
    exclude: &[ComponentTypeId],
    names: &HashMap<ComponentTypeId, String>,
) -> String {
    let mut parts: Vec<String> = include
        .iter()
        .map(|id| names.get(id).cloned().unwrap_or_default())
        .collect();
    parts.extend(
        exclude
            .iter()
            .map(|id| format!("!{}", names.get(id).cloned().unwrap_or_default())),
    );
    parts.sort();
    parts.join("-")
}

/// A live membership set for one inclusion/exclusion combination, with
/// optional reactive add/remove/change notification.
pub struct Query {
    pub canonical_key: String,
    pub include: Vec<ComponentTypeId>,
    pub exclude: Vec<ComponentTypeId>,
    pub reactive: bool,
    entities: Vec<EntityHandle>,
    members: HashSet<EntityHandle>,
    changed_this_tick: HashSet<EntityHandle>,
    pub added: EventBus<EntityHandle>,
    pub removed: EventBus<EntityHandle>,
    pub changed: EventBus<EntityHandle>,
}

impl Query {
    fn new(
        canonical_key: String,
        include: Vec<ComponentTypeId>,
        exclude: Vec<ComponentTypeId>,
        reactive: bool,
    ) -> Self {
        Query {
            canonical_key,
            include,
            exclude,
            reactive,
            entities: Vec::new(),
            members: HashSet::new(),
            changed_this_tick: HashSet::new(),
            added: EventBus::new("added"),
            removed: EventBus::new("removed"),
            changed: EventBus::new("changed"),
        }
    }

    pub fn entities(&self) -> &[EntityHandle] {
        &self.entities
    }

    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.members.contains(&entity)
    }

    fn matches(&self, components: &HashSet<ComponentTypeId>) -> bool {
        self.include.iter().all(|c| components.contains(c))
            && self.exclude.iter().all(|c| !components.contains(c))
    }

    fn add_member(&mut self, entity: EntityHandle) {
        if self.members.insert(entity) {
            self.entities.push(entity);
            if self.reactive {
                self.added.dispatch(&entity);
            }
        }
    }

    /// Adds `entity` to membership without dispatching `added`, even if the
    /// query is reactive. Used only to seed a freshly created query against
    /// entities that already exist.
    fn seed_member(&mut self, entity: EntityHandle) {
        if self.members.insert(entity) {
            self.entities.push(entity);
        }
    }

    fn remove_member(&mut self, entity: EntityHandle) {
        if self.members.remove(&entity) {
            self.entities.retain(|e| *e != entity);
            self.changed_this_tick.remove(&entity);
            if self.reactive {
                self.removed.dispatch(&entity);
            }
        }
    }

    /// Dispatches `changed` at most once per entity per tick, and only when
    /// the type that changed is part of this query's inclusion set: a field
    /// write only reaches listeners the first time it happens to a given
    /// entity between two `clear_tick_dedup` calls, not once per field
    /// write, and never for a type this query doesn't care about.
    fn notify_changed(&mut self, entity: EntityHandle, changed_type: ComponentTypeId) {
        if !self.reactive || !self.members.contains(&entity) {
            return;
        }
        if !self.include.contains(&changed_type) {
            return;
        }
        if self.changed_this_tick.insert(entity) {
            self.changed.dispatch(&entity);
        }
    }

    fn clear_tick_dedup(&mut self) {
        self.changed_this_tick.clear();
    }
}

/// Owns every canonicalized [`Query`] and incrementally maintains
/// membership as components are attached, detached or mutated.
pub struct QueryIndex {
    queries: HashMap<String, Query>,
}

impl QueryIndex {
    pub fn new() -> Self {
        QueryIndex {
            queries: HashMap::new(),
        }
    }

    /// Returns the shared `Query` for this inclusion/exclusion set, creating
    /// it if it doesn't exist yet. `reactive` is sticky: once any caller
    /// asks for reactive notifications on a key, every holder of that key
    /// gets them. The boolean result says whether this call created the
    /// query (the caller must then seed its membership from existing
    /// entities; a fresh query otherwise starts empty until the next
    /// structural change).
    pub fn get_or_create(
        &mut self,
        include: Vec<ComponentTypeId>,
        exclude: Vec<ComponentTypeId>,
        reactive: bool,
        names: &HashMap<ComponentTypeId, String>,
    ) -> Result<(&mut Query, bool)> {
        if include.is_empty() {
            return Err(EcsError::EmptyInclusion);
        }
        let key = canonical_key(&include, &exclude, names);
        let mut created = false;
        let query = self.queries.entry(key.clone()).or_insert_with(|| {
            created = true;
            Query::new(key, include, exclude, reactive)
        });
        if reactive {
            query.reactive = true;
        }
        Ok((query, created))
    }

    /// Silently adds `entity` to `key`'s membership if it matches, without
    /// dispatching `added`. Used only to seed a freshly created query
    /// against entities that already exist.
    pub fn seed(&mut self, key: &str, entity: EntityHandle, components: &HashSet<ComponentTypeId>) {
        if let Some(query) = self.queries.get_mut(key) {
            if query.matches(components) {
                query.seed_member(entity);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Query> {
        self.queries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Query> {
        self.queries.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Re-evaluates every query's membership for `entity` against its
    /// current component set. Called after any component attach/detach.
    pub fn reconcile(&mut self, entity: EntityHandle, components: &HashSet<ComponentTypeId>) {
        for query in self.queries.values_mut() {
            let now_matches = query.matches(components);
            let was_member = query.contains(entity);
            if now_matches && !was_member {
                query.add_member(entity);
            } else if !now_matches && was_member {
                query.remove_member(entity);
            }
        }
    }

    /// Reports a write on `entity`'s `changed_type` component to every query
    /// that includes that type and currently holds the entity (subject to
    /// each query's own per-tick dedup window).
    pub fn notify_changed(&mut self, entity: EntityHandle, changed_type: ComponentTypeId) {
        for query in self.queries.values_mut() {
            query.notify_changed(entity, changed_type);
        }
    }

    /// Drops `entity` from every query's membership (used when an entity
    /// finalizes to `Dead`).
    pub fn remove_entity(&mut self, entity: EntityHandle) {
        for query in self.queries.values_mut() {
            query.remove_member(entity);
        }
    }

    /// Clears every query's per-tick `changed` dedup window. Called once at
    /// the end of each `World::execute` tick.
    pub fn clear_tick_dedup(&mut self) {
        for query in self.queries.values_mut() {
            query.clear_tick_dedup();
        }
    }
}

impl Default for QueryIndex {
    fn default() -> Self {
        Self::new()
    }
}
