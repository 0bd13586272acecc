//! Entity arena and lifecycle state machine.
//!
//! A generational freelist arena backs entity storage: slots are reused
//! once freed, with a bumped generation so stale handles fail lookups.
//! Lifecycle follows `detached -> active -> removed -> dead`; the arena
//! slot itself stays an index + generation pair used only internally,
//! while the stable public identity is an RFC 4122 v4 UUID.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::component::{ComponentInstance, ComponentTypeId};
use crate::error::{EcsError, Result};

/// Internal handle into the entity arena: stable across a slot's lifetime,
/// reused (with a bumped generation) once the slot is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Detached,
    Active,
    Removed,
    Dead,
}

/// Everything tracked about one entity slot.
pub struct EntityRecord {
    pub uuid: Uuid,
    pub state: EntityState,
    components: HashMap<ComponentTypeId, ComponentInstance>,
    /// Components detached from the live set by a deferred `remove_component`
    /// but not yet disposed back to their pool. `removed_component` reads
    /// from here.
    pending: HashMap<ComponentTypeId, ComponentInstance>,
    /// Canonical keys of every query this entity currently satisfies,
    /// maintained incrementally by `query::QueryIndex`.
    pub queries: HashSet<String>,
    /// Count of attached components whose type is `is_system_state`. While
    /// this is nonzero a `Removed` entity is a ghost: its other storage
    /// is gone but it is not yet `Dead`.
    pub system_state_count: u32,
}

impl EntityRecord {
    fn new(uuid: Uuid) -> Self {
        EntityRecord {
            uuid,
            state: EntityState::Detached,
            components: HashMap::new(),
            pending: HashMap::new(),
            queries: HashSet::new(),
            system_state_count: 0,
        }
    }

    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }

    pub fn component(&self, type_id: ComponentTypeId) -> Option<&ComponentInstance> {
        self.components.get(&type_id)
    }

    pub fn component_mut(&mut self, type_id: ComponentTypeId) -> Option<&mut ComponentInstance> {
        self.components.get_mut(&type_id)
    }

    pub fn component_type_ids(&self) -> impl Iterator<Item = &ComponentTypeId> {
        self.components.keys()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn is_pending_removal(&self, type_id: ComponentTypeId) -> bool {
        self.pending.contains_key(&type_id)
    }

    /// A component a deferred `remove_component` detached from the live map
    /// but whose instance hasn't been released to its pool yet.
    pub fn removed_component(&self, type_id: ComponentTypeId) -> Option<&ComponentInstance> {
        self.pending.get(&type_id)
    }

    pub(crate) fn insert_component(&mut self, type_id: ComponentTypeId, instance: ComponentInstance) {
        self.components.insert(type_id, instance);
    }

    pub(crate) fn take_component(&mut self, type_id: ComponentTypeId) -> Option<ComponentInstance> {
        self.components.remove(&type_id)
    }

    /// Moves a just-detached instance into the pending map. A no-op if this
    /// type is already pending, so an entity is never double-queued for
    /// the end-of-tick drain.
    pub(crate) fn move_to_pending(&mut self, type_id: ComponentTypeId, instance: ComponentInstance) {
        self.pending.entry(type_id).or_insert(instance);
    }

    /// Every component type still awaiting final disposal.
    pub(crate) fn pending_type_ids(&self) -> Vec<ComponentTypeId> {
        self.pending.keys().copied().collect()
    }

    /// Removes and returns a pending instance so it can be released to its
    /// pool (used by the end-of-tick drain and by an immediate finalize of
    /// a previously-deferred removal).
    pub(crate) fn take_pending(&mut self, type_id: ComponentTypeId) -> Option<ComponentInstance> {
        self.pending.remove(&type_id)
    }

    /// Renders the stable identity in uppercase, hyphenated `8-4-4-4-12` form.
    pub fn uuid_string(&self) -> String {
        self.uuid.to_string().to_uppercase()
    }
}

struct Slot {
    generation: u32,
    record: Option<EntityRecord>,
}

/// Owns every entity slot, the UUID index, and the lifecycle transitions.
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    uuid_index: HashMap<Uuid, EntityHandle>,
}

impl EntityArena {
    pub fn new() -> Self {
        EntityArena {
            slots: Vec::new(),
            free: Vec::new(),
            uuid_index: HashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        EntityArena {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            uuid_index: HashMap::with_capacity(capacity),
        }
    }

    /// Allocates a new slot in the `Detached` state and returns its handle.
    pub fn create_detached(&mut self) -> EntityHandle {
        let uuid = Uuid::new_v4();
        let record = EntityRecord::new(uuid);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.record = Some(record);
            EntityHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                record: Some(record),
            });
            EntityHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Transitions a `Detached` handle into `Active` and makes it reachable
    /// via `get_by_uuid`. A no-op (logged) if already active.
    pub fn activate(&mut self, handle: EntityHandle) {
        let uuid = match self.get(handle) {
            Some(record) if record.state == EntityState::Detached => record.uuid,
            _ => return,
        };
        if let Some(record) = self.get_mut(handle) {
            record.state = EntityState::Active;
        }
        self.uuid_index.insert(uuid, handle);
    }

    /// Convenience: allocate and immediately activate.
    pub fn create_active(&mut self) -> EntityHandle {
        let handle = self.create_detached();
        self.activate(handle);
        handle
    }

    fn slot(&self, handle: EntityHandle) -> Option<&Slot> {
        self.slots.get(handle.index as usize).filter(|slot| {
            slot.generation == handle.generation && slot.record.is_some()
        })
    }

    fn slot_mut(&mut self, handle: EntityHandle) -> Option<&mut Slot> {
        let index = handle.index as usize;
        match self.slots.get_mut(index) {
            Some(slot) if slot.generation == handle.generation && slot.record.is_some() => {
                Some(slot)
            }
            _ => None,
        }
    }

    pub fn get(&self, handle: EntityHandle) -> Option<&EntityRecord> {
        self.slot(handle).and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityRecord> {
        self.slot_mut(handle).and_then(|slot| slot.record.as_mut())
    }

    pub fn get_by_uuid(&self, uuid: &Uuid) -> Option<EntityHandle> {
        self.uuid_index.get(uuid).copied()
    }

    /// Marks an active entity `Removed`. If no system-state components are
    /// attached it is finalized to `Dead` and the slot is freed immediately;
    /// otherwise it becomes a ghost until its system-state components are
    /// individually removed (see `finalize_if_ghost_cleared`).
    pub fn dispose(&mut self, handle: EntityHandle) -> Result<()> {
        let record = self
            .get_mut(handle)
            .ok_or_else(|| EcsError::EntityNotFound(format!("{handle:?}")))?;
        if record.state != EntityState::Active {
            return Ok(());
        }
        record.state = EntityState::Removed;
        self.finalize_if_ghost_cleared(handle);
        Ok(())
    }

    /// Call after a system-state component is removed from a `Removed`
    /// entity: if the ghost count has reached zero, finishes the
    /// `Removed -> Dead` transition and frees the slot.
    pub fn finalize_if_ghost_cleared(&mut self, handle: EntityHandle) {
        let should_finalize = matches!(
            self.get(handle),
            Some(record) if record.state == EntityState::Removed && record.system_state_count == 0
        );
        if !should_finalize {
            return;
        }
        if let Some(record) = self.get(handle) {
            self.uuid_index.remove(&record.uuid);
        }
        if let Some(slot) = self.slots.get_mut(handle.index as usize) {
            slot.record = None;
            slot.generation = slot.generation.wrapping_add(1);
        }
        self.free.push(handle.index);
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entity handle currently in the `Active` state, in arena order.
    /// Used to silently seed a freshly created query against entities that
    /// already exist.
    pub fn active_handles(&self) -> Vec<EntityHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let record = slot.record.as_ref()?;
                if record.state == EntityState::Active {
                    Some(EntityHandle {
                        index: index as u32,
                        generation: slot.generation,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Default for EntityArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_entity_is_not_queryable_by_uuid() {
        let mut arena = EntityArena::new();
        let handle = arena.create_detached();
        let uuid = arena.get(handle).unwrap().uuid;
        assert!(arena.get_by_uuid(&uuid).is_none());
    }

    #[test]
    fn activate_makes_entity_queryable_by_uuid() {
        let mut arena = EntityArena::new();
        let handle = arena.create_detached();
        arena.activate(handle);
        let uuid = arena.get(handle).unwrap().uuid;
        assert_eq!(arena.get_by_uuid(&uuid), Some(handle));
    }

    #[test]
    fn dispose_without_system_state_goes_straight_to_dead() {
        let mut arena = EntityArena::new();
        let handle = arena.create_active();
        arena.dispose(handle).unwrap();
        assert!(!arena.is_alive(handle));
    }

    #[test]
    fn dispose_with_system_state_becomes_ghost() {
        let mut arena = EntityArena::new();
        let handle = arena.create_active();
        arena.get_mut(handle).unwrap().system_state_count = 1;
        arena.dispose(handle).unwrap();
        assert!(arena.is_alive(handle));
        assert_eq!(arena.get(handle).unwrap().state, EntityState::Removed);

        arena.get_mut(handle).unwrap().system_state_count = 0;
        arena.finalize_if_ghost_cleared(handle);
        assert!(!arena.is_alive(handle));
    }

    #[test]
    fn freed_slot_is_reused_with_new_generation() {
        let mut arena = EntityArena::new();
        let first = arena.create_active();
        arena.dispose(first).unwrap();
        let second = arena.create_active();
        assert_eq!(first.index, second.index);
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn uuid_string_is_uppercase_hyphenated() {
        let mut arena = EntityArena::new();
        let handle = arena.create_active();
        let s = arena.get(handle).unwrap().uuid_string();
        assert_eq!(s, s.to_uppercase());
        assert_eq!(s.len(), 36);
        assert_eq!(s.chars().filter(|c| *c == '-').count(), 4);
    }
}
