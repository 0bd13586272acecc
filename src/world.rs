//! The public façade tying every layer together.
//!
//! One struct owns the schema/registries/tables and exposes registration,
//! CRUD and tick operations through plain `&mut self` ownership — this
//! runtime is single-threaded and cooperative, so there is no shared-state
//! locking to do.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::component::{
    ComponentInstance, ComponentTypeDescriptor, ComponentTypeId, FieldData, KindId, KindRegistry,
};
use crate::config::WorldConfig;
use crate::entity::{EntityArena, EntityHandle, EntityState};
use crate::error::{EcsError, Result};
use crate::pool::{Pool, PoolStats};
use crate::query::{Query, QueryIndex, QueryTerm};
use crate::system::{System, SystemManager, SystemStats};

/// Read-only view of an attached component's fields. No mutation method
/// exists on this type at all — the read/write split is enforced by the
/// type system rather than a runtime write-trap.
pub struct ComponentRef<'w> {
    instance: &'w ComponentInstance,
    descriptor: &'w ComponentTypeDescriptor,
}

impl<'w> ComponentRef<'w> {
    pub fn get(&self, field: &str) -> Option<&FieldData> {
        self.instance.get(self.descriptor, field)
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.instance.type_id
    }
}

/// Mutable view of an attached component. Valid only until the next
/// structural change on the same entity. Dropping it fires
/// `COMPONENT_CHANGED` into every reactive query watching this component
/// type, unless the entity is non-`Active` — non-active entities never
/// generate change events.
pub struct ComponentMut<'w> {
    instance: &'w mut ComponentInstance,
    descriptor: &'w ComponentTypeDescriptor,
    queries: &'w mut QueryIndex,
    handle: EntityHandle,
    notify: bool,
}

impl<'w> ComponentMut<'w> {
    pub fn get(&self, field: &str) -> Option<&FieldData> {
        self.instance.get(self.descriptor, field)
    }

    pub fn set(&mut self, field: &str, value: FieldData) {
        self.instance.set(self.descriptor, field, value);
    }

    pub fn type_id(&self) -> ComponentTypeId {
        self.instance.type_id
    }
}

impl<'w> Drop for ComponentMut<'w> {
    fn drop(&mut self) {
        if self.notify {
            self.queries.notify_changed(self.handle, self.instance.type_id);
        }
    }
}

/// Point-in-time counters surfaced for diagnostics.
#[derive(Debug, Clone)]
pub struct WorldStats {
    pub entity_count: usize,
    pub query_count: usize,
    pub system_count: usize,
    pub pool_stats: Vec<(String, PoolStats)>,
    pub system_stats: Vec<SystemStats>,
}

/// Owns every layer of the runtime: the kind/component registries, the
/// entity arena, the query index, the system manager, and the
/// deferred-removal queues that are drained once per tick.
pub struct World {
    config: WorldConfig,
    kinds: KindRegistry,
    component_types: HashMap<ComponentTypeId, ComponentTypeDescriptor>,
    component_ids_by_name: HashMap<String, ComponentTypeId>,
    component_names: HashMap<ComponentTypeId, String>,
    component_pools: HashMap<ComponentTypeId, Pool<ComponentInstance>>,
    next_component_id: ComponentTypeId,
    entities: EntityArena,
    queries: QueryIndex,
    systems: SystemManager,
    pending_dispose: Vec<EntityHandle>,
    pending_dispose_set: HashSet<EntityHandle>,
    pending_removal: Vec<EntityHandle>,
    pending_removal_set: HashSet<EntityHandle>,
    enabled: bool,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    pub fn with_config(config: WorldConfig) -> Self {
        log::debug!("world created with config {:?}", config);
        World {
            entities: EntityArena::with_capacity(config.initial_entity_capacity),
            enabled: config.start_enabled,
            config,
            kinds: KindRegistry::new(),
            component_types: HashMap::new(),
            component_ids_by_name: HashMap::new(),
            component_names: HashMap::new(),
            component_pools: HashMap::new(),
            next_component_id: 0,
            queries: QueryIndex::new(),
            systems: SystemManager::new(),
            pending_dispose: Vec::new(),
            pending_dispose_set: HashSet::new(),
            pending_removal: Vec::new(),
            pending_removal_set: HashSet::new(),
        }
    }

    /// Builds a world, then invokes `hook` once with the fully constructed
    /// instance — the injectable "world-created" notification.
    pub fn with_hook(config: WorldConfig, hook: impl FnOnce(&World)) -> Self {
        let world = Self::with_config(config);
        hook(&world);
        world
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn kinds_mut(&mut self) -> &mut KindRegistry {
        &mut self.kinds
    }

    // --- Component type registration -----------------------------------

    /// Registers a component type, assigning it a stable id. Re-registering
    /// an already-known name is non-fatal: it logs a warning and returns the
    /// existing id.
    pub fn register_component(&mut self, mut descriptor: ComponentTypeDescriptor) -> Result<ComponentTypeId> {
        if let Some(&existing) = self.component_ids_by_name.get(&descriptor.name) {
            log::warn!("component type '{}' already registered", descriptor.name);
            return Ok(existing);
        }
        let id = self.next_component_id;
        self.next_component_id += 1;
        descriptor.id = id;

        self.component_ids_by_name.insert(descriptor.name.clone(), id);
        self.component_names.insert(id, descriptor.name.clone());

        let prototype = ComponentInstance::from_schema(&descriptor, &self.kinds, None);
        self.component_pools
            .insert(id, Pool::with_growth_factor(prototype, self.config.pool_growth_factor));

        self.component_types.insert(id, descriptor);
        Ok(id)
    }

    pub fn register_kind(
        &mut self,
        name: &'static str,
        default: fn() -> FieldData,
        clone_value: fn(&FieldData) -> FieldData,
        copy_value: fn(&FieldData, &mut FieldData, &str),
    ) -> Result<KindId> {
        self.kinds.register_kind(name, default, clone_value, copy_value)
    }

    pub fn component_type_id(&self, name: &str) -> Option<ComponentTypeId> {
        self.component_ids_by_name.get(name).copied()
    }

    pub fn component_descriptor(&self, type_id: ComponentTypeId) -> Option<&ComponentTypeDescriptor> {
        self.component_types.get(&type_id)
    }

    // --- Entity lifecycle -------------------------------------------------

    /// Allocates an entity in the `Detached` state: not yet visible to
    /// queries or `get_entity_by_uuid`.
    pub fn create_detached_entity(&mut self) -> EntityHandle {
        self.entities.create_detached()
    }

    /// Activates a previously detached entity, making it live.
    pub fn add_entity(&mut self, handle: EntityHandle) {
        self.entities.activate(handle);
    }

    /// Allocates and immediately activates an entity. Creation is always
    /// synchronous; only disposal and component removal can defer.
    pub fn create_entity(&mut self) -> EntityHandle {
        let handle = self.create_detached_entity();
        self.add_entity(handle);
        handle
    }

    pub fn get_entity_by_uuid(&self, uuid: &Uuid) -> Option<EntityHandle> {
        self.entities.get_by_uuid(uuid)
    }

    pub fn entity_uuid(&self, handle: EntityHandle) -> Option<String> {
        self.entities.get(handle).map(|r| r.uuid_string())
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.entities.is_alive(handle)
    }

    pub fn has_component(&self, handle: EntityHandle, type_id: ComponentTypeId) -> bool {
        self.entities
            .get(handle)
            .map(|r| r.has_component(type_id))
            .unwrap_or(false)
    }

    /// Immediately tears an entity down: every non-system-state component is
    /// detached right away; if any system-state components remain attached
    /// the entity becomes a ghost (`Removed`, still visible to queries over
    /// just those components) until they are individually removed.
    pub fn despawn_immediate(&mut self, handle: EntityHandle) -> Result<()> {
        if !self.entities.is_alive(handle) {
            return Err(EcsError::EntityNotFound(format!("{handle:?}")));
        }
        let type_ids: Vec<ComponentTypeId> = self
            .entities
            .get(handle)
            .map(|r| r.component_type_ids().copied().collect())
            .unwrap_or_default();
        for type_id in type_ids {
            let is_system_state = self
                .component_types
                .get(&type_id)
                .map(|d| d.is_system_state)
                .unwrap_or(false);
            if !is_system_state {
                self.remove_component(handle, type_id, true);
            }
        }
        self.entities.dispose(handle)?;
        if !self.entities.is_alive(handle) {
            self.queries.remove_entity(handle);
        }
        Ok(())
    }

    /// Queues an entity for teardown at the next tick's drain instead of
    /// tearing it down immediately.
    pub fn despawn_deferred(&mut self, handle: EntityHandle) {
        if self.pending_dispose_set.insert(handle) {
            self.pending_dispose.push(handle);
        }
    }

    // --- Component attach/detach ------------------------------------------

    /// Attaches a component of `type_id` to `handle`, overlaying `props`
    /// onto the type's schema defaults. A no-op (logged) if the entity
    /// already carries that component type.
    pub fn create_component(
        &mut self,
        handle: EntityHandle,
        type_id: ComponentTypeId,
        props: Option<&HashMap<String, FieldData>>,
    ) -> Result<()> {
        if !self.entities.is_alive(handle) {
            return Err(EcsError::EntityNotFound(format!("{handle:?}")));
        }
        let descriptor = self
            .component_types
            .get(&type_id)
            .ok_or_else(|| EcsError::UnknownComponentType(type_id.to_string()))?;

        if self.has_component(handle, type_id) {
            log::warn!("entity already has component type {type_id}");
            return Ok(());
        }

        let mut instance = match self.component_pools.get_mut(&type_id) {
            Some(pool) => pool.acquire(),
            None => ComponentInstance::from_schema(descriptor, &self.kinds, None),
        };
        if let Some(props) = props {
            for (field, value) in props {
                if let Some(field_schema) = descriptor.schema.iter().find(|f| &f.name == field) {
                    if let Some(kind) = self.kinds.get(field_schema.kind) {
                        if let Some(dst) = instance.get_mut(descriptor, field) {
                            (kind.copy_value)(value, dst, field);
                        }
                    }
                }
            }
        }

        if descriptor.is_system_state {
            if let Some(record) = self.entities.get_mut(handle) {
                record.system_state_count += 1;
            }
        }

        if let Some(record) = self.entities.get_mut(handle) {
            record.insert_component(type_id, instance);
        }

        self.reconcile_queries(handle);
        Ok(())
    }

    /// First-detachment step shared by immediate and deferred removal: takes
    /// the instance out of the live map, decrements the system-state ghost
    /// counter, and reconciles query membership immediately — `has_component`
    /// and query maintenance reflect the removal the moment this returns,
    /// regardless of when the instance is actually released back to its pool.
    fn detach_live(&mut self, handle: EntityHandle, type_id: ComponentTypeId) -> Option<ComponentInstance> {
        let instance = self.entities.get_mut(handle)?.take_component(type_id)?;
        let is_system_state = self
            .component_types
            .get(&type_id)
            .map(|d| d.is_system_state)
            .unwrap_or(false);
        if is_system_state {
            if let Some(record) = self.entities.get_mut(handle) {
                record.system_state_count = record.system_state_count.saturating_sub(1);
            }
        }
        self.reconcile_queries(handle);
        Some(instance)
    }

    /// Finalizes a ghost entity whose last system-state component just
    /// cleared — disposal proceeds the moment the system-state count hits
    /// zero, even mid-tick. Any components still awaiting their own
    /// deferred drain are released to their pools first, so a ghost that
    /// finalizes early never leaks a pool slot.
    fn finalize_after_removal(&mut self, handle: EntityHandle) {
        let would_finalize = matches!(
            self.entities.get(handle),
            Some(record) if record.state == EntityState::Removed && record.system_state_count == 0
        );
        if would_finalize {
            self.process_removed_components(handle);
        }
        self.entities.finalize_if_ghost_cleared(handle);
        if !self.entities.is_alive(handle) {
            self.queries.remove_entity(handle);
        }
    }

    /// Detaches `type_id` from `handle`. Returns `true` iff a detachment
    /// occurred — a no-op returning `false` if not attached and not already
    /// pending.
    ///
    /// `immediate = true` disposes the instance right away (releases it to
    /// its pool, or finalizes a previously-deferred removal that hasn't
    /// drained yet). `immediate = false` detaches it from the live set and
    /// query memberships *now*, but only queues the instance for actual
    /// disposal at the next tick's drain.
    pub fn remove_component(&mut self, handle: EntityHandle, type_id: ComponentTypeId, immediate: bool) -> bool {
        if !self.entities.is_alive(handle) {
            return false;
        }
        if !self.has_component(handle, type_id) {
            if immediate && self.entities.get(handle).map_or(false, |r| r.is_pending_removal(type_id)) {
                if let Some(record) = self.entities.get_mut(handle) {
                    if let Some(instance) = record.take_pending(type_id) {
                        if let Some(pool) = self.component_pools.get_mut(&type_id) {
                            pool.release(instance);
                        }
                    }
                }
                self.finalize_after_removal(handle);
                return true;
            }
            return false;
        }

        let instance = match self.detach_live(handle, type_id) {
            Some(instance) => instance,
            None => return false,
        };
        if immediate {
            if let Some(pool) = self.component_pools.get_mut(&type_id) {
                pool.release(instance);
            }
        } else if let Some(record) = self.entities.get_mut(handle) {
            record.move_to_pending(type_id, instance);
            if self.pending_removal_set.insert(handle) {
                self.pending_removal.push(handle);
            }
        }
        self.finalize_after_removal(handle);
        true
    }

    /// Detaches every attached component type from `handle`.
    pub fn remove_all_components(&mut self, handle: EntityHandle, immediate: bool) {
        let type_ids: Vec<ComponentTypeId> = self
            .entities
            .get(handle)
            .map(|r| r.component_type_ids().copied().collect())
            .unwrap_or_default();
        for type_id in type_ids {
            self.remove_component(handle, type_id, immediate);
        }
    }

    fn process_removed_components(&mut self, handle: EntityHandle) {
        let pending_types = match self.entities.get_mut(handle) {
            Some(record) => record.pending_type_ids(),
            None => return,
        };
        for type_id in pending_types {
            let instance = match self.entities.get_mut(handle).and_then(|r| r.take_pending(type_id)) {
                Some(instance) => instance,
                None => continue,
            };
            if let Some(pool) = self.component_pools.get_mut(&type_id) {
                pool.release(instance);
            }
        }
    }

    /// Notifies every query that includes `type_id` and currently holds
    /// `handle` that one of its fields changed (drives the reactive
    /// `changed` bucket). Non-active entities never generate change events.
    pub fn notify_component_changed(&mut self, handle: EntityHandle, type_id: ComponentTypeId) {
        let is_active = matches!(
            self.entities.get(handle).map(|r| r.state),
            Some(EntityState::Active)
        );
        if is_active {
            self.queries.notify_changed(handle, type_id);
        }
    }

    pub fn has_component_with(&self, handle: EntityHandle, type_id: ComponentTypeId, include_removed: bool) -> bool {
        match self.entities.get(handle) {
            Some(record) => record.has_component(type_id) || (include_removed && record.is_pending_removal(type_id)),
            None => false,
        }
    }

    pub fn has_all_components(&self, handle: EntityHandle, type_ids: &[ComponentTypeId]) -> bool {
        type_ids.iter().all(|t| self.has_component(handle, *t))
    }

    pub fn has_any_components(&self, handle: EntityHandle, type_ids: &[ComponentTypeId]) -> bool {
        type_ids.iter().any(|t| self.has_component(handle, *t))
    }

    pub fn component_type_ids_of(&self, handle: EntityHandle) -> Vec<ComponentTypeId> {
        self.entities
            .get(handle)
            .map(|r| r.component_type_ids().copied().collect())
            .unwrap_or_default()
    }

    /// Read-only view of an attached component. `ComponentRef` has no
    /// mutation methods at all — the read/write split is enforced at the
    /// type level rather than by a runtime trap.
    pub fn get_component(&self, handle: EntityHandle, type_id: ComponentTypeId) -> Option<ComponentRef<'_>> {
        let instance = self.entities.get(handle)?.component(type_id)?;
        let descriptor = self.component_types.get(&type_id)?;
        Some(ComponentRef { instance, descriptor })
    }

    /// Every currently attached component on `handle`, as read-only views.
    pub fn get_components(&self, handle: EntityHandle) -> Vec<ComponentRef<'_>> {
        let record = match self.entities.get(handle) {
            Some(record) => record,
            None => return Vec::new(),
        };
        record
            .component_type_ids()
            .filter_map(|type_id| {
                let descriptor = self.component_types.get(type_id)?;
                Some(ComponentRef {
                    instance: record.component(*type_id)?,
                    descriptor,
                })
            })
            .collect()
    }

    /// A component detached by a deferred `remove_component` that hasn't
    /// drained yet.
    pub fn get_removed_component(&self, handle: EntityHandle, type_id: ComponentTypeId) -> Option<ComponentRef<'_>> {
        let instance = self.entities.get(handle)?.removed_component(type_id)?;
        let descriptor = self.component_types.get(&type_id)?;
        Some(ComponentRef { instance, descriptor })
    }

    /// Mutable handle to an attached component. Valid only until the next
    /// structural change to this entity. Dropping it fires
    /// `COMPONENT_CHANGED` into every reactive query that observes this
    /// component type, but only while the entity is `Active`.
    pub fn get_mutable_component(&mut self, handle: EntityHandle, type_id: ComponentTypeId) -> Option<ComponentMut<'_>> {
        let is_active = matches!(
            self.entities.get(handle).map(|r| r.state),
            Some(EntityState::Active)
        );
        let descriptor = self.component_types.get(&type_id)?;
        let instance = self.entities.get_mut(handle)?.component_mut(type_id)?;
        Some(ComponentMut {
            instance,
            descriptor,
            queries: &mut self.queries,
            handle,
            notify: is_active,
        })
    }

    /// Creates a new active entity carrying a clone of every component
    /// currently attached to `handle`.
    pub fn clone_entity(&mut self, handle: EntityHandle) -> Option<EntityHandle> {
        let source = self.entities.get(handle)?;
        let mut props: Vec<(ComponentTypeId, ComponentInstance)> = Vec::new();
        for type_id in source.component_type_ids().copied().collect::<Vec<_>>() {
            let instance = source.component(type_id)?;
            let descriptor = self.component_types.get(&type_id)?;
            props.push((type_id, instance.clone_value(descriptor, &self.kinds)));
        }
        let clone = self.create_entity();
        for (type_id, instance) in props {
            let is_system_state = self
                .component_types
                .get(&type_id)
                .map(|d| d.is_system_state)
                .unwrap_or(false);
            if let Some(record) = self.entities.get_mut(clone) {
                record.insert_component(type_id, instance);
                if is_system_state {
                    record.system_state_count += 1;
                }
            }
        }
        self.reconcile_queries(clone);
        Some(clone)
    }

    fn reconcile_queries(&mut self, handle: EntityHandle) {
        let components: HashSet<ComponentTypeId> = match self.entities.get(handle) {
            Some(record) => record.component_type_ids().copied().collect(),
            None => return,
        };
        self.queries.reconcile(handle, &components);
    }

    // --- Queries -----------------------------------------------------------

    /// Returns the canonical key for an inclusion/exclusion set, creating
    /// the shared `Query` if it doesn't already exist. A freshly created
    /// query is silently seeded against every currently active entity —
    /// seeding never dispatches `added`, even for a reactive query.
    pub fn ensure_query(
        &mut self,
        include: &[ComponentTypeId],
        exclude: &[ComponentTypeId],
        reactive: bool,
    ) -> Result<String> {
        let (query, created) = self.queries.get_or_create(
            include.to_vec(),
            exclude.to_vec(),
            reactive,
            &self.component_names,
        )?;
        let key = query.canonical_key.clone();
        if created {
            for handle in self.entities.active_handles() {
                let components: HashSet<ComponentTypeId> = self
                    .entities
                    .get(handle)
                    .map(|r| r.component_type_ids().copied().collect())
                    .unwrap_or_default();
                self.queries.seed(&key, handle, &components);
            }
        }
        Ok(key)
    }

    /// Accepts a mixed list of plain inclusion ids and
    /// [`crate::query::Not`]-wrapped exclusion ids.
    pub fn get_query_spec(&mut self, terms: &[QueryTerm], reactive: bool) -> Result<String> {
        let (include, exclude) = crate::query::split_terms(terms);
        self.ensure_query(&include, &exclude, reactive)
    }

    pub fn get_query(&self, key: &str) -> Option<&Query> {
        self.queries.get(key)
    }

    pub fn get_query_mut(&mut self, key: &str) -> Option<&mut Query> {
        self.queries.get_mut(key)
    }

    pub fn query_entities(&self, key: &str) -> Option<&[EntityHandle]> {
        self.queries.get(key).map(|q| q.entities())
    }

    // --- Systems -------------------------------------------------------------

    /// Registers a system at `priority`. Systems are detached from `self`
    /// for the duration of registration since `System::init` takes `&mut
    /// World` and `self.systems` cannot be borrowed mutably twice at once.
    pub fn register_system(&mut self, system: Box<dyn System>, priority: i32) -> Result<String> {
        let mut systems = std::mem::take(&mut self.systems);
        let result = systems.register(system, priority, self);
        self.systems = systems;
        result
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn systems_stats(&self) -> Vec<SystemStats> {
        self.systems.stats()
    }

    /// Looks up a registered system by its concrete type.
    pub fn get_system<T: 'static>(&self) -> Option<&T> {
        self.systems.get_system::<T>()
    }

    /// Every registered system, in execution order.
    pub fn get_systems(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.get_systems()
    }

    // --- Tick lifecycle --------------------------------------------------

    pub fn stop(&mut self) {
        self.enabled = false;
    }

    pub fn play(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs every registered system once (if the world is enabled), then
    /// drains deferred entity disposal and component removal, and finally
    /// clears each query's per-tick `changed` dedup window.
    pub fn execute(&mut self, delta: f64, time: f64) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut systems = std::mem::take(&mut self.systems);
        systems.run_tick(self, delta, time);
        self.systems = systems;

        self.drain_deferred();
        self.queries.clear_tick_dedup();
        Ok(())
    }

    fn drain_deferred(&mut self) {
        for handle in self.pending_removal.drain(..) {
            self.pending_removal_set.remove(&handle);
            self.process_removed_components(handle);
        }

        for handle in std::mem::take(&mut self.pending_dispose) {
            self.pending_dispose_set.remove(&handle);
            if let Err(err) = self.despawn_immediate(handle) {
                log::warn!("deferred despawn of {handle:?} failed: {err}");
            }
        }
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            entity_count: self.entities.len(),
            query_count: self.queries.len(),
            system_count: self.systems.len(),
            pool_stats: self
                .component_pools
                .iter()
                .map(|(id, pool)| {
                    (
                        self.component_names.get(id).cloned().unwrap_or_default(),
                        pool.stats(),
                    )
                })
                .collect(),
            system_stats: self.systems.stats(),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
