//! System trait and the tick-ordered system manager.
//!
//! Systems run in a fixed order every tick, never concurrently; structural
//! mutation a system triggers is queued and flushed after every system in
//! the tick has run, rather than applied in place.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use crate::component::ComponentTypeId;
use crate::world::World;

/// The query a system runs against plus the reactive notifications it wants.
pub struct SystemQueryConfig {
    pub include: Vec<ComponentTypeId>,
    pub exclude: Vec<ComponentTypeId>,
    /// When true, `execute` is skipped on ticks where the query currently
    /// has no matching entities.
    pub mandatory: bool,
    /// When true, the backing `Query` is created (or upgraded) to dispatch
    /// added/removed/changed notifications that `init` can subscribe to.
    pub reactive: bool,
}

impl SystemQueryConfig {
    pub fn new(include: Vec<ComponentTypeId>) -> Self {
        SystemQueryConfig {
            include,
            exclude: Vec::new(),
            mandatory: false,
            reactive: false,
        }
    }

    pub fn with_exclude(mut self, exclude: Vec<ComponentTypeId>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn reactive(mut self) -> Self {
        self.reactive = true;
        self
    }
}

/// A unit of per-tick behavior. `init` runs once, at registration, with a
/// chance to subscribe to the system's own query's reactive buckets;
/// `execute` runs once per tick while the system can execute.
///
/// `as_any` exists purely so `World::get_system::<T>()` can downcast a
/// stored `Box<dyn System>` back to its concrete type; implementors supply
/// the boilerplate `fn as_any(&self) -> &dyn Any { self }`.
pub trait System: Any {
    fn name(&self) -> &str;
    fn query_config(&self) -> SystemQueryConfig;

    fn init(&mut self, _world: &mut World) {}
    fn execute(&mut self, world: &mut World, delta: f64, time: f64);
    fn as_any(&self) -> &dyn Any;
}

/// Per-system execution accounting, surfaced through `World::stats()`.
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub name: String,
    pub priority: i32,
    pub executions: u64,
    pub skipped: u64,
    pub panics: u64,
    pub last_duration_micros: u64,
}

struct RegisteredSystem {
    system: Box<dyn System>,
    priority: i32,
    registration_order: u64,
    query_key: String,
    config: SystemQueryConfig,
    stats: SystemStats,
}

/// Orders systems by `(priority, registration order)` ascending and runs
/// them sequentially every tick, catching panics at the system boundary so
/// one failing system never corrupts the world or blocks the rest.
pub struct SystemManager {
    systems: Vec<RegisteredSystem>,
    next_registration_order: u64,
}

impl SystemManager {
    pub fn new() -> Self {
        SystemManager {
            systems: Vec::new(),
            next_registration_order: 0,
        }
    }

    /// Registers a system at `priority`, inserting it into the
    /// already-sorted list so re-sorting on every tick isn't necessary.
    /// Returns the canonical query key the system's query was created or
    /// shared under.
    pub fn register(
        &mut self,
        mut system: Box<dyn System>,
        priority: i32,
        world: &mut World,
    ) -> crate::error::Result<String> {
        let config = system.query_config();
        let query_key = world.ensure_query(&config.include, &config.exclude, config.reactive)?;
        system.init(world);

        let registration_order = self.next_registration_order;
        self.next_registration_order += 1;

        let entry = RegisteredSystem {
            stats: SystemStats {
                name: system.name().to_string(),
                priority,
                executions: 0,
                skipped: 0,
                panics: 0,
                last_duration_micros: 0,
            },
            system,
            priority,
            registration_order,
            query_key: query_key.clone(),
            config,
        };

        let position = self
            .systems
            .iter()
            .position(|existing| {
                (existing.priority, existing.registration_order)
                    > (entry.priority, entry.registration_order)
            })
            .unwrap_or(self.systems.len());
        self.systems.insert(position, entry);
        Ok(query_key)
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Runs every registered system once, in priority order, skipping any
    /// whose `mandatory` query currently has no matching entities.
    pub fn run_tick(&mut self, world: &mut World, delta: f64, time: f64) {
        for entry in &mut self.systems {
            if entry.config.mandatory {
                let has_entities = world
                    .query_entities(&entry.query_key)
                    .map(|entities| !entities.is_empty())
                    .unwrap_or(false);
                if !has_entities {
                    entry.stats.skipped += 1;
                    continue;
                }
            }

            let started = Instant::now();
            let system = &mut entry.system;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                system.execute(world, delta, time);
            }));
            entry.stats.last_duration_micros = started.elapsed().as_micros() as u64;

            match result {
                Ok(()) => entry.stats.executions += 1,
                Err(_) => {
                    entry.stats.panics += 1;
                    log::error!("system '{}' panicked during execute", entry.stats.name);
                }
            }
        }
    }

    pub fn stats(&self) -> Vec<SystemStats> {
        self.systems.iter().map(|e| e.stats.clone()).collect()
    }

    /// Looks up a registered system by its concrete type.
    pub fn get_system<T: 'static>(&self) -> Option<&T> {
        self.systems
            .iter()
            .find_map(|entry| entry.system.as_any().downcast_ref::<T>())
    }

    /// Every registered system, in execution order.
    pub fn get_systems(&self) -> impl Iterator<Item = &dyn System> {
        self.systems.iter().map(|entry| entry.system.as_ref())
    }
}

impl Default for SystemManager {
    fn default() -> Self {
        Self::new()
    }
}
