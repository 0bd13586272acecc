//! Data-oriented entity-component-system runtime core for simulation loops.
//!
//! `pool` and `event` are the foundational primitives; `component` and
//! `entity` build on them to model attached data and lifecycle; `query`
//! incrementally indexes entities by composition; `system` orders behavior
//! over queries; `world` is the façade most callers interact with.

pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod pool;
pub mod query;
pub mod system;
pub mod world;

pub use component::{
    ComponentInstance, ComponentTypeDescriptor, ComponentTypeId, FieldData, FieldSchema, KindId,
    KindRegistry, KIND_ARRAY, KIND_BOOLEAN, KIND_JSON, KIND_NUMBER, KIND_OPAQUE, KIND_STRING,
};
pub use config::WorldConfig;
pub use entity::{EntityHandle, EntityState};
pub use error::{EcsError, Result};
pub use event::EventBus;
pub use pool::{Pool, PoolStats};
pub use query::{Not, Query, QueryIndex, QueryTerm};
pub use system::{System, SystemManager, SystemQueryConfig, SystemStats};
pub use world::{ComponentMut, ComponentRef, World, WorldStats};
