use thiserror::Error;

/// Errors that structural operations surface directly to the caller.
///
/// Lifecycle/registration misuse (duplicate registration, duplicate entity,
/// re-attaching or re-removing a component) is *not* represented here: those
/// cases are non-fatal by contract and are logged and recovered locally
/// instead of returned as `Err` (see `world.rs`).
#[derive(Error, Debug)]
pub enum EcsError {
    #[error("query inclusion set must not be empty")]
    EmptyInclusion,

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("component type not registered: {0}")]
    UnknownComponentType(String),

    #[error("component not attached to entity {entity}: {component_type}")]
    ComponentNotFound {
        entity: String,
        component_type: String,
    },

    #[error("kind already registered: {0}")]
    DuplicateKind(String),
}

pub type Result<T> = std::result::Result<T, EcsError>;
