//! World construction tunables.

/// Construction-time tunables for a [`World`](crate::world::World).
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Entity arena capacity reserved up front.
    pub initial_entity_capacity: usize,
    /// Pool growth factor applied as `ceil(growth_factor * count) + 1`
    /// whenever a component pool runs out of free slots.
    pub pool_growth_factor: f64,
    /// Whether the world starts in the `enabled` state (able to `execute`).
    pub start_enabled: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            initial_entity_capacity: 1024,
            pool_growth_factor: 0.2,
            start_enabled: true,
        }
    }
}

impl WorldConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_values() {
        let config = WorldConfig::default();
        assert_eq!(config.initial_entity_capacity, 1024);
        assert_eq!(config.pool_growth_factor, 0.2);
        assert!(config.start_enabled);
    }
}
