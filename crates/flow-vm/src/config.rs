//! World construction parameters.

use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::FlowWorld`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Spatial grid cell edge length in world units.
    pub grid_cell_size: f32,
    /// Idle VMs kept around before releases start destroying.
    pub vm_pool_max_idle: usize,
    /// Hard cap on simultaneously running flows.
    pub vm_pool_max_active: usize,
    /// Idle compilation buffers kept around.
    pub buffer_pool_max_idle: usize,
    /// VMs constructed up front at world creation.
    pub prewarm_vms: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            grid_cell_size: 100.0,
            vm_pool_max_idle: 64,
            vm_pool_max_active: 1024,
            buffer_pool_max_idle: 16,
            prewarm_vms: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: FlowConfig = serde_json::from_str(r#"{"grid_cell_size": 32.0}"#).unwrap();
        assert_eq!(config.grid_cell_size, 32.0);
        assert_eq!(config.vm_pool_max_active, 1024);
    }
}
