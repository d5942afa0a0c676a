//! Connection statistics structures

use serde::Serialize;

/// Registry-wide connection statistics.
///
/// Counts are summed shard by shard while registrations continue, so they are
/// approximate under concurrent load.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub tenant_count: usize,
    pub tenants: Vec<TenantConnectionStats>,
}

/// Tenant-specific connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct TenantConnectionStats {
    pub tenant_id: String,
    pub connections: usize,
}
