//! Discovery of candidate plugin types.

use crate::config::DiscoveryConfig;
use crate::result::AppResult;
use crate::types::descriptor::PluginTypeDescriptor;

/// Yields the plugin type descriptors one load cycle should consider.
///
/// Implementations must skip individual unreadable or malformed candidates
/// instead of failing the whole pass. An `Err` means the source itself was
/// unusable (for example a missing directory).
pub trait TypeDiscovery: Send + Sync {
    /// Enumerate candidate descriptors.
    fn discover(&self, config: &DiscoveryConfig) -> AppResult<Vec<PluginTypeDescriptor>>;
}
