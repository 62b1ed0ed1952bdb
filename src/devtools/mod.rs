//! Time-travel debugger integration.
//!
//! Stores whose namespace enables devtools are registered here. Their
//! actions are instrumented to report every call, and a shadow controller
//! reports changes made outside actions.

mod bridge;
mod registry;
mod transport;

pub use bridge::{DevTools, DEVTOOLS_NAMESPACE};
pub use registry::NamespaceRegistry;
pub use transport::{
    ActionMeta, DevToolsConnection, DevToolsEvent, DevToolsTransport, MemoryTransport,
    DEVTOOLS_CONNECTION_NAME,
};
