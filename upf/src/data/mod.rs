mod config;
mod pfcp_node;
mod registry;
pub(crate) mod session;

pub use config::*;
pub use pfcp_node::*;
pub use registry::SessionRegistry;
pub use session::*;
