mod mock_smf;
mod packets;
mod rules;
pub mod framework;

pub use mock_smf::MockSmf;
pub use packets::*;
pub use rules::*;
