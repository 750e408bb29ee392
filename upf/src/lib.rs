mod data;
mod pfcp_server;
mod procedures;
mod upf;
mod userplane;

use procedures::{HandlerApi, Procedure};

pub use data::{Config, PdrMatchOrder, load_config_file};
pub use upf::Upf;
pub use userplane::{DropReason, Port, Verdict};
