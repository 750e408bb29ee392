mod association_release;
mod association_setup;
mod association_update;
mod handler_api;
mod heartbeat;
mod pfcp_handler;
mod procedure;
mod rules;
mod session_deletion;
mod session_establishment;
mod session_modification;
mod session_report;

pub use handler_api::HandlerApi;
pub use pfcp_handler::PfcpHandler;
pub use procedure::Procedure;
