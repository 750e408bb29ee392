//! pfcp - encode and decode PFCP messages (TS29.244)
//!
//! Decoding never touches any session state.  Every read goes through a bounds-checked
//! [`Cursor`], and a malformed IE produces a [`PfcpError`] for that IE rather than a
//! truncated value.

mod cursor;
mod error;
pub mod grouped;
pub mod header;
pub mod ies;
pub mod messages;

pub use cursor::Cursor;
pub use error::{PfcpError, PfcpResult};
pub use grouped::*;
pub use header::{
    MessageType, PFCP_HEADER_LEN, PFCP_HEADER_LEN_WITH_SEID, PFCP_PORT, PFCP_VERSION, PfcpHeader,
    split_message,
};
pub use ies::*;
pub use messages::*;
