//! HTTP API.
//!
//! Routes are nested under `/api/`. Protected routes run behind the
//! middleware stack Auth → Audit → Handler; registration and health are
//! open.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_ctrl_c, start_server, ServerError, ServerHandle, ServerSession};
pub use types::ApiContext;
