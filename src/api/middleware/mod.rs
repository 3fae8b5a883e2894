//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: bearer token → `Actor`
//! 2. Audit logger: logs after auth, has the actor

pub mod audit;
pub mod auth;
