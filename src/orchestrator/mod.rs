//! Session orchestration modules.
//!
//! Covers the live session, the session store, the shared deadline wait,
//! the request coordinator, and the age-based reaper.

pub mod coordinator;
pub mod reaper;
pub mod session;
pub mod store;
pub mod wait;
