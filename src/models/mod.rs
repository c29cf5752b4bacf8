//! Domain model module declarations.

pub mod exchange;
pub mod session;
