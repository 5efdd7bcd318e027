//! Use-case services over the repository traits.

pub mod import_service;
pub mod objective_service;
pub mod progress_service;
pub mod roster_service;
