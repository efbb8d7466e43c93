//! Infrastructure layer - external interfaces

pub mod api;
pub mod db;
pub mod event;
pub mod logging;
