pub mod core;
pub mod edit;
pub mod schedule;
