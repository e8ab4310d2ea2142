pub mod conditions;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod errors;
pub mod graph;
pub mod logging;
pub mod model;
pub mod records;
pub mod render;
pub mod report;
pub mod scheduler;
pub mod status;
pub mod store;
