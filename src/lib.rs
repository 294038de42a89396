pub mod config;
pub mod datetime;
pub mod extract;
pub mod fetch;
pub mod heuristic;
pub mod model;
pub mod normalize;
pub mod oracle;
pub mod pipeline;
pub mod structured;
pub mod table;
