// meshpart — stream graph partitioning for tiled meshes
//
// Library root. Passes run in order flow -> build_config -> partition ->
// layout -> route; see `pipeline` for the driver.

pub mod config;
pub mod cost;
pub mod ctree;
pub mod diag;
pub mod dot;
pub mod error;
pub mod flow;
pub mod id;
pub mod layout;
pub mod mesh;
pub mod partition;
pub mod pass;
pub mod pipeline;
pub mod stream;
pub mod switch;
