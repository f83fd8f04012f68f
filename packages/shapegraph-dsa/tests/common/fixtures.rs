//! Test fixtures

use shapegraph_dsa::config::DsaConfig;
use shapegraph_dsa::features::local_dsa::{Graph, LocalDsa};
use shapegraph_dsa::shared::models::Procedure;

/// Sequential analysis with default layout and allocators
pub fn dsa() -> LocalDsa {
    LocalDsa::new(DsaConfig::default().parallel(false)).expect("default config is valid")
}

/// Build the graph of `proc`, panicking on failure
pub fn build(proc: &Procedure) -> Graph {
    dsa()
        .build_graph(proc)
        .unwrap_or_else(|e| panic!("analysis of {} failed: {}", proc.name(), e))
}
