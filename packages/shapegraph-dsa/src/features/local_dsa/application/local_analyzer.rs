//! Local DSA driver
//!
//! Builds one memory graph per defined procedure and publishes it to a
//! [`GraphStore`]:
//! 1. fresh nodes for pointer and aggregate formals
//! 2. intra-block pass over reachable blocks in reverse post-order
//! 3. inter-block pass joining phi nodes
//!
//! Procedures are independent, so a module can be analyzed on a rayon pool.
//!
//! # Usage
//! ```rust
//! use shapegraph_dsa::config::DsaConfig;
//! use shapegraph_dsa::features::local_dsa::{GraphStore, LocalDsa};
//! use shapegraph_dsa::shared::models::{Module, ProcedureBuilder, Type};
//!
//! let mut b = ProcedureBuilder::new("alias", Type::Void);
//! let entry = b.block("entry");
//! let slot = b.alloca(entry, Type::ptr());
//! let obj = b.alloca(entry, Type::i32());
//! b.store(entry, obj, slot);
//! let loaded = b.load(entry, Type::ptr(), slot);
//! b.ret(entry, None);
//! let module = Module::new("m").with_procedure(b.finish());
//!
//! let dsa = LocalDsa::new(DsaConfig::default().parallel(false))?;
//! let store = GraphStore::new();
//! dsa.run_on_module(&module, &store)?;
//!
//! let graph = store.get_graph("alias")?;
//! assert!(graph.may_alias(graph.cell_of(obj), graph.cell_of(loaded)));
//! # Ok::<(), shapegraph_dsa::errors::DsaError>(())
//! ```

use super::cell_resolver::CellResolver;
use super::graph_store::GraphStore;
use super::inter_block::InterBlockBuilder;
use super::intra_block::IntraBlockBuilder;
use crate::config::DsaConfig;
use crate::errors::{DsaError, Result};
use crate::features::local_dsa::domain::Graph;
use crate::features::local_dsa::infrastructure::{
    reverse_postorder, DataLayout, NamedAllocationRecognizer,
};
use crate::features::local_dsa::ports::{AllocationRecognizer, LayoutOracle};
use crate::shared::models::{Module, Procedure};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Intraprocedural heap-shape analysis
pub struct LocalDsa {
    config: DsaConfig,
    layout: Arc<dyn LayoutOracle>,
    allocator: Arc<dyn AllocationRecognizer>,
}

impl LocalDsa {
    /// Analysis with the built-in layout and allocator list from `config`
    pub fn new(config: DsaConfig) -> Result<Self> {
        let layout = Arc::new(DataLayout::from_config(&config));
        let allocator = Arc::new(NamedAllocationRecognizer::from_config(&config));
        Self::with_components(config, layout, allocator)
    }

    pub fn with_components(
        config: DsaConfig,
        layout: Arc<dyn LayoutOracle>,
        allocator: Arc<dyn AllocationRecognizer>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            layout,
            allocator,
        })
    }

    #[inline]
    pub fn config(&self) -> &DsaConfig {
        &self.config
    }

    /// Build the memory graph of one defined procedure
    pub fn build_graph(&self, proc: &Procedure) -> Result<Graph> {
        let start = Instant::now();
        let mut resolver = CellResolver::new(
            proc,
            self.layout.as_ref(),
            self.config.precision_diagnostics,
        );

        for &arg in proc.arguments() {
            if proc.ty(arg).is_tracked() {
                resolver.fresh_cell(arg);
            }
        }

        let order = reverse_postorder(proc);

        let mut intra = IntraBlockBuilder::new(&mut resolver, self.allocator.as_ref());
        for &block in &order {
            intra.visit_block(block)?;
        }

        let mut inter = InterBlockBuilder::new(&mut resolver, &order);
        for &block in &order {
            inter.visit_block(block)?;
        }

        let mut graph = resolver.into_graph();
        graph.finalize_stats(start.elapsed().as_secs_f64() * 1000.0);
        Ok(graph)
    }

    /// Analyze `proc` and publish its graph
    ///
    /// Returns `false` for declarations, which have nothing to analyze.
    pub fn run_on_procedure(&self, proc: &Procedure, store: &GraphStore) -> Result<bool> {
        if proc.is_declaration() {
            return Ok(false);
        }

        let graph = self.build_graph(proc)?;
        let stats = graph.stats();
        info!(
            procedure = %proc.name(),
            live_nodes = stats.live_nodes,
            cells = stats.cells,
            collapses = stats.collapses,
            duration_ms = stats.duration_ms,
            "local graph built"
        );
        if self.config.dump_graphs {
            debug!("{}", graph);
        }

        store.insert(graph)?;
        Ok(true)
    }

    /// Analyze every defined procedure of `module`
    ///
    /// Stops at the first failure. Returns the number of graphs published.
    pub fn run_on_module(&self, module: &Module, store: &GraphStore) -> Result<usize> {
        let procedures = module.procedures();
        info!(
            module = %module.name,
            procedures = procedures.len(),
            parallel = self.config.parallel,
            "local DSA started"
        );

        let analyzed: Vec<bool> = if self.config.parallel && procedures.len() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.effective_workers())
                .thread_name(|i| format!("shapegraph-dsa-{}", i))
                .build()
                .map_err(|e| DsaError::ThreadPool(e.to_string()))?;
            pool.install(|| {
                procedures
                    .par_iter()
                    .map(|proc| self.run_on_procedure(proc, store))
                    .collect::<Result<Vec<bool>>>()
            })?
        } else {
            procedures
                .iter()
                .map(|proc| self.run_on_procedure(proc, store))
                .collect::<Result<Vec<bool>>>()?
        };

        let published = analyzed.into_iter().filter(|&done| done).count();
        info!(module = %module.name, published, "local DSA finished");
        Ok(published)
    }
}
