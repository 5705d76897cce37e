use super::compiled_plan::{ExecutionPlan, PlanStats};
use super::error::{PipelineError, PipelineResult};
use super::graph::{GraphModel, PipeGraph};
use super::id::ModuleId;
use super::wiring::WiringResolver;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{info, warn};

/// Compile a pipe description into an immutable [`PipeGraph`].
///
/// Pure and deterministic: the same description always yields the same
/// order and wiring.
pub fn compile(description: &Value, name: &str) -> PipelineResult<PipeGraph> {
    PipelineCompiler::compile(description, name)
}

/// Compiles a pipe description into a dependency-ordered execution plan
pub struct PipelineCompiler;

impl PipelineCompiler {
    /// Compile a pipe description.
    ///
    /// Parses the description, builds the module dependency graph, prunes
    /// orphans, sorts the remainder topologically and resolves the wiring
    /// of every module in that order.
    pub fn compile(description: &Value, name: &str) -> PipelineResult<PipeGraph> {
        let start_time = std::time::Instant::now();

        let model = GraphModel::parse(description, name)?;

        // Dependency edges, indexed by module insertion position
        let adjacency = Self::build_adjacency(&model)?;

        // Orphan pruning yields a new edge map; the model keeps every module
        let active = Self::prune(&adjacency);
        for (idx, module) in model.modules.iter().enumerate() {
            if !active[idx] {
                warn!(module = %module.id, "Pruning orphan module {}", module.module_type);
            }
        }

        let order_idx = Self::topological_sort(&model, &adjacency, &active)?;
        let order: Vec<ModuleId> = order_idx
            .iter()
            .map(|&idx| model.modules[idx].id.clone())
            .collect();

        let steps = WiringResolver::new(&model).resolve(&order)?;

        let total_modules = model.modules.len();
        let active_modules = steps.len();
        let stats = PlanStats {
            total_modules,
            active_modules,
            pruned_modules: total_modules - active_modules,
            embedded_modules: model.modules.iter().filter(|m| m.is_embedded()).count(),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        info!(
            pipe = %model.name,
            active = stats.active_modules,
            pruned = stats.pruned_modules,
            "Compiled pipe in {}us",
            stats.compile_time_us
        );

        let adjacency = model
            .modules
            .iter()
            .enumerate()
            .filter(|(idx, _)| active[*idx])
            .map(|(idx, module)| {
                let targets = adjacency[idx]
                    .iter()
                    .map(|&to| model.modules[to].id.clone())
                    .collect();
                (module.id.clone(), targets)
            })
            .collect();

        Ok(PipeGraph {
            model,
            adjacency,
            order,
            plan: ExecutionPlan { steps, stats },
        })
    }

    /// Build forward adjacency lists: `from -> [modules depending on from]`.
    ///
    /// A loop's embedded module is a dependency of the loop; every wire makes
    /// its target depend on its source.
    fn build_adjacency(model: &GraphModel) -> PipelineResult<Vec<Vec<usize>>> {
        let mut fwd_adj = vec![Vec::new(); model.modules.len()];

        for (idx, module) in model.modules.iter().enumerate() {
            if let Some(parent) = &module.parent {
                let parent_idx = model.position(parent).ok_or_else(|| {
                    PipelineError::malformed(format!("/modules/{parent}"), "unknown parent loop")
                })?;
                fwd_adj[idx].push(parent_idx);
            }
        }

        for wire in &model.wires {
            let position = |id: &ModuleId| {
                model.position(id).ok_or_else(|| PipelineError::DanglingWire {
                    wire_id: wire.id.clone(),
                    module_id: id.clone(),
                })
            };
            let from = position(&wire.source.module_id)?;
            let to = position(&wire.target.module_id)?;
            fwd_adj[from].push(to);
        }

        Ok(fwd_adj)
    }

    /// A module is active unless it has no outgoing edge and no incoming edge.
    fn prune(fwd_adj: &[Vec<usize>]) -> Vec<bool> {
        let mut active: Vec<bool> = fwd_adj.iter().map(|targets| !targets.is_empty()).collect();
        for targets in fwd_adj {
            for &to in targets {
                active[to] = true;
            }
        }
        active
    }

    /// Topological sort of active modules using Kahn's algorithm.
    ///
    /// Ready modules are released lowest insertion position first, so the
    /// order is a pure function of the description.
    fn topological_sort(
        model: &GraphModel,
        fwd_adj: &[Vec<usize>],
        active: &[bool],
    ) -> PipelineResult<Vec<usize>> {
        let n = fwd_adj.len();
        let mut in_degree = vec![0usize; n];
        for targets in fwd_adj {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
            .filter(|&i| active[i] && in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut result = Vec::with_capacity(n);

        while let Some(Reverse(node)) = ready.pop() {
            result.push(node);

            for &neighbor in &fwd_adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    ready.push(Reverse(neighbor));
                }
            }
        }

        let active_count = active.iter().filter(|&&a| a).count();
        if result.len() < active_count {
            let nodes = (0..n)
                .filter(|&i| active[i] && in_degree[i] > 0)
                .map(|i| model.modules[i].id.clone())
                .collect();
            return Err(PipelineError::CyclicGraph { nodes });
        }

        Ok(result)
    }
}
