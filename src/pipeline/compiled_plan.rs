use crate::pipeline::conf::Conf;
use crate::pipeline::id::ModuleId;
use crate::pipeline::module_type::pipe_name;
use crate::pipeline::port::INPUT;
use crate::pipeline::record::FOREVER_KEY;
use std::fmt;

/// Where a module's primary input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// The sentinel root stage.
    Forever,
    /// The stage of an upstream module.
    Module(ModuleId),
    /// Supplied per record by the owning loop (embedded modules only).
    Runtime,
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Forever => f.write_str(FOREVER_KEY),
            InputSource::Module(id) => write!(f, "{id}"),
            InputSource::Runtime => f.write_str(INPUT),
        }
    }
}

/// Fully resolved constructor arguments of one module.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgs {
    pub input: InputSource,
    /// Auxiliary named inputs: normalized terminal name -> upstream module.
    pub inputs: Vec<(String, ModuleId)>,
    /// Embedded module a loop invokes per record.
    pub embed: Option<ModuleId>,
    /// Fan-out count of a split.
    pub splits: Option<usize>,
    pub conf: Conf,
}

/// One module of the execution plan, in topological position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub module_id: ModuleId,
    pub module_type: String,
    pub embedded: bool,
    pub args: ResolvedArgs,
    /// How many downstream pulls the module's stage serves.
    pub consumers: usize,
}

/// Call form of a step, e.g.
/// `sw_2 = pipecount(context, sw_1, conf={})`.
impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conf = serde_json::Value::Object(self.args.conf.as_map().clone());
        write!(
            f,
            "{} = {}(context, {}, conf={}",
            self.module_id,
            pipe_name(&self.module_type),
            self.args.input,
            conf
        )?;
        for (name, source) in &self.args.inputs {
            write!(f, ", {name}={source}")?;
        }
        if let Some(embed) = &self.args.embed {
            write!(f, ", embed={embed}")?;
        }
        if let Some(splits) = self.args.splits {
            write!(f, ", splits={splits}")?;
        }
        f.write_str(")")
    }
}

/// Compiled execution plan: every executable module in topological order
/// with its resolved wiring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
    pub stats: PlanStats,
}

/// Statistics about the compiled plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanStats {
    /// Total number of modules in the description, embedded included
    pub total_modules: usize,

    /// Number of modules in the execution plan
    pub active_modules: usize,

    /// Number of orphan modules removed by pruning
    pub pruned_modules: usize,

    /// Number of embedded (loop body) modules
    pub embedded_modules: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl ExecutionPlan {
    /// Check if the plan has any executable modules
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &ModuleId) -> Option<&PlanStep> {
        self.steps.iter().find(|step| &step.module_id == id)
    }

    /// The module whose stage is the pipeline's output.
    pub fn last(&self) -> Option<&PlanStep> {
        self.steps.last()
    }

    /// Ordered module ids.
    pub fn order(&self) -> impl Iterator<Item = &ModuleId> {
        self.steps.iter().map(|step| &step.module_id)
    }
}
