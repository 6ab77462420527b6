//! Pass scheduler for the local optimization pipeline.
//!
//! The [`PassScheduler`] runs an ordered set of [`BlockPass`]es over a block until a complete
//! round reports no mutation, then moves on to the next block. Routines are independent of
//! each other, so [`PassScheduler::run_on_routines`] optimizes them on rayon workers, one
//! routine per task.

use log::{debug, trace, warn};
use rayon::prelude::*;

use crate::{
    ir::{BlockId, Routine},
    opt::{const_fold, const_load, id_fold, ins_combine, reg_move_prop, util, EventKind, EventLog},
    Result,
};

/// A local optimization that works on one block at a time.
///
/// Passes must be thread-safe (Send + Sync) so one scheduler can serve several workers.
pub trait BlockPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// The event recorded when the pass changes something.
    fn event_kind(&self) -> EventKind {
        EventKind::InstructionCombined
    }

    /// Runs the pass once over `block`.
    ///
    /// Returns the number of mutations, zero if the block was left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass hits a graph integrity violation.
    fn run_on_block(&self, routine: &mut Routine, block: BlockId) -> Result<usize>;
}

macro_rules! block_pass {
    ($(#[$doc:meta])* $name:ident, $func:path, $label:literal, $kind:expr, $description:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl BlockPass for $name {
            fn name(&self) -> &'static str {
                $label
            }

            fn description(&self) -> &'static str {
                $description
            }

            fn event_kind(&self) -> EventKind {
                $kind
            }

            fn run_on_block(&self, routine: &mut Routine, block: BlockId) -> Result<usize> {
                $func(routine, block)
            }
        }
    };
}

block_pass!(
    /// Evaluates instructions with literal inputs, see [`const_fold::const_fold`].
    ConstFoldPass,
    const_fold::const_fold,
    "const_fold",
    EventKind::ConstantFolded,
    "Evaluates instructions whose operands are all constants"
);

block_pass!(
    /// Merges structurally identical values, see [`id_fold::id_fold`].
    IdFoldPass,
    id_fold::id_fold,
    "id_fold",
    EventKind::ValueDeduplicated,
    "Replaces values with an identical earlier value"
);

block_pass!(
    /// Peephole simplifications, see [`ins_combine::ins_combine`].
    InsCombinePass,
    ins_combine::ins_combine,
    "ins_combine",
    EventKind::InstructionCombined,
    "Applies algebraic identities and shortens cast chains"
);

block_pass!(
    /// Loads from read-only image memory, see [`const_load::const_load`].
    ConstLoadPass,
    const_load::const_load,
    "const_load",
    EventKind::LoadResolved,
    "Replaces loads from read-only sections with their contents"
);

block_pass!(
    /// Register read forwarding, see [`reg_move_prop::reg_move_prop`].
    RegMovePropPass,
    reg_move_prop::reg_move_prop,
    "reg_move_prop",
    EventKind::RegisterPropagated,
    "Forwards register writes to later reads and removes dead writes"
);

block_pass!(
    /// Standalone dead code elimination, see [`util::local_dce`].
    ///
    /// Every other pass already cleans up after itself; this one is for pipelines that
    /// mutate blocks through other means.
    DcePass,
    util::local_dce,
    "dce",
    EventKind::InstructionRemoved,
    "Removes unused instructions without side effects"
);

/// Configuration for the [`PassScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum rounds over one block before giving up on a fixpoint (default: 32).
    pub max_iterations: usize,

    /// Optimize routines on the rayon thread pool (default: true).
    pub parallel: bool,

    /// Validate each routine after optimizing it (default: on in debug builds).
    pub validate: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 32,
            parallel: true,
            validate: cfg!(debug_assertions),
        }
    }
}

/// Runs block passes to a fixpoint.
///
/// # Examples
///
/// ```rust
/// use ironlift::prelude::*;
///
/// let mut routine = Routine::new();
/// let block = routine.add_block();
/// let sum = routine.push_back(
///     block,
///     Instruction::binop(Type::I32, Op::Add, Constant::I32(2), Constant::I32(3)),
/// )?;
/// let write = routine.push_back(block, Instruction::write_reg(Register::new(0, 1), sum, Type::I32))?;
///
/// let scheduler = PassScheduler::standard();
/// assert!(scheduler.run_on_block(&mut routine, block)? > 0);
/// assert_eq!(routine[write].const_operand(1), Some(&Constant::I32(5)));
/// # Ok::<(), ironlift::Error>(())
/// ```
pub struct PassScheduler {
    config: SchedulerConfig,
    passes: Vec<Box<dyn BlockPass>>,
    events: EventLog,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::standard()
    }
}

impl PassScheduler {
    /// Creates a scheduler without passes.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            events: EventLog::new(),
        }
    }

    /// Creates a scheduler with the default configuration and the standard pipeline:
    /// register propagation first, then folding, combination and load resolution, with a
    /// second folding sweep over what the loads produced.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(SchedulerConfig::default())
            .with_pass(RegMovePropPass)
            .with_pass(ConstFoldPass)
            .with_pass(IdFoldPass)
            .with_pass(InsCombinePass)
            .with_pass(ConstLoadPass)
            .with_pass(ConstFoldPass)
            .with_pass(IdFoldPass)
    }

    /// Appends a pass to the pipeline.
    #[must_use]
    pub fn with_pass(mut self, pass: impl BlockPass + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Names of the passes in pipeline order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Runs every pass once over `block` and returns the summed mutation count.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass.
    pub fn run_round(&self, routine: &mut Routine, block: BlockId) -> Result<usize> {
        let mut total = 0;
        for pass in &self.passes {
            let n = match pass.run_on_block(routine, block) {
                Ok(n) => n,
                Err(error) => {
                    self.events.error(format!("{} failed on {block}: {error}", pass.name()));
                    return Err(error);
                }
            };
            if n > 0 {
                trace!("{}: {n} mutation(s) in {block}", pass.name());
                self.events
                    .record(pass.event_kind())
                    .routine(routine.ip())
                    .block(block)
                    .count(n)
                    .pass(pass.name());
            }
            total += n;
        }
        Ok(total)
    }

    /// Runs rounds over `block` until one reports no mutation or the iteration limit is hit.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass.
    pub fn run_on_block(&self, routine: &mut Routine, block: BlockId) -> Result<usize> {
        let mut total = 0;
        for _ in 0..self.config.max_iterations {
            let n = self.run_round(routine, block)?;
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }

        warn!(
            "{block} did not converge within {} rounds",
            self.config.max_iterations
        );
        self.events.warn(format!(
            "{block} did not converge within {} rounds",
            self.config.max_iterations
        ));
        Ok(total)
    }

    /// Optimizes every block of `routine`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass, or the validation failure when
    /// [`SchedulerConfig::validate`] is set.
    pub fn run_on_routine(&self, routine: &mut Routine) -> Result<usize> {
        let mut total = 0;
        for block in routine.block_ids() {
            total += self.run_on_block(routine, block)?;
        }

        if self.config.validate {
            routine.validate()?;
        }

        debug!("{routine}: {total} mutation(s)", routine = RoutineName(routine));
        self.events
            .record(EventKind::RoutineOptimized)
            .routine(routine.ip())
            .count(total);
        Ok(total)
    }

    /// Optimizes many routines, in parallel when [`SchedulerConfig::parallel`] is set.
    ///
    /// # Errors
    ///
    /// Returns an error raised while optimizing any routine.
    pub fn run_on_routines(&self, routines: &mut [Routine]) -> Result<usize> {
        if self.config.parallel {
            routines
                .par_iter_mut()
                .map(|routine| self.run_on_routine(routine))
                .try_reduce(|| 0, |a, b| Ok(a + b))
        } else {
            routines
                .iter_mut()
                .map(|routine| self.run_on_routine(routine))
                .sum()
        }
    }
}

/// Short routine label for log lines.
struct RoutineName<'a>(&'a Routine);

impl std::fmt::Display for RoutineName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.ip() {
            Some(ip) => write!(f, "sub_{ip:x}"),
            None => write!(f, "routine"),
        }
    }
}
