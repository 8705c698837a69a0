//! The fixed-order scheduler that drives the simulation.
//!
//! A [`Scheduler`] holds an ordered list of systems. Each tick it runs every
//! system in registration order, handing it the world, the shared command
//! buffer, and a [`TickCtx`] with `delta_time`, the current tick, and the
//! system's last-run tick; afterwards it flushes the command buffer, which
//! applies all structural edits atomically and advances the tick.
//!
//! Execution is single-threaded and cooperative: no preemption, no timeouts.
//! A fatal flush error (allocator exhaustion that survives a rehost) bubbles
//! out of [`tick`](Scheduler::tick) and halts the run.

use std::time::{Duration, Instant};

use ember_ecs::command::{CommandBuffer, FlushReport};
use ember_ecs::world::World;
use ember_ecs::EcsError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TickCtx / systems
// ---------------------------------------------------------------------------

/// Per-invocation timing handed to a system.
#[derive(Debug, Clone, Copy)]
pub struct TickCtx {
    /// Fixed delta time in seconds.
    pub dt: f64,
    /// The tick currently executing.
    pub current_tick: u32,
    /// The tick this system last ran at (0 if never). Compare against dirty
    /// ticks for reactive iteration.
    pub last_run_tick: u32,
}

/// A system: reads the world, writes columns in place (marking them), and
/// records structural edits on the command buffer.
pub type SystemFn = Box<dyn FnMut(&mut World, &mut CommandBuffer, TickCtx)>;

struct RegisteredSystem {
    name: String,
    func: SystemFn,
    last_run_tick: u32,
}

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Wall-clock timings for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Per-system time, in execution order.
    pub system_times: Vec<(String, Duration)>,
    /// Time spent in the command-buffer flush.
    pub flush_time: Duration,
    /// Whole-tick time.
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Runs systems in registration order and flushes once per tick.
pub struct Scheduler {
    world: World,
    commands: CommandBuffer,
    systems: Vec<RegisteredSystem>,
    fixed_dt: f64,
    ticks_executed: u64,
    last_diagnostics: TickDiagnostics,
}

impl Scheduler {
    pub fn new(world: World, config: TickConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self {
            world,
            commands: CommandBuffer::new(),
            systems: Vec::new(),
            fixed_dt: config.fixed_dt,
            ticks_executed: 0,
            last_diagnostics: TickDiagnostics::default(),
        }
    }

    /// Register a system. Systems run in registration order.
    ///
    /// # Panics
    ///
    /// Panics if a system with this name is already registered.
    pub fn add_system<F>(&mut self, name: &str, func: F)
    where
        F: FnMut(&mut World, &mut CommandBuffer, TickCtx) + 'static,
    {
        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );
        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func: Box::new(func),
            last_run_tick: 0,
        });
    }

    /// Execute one tick: every system in order, then the flush.
    ///
    /// Returns the flush report, or the fatal error that halts the run.
    pub fn tick(&mut self) -> Result<FlushReport, EcsError> {
        let tick_start = Instant::now();
        let current_tick = self.world.current_tick();
        let mut system_times = Vec::with_capacity(self.systems.len());

        for system in &mut self.systems {
            let start = Instant::now();
            let ctx = TickCtx {
                dt: self.fixed_dt,
                current_tick,
                last_run_tick: system.last_run_tick,
            };
            (system.func)(&mut self.world, &mut self.commands, ctx);
            system.last_run_tick = current_tick;
            system_times.push((system.name.clone(), start.elapsed()));
        }

        let flush_start = Instant::now();
        let report = self.commands.flush(&mut self.world)?;
        let flush_time = flush_start.elapsed();

        self.ticks_executed += 1;
        self.last_diagnostics = TickDiagnostics {
            system_times,
            flush_time,
            total_time: tick_start.elapsed(),
        };
        Ok(report)
    }

    /// Run `count` ticks, stopping at the first fatal flush error. Returns
    /// the total number of successfully applied commands.
    pub fn run_ticks(&mut self, count: u64) -> Result<u64, EcsError> {
        let mut total = 0u64;
        for _ in 0..count {
            total += self.tick()?.success_count as u64;
        }
        Ok(total)
    }

    // -- accessors ----------------------------------------------------------

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for setup and tests; simulation-time mutation
    /// belongs on the command buffer.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Record commands from outside any system (boot, tests).
    pub fn commands_mut(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    pub fn ticks_executed(&self) -> u64 {
        self.ticks_executed
    }

    /// Simulation time in seconds (`ticks * fixed_dt`; no accumulation
    /// drift).
    pub fn sim_time(&self) -> f64 {
        self.ticks_executed as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Registered system names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
