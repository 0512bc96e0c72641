//! Per-process solver state.
//!
//! A [`ProcessContext`] is created once per rank and passed explicitly to
//! every operation that needs the communicator, the subdomain or the
//! persistent fields.
//!
//! # Example
//! ```rust,ignore
//! let comm = ThreadComm::solo();
//! let disc = GridDiscretization::new(64, 64, 100, 0.01)?;
//! let mut ctx = ProcessContext::new(comm, disc, SolverOptions::default())?;
//! ctx.report_topology()?;
//! let mut newton = NewtonSolver::new(&ctx);
//! for _ in 0..ctx.discretization.nt {
//!     ctx.begin_time_step();
//!     newton.step(&mut ctx)?;
//! }
//! ```

pub mod process_context;
pub use process_context::ProcessContext;
