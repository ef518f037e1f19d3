//! # acyclic
//!
//! An in-memory directed acyclic graph that rejects cycle-forming edge
//! insertions in amortized constant time, built on a packed base-3 adjacency
//! matrix that stores the whole graph in roughly `0.1 * n^2` bytes.
//!
//! Three layers, each usable on its own:
//!
//! - [`DigitArray`]: a dense array of radix-`R` digits packed many to a
//!   machine word through a compile-time power table.
//! - [`OrientedGraph`]: vertex existence plus at-most-one-directed-edge per
//!   unordered vertex pair, as ternary digits over a triangular pair
//!   enumeration that makes capacity growth a pure tail extension.
//! - [`Dag`]: acyclic mutation on top, backed by a second oriented graph
//!   holding the transitive closure, with per-row dirtiness so edge removal
//!   can defer recomputation until a query actually needs the answer.
//!
//! ## Design contract
//!
//! - **Single-threaded by design**: no internal synchronization, no blocking;
//!   every operation runs to completion on the calling thread.
//! - **Recoverable vs. programmer errors**: cycle rejections and direction
//!   conflicts come back as [`Error`] values; operating on absent vertices or
//!   self-pairs is a precondition violation and panics.
//! - **Dirty rows over-report, never under-report**: a negative reachability
//!   answer is always exact, even while the closure is stale.
//!
//! ## References
//!
//! - Italiano (1986): amortized maintenance of transitive closure under edge
//!   insertion.
//! - La Poutré & van Leeuwen (1988): maintenance of transitive closures and
//!   reductions of dynamic graphs.

pub mod dag;
pub mod digits;
pub mod graph;

pub use dag::{Dag, DagConfig, ExtraTernary, ReachCache};
pub use digits::DigitArray;
pub use graph::{OrientedGraph, VertexId, VertexKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("inserting edge {0} -> {1} would create a cycle")]
    CycleInsertion(VertexId, VertexId),
    #[error("pair {{{0}, {1}}} already carries an edge in the opposite direction")]
    EdgeConflict(VertexId, VertexId),
    #[error("digit {0} is not a valid base-{1} digit")]
    BadDigit(u64, u64),
    #[error("index {0} out of range for length {1}")]
    IndexOutOfRange(usize, usize),
}

pub type Result<T> = std::result::Result<T, Error>;
