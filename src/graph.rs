//! Oriented graph: a compact adjacency matrix in which each unordered vertex
//! pair carries at most one directed edge.
//!
//! Vertex existence and pair linkage are both ternaries, stored in one
//! [`DigitArray<3>`]. Vertex `v`'s existence digit lives at the triangular
//! index `E(v) = v(v+1)/2` and the pair digit for `s < l` at
//! `C(s, l) = E(l) + (l - s)`, which interleaves a vertex's existence with
//! its connections to every lower-numbered vertex. Appending vertex `l`
//! therefore only extends the tail of the digit array, so capacity can grow
//! and shrink without any re-layout.

use std::collections::BTreeSet;

use crate::digits::DigitArray;
use crate::{Error, Result};

/// Dense vertex identifier in `[0, capacity)`.
pub type VertexId = usize;

/// Caller-visible tag carried by every present vertex.
///
/// The graph itself attaches no meaning to the two kinds; they ride along in
/// the existence ternary for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VertexKind {
    One,
    Two,
}

// Existence digit values.
const ABSENT: u64 = 0;
const PRESENT_ONE: u64 = 1;
const PRESENT_TWO: u64 = 2;

// Pair digit values.
const NOT_CONNECTED: u64 = 0;
const LOW_TO_HIGH: u64 = 1;
const HIGH_TO_LOW: u64 = 2;

/// Adjacency matrix over dense vertex ids with at most one directed edge per
/// unordered pair, packed three states to a ternary digit.
///
/// A graph of capacity `n` uses `n(n+1)/2` ternary digits, roughly
/// `0.1 * n^2` bytes.
#[derive(Debug, Clone)]
pub struct OrientedGraph {
    slots: DigitArray<3>,
}

impl OrientedGraph {
    #[inline]
    fn existence_index(v: VertexId) -> usize {
        v * (v + 1) / 2
    }

    #[inline]
    fn connection_index(s: VertexId, l: VertexId) -> usize {
        debug_assert!(s < l);
        Self::existence_index(l) + (l - s)
    }

    #[inline]
    fn pair_index(a: VertexId, b: VertexId) -> usize {
        if a < b {
            Self::connection_index(a, b)
        } else {
            Self::connection_index(b, a)
        }
    }

    /// Creates a graph able to hold vertices `0..capacity`, none of which
    /// exist yet.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: DigitArray::new(Self::existence_index(capacity)) }
    }

    /// First vertex id the current storage cannot represent.
    ///
    /// The digit length is always a triangular number `E(n)`; inverting it
    /// with an integer square root recovers `n` exactly.
    pub fn first_invalid_id(&self) -> VertexId {
        if self.slots.is_empty() {
            return 0;
        }
        let v = ((1 + 8 * self.slots.len()).isqrt() - 1) / 2;
        debug_assert_eq!(Self::existence_index(v), self.slots.len());
        v
    }

    /// Highest representable vertex id, or `None` for a zero-capacity graph.
    pub fn max_valid_id(&self) -> Option<VertexId> {
        self.first_invalid_id().checked_sub(1)
    }

    /// Resizes storage so `v` is the highest representable id. New slots are
    /// absent / not-connected.
    pub fn set_capacity_for_max_valid_id(&mut self, v: VertexId) {
        self.slots.resize_with_zeros(Self::existence_index(v + 1));
    }

    /// Resizes storage so `v` is the first id that cannot be represented,
    /// discarding all data for ids `>= v`.
    pub fn set_capacity_so_vertex_is_first_invalid(&mut self, v: VertexId) {
        self.slots.resize_with_zeros(Self::existence_index(v));
    }

    /// Growing variant of [`set_capacity_for_max_valid_id`](Self::set_capacity_for_max_valid_id).
    pub fn grow_for_max_valid_id(&mut self, v: VertexId) {
        assert!(
            v >= self.first_invalid_id(),
            "vertex {v} is already within capacity {}",
            self.first_invalid_id()
        );
        self.set_capacity_for_max_valid_id(v);
    }

    /// Shrinking variant of [`set_capacity_so_vertex_is_first_invalid`](Self::set_capacity_so_vertex_is_first_invalid).
    pub fn shrink_so_vertex_is_first_invalid(&mut self, v: VertexId) {
        assert!(
            v < self.first_invalid_id(),
            "vertex {v} is not below capacity {}",
            self.first_invalid_id()
        );
        self.set_capacity_so_vertex_is_first_invalid(v);
    }

    fn assert_in_capacity(&self, v: VertexId) {
        assert!(
            v < self.first_invalid_id(),
            "vertex {v} is beyond the graph capacity {}",
            self.first_invalid_id()
        );
    }

    fn assert_exists(&self, v: VertexId) {
        assert!(self.exists(v), "vertex {v} does not exist");
    }

    /// Whether vertex `v` is present. Requires `v` within capacity.
    pub fn exists(&self, v: VertexId) -> bool {
        self.assert_in_capacity(v);
        self.slots.digit(Self::existence_index(v)) != ABSENT
    }

    /// Creates `v` with [`VertexKind::One`].
    pub fn create_vertex(&mut self, v: VertexId) {
        self.create_vertex_with_kind(v, VertexKind::One);
    }

    /// Creates `v` with an explicit kind. `v` must be within capacity and
    /// absent.
    pub fn create_vertex_with_kind(&mut self, v: VertexId, kind: VertexKind) {
        assert!(!self.exists(v), "vertex {v} already exists");
        let digit = match kind {
            VertexKind::One => PRESENT_ONE,
            VertexKind::Two => PRESENT_TWO,
        };
        self.slots.set_digit(Self::existence_index(v), digit);
    }

    /// Kind of the present vertex `v`.
    pub fn vertex_kind(&self, v: VertexId) -> VertexKind {
        self.assert_in_capacity(v);
        match self.slots.digit(Self::existence_index(v)) {
            PRESENT_ONE => VertexKind::One,
            PRESENT_TWO => VertexKind::Two,
            _ => panic!("vertex {v} does not exist"),
        }
    }

    /// Rewrites the kind of the present vertex `v`.
    pub fn set_vertex_kind(&mut self, v: VertexId, kind: VertexKind) {
        self.assert_exists(v);
        let digit = match kind {
            VertexKind::One => PRESENT_ONE,
            VertexKind::Two => PRESENT_TWO,
        };
        self.slots.set_digit(Self::existence_index(v), digit);
    }

    /// Reads the pair slot for `{from, to}` as seen from `from`, returning
    /// `(forward, reverse)` edge flags in one digit read.
    pub fn has_linkage(&self, from: VertexId, to: VertexId) -> (bool, bool) {
        assert!(from != to, "linkage query with identical endpoints {from}");
        self.assert_exists(from);
        self.assert_exists(to);
        match self.slots.digit(Self::pair_index(from, to)) {
            NOT_CONNECTED => (false, false),
            LOW_TO_HIGH => {
                if from < to {
                    (true, false)
                } else {
                    (false, true)
                }
            }
            HIGH_TO_LOW => {
                if from > to {
                    (true, false)
                } else {
                    (false, true)
                }
            }
            digit => unreachable!("pair slot holds non-ternary digit {digit}"),
        }
    }

    /// Direction-sensitive edge membership.
    pub fn edge_exists(&self, from: VertexId, to: VertexId) -> bool {
        self.has_linkage(from, to).0
    }

    /// Inserts the directed edge `from -> to`.
    ///
    /// Returns `Ok(true)` if the edge was newly set and `Ok(false)` if it was
    /// already present. Fails with [`Error::EdgeConflict`] when the pair
    /// already carries the opposite direction; the graph is left unchanged.
    pub fn set_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool> {
        assert!(from != to, "self-edge on vertex {from}");
        self.assert_exists(from);
        self.assert_exists(to);
        let index = Self::pair_index(from, to);
        let forward = if from < to { LOW_TO_HIGH } else { HIGH_TO_LOW };
        let slot = self.slots.digit(index);
        if slot == forward {
            Ok(false)
        } else if slot == NOT_CONNECTED {
            self.slots.set_digit(index, forward);
            Ok(true)
        } else {
            Err(Error::EdgeConflict(from, to))
        }
    }

    /// Removes the directed edge `from -> to` if present.
    ///
    /// Returns whether an edge was removed; the opposite direction is left
    /// untouched and reported as `false`.
    pub fn clear_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        assert!(from != to, "self-edge on vertex {from}");
        self.assert_exists(from);
        self.assert_exists(to);
        let index = Self::pair_index(from, to);
        let forward = if from < to { LOW_TO_HIGH } else { HIGH_TO_LOW };
        if self.slots.digit(index) == forward {
            self.slots.set_digit(index, NOT_CONNECTED);
            true
        } else {
            false
        }
    }

    /// Whether the pair digit at `(v, t)` encodes an edge leaving `v`.
    #[inline]
    fn slot_points_out_of(slot: u64, v: VertexId, t: VertexId) -> bool {
        (slot == LOW_TO_HIGH) == (v < t)
    }

    /// Ids of all vertices `v` has an edge to, in ascending order.
    pub fn outgoing(&self, v: VertexId) -> BTreeSet<VertexId> {
        self.assert_exists(v);
        let mut result = BTreeSet::new();
        for t in 0..self.first_invalid_id() {
            if t == v {
                continue;
            }
            let slot = self.slots.digit(Self::pair_index(v, t));
            if slot != NOT_CONNECTED && Self::slot_points_out_of(slot, v, t) {
                result.insert(t);
            }
        }
        result
    }

    /// Ids of all vertices with an edge to `v`, in ascending order.
    pub fn incoming(&self, v: VertexId) -> BTreeSet<VertexId> {
        self.assert_exists(v);
        let mut result = BTreeSet::new();
        for t in 0..self.first_invalid_id() {
            if t == v {
                continue;
            }
            let slot = self.slots.digit(Self::pair_index(v, t));
            if slot != NOT_CONNECTED && !Self::slot_points_out_of(slot, v, t) {
                result.insert(t);
            }
        }
        result
    }

    fn degrees(&self, v: VertexId) -> (usize, usize) {
        self.assert_exists(v);
        let mut incoming = 0;
        let mut outgoing = 0;
        for t in 0..self.first_invalid_id() {
            if t == v {
                continue;
            }
            let slot = self.slots.digit(Self::pair_index(v, t));
            if slot == NOT_CONNECTED {
                continue;
            }
            if Self::slot_points_out_of(slot, v, t) {
                outgoing += 1;
            } else {
                incoming += 1;
            }
        }
        (incoming, outgoing)
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.degrees(v).1
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.degrees(v).0
    }

    fn destroy_inner(&mut self, v: VertexId, compact: bool) -> (usize, usize) {
        self.assert_exists(v);
        let mut incoming = 0;
        let mut outgoing = 0;
        for t in 0..self.first_invalid_id() {
            if t == v {
                continue;
            }
            let index = Self::pair_index(v, t);
            let slot = self.slots.digit(index);
            if slot == NOT_CONNECTED {
                continue;
            }
            if Self::slot_points_out_of(slot, v, t) {
                outgoing += 1;
            } else {
                incoming += 1;
            }
            self.slots.set_digit(index, NOT_CONNECTED);
        }
        self.slots.set_digit(Self::existence_index(v), ABSENT);

        if compact {
            // Trailing absent vertices carry no information; drop the whole run.
            if let Some(top) = self.max_valid_id() {
                if !self.exists(top) {
                    let mut first_unused = top;
                    while first_unused > 0 && !self.exists(first_unused - 1) {
                        first_unused -= 1;
                    }
                    self.shrink_so_vertex_is_first_invalid(first_unused);
                }
            }
        }
        (incoming, outgoing)
    }

    /// Destroys `v` and every edge touching it, then truncates any trailing
    /// run of absent vertices. Returns the `(incoming, outgoing)` edge counts
    /// the vertex had.
    pub fn destroy_vertex(&mut self, v: VertexId) -> (usize, usize) {
        self.destroy_inner(v, true)
    }

    /// [`destroy_vertex`](Self::destroy_vertex) without the capacity
    /// truncation pass.
    pub fn destroy_vertex_dont_compact(&mut self, v: VertexId) -> (usize, usize) {
        self.destroy_inner(v, false)
    }

    /// Destroys a vertex asserted to have no incoming edges. Returns its
    /// outgoing edge count.
    pub fn destroy_source_vertex(&mut self, v: VertexId) -> usize {
        let (incoming, outgoing) = self.destroy_inner(v, true);
        assert_eq!(incoming, 0, "vertex {v} had incoming edges");
        outgoing
    }

    pub fn destroy_source_vertex_dont_compact(&mut self, v: VertexId) -> usize {
        let (incoming, outgoing) = self.destroy_inner(v, false);
        assert_eq!(incoming, 0, "vertex {v} had incoming edges");
        outgoing
    }

    /// Destroys a vertex asserted to have no outgoing edges. Returns its
    /// incoming edge count.
    pub fn destroy_sink_vertex(&mut self, v: VertexId) -> usize {
        let (incoming, outgoing) = self.destroy_inner(v, true);
        assert_eq!(outgoing, 0, "vertex {v} had outgoing edges");
        incoming
    }

    pub fn destroy_sink_vertex_dont_compact(&mut self, v: VertexId) -> usize {
        let (incoming, outgoing) = self.destroy_inner(v, false);
        assert_eq!(outgoing, 0, "vertex {v} had outgoing edges");
        incoming
    }

    /// Destroys a vertex asserted to have no edges at all.
    pub fn destroy_isolated_vertex(&mut self, v: VertexId) {
        let (incoming, outgoing) = self.destroy_inner(v, true);
        assert_eq!((incoming, outgoing), (0, 0), "vertex {v} had edges");
    }

    pub fn destroy_isolated_vertex_dont_compact(&mut self, v: VertexId) {
        let (incoming, outgoing) = self.destroy_inner(v, false);
        assert_eq!((incoming, outgoing), (0, 0), "vertex {v} had edges");
    }
}
