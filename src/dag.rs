//! Directed acyclic graph with a lazily maintained transitive-closure
//! sidestructure.
//!
//! The physical graph is an [`OrientedGraph`]; a second oriented graph of the
//! same capacity (the *canreach* companion) records which vertices reach
//! which. For a pair with no physical linkage the companion slot is the
//! closure relation itself; for a physically linked pair the slot is freed up
//! and doubles as a per-edge *extra ternary* of metadata. Each vertex's
//! companion row is tagged *clean* (exactly the true closure) or *dirty*
//! (possible false positives, never false negatives), which lets edge
//! removal defer the expensive recomputation to a later query that actually
//! needs it.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{OrientedGraph, VertexId, VertexKind};
use crate::{Error, Result};

// Row dirtiness rides in the companion graph's vertex kind.
const CLEAN: VertexKind = VertexKind::One;
const DIRTY: VertexKind = VertexKind::Two;

// Extra-ternary digits in `ExtraTernary::ReachWithoutLink` mode. The third
// digit is reserved and never written.
const REACHABLE_WITHOUT_EDGE: u64 = 0;
const NOT_REACHABLE_WITHOUT_EDGE: u64 = 1;

/// What the per-edge extra ternary is used for when the reach cache is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExtraTernary {
    /// The slot is left alone.
    None,
    /// The slot is caller metadata, exposed through
    /// [`Dag::extra_ternary`] / [`Dag::set_extra_ternary`].
    User,
    /// The slot records whether the edge's target stays reachable when the
    /// edge itself is ignored, which lets [`Dag::clear_edge`] keep rows clean
    /// in the common case.
    ReachWithoutLink,
}

/// Whether the transitive-closure companion is maintained at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReachCache {
    /// No companion; reachability queries fall back to depth-first search and
    /// edge mutation does no closure bookkeeping.
    Disabled,
    /// Maintain the companion, with the chosen extra-ternary use.
    Enabled { extra: ExtraTernary },
}

/// Construction-time configuration of a [`Dag`].
///
/// The combinations the system supports are exactly the values this type can
/// represent: an extra-ternary use always implies the cache, and the user and
/// reach-without-link uses exclude each other by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DagConfig {
    pub reach_cache: ReachCache,
    /// Run [`Dag::is_internally_consistent`] before and after every mutating
    /// operation, in debug builds only.
    pub consistency_check: bool,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            reach_cache: ReachCache::Enabled { extra: ExtraTernary::ReachWithoutLink },
            consistency_check: false,
        }
    }
}

/// A directed graph that refuses any edge insertion that would close a cycle.
///
/// With the reach cache enabled (the default), the cycle test behind
/// [`set_edge`](Self::set_edge) is a pair of digit reads in the common case
/// instead of a graph traversal; the price is closure bookkeeping on
/// mutation, deferred where possible via per-row dirtiness.
#[derive(Debug, Clone)]
pub struct Dag {
    graph: OrientedGraph,
    canreach: Option<OrientedGraph>,
    extra: ExtraTernary,
    consistency_check: bool,
}

impl Dag {
    /// Creates a DAG with the default configuration.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, DagConfig::default())
    }

    /// Creates a DAG with an explicit configuration.
    pub fn with_config(capacity: usize, config: DagConfig) -> Self {
        let (canreach, extra) = match config.reach_cache {
            ReachCache::Disabled => (None, ExtraTernary::None),
            ReachCache::Enabled { extra } => (Some(OrientedGraph::with_capacity(capacity)), extra),
        };
        Self {
            graph: OrientedGraph::with_capacity(capacity),
            canreach,
            extra,
            consistency_check: config.consistency_check,
        }
    }

    /// The configuration this DAG was built with.
    pub fn config(&self) -> DagConfig {
        DagConfig {
            reach_cache: match self.canreach {
                Some(_) => ReachCache::Enabled { extra: self.extra },
                None => ReachCache::Disabled,
            },
            consistency_check: self.consistency_check,
        }
    }

    fn canreach_ref(&self) -> &OrientedGraph {
        self.canreach.as_ref().expect("reach cache is enabled on this code path")
    }

    fn canreach_mut(&mut self) -> &mut OrientedGraph {
        self.canreach.as_mut().expect("reach cache is enabled on this code path")
    }

    /// Runs `op` bracketed by consistency checks when configured to.
    fn checked<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        if self.consistency_check {
            debug_assert!(self.is_internally_consistent(), "inconsistent before mutation");
        }
        let result = op(self);
        if self.consistency_check {
            debug_assert!(self.is_internally_consistent(), "inconsistent after mutation");
        }
        result
    }

    //
    // Vertex lifecycle and capacity (mirrored into the companion).
    //

    pub fn first_invalid_id(&self) -> VertexId {
        self.graph.first_invalid_id()
    }

    pub fn max_valid_id(&self) -> Option<VertexId> {
        self.graph.max_valid_id()
    }

    pub fn exists(&self, v: VertexId) -> bool {
        self.graph.exists(v)
    }

    pub fn vertex_kind(&self, v: VertexId) -> VertexKind {
        self.graph.vertex_kind(v)
    }

    pub fn set_vertex_kind(&mut self, v: VertexId, kind: VertexKind) {
        self.graph.set_vertex_kind(v, kind);
    }

    pub fn set_capacity_for_max_valid_id(&mut self, v: VertexId) {
        self.graph.set_capacity_for_max_valid_id(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.set_capacity_for_max_valid_id(v);
        }
    }

    pub fn grow_for_max_valid_id(&mut self, v: VertexId) {
        self.graph.grow_for_max_valid_id(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.set_capacity_for_max_valid_id(v);
        }
    }

    /// Resizes both structures so `v` is the first unrepresentable id,
    /// growing or shrinking as needed.
    pub fn set_capacity_so_vertex_is_first_invalid(&mut self, v: VertexId) {
        if v < self.graph.first_invalid_id() {
            self.shrink_so_vertex_is_first_invalid(v);
        } else {
            self.graph.set_capacity_so_vertex_is_first_invalid(v);
            if let Some(canreach) = self.canreach.as_mut() {
                canreach.set_capacity_so_vertex_is_first_invalid(v);
            }
        }
    }

    /// Discards all data for ids `>= v`.
    ///
    /// Discarded vertices may have carried paths between survivors, so every
    /// surviving row is conservatively marked dirty when any discarded vertex
    /// was present.
    pub fn shrink_so_vertex_is_first_invalid(&mut self, v: VertexId) {
        self.checked(|dag| dag.shrink_inner(v));
    }

    fn shrink_inner(&mut self, v: VertexId) {
        if self.canreach.is_some() {
            let discarding_present = (v..self.graph.first_invalid_id()).any(|t| self.graph.exists(t));
            if discarding_present {
                for t in 0..v {
                    if self.graph.exists(t) {
                        self.canreach_mut().set_vertex_kind(t, DIRTY);
                    }
                }
            }
        }
        self.graph.shrink_so_vertex_is_first_invalid(v);
        if let Some(canreach) = self.canreach.as_mut() {
            canreach.shrink_so_vertex_is_first_invalid(v);
        }
    }

    pub fn create_vertex(&mut self, v: VertexId) {
        self.create_vertex_with_kind(v, VertexKind::One);
    }

    pub fn create_vertex_with_kind(&mut self, v: VertexId, kind: VertexKind) {
        self.checked(|dag| {
            dag.graph.create_vertex_with_kind(v, kind);
            if let Some(canreach) = dag.canreach.as_mut() {
                // A fresh vertex reaches nothing; its row starts out exact.
                canreach.create_vertex_with_kind(v, CLEAN);
            }
        });
    }

    fn destroy_prepare(&mut self, v: VertexId) {
        if self.canreach.is_some() {
            // Rows that reached v may be left claiming paths that died with it.
            let upstream = self.incoming_reach_including_self(v);
            for a in upstream {
                if a != v {
                    self.canreach_mut().set_vertex_kind(a, DIRTY);
                }
            }
        }
    }

    fn destroy_inner(&mut self, v: VertexId, compact: bool) -> (usize, usize) {
        self.destroy_prepare(v);
        let counts = if compact {
            self.graph.destroy_vertex(v)
        } else {
            self.graph.destroy_vertex_dont_compact(v)
        };
        if let Some(canreach) = self.canreach.as_mut() {
            if compact {
                canreach.destroy_vertex(v);
            } else {
                canreach.destroy_vertex_dont_compact(v);
            }
        }
        counts
    }

    /// Destroys `v` in both structures. Returns the physical
    /// `(incoming, outgoing)` edge counts the vertex had.
    pub fn destroy_vertex(&mut self, v: VertexId) -> (usize, usize) {
        self.checked(|dag| dag.destroy_inner(v, true))
    }

    pub fn destroy_vertex_dont_compact(&mut self, v: VertexId) -> (usize, usize) {
        self.checked(|dag| dag.destroy_inner(v, false))
    }

    /// Destroys a vertex asserted to have no incoming edges; returns its
    /// outgoing edge count.
    pub fn destroy_source_vertex(&mut self, v: VertexId) -> usize {
        self.checked(|dag| {
            let (incoming, outgoing) = dag.destroy_inner(v, true);
            assert_eq!(incoming, 0, "vertex {v} had incoming edges");
            outgoing
        })
    }

    pub fn destroy_source_vertex_dont_compact(&mut self, v: VertexId) -> usize {
        self.checked(|dag| {
            let (incoming, outgoing) = dag.destroy_inner(v, false);
            assert_eq!(incoming, 0, "vertex {v} had incoming edges");
            outgoing
        })
    }

    /// Destroys a vertex asserted to have no outgoing edges; returns its
    /// incoming edge count.
    pub fn destroy_sink_vertex(&mut self, v: VertexId) -> usize {
        self.checked(|dag| {
            let (incoming, outgoing) = dag.destroy_inner(v, true);
            assert_eq!(outgoing, 0, "vertex {v} had outgoing edges");
            incoming
        })
    }

    pub fn destroy_sink_vertex_dont_compact(&mut self, v: VertexId) -> usize {
        self.checked(|dag| {
            let (incoming, outgoing) = dag.destroy_inner(v, false);
            assert_eq!(outgoing, 0, "vertex {v} had outgoing edges");
            incoming
        })
    }

    /// Destroys a vertex asserted to have no edges at all.
    pub fn destroy_isolated_vertex(&mut self, v: VertexId) {
        self.checked(|dag| {
            let counts = dag.destroy_inner(v, true);
            assert_eq!(counts, (0, 0), "vertex {v} had edges");
        });
    }

    pub fn destroy_isolated_vertex_dont_compact(&mut self, v: VertexId) {
        self.checked(|dag| {
            let counts = dag.destroy_inner(v, false);
            assert_eq!(counts, (0, 0), "vertex {v} had edges");
        });
    }

    //
    // Physical adjacency queries (pass-throughs).
    //

    pub fn edge_exists(&self, from: VertexId, to: VertexId) -> bool {
        self.graph.edge_exists(from, to)
    }

    pub fn has_linkage(&self, from: VertexId, to: VertexId) -> (bool, bool) {
        self.graph.has_linkage(from, to)
    }

    pub fn outgoing(&self, v: VertexId) -> BTreeSet<VertexId> {
        self.graph.outgoing(v)
    }

    pub fn incoming(&self, v: VertexId) -> BTreeSet<VertexId> {
        self.graph.incoming(v)
    }

    pub fn out_degree(&self, v: VertexId) -> usize {
        self.graph.out_degree(v)
    }

    pub fn in_degree(&self, v: VertexId) -> usize {
        self.graph.in_degree(v)
    }

    //
    // Extra-ternary plumbing.
    //
    // A physically linked pair's companion slot is spare; encoding: digit 0
    // when the slot holds no companion edge, 1 when it holds from -> to, 2
    // when it holds to -> from.
    //

    fn edge_stamp(&self, from: VertexId, to: VertexId) -> u64 {
        debug_assert!(self.graph.edge_exists(from, to));
        let (forward, reverse) = self.canreach_ref().has_linkage(from, to);
        if forward {
            1
        } else if reverse {
            2
        } else {
            0
        }
    }

    fn set_edge_stamp(&mut self, from: VertexId, to: VertexId, stamp: u64) {
        debug_assert!(self.graph.edge_exists(from, to));
        let canreach = self.canreach_mut();
        let (forward, reverse) = canreach.has_linkage(from, to);
        match stamp {
            0 => {
                if forward {
                    canreach.clear_edge(from, to);
                }
                if reverse {
                    canreach.clear_edge(to, from);
                }
            }
            1 => {
                if reverse {
                    canreach.clear_edge(to, from);
                }
                canreach.set_edge(from, to).expect("opposite direction was just cleared");
            }
            2 => {
                if forward {
                    canreach.clear_edge(from, to);
                }
                canreach.set_edge(to, from).expect("opposite direction was just cleared");
            }
            _ => unreachable!("extra ternary digit out of range"),
        }
    }

    /// Reads the stamp in `ReachWithoutLink` mode, where the reserved third
    /// digit must never have been stored.
    fn reach_without_link_stamp(&self, from: VertexId, to: VertexId) -> u64 {
        let stamp = self.edge_stamp(from, to);
        assert!(
            stamp <= NOT_REACHABLE_WITHOUT_EDGE,
            "edge {from} -> {to} carries the reserved extra-ternary digit"
        );
        stamp
    }

    /// Caller metadata attached to the physical edge `from -> to`.
    ///
    /// Only available under [`ExtraTernary::User`].
    pub fn extra_ternary(&self, from: VertexId, to: VertexId) -> u64 {
        assert!(
            self.extra == ExtraTernary::User,
            "extra ternary is not caller-visible in this configuration"
        );
        assert!(self.graph.edge_exists(from, to), "no edge {from} -> {to}");
        self.edge_stamp(from, to)
    }

    /// Attaches caller metadata to the physical edge `from -> to`.
    ///
    /// Only available under [`ExtraTernary::User`]. Fails with
    /// [`Error::BadDigit`] for values outside `[0, 3)`.
    pub fn set_extra_ternary(&mut self, from: VertexId, to: VertexId, digit: u64) -> Result<()> {
        assert!(
            self.extra == ExtraTernary::User,
            "extra ternary is not caller-visible in this configuration"
        );
        assert!(self.graph.edge_exists(from, to), "no edge {from} -> {to}");
        if digit >= 3 {
            return Err(Error::BadDigit(digit, 3));
        }
        self.set_edge_stamp(from, to, digit);
        Ok(())
    }

    //
    // Reach sets.
    //

    fn linked(&self, a: VertexId, b: VertexId) -> bool {
        let (forward, reverse) = self.graph.has_linkage(a, b);
        forward || reverse
    }

    /// Everything `v` reaches, including itself: the physical successors plus
    /// the companion row, skipping companion entries shadowed by a physical
    /// linkage (those slots are edge stamps, not closure data).
    fn outgoing_reach_including_self(&self, v: VertexId) -> BTreeSet<VertexId> {
        let mut reach = self.graph.outgoing(v);
        for t in self.canreach_ref().outgoing(v) {
            if !self.linked(t, v) {
                reach.insert(t);
            }
        }
        reach.insert(v);
        reach
    }

    /// Everything that reaches `v`, including itself; mirror of
    /// [`outgoing_reach_including_self`](Self::outgoing_reach_including_self).
    fn incoming_reach_including_self(&self, v: VertexId) -> BTreeSet<VertexId> {
        let mut reach = self.graph.incoming(v);
        for t in self.canreach_ref().incoming(v) {
            if !self.linked(v, t) {
                reach.insert(t);
            }
        }
        reach.insert(v);
        reach
    }

    fn set_reach_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        debug_assert!(!self.linked(from, to), "reach slot {{{from}, {to}}} is shadowed by a physical linkage");
        self.canreach_mut().set_edge(from, to).expect("stale opposite reach entries are cleared before writing")
    }

    fn clear_reach_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        debug_assert!(!self.linked(from, to), "reach slot {{{from}, {to}}} is shadowed by a physical linkage");
        self.canreach_mut().clear_edge(from, to)
    }

    //
    // Reachability.
    //

    /// Depth-first reachability over the physical graph, optionally ignoring
    /// one edge.
    fn dfs_reaches(&self, from: VertexId, to: VertexId, skip_edge: Option<(VertexId, VertexId)>) -> bool {
        let mut visited = vec![false; self.graph.first_invalid_id()];
        let mut stack = vec![from];
        visited[from] = true;
        while let Some(v) = stack.pop() {
            for t in self.graph.outgoing(v) {
                if skip_edge == Some((v, t)) {
                    continue;
                }
                if t == to {
                    return true;
                }
                if !visited[t] {
                    visited[t] = true;
                    stack.push(t);
                }
            }
        }
        false
    }

    /// All vertices reachable from `from` over physical edges, excluding
    /// `from` itself.
    fn reachable_set(&self, from: VertexId) -> BTreeSet<VertexId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<VertexId> = self.graph.outgoing(from).into_iter().collect();
        while let Some(v) = stack.pop() {
            if seen.insert(v) {
                stack.extend(self.graph.outgoing(v));
            }
        }
        seen
    }

    /// Whether a directed path `from -> ... -> to` exists.
    ///
    /// Takes `&mut self` because a dirty companion row may be cleaned on the
    /// way; the answer is unaffected by that housekeeping and repeated calls
    /// return equal results.
    pub fn can_reach(&mut self, from: VertexId, to: VertexId) -> bool {
        assert!(from != to, "reachability query with identical endpoints {from}");
        // A physical linkage is authoritative either way: a forward edge is a
        // path, and a reverse edge rules one out (it would close a cycle).
        let (forward, reverse) = self.graph.has_linkage(from, to);
        if forward {
            return true;
        }
        if reverse {
            return false;
        }
        if self.canreach.is_none() {
            return self.dfs_reaches(from, to, None);
        }
        if self.canreach_ref().vertex_kind(from) == CLEAN {
            return self.canreach_ref().edge_exists(from, to);
        }
        // Dirty rows never under-report, so a miss is final; a hit has to be
        // confirmed by cleaning the row.
        if !self.canreach_ref().edge_exists(from, to) {
            return false;
        }
        self.clean_up(from);
        self.canreach_ref().edge_exists(from, to)
    }

    /// Whether `set_edge(from, to)` would fail with a cycle.
    pub fn insertion_would_cause_cycle(&mut self, from: VertexId, to: VertexId) -> bool {
        self.can_reach(to, from)
    }

    /// Restores `from`'s companion row to exactly the true closure.
    ///
    /// Recurses into dirty physical successors first; the physical graph is
    /// acyclic, so the recursion terminates.
    fn clean_up(&mut self, from: VertexId) {
        // Strip the row of everything not shadowed by a physical linkage; it
        // is rebuilt below from the successors' reach sets.
        let row = self.canreach_ref().outgoing(from);
        for t in row {
            if !self.linked(from, t) {
                self.clear_reach_edge(from, t);
            }
        }

        let successors = self.graph.outgoing(from);
        let mut successor_reach: BTreeMap<VertexId, BTreeSet<VertexId>> = BTreeMap::new();
        for &w in &successors {
            if self.canreach_ref().vertex_kind(w) == DIRTY {
                self.clean_up(w);
            }
            let reach = self.outgoing_reach_including_self(w);
            for &x in &reach {
                if x == w {
                    continue;
                }
                if !self.graph.edge_exists(from, x) {
                    if self.canreach_ref().edge_exists(x, from) {
                        // Only a dirty row can claim to reach `from` here;
                        // drop the stale entry before writing the forward one.
                        debug_assert_eq!(self.canreach_ref().vertex_kind(x), DIRTY);
                        self.clear_reach_edge(x, from);
                    }
                    self.set_reach_edge(from, x);
                }
            }
            successor_reach.insert(w, reach);
        }

        if self.extra == ExtraTernary::ReachWithoutLink {
            // An edge stamped reachable-without-it may have lost its detour;
            // downgrade when no sibling successor reaches the target anymore.
            for &w in &successors {
                if self.reach_without_link_stamp(from, w) != REACHABLE_WITHOUT_EDGE {
                    continue;
                }
                let other_path = successors
                    .iter()
                    .any(|&other| other != w && successor_reach[&other].contains(&w));
                if !other_path {
                    self.set_edge_stamp(from, w, NOT_REACHABLE_WITHOUT_EDGE);
                }
            }
        }

        self.canreach_mut().set_vertex_kind(from, CLEAN);
    }

    //
    // Acyclic mutation.
    //

    /// Inserts the physical edge `from -> to` and updates the closure.
    ///
    /// Fails with [`Error::CycleInsertion`] when `to` already reaches `from`,
    /// leaving the graph unchanged. Returns `Ok(false)` when the edge was
    /// already present.
    pub fn set_edge(&mut self, from: VertexId, to: VertexId) -> Result<bool> {
        self.checked(|dag| dag.set_edge_inner(from, to))
    }

    fn set_edge_inner(&mut self, from: VertexId, to: VertexId) -> Result<bool> {
        if self.insertion_would_cause_cycle(from, to) {
            return Err(Error::CycleInsertion(from, to));
        }
        if self.canreach.is_none() {
            return self.graph.set_edge(from, to);
        }

        let rwl = self.extra == ExtraTernary::ReachWithoutLink;
        // Whether `to` was reachable before this edge; may inherit false
        // positives from a dirty row, which the stamp semantics tolerate.
        let reachable_prior = rwl && self.canreach_ref().edge_exists(from, to);

        if !self.graph.set_edge(from, to)? {
            return Ok(false);
        }

        if rwl {
            let stamp = if reachable_prior { REACHABLE_WITHOUT_EDGE } else { NOT_REACHABLE_WITHOUT_EDGE };
            self.set_edge_stamp(from, to, stamp);
        }

        let to_reach = self.outgoing_reach_including_self(to);
        let to_kind = self.canreach_ref().vertex_kind(to);
        let from_sources = self.incoming_reach_including_self(from);
        let from_kind = self.canreach_ref().vertex_kind(from);

        // Everything that reaches `from` now also reaches everything `to`
        // reaches. Worst case O(n^2) slot writes, each cheap.
        for &a in &from_sources {
            if rwl {
                // `a`'s physical edges into `to`'s reach set have gained a
                // detour through the new edge; promote their stamps.
                let a_successors = self.graph.outgoing(a);
                for x in a_successors {
                    if x == to && a == from {
                        continue;
                    }
                    if to_reach.contains(&x) {
                        self.set_edge_stamp(a, x, REACHABLE_WITHOUT_EDGE);
                        if to_kind == DIRTY {
                            self.canreach_mut().set_vertex_kind(a, DIRTY);
                        }
                    }
                }
            }

            for &b in &to_reach {
                if a == b {
                    continue;
                }
                let (forward, reverse) = self.graph.has_linkage(a, b);
                if forward {
                    // Physical a -> b: that pair's slot is the edge's stamp.
                    continue;
                }
                if reverse {
                    // Physical b -> a rules out a reaching b; the pair slot
                    // is that edge's stamp and stays untouched.
                    continue;
                }
                if self.canreach_ref().edge_exists(b, a) {
                    if self.canreach_ref().vertex_kind(b) == DIRTY {
                        // A stale claim left behind by an earlier removal;
                        // drop it rather than trust partial state.
                        self.clear_reach_edge(b, a);
                    } else {
                        // b's row is exact, so b really reaches a and a
                        // cannot reach b; the slot keeps the true direction
                        // and nothing is recorded for a.
                        continue;
                    }
                }
                if to_kind == DIRTY || from_kind == DIRTY || self.canreach_ref().vertex_kind(a) == DIRTY {
                    self.canreach_mut().set_vertex_kind(a, DIRTY);
                }
                self.set_reach_edge(a, b);
            }
        }

        Ok(true)
    }

    /// Removes the physical edge `from -> to` and invalidates the closure.
    ///
    /// Returns whether an edge was removed.
    pub fn clear_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        self.checked(|dag| dag.clear_edge_inner(from, to))
    }

    fn clear_edge_inner(&mut self, from: VertexId, to: VertexId) -> bool {
        if self.canreach.is_none() {
            return self.graph.clear_edge(from, to);
        }

        if self.extra == ExtraTernary::ReachWithoutLink {
            if !self.graph.edge_exists(from, to) {
                return false;
            }
            let stamp = self.reach_without_link_stamp(from, to);
            self.set_edge_stamp(from, to, 0);
            self.graph.clear_edge(from, to);

            if self.canreach_ref().vertex_kind(from) == CLEAN && stamp == REACHABLE_WITHOUT_EDGE {
                // The row is exact and the target is reachable some other
                // way, so the row stays exact: record the closure entry the
                // physical edge was standing in for and dirty nothing.
                self.set_reach_edge(from, to);
                return true;
            }
        } else if !self.graph.clear_edge(from, to) {
            return false;
        }

        // Everything upstream of `from` may have relied on this edge; dirty
        // the lot and let later queries pay for the cleaning they need.
        let upstream = self.incoming_reach_including_self(from);
        for a in upstream {
            self.canreach_mut().set_vertex_kind(a, DIRTY);
        }

        // The freed slot reverts to closure duty. Normalize whatever the
        // stamp left behind: `to` cannot reach `from` (the edge just removed
        // would have closed a cycle), while `from` may still reach `to`
        // transitively, so record that direction best-effort.
        if self.canreach_ref().edge_exists(to, from) {
            self.clear_reach_edge(to, from);
        }
        self.set_reach_edge(from, to);
        true
    }

    //
    // Debugging.
    //

    /// Verifies the companion structure against ground truth obtained by
    /// traversal: clean rows must match the true closure exactly (and their
    /// edge stamps must be honest in `ReachWithoutLink` mode), dirty rows
    /// must be supersets of it. Always true with the cache disabled.
    pub fn is_internally_consistent(&self) -> bool {
        let Some(canreach) = self.canreach.as_ref() else {
            return true;
        };
        let rwl = self.extra == ExtraTernary::ReachWithoutLink;

        for v in 0..self.graph.first_invalid_id() {
            if !self.graph.exists(v) {
                continue;
            }
            let reach_row = self.outgoing_reach_including_self(v);
            let mut true_closure = self.reachable_set(v);
            true_closure.insert(v);

            if canreach.vertex_kind(v) == CLEAN {
                if reach_row != true_closure {
                    return false;
                }
                if rwl {
                    for w in self.graph.outgoing(v) {
                        let stamp = self.edge_stamp(v, w);
                        if stamp > NOT_REACHABLE_WITHOUT_EDGE {
                            // The reserved digit must never be stored.
                            return false;
                        }
                        let without = self.dfs_reaches(v, w, Some((v, w)));
                        if (stamp == REACHABLE_WITHOUT_EDGE) != without {
                            return false;
                        }
                    }
                }
            } else if !reach_row.is_superset(&true_closure) {
                return false;
            }
        }
        true
    }
}
