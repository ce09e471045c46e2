//! The tour search engine.
//!
//! Depth-first backtracking over the knight-move tree, with rule
//! enforcement, the "lonely neighbors first" ordering, and closed-tour
//! acceptance. The recursion is flattened into an explicit frame stack:
//! depth equals board occupancy, and the wasm32 call stack is too
//! shallow to carry one native frame per visited square on large boards.

use crate::board::{Board, MoveCache};
use crate::types::{cell_key, RuleSet, Square};
use log::{debug, trace};
use std::collections::HashSet;
use thiserror::Error;

/// Why a search (or its setup) failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TourError {
    #[error("board dimensions must be positive (got {width}x{height})")]
    EmptyBoard { width: usize, height: usize },

    #[error("start square ({x}, {y}) is outside the board")]
    StartOutOfBounds { x: usize, y: usize },

    #[error("rule indices are 1-based; index 0 is invalid")]
    RuleIndexZero,

    #[error("rule for move {index} names square ({x}, {y}) outside the board")]
    RuleOutOfBounds { index: usize, x: usize, y: usize },

    /// Backtracking emptied the stack: no tour satisfies the given
    /// start, rules and closed-tour flag.
    #[error("search space exhausted without finding a tour")]
    Exhausted,

    /// The caller-set placement budget ran out first.
    #[error("search stopped after {0} placements without finding a tour")]
    ExpansionLimit(u64),
}

/// Candidate ordering for unconstrained moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveOrdering {
    /// Fewest onward moves first (Warnsdorff-style). The default.
    #[default]
    LonelyFirst,
    /// Raw move-cache enumeration order. Finds the same tours, usually
    /// much more slowly; exists so the heuristic stays an optimization
    /// rather than a correctness dependency.
    CacheOrder,
}

/// One backtracking frame: a placed square plus the candidates not yet
/// tried below it.
struct Frame {
    square: Square,
    candidates: Vec<Square>,
    next: usize,
}

/// Search context for one board configuration.
///
/// Owns everything a search touches (occupancy, move cache, rules,
/// path, closed set), so a single `&mut self` call is the whole
/// concurrency story. `find_path` resets the per-search state on entry;
/// a context is reusable across unrelated searches.
pub struct TourSearch {
    board: Board,
    moves: MoveCache,
    rules: RuleSet,
    /// Require the final square to be a knight move away from the start.
    pub closed_tour: bool,
    /// Candidate ordering for unconstrained moves.
    pub ordering: MoveOrdering,
    /// Optional placement budget; `None` searches to exhaustion.
    pub expansion_limit: Option<u64>,
    path: Vec<Square>,
    closed_positions: HashSet<u32>,
    expanded: u64,
}

impl TourSearch {
    /// Build a context for a `width`x`height` board under `rules`.
    ///
    /// Rejects empty boards, 0 rule indices and rule squares that are
    /// off the board. Rule indices beyond `width * height` are accepted;
    /// they only reserve their square, which matches treating an
    /// unreachable rule as a dead end rather than an input error.
    pub fn new(width: usize, height: usize, rules: RuleSet) -> Result<Self, TourError> {
        if width == 0 || height == 0 {
            return Err(TourError::EmptyBoard { width, height });
        }
        let board = Board::new(width, height);
        for (index, (x, y)) in rules.iter() {
            if index == 0 {
                return Err(TourError::RuleIndexZero);
            }
            if !board.in_bounds(x, y) {
                return Err(TourError::RuleOutOfBounds { index, x, y });
            }
        }
        Ok(Self {
            moves: MoveCache::new(width, height),
            board,
            rules,
            closed_tour: false,
            ordering: MoveOrdering::default(),
            expansion_limit: None,
            path: Vec::new(),
            closed_positions: HashSet::new(),
            expanded: 0,
        })
    }

    /// Board occupancy after the last search (the full tour on success,
    /// all zero after exhaustion).
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Squares placed by the most recent `find_path` call.
    pub fn expanded(&self) -> u64 {
        self.expanded
    }

    /// Search for a tour from `start`.
    ///
    /// Returns the full visiting order (`width * height` squares) of the
    /// first tour found, or `Exhausted` once backtracking has run the
    /// whole tree dry. Acceptance short-circuits: no sibling branch is
    /// explored after the first complete tour.
    pub fn find_path(&mut self, start: Square) -> Result<Vec<Square>, TourError> {
        let (sx, sy) = start;
        if !self.board.in_bounds(sx, sy) {
            return Err(TourError::StartOutOfBounds { x: sx, y: sy });
        }

        self.board.reset();
        self.path.clear();
        self.expanded = 0;
        self.closed_positions.clear();
        if self.closed_tour {
            // Acceptance only ever compares against the start's own
            // neighborhood, so this is computed once up front.
            self.closed_positions.extend(
                self.moves
                    .moves_from(start)
                    .iter()
                    .map(|&(x, y)| cell_key(x, y)),
            );
        }

        let total = self.board.total();
        let mut frames: Vec<Frame> = Vec::with_capacity(total);
        let mut pending = Some(start);

        loop {
            if let Some(square) = pending.take() {
                let step = self.path.len() as u32 + 1;
                self.board.mark(square, step);
                self.path.push(square);
                self.expanded += 1;
                if let Some(limit) = self.expansion_limit {
                    if self.expanded > limit {
                        return Err(TourError::ExpansionLimit(limit));
                    }
                }
                trace!("visiting ({}, {}) as move {step}", square.0, square.1);

                if step as usize == total {
                    if !self.closed_tour
                        || self.closed_positions.contains(&cell_key(square.0, square.1))
                    {
                        debug!("tour found after {} placements", self.expanded);
                        return Ok(std::mem::take(&mut self.path));
                    }
                    // Complete but not closed: retreat and let the
                    // parent frame try its next candidate.
                    trace!("complete path ends off the start's neighborhood, rejecting");
                    self.board.clear(square);
                    self.path.pop();
                    if self.path.is_empty() {
                        return Err(TourError::Exhausted);
                    }
                } else {
                    let candidates = self.candidates_below(square, step as usize);
                    frames.push(Frame {
                        square,
                        candidates,
                        next: 0,
                    });
                }
            } else if let Some(frame) = frames.last_mut() {
                if frame.next < frame.candidates.len() {
                    pending = Some(frame.candidates[frame.next]);
                    frame.next += 1;
                } else {
                    // Every branch below this square failed: undo the
                    // placement and resume at the parent.
                    let square = frame.square;
                    frames.pop();
                    self.board.clear(square);
                    self.path.pop();
                    if let Some(&(px, py)) = self.path.last() {
                        trace!("going back to ({px}, {py})");
                    }
                }
            } else {
                return Err(TourError::Exhausted);
            }
        }
    }

    /// Candidate squares for the move after `step`, placed at `square`.
    ///
    /// A rule for the next move narrows the choice to that single square
    /// when it is reachable and still free, and dead-ends the branch
    /// otherwise. Without a rule, the unvisited unreserved neighbors in
    /// the configured order.
    fn candidates_below(&self, square: Square, step: usize) -> Vec<Square> {
        match self.rules.forced(step + 1) {
            Some(forced) => {
                if self.board.step_at(forced) == 0
                    && self.moves.moves_from(square).contains(&forced)
                {
                    debug!(
                        "obeying rule: move {} -> ({}, {})",
                        step + 1,
                        forced.0,
                        forced.1
                    );
                    vec![forced]
                } else {
                    trace!(
                        "rule for move {} is unreachable from ({}, {})",
                        step + 1,
                        square.0,
                        square.1
                    );
                    Vec::new()
                }
            }
            None => self.sort_lonely_neighbors(square),
        }
    }

    /// Unvisited, unreserved neighbors of `from`, loneliest first.
    ///
    /// A candidate scores by how many of its own onward moves land on
    /// unvisited squares; the ascending stable sort claims hard-to-reach
    /// squares before they get stranded. Ties keep enumeration order.
    fn sort_lonely_neighbors(&self, from: Square) -> Vec<Square> {
        let mut empty_neighbors: Vec<Square> = Vec::new();
        for &candidate in self.moves.moves_from(from) {
            if self.board.step_at(candidate) == 0 && !self.rules.is_reserved(candidate) {
                empty_neighbors.push(candidate);
            }
        }
        if self.ordering == MoveOrdering::CacheOrder {
            return empty_neighbors;
        }

        let mut scored: Vec<(Square, usize)> = empty_neighbors
            .into_iter()
            .map(|candidate| (candidate, self.unvisited_degree(candidate)))
            .collect();
        scored.sort_by_key(|&(_, onward)| onward);
        scored.into_iter().map(|(square, _)| square).collect()
    }

    /// Onward legal moves from `square` that land on unvisited squares.
    /// Reservations are not rechecked at this second level.
    fn unvisited_degree(&self, square: Square) -> usize {
        self.moves
            .moves_from(square)
            .iter()
            .filter(|&&sq| self.board.step_at(sq) == 0)
            .count()
    }
}
