//! WebAssembly knight's tour solver.
//!
//! The search core is plain Rust, usable as an rlib; the `wasm32` build
//! additionally exports high-level functions callable from JavaScript
//! via wasm-bindgen. Squares are `(x, y)` with `x` the row in
//! `[0, height)` and `y` the column in `[0, width)`; grids cross the
//! boundary as flat row-major arrays (`cells[x * width + y]`) and paths
//! as arrays of `[x, y]` pairs.

pub mod board;
pub mod search;
pub mod types;

// ─── WASM Exports (only compiled for wasm32 target) ─────────────────────────

#[cfg(target_arch = "wasm32")]
mod wasm_exports {
    use serde::Serialize;
    use wasm_bindgen::prelude::*;

    use crate::board::MoveCache;
    use crate::search::TourSearch;
    use crate::types::{RuleSet, Square};

    #[cfg(feature = "console_error_panic_hook")]
    #[wasm_bindgen(start)]
    pub fn init() {
        console_error_panic_hook::set_once();
    }

    /// Result shape handed to JS via serde-wasm-bindgen.
    #[derive(Serialize)]
    struct TourOutcome {
        success: bool,
        /// Visited squares in order, as [x, y] pairs.
        path: Vec<[u32; 2]>,
        /// Final occupancy grid, flat row-major; all zero on failure.
        board: Vec<u32>,
        /// Squares placed during the search.
        expanded: u64,
        error: Option<String>,
    }

    impl TourOutcome {
        fn failure(total: usize, expanded: u64, error: String) -> Self {
            Self {
                success: false,
                path: Vec::new(),
                board: vec![0; total],
                expanded,
                error: Some(error),
            }
        }
    }

    /// Search for a knight's tour.
    ///
    /// `rules_flat` is (move, x, y) triples; pass an empty array for an
    /// unconstrained tour. Returns
    /// `{ success, path, board, expanded, error }`.
    #[wasm_bindgen(js_name = "findTour")]
    pub fn wasm_find_tour(
        width: usize,
        height: usize,
        start_x: usize,
        start_y: usize,
        closed_tour: bool,
        rules_flat: &[u32],
    ) -> JsValue {
        let outcome = run_tour(width, height, (start_x, start_y), closed_tour, rules_flat);
        serde_wasm_bindgen::to_value(&outcome).unwrap_or(JsValue::NULL)
    }

    fn run_tour(
        width: usize,
        height: usize,
        start: Square,
        closed_tour: bool,
        rules_flat: &[u32],
    ) -> TourOutcome {
        let total = width * height;
        if rules_flat.len() % 3 != 0 {
            return TourOutcome::failure(total, 0, "rules must be (move, x, y) triples".into());
        }
        let rules = RuleSet::from_pairs(
            rules_flat
                .chunks_exact(3)
                .map(|rule| (rule[0] as usize, (rule[1] as usize, rule[2] as usize))),
        );

        let mut search = match TourSearch::new(width, height, rules) {
            Ok(search) => search,
            Err(err) => return TourOutcome::failure(total, 0, err.to_string()),
        };
        search.closed_tour = closed_tour;

        match search.find_path(start) {
            Ok(path) => TourOutcome {
                success: true,
                path: path.iter().map(|&(x, y)| [x as u32, y as u32]).collect(),
                board: search.board().cells().to_vec(),
                expanded: search.expanded(),
                error: None,
            },
            Err(err) => TourOutcome::failure(total, search.expanded(), err.to_string()),
        }
    }

    /// Legal knight moves from (x, y), as a flat Uint32Array of (x, y)
    /// pairs. Lets the JS side run the closed-tour adjacency check on a
    /// returned path.
    #[wasm_bindgen(js_name = "legalMoves")]
    pub fn wasm_legal_moves(width: usize, height: usize, x: usize, y: usize) -> js_sys::Uint32Array {
        let flat: Vec<u32> = if x >= height || y >= width {
            Vec::new()
        } else {
            MoveCache::new(width, height)
                .moves_from((x, y))
                .iter()
                .flat_map(|&(mx, my)| [mx as u32, my as u32])
                .collect()
        };
        let arr = js_sys::Uint32Array::new_with_length(flat.len() as u32);
        arr.copy_from(&flat);
        arr
    }

    /// Ping function to verify WASM is loaded.
    #[wasm_bindgen(js_name = "ping")]
    pub fn wasm_ping() -> String {
        "WASM tour solver ready".to_string()
    }
}
