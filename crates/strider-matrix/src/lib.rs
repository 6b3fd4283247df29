//! Matrix-profile core for the Strider analytics engine
//!
//! The all-pairs similarity join over z-normalized sliding windows and its
//! derived operations:
//!
//! - `matrix_profile` / `matrix_profile_lr` — SCAMP joins (self, two-series
//!   and split left/right), the default path.
//! - `stomp` — the incremental-recurrence join with memory-aware two-level
//!   tiling.
//! - `mass` — batched distance profiles of explicit queries.
//! - `find_best_n_motifs` / `find_best_n_discords` /
//!   `find_best_n_occurrences` — ranked discovery with exclusion zones.
//! - `mpdist` / `mpdist_vector` / `snippets` — the ABBA-profile distance
//!   and representative-subsequence selection.
//! - `cac` / `segment` — corrected arc curve and regime segmentation.
//! - `chains` — bidirectionally confirmed neighbor chains.
//!
//! Every operation is stateless: tiling loops are deterministic, failures
//! surface immediately, and partial results are never returned.

mod discover;
mod join;
mod mpdist;
mod profile;
mod segment;

pub use discover::{find_best_n_discords, find_best_n_motifs, find_best_n_occurrences};
pub use join::{matrix_profile, matrix_profile_lr, no_neighbor_sentinel, scamp_ab, scamp_self, stomp};
pub use mpdist::{mpdist, mpdist_vector, snippets, Snippet};
pub use profile::mass;
pub use segment::{cac, chains, segment};
