//! Feature battery, normalizers, distances and dimensionality reduction
//!
//! Everything here treats its input as a batched series matrix shaped
//! `(length, series_count)` (or an `(n, 2)` point matrix for the polyline
//! reducers) and computes per-series results in parallel.

pub mod dimensionality;
pub mod distances;
pub mod features;
pub mod normalization;
mod util;

pub use dimensionality::{
    paa, pip, pla_bottom_up, pla_sliding_window, ramer_douglas_peucker, sax, visvalingam,
};
pub use distances::{distance_columns, distance_matrix, Distance};
pub use features::*;
pub use normalization::{
    decimal_scaling_norm, decimal_scaling_norm_in_place, detrend, detrend_in_place, max_min_norm,
    max_min_norm_in_place, mean_norm, mean_norm_in_place, median_norm, median_norm_in_place,
    sigmoid_norm, sigmoid_norm_in_place, tanh_norm, tanh_norm_in_place, unit_length_norm,
    unit_length_norm_in_place, znorm, znorm_in_place,
};
