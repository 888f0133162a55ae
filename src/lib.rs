//! # PhotoPrune
//!
//! Near-duplicate photo detection with automatic keeper selection.
//!
//! PhotoPrune fingerprints every photo in a collection, groups the ones
//! that look alike and picks the best shot of each group. It features:
//!
//! - **Perceptual Fingerprints**: 64-bit mean hash plus a Laplacian sharpness score
//! - **Transitive Grouping**: union-find over Hamming distance, order independent
//! - **Quality Ranking**: resolution, sharpness and file size, weighted and deterministic
//! - **Decision Files**: JSON keep/delete plans, readable in current and legacy layouts
//! - **Non-Destructive**: nothing is ever moved or deleted

pub mod cli;
pub mod common;
pub mod duplicates;
