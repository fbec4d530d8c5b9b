//! splice_point — Core library for the Promo Insertion Engine.
//!
//! Finds seamless insertion points in spoken-word or music audio, scores
//! and explains them, and splices promo material in with loudness matching,
//! room tone, and crossfades.

pub mod arbiter;
pub mod buffer;
pub mod candidates;
pub mod config;
pub mod features;
pub mod loader;
pub mod loudness;
pub mod recommend;
pub mod scoring;
pub mod select;
pub mod splice;
pub mod tempo;
pub mod transcript;
