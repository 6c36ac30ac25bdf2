//! Languages bundled with the crate.

mod mufiz;

pub use mufiz::{mufiz, mufiz_grammar, try_mufiz};
