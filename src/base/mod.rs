//! Foundation types for the parsing engine.
//!
//! This module provides the small value types shared by every layer:
//! - [`Symbol`], [`StateId`], [`RuleId`], [`FieldId`], [`LexModeId`] - grammar table indices
//! - [`TextRange`], [`TextSize`] - byte offsets into the source text
//! - [`InputEdit`] - a text splice consumed by the incremental reparser
//! - [`TokenSet`] - dense symbol bitset
//!
//! This module has NO dependencies on other engine modules.

mod edit;
mod ids;
mod token_set;

pub use edit::InputEdit;
pub use ids::{FieldId, LexModeId, RuleId, StateId, Symbol};
pub use token_set::TokenSet;

// Re-export text-size types for convenience
pub use text_size;
pub use text_size::{TextRange, TextSize};
