//! # mufiz-syntax
//!
//! Table-driven, incremental, error-tolerant GLR parsing, and the MufiZ
//! grammar built on it.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! languages → Bundled grammars (MufiZ)
//!   ↓
//! parser    → GLR stack machine, error recovery, subtree reuse
//!   ↓
//! tree      → Syntax nodes, tree builder, edits, navigation, rowan export
//!   ↓
//! lexer     → Context-sensitive tokenizer over the table's lexical rules
//!   ↓
//! generate  → Grammar builder and LALR(1) table construction
//!   ↓
//! table     → Grammar tables and loaded languages
//!   ↓
//! base      → Primitives (ids, TextRange, InputEdit, TokenSet)
//! ```
//!
//! ## Example
//!
//! ```
//! use mufiz_syntax::{InputEdit, Parser, TextRange, TextSize, languages};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let parser = Parser::new(languages::mufiz());
//! let tree = parser.parse("var x = 1;")?;
//! assert_eq!(tree.to_sexp(), "(source_file (variable_declaration name: (identifier) value: (number)))");
//!
//! let range = TextRange::at(TextSize::new(8), TextSize::new(1));
//! let (text, edit) = InputEdit::splice(tree.text(), range, "2 + 3").ok_or("range off a char boundary")?;
//! let tree = parser.reparse(&text, &tree.edit(&edit))?;
//! assert_eq!(tree.text(), "var x = 2 + 3;");
//! assert!(!tree.has_error());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// MODULES (dependency order: base → table → generate → lexer → tree → parser)
// ============================================================================

/// Foundation types: symbol and state ids, text ranges, edits
pub mod base;

/// Grammar tables, validated into languages
pub mod table;

/// Grammar builder and table construction
pub mod generate;

/// Context-sensitive lexer
pub mod lexer;

/// Concrete syntax trees
pub mod tree;

/// GLR parser with error recovery and incremental reuse
pub mod parser;

/// Bundled languages
pub mod languages;

mod batch;

// Re-export foundation types
pub use base::{InputEdit, TextRange, TextSize};

pub use generate::{Grammar, GrammarError};
pub use parser::{ParseError, ParseOptions, ParseProgress, Parser};
pub use table::{GrammarTable, Language, LanguageError, TABLE_FORMAT_VERSION};
pub use tree::{EditedTree, Node, NodeRef, SyntaxTree};

pub use tokio_util::sync::CancellationToken;
