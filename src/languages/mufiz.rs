//! The MufiZ scripting language.
//!
//! Node kinds and field names follow the MufiZ tree-sitter grammar. Two
//! departures: `string` is a single token (escape sequences are not split
//! out), and `complex_number` carries no static precedence, so `1 + 2` and
//! `1 + 2i` are told apart by forking on the declared conflict.

use crate::generate::{
    Grammar, GrammarError, Rule, choice, field, lit, optional, pattern, prec, prec_left, prec_right, repeat, seq, sym,
};
use crate::table::Language;
use std::sync::{Arc, LazyLock};

static MUFIZ: LazyLock<Result<Arc<Language>, GrammarError>> = LazyLock::new(|| {
    let language = mufiz_grammar().compile()?;
    tracing::debug!(
        states = language.state_count(),
        symbols = language.symbol_count(),
        "compiled MufiZ grammar"
    );
    Ok(Arc::new(language))
});

/// The compiled MufiZ language, built on first use and shared afterwards.
///
/// # Panics
///
/// If the bundled grammar does not compile. See [`try_mufiz`].
pub fn mufiz() -> Arc<Language> {
    match try_mufiz() {
        Ok(language) => language,
        Err(error) => panic!("bundled MufiZ grammar is invalid: {error}"),
    }
}

pub fn try_mufiz() -> Result<Arc<Language>, &'static GrammarError> {
    MUFIZ.as_ref().map(Arc::clone)
}

/// Comma separated list with an optional trailing comma.
fn trailing_comma_list(item: Rule) -> Rule {
    optional(seq([item.clone(), repeat(seq([lit(","), item])), optional(lit(","))]))
}

fn binary(precedence: i32, operators: &[&str]) -> Rule {
    prec_left(
        precedence,
        seq([
            field("left", sym("_expression")),
            field("operator", choice(operators.iter().map(|op| lit(op)))),
            field("right", sym("_expression")),
        ]),
    )
}

/// The MufiZ grammar description, uncompiled.
pub fn mufiz_grammar() -> Grammar {
    Grammar::new("mufiz")
        .rule("source_file", repeat(sym("_statement")))
        .rule(
            "_statement",
            choice([
                sym("expression_statement"),
                sym("variable_declaration"),
                sym("print_statement"),
                sym("if_statement"),
                sym("while_statement"),
                sym("for_statement"),
                sym("foreach_statement"),
                sym("function_declaration"),
                sym("class_declaration"),
                sym("return_statement"),
                sym("block_statement"),
            ]),
        )
        .rule("expression_statement", seq([sym("_expression"), lit(";")]))
        .rule(
            "variable_declaration",
            seq([
                lit("var"),
                field("name", sym("identifier")),
                optional(seq([lit("="), field("value", sym("_expression"))])),
                lit(";"),
            ]),
        )
        .rule(
            "print_statement",
            seq([lit("print"), field("value", sym("_expression")), lit(";")]),
        )
        .rule(
            "if_statement",
            prec_right(
                0,
                seq([
                    lit("if"),
                    lit("("),
                    field("condition", sym("_expression")),
                    lit(")"),
                    field("then", sym("_statement")),
                    optional(seq([lit("else"), field("else", sym("_statement"))])),
                ]),
            ),
        )
        .rule(
            "while_statement",
            seq([
                lit("while"),
                lit("("),
                field("condition", sym("_expression")),
                lit(")"),
                field("body", sym("_statement")),
            ]),
        )
        .rule(
            "for_statement",
            seq([
                lit("for"),
                lit("("),
                optional(field(
                    "init",
                    choice([sym("variable_declaration"), seq([sym("_expression"), lit(";")])]),
                )),
                optional(field("condition", sym("_expression"))),
                lit(";"),
                optional(field("update", sym("_expression"))),
                lit(")"),
                field("body", sym("_statement")),
            ]),
        )
        .rule(
            "foreach_statement",
            seq([
                lit("foreach"),
                lit("("),
                field("variable", sym("identifier")),
                lit("in"),
                field("iterable", sym("_expression")),
                lit(")"),
                field("body", sym("_statement")),
            ]),
        )
        .rule(
            "function_declaration",
            seq([
                lit("fun"),
                field("name", sym("identifier")),
                lit("("),
                field("parameters", optional(sym("parameter_list"))),
                lit(")"),
                field("body", sym("block_statement")),
            ]),
        )
        .rule(
            "class_declaration",
            seq([
                lit("class"),
                field("name", sym("identifier")),
                optional(seq([lit("<"), field("superclass", sym("identifier"))])),
                field("body", sym("class_body")),
            ]),
        )
        .rule(
            "class_body",
            seq([
                lit("{"),
                repeat(choice([sym("method_declaration"), sym("function_declaration")])),
                lit("}"),
            ]),
        )
        .rule(
            "method_declaration",
            seq([
                field("name", sym("identifier")),
                lit("("),
                field("parameters", optional(sym("parameter_list"))),
                lit(")"),
                field("body", sym("block_statement")),
            ]),
        )
        .rule(
            "parameter_list",
            seq([sym("identifier"), repeat(seq([lit(","), sym("identifier")]))]),
        )
        .rule(
            "return_statement",
            seq([lit("return"), optional(field("value", sym("_expression"))), lit(";")]),
        )
        .rule("block_statement", seq([lit("{"), repeat(sym("_statement")), lit("}")]))
        .rule(
            "_expression",
            choice([
                sym("assignment_expression"),
                sym("logical_or_expression"),
                sym("logical_and_expression"),
                sym("equality_expression"),
                sym("comparison_expression"),
                sym("addition_expression"),
                sym("multiplication_expression"),
                sym("unary_expression"),
                sym("call_expression"),
                sym("member_expression"),
                sym("index_expression"),
                sym("identifier"),
                sym("number"),
                sym("string"),
                sym("boolean"),
                sym("nil"),
                sym("complex_number"),
                sym("vector_literal"),
                sym("hash_table_literal"),
                sym("linked_list_literal"),
                sym("parenthesized_expression"),
                sym("self"),
                sym("super"),
            ]),
        )
        .rule(
            "assignment_expression",
            prec_right(
                1,
                seq([
                    field(
                        "left",
                        choice([sym("identifier"), sym("member_expression"), sym("index_expression")]),
                    ),
                    lit("="),
                    field("right", sym("_expression")),
                ]),
            ),
        )
        .rule("logical_or_expression", binary(2, &["or"]))
        .rule("logical_and_expression", binary(3, &["and"]))
        .rule("equality_expression", binary(4, &["==", "!="]))
        .rule("comparison_expression", binary(5, &[">", ">=", "<", "<="]))
        .rule("addition_expression", binary(6, &["+", "-"]))
        .rule("multiplication_expression", binary(7, &["*", "/", "%"]))
        .rule(
            "unary_expression",
            prec(
                8,
                seq([
                    field("operator", choice([lit("!"), lit("-"), lit("+")])),
                    field("operand", sym("_expression")),
                ]),
            ),
        )
        .rule(
            "call_expression",
            prec_left(
                9,
                seq([
                    field("function", sym("_expression")),
                    lit("("),
                    field("arguments", optional(sym("argument_list"))),
                    lit(")"),
                ]),
            ),
        )
        .rule(
            "member_expression",
            prec_left(
                10,
                seq([
                    field("object", sym("_expression")),
                    lit("."),
                    field("property", sym("identifier")),
                ]),
            ),
        )
        .rule(
            "index_expression",
            prec_left(
                11,
                seq([
                    field("object", sym("_expression")),
                    lit("["),
                    field("index", sym("_expression")),
                    lit("]"),
                ]),
            ),
        )
        .rule(
            "argument_list",
            seq([sym("_expression"), repeat(seq([lit(","), sym("_expression")]))]),
        )
        .rule(
            "vector_literal",
            seq([lit("{"), trailing_comma_list(sym("_expression")), lit("}")]),
        )
        .rule(
            "hash_table_literal",
            seq([lit("table"), lit("{"), trailing_comma_list(sym("hash_pair")), lit("}")]),
        )
        .rule(
            "hash_pair",
            seq([
                field("key", sym("_expression")),
                lit(":"),
                field("value", sym("_expression")),
            ]),
        )
        .rule(
            "linked_list_literal",
            seq([lit("list"), lit("{"), trailing_comma_list(sym("_expression")), lit("}")]),
        )
        .rule(
            "parenthesized_expression",
            seq([lit("("), sym("_expression"), lit(")")]),
        )
        .rule(
            "complex_number",
            seq([
                field("real", sym("number")),
                choice([lit("+"), lit("-")]),
                field("imaginary", sym("number")),
                lit("i"),
            ]),
        )
        .rule("identifier", pattern("[a-zA-Z_][a-zA-Z0-9_]*"))
        .rule("number", choice([pattern(r"[0-9]+\.[0-9]+"), pattern("[0-9]+")]))
        .rule(
            "string",
            pattern(concat!(
                r#""([^"\\\n]|\\([\\'"nrtbf]|u[0-9a-fA-F]{4}|x[0-9a-fA-F]{2}|[0-7]{1,3}))*""#,
                "|",
                r#"'([^'\\\n]|\\([\\'"nrtbf]|u[0-9a-fA-F]{4}|x[0-9a-fA-F]{2}|[0-7]{1,3}))*'"#,
            )),
        )
        .rule("boolean", choice([lit("true"), lit("false")]))
        .rule("nil", lit("nil"))
        .rule("self", lit("self"))
        .rule("super", lit("super"))
        .rule(
            "comment",
            choice([
                seq([lit("//"), pattern(r"[^\r\n]*")]),
                seq([lit("/*"), pattern(r"[^*]*\*+([^/*][^*]*\*+)*"), lit("/")]),
            ]),
        )
        .extra(pattern(r"\s+"))
        .extra(sym("comment"))
        .conflict(["block_statement", "vector_literal"])
        .conflict(["_expression", "complex_number"])
        .anchor(lit(";"))
        .anchor(lit("}"))
}
