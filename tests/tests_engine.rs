//! End-to-end behavior of the engine on small grammars.

use mufiz_syntax::generate::{Grammar, choice, lit, pattern, prec_left, repeat, seq, sym};
use mufiz_syntax::{InputEdit, Language, LanguageError, ParseError, ParseOptions, Parser, TextRange, TextSize};
use rstest::{fixture, rstest};
use std::sync::Arc;

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(TextSize::new(start), TextSize::new(end))
}

#[fixture]
fn ab() -> Arc<Language> {
    let language = Grammar::new("ab")
        .rule("S", seq([lit("a"), lit("b")]))
        .extra(pattern(r"\s+"))
        .compile()
        .unwrap();
    Arc::new(language)
}

#[fixture]
fn calc() -> Arc<Language> {
    let language = Grammar::new("calc")
        .rule("program", repeat(sym("statement")))
        .rule("statement", seq([sym("_expr"), lit(";")]))
        .rule(
            "_expr",
            choice([sym("binary"), sym("group"), sym("number"), sym("name")]),
        )
        .rule(
            "binary",
            choice([
                prec_left(1, seq([sym("_expr"), lit("+"), sym("_expr")])),
                prec_left(2, seq([sym("_expr"), lit("*"), sym("_expr")])),
            ]),
        )
        .rule("group", seq([lit("("), sym("_expr"), lit(")")]))
        .rule("number", pattern("[0-9]+"))
        .rule("name", pattern("[a-z]+"))
        .extra(pattern(r"\s+"))
        .anchor(lit(";"))
        .compile()
        .unwrap();
    Arc::new(language)
}

#[rstest]
fn test_valid_input_has_no_errors(calc: Arc<Language>) {
    let text = "1 + 2 * x;\n(a + b) * 3;";
    let tree = Parser::new(calc).parse(text).unwrap();
    assert!(!tree.has_error());
    assert!(tree.error_ranges().is_empty());
    assert_eq!(tree.root_node().range(), range(0, text.len() as u32));
    assert_eq!(tree.root_node().kind(), "program");
    assert_eq!(tree.root_node().named_children().len(), 2);
}

#[rstest]
fn test_two_token_grammar(ab: Arc<Language>) {
    let parser = Parser::new(ab);

    let tree = parser.parse("ab").unwrap();
    let root = tree.root_node();
    assert_eq!(root.kind(), "S");
    let children = root.children();
    assert_eq!(children.len(), 2);
    assert_eq!((children[0].kind(), children[0].text()), ("a", "a"));
    assert_eq!((children[1].kind(), children[1].text()), ("b", "b"));

    let tree = parser.parse("ac").unwrap();
    let root = tree.root_node();
    assert_eq!(root.kind(), "S");
    assert_eq!(root.child(0).unwrap().text(), "a");
    assert!(!root.child(0).unwrap().has_error());
    assert_eq!(tree.error_ranges(), vec![range(1, 2)]);
    assert_eq!(root.descendant_for_range(range(1, 2)).kind(), "ERROR");
}

#[rstest]
#[case::unknown_character("1 + $;", range(2, 5))]
#[case::missing_terminator("1 + 2 junk;", range(5, 5))]
#[case::missing_operand("(1 +) * 2;", range(4, 4))]
fn test_single_error_region(calc: Arc<Language>, #[case] text: &str, #[case] expected: TextRange) {
    let tree = Parser::new(calc).parse(text).unwrap();
    assert_eq!(tree.error_ranges(), vec![expected], "{}", tree.to_sexp());
}

#[rstest]
fn test_statements_after_an_error_parse_normally(calc: Arc<Language>) {
    let tree = Parser::new(calc).parse("1 + ;\n2 * 3;").unwrap();
    assert!(tree.has_error());
    let last = tree.root_node().named_children().into_iter().last().unwrap();
    assert_eq!(last.kind(), "statement");
    assert!(!last.has_error());
    assert_eq!(last.text(), "2 * 3;");
}

#[rstest]
#[case("")]
#[case(";;;")]
#[case("((((")]
#[case("1 2 3")]
#[case("\u{e9}\u{1f600} + 1;")]
fn test_parsing_never_fails_on_malformed_text(calc: Arc<Language>, #[case] text: &str) {
    let tree = Parser::new(calc).parse(text).unwrap();
    assert_eq!(usize::from(tree.len()), text.len());
    assert_eq!(tree.to_cst().text().to_string(), text);
}

#[rstest]
fn test_parsing_is_deterministic(calc: Arc<Language>) {
    let parser = Parser::new(calc);
    let text = "a * (b + 1;\n2 + + 3; c;";
    let first = parser.parse(text).unwrap();
    let second = parser.parse(text).unwrap();
    assert_eq!(first.root(), second.root());
    assert_eq!(first.to_sexp(), second.to_sexp());
}

#[rstest]
fn test_reparse_reuses_the_token_after_an_insertion(ab: Arc<Language>) {
    let parser = Parser::new(ab);
    let tree = parser.parse("ab").unwrap();
    let (text, edit) = InputEdit::splice("ab", range(1, 1), "x").unwrap();
    assert_eq!(text, "axb");

    let reparsed = parser.reparse(&text, &tree.edit(&edit)).unwrap();
    assert_eq!(reparsed.root(), parser.parse(&text).unwrap().root());

    let old_b = tree.root_node().child(1).unwrap();
    let new_b = reparsed.root_node().children().into_iter().last().unwrap();
    assert!(new_b.node().ptr_eq(old_b.node()));
    assert_eq!(new_b.range(), range(2, 3));
}

#[rstest]
#[case::drop_terminator_before_operator("1 (2 ;*a ", range(4, 6), "")]
#[case::restore_terminator("1 (2*a ", range(4, 4), " ;")]
#[case::close_group("1 (2 ;*a ", range(9, 9), ");")]
fn test_reparse_after_recovery_matches_fresh_parse(
    calc: Arc<Language>,
    #[case] text: &str,
    #[case] edited: TextRange,
    #[case] replacement: &str,
) {
    let parser = Parser::new(calc);
    let tree = parser.parse(text).unwrap();
    assert!(tree.has_error());

    let (new_text, edit) = InputEdit::splice(text, edited, replacement).unwrap();
    let reparsed = parser.reparse(&new_text, &tree.edit(&edit)).unwrap();
    let fresh = parser.parse(&new_text).unwrap();
    assert_eq!(reparsed.root(), fresh.root(), "{} vs {}", reparsed.to_sexp(), fresh.to_sexp());
    assert_eq!(reparsed.error_ranges(), fresh.error_ranges());
}

#[rstest]
fn test_capacity_limit(calc: Arc<Language>) {
    let parser = Parser::new(calc).with_options(ParseOptions {
        max_stack_depth: 64,
        ..ParseOptions::default()
    });
    let deep = format!("{}1{};", "(".repeat(100), ")".repeat(100));
    assert_eq!(
        parser.parse(&deep).unwrap_err(),
        ParseError::CapacityExceeded { limit: 64 }
    );
    assert!(parser.parse("((1));").is_ok());
}

#[rstest]
fn test_cancelled_parse_leaves_previous_tree_alone(calc: Arc<Language>) {
    let parser = Parser::new(calc).with_options(ParseOptions {
        check_interval: 1,
        ..ParseOptions::default()
    });
    let tree = parser.parse("1;").unwrap();
    let (text, edit) = InputEdit::splice("1;", range(0, 1), "2 + 3").unwrap();
    let edited = tree.edit(&edit);

    let token = mufiz_syntax::CancellationToken::new();
    token.cancel();
    assert_eq!(
        parser.parse_cancellable(&text, Some(&edited), &token).unwrap_err(),
        ParseError::Cancelled
    );
    assert_eq!(tree.text(), "1;");
    assert_eq!(tree.root(), parser.parse("1;").unwrap().root());
    assert!(parser.reparse(&text, &edited).is_ok());
}

#[test]
fn test_unsupported_table_version_is_rejected() {
    let mut table = Grammar::new("ab").rule("S", seq([lit("a"), lit("b")])).build().unwrap();
    table.version += 1;
    let err = Language::new(table).unwrap_err();
    assert!(matches!(err, LanguageError::VersionMismatch { found, supported } if found == supported + 1));
}

#[test]
fn test_malformed_table_is_rejected() {
    let mut table = Grammar::new("ab").rule("S", seq([lit("a"), lit("b")])).build().unwrap();
    table.gotos.pop();
    assert!(matches!(Language::new(table), Err(LanguageError::Malformed(_))));
}

#[test]
fn test_language_and_tree_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Language>();
    assert_send_sync::<mufiz_syntax::SyntaxTree>();
    assert_send_sync::<mufiz_syntax::EditedTree>();
    assert_send_sync::<Parser>();
}
