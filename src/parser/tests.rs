use super::*;
use crate::base::InputEdit;
use crate::generate::{Grammar, choice, lit, optional, pattern, prec, prec_left, repeat, seq, sym};
use rstest::rstest;

fn ab() -> Arc<Language> {
    let language = Grammar::new("ab")
        .rule("S", seq([lit("a"), lit("b")]))
        .extra(pattern(r"\s+"))
        .compile()
        .unwrap();
    Arc::new(language)
}

fn statements() -> Arc<Language> {
    let language = Grammar::new("statements")
        .rule("program", repeat(sym("stmt")))
        .rule("stmt", seq([sym("word"), lit(";")]))
        .rule("word", pattern("[a-z]+"))
        .extra(pattern(r"\s+"))
        .anchor(lit(";"))
        .compile()
        .unwrap();
    Arc::new(language)
}

fn declarations() -> Arc<Language> {
    let language = Grammar::new("declarations")
        .rule("program", repeat(sym("declaration")))
        .rule(
            "declaration",
            seq([lit("var"), sym("word"), optional(seq([lit("="), sym("word")])), lit(";")]),
        )
        .rule("word", pattern("[a-z]+"))
        .extra(pattern(r"\s+"))
        .anchor(lit(";"))
        .compile()
        .unwrap();
    Arc::new(language)
}

fn arithmetic() -> Arc<Language> {
    let language = Grammar::new("arithmetic")
        .rule(
            "e",
            choice([
                prec_left(1, seq([sym("e"), lit("+"), sym("e")])),
                prec_left(2, seq([sym("e"), lit("*"), sym("e")])),
                seq([lit("("), sym("e"), lit(")")]),
                lit("n"),
            ]),
        )
        .compile()
        .unwrap();
    Arc::new(language)
}

fn parse(language: &Arc<Language>, text: &str) -> SyntaxTree {
    Parser::new(language.clone()).parse(text).unwrap()
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

fn first_named<'n>(node: &'n Node, language: &Language, name: &str) -> Option<&'n Node> {
    let symbol = language.symbol_for_name(name, true)?;
    if node.symbol() == symbol {
        return Some(node);
    }
    node.children().iter().find_map(|child| first_named(child, language, name))
}

#[test]
fn test_valid_sequence() {
    let language = ab();
    let tree = parse(&language, "ab");
    assert!(!tree.has_error());
    assert_eq!(tree.to_sexp(), "(S)");
    assert_eq!(tree.root_node().range(), range(0, 2));
    assert_eq!(tree.root().children().len(), 2);
}

#[test]
fn test_unexpected_token_becomes_error_and_missing() {
    let language = ab();
    let tree = parse(&language, "ac");
    let root = tree.root_node();
    assert_eq!(root.kind(), "S");
    assert!(tree.has_error());
    assert_eq!(tree.error_ranges(), vec![range(1, 2)]);

    let children = root.children();
    assert_eq!(children[0].text(), "a");
    assert!(!children[0].has_error());
    assert_eq!(tree.to_sexp(), r#"(S (ERROR) (MISSING "b"))"#);
}

#[test]
fn test_extras_are_folded_into_the_root() {
    let language = ab();
    let tree = parse(&language, " a  b ");
    assert!(!tree.has_error());
    assert_eq!(tree.root_node().range(), range(0, 6));
    assert_eq!(tree.root().children().len(), 5);
    assert_eq!(tree.to_sexp(), "(S)");
}

#[rstest]
#[case::empty("")]
#[case::only_noise("?!")]
#[case::truncated("a")]
#[case::reversed("ba")]
#[case::doubled("abab")]
fn test_malformed_input_still_spans_the_text(#[case] text: &str) {
    let language = ab();
    let tree = parse(&language, text);
    assert!(tree.has_error());
    assert_eq!(usize::from(tree.len()), text.len());
    assert!(!tree.error_ranges().is_empty());
}

#[test]
fn test_missing_token_at_end_of_input() {
    let language = ab();
    let tree = parse(&language, "a");
    assert_eq!(tree.to_sexp(), r#"(S (MISSING "b"))"#);
    assert_eq!(tree.error_ranges(), vec![range(1, 1)]);
}

#[test]
fn test_skipped_garbage_is_one_error_region() {
    let language = statements();
    let tree = parse(&language, "aa; $ bb;");
    assert_eq!(tree.error_ranges(), vec![range(4, 5)]);
    assert_eq!(tree.to_sexp(), "(program (stmt (word)) (ERROR) (stmt (word)))");
}

#[test]
fn test_anchor_resynchronizes() {
    let language = declarations();
    let tree = parse(&language, "var x = ) ;");
    assert_eq!(tree.error_ranges(), vec![range(6, 9)]);
    assert_eq!(tree.to_sexp(), "(program (declaration (word) (ERROR)))");
    let error = tree.root_node().descendant_for_range(range(6, 9));
    assert_eq!(error.kind(), "ERROR");
    assert_eq!(error.text(), "= )");
}

#[test]
fn test_parsing_is_idempotent() {
    let language = statements();
    let text = "aa; bb;\n cc ; ";
    assert_eq!(parse(&language, text).root(), parse(&language, text).root());
}

#[rstest]
#[case::sum_then_product("n+n*n", "(e (e) (e (e) (e)))")]
#[case::product_then_sum("n*n+n", "(e (e (e) (e)) (e))")]
#[case::left_assoc("n+n+n", "(e (e (e) (e)) (e))")]
#[case::parens("(n+n)*n", "(e (e (e (e) (e))) (e))")]
fn test_precedence_shapes_the_tree(#[case] text: &str, #[case] expected: &str) {
    let language = arithmetic();
    let tree = parse(&language, text);
    assert!(!tree.has_error());
    assert_eq!(tree.to_sexp(), expected);
}

#[test]
fn test_declared_conflict_prefers_earliest_rule() {
    let language = Grammar::new("ambiguous")
        .rule("s", choice([sym("a"), sym("b")]))
        .rule("a", seq([lit("x")]))
        .rule("b", seq([lit("x")]))
        .conflict(["a", "b"])
        .compile()
        .unwrap();
    let tree = parse(&Arc::new(language), "x");
    assert_eq!(tree.to_sexp(), "(s (a))");
}

#[test]
fn test_dynamic_precedence_picks_between_forks() {
    let language = Grammar::new("ambiguous")
        .rule("s", choice([sym("a"), sym("b")]))
        .rule("a", sym("p"))
        .rule("b", prec(2, sym("q")))
        .rule("p", seq([lit("x")]))
        .rule("q", seq([lit("x")]))
        .conflict(["p", "q"])
        .compile()
        .unwrap();
    let tree = parse(&Arc::new(language), "x");
    assert_eq!(tree.to_sexp(), "(s (b (q)))");
}

#[test]
fn test_stack_depth_limit() {
    let language = arithmetic();
    let parser = Parser::new(language).with_options(ParseOptions {
        max_stack_depth: 3,
        ..ParseOptions::default()
    });
    assert_eq!(
        parser.parse("((((n))))").unwrap_err(),
        ParseError::CapacityExceeded { limit: 3 }
    );
    assert!(parser.parse("n+n").is_ok());
}

#[test]
fn test_predicate_cancels() {
    let parser = Parser::new(ab()).with_options(ParseOptions {
        check_interval: 1,
        ..ParseOptions::default()
    });
    let mut calls = Vec::new();
    let tree = parser.parse_with("a b", None, |progress| {
        calls.push(progress.steps);
        true
    });
    assert!(tree.is_ok());
    assert!(!calls.is_empty());
    assert!(calls.windows(2).all(|w| w[0] < w[1]));

    let cancelled = parser.parse_with("a b", None, |_| false);
    assert_eq!(cancelled.unwrap_err(), ParseError::Cancelled);
}

#[test]
fn test_cancellation_token() {
    let parser = Parser::new(ab()).with_options(ParseOptions {
        check_interval: 0,
        ..ParseOptions::default()
    });
    let token = CancellationToken::new();
    assert!(parser.parse_cancellable("ab", None, &token).is_ok());
    token.cancel();
    assert_eq!(
        parser.parse_cancellable("ab", None, &token).unwrap_err(),
        ParseError::Cancelled
    );
}

#[test]
fn test_reparse_reuses_the_following_token() {
    let language = ab();
    let parser = Parser::new(language.clone());
    let tree = parser.parse("ab").unwrap();
    let (text, edit) = InputEdit::splice("ab", TextRange::empty(TextSize::new(1)), "x").unwrap();

    let reparsed = parser.reparse(&text, &tree.edit(&edit)).unwrap();
    let fresh = parser.parse(&text).unwrap();
    assert_eq!(reparsed.root(), fresh.root());
    assert_eq!(reparsed.error_ranges(), vec![range(1, 2)]);

    let old_b = tree.root().children()[1].clone();
    let new_b = reparsed.root().children().last().unwrap();
    assert!(new_b.ptr_eq(&old_b));
    assert!(!fresh.root().children().last().unwrap().ptr_eq(&old_b));
}

#[test]
fn test_reparse_reuses_untouched_statements() {
    let language = statements();
    let parser = Parser::new(language.clone());
    let old_text = "aa; bb; cc;";
    let tree = parser.parse(old_text).unwrap();
    let (text, edit) = InputEdit::splice(old_text, range(9, 10), "x").unwrap();

    let reparsed = parser.reparse(&text, &tree.edit(&edit)).unwrap();
    assert_eq!(reparsed.root(), parser.parse(&text).unwrap().root());
    assert_eq!(reparsed.text(), "aa; bb; cx;");

    let old_first = first_named(tree.root(), &language, "stmt").unwrap();
    let new_first = first_named(reparsed.root(), &language, "stmt").unwrap();
    assert!(new_first.ptr_eq(old_first));
}

#[test]
fn test_reparse_with_another_language_starts_over() {
    let parser = Parser::new(ab());
    let tree = parser.parse("ab").unwrap();
    let (text, edit) = InputEdit::splice("ab", TextRange::empty(TextSize::new(1)), " ").unwrap();
    let edited = tree.edit(&edit);

    let other = Parser::new(ab());
    let reparsed = other.reparse(&text, &edited).unwrap();
    assert_eq!(reparsed.root(), other.parse(&text).unwrap().root());
    let old_b = &tree.root().children()[1];
    assert!(!reparsed.root().children().last().unwrap().ptr_eq(old_b));
}

#[test]
fn test_reparse_with_stale_text_starts_over() {
    let parser = Parser::new(ab());
    let tree = parser.parse("ab").unwrap();
    let edited = tree.edit(&InputEdit::insert(TextSize::new(1), TextSize::new(1)));
    let reparsed = parser.reparse("ab", &edited).unwrap();
    assert_eq!(reparsed.root(), parser.parse("ab").unwrap().root());
}
