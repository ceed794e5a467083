//! Grammar tests for the playbook parser
//!
//! These tests verify that the parser accepts every Bosun language construct
//! and rejects malformed input at the right place.

use crate::{
    error::ErrorCode,
    parser,
    tree::{ParseTree, Rule},
};

/// Helper function to parse a source string and return the tree or the
/// rendered error
fn parse_source(source: &str) -> Result<ParseTree, String> {
    parser::parse(source).map_err(|err| format!("Parser error: {}", err))
}

/// Helper function to parse a source string and assert success
fn assert_parses_successfully(source: &str) -> ParseTree {
    match parse_source(source) {
        Ok(tree) => tree,
        Err(e) => panic!("Expected parsing to succeed, but got error: {}", e),
    }
}

/// Helper function to parse a source string and assert failure
fn assert_parse_fails(source: &str) {
    if parse_source(source).is_ok() {
        panic!("Expected parsing to fail, but it succeeded: {source:?}");
    }
}

/// Helper to check the reported error position (1-based)
fn assert_error_at_position(source: &str, line: usize, column: usize) {
    let err = parser::parse(source).expect_err("Expected parsing to fail");
    let diagnostic = &err.diagnostics()[0];
    let expected = format!("line {line}, column {column}");

    assert!(
        diagnostic.message().contains(&expected),
        "Expected error at {expected}, got: {}",
        diagnostic.message()
    );
}

/// Rules of the root's children, in order
fn top_level_rules(tree: &ParseTree) -> Vec<Rule> {
    tree.children(tree.root()).map(|id| tree.rule(id)).collect()
}

fn count(tree: &ParseTree, rule: Rule) -> usize {
    tree.iter().filter(|id| tree.rule(*id) == rule).count()
}

#[cfg(test)]
mod attribute_tests {
    use super::*;

    #[test]
    fn test_string_attribute() {
        let tree = assert_parses_successfully("name: 'my-playbook'");
        assert_eq!(top_level_rules(&tree), vec![Rule::Pair]);
    }

    #[test]
    fn test_numbers() {
        assert_parses_successfully("a: 1");
        assert_parses_successfully("a: -1");
        assert_parses_successfully("a: 3.25");
        assert_parses_successfully("a: -0.5");
    }

    #[test]
    fn test_malformed_numbers() {
        assert_parse_fails("a: 1.");
        assert_parse_fails("a: .5");
        assert_parse_fails("a: 12abc");
    }

    #[test]
    fn test_booleans() {
        assert_parses_successfully("a: true\nb: false");
    }

    #[test]
    fn test_arrays_require_trailing_comma() {
        assert_parses_successfully("a: [1, 2, 3,]");
        assert_parses_successfully("a: [ 'x' , ]");
        assert_parses_successfully("a: [,]");
        assert_parse_fails("a: [1, 2]");
        assert_parse_fails("a: []");
    }

    #[test]
    fn test_objects() {
        assert_parses_successfully("a: {}");
        assert_parses_successfully("a: { x: 1 }");
        assert_parses_successfully("a: { x: 1, y: 'z', }");
        assert_parses_successfully("a: { 'spaced key': { nested: [true,], }, }");
        assert_parse_fails("a: { x: 1 y: 2 }");
        assert_parse_fails("a: { , }");
    }

    #[test]
    fn test_function_calls() {
        assert_parses_successfully("a: concat('x', 'y',)");
        assert_parses_successfully("a: now(,)");
        assert_parses_successfully("a: upper(vars.name,)");
        assert_parses_successfully("a: join([1, 2,], ', ',)");
        assert_parse_fails("a: concat('x', 'y')");
        assert_parse_fails("a: now()");
    }

    #[test]
    fn test_math_expressions() {
        let tree = assert_parses_successfully("a: 1 + 2 * (3 - vars.n) / len(vars.list,)");
        assert_eq!(count(&tree, Rule::Operator), 4);
        assert_parses_successfully("a: vars.count+1");
        assert_parse_fails("a: 1 +");
        assert_parse_fails("a: (1 + 2");
    }

    #[test]
    fn test_comments_everywhere() {
        let source = r#"
            # leading comment
            name: 'x' # trailing comment
            task [t] { # after brace
                debug: { msg: 'hi', } # after pair
            }
            # final comment without newline"#;
        assert_parses_successfully(source);
    }
}

#[cfg(test)]
mod string_tests {
    use super::*;

    #[test]
    fn test_single_quoted() {
        assert_parses_successfully("a: 'with \"double\" quotes inside'");
        assert_parses_successfully("a: ''");
    }

    #[test]
    fn test_double_quotes_rejected() {
        assert_parse_fails("a: \"text\"");
        assert_error_at_position("a: \"text\"", 1, 4);
    }

    #[test]
    fn test_newline_in_string_rejected() {
        assert_parse_fails("a: 'line one\nline two'");
    }

    #[test]
    fn test_unterminated_string() {
        let err = parser::parse("a: 'open").unwrap_err();
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E101));
    }
}

#[cfg(test)]
mod index_tests {
    use super::*;

    #[test]
    fn test_dotted_index() {
        let tree = assert_parses_successfully("a: vars.db.host");
        assert_eq!(count(&tree, Rule::IndexExpr), 1);
        assert_eq!(count(&tree, Rule::IndexSegment), 2);
    }

    #[test]
    fn test_bracket_index() {
        let tree = assert_parses_successfully("a: state[create bucket].output[0]");
        assert_eq!(count(&tree, Rule::Sentence), 2);
        assert_eq!(count(&tree, Rule::IndexSegment), 1);
    }

    #[test]
    fn test_bracket_index_rejects_surrounding_space() {
        assert_parse_fails("a: a[ x]");
        assert_parse_fails("a: a[x ]");
    }

    #[test]
    fn test_bracket_index_rejects_comment_and_newline() {
        assert_parse_fails("a: a[x#y]");
        assert_parse_fails("a: a[x\ny]");
    }

    #[test]
    fn test_dot_segment_rejects_space() {
        assert_parse_fails("a: vars. x");
        assert_parse_fails("a: vars.x y");
    }

    #[test]
    fn test_bare_identifier_is_not_a_value() {
        assert_parse_fails("a: vars");
    }
}

#[cfg(test)]
mod block_tests {
    use super::*;

    #[test]
    fn test_simple_block() {
        let tree = assert_parses_successfully(
            "task [install packages] {\n  module: 'debug'\n  args: { msg: 'x', }\n}",
        );
        assert_eq!(top_level_rules(&tree), vec![Rule::SimpleBlock]);
        assert_eq!(count(&tree, Rule::Pair), 3);
    }

    #[test]
    fn test_simple_block_needs_a_pair() {
        assert_parse_fails("task [empty] { }");
    }

    #[test]
    fn test_description_edges() {
        assert_parse_fails("task [ padded] { debug: {} }");
        assert_parse_fails("task [padded ] { debug: {} }");
        assert_parse_fails("task [] { debug: {} }");
    }

    #[test]
    fn test_compound_block_with_clauses() {
        let tree = assert_parses_successfully(
            r#"
            block {
                name: 'provision'
                task [a] { debug: {} }
                task [b] { debug: {} }
            } rescue {
                task [c] { debug: {} }
            } always {
                task [d] { debug: {} }
            }
            "#,
        );

        assert_eq!(top_level_rules(&tree), vec![Rule::CompoundBlock]);
        assert_eq!(count(&tree, Rule::SimpleBlock), 4);
        assert_eq!(count(&tree, Rule::Body), 1);
        assert_eq!(count(&tree, Rule::Rescue), 1);
        assert_eq!(count(&tree, Rule::Always), 1);
    }

    #[test]
    fn test_always_without_rescue() {
        assert_parses_successfully("block { name: 'x' t [a] { debug: {} } } always { t [b] { debug: {} } }");
    }

    #[test]
    fn test_nested_compound_blocks() {
        let tree = assert_parses_successfully(
            r#"
            block {
                name: 'outer'
                block {
                    name: 'inner'
                    task [deep] { debug: {} }
                } rescue {
                    block { name: 'deeper' task [x] { debug: {} } }
                }
            }
            "#,
        );
        assert_eq!(count(&tree, Rule::CompoundBlock), 3);
    }

    #[test]
    fn test_compound_block_needs_a_task() {
        assert_parse_fails("block { name: 'empty' }");
        assert_parse_fails("block { name: 'x' task [a] { debug: {} } } rescue { }");
    }

    #[test]
    fn test_keyword_boundaries() {
        // `blocky` is a simple block label, not the `block` keyword
        assert_parses_successfully("blocky [x] { debug: {} }");
        assert_parse_fails("block { name: 'x' t [a] { debug: {} } } rescuer { t [b] { debug: {} } }");
    }

    #[test]
    fn test_error_inside_block_points_at_it() {
        let source = "task [a] {\n  debug: { msg: 'x' }\n  retries: @\n}";
        assert_error_at_position(source, 3, 12);
    }
}

#[cfg(test)]
mod tree_tests {
    use super::*;

    #[test]
    fn test_children_within_parent_span() {
        let tree = assert_parses_successfully(
            "name: 'x'\ntask [a] { debug: { msg: concat('a', vars.b,), } }",
        );

        for id in tree.iter() {
            for child in tree.children(id) {
                assert!(tree.span(id).contains(tree.span(child)));
                assert_eq!(tree.parent(child), Some(id));
            }
        }
    }

    #[test]
    fn test_empty_string_leaf_is_kept() {
        // The quotes make the match two bytes wide.
        let tree = assert_parses_successfully("a: ''");
        assert_eq!(count(&tree, Rule::String), 1);
    }
}

#[cfg(test)]
mod nesting_tests {
    use std::time::{Duration, Instant};

    use super::*;

    /// Generous for debug builds; backtracking blowups take minutes here.
    const BUDGET: Duration = Duration::from_secs(2);

    /// `f(f(...1,) + 1,) + 1` with `depth` calls
    fn nested_calls(depth: usize) -> String {
        format!("a: {}1{}", "f(".repeat(depth), ",) + 1".repeat(depth))
    }

    fn timed<T>(parse: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = parse();
        assert!(
            started.elapsed() < BUDGET,
            "parse took {:?}",
            started.elapsed()
        );
        result
    }

    #[test]
    fn test_nested_calls_followed_by_operators() {
        let source = nested_calls(25);
        let tree = timed(|| assert_parses_successfully(&source));

        assert_eq!(count(&tree, Rule::FunExpr), 25);
        assert_eq!(count(&tree, Rule::Operator), 25);
    }

    #[test]
    fn test_nested_calls_failing_late() {
        // No trailing commas, so every call fails after its arguments.
        for depth in [25, 40] {
            let source = format!("a: {}1{}", "f(".repeat(depth), ")".repeat(depth));
            timed(|| assert_parse_fails(&source));
        }
    }

    #[test]
    fn test_nested_index_arguments() {
        let source = format!("a: {}vars.x{}", "f(".repeat(25), ",)".repeat(25));
        let tree = timed(|| assert_parses_successfully(&source));

        assert_eq!(count(&tree, Rule::IndexExpr), 1);
    }
}
