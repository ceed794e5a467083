//! Scannerless PEG parser for Bosun playbooks.
//!
//! The grammar is written as ordered-choice recursive descent on top of
//! winnow. Every rule returns an owned [`Match`]; a failed alternative leaves
//! nothing behind and winnow restores the input position. The public entry
//! point is [`parse`], which materializes the root match into a
//! [`ParseTree`].
//!
//! Diagnostics follow the PEG "furthest failure" convention: every terminal
//! reports its failure offset and what it expected to a [`Tracker`] carried
//! in the stream state, and a failed parse is reported at the furthest offset
//! any alternative reached.

use std::cell::{Cell, RefCell};

use log::{debug, trace};
use winnow::{
    Parser as _,
    combinator::{alt, delimited, not, opt, preceded, repeat, terminated},
    error::{ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stateful, Stream},
    token::{literal, one_of, take_while},
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    span::{LineColumn, Span},
    tree::{Match, ParseTree, Rule},
};

/// Deepest nesting of values and blocks accepted before the parser gives up.
const MAX_NESTING: usize = 64;

/// Failure bookkeeping shared by every rule during one parse.
#[derive(Debug, Default)]
struct Tracker {
    furthest: Cell<usize>,
    expected: RefCell<Vec<&'static str>>,
    depth: Cell<usize>,
}

impl Tracker {
    /// Record that `label` was expected at `offset`.
    fn fail(&self, offset: usize, label: &'static str) {
        let furthest = self.furthest.get();
        let mut expected = self.expected.borrow_mut();
        if offset > furthest {
            self.furthest.set(offset);
            expected.clear();
            expected.push(label);
        } else if offset == furthest && !expected.contains(&label) {
            expected.push(label);
        }
    }
}

type Input<'s> = Stateful<LocatingSlice<&'s str>, &'s Tracker>;
type PResult<O> = ModalResult<O>;

fn backtrack() -> ErrMode<ContextError> {
    ErrMode::Backtrack(ContextError::new())
}

fn offset(input: &Input<'_>) -> usize {
    input.current_token_start()
}

fn span_from(input: &Input<'_>, start: usize) -> Span {
    Span::new(start..offset(input))
}

/// Wrap a terminal so that its failure is reported to the tracker.
fn expect<'s, O, P>(
    label: &'static str,
    mut parser: P,
) -> impl winnow::Parser<Input<'s>, O, ErrMode<ContextError>>
where
    P: winnow::Parser<Input<'s>, O, ErrMode<ContextError>>,
{
    move |input: &mut Input<'s>| {
        let start = offset(input);
        match parser.parse_next(input) {
            Err(ErrMode::Backtrack(err)) => {
                input.state.fail(start, label);
                Err(ErrMode::Backtrack(err))
            }
            result => result,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// A keyword that must not run into an identifier character.
fn keyword<'s>(
    word: &'static str,
    label: &'static str,
) -> impl winnow::Parser<Input<'s>, (), ErrMode<ContextError>> {
    expect(
        label,
        terminated(literal(word), not(one_of(is_ident_char))).void(),
    )
}

/// Run `parser` one nesting level deeper, refusing past [`MAX_NESTING`].
fn nested<'s>(
    input: &mut Input<'s>,
    parser: fn(&mut Input<'s>) -> PResult<Match>,
) -> PResult<Match> {
    let depth = input.state.depth.get();
    if depth >= MAX_NESTING {
        input.state.fail(offset(input), "shallower nesting");
        return Err(backtrack());
    }
    input.state.depth.set(depth + 1);
    let result = parser(input);
    input.state.depth.set(depth);
    result
}

// ---------------------------------------------------------------------------
// Whitespace and comments
// ---------------------------------------------------------------------------

/// `# ...` up to (not including) the end of the line
fn comment(input: &mut Input<'_>) -> PResult<()> {
    ('#', take_while(0.., |c: char| c != '\n'))
        .void()
        .parse_next(input)
}

/// Zero or more whitespace characters and comments
fn ws(input: &mut Input<'_>) -> PResult<()> {
    repeat(
        0..,
        alt((take_while(1.., char::is_whitespace).void(), comment)),
    )
    .parse_next(input)
}

// ---------------------------------------------------------------------------
// Lexical rules
// ---------------------------------------------------------------------------

/// Alpha followed by alphanumerics or `-`
fn ident(input: &mut Input<'_>) -> PResult<Match> {
    expect(
        "identifier",
        (
            one_of(|c: char| c.is_ascii_alphabetic()),
            take_while(0.., is_ident_char),
        ),
    )
    .span()
    .map(|range| Match::leaf(Rule::Ident, range.into()))
    .parse_next(input)
}

/// Single-quoted string; no escapes, no newlines
fn string(input: &mut Input<'_>) -> PResult<Match> {
    (
        expect("string", '\''),
        take_while(0.., |c: char| c != '\'' && c != '\n'),
        expect("closing `'`", '\''),
    )
        .span()
        .map(|range| Match::leaf(Rule::String, range.into()))
        .parse_next(input)
}

fn digits<'s>(input: &mut Input<'s>) -> PResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_digit()).parse_next(input)
}

/// `-? digit+ (. digit+)?`
fn number(input: &mut Input<'_>) -> PResult<Match> {
    (
        opt('-'),
        expect("number", digits),
        opt(('.', digits)),
        not(one_of(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )
        .span()
        .map(|range| Match::leaf(Rule::Number, range.into()))
        .parse_next(input)
}

fn bool_expr(input: &mut Input<'_>) -> PResult<Match> {
    alt((keyword("true", "`true`"), keyword("false", "`false`")))
        .span()
        .map(|range| Match::leaf(Rule::Bool, range.into()))
        .parse_next(input)
}

/// Bracketed text: no newline, `#` or `]`, and no surrounding whitespace.
fn sentence(input: &mut Input<'_>) -> PResult<Match> {
    expect(
        "text without surrounding spaces",
        take_while(1.., |c: char| c != ']' && c != '\n' && c != '\r' && c != '#').verify(
            |text: &str| {
                !text.starts_with(char::is_whitespace) && !text.ends_with(char::is_whitespace)
            },
        ),
    )
    .span()
    .map(|range| Match::leaf(Rule::Sentence, range.into()))
    .parse_next(input)
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Calls, index expressions and numbers all go through `math_expr`, which
/// hands back a lone operand unchanged. Each of them is tried once per
/// position, so nested calls parse in linear time.
fn value(input: &mut Input<'_>) -> PResult<Match> {
    nested(input, |input| {
        alt((array, bool_expr, math_expr, object, string)).parse_next(input)
    })
}

/// Values separated by commas, surrounding whitespace included.
fn value_list(input: &mut Input<'_>) -> PResult<Vec<Match>> {
    let Some(first) = opt(terminated(value, ws)).parse_next(input)? else {
        return Ok(Vec::new());
    };
    let rest: Vec<Match> =
        repeat(0.., preceded((expect("`,`", ','), ws), terminated(value, ws))).parse_next(input)?;

    let mut values = Vec::with_capacity(rest.len() + 1);
    values.push(first);
    values.extend(rest);
    Ok(values)
}

/// `[ (value (, value)*)? , ]`; the trailing comma is mandatory
fn array(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    (expect("`[`", '['), ws).parse_next(input)?;
    let items = value_list(input)?;
    (expect("`,`", ','), ws, expect("`]`", ']')).parse_next(input)?;
    Ok(Match::node(Rule::Array, span_from(input, start), items))
}

/// `{ (pair (, pair)* ,?)? }`
fn object(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    (expect("`{`", '{'), ws).parse_next(input)?;

    let mut pairs = Vec::new();
    if let Some(first) = opt(terminated(pair, ws)).parse_next(input)? {
        pairs.push(first);
        let rest: Vec<Match> =
            repeat(0.., preceded((expect("`,`", ','), ws), terminated(pair, ws)))
                .parse_next(input)?;
        pairs.extend(rest);
        opt((expect("`,`", ','), ws)).parse_next(input)?;
    }

    expect("`}`", '}').parse_next(input)?;
    Ok(Match::node(Rule::Object, span_from(input, start), pairs))
}

/// `name( (value (, value)*)? , )`
fn fun_expr(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    let name = ident(input)?;
    (expect("`(`", '('), ws).parse_next(input)?;
    let args = value_list(input)?;
    (expect("`,`", ','), ws, expect("`)`", ')')).parse_next(input)?;

    let mut children = Vec::with_capacity(args.len() + 1);
    children.push(name);
    children.extend(args);
    Ok(Match::node(Rule::FunExpr, span_from(input, start), children))
}

fn dot_segment(input: &mut Input<'_>) -> PResult<Match> {
    preceded(
        expect("`.`", '.'),
        expect("index segment", take_while(1.., is_segment_char)).span(),
    )
    .map(|range| Match::leaf(Rule::IndexSegment, range.into()))
    .parse_next(input)
}

fn bracket_segment(input: &mut Input<'_>) -> PResult<Match> {
    delimited(expect("`[`", '['), sentence, expect("`]`", ']')).parse_next(input)
}

/// `head ( .segment | [sentence] )+`
fn index_expr(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    let head = ident(input)?;
    let segments: Vec<Match> =
        repeat(1.., alt((dot_segment, bracket_segment))).parse_next(input)?;

    let mut children = Vec::with_capacity(segments.len() + 1);
    children.push(head);
    children.extend(segments);
    Ok(Match::node(Rule::IndexExpr, span_from(input, start), children))
}

fn operator<'s>(
    ops: [char; 2],
) -> impl winnow::Parser<Input<'s>, Match, ErrMode<ContextError>> {
    one_of(ops)
        .span()
        .map(|range| Match::leaf(Rule::Operator, range.into()))
}

/// Fold `first (op operand)*` into a node, or return `first` alone.
fn binary_chain(rule: Rule, start: usize, first: Match, rest: Vec<(Match, Match)>, end: usize) -> Match {
    if rest.is_empty() {
        return first;
    }
    let mut children = Vec::with_capacity(rest.len() * 2 + 1);
    children.push(first);
    for (op, operand) in rest {
        children.push(op);
        children.push(operand);
    }
    Match::node(rule, Span::new(start..end), children)
}

fn math_atom(input: &mut Input<'_>) -> PResult<Match> {
    alt((
        number,
        delimited((expect("`(`", '('), ws), math_expr, (ws, expect("`)`", ')'))),
        fun_expr,
        index_expr,
    ))
    .parse_next(input)
}

fn math_term(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    let first = math_atom(input)?;
    let rest: Vec<(Match, Match)> =
        repeat(0.., (preceded(ws, operator(['*', '/'])), preceded(ws, math_atom)))
            .parse_next(input)?;
    Ok(binary_chain(Rule::MathTerm, start, first, rest, offset(input)))
}

fn math_expr(input: &mut Input<'_>) -> PResult<Match> {
    nested(input, |input| {
        let start = offset(input);
        let first = math_term(input)?;
        let rest: Vec<(Match, Match)> =
            repeat(0.., (preceded(ws, operator(['+', '-'])), preceded(ws, math_term)))
                .parse_next(input)?;
        Ok(binary_chain(Rule::MathExpr, start, first, rest, offset(input)))
    })
}

/// `(ident | string) : value`
fn pair(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    let key = alt((ident, string)).parse_next(input)?;
    (ws, expect("`:`", ':'), ws).parse_next(input)?;
    let value = value(input)?;
    Ok(Match::node(Rule::Pair, span_from(input, start), vec![key, value]))
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

fn block(input: &mut Input<'_>) -> PResult<Match> {
    nested(input, |input| alt((simple_block, compound_block)).parse_next(input))
}

/// `label [description] { pair+ }`
fn simple_block(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    let label = ident(input)?;
    (ws, expect("`[`", '[')).parse_next(input)?;
    let description = sentence(input)?;
    (expect("`]`", ']'), ws, expect("`{`", '{'), ws).parse_next(input)?;
    let pairs: Vec<Match> = repeat(1.., terminated(pair, ws)).parse_next(input)?;
    expect("`}`", '}').parse_next(input)?;

    let mut children = Vec::with_capacity(pairs.len() + 2);
    children.push(label);
    children.push(description);
    children.extend(pairs);
    Ok(Match::node(Rule::SimpleBlock, span_from(input, start), children))
}

/// One or more blocks wrapped in a node of their own.
fn blocks(input: &mut Input<'_>, rule: Rule) -> PResult<Match> {
    let start = offset(input);
    let blocks: Vec<Match> = repeat(1.., terminated(block, ws)).parse_next(input)?;
    let end = blocks.last().map_or(start, |last| last.span.end());
    Ok(Match::node(rule, Span::new(start..end), blocks))
}

/// `keyword { block+ }`
fn clause(
    input: &mut Input<'_>,
    word: &'static str,
    label: &'static str,
    rule: Rule,
) -> PResult<Match> {
    let start = offset(input);
    (keyword(word, label), ws, expect("`{`", '{'), ws).parse_next(input)?;
    let body = blocks(input, Rule::Body)?;
    expect("`}`", '}').parse_next(input)?;
    Ok(Match::node(rule, span_from(input, start), body.children))
}

fn rescue_clause(input: &mut Input<'_>) -> PResult<Match> {
    clause(input, "rescue", "`rescue`", Rule::Rescue)
}

fn always_clause(input: &mut Input<'_>) -> PResult<Match> {
    clause(input, "always", "`always`", Rule::Always)
}

/// `block { pair* block+ } rescue_clause? always_clause?`
fn compound_block(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    (keyword("block", "`block`"), ws, expect("`{`", '{'), ws).parse_next(input)?;
    let mut children: Vec<Match> = repeat(0.., terminated(pair, ws)).parse_next(input)?;
    children.push(blocks(input, Rule::Body)?);
    expect("`}`", '}').parse_next(input)?;

    if let Some(rescue) = opt(preceded(ws, rescue_clause)).parse_next(input)? {
        children.push(rescue);
    }
    if let Some(always) = opt(preceded(ws, always_clause)).parse_next(input)? {
        children.push(always);
    }

    Ok(Match::node(Rule::CompoundBlock, span_from(input, start), children))
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

fn statement(input: &mut Input<'_>) -> PResult<Match> {
    alt((pair, block)).parse_next(input)
}

fn end(input: &mut Input<'_>) -> PResult<()> {
    if input.eof_offset() == 0 {
        Ok(())
    } else {
        input.state.fail(offset(input), "end of input");
        Err(backtrack())
    }
}

/// `all_space* (statement all_space*)* end`
fn entry(input: &mut Input<'_>) -> PResult<Match> {
    let start = offset(input);
    ws(input)?;
    let statements: Vec<Match> = repeat(0.., terminated(statement, ws)).parse_next(input)?;
    end(input)?;
    Ok(Match::node(Rule::Entry, span_from(input, start), statements))
}

/// Run `rule` over the whole of `source`.
fn run(source: &str, rule: fn(&mut Input<'_>) -> PResult<Match>) -> Result<ParseTree, ParseError> {
    let tracker = Tracker::default();
    let mut input = Stateful {
        input: LocatingSlice::new(source),
        state: &tracker,
    };

    match rule(&mut input) {
        Ok(root) => {
            let tree = ParseTree::from_match(root);
            trace!(nodes = tree.len(); "Parsed playbook");
            Ok(tree)
        }
        Err(_) => {
            let offset = tracker.furthest.get();
            let expected = tracker.expected.borrow();
            debug!(offset = offset, expected:? = expected.as_slice(); "Parse failed");
            Err(failure_diagnostic(source, offset, &expected).into())
        }
    }
}

/// Build the diagnostic for a failed parse at the furthest `offset`.
fn failure_diagnostic(source: &str, offset: usize, expected: &[&'static str]) -> Diagnostic {
    let position = LineColumn::of(source, offset);
    let help = match expected {
        [] => None,
        [only] => Some(format!("expected {only}")),
        many => Some(format!("expected one of: {}", many.join(", "))),
    };

    let diagnostic = match source.get(offset..).and_then(|rest| rest.chars().next()) {
        Some(found) => Diagnostic::error(format!(
            "unexpected character {found:?} at line {}, column {}",
            position.line, position.column
        ))
        .with_code(ErrorCode::E100)
        .with_label(
            Span::new(offset..offset + found.len_utf8()),
            ErrorCode::E100.description(),
        ),
        None => Diagnostic::error(format!(
            "unexpected end of input at line {}, column {}",
            position.line, position.column
        ))
        .with_code(ErrorCode::E101)
        .with_label(Span::new(offset..offset), ErrorCode::E101.description()),
    };

    match help {
        Some(help) => diagnostic.with_help(help),
        None => diagnostic,
    }
}

/// Parse a playbook into a [`ParseTree`].
///
/// # Errors
///
/// Returns a [`ParseError`] holding one diagnostic located at the furthest
/// position any grammar rule reached, with the set of things expected there.
pub fn parse(source: &str) -> Result<ParseTree, ParseError> {
    run(source, entry)
}

/// Parse a single value (with surrounding whitespace) into a [`ParseTree`].
pub fn parse_value(source: &str) -> Result<ParseTree, ParseError> {
    run(source, lone_value)
}

fn lone_value(input: &mut Input<'_>) -> PResult<Match> {
    delimited(ws, value, (ws, end)).parse_next(input)
}
