//! Parse tree produced by the [`parser`](super::parser).
//!
//! The parser builds an owned [`Match`] per successful rule application. A
//! [`ParseTree`] flattens those matches into an arena where every node refers
//! to its parent and children by [`NodeId`]. Zero-width matches are dropped
//! during materialization.

use std::fmt;

use crate::span::Span;

/// Grammar rules that leave a node in the parse tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// The whole playbook.
    Entry,
    /// `key: value`
    Pair,
    /// An identifier (pair key, function name, index head or block label).
    Ident,
    /// A single-quoted string, quotes included in the span.
    String,
    /// An integer or decimal literal.
    Number,
    /// `true` or `false`.
    Bool,
    /// `[a, b,]`
    Array,
    /// `{a: 1, b: 2}`
    Object,
    /// `name(a, b,)`
    FunExpr,
    /// `head.segment[sentence]`
    IndexExpr,
    /// A dotted index segment.
    IndexSegment,
    /// Bracketed free text: block descriptions and bracket index keys.
    Sentence,
    /// Additive arithmetic: `term (+|- term)*`.
    MathExpr,
    /// Multiplicative arithmetic: `atom (*|/ atom)*`.
    MathTerm,
    /// One of `+ - * /`.
    Operator,
    /// `label [description] { pairs }`
    SimpleBlock,
    /// `block { pairs blocks } rescue {…} always {…}`
    CompoundBlock,
    /// The nested blocks of a compound block.
    Body,
    /// `rescue { blocks }`
    Rescue,
    /// `always { blocks }`
    Always,
}

impl Rule {
    /// Human-readable rule name used in diagnostics and tree dumps.
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Entry => "entry",
            Rule::Pair => "pair",
            Rule::Ident => "ident",
            Rule::String => "string",
            Rule::Number => "number",
            Rule::Bool => "bool_expr",
            Rule::Array => "array",
            Rule::Object => "object",
            Rule::FunExpr => "fun_expr",
            Rule::IndexExpr => "index_expr",
            Rule::IndexSegment => "index_segment",
            Rule::Sentence => "sentence",
            Rule::MathExpr => "math_expr",
            Rule::MathTerm => "math_term",
            Rule::Operator => "operator",
            Rule::SimpleBlock => "simple_block",
            Rule::CompoundBlock => "compound_block",
            Rule::Body => "body",
            Rule::Rescue => "rescue_clause",
            Rule::Always => "always_clause",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A successful rule application, owning its nested matches.
///
/// Matches are what the recursive descent returns; a failed alternative
/// simply drops its partial matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub rule: Rule,
    pub span: Span,
    pub children: Vec<Match>,
}

impl Match {
    /// A match without children.
    pub fn leaf(rule: Rule, span: Span) -> Self {
        Self {
            rule,
            span,
            children: Vec::new(),
        }
    }

    /// A match with nested matches, given in source order.
    pub fn node(rule: Rule, span: Span, children: Vec<Match>) -> Self {
        Self {
            rule,
            span,
            children,
        }
    }
}

/// Index of a node inside a [`ParseTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A node of the materialized parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    rule: Rule,
    span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl ParseNode {
    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed parse tree.
///
/// Nodes are stored in pre-order, so the root is always the first node and
/// [`ParseTree::iter`] visits parents before their children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    nodes: Vec<ParseNode>,
}

impl ParseTree {
    /// Materialize a tree from the root match.
    ///
    /// The root is always kept; any nested zero-width match is elided along
    /// with its (necessarily zero-width) descendants.
    pub fn from_match(root: Match) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.push(root, None);
        tree
    }

    fn push(&mut self, matched: Match, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ParseNode {
            rule: matched.rule,
            span: matched.span,
            parent,
            children: Vec::new(),
        });

        for child in matched.children {
            if child.span.is_empty() {
                continue;
            }
            let child_id = self.push(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }

        id
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Get a node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    pub fn node(&self, id: NodeId) -> &ParseNode {
        &self.nodes[id.0]
    }

    /// Get a node by id, or `None` if it does not belong to this tree.
    pub fn get(&self, id: NodeId) -> Option<&ParseNode> {
        self.nodes.get(id.0)
    }

    pub fn rule(&self, id: NodeId) -> Rule {
        self.node(id).rule
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of `id` in source order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).children.iter().copied()
    }

    /// Children of `id` matching `rule`, in source order.
    pub fn children_of(&self, id: NodeId, rule: Rule) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).filter(move |child| self.rule(*child) == rule)
    }

    /// The first child of `id` matching `rule`.
    pub fn find_child(&self, id: NodeId, rule: Rule) -> Option<NodeId> {
        self.children_of(id, rule).next()
    }

    /// Source text covered by `id`.
    pub fn text<'src>(&self, id: NodeId, source: &'src str) -> &'src str {
        self.span(id).text(source)
    }

    /// All node ids in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Render an indented outline of the tree, one node per line.
    pub fn dump(&self, source: &str) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), source, 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, source: &str, depth: usize, out: &mut String) {
        let node = self.node(id);
        out.push_str(&"  ".repeat(depth));
        out.push_str(node.rule.name());
        out.push_str(&format!(" {}", node.span));
        if node.children.is_empty() {
            out.push_str(&format!(" {:?}", node.span.text(source)));
        }
        out.push('\n');
        for child in &node.children {
            self.dump_node(*child, source, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(rule: Rule, range: std::ops::Range<usize>) -> Match {
        Match::leaf(rule, Span::new(range))
    }

    #[test]
    fn test_materialize_preorder_with_parent_links() {
        let root = Match::node(
            Rule::Entry,
            Span::new(0..8),
            vec![Match::node(
                Rule::Pair,
                Span::new(0..8),
                vec![leaf(Rule::Ident, 0..1), leaf(Rule::Number, 3..8)],
            )],
        );

        let tree = ParseTree::from_match(root);

        assert_eq!(tree.len(), 4);
        let pair = tree.children(tree.root()).next().unwrap();
        assert_eq!(tree.rule(pair), Rule::Pair);
        assert_eq!(tree.parent(pair), Some(tree.root()));

        let kids: Vec<Rule> = tree.children(pair).map(|c| tree.rule(c)).collect();
        assert_eq!(kids, vec![Rule::Ident, Rule::Number]);
        for child in tree.children(pair) {
            assert_eq!(tree.parent(child), Some(pair));
            assert!(tree.span(pair).contains(tree.span(child)));
        }
    }

    #[test]
    fn test_zero_width_matches_are_elided() {
        let root = Match::node(
            Rule::Entry,
            Span::new(0..4),
            vec![leaf(Rule::Sentence, 2..2), leaf(Rule::Ident, 0..4)],
        );

        let tree = ParseTree::from_match(root);

        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.children(tree.root()).map(|c| tree.rule(c)).collect::<Vec<_>>(),
            vec![Rule::Ident]
        );
    }

    #[test]
    fn test_empty_root_is_kept() {
        let tree = ParseTree::from_match(Match::leaf(Rule::Entry, Span::new(0..0)));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.rule(tree.root()), Rule::Entry);
        assert!(tree.get(NodeId(1)).is_none());
    }

    #[test]
    fn test_dump() {
        let source = "a: 1";
        let root = Match::node(
            Rule::Entry,
            Span::new(0..4),
            vec![Match::node(
                Rule::Pair,
                Span::new(0..4),
                vec![leaf(Rule::Ident, 0..1), leaf(Rule::Number, 3..4)],
            )],
        );

        let dump = ParseTree::from_match(root).dump(source);

        assert_eq!(
            dump,
            "entry 0..4\n  pair 0..4\n    ident 0..1 \"a\"\n    number 3..4 \"1\"\n"
        );
    }
}
