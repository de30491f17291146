//! Hop grammar: tokenizer, parse state machine and diagnostics.
//!
//! ```text
//! "<graph>" {
//!   "<source>" -> "<target>" [<probability>]
//! }
//! ```

use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::schema::hop::{GraphMap, Hop, HopMap};

/// A recoverable syntax problem. The parser records it and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GrammarError {
    #[error("{line}:{column}: unterminated string")]
    UnterminatedString { line: usize, column: usize },
    #[error("{line}:{column}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, line: usize, column: usize },
    #[error("{line}:{column}: invalid probability '{text}'")]
    InvalidNumber {
        text: String,
        line: usize,
        column: usize,
    },
    #[error("{line}:{column}: expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        line: usize,
        column: usize,
    },
    #[error("graph '{graph}' opened on line {line} is never closed")]
    UnterminatedGraph { graph: String, line: usize },
}

/// The builder was driven through an impossible transition. Fatal: the parse stops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    #[error("cannot associate hop with {step:?} in graph {graph:?}")]
    UnresolvedSource { graph: String, step: Option<String> },
    #[error("hop ended but none was started")]
    NoPendingHop,
    #[error("hop started outside a graph block")]
    HopOutsideGraph,
    #[error("step '{0}' appears outside a graph block")]
    StepOutsideGraph(String),
    #[error("graph '{inner}' opened inside graph '{outer}'")]
    NestedGraph { outer: String, inner: String },
}

/// Strip one pair of surrounding double quotes, if both are present.
pub fn unquote(quoted: &str) -> &str {
    if quoted.len() >= 2 && quoted.starts_with('"') && quoted.ends_with('"') {
        &quoted[1..quoted.len() - 1]
    } else {
        quoted
    }
}

// ---------------------------------------------------------------------------
// Table builder (the parse state machine)
// ---------------------------------------------------------------------------

/// Where the builder currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildState {
    OutsideGraph,
    InGraph {
        graph: String,
    },
    AwaitingSource {
        graph: String,
        hop: Hop,
    },
    AwaitingTarget {
        graph: String,
        source: String,
        /// The source entry was created by this hop and holds nothing yet.
        fresh_source: bool,
        hop: Hop,
    },
}

/// Event-driven builder for a [`GraphMap`].
///
/// The parser reports what it walks through (graph entered, hop started,
/// step seen, probability seen, hop finished) and the builder files the
/// pending hop under the right graph and source step. Any other driver
/// producing the same event sequence gets the same table.
#[derive(Debug)]
pub struct TableBuilder {
    graphs: GraphMap,
    state: BuildState,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    pub fn new() -> Self {
        Self {
            graphs: GraphMap::default(),
            state: BuildState::OutsideGraph,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    /// Open a graph block. A second block with the same name replaces the first.
    pub fn enter_graph(&mut self, name: &str) -> Result<(), StructuralError> {
        match &self.state {
            BuildState::OutsideGraph => {}
            BuildState::InGraph { graph }
            | BuildState::AwaitingSource { graph, .. }
            | BuildState::AwaitingTarget { graph, .. } => {
                return Err(StructuralError::NestedGraph {
                    outer: graph.clone(),
                    inner: name.to_string(),
                });
            }
        }
        if self.graphs.contains_key(name) {
            warn!(graph = name, "duplicate graph block replaces the earlier one");
        }
        self.graphs.insert(name.to_string(), HopMap::default());
        self.state = BuildState::InGraph {
            graph: name.to_string(),
        };
        Ok(())
    }

    /// Close the current graph block, dropping any unfinished hop.
    pub fn exit_graph(&mut self) {
        self.abandon_hop();
        self.state = BuildState::OutsideGraph;
    }

    pub fn enter_hop(&mut self) -> Result<(), StructuralError> {
        self.abandon_hop();
        match std::mem::replace(&mut self.state, BuildState::OutsideGraph) {
            BuildState::InGraph { graph } => {
                self.state = BuildState::AwaitingSource {
                    graph,
                    hop: Hop::new("", 0.0),
                };
                Ok(())
            }
            _ => Err(StructuralError::HopOutsideGraph),
        }
    }

    /// The first step of a hop is its source, the second its target.
    pub fn step(&mut self, name: &str) -> Result<(), StructuralError> {
        match std::mem::replace(&mut self.state, BuildState::OutsideGraph) {
            BuildState::AwaitingSource { graph, hop } => {
                let hops = self.graphs.entry(graph.clone()).or_default();
                let fresh_source = !hops.contains_key(name);
                hops.entry(name.to_string()).or_default();
                self.state = BuildState::AwaitingTarget {
                    graph,
                    source: name.to_string(),
                    fresh_source,
                    hop,
                };
                Ok(())
            }
            BuildState::AwaitingTarget {
                graph,
                source,
                fresh_source,
                mut hop,
            } => {
                hop.target = name.to_string();
                self.state = BuildState::AwaitingTarget {
                    graph,
                    source,
                    fresh_source,
                    hop,
                };
                Ok(())
            }
            // No pending hop: nothing to attach the step to.
            state @ BuildState::InGraph { .. } => {
                self.state = state;
                Ok(())
            }
            BuildState::OutsideGraph => Err(StructuralError::StepOutsideGraph(name.to_string())),
        }
    }

    pub fn probability(&mut self, p: f32) {
        match &mut self.state {
            BuildState::AwaitingSource { hop, .. } | BuildState::AwaitingTarget { hop, .. } => {
                hop.probability = p;
            }
            BuildState::OutsideGraph | BuildState::InGraph { .. } => {}
        }
    }

    /// Append the pending hop to its source step's list.
    pub fn exit_hop(&mut self) -> Result<(), StructuralError> {
        match std::mem::replace(&mut self.state, BuildState::OutsideGraph) {
            BuildState::AwaitingTarget {
                graph, source, hop, ..
            } => {
                let Some(hops) = self
                    .graphs
                    .get_mut(&graph)
                    .and_then(|map| map.get_mut(&source))
                else {
                    return Err(StructuralError::UnresolvedSource {
                        graph,
                        step: Some(source),
                    });
                };
                hops.push(hop);
                self.state = BuildState::InGraph { graph };
                Ok(())
            }
            BuildState::AwaitingSource { graph, .. } => {
                Err(StructuralError::UnresolvedSource { graph, step: None })
            }
            state => {
                self.state = state;
                Err(StructuralError::NoPendingHop)
            }
        }
    }

    /// Drop the pending hop, along with the source entry it created if
    /// that entry is still empty.
    pub fn abandon_hop(&mut self) {
        match std::mem::replace(&mut self.state, BuildState::OutsideGraph) {
            BuildState::AwaitingSource { graph, .. } => {
                self.state = BuildState::InGraph { graph };
            }
            BuildState::AwaitingTarget {
                graph,
                source,
                fresh_source,
                ..
            } => {
                if fresh_source {
                    if let Some(map) = self.graphs.get_mut(&graph) {
                        if map.get(&source).is_some_and(|hops| hops.is_empty()) {
                            map.remove(&source);
                        }
                    }
                }
                self.state = BuildState::InGraph { graph };
            }
            state => self.state = state,
        }
    }

    pub fn finish(mut self) -> GraphMap {
        self.abandon_hop();
        self.graphs
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    /// Quoted string, quotes included.
    Str(String),
    Number(f32),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Arrow,
    /// Lexing failed here; the parser reports it when it reaches it.
    Bad(GrammarError),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "string {}", s),
            Self::Number(n) => write!(f, "number {}", n),
            Self::LBrace => f.write_str("'{'"),
            Self::RBrace => f.write_str("'}'"),
            Self::LBracket => f.write_str("'['"),
            Self::RBracket => f.write_str("']'"),
            Self::Arrow => f.write_str("'->'"),
            Self::Bad(_) => f.write_str("invalid input"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;
    let mut column = 1;

    while i < len {
        let c = chars[i];
        let (start_line, start_column) = (line, column);
        let mut push = |kind: TokenKind| {
            tokens.push(Token {
                kind,
                line: start_line,
                column: start_column,
            })
        };

        match c {
            '\n' => {
                line += 1;
                column = 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                column += 1;
                i += 1;
            }
            '"' => {
                let mut end = i + 1;
                while end < len && chars[end] != '"' && chars[end] != '\n' {
                    end += 1;
                }
                if end < len && chars[end] == '"' {
                    push(TokenKind::Str(chars[i..=end].iter().collect()));
                    column += end + 1 - i;
                    i = end + 1;
                } else {
                    push(TokenKind::Bad(GrammarError::UnterminatedString {
                        line: start_line,
                        column: start_column,
                    }));
                    column += end - i;
                    i = end;
                }
            }
            '{' | '}' | '[' | ']' => {
                push(match c {
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::RBracket,
                });
                column += 1;
                i += 1;
            }
            '-' if i + 1 < len && chars[i + 1] == '>' => {
                push(TokenKind::Arrow);
                column += 2;
                i += 2;
            }
            c if c.is_ascii_digit() || (c == '.' && i + 1 < len && chars[i + 1].is_ascii_digit()) => {
                let end = scan_number(&chars, i);
                let text: String = chars[i..end].iter().collect();
                match text.parse::<f32>() {
                    Ok(value) if value.is_finite() => push(TokenKind::Number(value)),
                    _ => push(TokenKind::Bad(GrammarError::InvalidNumber {
                        text,
                        line: start_line,
                        column: start_column,
                    })),
                }
                column += end - i;
                i = end;
            }
            other => {
                push(TokenKind::Bad(GrammarError::UnexpectedChar {
                    ch: other,
                    line: start_line,
                    column: start_column,
                }));
                column += 1;
                i += 1;
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
        column,
    });
    tokens
}

/// End index of a `digits [. digits] [e [+|-] digits]` literal starting at `start`.
fn scan_number(chars: &[char], start: usize) -> usize {
    let len = chars.len();
    let mut end = start;
    while end < len && chars[end].is_ascii_digit() {
        end += 1;
    }
    if end < len && chars[end] == '.' {
        end += 1;
        while end < len && chars[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < len && (chars[end] == 'e' || chars[end] == 'E') {
        let mut exp = end + 1;
        if exp < len && (chars[exp] == '+' || chars[exp] == '-') {
            exp += 1;
        }
        if exp < len && chars[exp].is_ascii_digit() {
            while exp < len && chars[exp].is_ascii_digit() {
                exp += 1;
            }
            end = exp;
        }
    }
    end
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

enum HopFailure {
    Syntax(GrammarError),
    Structural(StructuralError),
}

impl From<GrammarError> for HopFailure {
    fn from(e: GrammarError) -> Self {
        Self::Syntax(e)
    }
}

impl From<StructuralError> for HopFailure {
    fn from(e: StructuralError) -> Self {
        Self::Structural(e)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<GrammarError>,
}

/// Parse hop-grammar text into a graph map.
///
/// Syntax errors are collected and returned beside whatever parsed
/// cleanly; only a [`StructuralError`] aborts the parse.
pub fn parse(input: &str) -> Result<(GraphMap, Vec<GrammarError>), StructuralError> {
    let mut parser = Parser {
        tokens: tokenize(input),
        pos: 0,
        diagnostics: Vec::new(),
    };
    let mut builder = TableBuilder::new();
    parser.program(&mut builder)?;
    Ok((builder.finish(), parser.diagnostics))
}

impl Parser {
    fn peek(&self) -> &Token {
        // The stream always ends in Eof and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn unexpected(&self, expected: &'static str) -> GrammarError {
        let tok = self.peek();
        GrammarError::Unexpected {
            expected,
            found: tok.kind.to_string(),
            line: tok.line,
            column: tok.column,
        }
    }

    fn program(&mut self, builder: &mut TableBuilder) -> Result<(), StructuralError> {
        loop {
            match self.peek().kind.clone() {
                TokenKind::Eof => return Ok(()),
                TokenKind::Str(raw) => {
                    let open_line = self.advance().line;
                    if self.peek().kind != TokenKind::LBrace {
                        let err = self.unexpected("'{' after graph name");
                        self.diagnostics.push(err);
                        continue;
                    }
                    self.advance();
                    let graph = unquote(&raw).to_string();
                    builder.enter_graph(&graph)?;
                    self.graph_body(builder, graph, open_line)?;
                }
                TokenKind::Bad(err) => {
                    self.diagnostics.push(err);
                    self.advance();
                }
                _ => {
                    let err = self.unexpected("graph name");
                    self.diagnostics.push(err);
                    self.advance();
                }
            }
        }
    }

    fn graph_body(
        &mut self,
        builder: &mut TableBuilder,
        graph: String,
        open_line: usize,
    ) -> Result<(), StructuralError> {
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.advance();
                    builder.exit_graph();
                    return Ok(());
                }
                TokenKind::Eof => {
                    self.diagnostics.push(GrammarError::UnterminatedGraph {
                        graph,
                        line: open_line,
                    });
                    builder.exit_graph();
                    return Ok(());
                }
                // A header means this block was never closed.
                TokenKind::Str(_) if *self.peek_ahead(1) == TokenKind::LBrace => {
                    self.diagnostics.push(GrammarError::UnterminatedGraph {
                        graph,
                        line: open_line,
                    });
                    builder.exit_graph();
                    return Ok(());
                }
                TokenKind::Str(_) => match self.hop_expr(builder) {
                    Ok(()) => {}
                    Err(HopFailure::Structural(e)) => return Err(e),
                    Err(HopFailure::Syntax(e)) => {
                        self.diagnostics.push(e);
                        builder.abandon_hop();
                        self.recover();
                    }
                },
                TokenKind::Bad(err) => {
                    self.diagnostics.push(err);
                    self.advance();
                }
                _ => {
                    let err = self.unexpected("hop expression or '}'");
                    self.diagnostics.push(err);
                    self.advance();
                }
            }
        }
    }

    fn hop_expr(&mut self, builder: &mut TableBuilder) -> Result<(), HopFailure> {
        builder.enter_hop()?;
        let source = self.expect_string("source step")?;
        builder.step(unquote(&source))?;
        self.expect(TokenKind::Arrow, "'->'")?;
        let target = self.expect_string("target step")?;
        builder.step(unquote(&target))?;
        self.expect(TokenKind::LBracket, "'['")?;
        let p = self.expect_number()?;
        builder.probability(p);
        self.expect(TokenKind::RBracket, "']'")?;
        builder.exit_hop()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind, what: &'static str) -> Result<(), GrammarError> {
        if self.peek().kind == kind {
            self.advance();
            return Ok(());
        }
        Err(self.reject(what))
    }

    fn expect_string(&mut self, what: &'static str) -> Result<String, GrammarError> {
        if let TokenKind::Str(raw) = &self.peek().kind {
            let raw = raw.clone();
            self.advance();
            return Ok(raw);
        }
        Err(self.reject(what))
    }

    fn expect_number(&mut self) -> Result<f32, GrammarError> {
        if let TokenKind::Number(value) = self.peek().kind {
            self.advance();
            return Ok(value);
        }
        Err(self.reject("probability"))
    }

    /// Error for the current token. Lexer failures are consumed so they
    /// are reported exactly once.
    fn reject(&mut self, what: &'static str) -> GrammarError {
        if let TokenKind::Bad(err) = &self.peek().kind {
            let err = err.clone();
            self.advance();
            return err;
        }
        self.unexpected(what)
    }

    /// Skip the rest of a broken hop. Stops before the next hop start
    /// (`"x" ->`), the next graph header (`"x" {`) or `}`, and just after a
    /// closing `]`.
    fn recover(&mut self) {
        loop {
            let next_hop = match &self.peek().kind {
                TokenKind::RBrace | TokenKind::Eof => return,
                TokenKind::Str(_) => {
                    matches!(self.peek_ahead(1), TokenKind::Arrow | TokenKind::LBrace)
                }
                _ => false,
            };
            if next_hop || self.advance().kind == TokenKind::RBracket {
                return;
            }
        }
    }
}
