//! Expression tree for the manifest regex dialect
//!
//! Next.js writes JavaScript regular expressions into its manifests. The
//! tree below covers the subset those manifests use (groups of every kind,
//! lookaround, classes, escapes, quantifiers) and serializes back to the
//! exact source text, so `parse(s)?.to_string() == s` for any parseable `s`.
//! Transforms rebuild the tree instead of mutating it.

use std::fmt;

use thiserror::Error;

/// A parse failure, with the character offset where it happened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid regex at offset {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    /// `( … )`
    Capturing,
    /// `(?: … )`
    NonCapturing,
    /// `(?<name> … )`, or `(?P<name> … )` when `python_style`
    Named { name: String, python_style: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// `^`
    Start,
    /// `$`
    End,
    /// `(?= … )` / `(?! … )`
    Lookahead { negative: bool, body: Box<Node> },
    /// `(?<= … )` / `(?<! … )`
    Lookbehind { negative: bool, body: Box<Node> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Two or more `|`-separated branches
    Alternation(Vec<Node>),
    /// Concatenation; may be empty
    Sequence(Vec<Node>),
    Group { kind: GroupKind, body: Box<Node> },
    Assertion(Assertion),
    /// An atom followed by its raw quantifier (`*`, `+?`, `{1,}` …)
    Repeat { atom: Box<Node>, quantifier: String },
    /// Raw character class, brackets included
    Class(String),
    /// Raw escape sequence, backslash included
    Escape(String),
    Char(char),
    /// `.`
    Any,
}

impl Node {
    /// Parses a regex source string
    pub fn parse(source: &str) -> Result<Node, ParseError> {
        let mut parser = Parser {
            chars: source.chars().collect(),
            pos: 0,
        };
        let node = parser.parse_alternation()?;
        match parser.peek() {
            None => Ok(node),
            Some(_) => Err(parser.error("unmatched ')'")),
        }
    }

    /// Whether the tree contains any lookahead assertion
    pub fn has_lookahead(&self) -> bool {
        match self {
            Node::Assertion(Assertion::Lookahead { .. }) => true,
            Node::Assertion(Assertion::Lookbehind { body, .. }) => body.has_lookahead(),
            Node::Alternation(nodes) | Node::Sequence(nodes) => {
                nodes.iter().any(Node::has_lookahead)
            }
            Node::Group { body, .. } => body.has_lookahead(),
            Node::Repeat { atom, .. } => atom.has_lookahead(),
            _ => false,
        }
    }

    /// Rebuilds the tree without lookahead nodes
    ///
    /// A quantified lookahead disappears together with its quantifier. A
    /// branch or group body left empty stays in place as an empty sequence,
    /// so alternation arity and capture numbering are preserved.
    pub fn without_lookahead(&self) -> Node {
        self.prune().unwrap_or(Node::Sequence(Vec::new()))
    }

    fn prune(&self) -> Option<Node> {
        match self {
            Node::Assertion(Assertion::Lookahead { .. }) => None,
            Node::Assertion(Assertion::Lookbehind { negative, body }) => {
                Some(Node::Assertion(Assertion::Lookbehind {
                    negative: *negative,
                    body: Box::new(body.without_lookahead()),
                }))
            }
            Node::Alternation(branches) => Some(Node::Alternation(
                branches.iter().map(Node::without_lookahead).collect(),
            )),
            Node::Sequence(nodes) => Some(Node::Sequence(
                nodes.iter().filter_map(Node::prune).collect(),
            )),
            Node::Group { kind, body } => Some(Node::Group {
                kind: kind.clone(),
                body: Box::new(body.without_lookahead()),
            }),
            Node::Repeat { atom, quantifier } => atom.prune().map(|atom| Node::Repeat {
                atom: Box::new(atom),
                quantifier: quantifier.clone(),
            }),
            leaf => Some(leaf.clone()),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Alternation(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", branch)?;
                }
                Ok(())
            }
            Node::Sequence(nodes) => nodes.iter().try_for_each(|n| write!(f, "{}", n)),
            Node::Group { kind, body } => {
                match kind {
                    GroupKind::Capturing => f.write_str("(")?,
                    GroupKind::NonCapturing => f.write_str("(?:")?,
                    GroupKind::Named { name, python_style } => {
                        write!(f, "(?{}<{}>", if *python_style { "P" } else { "" }, name)?
                    }
                }
                write!(f, "{})", body)
            }
            Node::Assertion(Assertion::Start) => f.write_str("^"),
            Node::Assertion(Assertion::End) => f.write_str("$"),
            Node::Assertion(Assertion::Lookahead { negative, body }) => {
                write!(f, "(?{}{})", if *negative { "!" } else { "=" }, body)
            }
            Node::Assertion(Assertion::Lookbehind { negative, body }) => {
                write!(f, "(?<{}{})", if *negative { "!" } else { "=" }, body)
            }
            Node::Repeat { atom, quantifier } => write!(f, "{}{}", atom, quantifier),
            Node::Class(raw) | Node::Escape(raw) => f.write_str(raw),
            Node::Char(c) => write!(f, "{}", c),
            Node::Any => f.write_str("."),
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: &str) -> bool {
        let matches = expected
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c));
        if matches {
            self.pos += expected.chars().count();
        }
        matches
    }

    fn error(&self, message: &'static str) -> ParseError {
        ParseError {
            position: self.pos,
            message,
        }
    }

    fn parse_alternation(&mut self) -> Result<Node, ParseError> {
        let mut branches = vec![self.parse_sequence()?];
        while self.peek() == Some('|') {
            self.bump();
            branches.push(self.parse_sequence()?);
        }
        Ok(if branches.len() == 1 {
            branches.remove(0)
        } else {
            Node::Alternation(branches)
        })
    }

    fn parse_sequence(&mut self) -> Result<Node, ParseError> {
        let mut nodes = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            let atom = self.parse_atom()?;
            nodes.push(match self.parse_quantifier() {
                Some(quantifier) => Node::Repeat {
                    atom: Box::new(atom),
                    quantifier,
                },
                None => atom,
            });
        }
        Ok(Node::Sequence(nodes))
    }

    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        match self.peek() {
            Some('(') => self.parse_group(),
            Some('[') => self.parse_class(),
            Some('\\') => self.parse_escape(),
            Some('.') => {
                self.bump();
                Ok(Node::Any)
            }
            Some('^') => {
                self.bump();
                Ok(Node::Assertion(Assertion::Start))
            }
            Some('$') => {
                self.bump();
                Ok(Node::Assertion(Assertion::End))
            }
            Some('*') | Some('+') | Some('?') => Err(self.error("nothing to repeat")),
            Some('{') if self.quantifier_len().is_some() => Err(self.error("nothing to repeat")),
            Some(c) => {
                self.bump();
                Ok(Node::Char(c))
            }
            None => Err(self.error("unexpected end of pattern")),
        }
    }

    fn parse_group(&mut self) -> Result<Node, ParseError> {
        self.bump();

        enum Opener {
            Group(GroupKind),
            Lookahead(bool),
            Lookbehind(bool),
        }

        let opener = if self.eat("?:") {
            Opener::Group(GroupKind::NonCapturing)
        } else if self.eat("?=") {
            Opener::Lookahead(false)
        } else if self.eat("?!") {
            Opener::Lookahead(true)
        } else if self.eat("?<=") {
            Opener::Lookbehind(false)
        } else if self.eat("?<!") {
            Opener::Lookbehind(true)
        } else if self.eat("?P<") {
            Opener::Group(GroupKind::Named {
                name: self.parse_group_name()?,
                python_style: true,
            })
        } else if self.eat("?<") {
            Opener::Group(GroupKind::Named {
                name: self.parse_group_name()?,
                python_style: false,
            })
        } else if self.peek() == Some('?') {
            return Err(self.error("unsupported group syntax"));
        } else {
            Opener::Group(GroupKind::Capturing)
        };

        let body = Box::new(self.parse_alternation()?);
        if self.bump() != Some(')') {
            return Err(self.error("unterminated group"));
        }

        Ok(match opener {
            Opener::Group(kind) => Node::Group { kind, body },
            Opener::Lookahead(negative) => Node::Assertion(Assertion::Lookahead { negative, body }),
            Opener::Lookbehind(negative) => {
                Node::Assertion(Assertion::Lookbehind { negative, body })
            }
        })
    }

    fn parse_group_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('>') if !name.is_empty() => return Ok(name),
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$' => name.push(c),
                _ => return Err(self.error("invalid capture group name")),
            }
        }
    }

    fn parse_class(&mut self) -> Result<Node, ParseError> {
        let mut raw = String::new();
        raw.extend(self.bump());
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated character class")),
                Some('\\') => {
                    raw.push('\\');
                    match self.bump() {
                        Some(c) => raw.push(c),
                        None => return Err(self.error("trailing backslash")),
                    }
                }
                Some(']') => {
                    raw.push(']');
                    return Ok(Node::Class(raw));
                }
                Some(c) => raw.push(c),
            }
        }
    }

    fn parse_escape(&mut self) -> Result<Node, ParseError> {
        let mut raw = String::new();
        raw.extend(self.bump());
        let c = self.bump().ok_or_else(|| self.error("trailing backslash"))?;
        raw.push(c);

        match c {
            'u' if self.peek() == Some('{') => self.take_through('}', &mut raw)?,
            'u' => self.take_while_max(4, |c| c.is_ascii_hexdigit(), &mut raw),
            'x' => self.take_while_max(2, |c| c.is_ascii_hexdigit(), &mut raw),
            'c' => self.take_while_max(1, |c| c.is_ascii_alphabetic(), &mut raw),
            'k' if self.peek() == Some('<') => self.take_through('>', &mut raw)?,
            'p' | 'P' if self.peek() == Some('{') => self.take_through('}', &mut raw)?,
            '1'..='9' => self.take_while_max(usize::MAX, |c| c.is_ascii_digit(), &mut raw),
            _ => {}
        }

        Ok(Node::Escape(raw))
    }

    fn take_through(&mut self, end: char, raw: &mut String) -> Result<(), ParseError> {
        loop {
            match self.bump() {
                Some(c) if c == end => {
                    raw.push(c);
                    return Ok(());
                }
                Some(c) => raw.push(c),
                None => return Err(self.error("unterminated escape")),
            }
        }
    }

    fn take_while_max(&mut self, max: usize, pred: impl Fn(char) -> bool, raw: &mut String) {
        let mut taken = 0;
        while taken < max {
            match self.peek() {
                Some(c) if pred(c) => {
                    raw.push(c);
                    self.pos += 1;
                    taken += 1;
                }
                _ => break,
            }
        }
    }

    /// Length of a `{n}`, `{n,}` or `{n,m}` quantifier at the cursor
    fn quantifier_len(&self) -> Option<usize> {
        if self.peek() != Some('{') {
            return None;
        }
        let mut len = 1;
        let mut digits = 0;
        while self.peek_at(len).is_some_and(|c| c.is_ascii_digit()) {
            len += 1;
            digits += 1;
        }
        if digits == 0 {
            return None;
        }
        if self.peek_at(len) == Some(',') {
            len += 1;
            while self.peek_at(len).is_some_and(|c| c.is_ascii_digit()) {
                len += 1;
            }
        }
        (self.peek_at(len) == Some('}')).then_some(len + 1)
    }

    fn parse_quantifier(&mut self) -> Option<String> {
        let len = match self.peek() {
            Some('*') | Some('+') | Some('?') => 1,
            Some('{') => self.quantifier_len()?,
            _ => return None,
        };
        let mut quantifier: String = self.chars[self.pos..self.pos + len].iter().collect();
        self.pos += len;
        if self.peek() == Some('?') {
            self.pos += 1;
            quantifier.push('?');
        }
        Some(quantifier)
    }
}
