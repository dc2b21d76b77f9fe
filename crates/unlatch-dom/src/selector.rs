//! Minimal CSS selector matching.
//!
//! Supports selector lists (`a, b`), compound selectors (`tag#id.class[attr]`),
//! attribute operators `=`, `*=`, `^=`, `$=`, `~=`, and the descendant (` `)
//! and child (`>`) combinators. Pseudo-classes are not supported.

use crate::dom_types::{ElementNode, NodeId};
use crate::error::{DomError, DomResult};
use crate::page::Page;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector: compounds joined by combinators, left to right.
/// `combinators[i]` joins `parts[i]` and `parts[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    parts: Vec<Compound>,
    combinators: Vec<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

impl Selector {
    /// Parse selector text.
    pub fn parse(text: &str) -> DomResult<Self> {
        let mut alternatives = Vec::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid(text, "empty selector in list"));
            }
            alternatives.push(parse_complex(text, part)?);
        }
        Ok(Self {
            source: text.to_string(),
            alternatives,
        })
    }

    /// Original selector text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether `id` matches any alternative of this selector.
    pub fn matches<P: Page + ?Sized>(&self, page: &P, id: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|c| match_complex(page, c, c.parts.len() - 1, id))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn invalid(selector: &str, message: &str) -> DomError {
    DomError::InvalidSelector {
        selector: selector.to_string(),
        message: message.to_string(),
    }
}

fn match_complex<P: Page + ?Sized>(page: &P, complex: &Complex, index: usize, id: NodeId) -> bool {
    let Some(element) = page.element(id) else {
        return false;
    };
    if !match_compound(&complex.parts[index], element) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match complex.combinators[index - 1] {
        Combinator::Child => page
            .parent(id)
            .is_some_and(|p| match_complex(page, complex, index - 1, p)),
        Combinator::Descendant => page
            .ancestors(id)
            .into_iter()
            .any(|a| match_complex(page, complex, index - 1, a)),
    }
}

fn match_compound(compound: &Compound, element: &ElementNode) -> bool {
    if let Some(ref tag) = compound.tag {
        if element.tag_name != *tag {
            return false;
        }
    }
    if !compound.ids.iter().all(|id| element.id() == Some(id.as_str())) {
        return false;
    }
    if !compound.classes.iter().all(|c| element.has_class(c)) {
        return false;
    }
    compound.attrs.iter().all(|test| {
        let Some(value) = element.attr(&test.name) else {
            return false;
        };
        match &test.op {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Contains(v) => value.contains(v.as_str()),
            AttrOp::Prefix(v) => value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => value.ends_with(v.as_str()),
            AttrOp::Word(v) => value.split_whitespace().any(|w| w == v),
        }
    })
}

fn parse_complex(full: &str, text: &str) -> DomResult<Complex> {
    let chars: Vec<char> = text.chars().collect();
    let mut pos = 0;
    let mut parts = Vec::new();
    let mut combinators = Vec::new();

    loop {
        let compound = parse_compound(full, &chars, &mut pos)?;
        parts.push(compound);

        let mut saw_space = false;
        while pos < chars.len() && chars[pos].is_whitespace() {
            saw_space = true;
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }
        if chars[pos] == '>' {
            pos += 1;
            while pos < chars.len() && chars[pos].is_whitespace() {
                pos += 1;
            }
            combinators.push(Combinator::Child);
        } else if saw_space {
            combinators.push(Combinator::Descendant);
        } else {
            return Err(invalid(full, &format!("unexpected '{}'", chars[pos])));
        }
    }

    Ok(Complex { parts, combinators })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn parse_compound(full: &str, chars: &[char], pos: &mut usize) -> DomResult<Compound> {
    let mut compound = Compound::default();
    let start = *pos;

    if *pos < chars.len() && chars[*pos] == '*' {
        *pos += 1;
    } else if *pos < chars.len() && is_ident_char(chars[*pos]) {
        compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
    }

    while *pos < chars.len() {
        match chars[*pos] {
            '#' => {
                *pos += 1;
                let ident = read_ident(chars, pos);
                if ident.is_empty() {
                    return Err(invalid(full, "empty id"));
                }
                compound.ids.push(ident);
            }
            '.' => {
                *pos += 1;
                let ident = read_ident(chars, pos);
                if ident.is_empty() {
                    return Err(invalid(full, "empty class"));
                }
                compound.classes.push(ident);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(full, chars, pos)?);
            }
            ':' => return Err(invalid(full, "pseudo-classes are not supported")),
            _ => break,
        }
    }

    if *pos == start {
        return Err(invalid(full, "expected a compound selector"));
    }
    Ok(compound)
}

fn parse_attr(full: &str, chars: &[char], pos: &mut usize) -> DomResult<AttrTest> {
    let name = read_ident(chars, pos).to_ascii_lowercase();
    if name.is_empty() {
        return Err(invalid(full, "empty attribute name"));
    }
    if *pos >= chars.len() {
        return Err(invalid(full, "unclosed attribute"));
    }
    if chars[*pos] == ']' {
        *pos += 1;
        return Ok(AttrTest {
            name,
            op: AttrOp::Exists,
        });
    }

    let op_char = chars[*pos];
    if op_char != '=' {
        *pos += 1;
        if *pos >= chars.len() || chars[*pos] != '=' {
            return Err(invalid(full, "malformed attribute operator"));
        }
    }
    *pos += 1;

    let value = read_value(full, chars, pos)?;
    if *pos >= chars.len() || chars[*pos] != ']' {
        return Err(invalid(full, "unclosed attribute"));
    }
    *pos += 1;

    let op = match op_char {
        '=' => AttrOp::Equals(value),
        '*' => AttrOp::Contains(value),
        '^' => AttrOp::Prefix(value),
        '$' => AttrOp::Suffix(value),
        '~' => AttrOp::Word(value),
        other => return Err(invalid(full, &format!("unknown operator '{}='", other))),
    };
    Ok(AttrTest { name, op })
}

fn read_value(full: &str, chars: &[char], pos: &mut usize) -> DomResult<String> {
    if *pos < chars.len() && (chars[*pos] == '\'' || chars[*pos] == '"') {
        let quote = chars[*pos];
        *pos += 1;
        let start = *pos;
        while *pos < chars.len() && chars[*pos] != quote {
            *pos += 1;
        }
        if *pos >= chars.len() {
            return Err(invalid(full, "unterminated string"));
        }
        let value: String = chars[start..*pos].iter().collect();
        *pos += 1;
        Ok(value)
    } else {
        Ok(read_ident(chars, pos))
    }
}
