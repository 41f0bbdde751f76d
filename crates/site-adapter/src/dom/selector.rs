//! Subset of CSS selectors used by site profiles.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute
//! selectors (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`),
//! descendant and child combinators, and comma-separated lists.
//! Pseudo-classes are rejected.

use sitehook_core_types::{NodeId, SiteError};

/// Read access to an element tree, enough to evaluate selectors.
pub trait ElementTree {
    fn tag_of(&self, node: NodeId) -> Option<&str>;
    fn attr_of(&self, node: NodeId, name: &str) -> Option<&str>;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Clone, Debug, PartialEq)]
struct ComplexSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Clone, Debug, PartialEq)]
struct AttrSelector {
    name: String,
    test: Option<(AttrOp, String)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum AttrOp {
    Equals,
    Includes,
    Prefix,
    Suffix,
    Contains,
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SiteError> {
        Parser::new(input).parse_list()
    }

    pub fn matches<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches_at(tree, node, selector.compounds.len() - 1))
    }
}

impl ComplexSelector {
    fn matches_at<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId, idx: usize) -> bool {
        if !self.compounds[idx].matches(tree, node) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => tree
                .parent_of(node)
                .map(|parent| self.matches_at(tree, parent, idx - 1))
                .unwrap_or(false),
            Combinator::Descendant => {
                let mut cursor = tree.parent_of(node);
                while let Some(ancestor) = cursor {
                    if self.matches_at(tree, ancestor, idx - 1) {
                        return true;
                    }
                    cursor = tree.parent_of(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        let Some(tag) = tree.tag_of(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if expected != "*" && !expected.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if tree.attr_of(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = tree.attr_of(node, "class").unwrap_or("");
            let present: Vec<&str> = class_attr.split_whitespace().collect();
            if !self.classes.iter().all(|c| present.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|attr| attr.matches(tree, node))
    }
}

impl AttrSelector {
    fn matches<T: ElementTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        let Some(actual) = tree.attr_of(node, &self.name) else {
            return false;
        };
        match &self.test {
            None => true,
            Some((AttrOp::Equals, expected)) => actual == expected,
            Some((AttrOp::Includes, expected)) => {
                actual.split_whitespace().any(|word| word == expected)
            }
            Some((AttrOp::Prefix, expected)) => !expected.is_empty() && actual.starts_with(expected.as_str()),
            Some((AttrOp::Suffix, expected)) => !expected.is_empty() && actual.ends_with(expected.as_str()),
            Some((AttrOp::Contains, expected)) => !expected.is_empty() && actual.contains(expected.as_str()),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> SiteError {
        SiteError::invalid_selector(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(mut self) -> Result<SelectorList, SiteError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_complex()?);
            match self.bump() {
                None => break,
                Some(',') => continue,
                Some(other) => return Err(self.error(format!("unexpected '{other}'"))),
            }
        }
        Ok(SelectorList { selectors })
    }

    fn parse_complex(&mut self) -> Result<ComplexSelector, SiteError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(other) => return Err(self.error(format!("unexpected '{other}'"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(ComplexSelector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SiteError> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".into());
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attr()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SiteError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attr(&mut self) -> Result<AttrSelector, SiteError> {
        self.skip_ws();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.bump() {
            Some(']') => return Ok(AttrSelector { name, test: None }),
            Some('=') => AttrOp::Equals,
            Some(c @ ('~' | '^' | '$' | '*')) => {
                if self.bump() != Some('=') {
                    return Err(self.error("expected '=' in attribute selector"));
                }
                match c {
                    '~' => AttrOp::Includes,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Contains,
                }
            }
            _ => return Err(self.error("malformed attribute selector")),
        };
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != quote) {
                    self.pos += 1;
                }
                if self.bump() != Some(quote) {
                    return Err(self.error("unterminated string"));
                }
                self.chars[start..self.pos - 1].iter().collect()
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttrSelector {
            name,
            test: Some((op, value)),
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Tree {
        nodes: HashMap<u64, (String, Vec<(String, String)>, Option<u64>)>,
    }

    impl Tree {
        fn add(&mut self, id: u64, tag: &str, attrs: &[(&str, &str)], parent: Option<u64>) {
            let attrs = attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.nodes.insert(id, (tag.to_string(), attrs, parent));
        }
    }

    impl ElementTree for Tree {
        fn tag_of(&self, node: NodeId) -> Option<&str> {
            self.nodes.get(&node.0).map(|n| n.0.as_str())
        }

        fn attr_of(&self, node: NodeId, name: &str) -> Option<&str> {
            self.nodes
                .get(&node.0)?
                .1
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        }

        fn parent_of(&self, node: NodeId) -> Option<NodeId> {
            self.nodes.get(&node.0)?.2.map(NodeId)
        }
    }

    fn sample() -> Tree {
        let mut tree = Tree::default();
        tree.add(1, "body", &[], None);
        tree.add(2, "form", &[("class", "composer wide")], Some(1));
        tree.add(3, "div", &[], Some(2));
        tree.add(
            4,
            "textarea",
            &[("placeholder", "Ask le Chat"), ("id", "prompt")],
            Some(3),
        );
        tree.add(
            5,
            "button",
            &[("type", "submit"), ("aria-label", "Send question")],
            Some(2),
        );
        tree
    }

    fn hit(selector: &str, node: u64) -> bool {
        SelectorList::parse(selector)
            .unwrap()
            .matches(&sample(), NodeId(node))
    }

    #[test]
    fn compound_selectors() {
        assert!(hit("textarea", 4));
        assert!(hit("TEXTAREA#prompt", 4));
        assert!(hit("form.composer.wide", 2));
        assert!(!hit("form.narrow", 2));
        assert!(hit("*", 1));
    }

    #[test]
    fn attribute_operators() {
        assert!(hit("textarea[placeholder*=\"Ask\"]", 4));
        assert!(hit("textarea[placeholder^='Ask']", 4));
        assert!(hit("textarea[placeholder$=Chat]", 4));
        assert!(!hit("textarea[placeholder=\"Ask\"]", 4));
        assert!(hit("form[class~=wide]", 2));
        assert!(hit("button[aria-label]", 5));
        assert!(!hit("button[disabled]", 5));
    }

    #[test]
    fn combinators() {
        assert!(hit("form textarea", 4));
        assert!(!hit("form > textarea", 4));
        assert!(hit("form > div > textarea", 4));
        assert!(hit("body button[type=\"submit\"]", 5));
        assert!(!hit("div button", 5));
    }

    #[test]
    fn selector_lists_match_any() {
        assert!(hit("input, textarea", 4));
        assert!(!hit("input, select", 4));
    }

    #[test]
    fn rejects_unsupported_syntax() {
        assert!(SelectorList::parse("button:last-of-type").is_err());
        assert!(SelectorList::parse("").is_err());
        assert!(SelectorList::parse("div[aria-label=\"x\"").is_err());
        assert!(SelectorList::parse("div >").is_err());
    }
}
