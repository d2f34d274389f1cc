//! Route templates with `:name` placeholders.
//!
//! A placeholder matches one or more characters other than `/`. The whole template is
//! anchored: `/users/:id` matches `/users/42` but neither `/users/` nor `/users/42/posts`.
//! Placeholders may sit next to literals inside one segment (`/files/:name.txt`); a
//! placeholder takes as many characters as it can while the rest still matches.

use std::fmt;
use std::hash::{Hash, Hasher};

use http::Method;
use keel_http::interner::Atom;
use keel_http::protocol::PathParams;

use crate::router::RouterBuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(Box<str>),
    Param(Atom),
}

/// A registered `(method, template)` pair. Equality and hashing only look at that pair.
#[derive(Clone)]
pub struct RoutePattern {
    method: Method,
    template: Atom,
    tokens: Vec<Token>,
}

impl RoutePattern {
    pub fn parse(method: Method, template: impl Into<String>) -> Result<Self, RouterBuildError> {
        let template = template.into();
        let invalid = |reason: &str| RouterBuildError::InvalidPattern { template: template.clone(), reason: reason.into() };

        if !template.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut tokens = Vec::new();
        let mut rest = template.as_str();
        while !rest.is_empty() {
            match rest.find(':') {
                Some(0) => {
                    let name_len = rest[1..].find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(rest.len() - 1);
                    if name_len == 0 {
                        return Err(invalid("placeholder without a name"));
                    }
                    if matches!(tokens.last(), Some(Token::Param(_))) {
                        return Err(invalid("two placeholders in a row"));
                    }
                    tokens.push(Token::Param(Atom::from(rest[1..=name_len].to_string())));
                    rest = &rest[1 + name_len..];
                }
                Some(index) => {
                    tokens.push(Token::Literal(rest[..index].into()));
                    rest = &rest[index..];
                }
                None => {
                    tokens.push(Token::Literal(rest.into()));
                    rest = "";
                }
            }
        }

        Ok(Self { method, template: Atom::from(template), tokens })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &Atom {
        &self.template
    }

    /// Tests `path` against the template.
    pub fn matches(&self, path: &str) -> bool {
        let mut captures = Vec::new();
        match_tokens(&self.tokens, path, 0, &mut captures)
    }

    /// Tests `path` and, on success, pushes every captured value into `params` as a slice
    /// of `path`.
    pub fn captures(&self, path: &Atom, params: &mut PathParams) -> bool {
        let mut captures = Vec::new();
        if !match_tokens(&self.tokens, path, 0, &mut captures) {
            return false;
        }
        for (name, start, end) in captures {
            params.push(name.clone(), path.slice_ref(&path[start..end]));
        }
        true
    }
}

fn match_tokens<'t>(tokens: &'t [Token], path: &str, pos: usize, captures: &mut Vec<(&'t Atom, usize, usize)>) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return pos == path.len();
    };

    match token {
        Token::Literal(literal) => {
            path[pos..].starts_with(&**literal) && match_tokens(rest, path, pos + literal.len(), captures)
        }
        Token::Param(name) => {
            let segment_end = path[pos..].find('/').map_or(path.len(), |index| pos + index);
            // longest first, at least one character
            for end in (pos + 1..=segment_end).rev() {
                if !path.is_char_boundary(end) {
                    continue;
                }
                captures.push((name, pos, end));
                if match_tokens(rest, path, end, captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.template == other.template
    }
}

impl Eq for RoutePattern {}

impl Hash for RoutePattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.template.hash(state);
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.template)
    }
}
