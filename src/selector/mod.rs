//! Representation of selectors, and the algebra the `@extend` engine is
//! built on.
//!
//! # Terminology
//!
//! Consider a selector like `a.b > c, %placeholder d`:
//!
//! * `a`, `.b`, `c` and `%placeholder` are **simple selectors**.
//!
//! * `a.b` is a **compound selector**: a conjunction of simple selectors
//!   that applies to a single element.
//!
//! * `a.b > c` is a **complex selector**: a sequence of compound selectors
//!   separated by combinators.  The descendant combinator is implied
//!   between adjacent compounds; `>`, `+` and `~` are explicit.  In this
//!   representation a combinator is a *value attached to a component*, not
//!   a component itself: each [`ComplexSelectorComponent`] carries one
//!   compound plus its trailing combinators, and a complex selector may
//!   additionally carry leading combinators (which only appear in
//!   intermediate states of selector rewriting).
//!
//! * The whole thing is a **selector list** with two complex selectors.
//!
//! Parsing uses the `cssparser` tokenizer through the [`Parse`] trait, the
//! same way CSS property values are parsed elsewhere in this crate.

use std::fmt;

use cssparser::{Parser, Token};
use itertools::Itertools;

use crate::error::*;
use crate::parsers::Parse;

mod superselector;
mod unify;

pub use superselector::{
    complex_is_parent_superselector, complex_is_superselector, compound_is_superselector,
};
pub use unify::{paths, trim, unify_complex, unify_compound, weave};

/// A selector combinator.  The descendant combinator has no explicit
/// representation; it is implied by a component with no trailing
/// combinators.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Combinator {
    /// `>`
    Child,
    /// `+`
    NextSibling,
    /// `~`
    FollowingSibling,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Combinator::Child => write!(f, ">"),
            Combinator::NextSibling => write!(f, "+"),
            Combinator::FollowingSibling => write!(f, "~"),
        }
    }
}

/// Attribute selector operators, e.g. the `~=` in `[class~=foo]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AttributeOp {
    /// `=`
    Equal,
    /// `~=`
    Includes,
    /// `|=`
    DashMatch,
    /// `^=`
    Prefix,
    /// `$=`
    Suffix,
    /// `*=`
    Substring,
}

impl fmt::Display for AttributeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AttributeOp::Equal => write!(f, "="),
            AttributeOp::Includes => write!(f, "~="),
            AttributeOp::DashMatch => write!(f, "|="),
            AttributeOp::Prefix => write!(f, "^="),
            AttributeOp::Suffix => write!(f, "$="),
            AttributeOp::Substring => write!(f, "*="),
        }
    }
}

/// An attribute selector like `[href^="https:" i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    pub name: String,
    pub op: Option<AttributeOp>,
    pub value: Option<String>,
    pub modifier: Option<char>,
}

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.name)?;
        if let (Some(op), Some(value)) = (self.op, self.value.as_ref()) {
            write!(f, "{}\"{}\"", op, value)?;
            if let Some(modifier) = self.modifier {
                write!(f, " {}", modifier)?;
            }
        }
        write!(f, "]")
    }
}

/// A pseudo-class or pseudo-element selector.
///
/// Selector pseudos like `:is()` and `:not()` carry a parsed selector list;
/// other functional pseudos keep their argument as raw text.  `:nth-child`
/// and `:nth-last-child` can carry both (`:nth-child(2n of .foo)`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PseudoSelector {
    pub name: String,
    /// Whether this is a pseudo-element (`::before`, or one of the legacy
    /// single-colon pseudo-elements).
    pub element: bool,
    pub argument: Option<String>,
    pub selector: Option<Box<SelectorList>>,
}

impl PseudoSelector {
    /// The name with any vendor prefix stripped, used when deciding how a
    /// pseudo behaves (`:-moz-any` behaves like `:any`).
    pub fn normalized_name(&self) -> &str {
        let name = self.name.as_str();
        if let Some(rest) = name.strip_prefix('-') {
            if let Some(i) = rest.find('-') {
                return &rest[i + 1..];
            }
        }
        name
    }

    pub fn is_class(&self) -> bool {
        !self.element
    }
}

impl fmt::Display for PseudoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}{}", if self.element { ":" } else { "" }, self.name)?;
        if self.argument.is_none() && self.selector.is_none() {
            return Ok(());
        }

        write!(f, "(")?;
        if let Some(ref argument) = self.argument {
            write!(f, "{}", argument)?;
            if self.selector.is_some() {
                write!(f, " of ")?;
            }
        }
        if let Some(ref selector) = self.selector {
            write!(f, "{}", selector)?;
        }
        write!(f, ")")
    }
}

/// Pseudo-classes whose compounds cannot repeat in a woven selector; at
/// most one may survive at the front of a weave result.
const ROOTISH_PSEUDO_CLASSES: &[&str] = &["root", "scope", "host", "host-context"];

/// A single simple selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimpleSelector {
    /// `*`
    Universal,
    /// `&`, the parent reference in nested rules
    Parent,
    /// `a`
    Type(String),
    /// `.a`
    Class(String),
    /// `#a`
    Id(String),
    /// `%a`, a Sass placeholder; matches nothing and is dropped from output
    Placeholder(String),
    /// `[a=b]`
    Attribute(AttributeSelector),
    /// `:a`, `::a`, `:a(...)`
    Pseudo(PseudoSelector),
}

impl SimpleSelector {
    /// Specificity is encoded base-1000: types contribute 1, classes,
    /// attributes and pseudo-classes 1000, ids 1000².  The `:is()` family
    /// contributes a range, hence separate minimum and maximum.
    pub fn min_specificity(&self) -> i64 {
        match *self {
            SimpleSelector::Universal | SimpleSelector::Parent => 0,
            SimpleSelector::Type(_) => 1,
            SimpleSelector::Id(_) => 1_000_000,
            SimpleSelector::Pseudo(ref pseudo) => pseudo_specificity(pseudo).0,
            _ => 1000,
        }
    }

    pub fn max_specificity(&self) -> i64 {
        match *self {
            SimpleSelector::Universal | SimpleSelector::Parent => 0,
            SimpleSelector::Type(_) => 1,
            SimpleSelector::Id(_) => 1_000_000,
            SimpleSelector::Pseudo(ref pseudo) => pseudo_specificity(pseudo).1,
            _ => 1000,
        }
    }

    /// Whether this selector can match nothing that appears in CSS output.
    pub fn is_invisible(&self) -> bool {
        match *self {
            SimpleSelector::Placeholder(_) => true,
            SimpleSelector::Pseudo(ref pseudo) => match pseudo.selector {
                Some(ref selector) if pseudo.name != "not" => selector.is_invisible(),
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether two occurrences of this selector must refer to the same
    /// element: true for ids and pseudo-elements.
    pub fn is_unique(&self) -> bool {
        match *self {
            SimpleSelector::Id(_) => true,
            SimpleSelector::Pseudo(ref pseudo) => pseudo.element,
            _ => false,
        }
    }
}

fn pseudo_specificity(pseudo: &PseudoSelector) -> (i64, i64) {
    if pseudo.element {
        return (1, 1);
    }

    let selector = match pseudo.selector {
        Some(ref selector) => selector,
        None => return (1000, 1000),
    };

    if pseudo.normalized_name() == "not" {
        let mut min = 0;
        let mut max = 0;
        for complex in &selector.components {
            min = min.max(complex.min_specificity());
            max = max.max(complex.max_specificity());
        }
        (min, max)
    } else {
        // Seed the minimum above any real selector's specificity.
        let mut min = 1_000_000_000;
        let mut max = 0;
        for complex in &selector.components {
            min = min.min(complex.min_specificity());
            max = max.max(complex.max_specificity());
        }
        (min, max)
    }
}

impl fmt::Display for SimpleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SimpleSelector::Universal => write!(f, "*"),
            SimpleSelector::Parent => write!(f, "&"),
            SimpleSelector::Type(ref name) => write!(f, "{}", name),
            SimpleSelector::Class(ref name) => write!(f, ".{}", name),
            SimpleSelector::Id(ref name) => write!(f, "#{}", name),
            SimpleSelector::Placeholder(ref name) => write!(f, "%{}", name),
            SimpleSelector::Attribute(ref attr) => write!(f, "{}", attr),
            SimpleSelector::Pseudo(ref pseudo) => write!(f, "{}", pseudo),
        }
    }
}

/// A compound selector: one or more simple selectors applying to a single
/// element, e.g. `a.b#c`.  Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundSelector {
    pub components: Vec<SimpleSelector>,
}

impl CompoundSelector {
    pub fn new(components: Vec<SimpleSelector>) -> CompoundSelector {
        debug_assert!(!components.is_empty());
        CompoundSelector { components }
    }

    pub fn min_specificity(&self) -> i64 {
        self.components.iter().map(SimpleSelector::min_specificity).sum()
    }

    pub fn max_specificity(&self) -> i64 {
        self.components.iter().map(SimpleSelector::max_specificity).sum()
    }

    pub fn is_invisible(&self) -> bool {
        self.components.iter().any(SimpleSelector::is_invisible)
    }

    /// Whether this compound starts with `:root` or another pseudo that
    /// pins it to a single place in the tree.
    pub fn is_rootish(&self) -> bool {
        self.components.iter().any(|simple| match simple {
            SimpleSelector::Pseudo(pseudo) => {
                pseudo.is_class() && ROOTISH_PSEUDO_CLASSES.contains(&pseudo.normalized_name())
            }
            _ => false,
        })
    }

    pub fn is_superselector(&self, other: &CompoundSelector) -> bool {
        compound_is_superselector(self, other, &[])
    }
}

impl fmt::Display for CompoundSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.iter().format(""))
    }
}

/// One compound selector plus its trailing combinators.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComplexSelectorComponent {
    pub selector: CompoundSelector,
    pub combinators: Vec<Combinator>,
}

impl ComplexSelectorComponent {
    pub fn new(selector: CompoundSelector) -> ComplexSelectorComponent {
        ComplexSelectorComponent {
            selector,
            combinators: Vec::new(),
        }
    }

    pub fn with_combinators(
        selector: CompoundSelector,
        combinators: Vec<Combinator>,
    ) -> ComplexSelectorComponent {
        ComplexSelectorComponent {
            selector,
            combinators,
        }
    }

    pub fn with_additional_combinators(&self, combinators: &[Combinator]) -> Self {
        ComplexSelectorComponent {
            selector: self.selector.clone(),
            combinators: self
                .combinators
                .iter()
                .chain(combinators)
                .copied()
                .collect(),
        }
    }
}

impl fmt::Display for ComplexSelectorComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        for combinator in &self.combinators {
            write!(f, " {}", combinator)?;
        }
        Ok(())
    }
}

/// A complex selector: a sequence of compound selectors separated by
/// combinators, e.g. `a > b c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComplexSelector {
    /// Combinators before the first compound.  These only occur in nested
    /// rules (`> a { ... }`) and in intermediate rewriting states.
    pub leading_combinators: Vec<Combinator>,
    pub components: Vec<ComplexSelectorComponent>,
}

impl ComplexSelector {
    pub fn new(components: Vec<ComplexSelectorComponent>) -> ComplexSelector {
        ComplexSelector {
            leading_combinators: Vec::new(),
            components,
        }
    }

    pub fn with_leading_combinators(
        leading_combinators: Vec<Combinator>,
        components: Vec<ComplexSelectorComponent>,
    ) -> ComplexSelector {
        ComplexSelector {
            leading_combinators,
            components,
        }
    }

    pub fn min_specificity(&self) -> i64 {
        self.components
            .iter()
            .map(|c| c.selector.min_specificity())
            .sum()
    }

    pub fn max_specificity(&self) -> i64 {
        self.components
            .iter()
            .map(|c| c.selector.max_specificity())
            .sum()
    }

    pub fn is_invisible(&self) -> bool {
        self.components.iter().any(|c| c.selector.is_invisible())
    }

    pub fn contains_parent_selector(&self) -> bool {
        self.components.iter().any(|component| {
            component
                .selector
                .components
                .iter()
                .any(|simple| matches!(simple, SimpleSelector::Parent))
        })
    }

    /// Whether this selector could never match anything: multiple leading
    /// or trailing combinators make it so.
    pub fn is_useless(&self) -> bool {
        self.leading_combinators.len() > 1
            || self
                .components
                .iter()
                .any(|component| component.combinators.len() > 1)
    }

    /// Appends `child`'s components onto this selector, merging this
    /// selector's final combinators with `child`'s leading ones.
    pub fn concatenate(&self, child: &ComplexSelector) -> ComplexSelector {
        if child.leading_combinators.is_empty() {
            ComplexSelector {
                leading_combinators: self.leading_combinators.clone(),
                components: self
                    .components
                    .iter()
                    .chain(&child.components)
                    .cloned()
                    .collect(),
            }
        } else if self.components.is_empty() {
            ComplexSelector {
                leading_combinators: self
                    .leading_combinators
                    .iter()
                    .chain(&child.leading_combinators)
                    .copied()
                    .collect(),
                components: child.components.clone(),
            }
        } else {
            let mut components: Vec<_> =
                self.components[..self.components.len() - 1].to_vec();
            components.push(
                self.components
                    .last()
                    .unwrap()
                    .with_additional_combinators(&child.leading_combinators),
            );
            components.extend(child.components.iter().cloned());
            ComplexSelector {
                leading_combinators: self.leading_combinators.clone(),
                components,
            }
        }
    }

    pub fn with_additional_component(
        &self,
        component: ComplexSelectorComponent,
    ) -> ComplexSelector {
        let mut components = self.components.clone();
        components.push(component);
        ComplexSelector {
            leading_combinators: self.leading_combinators.clone(),
            components,
        }
    }

    pub fn is_superselector(&self, other: &ComplexSelector) -> bool {
        self.leading_combinators.is_empty()
            && other.leading_combinators.is_empty()
            && complex_is_superselector(&self.components, &other.components)
    }
}

impl fmt::Display for ComplexSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for combinator in &self.leading_combinators {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", combinator)?;
            first = false;
        }
        for component in &self.components {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", component)?;
            first = false;
        }
        Ok(())
    }
}

/// An ordered list of complex selectors, e.g. `a, b > c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorList {
    pub components: Vec<ComplexSelector>,
}

impl SelectorList {
    pub fn new(components: Vec<ComplexSelector>) -> SelectorList {
        SelectorList { components }
    }

    pub fn is_invisible(&self) -> bool {
        self.components.iter().all(ComplexSelector::is_invisible)
    }

    pub fn contains_parent_selector(&self) -> bool {
        self.components
            .iter()
            .any(ComplexSelector::contains_parent_selector)
    }

    /// Whether every element matched by `other` is also matched by `self`.
    pub fn is_superselector(&self, other: &SelectorList) -> bool {
        other.components.iter().all(|complex1| {
            self.components
                .iter()
                .any(|complex2| complex2.is_superselector(complex1))
        })
    }

    /// Returns a list that matches only elements matched by both `self` and
    /// `other`, or `None` if no such list can be produced.
    pub fn unify(&self, other: &SelectorList) -> Option<SelectorList> {
        let contents: Vec<ComplexSelector> = self
            .components
            .iter()
            .flat_map(|c1| {
                other.components.iter().flat_map(move |c2| {
                    unify_complex(&[c1.clone(), c2.clone()]).unwrap_or_default()
                })
            })
            .collect();

        if contents.is_empty() {
            None
        } else {
            Some(SelectorList::new(contents))
        }
    }

    /// Replaces all parent selectors (`&`) with `parent`.
    ///
    /// If `implicit_parent` is true, complex selectors without an explicit
    /// `&` are treated as if they began with one.  With no parent in
    /// scope, a list that mentions `&` is an error.
    pub fn resolve_parent_selectors(
        &self,
        parent: Option<&SelectorList>,
        implicit_parent: bool,
    ) -> Result<SelectorList, ScriptError> {
        let parent = match parent {
            Some(parent) => parent,
            None => {
                if self.contains_parent_selector() {
                    return Err(ScriptError::new(
                        "top-level selectors may not contain the parent selector \"&\"",
                    ));
                }
                return Ok(self.clone());
            }
        };

        let mut resolved = Vec::new();
        for complex in &self.components {
            if !complex.contains_parent_selector() {
                if !implicit_parent {
                    resolved.push(complex.clone());
                } else {
                    for parent_complex in &parent.components {
                        resolved.push(parent_complex.concatenate(complex));
                    }
                }
                continue;
            }

            resolved.extend(resolve_complex_parents(complex, parent)?);
        }

        Ok(SelectorList::new(resolved))
    }
}

/// Substitutes `parent` for every `&` in `complex`.
fn resolve_complex_parents(
    complex: &ComplexSelector,
    parent: &SelectorList,
) -> Result<Vec<ComplexSelector>, ScriptError> {
    let mut partials = vec![ComplexSelector::with_leading_combinators(
        complex.leading_combinators.clone(),
        Vec::new(),
    )];

    for component in &complex.components {
        let parent_position = component
            .selector
            .components
            .iter()
            .position(|simple| matches!(simple, SimpleSelector::Parent));

        match parent_position {
            None => {
                for partial in &mut partials {
                    partial.components.push(component.clone());
                }
            }

            Some(0) => {
                let rest = &component.selector.components[1..];
                let mut next = Vec::new();
                for partial in &partials {
                    for parent_complex in &parent.components {
                        let mut replacement = parent_complex.clone();
                        if !rest.is_empty() {
                            let last = replacement.components.last_mut().ok_or_else(|| {
                                ScriptError::new("parent selector has no compound to extend")
                            })?;
                            if !last.combinators.is_empty() {
                                return Err(ScriptError::new(
                                    "parent selector ends in a combinator and can't be followed by a compound selector",
                                ));
                            }
                            last.selector.components.extend(rest.iter().cloned());
                        }
                        if let Some(last) = replacement.components.last_mut() {
                            last.combinators = component.combinators.clone();
                        }
                        next.push(partial.concatenate(&replacement));
                    }
                }
                partials = next;
            }

            Some(_) => {
                return Err(ScriptError::new(
                    "\"&\" may only occur at the beginning of a compound selector",
                ));
            }
        }
    }

    Ok(partials)
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.components
                .iter()
                .filter(|c| !c.is_invisible())
                .format(", ")
        )
    }
}

impl Parse for SelectorList {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<SelectorList, ParseError<'i>> {
        let components = parser.parse_comma_separated(ComplexSelector::parse)?;
        if components.is_empty() {
            return Err(
                parser.new_custom_error(ValueErrorKind::parse_error("expected a selector"))
            );
        }
        Ok(SelectorList::new(components))
    }
}

impl Parse for ComplexSelector {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<ComplexSelector, ParseError<'i>> {
        let mut leading_combinators = Vec::new();
        let mut components: Vec<ComplexSelectorComponent> = Vec::new();

        loop {
            let state = parser.state();
            let token = match parser.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                Token::WhiteSpace(_) => continue,

                Token::Delim(c @ ('>' | '+' | '~')) => {
                    let combinator = match c {
                        '>' => Combinator::Child,
                        '+' => Combinator::NextSibling,
                        _ => Combinator::FollowingSibling,
                    };
                    match components.last_mut() {
                        Some(component) => component.combinators.push(combinator),
                        None => leading_combinators.push(combinator),
                    }
                }

                _ => {
                    parser.reset(&state);
                    let compound = CompoundSelector::parse(parser)?;
                    components.push(ComplexSelectorComponent::new(compound));
                }
            }
        }

        if components.is_empty() {
            return Err(
                parser.new_custom_error(ValueErrorKind::parse_error("expected a selector"))
            );
        }

        Ok(ComplexSelector {
            leading_combinators,
            components,
        })
    }
}

impl Parse for CompoundSelector {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<CompoundSelector, ParseError<'i>> {
        let mut components = Vec::new();

        loop {
            let state = parser.state();
            let token = match parser.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };

            match token {
                Token::Ident(ref name) => {
                    components.push(SimpleSelector::Type(name.as_ref().to_owned()));
                }

                Token::Delim('*') => components.push(SimpleSelector::Universal),

                Token::Delim('&') => components.push(SimpleSelector::Parent),

                Token::Delim('.') => {
                    components.push(SimpleSelector::Class(ident_after_sigil(parser)?));
                }

                Token::Delim('%') => {
                    components.push(SimpleSelector::Placeholder(ident_after_sigil(parser)?));
                }

                Token::IDHash(ref name) => {
                    components.push(SimpleSelector::Id(name.as_ref().to_owned()));
                }

                Token::SquareBracketBlock => {
                    let attr = parser.parse_nested_block(parse_attribute)?;
                    components.push(SimpleSelector::Attribute(attr));
                }

                Token::Colon => {
                    components.push(SimpleSelector::Pseudo(parse_pseudo(parser)?));
                }

                _ => {
                    parser.reset(&state);
                    break;
                }
            }
        }

        if components.is_empty() {
            return Err(parser
                .new_custom_error(ValueErrorKind::parse_error("expected a compound selector")));
        }

        Ok(CompoundSelector::new(components))
    }
}

/// Parses the identifier immediately following `.`, `%`, etc.  Whitespace
/// is not allowed between the sigil and the name.
fn ident_after_sigil<'i>(parser: &mut Parser<'i, '_>) -> Result<String, ParseError<'i>> {
    let token = parser.next_including_whitespace()?.clone();
    match token {
        Token::Ident(ref name) => Ok(name.as_ref().to_owned()),
        _ => Err(parser.new_unexpected_token_error(token)),
    }
}

fn parse_attribute<'i, 't>(
    parser: &mut Parser<'i, 't>,
) -> Result<AttributeSelector, ParseError<'i>> {
    let name = parser.expect_ident()?.as_ref().to_owned();

    let token = match parser.next() {
        Ok(token) => token.clone(),
        Err(_) => {
            return Ok(AttributeSelector {
                name,
                op: None,
                value: None,
                modifier: None,
            })
        }
    };

    let op = match token {
        Token::Delim('=') => AttributeOp::Equal,
        Token::IncludeMatch => AttributeOp::Includes,
        Token::DashMatch => AttributeOp::DashMatch,
        Token::PrefixMatch => AttributeOp::Prefix,
        Token::SuffixMatch => AttributeOp::Suffix,
        Token::SubstringMatch => AttributeOp::Substring,
        _ => return Err(parser.new_unexpected_token_error(token)),
    };

    let token = parser.next()?.clone();
    let value = match token {
        Token::Ident(ref s) | Token::QuotedString(ref s) => s.as_ref().to_owned(),
        _ => return Err(parser.new_unexpected_token_error(token)),
    };

    let modifier = parser
        .try_parse(|p| p.expect_ident().map(|i| i.chars().next()))
        .ok()
        .flatten();

    Ok(AttributeSelector {
        name,
        op: Some(op),
        value: Some(value),
        modifier,
    })
}

/// Pseudo-classes that take a selector argument.
const SELECTOR_PSEUDO_CLASSES: &[&str] = &[
    "not",
    "is",
    "matches",
    "any",
    "where",
    "current",
    "has",
    "host",
    "host-context",
];

/// Legacy pseudo-elements that may be written with a single colon.
const FAKE_PSEUDO_ELEMENTS: &[&str] = &["after", "before", "first-line", "first-letter"];

fn parse_pseudo<'i>(parser: &mut Parser<'i, '_>) -> Result<PseudoSelector, ParseError<'i>> {
    let mut element = false;
    let state = parser.state();
    match parser.next_including_whitespace() {
        Ok(&Token::Colon) => element = true,
        _ => parser.reset(&state),
    }

    let token = parser.next_including_whitespace()?.clone();
    match token {
        Token::Ident(ref name) => {
            let name = name.as_ref().to_owned();
            let element =
                element || FAKE_PSEUDO_ELEMENTS.contains(&name.to_ascii_lowercase().as_str());
            Ok(PseudoSelector {
                name,
                element,
                argument: None,
                selector: None,
            })
        }

        Token::Function(ref name) => {
            let name = name.as_ref().to_owned();
            let pseudo = PseudoSelector {
                name,
                element,
                argument: None,
                selector: None,
            };
            let normalized = pseudo.normalized_name().to_ascii_lowercase();

            parser.parse_nested_block(|p| {
                if (SELECTOR_PSEUDO_CLASSES.contains(&normalized.as_str()) && !element)
                    || (normalized == "slotted" && element)
                {
                    let selector = SelectorList::parse(p)?;
                    Ok(PseudoSelector {
                        selector: Some(Box::new(selector)),
                        ..pseudo
                    })
                } else if normalized == "nth-child" || normalized == "nth-last-child" {
                    parse_nth_pseudo(p, pseudo)
                } else {
                    let start = p.position();
                    while p.next_including_whitespace().is_ok() {}
                    Ok(PseudoSelector {
                        argument: Some(p.slice_from(start).trim().to_owned()),
                        ..pseudo
                    })
                }
            })
        }

        _ => Err(parser.new_unexpected_token_error(token)),
    }
}

/// Parses `<an+b> [of <selector>]` inside `:nth-child()`.
fn parse_nth_pseudo<'i, 't>(
    parser: &mut Parser<'i, 't>,
    pseudo: PseudoSelector,
) -> Result<PseudoSelector, ParseError<'i>> {
    let start = parser.position();

    loop {
        let before = parser.position();
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => {
                return Ok(PseudoSelector {
                    argument: Some(parser.slice_from(start).trim().to_owned()),
                    ..pseudo
                });
            }
        };

        if matches!(token, Token::Ident(ref i) if i.eq_ignore_ascii_case("of")) {
            let argument = parser.slice(start..before).trim().to_owned();
            let selector = SelectorList::parse(parser)?;
            return Ok(PseudoSelector {
                argument: Some(argument),
                selector: Some(Box::new(selector)),
                ..pseudo
            });
        }
    }
}
