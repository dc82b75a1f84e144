//! Parsed stylesheets and the CSS tree that compilation produces.

use std::cell::RefCell;
use std::rc::Rc;

use url::Url;

use crate::error::Span;
use crate::selector::SelectorList;
use crate::value::Value;

/// The syntax a stylesheet is written in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Syntax {
    Scss,
    Indented,
    Css,
}

impl Syntax {
    /// Guesses the syntax from a URL's file extension, defaulting to SCSS.
    pub fn for_url(url: &Url) -> Syntax {
        match url.path().rsplit('.').next() {
            Some("sass") => Syntax::Indented,
            Some("css") => Syntax::Css,
            _ => Syntax::Scss,
        }
    }
}

/// A loaded source file, ready for evaluation.
///
/// The surface parser lives downstream; this artifact is what the import
/// cache stores per canonical URL, so each file is read and parsed at most
/// once per compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Stylesheet {
    /// The logical URL the stylesheet was loaded from.
    pub url: Url,
    pub syntax: Syntax,
    pub contents: String,
}

impl Stylesheet {
    pub fn parse(contents: String, syntax: Syntax, url: Url) -> Stylesheet {
        Stylesheet {
            url,
            syntax,
            contents,
        }
    }
}

/// A single CSS declaration, e.g. `width: 10px`.
#[derive(Debug, Clone, PartialEq)]
pub struct CssDeclaration {
    pub name: String,
    pub value: Value,
    pub span: Span,
}

/// A style rule in the output tree.
///
/// The selector is shared with the extension engine so that `@extend`
/// rewrites are visible in the tree without re-walking it.
#[derive(Debug, Clone)]
pub struct CssRule {
    pub selector: Rc<RefCell<SelectorList>>,
    pub declarations: Vec<CssDeclaration>,
    pub span: Span,
}

/// The CSS subtree a module contributes to the output.
#[derive(Debug, Clone, Default)]
pub struct CssTree {
    pub rules: Vec<CssRule>,
}

impl CssTree {
    pub fn new() -> CssTree {
        CssTree::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn add_rule(&mut self, rule: CssRule) {
        self.rules.push(rule);
    }

    /// A deep copy with fresh selector cells, so the clone can be extended
    /// independently of the original.
    pub fn deep_clone(&self) -> CssTree {
        CssTree {
            rules: self
                .rules
                .iter()
                .map(|rule| CssRule {
                    selector: Rc::new(RefCell::new(rule.selector.borrow().clone())),
                    declarations: rule.declarations.clone(),
                    span: rule.span,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_from_extension() {
        let url = |s: &str| Url::parse(s).unwrap();
        assert_eq!(Syntax::for_url(&url("file:///a/b.scss")), Syntax::Scss);
        assert_eq!(Syntax::for_url(&url("file:///a/b.sass")), Syntax::Indented);
        assert_eq!(Syntax::for_url(&url("file:///a/b.css")), Syntax::Css);
        assert_eq!(Syntax::for_url(&url("file:///a/b")), Syntax::Scss);
    }

    #[test]
    fn deep_clone_detaches_selectors() {
        use crate::parsers::Parse;

        let mut tree = CssTree::new();
        tree.add_rule(CssRule {
            selector: Rc::new(RefCell::new(SelectorList::parse_str(".a").unwrap())),
            declarations: Vec::new(),
            span: Span::default(),
        });

        let clone = tree.deep_clone();
        *clone.rules[0].selector.borrow_mut() = SelectorList::parse_str(".b").unwrap();

        assert_eq!(tree.rules[0].selector.borrow().to_string(), ".a");
        assert_eq!(clone.rules[0].selector.borrow().to_string(), ".b");
    }
}
