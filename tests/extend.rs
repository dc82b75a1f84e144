//! End-to-end behavior of the `@extend` engine against a CSS tree.

use std::cell::RefCell;
use std::rc::Rc;

use sass::error::{ExtendError, Span};
use sass::extension::Extender;
use sass::parsers::Parse;
use sass::selector::{
    ComplexSelector, ComplexSelectorComponent, CompoundSelector, SelectorList, SimpleSelector,
};
use sass::session::Session;
use sass::stylesheet::{CssRule, CssTree};
use sass::value::Value;

fn list(s: &str) -> SelectorList {
    SelectorList::parse_str(s).unwrap()
}

fn simple(s: &str) -> SimpleSelector {
    let mut l = list(s);
    l.components
        .remove(0)
        .components
        .remove(0)
        .selector
        .components
        .remove(0)
}

/// Registers a style rule the way the evaluator would: through the
/// extender, sharing the selector cell with the tree.
fn add_rule(tree: &mut CssTree, extender: &mut Extender, selector: &str) -> Rc<RefCell<SelectorList>> {
    let cell = extender
        .add_selector(list(selector), Span::default())
        .unwrap();
    tree.add_rule(CssRule {
        selector: Rc::clone(&cell),
        declarations: vec![sass::stylesheet::CssDeclaration {
            name: "color".to_string(),
            value: Value::String(sass::value::SassString::unquoted("red")),
            span: Span::default(),
        }],
        span: Span::default(),
    });
    cell
}

#[test]
fn extend_joins_selectors() {
    // .a { color: red }  .b { @extend .a }
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    let rule = add_rule(&mut tree, &mut extender, ".a");
    extender
        .add_extension(&simple(".a"), &list(".b"), false, Span::default())
        .unwrap();

    assert_eq!(rule.borrow().to_string(), ".a, .b");
    // The tree shares the cell, so it sees the rewrite.
    assert_eq!(tree.rules[0].selector.borrow().to_string(), ".a, .b");
}

#[test]
fn extend_weaves_descendant_selectors() {
    // .p .z { c: 1 }  .x .y { @extend .z }
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    let rule = add_rule(&mut tree, &mut extender, ".p .z");
    extender
        .add_extension(&simple(".z"), &list(".x .y"), false, Span::default())
        .unwrap();

    assert_eq!(rule.borrow().to_string(), ".p .z, .p .x .y, .x .p .y");
}

#[test]
fn extend_into_multiple_rules() {
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    let first = add_rule(&mut tree, &mut extender, ".a");
    let second = add_rule(&mut tree, &mut extender, ".a .nested");

    extender
        .add_extension(&simple(".a"), &list(".b"), false, Span::default())
        .unwrap();

    assert_eq!(first.borrow().to_string(), ".a, .b");
    assert_eq!(second.borrow().to_string(), ".a .nested, .b .nested");
}

#[test]
fn placeholder_rules_emit_only_extenders() {
    // %base { ... }  .button { @extend %base }
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    let rule = add_rule(&mut tree, &mut extender, "%base");
    extender
        .add_extension(&simple("%base"), &list(".button"), false, Span::default())
        .unwrap();

    assert_eq!(rule.borrow().to_string(), ".button");
}

#[test]
fn extension_with_compound_extender() {
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    let rule = add_rule(&mut tree, &mut extender, ".a:hover");
    extender
        .add_extension(&simple(".a"), &list(".b.c"), false, Span::default())
        .unwrap();

    assert_eq!(rule.borrow().to_string(), ".a:hover, .b.c:hover");
}

#[test]
fn mandatory_extension_without_target_fails_late() {
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    add_rule(&mut tree, &mut extender, ".unrelated");
    extender
        .add_extension(&simple(".ghost"), &list(".b"), false, Span::default())
        .unwrap();

    let err = extender.check_unsatisfied_extensions().unwrap_err();
    assert!(
        matches!(err, ExtendError::TargetNotFound { ref target, .. } if target == ".ghost")
    );

    // A target that appears later satisfies the extension.
    add_rule(&mut tree, &mut extender, ".ghost");
    assert!(extender.check_unsatisfied_extensions().is_ok());
}

#[test]
fn runaway_extension_is_bounded() {
    let mut tree = CssTree::new();
    let mut extender = Extender::new(Session::quiet());

    add_rule(&mut tree, &mut extender, ".target");

    // One extension with more extenders than the engine will ever weave
    // into a single rule.
    let extenders = SelectorList::new(
        (0..sass::limits::MAX_GENERATED_SELECTORS + 1)
            .map(|i| {
                ComplexSelector::new(vec![ComplexSelectorComponent::new(CompoundSelector::new(
                    vec![SimpleSelector::Class(format!("c{}", i))],
                ))])
            })
            .collect(),
    );

    let err = extender
        .add_extension(&simple(".target"), &extenders, false, Span::default())
        .unwrap_err();
    assert!(matches!(err, ExtendError::TooManyExtensions { .. }));
}
