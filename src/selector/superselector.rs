//! Superselector relations.
//!
//! A selector A is a *superselector* of B if every element matched by B is
//! also matched by A; `a` is a superselector of `a.b`, and `a b` of
//! `a > b`.  The extension engine uses these relations both to merge
//! selector chains and to drop redundant rewrites.

use super::{
    Combinator, ComplexSelector, ComplexSelectorComponent, CompoundSelector, PseudoSelector,
    SelectorList, SimpleSelector,
};

/// Pseudo-classes whose selector argument can directly stand in for a
/// plain selector when checking containment.
const SUBSELECTOR_PSEUDO_CLASSES: &[&str] =
    &["is", "matches", "any", "where", "nth-child", "nth-last-child"];

/// Whether `compound1` matches a superset of the elements `compound2`
/// matches.
///
/// `parents` is the prefix of the complex selector that `compound2` came
/// from, used by selector pseudos like `:is(a b)` whose arguments can match
/// through the parent chain.
pub fn compound_is_superselector(
    compound1: &CompoundSelector,
    compound2: &CompoundSelector,
    parents: &[ComplexSelectorComponent],
) -> bool {
    for simple1 in &compound1.components {
        match simple1 {
            SimpleSelector::Pseudo(pseudo) if pseudo.selector.is_some() => {
                if !selector_pseudo_is_superselector(pseudo, compound2, parents) {
                    return false;
                }
            }
            _ => {
                if !simple_is_superselector_of_compound(simple1, compound2) {
                    return false;
                }
            }
        }
    }

    // A pseudo-element in `compound2` must be mirrored in `compound1`;
    // `a` is not a superselector of `a::before`.
    for simple2 in &compound2.components {
        if let SimpleSelector::Pseudo(pseudo) = simple2 {
            if pseudo.element && !compound1.components.contains(simple2) {
                return false;
            }
        }
    }

    true
}

/// Whether a single simple selector subsumes some selector in `compound`.
fn simple_is_superselector_of_compound(
    simple: &SimpleSelector,
    compound: &CompoundSelector,
) -> bool {
    // The universal selector matches everything.
    if matches!(simple, SimpleSelector::Universal) {
        return true;
    }

    compound.components.iter().any(|their_simple| {
        if simple == their_simple {
            return true;
        }

        // Selector pseudos can match normal selectors: `:is(.a, .b)` is a
        // subselector of `.a`.
        match their_simple {
            SimpleSelector::Pseudo(pseudo) => match pseudo.selector {
                Some(ref selector)
                    if SUBSELECTOR_PSEUDO_CLASSES.contains(&pseudo.normalized_name()) =>
                {
                    selector.components.iter().all(|complex| {
                        complex.components.len() == 1
                            && complex.components[0].selector.components.contains(simple)
                    })
                }
                _ => false,
            },
            _ => false,
        }
    })
}

/// The selector arguments of every pseudo in `compound` with the given
/// name and class-ness.
fn selector_pseudo_args<'a>(
    compound: &'a CompoundSelector,
    name: &str,
    is_class: bool,
) -> impl Iterator<Item = &'a SelectorList> {
    let name = name.to_owned();
    compound.components.iter().filter_map(move |simple| {
        let SimpleSelector::Pseudo(pseudo) = simple else {
            return None;
        };
        if pseudo.is_class() != is_class || pseudo.name != name {
            return None;
        }
        pseudo.selector.as_deref()
    })
}

/// Superselector logic for pseudos that carry a selector argument.
fn selector_pseudo_is_superselector(
    pseudo1: &PseudoSelector,
    compound2: &CompoundSelector,
    parents: &[ComplexSelectorComponent],
) -> bool {
    let selector1 = pseudo1
        .selector
        .as_deref()
        .expect("selector pseudo must carry a selector");

    match pseudo1.normalized_name() {
        "is" | "matches" | "any" | "where" => {
            selector_pseudo_args(compound2, &pseudo1.name, true)
                .any(|selector2| selector1.is_superselector(selector2))
                || selector1.components.iter().any(|complex1| {
                    if !complex1.leading_combinators.is_empty() {
                        return false;
                    }
                    let mut complex2 = parents.to_vec();
                    complex2.push(ComplexSelectorComponent::new(compound2.clone()));
                    complex_is_superselector(&complex1.components, &complex2)
                })
        }

        "has" | "host" | "host-context" => selector_pseudo_args(compound2, &pseudo1.name, true)
            .any(|selector2| selector1.is_superselector(selector2)),

        "slotted" => selector_pseudo_args(compound2, &pseudo1.name, false)
            .any(|selector2| selector1.is_superselector(selector2)),

        "not" => selector1.components.iter().all(|complex| {
            compound2.components.iter().any(|simple2| match simple2 {
                SimpleSelector::Type(_) | SimpleSelector::Id(_) => {
                    // `:not(a)` is a superselector of `b` for a != b, since
                    // an element can have only one type (or id).
                    complex.components.last().map_or(false, |component| {
                        component.selector.components.iter().any(|simple1| {
                            std::mem::discriminant(simple1) == std::mem::discriminant(simple2)
                                && simple1 != simple2
                        })
                    })
                }
                SimpleSelector::Pseudo(pseudo2) => {
                    pseudo2.name == pseudo1.name
                        && pseudo2.selector.as_deref().map_or(false, |selector2| {
                            list_is_superselector(
                                &selector2.components,
                                std::slice::from_ref(complex),
                            )
                        })
                }
                _ => false,
            })
        }),

        "current" => selector_pseudo_args(compound2, &pseudo1.name, true)
            .any(|selector2| selector1 == selector2),

        "nth-child" | "nth-last-child" => compound2.components.iter().any(|simple2| {
            matches!(simple2, SimpleSelector::Pseudo(pseudo2)
                if pseudo2.name == pseudo1.name
                    && pseudo2.argument == pseudo1.argument
                    && pseudo2
                        .selector
                        .as_deref()
                        .map_or(false, |selector2| selector1.is_superselector(selector2)))
        }),

        _ => false,
    }
}

/// Whether the complex selector `complex1` matches a superset of the
/// elements `complex2` matches.
pub fn complex_is_superselector(
    complex1: &[ComplexSelectorComponent],
    complex2: &[ComplexSelectorComponent],
) -> bool {
    // Selectors with trailing combinators are neither superselectors nor
    // subselectors.
    match (complex1.last(), complex2.last()) {
        (Some(last1), Some(last2)) => {
            if !last1.combinators.is_empty() || !last2.combinators.is_empty() {
                return false;
            }
        }
        _ => return false,
    }

    let mut i1 = 0;
    let mut i2 = 0;
    loop {
        let remaining1 = complex1.len() - i1;
        let remaining2 = complex2.len() - i2;
        if remaining1 == 0 || remaining2 == 0 {
            return false;
        }

        // More complex selectors are never superselectors of less complex
        // ones.
        if remaining1 > remaining2 {
            return false;
        }

        let component1 = &complex1[i1];
        if component1.combinators.len() > 1 {
            return false;
        }

        if remaining1 == 1 {
            return compound_is_superselector(
                &component1.selector,
                &complex2.last().unwrap().selector,
                &complex2[i2..complex2.len() - 1],
            );
        }

        // Find the first index where the subchain of `complex2` is a
        // subselector of `component1`.  No match may span the final
        // component.
        let mut end_of_subselector = i2;
        loop {
            let component2 = &complex2[end_of_subselector];
            if component2.combinators.len() > 1 {
                return false;
            }
            if compound_is_superselector(
                &component1.selector,
                &component2.selector,
                &complex2[i2..end_of_subselector],
            ) {
                break;
            }

            end_of_subselector += 1;
            if end_of_subselector == complex2.len() - 1 {
                return false;
            }
        }

        let component2 = &complex2[end_of_subselector];
        let combinator1 = component1.combinators.first();
        let combinator2 = component2.combinators.first();

        match (combinator1, combinator2) {
            (Some(combinator1), Some(combinator2)) => {
                // `.foo ~ .bar` is a superselector of `.foo + .bar`, but
                // otherwise the combinators must match.
                if *combinator1 == Combinator::FollowingSibling {
                    if *combinator2 == Combinator::Child {
                        return false;
                    }
                } else if combinator1 != combinator2 {
                    return false;
                }

                // `.foo > .baz` is not a superselector of
                // `.foo > .bar > .baz` or `.foo > .bar .baz`, even though
                // `.baz` is a superselector of `.bar > .baz`.
                if remaining1 == 2 && remaining2 > 2 {
                    return false;
                }
            }

            (None, Some(combinator2)) => {
                // A descendant on the left only subsumes an explicit child
                // combinator on the right.
                if *combinator2 != Combinator::Child {
                    return false;
                }
            }

            (Some(_), None) => return false,

            (None, None) => {}
        }

        i1 += 1;
        i2 = end_of_subselector + 1;
    }
}

/// Like [`complex_is_superselector`], but compares the selectors as if
/// both had a shared descendant attached; `.a` is a parent-superselector
/// of `.a.b` *as a prefix*.
pub fn complex_is_parent_superselector(
    complex1: &[ComplexSelectorComponent],
    complex2: &[ComplexSelectorComponent],
) -> bool {
    if complex1.len() > complex2.len() {
        return false;
    }

    let base = ComplexSelectorComponent::new(CompoundSelector::new(vec![
        SimpleSelector::Placeholder("<temp>".to_string()),
    ]));

    let mut padded1 = complex1.to_vec();
    padded1.push(base.clone());
    let mut padded2 = complex2.to_vec();
    padded2.push(base);

    complex_is_superselector(&padded1, &padded2)
}

/// Whether every selector in `list2` has a superselector in `list1`.
pub fn list_is_superselector(list1: &[ComplexSelector], list2: &[ComplexSelector]) -> bool {
    list2.iter().all(|complex1| {
        list1
            .iter()
            .any(|complex2| complex2.is_superselector(complex1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Parse;
    use proptest::prelude::*;

    fn list(s: &str) -> SelectorList {
        SelectorList::parse_str(s).unwrap()
    }

    fn superselector(a: &str, b: &str) -> bool {
        list(a).is_superselector(&list(b))
    }

    #[test]
    fn compound_subset() {
        assert!(superselector("a", "a.b"));
        assert!(!superselector("a.b", "a"));
        assert!(superselector(".a", ".a#b"));
        assert!(superselector("*", "a"));
        assert!(!superselector("a", "*"));
    }

    #[test]
    fn pseudo_elements_must_match() {
        assert!(!superselector("a", "a::before"));
        assert!(superselector("a::before", "a.b::before"));
    }

    #[test]
    fn descendant_subsumes_child() {
        assert!(superselector("a b", "a > b"));
        assert!(!superselector("a > b", "a b"));
        assert!(superselector("a b", "a x b"));
    }

    #[test]
    fn sibling_combinator_subsets() {
        assert!(superselector("a ~ b", "a + b"));
        assert!(!superselector("a + b", "a ~ b"));
        assert!(!superselector("a ~ b", "a > b"));
    }

    #[test]
    fn child_chains_do_not_collapse() {
        assert!(!superselector(".foo > .baz", ".foo > .bar > .baz"));
        assert!(!superselector(".foo > .baz", ".foo > .bar .baz"));
        assert!(superselector(".foo .baz", ".foo > .bar .baz"));
    }

    #[test]
    fn selector_lists() {
        assert!(superselector("a, b", "a"));
        assert!(superselector("a, b", "a.x, b.y"));
        assert!(!superselector("a", "a, b"));
    }

    #[test]
    fn is_pseudo_superselector() {
        assert!(superselector(":is(a, b)", "a"));
        assert!(superselector(":is(a, b)", "b.c"));
        assert!(!superselector(":is(a, b)", "c"));
        // The argument can match through the parent chain.
        assert!(superselector(":is(a b)", "a b.c"));
    }

    #[test]
    fn not_pseudo_superselector() {
        assert!(superselector(":not(a)", "b"));
        assert!(!superselector(":not(a)", "a"));
        assert!(!superselector(":not(a)", ".c"));
        assert!(superselector(":not(#a)", "#b"));
        assert!(superselector(":not(a)", ":not(a).x"));
    }

    #[test]
    fn trailing_combinators_compare_unequal() {
        let a = &list("a >").components[0];
        let b = &list("a >").components[0];
        assert!(!a.is_superselector(b));
    }

    prop_compose! {
        fn arbitrary_list()(
            selectors in prop::collection::vec("[a-c](\\.[a-c])?", 1..4)
        ) -> SelectorList {
            let source = selectors.join(" ");
            SelectorList::parse_str(&source).unwrap()
        }
    }

    proptest! {
        #[test]
        fn superselector_is_reflexive(list in arbitrary_list()) {
            prop_assert!(list.is_superselector(&list));
        }
    }
}
