//! Unification and weaving of selectors.
//!
//! These operations answer "what selector matches exactly the elements
//! matched by both A and B?".  [`unify_compound`] works at the level of a
//! single compound selector; [`unify_complex`] and [`weave`] combine whole
//! selector chains, braiding two chains into every valid interleaving.
//!
//! The combinator-merging logic in [`merge_trailing_combinators`] is a
//! state machine with explicit pairwise cases; each case encodes a CSS
//! subset relation (for example `~` matching a superset of `+`).

use std::collections::{HashSet, VecDeque};

use super::superselector::complex_is_parent_superselector;
use super::{
    Combinator, ComplexSelector, ComplexSelectorComponent, CompoundSelector, SimpleSelector,
};
use crate::limits;

/// Unifies a simple selector into a compound selector's component list.
///
/// Returns the new component list, or `None` if the two can't apply to the
/// same element.  Ordering is preserved left-to-right from `compound`;
/// element names go first and pseudo selectors stay last.
pub fn unify_simple(
    simple: &SimpleSelector,
    compound: &[SimpleSelector],
) -> Option<Vec<SimpleSelector>> {
    match *simple {
        SimpleSelector::Universal => {
            match compound.first() {
                Some(first @ (SimpleSelector::Universal | SimpleSelector::Type(_))) => {
                    let unified = unify_universal_and_element(simple, first)?;
                    let mut result = vec![unified];
                    result.extend(compound[1..].iter().cloned());
                    Some(result)
                }
                // The universal selector adds nothing to a non-empty
                // compound.
                Some(_) => Some(compound.to_vec()),
                None => Some(vec![SimpleSelector::Universal]),
            }
        }

        SimpleSelector::Type(_) => match compound.first() {
            Some(first @ (SimpleSelector::Universal | SimpleSelector::Type(_))) => {
                let unified = unify_universal_and_element(simple, first)?;
                let mut result = vec![unified];
                result.extend(compound[1..].iter().cloned());
                Some(result)
            }
            _ => {
                // The element name goes first in the unified compound.
                let mut result = vec![simple.clone()];
                result.extend(compound.iter().cloned());
                Some(result)
            }
        },

        SimpleSelector::Id(_) => {
            // Two distinct ids can never apply to the same element.
            if compound
                .iter()
                .any(|other| matches!(other, SimpleSelector::Id(_)) && other != simple)
            {
                return None;
            }
            unify_default(simple, compound)
        }

        SimpleSelector::Pseudo(ref pseudo) if pseudo.element => {
            // A compound may contain at most one pseudo-element.
            if compound.iter().any(|other| {
                matches!(other, SimpleSelector::Pseudo(p) if p.element) && other != simple
            }) {
                return None;
            }
            // Pseudo-elements go last.
            if compound.contains(simple) {
                return Some(compound.to_vec());
            }
            let mut result = compound.to_vec();
            result.push(simple.clone());
            Some(result)
        }

        _ => unify_default(simple, compound),
    }
}

/// The common insertion rule: an already-present selector is a no-op, and a
/// new one is inserted before any pseudo selectors.
fn unify_default(
    simple: &SimpleSelector,
    compound: &[SimpleSelector],
) -> Option<Vec<SimpleSelector>> {
    if compound.contains(simple) {
        return Some(compound.to_vec());
    }

    let mut result = Vec::with_capacity(compound.len() + 1);
    let mut added = false;
    for other in compound {
        if !added && matches!(other, SimpleSelector::Pseudo(_)) {
            result.push(simple.clone());
            added = true;
        }
        result.push(other.clone());
    }
    if !added {
        result.push(simple.clone());
    }
    Some(result)
}

/// Unifies two type/universal selectors: the element name must match, or be
/// absent (universal) on one side.
fn unify_universal_and_element(
    a: &SimpleSelector,
    b: &SimpleSelector,
) -> Option<SimpleSelector> {
    match (a, b) {
        (SimpleSelector::Universal, other) | (other, SimpleSelector::Universal) => {
            Some(other.clone())
        }
        (SimpleSelector::Type(name1), SimpleSelector::Type(name2)) => {
            if name1 == name2 {
                Some(a.clone())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Unifies two compound selectors' component lists, or returns `None` if
/// they can't apply to the same element.
pub fn unify_compound(
    compound1: &[SimpleSelector],
    compound2: &[SimpleSelector],
) -> Option<Vec<SimpleSelector>> {
    let mut result = compound2.to_vec();
    for simple in compound1 {
        result = unify_simple(simple, &result)?;
    }
    Some(result)
}

/// Returns complex selectors that match only the elements matched by every
/// selector in `complexes`, or `None` if no such selectors exist.
///
/// The final compounds are unified into a single base, and the remaining
/// prefixes are woven around it.
pub fn unify_complex(complexes: &[ComplexSelector]) -> Option<Vec<ComplexSelector>> {
    if complexes.len() == 1 {
        return Some(complexes.to_vec());
    }

    let mut unified_base: Option<Vec<SimpleSelector>> = None;
    let mut leading_combinators: Option<&[Combinator]> = None;
    let mut trailing_combinators: Option<&[Combinator]> = None;

    for complex in complexes {
        if complex.is_useless() {
            return None;
        }

        if complex.components.len() == 1 && !complex.leading_combinators.is_empty() {
            match leading_combinators {
                None => leading_combinators = Some(&complex.leading_combinators),
                Some(leading) if leading == complex.leading_combinators.as_slice() => {}
                Some(_) => return None,
            }
        }

        let base = complex.components.last()?;
        if !base.combinators.is_empty() {
            match trailing_combinators {
                None => trailing_combinators = Some(&base.combinators),
                Some(trailing) if trailing == base.combinators.as_slice() => {}
                Some(_) => return None,
            }
        }

        unified_base = Some(match unified_base {
            None => base.selector.components.clone(),
            Some(unified) => {
                let mut unified = unified;
                for simple in &base.selector.components {
                    unified = unify_simple(simple, &unified)?;
                }
                unified
            }
        });
    }

    let without_bases: Vec<ComplexSelector> = complexes
        .iter()
        .filter(|complex| complex.components.len() > 1)
        .map(|complex| {
            ComplexSelector::with_leading_combinators(
                complex.leading_combinators.clone(),
                complex.components[..complex.components.len() - 1].to_vec(),
            )
        })
        .collect();

    let base = ComplexSelector::with_leading_combinators(
        leading_combinators.map(<[_]>::to_vec).unwrap_or_default(),
        vec![ComplexSelectorComponent::with_combinators(
            CompoundSelector::new(unified_base?),
            trailing_combinators.map(<[_]>::to_vec).unwrap_or_default(),
        )],
    );

    let to_weave = match without_bases.split_last() {
        None => vec![base],
        Some((last, rest)) => {
            let mut to_weave = rest.to_vec();
            to_weave.push(last.concatenate(&base));
            to_weave
        }
    };

    Some(weave(&to_weave))
}

/// Braids a sequence of complex selectors so that later selectors' final
/// compounds become descendants of every valid interleaving of the
/// prefixes.
///
/// For a single selector this is the identity.  For each additional
/// selector, its last component is the *target* and the rest are *parents*
/// that get woven through the accumulated prefixes.
pub fn weave(complexes: &[ComplexSelector]) -> Vec<ComplexSelector> {
    if complexes.len() == 1 {
        return complexes.to_vec();
    }

    let mut prefixes: Vec<ComplexSelector> = vec![complexes[0].clone()];

    for complex in &complexes[1..] {
        if complex.components.is_empty() {
            continue;
        }

        if complex.components.len() == 1 {
            prefixes = prefixes
                .iter()
                .map(|prefix| prefix.concatenate(complex))
                .collect();
            continue;
        }

        let target = complex.components.last().unwrap();
        let mut new_prefixes = Vec::new();
        for prefix in &prefixes {
            if let Some(parent_prefixes) = weave_parents(prefix, complex) {
                for parent_prefix in parent_prefixes {
                    new_prefixes.push(parent_prefix.with_additional_component(target.clone()));
                }
            }
        }
        prefixes = new_prefixes;
    }

    prefixes
}

/// Interleaves `prefix` with the parents of `base` (all of `base`'s
/// components except the last) in every order that preserves both selectors'
/// semantics, or returns `None` if their combinators are incompatible.
fn weave_parents(
    prefix: &ComplexSelector,
    base: &ComplexSelector,
) -> Option<Vec<ComplexSelector>> {
    let leading_combinators =
        merge_leading_combinators(&prefix.leading_combinators, &base.leading_combinators)?;

    let mut queue1: VecDeque<ComplexSelectorComponent> =
        prefix.components.iter().cloned().collect();
    let mut queue2: VecDeque<ComplexSelectorComponent> = base.components
        [..base.components.len() - 1]
        .iter()
        .cloned()
        .collect();

    let mut trailing_choices = VecDeque::new();
    merge_trailing_combinators(&mut queue1, &mut queue2, &mut trailing_choices)?;

    // Make sure at most one `:root` (or similar) survives, by unifying
    // leading rootish compounds.
    match (first_if_rootish(&mut queue1), first_if_rootish(&mut queue2)) {
        (Some(rootish1), Some(rootish2)) => {
            let unified = unify_compound(
                &rootish1.selector.components,
                &rootish2.selector.components,
            )?;
            queue1.push_front(ComplexSelectorComponent::with_combinators(
                CompoundSelector::new(unified.clone()),
                rootish1.combinators.clone(),
            ));
            queue2.push_front(ComplexSelectorComponent::with_combinators(
                CompoundSelector::new(unified),
                rootish2.combinators.clone(),
            ));
        }
        (Some(rootish), None) => {
            queue2.push_front(rootish.clone());
            queue1.push_front(rootish);
        }
        (None, Some(rootish)) => {
            queue1.push_front(rootish.clone());
            queue2.push_front(rootish);
        }
        (None, None) => {}
    }

    let mut groups1 = group_selectors(queue1);
    let mut groups2 = group_selectors(queue2);

    let groups1_vec: Vec<_> = groups1.iter().cloned().collect();
    let groups2_vec: Vec<_> = groups2.iter().cloned().collect();
    let lcs = longest_common_subsequence(&groups2_vec, &groups1_vec, |group1, group2| {
        if group1 == group2 {
            return Some(group1.clone());
        }
        if complex_is_parent_superselector(group1, group2) {
            return Some(group2.clone());
        }
        if complex_is_parent_superselector(group2, group1) {
            return Some(group1.clone());
        }
        if !must_unify(group1, group2) {
            return None;
        }

        let unified = unify_complex(&[
            ComplexSelector::new(group1.clone()),
            ComplexSelector::new(group2.clone()),
        ])?;
        if unified.len() == 1 {
            Some(unified[0].components.clone())
        } else {
            None
        }
    });

    // Each choice is a list of alternatives; the Cartesian product of the
    // choices gives the woven selectors.
    let mut choices: Vec<Vec<Vec<ComplexSelectorComponent>>> = Vec::new();

    for group in lcs {
        let chunk_choices = chunks(&mut groups1, &mut groups2, |queue| {
            queue
                .front()
                .map_or(true, |front| complex_is_parent_superselector(front, &group))
        });
        choices.push(
            chunk_choices
                .into_iter()
                .map(|chunk| chunk.into_iter().flatten().collect())
                .collect(),
        );
        choices.push(vec![group]);
        groups1.pop_front();
        groups2.pop_front();
    }

    let final_chunks = chunks(&mut groups1, &mut groups2, VecDeque::is_empty);
    choices.push(
        final_chunks
            .into_iter()
            .map(|chunk| chunk.into_iter().flatten().collect())
            .collect(),
    );
    choices.extend(trailing_choices);

    let choices: Vec<_> = choices
        .into_iter()
        .filter(|choice| !choice.is_empty())
        .collect();

    Some(
        paths(&choices)
            .into_iter()
            .map(|path| {
                ComplexSelector::with_leading_combinators(
                    leading_combinators.clone(),
                    path.into_iter().flatten().collect(),
                )
            })
            .collect(),
    )
}

/// Merges two lists of leading combinators using the least common
/// supersequence: one list must be a subsequence of the other.
fn merge_leading_combinators(
    combinators1: &[Combinator],
    combinators2: &[Combinator],
) -> Option<Vec<Combinator>> {
    let lcs = longest_common_subsequence(combinators1, combinators2, |a, b| {
        if a == b {
            Some(*a)
        } else {
            None
        }
    });

    if lcs == combinators1 {
        Some(combinators2.to_vec())
    } else if lcs == combinators2 {
        Some(combinators1.to_vec())
    } else {
        None
    }
}

/// Extracts the trailing combinator runs of both queues and merges them
/// into choices, consuming the affected components.
///
/// Returns `None` when the combinators are irreconcilable, which aborts
/// the weave.
fn merge_trailing_combinators(
    components1: &mut VecDeque<ComplexSelectorComponent>,
    components2: &mut VecDeque<ComplexSelectorComponent>,
    result: &mut VecDeque<Vec<Vec<ComplexSelectorComponent>>>,
) -> Option<()> {
    let combinators1 = components1
        .back()
        .map(|component| component.combinators.clone())
        .unwrap_or_default();
    let combinators2 = components2
        .back()
        .map(|component| component.combinators.clone())
        .unwrap_or_default();

    if combinators1.is_empty() && combinators2.is_empty() {
        return Some(());
    }

    if combinators1.len() > 1 || combinators2.len() > 1 {
        return None;
    }

    use Combinator::*;

    match (combinators1.first().copied(), combinators2.first().copied()) {
        (Some(combinator1), Some(combinator2)) => {
            let component1 = components1.pop_back().unwrap();
            let component2 = components2.pop_back().unwrap();

            if combinator1 == FollowingSibling && combinator2 == FollowingSibling {
                if component1.selector.is_superselector(&component2.selector) {
                    result.push_front(vec![vec![component2]]);
                } else if component2.selector.is_superselector(&component1.selector) {
                    result.push_front(vec![vec![component1]]);
                } else {
                    // `a ~ x` and `b ~ x` can match in either order, or on
                    // an element that is both `a` and `b`.
                    let mut choices = vec![
                        vec![component1.clone(), component2.clone()],
                        vec![component2.clone(), component1.clone()],
                    ];
                    if let Some(unified) = unify_compound(
                        &component1.selector.components,
                        &component2.selector.components,
                    ) {
                        choices.push(vec![ComplexSelectorComponent::with_combinators(
                            CompoundSelector::new(unified),
                            vec![FollowingSibling],
                        )]);
                    }
                    result.push_front(choices);
                }
            } else if (combinator1 == FollowingSibling && combinator2 == NextSibling)
                || (combinator1 == NextSibling && combinator2 == FollowingSibling)
            {
                let (following, next) = if combinator1 == FollowingSibling {
                    (component1.clone(), component2.clone())
                } else {
                    (component2.clone(), component1.clone())
                };

                if following.selector.is_superselector(&next.selector) {
                    result.push_front(vec![vec![next]]);
                } else {
                    let mut choices = vec![vec![following, next.clone()]];
                    if let Some(unified) = unify_compound(
                        &component1.selector.components,
                        &component2.selector.components,
                    ) {
                        choices.push(vec![ComplexSelectorComponent::with_combinators(
                            CompoundSelector::new(unified),
                            vec![NextSibling],
                        )]);
                    }
                    result.push_front(choices);
                }
            } else if combinator1 == Child
                && (combinator2 == NextSibling || combinator2 == FollowingSibling)
            {
                result.push_front(vec![vec![component2]]);
                components1.push_back(component1);
            } else if combinator2 == Child
                && (combinator1 == NextSibling || combinator1 == FollowingSibling)
            {
                result.push_front(vec![vec![component1]]);
                components2.push_back(component2);
            } else if combinator1 == combinator2 {
                let unified = unify_compound(
                    &component1.selector.components,
                    &component2.selector.components,
                )?;
                result.push_front(vec![vec![ComplexSelectorComponent::with_combinators(
                    CompoundSelector::new(unified),
                    vec![combinator1],
                )]]);
            } else {
                return None;
            }

            merge_trailing_combinators(components1, components2, result)
        }

        (Some(combinator1), None) => {
            if combinator1 == Child {
                if let (Some(last1), Some(last2)) = (components1.back(), components2.back()) {
                    if last2.selector.is_superselector(&last1.selector) {
                        components2.pop_back();
                    }
                }
            }
            let component = components1.pop_back().unwrap();
            result.push_front(vec![vec![component]]);
            merge_trailing_combinators(components1, components2, result)
        }

        (None, _) => {
            if combinators2.first() == Some(&Child) {
                if let (Some(last1), Some(last2)) = (components1.back(), components2.back()) {
                    if last1.selector.is_superselector(&last2.selector) {
                        components1.pop_back();
                    }
                }
            }
            let component = components2.pop_back().unwrap();
            result.push_front(vec![vec![component]]);
            merge_trailing_combinators(components1, components2, result)
        }
    }
}

/// Removes and returns the first component if it is `:root`-ish.
fn first_if_rootish(
    queue: &mut VecDeque<ComplexSelectorComponent>,
) -> Option<ComplexSelectorComponent> {
    if queue.front()?.selector.is_rootish() {
        queue.pop_front()
    } else {
        None
    }
}

/// Groups a complex selector's components so that each group contains the
/// compounds joined by explicit combinators; descendant boundaries split
/// groups.
fn group_selectors(
    components: impl IntoIterator<Item = ComplexSelectorComponent>,
) -> VecDeque<Vec<ComplexSelectorComponent>> {
    let mut groups = VecDeque::new();
    let mut group: Vec<ComplexSelectorComponent> = Vec::new();

    for component in components {
        let boundary = component.combinators.is_empty();
        group.push(component);
        if boundary {
            groups.push_back(std::mem::take(&mut group));
        }
    }

    if !group.is_empty() {
        groups.push_back(group);
    }

    groups
}

/// Whether two selector chains contain occurrences of the same unique
/// simple selector (an id or pseudo-element), forcing them to be unified
/// rather than merely interleaved.
fn must_unify(
    complex1: &[ComplexSelectorComponent],
    complex2: &[ComplexSelectorComponent],
) -> bool {
    let unique: HashSet<&SimpleSelector> = complex1
        .iter()
        .flat_map(|component| component.selector.components.iter())
        .filter(|simple| simple.is_unique())
        .collect();

    if unique.is_empty() {
        return false;
    }

    complex2.iter().any(|component| {
        component
            .selector
            .components
            .iter()
            .any(|simple| simple.is_unique() && unique.contains(simple))
    })
}

/// Pops the prefixes of both queues up to `done`, and returns each
/// concatenation order as an alternative.
fn chunks<T: Clone>(
    queue1: &mut VecDeque<T>,
    queue2: &mut VecDeque<T>,
    done: impl Fn(&VecDeque<T>) -> bool,
) -> Vec<Vec<T>> {
    let mut chunk1 = Vec::new();
    while !done(queue1) {
        chunk1.push(queue1.pop_front().unwrap());
    }

    let mut chunk2 = Vec::new();
    while !done(queue2) {
        chunk2.push(queue2.pop_front().unwrap());
    }

    match (chunk1.is_empty(), chunk2.is_empty()) {
        (true, true) => Vec::new(),
        (true, false) => vec![chunk2],
        (false, true) => vec![chunk1],
        (false, false) => {
            let mut order1 = chunk1.clone();
            order1.extend(chunk2.iter().cloned());
            let mut order2 = chunk2;
            order2.extend(chunk1);
            vec![order1, order2]
        }
    }
}

/// The Cartesian product of the choices.
pub fn paths<T: Clone>(choices: &[Vec<T>]) -> Vec<Vec<T>> {
    choices.iter().fold(vec![Vec::new()], |paths, choice| {
        choice
            .iter()
            .flat_map(|option| {
                paths.iter().map(move |path| {
                    let mut path = path.clone();
                    path.push(option.clone());
                    path
                })
            })
            .collect()
    })
}

/// The longest common subsequence of two lists, using `select` to decide
/// whether (and as what) two elements are considered common.
fn longest_common_subsequence<T: Clone>(
    list1: &[T],
    list2: &[T],
    select: impl Fn(&T, &T) -> Option<T>,
) -> Vec<T> {
    let mut lengths = vec![vec![0usize; list2.len() + 1]; list1.len() + 1];
    let mut selections: Vec<Vec<Option<T>>> = vec![vec![None; list2.len()]; list1.len()];

    for i in 0..list1.len() {
        for j in 0..list2.len() {
            selections[i][j] = select(&list1[i], &list2[j]);
            lengths[i + 1][j + 1] = match selections[i][j] {
                Some(_) => lengths[i][j] + 1,
                None => lengths[i + 1][j].max(lengths[i][j + 1]),
            };
        }
    }

    fn backtrack<T: Clone>(
        selections: &[Vec<Option<T>>],
        lengths: &[Vec<usize>],
        i: isize,
        j: isize,
    ) -> Vec<T> {
        if i == -1 || j == -1 {
            return Vec::new();
        }

        if let Some(ref selection) = selections[i as usize][j as usize] {
            let mut result = backtrack(selections, lengths, i - 1, j - 1);
            result.push(selection.clone());
            return result;
        }

        if lengths[(i + 1) as usize][j as usize] > lengths[i as usize][(j + 1) as usize] {
            backtrack(selections, lengths, i, j - 1)
        } else {
            backtrack(selections, lengths, i - 1, j)
        }
    }

    backtrack(
        &selections,
        &lengths,
        list1.len() as isize - 1,
        list2.len() as isize - 1,
    )
}

/// Removes redundant selectors from the concatenation of `lists`.
///
/// A selector is removed when another selector that is kept matches a
/// superset of the elements it matches, *and* the kept selector's
/// specificity is at least the maximum specificity of the sources that
/// generated the removed one (so the cascade cannot distinguish them).
/// Original selectors (per `is_original`) are always kept, deduplicated.
///
/// Past [`limits::TRIM_LIMIT`] candidates this degenerates to a flatten.
pub fn trim(
    lists: Vec<Vec<ComplexSelector>>,
    is_original: impl Fn(&ComplexSelector) -> bool,
    source_specificity: impl Fn(&CompoundSelector) -> i64,
) -> Vec<ComplexSelector> {
    if lists.iter().map(Vec::len).sum::<usize>() > limits::TRIM_LIMIT {
        return lists.into_iter().flatten().collect();
    }

    let mut result: VecDeque<ComplexSelector> = VecDeque::new();
    let mut num_originals = 0;

    for i in (0..lists.len()).rev() {
        'complexes: for complex1 in lists[i].iter().rev() {
            if is_original(complex1) {
                // Don't include duplicate originals, which can happen when
                // a rule extends a component of its own selector.
                for j in 0..num_originals {
                    if result[j] == *complex1 {
                        let duplicate = result.remove(j).unwrap();
                        result.push_front(duplicate);
                        continue 'complexes;
                    }
                }
                num_originals += 1;
                result.push_front(complex1.clone());
                continue;
            }

            // The maximum specificity of the sources that caused this
            // selector to be generated.
            let max_specificity = complex1
                .components
                .iter()
                .map(|component| source_specificity(&component.selector))
                .max()
                .unwrap_or(0);

            let shadowed = |complex2: &ComplexSelector| {
                complex2.min_specificity() >= max_specificity
                    && complex2.is_superselector(complex1)
            };

            if result.iter().any(|complex2| shadowed(complex2)) {
                continue;
            }
            if lists[..i]
                .iter()
                .any(|list| list.iter().any(|complex2| shadowed(complex2)))
            {
                continue;
            }

            result.push_front(complex1.clone());
        }
    }

    result.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Parse;
    use crate::selector::SelectorList;
    use proptest::prelude::*;

    fn complex(s: &str) -> ComplexSelector {
        let mut list = SelectorList::parse_str(s).unwrap();
        assert_eq!(list.components.len(), 1);
        list.components.remove(0)
    }

    fn compound(s: &str) -> Vec<SimpleSelector> {
        complex(s).components.remove(0).selector.components
    }

    fn unified(a: &str, b: &str) -> Option<String> {
        unify_compound(&compound(a), &compound(b))
            .map(|components| CompoundSelector::new(components).to_string())
    }

    #[test]
    fn unifies_disjoint_compounds() {
        assert_eq!(unified(".a", ".b").unwrap(), ".b.a");
        assert_eq!(unified(".a", ".a").unwrap(), ".a");
    }

    #[test]
    fn element_names_must_agree() {
        assert_eq!(unified("a", "*").unwrap(), "a");
        assert_eq!(unified("a.x", "a.y").unwrap(), "a.y.x");
        assert_eq!(unified("a", "b"), None);
    }

    #[test]
    fn element_name_goes_first() {
        assert_eq!(unified("a", ".x").unwrap(), "a.x");
    }

    #[test]
    fn distinct_ids_never_unify() {
        assert_eq!(unified("#a", "#b"), None);
        assert_eq!(unified("#a", "#a").unwrap(), "#a");
        assert_eq!(unified("#a", ".x").unwrap(), ".x#a");
    }

    #[test]
    fn pseudo_elements_do_not_collide() {
        assert_eq!(unified("::before", "::after"), None);
        assert_eq!(unified("::before", "::before").unwrap(), "::before");
        // Pseudo-elements sort last; new classes insert before pseudos.
        assert_eq!(unified(".a", ".b::after").unwrap(), ".b.a::after");
    }

    #[test]
    fn unifies_complex_descendants() {
        let result = unify_complex(&[complex(".a .x"), complex(".b .x")]).unwrap();
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec![".a .b .x", ".b .a .x"]);
    }

    #[test]
    fn unify_complex_merges_bases() {
        let result = unify_complex(&[complex(".a"), complex(".b")]).unwrap();
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec![".a.b"]);
    }

    #[test]
    fn unify_complex_respects_child_combinators() {
        let result = unify_complex(&[complex(".a > .x"), complex(".b > .x")]).unwrap();
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec![".b.a > .x"]);
    }

    #[test]
    fn weave_braids_descendants() {
        let result = weave(&[complex(".p"), complex(".x .y")]);
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec![".p .x .y", ".x .p .y"]);
    }

    #[test]
    fn weave_shares_common_groups() {
        let result = weave(&[complex(".shared .a"), complex(".shared .b .base")]);
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        // The common `.shared` prefix appears once in every weave.
        assert!(rendered.iter().all(|s| s.matches(".shared").count() == 1));
        assert!(rendered.contains(&".shared .a .b .base".to_string()));
    }

    #[test]
    fn same_combinator_unification_can_fail() {
        // Both selectors pin `.x`'s parent to a different id, so there is
        // no element both can match.
        let result = unify_complex(&[complex(".a#i > .x"), complex(".b#j > .x")]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn following_sibling_merges_with_next_sibling() {
        let result = unify_complex(&[complex(".a ~ .x"), complex(".b + .x")]).unwrap();
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec![".a ~ .b + .x", ".b.a + .x"]);
    }

    #[test]
    fn following_sibling_pairs_consider_both_orders() {
        let result = unify_complex(&[complex(".a ~ .x"), complex(".b ~ .x")]).unwrap();
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert_eq!(
            rendered,
            vec![".a ~ .b ~ .x", ".b ~ .a ~ .x", ".b.a ~ .x"]
        );
    }

    #[test]
    fn at_most_one_root_survives() {
        let result = weave(&[complex(":root .a"), complex(":root .b .base")]);
        let rendered: Vec<String> = result.iter().map(|c| c.to_string()).collect();
        assert!(!rendered.is_empty());
        for s in &rendered {
            assert_eq!(s.matches(":root").count(), 1);
        }
    }

    #[test]
    fn trim_removes_shadowed_selectors() {
        // `.a .x` is a superselector of `.a .b .x` with specificity at
        // least that of the generating source, so the latter is dropped.
        let kept = complex(".a .x");
        let shadowed = complex(".a .b .x");
        let result = trim(
            vec![vec![kept.clone()], vec![shadowed]],
            |_| false,
            |_| 0,
        );
        assert_eq!(result, vec![kept]);
    }

    #[test]
    fn trim_keeps_higher_specificity_sources() {
        // The shadowing selector's specificity is lower than the source
        // specificity of the generated selector, so both are kept.
        let generated = complex(".a #b .x");
        let result = trim(
            vec![vec![complex(".a .x")], vec![generated.clone()]],
            |_| false,
            |compound| {
                if compound.to_string() == "#b" {
                    1_000_000
                } else {
                    0
                }
            },
        );
        assert_eq!(result.len(), 2);
        assert!(result.contains(&generated));
    }

    #[test]
    fn trim_keeps_originals() {
        let original = complex(".a .b .x");
        let result = trim(
            vec![vec![complex(".a .x")], vec![original.clone()]],
            |c| *c == original,
            |_| 0,
        );
        assert!(result.contains(&original));
    }

    prop_compose! {
        fn arbitrary_complex()(
            names in prop::collection::vec("[a-d]", 1..4),
            classes in prop::collection::vec(prop::bool::ANY, 1..4)
        ) -> ComplexSelector {
            let components = names
                .iter()
                .zip(classes.iter().chain(std::iter::repeat(&false)))
                .map(|(name, class)| {
                    let simple = if *class {
                        SimpleSelector::Class(name.clone())
                    } else {
                        SimpleSelector::Type(name.clone())
                    };
                    ComplexSelectorComponent::new(CompoundSelector::new(vec![simple]))
                })
                .collect();
            ComplexSelector::new(components)
        }
    }

    proptest! {
        #[test]
        fn weave_round_trip(complex in arbitrary_complex()) {
            prop_assert_eq!(weave(&[complex.clone()]), vec![complex]);
        }

        #[test]
        fn trim_is_idempotent(complexes in prop::collection::vec(arbitrary_complex(), 1..6)) {
            let once = trim(vec![complexes], |_| false, |_| 0);
            let twice = trim(vec![once.clone()], |_| false, |_| 0);
            prop_assert_eq!(once, twice);
        }
    }
}
