//! The `@extend` engine.
//!
//! [`Extender`] keeps a registry mapping each simple selector to the style
//! rules whose selectors contain it, and to the selector lists that extend
//! it.  Extension is applied eagerly in both directions: a newly added
//! selector is rewritten against the extensions seen so far, and a newly
//! added extension rewrites every already-registered rule in place (the
//! selectors are shared cells, so the CSS tree sees the rewrite).
//!
//! The rewrite itself is the weave-and-trim pipeline from the selector
//! module: for each compound containing an extension target, the extender's
//! trailing compound is unified with the rest of the compound, the
//! candidate lists are combined with [`paths`], each path is woven, and the
//! result is trimmed against source specificity.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{ExtendError, Span};
use crate::limits;
use crate::sass_log;
use crate::selector::{
    paths, trim, unify_compound, weave, ComplexSelector, ComplexSelectorComponent,
    CompoundSelector, SelectorList, SimpleSelector,
};
use crate::session::Session;
use crate::stylesheet::CssTree;

/// One registered `@extend`: `extender { @extend target }`.
#[derive(Debug, Clone)]
pub struct Extension {
    pub extender: ComplexSelector,
    pub target: SimpleSelector,
    pub optional: bool,
    pub span: Span,
}

/// The per-compilation extension registry and rewriter.
pub struct Extender {
    session: Session,

    /// Extensions registered against each target simple selector.
    extensions: HashMap<SimpleSelector, Vec<Extension>>,

    /// Mandatory targets in source order, for deterministic error
    /// reporting.
    mandatory_targets: Vec<(SimpleSelector, Span)>,

    /// The rules whose selectors contain each simple selector.
    selectors: HashMap<SimpleSelector, Vec<Rc<RefCell<SelectorList>>>>,

    /// The maximum specificity of the original complex selectors that
    /// contain each simple selector; used by `trim`.
    source_specificity: HashMap<SimpleSelector, i64>,

    /// Selectors as they appeared in source, before any rewriting.
    originals: HashSet<ComplexSelector>,

    /// Targets that have appeared in at least one registered rule.
    found_targets: HashSet<SimpleSelector>,
}

impl Extender {
    pub fn new(session: Session) -> Extender {
        Extender {
            session,
            extensions: HashMap::new(),
            mandatory_targets: Vec::new(),
            selectors: HashMap::new(),
            source_specificity: HashMap::new(),
            originals: HashSet::new(),
            found_targets: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Registers a style rule's selector, rewriting it against the
    /// extensions seen so far, and returns the shared cell that future
    /// extensions will rewrite in place.
    pub fn add_selector(
        &mut self,
        selector: SelectorList,
        span: Span,
    ) -> Result<Rc<RefCell<SelectorList>>, ExtendError> {
        if !selector.is_invisible() {
            for complex in &selector.components {
                self.originals.insert(complex.clone());
            }
        }

        for complex in &selector.components {
            for component in &complex.components {
                for simple in &component.selector.components {
                    let specificity = self
                        .source_specificity
                        .entry(simple.clone())
                        .or_insert(0);
                    *specificity = (*specificity).max(complex.max_specificity());
                }
            }
        }

        let selector = if self.extensions.is_empty() {
            selector
        } else {
            let extensions = self.extensions.clone();
            match self.extend_list(&selector, &extensions, span)? {
                Some(extended) => extended,
                None => selector,
            }
        };

        let rule = Rc::new(RefCell::new(selector));
        let list = rule.borrow().clone();
        self.register_selector(&list, &rule);
        Ok(rule)
    }

    /// Registers `extender { @extend target }` and eagerly rewrites every
    /// rule whose selector contains `target`.
    pub fn add_extension(
        &mut self,
        target: &SimpleSelector,
        extender: &SelectorList,
        optional: bool,
        span: Span,
    ) -> Result<(), ExtendError> {
        let mut new_extensions: Vec<Extension> = Vec::new();
        for complex in &extender.components {
            // The extender's own simple selectors become specificity
            // sources for the selectors this extension generates.
            for component in &complex.components {
                for simple in &component.selector.components {
                    let specificity = self
                        .source_specificity
                        .entry(simple.clone())
                        .or_insert(0);
                    *specificity = (*specificity).max(complex.max_specificity());
                }
            }

            new_extensions.push(Extension {
                extender: complex.clone(),
                target: target.clone(),
                optional,
                span,
            });
        }

        self.extensions
            .entry(target.clone())
            .or_default()
            .extend(new_extensions.iter().cloned());
        if !optional {
            self.mandatory_targets.push((target.clone(), span));
        }

        // Rewrite the already-registered rules against only the new
        // extensions; earlier extensions have already been applied to them.
        let mut just_added = HashMap::new();
        just_added.insert(target.clone(), new_extensions);

        let rules = self.selectors.get(target).cloned().unwrap_or_default();
        for rule in rules {
            let current = rule.borrow().clone();
            if let Some(rewritten) = self.extend_list(&current, &just_added, span)? {
                if rewritten != current {
                    *rule.borrow_mut() = rewritten.clone();
                    self.register_selector(&rewritten, &rule);
                }
            }
        }

        Ok(())
    }

    /// Merges another module's extensions into this one, rewriting any
    /// affected rules.  Used when a downstream module's CSS is spliced
    /// into a compilation that has its own extensions.
    pub fn add_extensions_from(&mut self, other: &Extender) -> Result<(), ExtendError> {
        for extensions in other.extensions.values() {
            for extension in extensions {
                self.add_extension(
                    &extension.target,
                    &SelectorList::new(vec![extension.extender.clone()]),
                    extension.optional,
                    extension.span,
                )?;
            }
        }
        Ok(())
    }

    /// Builds a registry for a deep-cloned CSS tree, carrying over this
    /// extender's extensions but registering the clone's selector cells.
    pub fn clone_for_css(&self, tree: &CssTree) -> Extender {
        let mut clone = Extender::new(self.session.clone());
        clone.extensions = self.extensions.clone();
        clone.mandatory_targets = self.mandatory_targets.clone();
        clone.source_specificity = self.source_specificity.clone();
        clone.originals = self.originals.clone();
        clone.found_targets = self.found_targets.clone();

        for rule in &tree.rules {
            let selector = rule.selector.borrow().clone();
            clone.register_selector(&selector, &rule.selector);
        }

        clone
    }

    /// Reports the first mandatory `@extend` whose target never appeared
    /// in the stylesheet.  Optional extensions are silently ignored.
    pub fn check_unsatisfied_extensions(&self) -> Result<(), ExtendError> {
        for (target, span) in &self.mandatory_targets {
            if !self.found_targets.contains(target) {
                return Err(ExtendError::TargetNotFound {
                    target: target.to_string(),
                    span: *span,
                });
            }
        }
        Ok(())
    }

    fn register_selector(&mut self, list: &SelectorList, rule: &Rc<RefCell<SelectorList>>) {
        for complex in &list.components {
            for component in &complex.components {
                for simple in &component.selector.components {
                    self.found_targets.insert(simple.clone());
                    let rules = self.selectors.entry(simple.clone()).or_default();
                    if !rules.iter().any(|existing| Rc::ptr_eq(existing, rule)) {
                        rules.push(Rc::clone(rule));
                    }
                }
            }
        }
    }

    fn source_specificity_for(&self, compound: &CompoundSelector) -> i64 {
        compound
            .components
            .iter()
            .filter_map(|simple| self.source_specificity.get(simple).copied())
            .max()
            .unwrap_or(0)
    }

    /// Rewrites a selector list against `extensions`, or returns `None` if
    /// nothing in it is extended.
    fn extend_list(
        &mut self,
        list: &SelectorList,
        extensions: &HashMap<SimpleSelector, Vec<Extension>>,
        span: Span,
    ) -> Result<Option<SelectorList>, ExtendError> {
        let mut extended: Option<Vec<Vec<ComplexSelector>>> = None;

        for (i, complex) in list.components.iter().enumerate() {
            match self.extend_complex(complex, extensions, span)? {
                None => {
                    if let Some(ref mut extended) = extended {
                        extended.push(vec![complex.clone()]);
                    }
                }
                Some(result) => {
                    if extended.is_none() {
                        extended = Some(
                            list.components[..i]
                                .iter()
                                .map(|complex| vec![complex.clone()])
                                .collect(),
                        );
                    }
                    extended.as_mut().unwrap().push(result);
                }
            }
        }

        let extended = match extended {
            Some(extended) => extended,
            None => return Ok(None),
        };

        let trimmed = trim(
            extended,
            |complex| self.originals.contains(complex),
            |compound| self.source_specificity_for(compound),
        );

        Ok(Some(SelectorList::new(trimmed)))
    }

    /// Rewrites one complex selector, or returns `None` if none of its
    /// compounds contain an extension target.
    fn extend_complex(
        &mut self,
        complex: &ComplexSelector,
        extensions: &HashMap<SimpleSelector, Vec<Extension>>,
        span: Span,
    ) -> Result<Option<Vec<ComplexSelector>>, ExtendError> {
        if complex.leading_combinators.len() > 1 {
            return Ok(None);
        }

        let mut choices: Option<Vec<Vec<ComplexSelector>>> = None;

        for (i, component) in complex.components.iter().enumerate() {
            match self.extend_compound(component, extensions) {
                None => {
                    if let Some(ref mut choices) = choices {
                        choices.push(vec![ComplexSelector::new(vec![component.clone()])]);
                    }
                }
                Some(extended) => {
                    if choices.is_none() {
                        // The leading combinators ride on the first
                        // component's slot.
                        choices = Some(
                            complex
                                .components
                                .iter()
                                .take(i)
                                .enumerate()
                                .map(|(j, component)| {
                                    vec![ComplexSelector::with_leading_combinators(
                                        if j == 0 {
                                            complex.leading_combinators.clone()
                                        } else {
                                            Vec::new()
                                        },
                                        vec![component.clone()],
                                    )]
                                })
                                .collect(),
                        );
                        if i == 0 {
                            // No preceding components; attach the leading
                            // combinators to the extended slot's options.
                            if !complex.leading_combinators.is_empty() {
                                let extended = extended
                                    .into_iter()
                                    .map(|option| ComplexSelector::with_leading_combinators(
                                        complex.leading_combinators.clone(),
                                        option.components,
                                    ))
                                    .collect();
                                choices.as_mut().unwrap().push(extended);
                                continue;
                            }
                        }
                    }
                    choices.as_mut().unwrap().push(extended);
                }
            }
        }

        let choices = match choices {
            Some(choices) => choices,
            None => return Ok(None),
        };

        let is_original = self.originals.contains(complex);
        let mut result = Vec::new();
        let mut first = true;

        for path in paths(&choices) {
            for woven in weave(&path) {
                // The all-identity path reproduces the input selector;
                // its outputs keep the input's "original" status.
                if first && is_original {
                    self.originals.insert(woven.clone());
                }
                result.push(woven);

                if result.len() > limits::MAX_GENERATED_SELECTORS {
                    sass_log!(
                        self.session,
                        "gave up extending {}: more than {} selectors generated",
                        complex,
                        limits::MAX_GENERATED_SELECTORS
                    );
                    return Err(ExtendError::TooManyExtensions {
                        selector: complex.to_string(),
                        span,
                    });
                }
            }
            first = false;
        }

        Ok(Some(result))
    }

    /// Returns the candidate selectors for one component: the component
    /// itself, plus one candidate per applicable extension, built by
    /// unifying the extender's trailing compound with the rest of the
    /// compound.
    fn extend_compound(
        &self,
        component: &ComplexSelectorComponent,
        extensions: &HashMap<SimpleSelector, Vec<Extension>>,
    ) -> Option<Vec<ComplexSelector>> {
        let compound = &component.selector;

        let mut candidates = vec![ComplexSelector::new(vec![component.clone()])];
        let mut any = false;

        for (i, simple) in compound.components.iter().enumerate() {
            let applicable = match extensions.get(simple) {
                Some(applicable) => applicable,
                None => continue,
            };
            any = true;

            for extension in applicable {
                let extender = &extension.extender;
                let last = match extender.components.last() {
                    Some(last) => last,
                    None => continue,
                };

                let mut rest: Vec<SimpleSelector> = compound.components.clone();
                rest.remove(i);

                let unified = if rest.is_empty() {
                    last.selector.components.clone()
                } else {
                    match unify_compound(&last.selector.components, &rest) {
                        Some(unified) => unified,
                        None => continue,
                    }
                };

                let mut components: Vec<ComplexSelectorComponent> =
                    extender.components[..extender.components.len() - 1].to_vec();
                components.push(ComplexSelectorComponent::with_combinators(
                    CompoundSelector::new(unified),
                    component.combinators.clone(),
                ));

                candidates.push(ComplexSelector::with_leading_combinators(
                    extender.leading_combinators.clone(),
                    components,
                ));
            }
        }

        if any {
            Some(candidates)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Parse;

    fn extender() -> Extender {
        Extender::new(Session::quiet())
    }

    fn list(s: &str) -> SelectorList {
        SelectorList::parse_str(s).unwrap()
    }

    fn simple(s: &str) -> SimpleSelector {
        let mut l = list(s);
        l.components.remove(0).components.remove(0).selector.components.remove(0)
    }

    #[test]
    fn extend_rewrites_registered_rule() {
        let mut extender = extender();
        let rule = extender.add_selector(list(".a"), Span::default()).unwrap();

        extender
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();

        assert_eq!(rule.borrow().to_string(), ".a, .b");
    }

    #[test]
    fn extend_applies_to_later_rules() {
        let mut extender = extender();
        extender
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();

        let rule = extender.add_selector(list(".a"), Span::default()).unwrap();
        assert_eq!(rule.borrow().to_string(), ".a, .b");
    }

    #[test]
    fn extend_unifies_with_remaining_compound() {
        let mut extender = extender();
        let rule = extender
            .add_selector(list(".a.c"), Span::default())
            .unwrap();

        extender
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();

        assert_eq!(rule.borrow().to_string(), ".a.c, .c.b");
    }

    #[test]
    fn extend_weaves_descendant_chains() {
        let mut extender = extender();
        let rule = extender
            .add_selector(list(".p .z"), Span::default())
            .unwrap();

        extender
            .add_extension(&simple(".z"), &list(".x .y"), false, Span::default())
            .unwrap();

        assert_eq!(rule.borrow().to_string(), ".p .z, .p .x .y, .x .p .y");
    }

    #[test]
    fn extension_chains_propagate() {
        let mut extender = extender();
        let rule = extender.add_selector(list(".a"), Span::default()).unwrap();

        extender
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();
        extender
            .add_extension(&simple(".b"), &list(".c"), false, Span::default())
            .unwrap();

        assert_eq!(rule.borrow().to_string(), ".a, .b, .c");
    }

    #[test]
    fn placeholder_extension() {
        let mut extender = extender();
        let rule = extender.add_selector(list("%base"), Span::default()).unwrap();

        extender
            .add_extension(&simple("%base"), &list(".b"), false, Span::default())
            .unwrap();

        assert_eq!(rule.borrow().to_string(), ".b");
    }

    #[test]
    fn unsatisfied_mandatory_extension_errors() {
        let mut extender = extender();
        extender.add_selector(list(".other"), Span::default()).unwrap();
        extender
            .add_extension(&simple(".missing"), &list(".b"), false, Span::default())
            .unwrap();

        let err = extender.check_unsatisfied_extensions().unwrap_err();
        assert!(matches!(err, ExtendError::TargetNotFound { ref target, .. } if target == ".missing"));
    }

    #[test]
    fn unsatisfied_optional_extension_is_ignored() {
        let mut extender = extender();
        extender
            .add_extension(&simple(".missing"), &list(".b"), true, Span::default())
            .unwrap();

        assert!(extender.check_unsatisfied_extensions().is_ok());
    }

    #[test]
    fn satisfied_extension_passes_check() {
        let mut extender = extender();
        extender.add_selector(list(".a"), Span::default()).unwrap();
        extender
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();

        assert!(extender.check_unsatisfied_extensions().is_ok());
    }

    #[test]
    fn merged_extensions_rewrite_clone() {
        use crate::stylesheet::{CssRule, CssTree};

        let mut upstream = extender();
        upstream
            .add_extension(&simple(".a"), &list(".b"), false, Span::default())
            .unwrap();

        let mut downstream = extender();
        let rule = downstream
            .add_selector(list(".a"), Span::default())
            .unwrap();

        let mut tree = CssTree::new();
        tree.add_rule(CssRule {
            selector: Rc::clone(&rule),
            declarations: Vec::new(),
            span: Span::default(),
        });

        downstream.add_extensions_from(&upstream).unwrap();
        assert_eq!(rule.borrow().to_string(), ".a, .b");
    }
}
