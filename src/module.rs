//! Modules: the compiled view of a Sass source file.
//!
//! A [`Module`] exposes a file's variables, functions and mixins, its CSS
//! subtree, and its selector-extension store.  After construction a module
//! is immutable except for [`Module::set_variable`], which `!global`
//! assignments use and which always writes through to the module that owns
//! the variable's storage.
//!
//! Three implementations exist: [`CompiledModule`] owns storage (it aliases
//! the global scope of the [`Environment`](crate::environment::Environment)
//! it was compiled in), [`ForwardedView`] applies a `@forward` rule's
//! show/hide/prefix clauses, and [`ShadowedView`] subtracts a set of names
//! that a later load has shadowed.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use url::Url;

use crate::error::{EnvironmentError, Span};
use crate::extension::Extender;
use crate::stylesheet::CssTree;
use crate::value::{Callable, Value};

/// A map from member names to values, shared between an environment's
/// scope frame and the modules that expose it.
pub type MemberFrame<V> = Rc<RefCell<HashMap<String, V>>>;

/// The kinds of members a module exposes.  Variables are filtered
/// separately from functions and mixins by `@forward` clauses.
#[derive(Debug, Clone, Default)]
pub struct ForwardRule {
    pub url: Option<Url>,
    /// Prefix prepended to every visible member name.
    pub prefix: Option<String>,
    pub shown_variables: Option<HashSet<String>>,
    pub hidden_variables: Option<HashSet<String>>,
    pub shown_members: Option<HashSet<String>>,
    pub hidden_members: Option<HashSet<String>>,
}

impl ForwardRule {
    /// A rule with no show/hide/prefix clauses: forwards everything.
    pub fn all(url: Option<Url>) -> ForwardRule {
        ForwardRule {
            url,
            ..ForwardRule::default()
        }
    }

    fn is_passthrough(&self) -> bool {
        self.prefix.is_none()
            && self.shown_variables.is_none()
            && self.hidden_variables.is_none()
            && self.shown_members.is_none()
            && self.hidden_members.is_none()
    }
}

/// The compiled view of a Sass source file.
pub trait Module {
    /// The canonical URL of the file this module was compiled from, if any.
    fn url(&self) -> Option<&Url>;

    /// The modules this module loaded, in source order.
    fn upstream(&self) -> Vec<Rc<dyn Module>>;

    /// The modules this module forwards, in source order.
    fn forwarded(&self) -> Vec<Rc<dyn Module>>;

    fn variable(&self, name: &str) -> Option<Value>;
    fn variable_node(&self, name: &str) -> Option<Span>;
    fn has_variable(&self, name: &str) -> bool;
    fn variable_names(&self) -> Vec<String>;

    /// A stable identity for the storage of a variable, used to tell
    /// whether two forwarded views expose the same underlying variable.
    fn variable_identity(&self, name: &str) -> Option<usize>;

    /// Sets a variable this module owns or transitively forwards.
    fn set_variable(
        &self,
        name: &str,
        value: Value,
        node: Option<Span>,
    ) -> Result<(), EnvironmentError>;

    fn function(&self, name: &str) -> Option<Callable>;
    fn has_function(&self, name: &str) -> bool;
    fn function_names(&self) -> Vec<String>;

    fn mixin(&self, name: &str) -> Option<Callable>;
    fn has_mixin(&self, name: &str) -> bool;
    fn mixin_names(&self) -> Vec<String>;

    fn css(&self) -> Rc<RefCell<CssTree>>;
    fn extender(&self) -> Option<Rc<RefCell<Extender>>>;

    fn transitively_contains_css(&self) -> bool;
    fn transitively_contains_extensions(&self) -> bool;

    /// An equivalent module whose CSS subtree is deep-cloned and whose
    /// extension store is fresh, used when the module's CSS appears
    /// downstream of `@extend`.
    fn clone_css(&self) -> Rc<dyn Module>;
}

/// Identity comparison for trait-object modules.
pub fn same_module(a: &Rc<dyn Module>, b: &Rc<dyn Module>) -> bool {
    Rc::ptr_eq(a, b)
}

/// A module with owned storage, created from the global scope of the
/// environment a file was evaluated in.
pub struct CompiledModule {
    url: Option<Url>,
    variables: MemberFrame<Value>,
    variable_nodes: MemberFrame<Span>,
    functions: MemberFrame<Callable>,
    mixins: MemberFrame<Callable>,

    /// Modules this module forwards, in source order.
    forwarded: Vec<Rc<dyn Module>>,

    /// For each forwarded variable, the module that owns its storage;
    /// `set_variable` writes through this map.
    modules_by_variable: HashMap<String, Rc<dyn Module>>,

    upstream: Vec<Rc<dyn Module>>,
    css: Rc<RefCell<CssTree>>,
    extender: Rc<RefCell<Extender>>,
    transitively_contains_css: bool,
    transitively_contains_extensions: bool,
}

impl CompiledModule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: Option<Url>,
        variables: MemberFrame<Value>,
        variable_nodes: MemberFrame<Span>,
        functions: MemberFrame<Callable>,
        mixins: MemberFrame<Callable>,
        forwarded: Vec<Rc<dyn Module>>,
        upstream: Vec<Rc<dyn Module>>,
        css: CssTree,
        extender: Extender,
    ) -> Rc<CompiledModule> {
        let mut modules_by_variable = HashMap::new();
        for module in &forwarded {
            for name in module.variable_names() {
                modules_by_variable.insert(name, Rc::clone(module));
            }
        }

        let transitively_contains_css = !css.is_empty()
            || upstream.iter().any(|m| m.transitively_contains_css());
        let transitively_contains_extensions = !extender.is_empty()
            || upstream
                .iter()
                .any(|m| m.transitively_contains_extensions());

        Rc::new(CompiledModule {
            url,
            variables,
            variable_nodes,
            functions,
            mixins,
            forwarded,
            modules_by_variable,
            upstream,
            css: Rc::new(RefCell::new(css)),
            extender: Rc::new(RefCell::new(extender)),
            transitively_contains_css,
            transitively_contains_extensions,
        })
    }
}

impl Module for CompiledModule {
    fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn upstream(&self) -> Vec<Rc<dyn Module>> {
        self.upstream.clone()
    }

    fn forwarded(&self) -> Vec<Rc<dyn Module>> {
        self.forwarded.clone()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.borrow().get(name) {
            return Some(value.clone());
        }
        self.modules_by_variable
            .get(name)
            .and_then(|module| module.variable(name))
    }

    fn variable_node(&self, name: &str) -> Option<Span> {
        if let Some(node) = self.variable_nodes.borrow().get(name) {
            return Some(*node);
        }
        self.modules_by_variable
            .get(name)
            .and_then(|module| module.variable_node(name))
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.borrow().contains_key(name)
            || self.modules_by_variable.contains_key(name)
    }

    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.borrow().keys().cloned().collect();
        names.extend(self.modules_by_variable.keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    fn variable_identity(&self, name: &str) -> Option<usize> {
        if self.variables.borrow().contains_key(name) {
            return Some(Rc::as_ptr(&self.variables) as usize);
        }
        self.modules_by_variable
            .get(name)
            .and_then(|module| module.variable_identity(name))
    }

    fn set_variable(
        &self,
        name: &str,
        value: Value,
        node: Option<Span>,
    ) -> Result<(), EnvironmentError> {
        if let Some(module) = self.modules_by_variable.get(name) {
            return module.set_variable(name, value, node);
        }

        if !self.variables.borrow().contains_key(name) {
            return Err(EnvironmentError::UndefinedVariable(name.to_string()));
        }

        self.variables
            .borrow_mut()
            .insert(name.to_string(), value);
        if let Some(node) = node {
            self.variable_nodes
                .borrow_mut()
                .insert(name.to_string(), node);
        }
        Ok(())
    }

    fn function(&self, name: &str) -> Option<Callable> {
        if let Some(function) = self.functions.borrow().get(name) {
            return Some(function.clone());
        }
        self.forwarded
            .iter()
            .find_map(|module| module.function(name))
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions.borrow().contains_key(name)
            || self.forwarded.iter().any(|module| module.has_function(name))
    }

    fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.borrow().keys().cloned().collect();
        for module in &self.forwarded {
            names.extend(module.function_names());
        }
        names.sort();
        names.dedup();
        names
    }

    fn mixin(&self, name: &str) -> Option<Callable> {
        if let Some(mixin) = self.mixins.borrow().get(name) {
            return Some(mixin.clone());
        }
        self.forwarded.iter().find_map(|module| module.mixin(name))
    }

    fn has_mixin(&self, name: &str) -> bool {
        self.mixins.borrow().contains_key(name)
            || self.forwarded.iter().any(|module| module.has_mixin(name))
    }

    fn mixin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mixins.borrow().keys().cloned().collect();
        for module in &self.forwarded {
            names.extend(module.mixin_names());
        }
        names.sort();
        names.dedup();
        names
    }

    fn css(&self) -> Rc<RefCell<CssTree>> {
        Rc::clone(&self.css)
    }

    fn extender(&self) -> Option<Rc<RefCell<Extender>>> {
        Some(Rc::clone(&self.extender))
    }

    fn transitively_contains_css(&self) -> bool {
        self.transitively_contains_css
    }

    fn transitively_contains_extensions(&self) -> bool {
        self.transitively_contains_extensions
    }

    fn clone_css(&self) -> Rc<dyn Module> {
        let css = self.css.borrow().deep_clone();
        let extender = self.extender.borrow().clone_for_css(&css);

        Rc::new(CompiledModule {
            url: self.url.clone(),
            variables: Rc::clone(&self.variables),
            variable_nodes: Rc::clone(&self.variable_nodes),
            functions: Rc::clone(&self.functions),
            mixins: Rc::clone(&self.mixins),
            forwarded: self.forwarded.clone(),
            modules_by_variable: self.modules_by_variable.clone(),
            upstream: self.upstream.clone(),
            css: Rc::new(RefCell::new(css)),
            extender: Rc::new(RefCell::new(extender)),
            transitively_contains_css: self.transitively_contains_css,
            transitively_contains_extensions: self.transitively_contains_extensions,
        })
    }
}

/// A view of a module through a `@forward` rule's show/hide/prefix
/// clauses.
pub struct ForwardedView {
    inner: Rc<dyn Module>,
    rule: ForwardRule,
}

impl ForwardedView {
    /// Wraps `inner`, or returns it unchanged when the rule forwards
    /// everything under its own names.
    pub fn if_necessary(inner: Rc<dyn Module>, rule: ForwardRule) -> Rc<dyn Module> {
        if rule.is_passthrough() {
            inner
        } else {
            Rc::new(ForwardedView { inner, rule })
        }
    }

    /// Maps a visible (outer) variable name to the inner module's name, or
    /// `None` if the rule hides it.
    fn inner_variable_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        let inner = match self.rule.prefix {
            Some(ref prefix) => name.strip_prefix(prefix.as_str())?,
            None => name,
        };

        if let Some(ref shown) = self.rule.shown_variables {
            if !shown.contains(name) {
                return None;
            }
        }
        if let Some(ref hidden) = self.rule.hidden_variables {
            if hidden.contains(name) {
                return None;
            }
        }

        Some(inner)
    }

    /// Same as [`Self::inner_variable_name`] for functions and mixins.
    fn inner_member_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        let inner = match self.rule.prefix {
            Some(ref prefix) => name.strip_prefix(prefix.as_str())?,
            None => name,
        };

        if let Some(ref shown) = self.rule.shown_members {
            if !shown.contains(name) {
                return None;
            }
        }
        if let Some(ref hidden) = self.rule.hidden_members {
            if hidden.contains(name) {
                return None;
            }
        }

        Some(inner)
    }

    fn outer_variable_names(&self) -> Vec<String> {
        self.inner
            .variable_names()
            .into_iter()
            .map(|name| match self.rule.prefix {
                Some(ref prefix) => format!("{}{}", prefix, name),
                None => name,
            })
            .filter(|name| self.inner_variable_name(name).is_some())
            .collect()
    }

    fn outer_member_names(&self, inner_names: Vec<String>) -> Vec<String> {
        inner_names
            .into_iter()
            .map(|name| match self.rule.prefix {
                Some(ref prefix) => format!("{}{}", prefix, name),
                None => name,
            })
            .filter(|name| self.inner_member_name(name).is_some())
            .collect()
    }
}

impl Module for ForwardedView {
    fn url(&self) -> Option<&Url> {
        self.inner.url()
    }

    fn upstream(&self) -> Vec<Rc<dyn Module>> {
        self.inner.upstream()
    }

    fn forwarded(&self) -> Vec<Rc<dyn Module>> {
        self.inner.forwarded()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.inner.variable(self.inner_variable_name(name)?)
    }

    fn variable_node(&self, name: &str) -> Option<Span> {
        self.inner.variable_node(self.inner_variable_name(name)?)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.inner_variable_name(name)
            .map_or(false, |inner| self.inner.has_variable(inner))
    }

    fn variable_names(&self) -> Vec<String> {
        self.outer_variable_names()
    }

    fn variable_identity(&self, name: &str) -> Option<usize> {
        self.inner.variable_identity(self.inner_variable_name(name)?)
    }

    fn set_variable(
        &self,
        name: &str,
        value: Value,
        node: Option<Span>,
    ) -> Result<(), EnvironmentError> {
        match self.inner_variable_name(name) {
            Some(inner) => self.inner.set_variable(inner, value, node),
            None => Err(EnvironmentError::UndefinedVariable(name.to_string())),
        }
    }

    fn function(&self, name: &str) -> Option<Callable> {
        self.inner.function(self.inner_member_name(name)?)
    }

    fn has_function(&self, name: &str) -> bool {
        self.inner_member_name(name)
            .map_or(false, |inner| self.inner.has_function(inner))
    }

    fn function_names(&self) -> Vec<String> {
        self.outer_member_names(self.inner.function_names())
    }

    fn mixin(&self, name: &str) -> Option<Callable> {
        self.inner.mixin(self.inner_member_name(name)?)
    }

    fn has_mixin(&self, name: &str) -> bool {
        self.inner_member_name(name)
            .map_or(false, |inner| self.inner.has_mixin(inner))
    }

    fn mixin_names(&self) -> Vec<String> {
        self.outer_member_names(self.inner.mixin_names())
    }

    fn css(&self) -> Rc<RefCell<CssTree>> {
        self.inner.css()
    }

    fn extender(&self) -> Option<Rc<RefCell<Extender>>> {
        self.inner.extender()
    }

    fn transitively_contains_css(&self) -> bool {
        self.inner.transitively_contains_css()
    }

    fn transitively_contains_extensions(&self) -> bool {
        self.inner.transitively_contains_extensions()
    }

    fn clone_css(&self) -> Rc<dyn Module> {
        Rc::new(ForwardedView {
            inner: self.inner.clone_css(),
            rule: self.rule.clone(),
        })
    }
}

/// A view of a module with some member names subtracted, used when a later
/// `@import` shadows members of an earlier one.
pub struct ShadowedView {
    inner: Rc<dyn Module>,
    variables: HashSet<String>,
    functions: HashSet<String>,
    mixins: HashSet<String>,
}

impl ShadowedView {
    /// Wraps `inner` with the given names hidden.  Returns `None` when
    /// nothing would actually be hidden.
    pub fn if_necessary(
        inner: &Rc<dyn Module>,
        hidden_variables: &HashSet<String>,
        hidden_functions: &HashSet<String>,
        hidden_mixins: &HashSet<String>,
    ) -> Option<Rc<ShadowedView>> {
        let keep = |names: Vec<String>, hidden: &HashSet<String>| -> (bool, HashSet<String>) {
            let total = names.len();
            let kept: HashSet<String> =
                names.into_iter().filter(|n| !hidden.contains(n)).collect();
            (kept.len() != total, kept)
        };

        let (variables_changed, variables) = keep(inner.variable_names(), hidden_variables);
        let (functions_changed, functions) = keep(inner.function_names(), hidden_functions);
        let (mixins_changed, mixins) = keep(inner.mixin_names(), hidden_mixins);

        if !variables_changed && !functions_changed && !mixins_changed {
            return None;
        }

        Some(Rc::new(ShadowedView {
            inner: Rc::clone(inner),
            variables,
            functions,
            mixins,
        }))
    }

    /// Whether the view exposes no members at all.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.functions.is_empty() && self.mixins.is_empty()
    }
}

impl Module for ShadowedView {
    fn url(&self) -> Option<&Url> {
        self.inner.url()
    }

    fn upstream(&self) -> Vec<Rc<dyn Module>> {
        self.inner.upstream()
    }

    fn forwarded(&self) -> Vec<Rc<dyn Module>> {
        self.inner.forwarded()
    }

    fn variable(&self, name: &str) -> Option<Value> {
        if self.variables.contains(name) {
            self.inner.variable(name)
        } else {
            None
        }
    }

    fn variable_node(&self, name: &str) -> Option<Span> {
        if self.variables.contains(name) {
            self.inner.variable_node(name)
        } else {
            None
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name) && self.inner.has_variable(name)
    }

    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.variables.iter().cloned().collect();
        names.sort();
        names
    }

    fn variable_identity(&self, name: &str) -> Option<usize> {
        if self.variables.contains(name) {
            self.inner.variable_identity(name)
        } else {
            None
        }
    }

    fn set_variable(
        &self,
        name: &str,
        value: Value,
        node: Option<Span>,
    ) -> Result<(), EnvironmentError> {
        if self.variables.contains(name) {
            self.inner.set_variable(name, value, node)
        } else {
            Err(EnvironmentError::UndefinedVariable(name.to_string()))
        }
    }

    fn function(&self, name: &str) -> Option<Callable> {
        if self.functions.contains(name) {
            self.inner.function(name)
        } else {
            None
        }
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name) && self.inner.has_function(name)
    }

    fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().cloned().collect();
        names.sort();
        names
    }

    fn mixin(&self, name: &str) -> Option<Callable> {
        if self.mixins.contains(name) {
            self.inner.mixin(name)
        } else {
            None
        }
    }

    fn has_mixin(&self, name: &str) -> bool {
        self.mixins.contains(name) && self.inner.has_mixin(name)
    }

    fn mixin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mixins.iter().cloned().collect();
        names.sort();
        names
    }

    fn css(&self) -> Rc<RefCell<CssTree>> {
        self.inner.css()
    }

    fn extender(&self) -> Option<Rc<RefCell<Extender>>> {
        self.inner.extender()
    }

    fn transitively_contains_css(&self) -> bool {
        self.inner.transitively_contains_css()
    }

    fn transitively_contains_extensions(&self) -> bool {
        self.inner.transitively_contains_extensions()
    }

    fn clone_css(&self) -> Rc<dyn Module> {
        Rc::new(ShadowedView {
            inner: self.inner.clone_css(),
            variables: self.variables.clone(),
            functions: self.functions.clone(),
            mixins: self.mixins.clone(),
        })
    }
}

/// A value for a variable configured when loading a module with
/// `@forward ... with` or an `@import` of a forwarding file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredValue {
    pub value: Value,
    pub node: Option<Span>,
}

/// The set of configured variables passed to a module being loaded.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    values: HashMap<String, ConfiguredValue>,

    /// Whether this configuration was built implicitly from the importing
    /// file's variables (pre-module `@import` semantics) rather than from
    /// an explicit `with` clause.
    pub implicit: bool,
}

impl Configuration {
    pub fn empty() -> Configuration {
        Configuration::default()
    }

    pub fn implicit(values: HashMap<String, ConfiguredValue>) -> Configuration {
        Configuration {
            values,
            implicit: true,
        }
    }

    pub fn explicit(values: HashMap<String, ConfiguredValue>) -> Configuration {
        Configuration {
            values,
            implicit: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ConfiguredValue> {
        self.values.get(name)
    }

    /// Removes and returns the configured value for `name`, so a loaded
    /// module consumes each configured variable at most once.
    pub fn take(&mut self, name: &str) -> Option<ConfiguredValue> {
        self.values.remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }
}
