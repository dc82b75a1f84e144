//! The lexical environment in which a Sass file is evaluated.
//!
//! An [`Environment`] tracks a stack of scope frames for variables,
//! functions and mixins, plus the modules visible to the current file:
//! namespaced (`@use "m" as n`), global (`@use "m" as *`), imported
//! (`@import "m"`) and forwarded (`@forward "m"`).
//!
//! Name resolution walks scope frames innermost-out, then consults the
//! visible modules.  A name that resolves through more than one global
//! module is an error; a namespaced lookup goes straight to its module.
//! Lookups are accelerated by a per-name frame-index cache and a one-entry
//! "last variable" fast path; every mutation that could invalidate those
//! caches resets them, which the scope-restoration tests cover.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use url::Url;

use crate::error::{EnvironmentError, MemberKind, Span};
use crate::extension::Extender;
use crate::module::{
    same_module, CompiledModule, Configuration, ConfiguredValue, ForwardRule, ForwardedView,
    Module, ShadowedView,
};
use crate::stylesheet::CssTree;
use crate::value::{Callable, Value};

type Frame<V> = Rc<RefCell<HashMap<String, V>>>;

fn new_frame<V>() -> Frame<V> {
    Rc::new(RefCell::new(HashMap::new()))
}

/// The lexical environment for one file's evaluation.
pub struct Environment {
    /// Scope frames, outermost first.  The first frame is the global
    /// scope; frames are `Rc`-shared so [`Environment::to_module`] can
    /// alias the global frame.
    variables: Vec<Frame<Value>>,
    variable_nodes: Vec<Frame<Span>>,
    functions: Vec<Frame<Callable>>,
    mixins: Vec<Frame<Callable>>,

    /// Cache from name to the index of the frame that holds it.
    variable_indices: HashMap<String, usize>,
    function_indices: HashMap<String, usize>,
    mixin_indices: HashMap<String, usize>,

    /// Namespaced modules from `@use "m" as n`.
    modules: HashMap<String, Rc<dyn Module>>,

    /// Namespaceless modules from `@use "m" as *`.
    global_modules: Vec<Rc<dyn Module>>,

    /// Modules whose members were spilled into the global scope by
    /// `@import`.
    imported_modules: Vec<Rc<dyn Module>>,

    /// Modules re-exposed by `@forward`, in source order, without
    /// duplicates.
    forwarded_modules: Vec<Rc<dyn Module>>,

    /// Modules forwarded by files imported inside a nested scope; one list
    /// per non-global frame, created on demand.
    nested_forwarded_modules: Option<Vec<Vec<Rc<dyn Module>>>>,

    /// Every module loaded by this file, in source order.
    all_modules: Vec<Rc<dyn Module>>,

    /// One-entry fast path for repeated lookups of the same variable.
    last_variable_name: Option<String>,
    last_variable_index: usize,

    /// Whether variable assignments without a local declaration write to
    /// the global scope (true at the root and inside style rules nested
    /// directly under it).
    in_semi_global_scope: bool,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            variables: vec![new_frame()],
            variable_nodes: vec![new_frame()],
            functions: vec![new_frame()],
            mixins: vec![new_frame()],
            variable_indices: HashMap::new(),
            function_indices: HashMap::new(),
            mixin_indices: HashMap::new(),
            modules: HashMap::new(),
            global_modules: Vec::new(),
            imported_modules: Vec::new(),
            forwarded_modules: Vec::new(),
            nested_forwarded_modules: None,
            all_modules: Vec::new(),
            last_variable_name: None,
            last_variable_index: 0,
            in_semi_global_scope: true,
        }
    }

    /// Whether the current scope is the global scope.
    pub fn at_root(&self) -> bool {
        self.variables.len() == 1
    }

    /// The current scope depth, counting the global scope.
    pub fn scope_depth(&self) -> usize {
        self.variables.len()
    }

    /// Exposes a module to this environment.
    ///
    /// With a namespace the module is only reachable through it; without
    /// one the module's members become visible to namespaceless lookups,
    /// which requires that none of them collide with a global variable.
    pub fn add_module(
        &mut self,
        module: Rc<dyn Module>,
        namespace: Option<String>,
    ) -> Result<(), EnvironmentError> {
        match namespace {
            Some(namespace) => {
                if self.modules.contains_key(&namespace) {
                    return Err(EnvironmentError::DuplicateNamespace(namespace));
                }
                self.modules.insert(namespace, Rc::clone(&module));
                self.all_modules.push(module);
            }

            None => {
                for name in self.variables[0].borrow().keys() {
                    if module.has_variable(name) {
                        return Err(EnvironmentError::DuplicateMember(
                            MemberKind::Variable,
                            name.clone(),
                        ));
                    }
                }

                if !self
                    .global_modules
                    .iter()
                    .any(|other| same_module(other, &module))
                {
                    self.global_modules.push(Rc::clone(&module));
                }
                self.all_modules.push(module);
            }
        }

        Ok(())
    }

    /// Exposes a module loaded by `@import`, whose members spill into the
    /// namespaceless lookup path.
    pub fn import_module(&mut self, module: Rc<dyn Module>) {
        if !self
            .imported_modules
            .iter()
            .any(|other| same_module(other, &module))
        {
            self.imported_modules.push(Rc::clone(&module));
        }
        self.all_modules.push(module);
    }

    /// Re-exposes a module's members through this module, applying the
    /// `@forward` rule's show/hide/prefix clauses.
    ///
    /// Every member visible through the new view must not collide with a
    /// member of an already-forwarded module.
    pub fn forward_module(
        &mut self,
        module: Rc<dyn Module>,
        rule: ForwardRule,
    ) -> Result<(), EnvironmentError> {
        let view = ForwardedView::if_necessary(module, rule);

        for other in &self.forwarded_modules {
            assert_no_conflicts(&view, other)?;
        }

        self.forwarded_modules.push(view);
        Ok(())
    }

    /// Handles an `@import` of a file that itself contains `@forward`:
    /// the forwarded modules become visible to the importing file.
    ///
    /// At the root scope, members of already-visible modules that collide
    /// with the new forwards are hidden behind a [`ShadowedView`], the
    /// forwards join both the imported and forwarded lists, and local
    /// definitions of the same names are removed.  In a nested scope the
    /// forwards are only visible until the scope ends.
    pub fn import_forwards(&mut self, module: &Rc<dyn Module>) {
        let mut forwarded = module.forwarded();
        if forwarded.is_empty() {
            return;
        }

        // A module that is already globally visible and forwarded is not
        // re-exposed.
        forwarded.retain(|new| {
            !(self
                .forwarded_modules
                .iter()
                .any(|other| same_module(other, new))
                && self
                    .imported_modules
                    .iter()
                    .any(|other| same_module(other, new)))
        });

        let variable_names: HashSet<String> = forwarded
            .iter()
            .flat_map(|module| module.variable_names())
            .collect();
        let function_names: HashSet<String> = forwarded
            .iter()
            .flat_map(|module| module.function_names())
            .collect();
        let mixin_names: HashSet<String> = forwarded
            .iter()
            .flat_map(|module| module.mixin_names())
            .collect();

        if self.at_root() {
            shadow_modules(
                &mut self.imported_modules,
                &variable_names,
                &function_names,
                &mixin_names,
            );
            shadow_modules(
                &mut self.forwarded_modules,
                &variable_names,
                &function_names,
                &mixin_names,
            );

            for module in &forwarded {
                if !self
                    .imported_modules
                    .iter()
                    .any(|other| same_module(other, module))
                {
                    self.imported_modules.push(Rc::clone(module));
                }
                if !self
                    .forwarded_modules
                    .iter()
                    .any(|other| same_module(other, module))
                {
                    self.forwarded_modules.push(Rc::clone(module));
                }
            }

            // Local definitions of forwarded names are now shadowed.
            for name in &variable_names {
                self.variable_indices.remove(name);
                self.variables.last().unwrap().borrow_mut().remove(name);
                self.variable_nodes.last().unwrap().borrow_mut().remove(name);
                if self.last_variable_name.as_deref() == Some(name.as_str()) {
                    self.last_variable_name = None;
                }
            }
            for name in &function_names {
                self.function_indices.remove(name);
                self.functions.last().unwrap().borrow_mut().remove(name);
            }
            for name in &mixin_names {
                self.mixin_indices.remove(name);
                self.mixins.last().unwrap().borrow_mut().remove(name);
            }
        } else {
            let depth = self.variables.len() - 1;
            let nested = self
                .nested_forwarded_modules
                .get_or_insert_with(|| vec![Vec::new(); depth]);
            nested.last_mut().unwrap().extend(forwarded);
        }
    }

    /// Looks up a variable, in the named module or lexically.
    pub fn get_variable(
        &mut self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<Value>, EnvironmentError> {
        if let Some(namespace) = namespace {
            return Ok(self.get_module(namespace)?.variable(name));
        }

        if self.last_variable_name.as_deref() == Some(name) {
            let found = self.variables[self.last_variable_index]
                .borrow()
                .get(name)
                .cloned();
            if let Some(value) = found {
                return Ok(Some(value));
            }
            return self.variable_from_global_modules(name);
        }

        if let Some(&index) = self.variable_indices.get(name) {
            self.last_variable_name = Some(name.to_string());
            self.last_variable_index = index;
            if let Some(value) = self.variables[index].borrow().get(name) {
                return Ok(Some(value.clone()));
            }
            return self.variable_from_global_modules(name);
        }

        match self.variable_index(name) {
            None => self.variable_from_global_modules(name),
            Some(index) => {
                self.last_variable_name = Some(name.to_string());
                self.last_variable_index = index;
                self.variable_indices.insert(name.to_string(), index);
                if let Some(value) = self.variables[index].borrow().get(name) {
                    return Ok(Some(value.clone()));
                }
                self.variable_from_global_modules(name)
            }
        }
    }

    /// Whether a variable with this name is visible.
    pub fn variable_exists(&mut self, name: &str) -> bool {
        matches!(self.get_variable(name, None), Ok(Some(_)))
    }

    /// Sets a variable.
    ///
    /// With `global` (or at the root) the variable lands in the global
    /// scope, unless a global module already defines it, in which case the
    /// set is forwarded to that module.  Otherwise the innermost frame
    /// that already holds the name is updated, falling back to declaring
    /// it in the current frame.
    pub fn set_variable(
        &mut self,
        name: &str,
        value: Value,
        node: Option<Span>,
        namespace: Option<&str>,
        global: bool,
    ) -> Result<(), EnvironmentError> {
        if let Some(namespace) = namespace {
            return self.get_module(namespace)?.set_variable(name, value, node);
        }

        if global || self.at_root() {
            // Don't write locally if a global module already owns the
            // variable.
            if !self.variables[0].borrow().contains_key(name) {
                let owner = self.from_one_module(MemberKind::Variable, name, |module| {
                    if module.has_variable(name) {
                        Some(Rc::clone(module))
                    } else {
                        None
                    }
                })?;
                if let Some(module) = owner {
                    return module.set_variable(name, value, node);
                }
            }

            self.variables[0]
                .borrow_mut()
                .insert(name.to_string(), value);
            if let Some(node) = node {
                self.variable_nodes[0]
                    .borrow_mut()
                    .insert(name.to_string(), node);
            }
            return Ok(());
        }

        // A nested import may have forwarded a module that owns the
        // variable.
        if self.nested_forwarded_modules.is_some()
            && !self.variable_indices.contains_key(name)
            && self.variable_index(name).is_none()
        {
            let nested = self.nested_forwarded_modules.as_ref().unwrap();
            let mut owner = None;
            'outer: for modules in nested.iter().rev() {
                for module in modules.iter().rev() {
                    if module.has_variable(name) {
                        owner = Some(Rc::clone(module));
                        break 'outer;
                    }
                }
            }
            if let Some(module) = owner {
                return module.set_variable(name, value, node);
            }
        }

        let mut index = if self.last_variable_name.as_deref() == Some(name) {
            self.last_variable_index
        } else {
            match self.variable_indices.get(name) {
                Some(&index) => index,
                None => {
                    let index = self
                        .variable_index(name)
                        .unwrap_or(self.variables.len() - 1);
                    self.variable_indices.insert(name.to_string(), index);
                    index
                }
            }
        };

        // Outside a semi-global scope, an assignment that would land in
        // the global scope declares a new local instead.
        if !self.in_semi_global_scope && index == 0 {
            index = self.variables.len() - 1;
            self.variable_indices.insert(name.to_string(), index);
        }

        self.last_variable_name = Some(name.to_string());
        self.last_variable_index = index;
        self.variables[index]
            .borrow_mut()
            .insert(name.to_string(), value);
        if let Some(node) = node {
            self.variable_nodes[index]
                .borrow_mut()
                .insert(name.to_string(), node);
        }
        Ok(())
    }

    pub fn get_function(
        &mut self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<Callable>, EnvironmentError> {
        if let Some(namespace) = namespace {
            return Ok(self.get_module(namespace)?.function(name));
        }

        if let Some(&index) = self.function_indices.get(name) {
            if let Some(function) = self.functions[index].borrow().get(name) {
                return Ok(Some(function.clone()));
            }
        }

        if let Some(index) = member_index(&self.functions, name) {
            self.function_indices.insert(name.to_string(), index);
            if let Some(function) = self.functions[index].borrow().get(name) {
                return Ok(Some(function.clone()));
            }
        }

        self.from_one_module(MemberKind::Function, name, |module| module.function(name))
    }

    /// Defines a function in the current scope.
    pub fn set_function(&mut self, function: Callable) {
        let index = self.functions.len() - 1;
        self.function_indices
            .insert(function.name().to_string(), index);
        self.functions[index]
            .borrow_mut()
            .insert(function.name().to_string(), function);
    }

    pub fn get_mixin(
        &mut self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Option<Callable>, EnvironmentError> {
        if let Some(namespace) = namespace {
            return Ok(self.get_module(namespace)?.mixin(name));
        }

        if let Some(&index) = self.mixin_indices.get(name) {
            if let Some(mixin) = self.mixins[index].borrow().get(name) {
                return Ok(Some(mixin.clone()));
            }
        }

        if let Some(index) = member_index(&self.mixins, name) {
            self.mixin_indices.insert(name.to_string(), index);
            if let Some(mixin) = self.mixins[index].borrow().get(name) {
                return Ok(Some(mixin.clone()));
            }
        }

        self.from_one_module(MemberKind::Mixin, name, |module| module.mixin(name))
    }

    /// Defines a mixin in the current scope.
    pub fn set_mixin(&mut self, mixin: Callable) {
        let index = self.mixins.len() - 1;
        self.mixin_indices.insert(mixin.name().to_string(), index);
        self.mixins[index]
            .borrow_mut()
            .insert(mixin.name().to_string(), mixin);
    }

    /// Runs `callback` in a new scope.
    ///
    /// All frames pushed for the callback are popped on the way out, and
    /// the lookup caches are purged of names the scope defined, so the
    /// environment is restored to its pre-call state regardless of what
    /// the callback did.
    ///
    /// With `when == false` no scope is created; only the semi-global
    /// flag is tracked, which is what single-statement bodies need.
    pub fn scope<T>(
        &mut self,
        semi_global: bool,
        when: bool,
        callback: impl FnOnce(&mut Environment) -> T,
    ) -> T {
        if !when {
            let was_semi_global = self.in_semi_global_scope;
            self.in_semi_global_scope = false;
            let result = callback(self);
            self.in_semi_global_scope = was_semi_global;
            return result;
        }

        let semi_global = semi_global && self.in_semi_global_scope;
        let was_semi_global = self.in_semi_global_scope;
        self.in_semi_global_scope = semi_global;

        self.variables.push(new_frame());
        self.variable_nodes.push(new_frame());
        self.functions.push(new_frame());
        self.mixins.push(new_frame());
        if let Some(ref mut nested) = self.nested_forwarded_modules {
            nested.push(Vec::new());
        }

        let result = callback(self);

        self.in_semi_global_scope = was_semi_global;
        self.last_variable_name = None;
        self.last_variable_index = 0;

        let variables = self.variables.pop().unwrap();
        for name in variables.borrow().keys() {
            self.variable_indices.remove(name);
        }
        self.variable_nodes.pop();

        let functions = self.functions.pop().unwrap();
        for name in functions.borrow().keys() {
            self.function_indices.remove(name);
        }

        let mixins = self.mixins.pop().unwrap();
        for name in mixins.borrow().keys() {
            self.mixin_indices.remove(name);
        }

        if let Some(ref mut nested) = self.nested_forwarded_modules {
            nested.pop();
        }

        result
    }

    /// Serializes the whole variable stack into a module configuration,
    /// used when a file containing `@forward` is loaded via `@import`.
    pub fn to_implicit_configuration(&self) -> Configuration {
        let mut values = HashMap::new();
        for (i, frame) in self.variables.iter().enumerate() {
            let nodes = self.variable_nodes[i].borrow();
            for (name, value) in frame.borrow().iter() {
                values.insert(
                    name.clone(),
                    ConfiguredValue {
                        value: value.clone(),
                        node: nodes.get(name).copied(),
                    },
                );
            }
        }
        Configuration::implicit(values)
    }

    /// Captures this environment's global scope as a module.
    pub fn to_module(
        &self,
        url: Option<Url>,
        css: CssTree,
        extender: Extender,
    ) -> Rc<CompiledModule> {
        debug_assert!(self.at_root());
        CompiledModule::new(
            url,
            Rc::clone(&self.variables[0]),
            Rc::clone(&self.variable_nodes[0]),
            Rc::clone(&self.functions[0]),
            Rc::clone(&self.mixins[0]),
            self.forwarded_modules.clone(),
            self.all_modules.clone(),
            css,
            extender,
        )
    }

    fn get_module(&self, namespace: &str) -> Result<Rc<dyn Module>, EnvironmentError> {
        self.modules
            .get(namespace)
            .map(Rc::clone)
            .ok_or_else(|| EnvironmentError::UndefinedModule(namespace.to_string()))
    }

    fn variable_index(&self, name: &str) -> Option<usize> {
        member_index(&self.variables, name)
    }

    fn variable_from_global_modules(
        &self,
        name: &str,
    ) -> Result<Option<Value>, EnvironmentError> {
        self.from_one_module(MemberKind::Variable, name, |module| module.variable(name))
    }

    /// Resolves a name against the modules visible without a namespace.
    ///
    /// Modules forwarded by nested imports win first (innermost scope
    /// out, most recent first within a scope).  After that the imported
    /// and namespaceless-`@use` modules form one global set: a name
    /// matching in more than one of them is an error listing every
    /// offender.
    fn from_one_module<T>(
        &self,
        kind: MemberKind,
        name: &str,
        f: impl Fn(&Rc<dyn Module>) -> Option<T>,
    ) -> Result<Option<T>, EnvironmentError> {
        if let Some(ref nested) = self.nested_forwarded_modules {
            for modules in nested.iter().rev() {
                for module in modules.iter().rev() {
                    if let Some(value) = f(module) {
                        return Ok(Some(value));
                    }
                }
            }
        }

        let mut found = None;
        let mut matched: Vec<&Rc<dyn Module>> = Vec::new();
        let mut urls = Vec::new();
        for module in self.imported_modules.iter().chain(&self.global_modules) {
            if let Some(value) = f(module) {
                // A module can be reachable through both lists; it only
                // counts once.
                if matched.iter().any(|other| same_module(other, module)) {
                    continue;
                }
                matched.push(module);
                urls.push(
                    module
                        .url()
                        .map(Url::to_string)
                        .unwrap_or_else(|| "an unnamed module".to_string()),
                );
                if found.is_none() {
                    found = Some(value);
                }
            }
        }

        if urls.len() > 1 {
            return Err(EnvironmentError::AmbiguousGlobal(
                kind,
                name.to_string(),
                urls,
            ));
        }

        Ok(found)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

fn member_index<V>(frames: &[Frame<V>], name: &str) -> Option<usize> {
    (0..frames.len())
        .rev()
        .find(|&i| frames[i].borrow().contains_key(name))
}

/// Replaces modules in `list` with shadowed views that hide the given
/// names; views left with no visible members are dropped entirely.
fn shadow_modules(
    list: &mut Vec<Rc<dyn Module>>,
    variables: &HashSet<String>,
    functions: &HashSet<String>,
    mixins: &HashSet<String>,
) {
    let mut result: Vec<Rc<dyn Module>> = Vec::new();
    for module in list.drain(..) {
        match ShadowedView::if_necessary(&module, variables, functions, mixins) {
            Some(shadowed) => {
                if !shadowed.is_empty() {
                    result.push(shadowed);
                }
            }
            None => result.push(module),
        }
    }
    *list = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Number;
    use crate::session::Session;

    fn num(v: f64) -> Value {
        Value::Number(Number::unitless(v))
    }

    fn test_module(url: &str, vars: &[(&str, f64)]) -> Rc<dyn Module> {
        test_module_forwarding(url, vars, Vec::new())
    }

    fn test_module_forwarding(
        url: &str,
        vars: &[(&str, f64)],
        forwarded: Vec<Rc<dyn Module>>,
    ) -> Rc<dyn Module> {
        let variables = new_frame();
        for (name, value) in vars {
            variables
                .borrow_mut()
                .insert(name.to_string(), num(*value));
        }
        CompiledModule::new(
            Some(Url::parse(url).unwrap()),
            variables,
            new_frame(),
            new_frame(),
            new_frame(),
            forwarded,
            Vec::new(),
            CssTree::new(),
            Extender::new(Session::quiet()),
        )
    }

    #[test]
    fn global_variable_round_trip() {
        let mut env = Environment::new();
        env.set_variable("x", num(1.0), None, None, false).unwrap();
        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(1.0)));
        assert_eq!(env.get_variable("y", None).unwrap(), None);
    }

    #[test]
    fn block_scopes_shadow_without_bleeding() {
        let mut env = Environment::new();
        env.set_variable("x", num(1.0), None, None, false).unwrap();

        env.scope(false, true, |env| {
            env.set_variable("x", num(2.0), None, None, false).unwrap();
            assert_eq!(env.get_variable("x", None).unwrap(), Some(num(2.0)));
        });

        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(1.0)));
    }

    #[test]
    fn global_flag_writes_through_scopes() {
        let mut env = Environment::new();
        env.set_variable("x", num(1.0), None, None, false).unwrap();

        env.scope(false, true, |env| {
            env.set_variable("x", num(2.0), None, None, true).unwrap();
        });

        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(2.0)));
    }

    #[test]
    fn semi_global_scopes_update_globals() {
        let mut env = Environment::new();
        env.set_variable("x", num(1.0), None, None, false).unwrap();

        // A media-rule-like scope at the root keeps root assignment
        // semantics.
        env.scope(true, true, |env| {
            env.set_variable("x", num(2.0), None, None, false).unwrap();
        });
        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(2.0)));

        // Nested below a non-semi-global scope, the flag no longer
        // applies.
        env.scope(false, true, |env| {
            env.scope(true, true, |env| {
                env.set_variable("x", num(3.0), None, None, false).unwrap();
            });
        });
        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(2.0)));
    }

    #[test]
    fn scope_restores_state_on_error() {
        let mut env = Environment::new();
        env.set_variable("outer", num(1.0), None, None, false).unwrap();
        let depth = env.scope_depth();

        let result: Result<(), &str> = env.scope(false, true, |env| {
            env.set_variable("inner", num(2.0), None, None, false).unwrap();
            // Warm the lookup caches with scope-local state.
            assert_eq!(env.get_variable("inner", None).unwrap(), Some(num(2.0)));
            Err("evaluation failed")
        });
        assert!(result.is_err());

        assert_eq!(env.scope_depth(), depth);
        assert_eq!(env.get_variable("inner", None).unwrap(), None);
        assert_eq!(env.get_variable("outer", None).unwrap(), Some(num(1.0)));

        // The frame-index cache must not retain the popped scope.
        env.set_variable("inner", num(3.0), None, None, false).unwrap();
        assert_eq!(env.get_variable("inner", None).unwrap(), Some(num(3.0)));
    }

    #[test]
    fn scope_without_frame_tracks_semi_global_only() {
        let mut env = Environment::new();
        let depth = env.scope_depth();
        env.scope(false, false, |env| {
            assert_eq!(env.scope_depth(), depth);
            env.set_variable("x", num(1.0), None, None, false).unwrap();
        });
        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(1.0)));
    }

    #[test]
    fn duplicate_namespace_is_an_error() {
        let mut env = Environment::new();
        env.add_module(test_module("file:///a.scss", &[]), Some("m".into()))
            .unwrap();
        let err = env
            .add_module(test_module("file:///b.scss", &[]), Some("m".into()))
            .unwrap_err();
        assert!(matches!(err, EnvironmentError::DuplicateNamespace(ref ns) if ns == "m"));
    }

    #[test]
    fn global_module_conflicts_with_global_variable() {
        let mut env = Environment::new();
        env.set_variable("c", num(1.0), None, None, false).unwrap();

        let err = env
            .add_module(test_module("file:///a.scss", &[("c", 2.0)]), None)
            .unwrap_err();
        assert!(
            matches!(err, EnvironmentError::DuplicateMember(MemberKind::Variable, ref n) if n == "c")
        );
    }

    #[test]
    fn ambiguous_global_lookup_lists_both_modules() {
        let mut env = Environment::new();
        env.add_module(test_module("file:///a.scss", &[("c", 1.0)]), None)
            .unwrap();
        env.add_module(test_module("file:///b.scss", &[("c", 2.0)]), None)
            .unwrap();

        let err = env.get_variable("c", None).unwrap_err();
        match err {
            EnvironmentError::AmbiguousGlobal(MemberKind::Variable, name, urls) => {
                assert_eq!(name, "c");
                assert_eq!(urls, vec!["file:///a.scss", "file:///b.scss"]);
            }
            other => panic!("expected ambiguity error, got {:?}", other),
        }
    }

    #[test]
    fn imported_and_global_modules_share_the_ambiguity_check() {
        let mut env = Environment::new();
        env.import_module(test_module("file:///imported.scss", &[("c", 1.0)]));
        env.add_module(test_module("file:///used.scss", &[("c", 2.0)]), None)
            .unwrap();

        let err = env.get_variable("c", None).unwrap_err();
        match err {
            EnvironmentError::AmbiguousGlobal(MemberKind::Variable, name, urls) => {
                assert_eq!(name, "c");
                assert_eq!(urls, vec!["file:///imported.scss", "file:///used.scss"]);
            }
            other => panic!("expected ambiguity error, got {:?}", other),
        }

        // A name only one of them defines still resolves.
        env.import_module(test_module("file:///more.scss", &[("d", 3.0)]));
        assert_eq!(env.get_variable("d", None).unwrap(), Some(num(3.0)));
    }

    #[test]
    fn a_module_reachable_twice_is_not_ambiguous() {
        let mut env = Environment::new();
        let module = test_module("file:///lib.scss", &[("c", 1.0)]);
        env.import_module(Rc::clone(&module));
        env.add_module(module, None).unwrap();

        assert_eq!(env.get_variable("c", None).unwrap(), Some(num(1.0)));
    }

    #[test]
    fn unambiguous_global_lookup_resolves() {
        let mut env = Environment::new();
        env.add_module(test_module("file:///a.scss", &[("c", 1.0)]), None)
            .unwrap();
        env.add_module(test_module("file:///b.scss", &[("d", 2.0)]), None)
            .unwrap();

        assert_eq!(env.get_variable("c", None).unwrap(), Some(num(1.0)));
        assert_eq!(env.get_variable("d", None).unwrap(), Some(num(2.0)));
    }

    #[test]
    fn namespaced_lookup_and_set() {
        let mut env = Environment::new();
        env.add_module(test_module("file:///a.scss", &[("c", 1.0)]), Some("m".into()))
            .unwrap();

        assert_eq!(env.get_variable("c", Some("m")).unwrap(), Some(num(1.0)));
        assert!(matches!(
            env.get_variable("c", Some("other")),
            Err(EnvironmentError::UndefinedModule(_))
        ));

        env.set_variable("c", num(5.0), None, Some("m"), false).unwrap();
        assert_eq!(env.get_variable("c", Some("m")).unwrap(), Some(num(5.0)));

        assert!(matches!(
            env.set_variable("missing", num(1.0), None, Some("m"), false),
            Err(EnvironmentError::UndefinedVariable(_))
        ));
    }

    #[test]
    fn global_set_forwards_to_owning_module() {
        let mut env = Environment::new();
        let module = test_module("file:///a.scss", &[("c", 1.0)]);
        env.add_module(Rc::clone(&module), None).unwrap();

        // `$c: 2 !global` with `$c` owned by a global module writes into
        // the module, not the local scope.
        env.set_variable("c", num(2.0), None, None, true).unwrap();
        assert_eq!(module.variable("c"), Some(num(2.0)));
        assert_eq!(env.get_variable("c", None).unwrap(), Some(num(2.0)));
    }

    #[test]
    fn forwarded_modules_conflict_on_shared_names() {
        let mut env = Environment::new();
        env.forward_module(
            test_module("file:///a.scss", &[("c", 1.0)]),
            ForwardRule::all(None),
        )
        .unwrap();

        let err = env
            .forward_module(
                test_module("file:///b.scss", &[("c", 2.0)]),
                ForwardRule::all(None),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "two modules both define a variable named $c");
    }

    #[test]
    fn forward_prefix_and_show_filter_members() {
        let mut env = Environment::new();
        let rule = ForwardRule {
            prefix: Some("lib-".to_string()),
            shown_variables: Some(["lib-c".to_string()].into_iter().collect()),
            ..ForwardRule::all(None)
        };
        env.forward_module(test_module("file:///a.scss", &[("c", 1.0), ("d", 2.0)]), rule)
            .unwrap();

        let module = env.to_module(None, CssTree::new(), Extender::new(Session::quiet()));
        assert_eq!(module.variable("lib-c"), Some(num(1.0)));
        assert_eq!(module.variable("lib-d"), None);
        assert_eq!(module.variable("c"), None);
    }

    #[test]
    fn import_forwards_shadows_previous_members() {
        let mut env = Environment::new();

        let old = test_module("file:///old.scss", &[("c", 1.0), ("keep", 3.0)]);
        env.import_module(old);

        // A local definition of a forwarded name is shadowed too.
        env.set_variable("c", num(10.0), None, None, false).unwrap();

        let inner = test_module("file:///inner.scss", &[("c", 2.0)]);
        let importing = test_module_forwarding("file:///fwd.scss", &[], vec![inner]);
        env.import_forwards(&importing);

        assert_eq!(env.get_variable("c", None).unwrap(), Some(num(2.0)));
        assert_eq!(env.get_variable("keep", None).unwrap(), Some(num(3.0)));
    }

    #[test]
    fn nested_import_forwards_end_with_their_scope() {
        let mut env = Environment::new();

        let inner = test_module("file:///inner.scss", &[("c", 2.0)]);
        let importing = test_module_forwarding("file:///fwd.scss", &[], vec![inner]);

        env.scope(false, true, |env| {
            env.import_forwards(&importing);
            assert_eq!(env.get_variable("c", None).unwrap(), Some(num(2.0)));
        });

        assert_eq!(env.get_variable("c", None).unwrap(), None);
    }

    #[test]
    fn implicit_configuration_prefers_inner_scopes() {
        let mut env = Environment::new();
        env.set_variable("a", num(1.0), None, None, false).unwrap();
        env.set_variable("b", num(2.0), None, None, false).unwrap();

        env.scope(false, true, |env| {
            env.set_variable("a", num(9.0), None, None, false).unwrap();

            let config = env.to_implicit_configuration();
            assert_eq!(config.get("a").unwrap().value, num(9.0));
            assert_eq!(config.get("b").unwrap().value, num(2.0));
        });
    }

    #[test]
    fn module_aliases_global_scope() {
        let mut env = Environment::new();
        env.set_variable("x", num(1.0), None, None, false).unwrap();

        let module = env.to_module(None, CssTree::new(), Extender::new(Session::quiet()));
        assert_eq!(module.variable("x"), Some(num(1.0)));

        // Later global sets are visible through the module, and module
        // sets are visible to the environment.
        env.set_variable("x", num(2.0), None, None, false).unwrap();
        assert_eq!(module.variable("x"), Some(num(2.0)));

        module.set_variable("x", num(3.0), None).unwrap();
        assert_eq!(env.get_variable("x", None).unwrap(), Some(num(3.0)));
    }

    #[test]
    fn functions_and_mixins_resolve_lexically() {
        let mut env = Environment::new();
        let outer = Callable::new("helper", Span::default());
        env.set_function(outer.clone());

        env.scope(false, true, |env| {
            let inner = Callable::new("helper", Span::default());
            env.set_function(inner.clone());
            assert_eq!(env.get_function("helper", None).unwrap(), Some(inner));
        });

        assert_eq!(env.get_function("helper", None).unwrap(), Some(outer));
        assert_eq!(env.get_mixin("nope", None).unwrap(), None);
    }
}

/// Two forwarded modules must not expose the same member, unless it is
/// the same underlying member seen through both.
fn assert_no_conflicts(
    new: &Rc<dyn Module>,
    old: &Rc<dyn Module>,
) -> Result<(), EnvironmentError> {
    for name in new.variable_names() {
        if old.has_variable(&name)
            && new.variable_identity(&name) != old.variable_identity(&name)
        {
            return Err(EnvironmentError::DuplicateMember(MemberKind::Variable, name));
        }
    }

    for name in new.function_names() {
        if let (Some(theirs), Some(ours)) = (old.function(&name), new.function(&name)) {
            if theirs != ours {
                return Err(EnvironmentError::DuplicateMember(MemberKind::Function, name));
            }
        }
    }

    for name in new.mixin_names() {
        if let (Some(theirs), Some(ours)) = (old.mixin(&name), new.mixin(&name)) {
            if theirs != ours {
                return Err(EnvironmentError::DuplicateMember(MemberKind::Mixin, name));
            }
        }
    }

    Ok(())
}
