//! The SassScript value model.
//!
//! [`Value`] is the tagged union over every runtime value the evaluator can
//! produce.  Values are immutable; "mutation" constructs a new value.  The
//! type assertions (`assert_number` and friends) are what builtin functions
//! use to check their arguments; they fail with a [`ScriptError`] carrying
//! the argument name, and the evaluator attaches a span before propagating.

use std::fmt;
use std::rc::Rc;
use std::slice;

use crate::color::Color;
use crate::error::*;
use crate::number::Number;

/// Separator for list values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ListSeparator {
    Space,
    Comma,
    Slash,

    /// Single-element and empty lists don't commit to a separator until
    /// they are combined with another list.
    Undecided,
}

/// A SassScript list.
#[derive(Debug, Clone, PartialEq)]
pub struct List {
    pub contents: Vec<Value>,
    pub separator: ListSeparator,
    pub brackets: bool,
}

impl List {
    pub fn new(contents: Vec<Value>, separator: ListSeparator) -> List {
        List {
            contents,
            separator,
            brackets: false,
        }
    }

    pub fn bracketed(contents: Vec<Value>, separator: ListSeparator) -> List {
        List {
            contents,
            separator,
            brackets: true,
        }
    }
}

/// An argument list: the value bound to `$args...` rest arguments.
///
/// It is a comma list that additionally carries the keyword arguments that
/// were passed.  `keywords_accessed` lets the evaluator diagnose keywords
/// that no parameter consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentList {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
    pub separator: ListSeparator,
    pub keywords_accessed: std::cell::Cell<bool>,
}

impl ArgumentList {
    pub fn new(
        positional: Vec<Value>,
        keywords: Vec<(String, Value)>,
        separator: ListSeparator,
    ) -> ArgumentList {
        ArgumentList {
            positional,
            keywords,
            separator,
            keywords_accessed: std::cell::Cell::new(false),
        }
    }

    pub fn keywords(&self) -> &[(String, Value)] {
        self.keywords_accessed.set(true);
        &self.keywords
    }
}

/// A SassScript map.
///
/// Entries preserve insertion order.  Keys are compared with value
/// equality, so `1px` and a converted `0.0104166667in` address the same
/// entry.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Map {
        Map::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Inserts an entry, replacing the value in place if an equal key is
    /// already present.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let i = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(i).1)
    }

    pub fn iter(&self) -> slice::Iter<'_, (Value, Value)> {
        self.entries.iter()
    }
}

impl PartialEq for Map {
    /// Map equality is order-insensitive.
    fn eq(&self, other: &Map) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k) == Some(v))
    }
}

impl FromIterator<(Value, Value)> for Map {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Map {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// A SassScript string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SassString {
    pub text: String,
    pub quoted: bool,
}

impl SassString {
    pub fn quoted(text: impl Into<String>) -> SassString {
        SassString {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn unquoted(text: impl Into<String>) -> SassString {
        SassString {
            text: text.into(),
            quoted: false,
        }
    }
}

/// A named callable: a user-defined or builtin function or mixin.
///
/// The body lives with the evaluator; this core only needs a stable
/// identity for shadowing checks and first-class function values, so a
/// callable is an `Rc`'d record compared by pointer.
#[derive(Debug, Clone)]
pub struct Callable(Rc<CallableInner>);

#[derive(Debug)]
struct CallableInner {
    name: String,
    span: Span,
}

impl Callable {
    pub fn new(name: impl Into<String>, span: Span) -> Callable {
        Callable(Rc::new(CallableInner {
            name: name.into(),
            span,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn span(&self) -> Span {
        self.0.span
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Callable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A SassScript value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Number(Number),
    Color(Color),
    String(SassString),
    List(List),
    ArgumentList(ArgumentList),
    Map(Map),
    Function(Callable),
}

impl Value {
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(*self, Value::Boolean(false) | Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(*self, Value::Null)
    }

    /// Views this value as a list: lists view their contents, maps view
    /// their entries as two-element lists, and any other value is a
    /// single-element list of itself.
    pub fn as_list(&self) -> Vec<Value> {
        match *self {
            Value::List(ref list) => list.contents.clone(),
            Value::ArgumentList(ref args) => args.positional.clone(),
            Value::Map(ref map) => map
                .iter()
                .map(|(k, v)| {
                    Value::List(List::new(vec![k.clone(), v.clone()], ListSeparator::Space))
                })
                .collect(),
            ref other => vec![other.clone()],
        }
    }

    /// The separator this value would use as a list.
    pub fn separator(&self) -> ListSeparator {
        match *self {
            Value::List(ref list) => list.separator,
            Value::ArgumentList(ref args) => args.separator,
            Value::Map(ref map) if !map.is_empty() => ListSeparator::Comma,
            _ => ListSeparator::Undecided,
        }
    }

    pub fn has_brackets(&self) -> bool {
        matches!(*self, Value::List(ref list) if list.brackets)
    }

    fn type_name(&self) -> &'static str {
        match *self {
            Value::Null => "null",
            Value::Boolean(_) => "bool",
            Value::Number(_) => "number",
            Value::Color(_) => "color",
            Value::String(_) => "string",
            Value::List(_) | Value::ArgumentList(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
        }
    }

    fn wrong_type(&self, expected: &str, name: &str) -> ScriptError {
        ScriptError::for_argument(
            format!("{} is not a {}", self.type_name(), expected),
            name,
        )
    }

    pub fn assert_number(&self, name: &str) -> Result<&Number, ScriptError> {
        match *self {
            Value::Number(ref n) => Ok(n),
            _ => Err(self.wrong_type("number", name)),
        }
    }

    pub fn assert_color(&self, name: &str) -> Result<&Color, ScriptError> {
        match *self {
            Value::Color(ref c) => Ok(c),
            _ => Err(self.wrong_type("color", name)),
        }
    }

    pub fn assert_string(&self, name: &str) -> Result<&SassString, ScriptError> {
        match *self {
            Value::String(ref s) => Ok(s),
            _ => Err(self.wrong_type("string", name)),
        }
    }

    pub fn assert_map(&self, name: &str) -> Result<Map, ScriptError> {
        match *self {
            Value::Map(ref m) => Ok(m.clone()),
            // An empty list counts as an empty map.
            Value::List(ref list) if list.contents.is_empty() => Ok(Map::new()),
            _ => Err(self.wrong_type("map", name)),
        }
    }

    pub fn assert_function(&self, name: &str) -> Result<&Callable, ScriptError> {
        match *self {
            Value::Function(ref c) => Ok(c),
            _ => Err(self.wrong_type("function", name)),
        }
    }

    pub fn assert_boolean(&self, name: &str) -> Result<bool, ScriptError> {
        match *self {
            Value::Boolean(b) => Ok(b),
            _ => Err(self.wrong_type("bool", name)),
        }
    }
}

impl fmt::Display for Value {
    /// A debugging representation; the real serializer lives downstream.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(ref n) => write!(f, "{}", n),
            Value::Color(ref c) => write!(f, "{}", c),
            Value::String(ref s) => {
                if s.quoted {
                    write!(f, "\"{}\"", s.text)
                } else {
                    write!(f, "{}", s.text)
                }
            }
            Value::List(ref list) => {
                let sep = match list.separator {
                    ListSeparator::Comma => ", ",
                    ListSeparator::Slash => " / ",
                    _ => " ",
                };
                let items: Vec<String> =
                    list.contents.iter().map(|v| v.to_string()).collect();
                if list.brackets {
                    write!(f, "[{}]", items.join(sep))
                } else {
                    write!(f, "{}", items.join(sep))
                }
            }
            Value::ArgumentList(ref args) => {
                let items: Vec<String> =
                    args.positional.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", items.join(", "))
            }
            Value::Map(ref map) => {
                let items: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect();
                write!(f, "({})", items.join(", "))
            }
            Value::Function(ref c) => write!(f, "get-function(\"{}\")", c.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::FALSE.is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(Value::Number(Number::unitless(0.0)).is_truthy());
        assert!(Value::String(SassString::unquoted("")).is_truthy());
    }

    #[test]
    fn single_value_as_list() {
        let v = Value::Number(Number::unitless(1.0));
        assert_eq!(v.as_list(), vec![v.clone()]);
        assert_eq!(v.separator(), ListSeparator::Undecided);
    }

    #[test]
    fn map_as_list_of_pairs() {
        let mut map = Map::new();
        map.insert(
            Value::String(SassString::unquoted("a")),
            Value::Number(Number::unitless(1.0)),
        );
        let pairs = Value::Map(map).as_list();
        assert_eq!(pairs.len(), 1);
        assert!(matches!(pairs[0], Value::List(ref l) if l.contents.len() == 2));
    }

    #[test]
    fn map_keys_use_value_equality() {
        let mut map = Map::new();
        map.insert(
            Value::Number(Number::with_unit(1.0, "in")),
            Value::Boolean(true),
        );

        let converted = Value::Number(Number::with_unit(96.0, "px"));
        assert_eq!(map.get(&converted), Some(&Value::Boolean(true)));

        map.insert(converted, Value::Boolean(false));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn assertions_carry_argument_name() {
        let err = Value::Null.assert_number("width").unwrap_err();
        assert_eq!(err.to_string(), "$width: null is not a number");

        assert!(Value::Number(Number::unitless(1.0)).assert_number("w").is_ok());
    }

    #[test]
    fn empty_list_is_a_map() {
        let empty = Value::List(List::new(Vec::new(), ListSeparator::Undecided));
        assert!(empty.assert_map("m").unwrap().is_empty());
        assert!(Value::Boolean(true).assert_map("m").is_err());
    }

    #[test]
    fn callables_compare_by_identity() {
        let a = Callable::new("lighten", Span::default());
        let b = Callable::new("lighten", Span::default());
        assert_ne!(Value::Function(a.clone()), Value::Function(b));
        assert_eq!(Value::Function(a.clone()), Value::Function(a));
    }
}
