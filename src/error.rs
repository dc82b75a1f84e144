//! Error types.

use std::error;
use std::fmt;

use cssparser::{BasicParseError, BasicParseErrorKind};

/// A short-lived error from parsing a value or selector.
///
/// The lifetime of the error is the same as the `cssparser::ParserInput`
/// that was used to create a `cssparser::Parser`.  That is, it is the
/// lifetime of the string data that is being parsed.
pub type ParseError<'i> = cssparser::ParseError<'i, ValueErrorKind>;

/// A simple error for a value that could not be parsed or is invalid.
#[derive(Debug, Clone)]
pub enum ValueErrorKind {
    /// The value could not be parsed
    Parse(String),

    // The value could be parsed, but is invalid
    Value(String),
}

impl ValueErrorKind {
    pub fn parse_error(s: &str) -> ValueErrorKind {
        ValueErrorKind::Parse(s.to_string())
    }

    pub fn value_error(s: &str) -> ValueErrorKind {
        ValueErrorKind::Value(s.to_string())
    }
}

impl fmt::Display for ValueErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ValueErrorKind::Parse(ref s) => write!(f, "parse error: {}", s),

            ValueErrorKind::Value(ref s) => write!(f, "invalid value: {}", s),
        }
    }
}

impl<'a> From<BasicParseError<'a>> for ValueErrorKind {
    fn from(e: BasicParseError<'_>) -> ValueErrorKind {
        let BasicParseError { kind, .. } = e;

        let msg = match kind {
            BasicParseErrorKind::UnexpectedToken(_) => "unexpected token",
            BasicParseErrorKind::EndOfInput => "unexpected end of input",
            BasicParseErrorKind::AtRuleInvalid(_) => "invalid @-rule",
            BasicParseErrorKind::AtRuleBodyInvalid => "invalid @-rule body",
            BasicParseErrorKind::QualifiedRuleInvalid => "invalid qualified rule",
        };

        ValueErrorKind::parse_error(msg)
    }
}

/// A range of offsets into the source being compiled.
///
/// The surface parser produces spans; this crate only carries them around so
/// that errors and variable definitions can be traced back to source.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }
}

/// A value-level error from SassScript evaluation.
///
/// This carries no span; the evaluator knows the span of the expression it
/// is evaluating and decorates the error via [`ScriptError::with_span`]
/// before propagating it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub message: String,

    /// Name of the function or mixin argument the error refers to, if any.
    pub argument: Option<String>,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> ScriptError {
        ScriptError {
            message: message.into(),
            argument: None,
        }
    }

    pub fn for_argument(message: impl Into<String>, argument: &str) -> ScriptError {
        ScriptError {
            message: message.into(),
            argument: Some(argument.to_string()),
        }
    }

    /// Attaches a source span, for the evaluator's error reporting.
    pub fn with_span(self, span: Span) -> SpannedError {
        SpannedError { error: self, span }
    }
}

impl error::Error for ScriptError {}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument {
            Some(ref name) => write!(f, "${}: {}", name, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A [`ScriptError`] decorated with the span of the failing expression.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedError {
    pub error: ScriptError,
    pub span: Span,
}

impl error::Error for SpannedError {}

impl fmt::Display for SpannedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

/// Which kind of member a name refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Variable,
    Function,
    Mixin,
}

impl MemberKind {
    fn noun(self) -> &'static str {
        match self {
            MemberKind::Variable => "variable",
            MemberKind::Function => "function",
            MemberKind::Mixin => "mixin",
        }
    }

    /// Renders a member name the way it appears in source: variables get a
    /// `$` sigil, functions and mixins are bare.
    fn display_name(self, name: &str) -> String {
        match self {
            MemberKind::Variable => format!("${}", name),
            _ => name.to_string(),
        }
    }
}

/// Errors raised by the lexical environment and the module system.
#[derive(Debug, Clone)]
pub enum EnvironmentError {
    /// A `@use` introduced a namespace that is already taken.
    DuplicateNamespace(String),

    /// Two modules visible in the same scope both define the member.
    DuplicateMember(MemberKind, String),

    /// A namespaceless lookup matched more than one global module; the URLs
    /// of every matching module are listed.
    AmbiguousGlobal(MemberKind, String, Vec<String>),

    /// A variable set was forwarded to a module that does not define it.
    UndefinedVariable(String),

    /// A namespaced lookup named a namespace that is not in scope.
    UndefinedModule(String),
}

impl error::Error for EnvironmentError {}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EnvironmentError::DuplicateNamespace(ref ns) => {
                write!(f, "there's already a module with namespace \"{}\"", ns)
            }

            EnvironmentError::DuplicateMember(kind, ref name) => write!(
                f,
                "two modules both define a {} named {}",
                kind.noun(),
                kind.display_name(name)
            ),

            EnvironmentError::AmbiguousGlobal(kind, ref name, ref urls) => {
                write!(
                    f,
                    "{} {} is available from multiple global modules: {}",
                    kind.noun(),
                    kind.display_name(name),
                    urls.join(", ")
                )
            }

            EnvironmentError::UndefinedVariable(ref name) => {
                write!(f, "undefined variable: ${}", name)
            }

            EnvironmentError::UndefinedModule(ref ns) => {
                write!(f, "there is no module with the namespace \"{}\"", ns)
            }
        }
    }
}

/// Errors from resolving and loading imports.
#[derive(Debug, Clone)]
pub enum ImportError {
    /// No importer in the chain could canonicalize the URL.
    NotFound(String),

    /// An importer failed while loading a canonical URL.
    Loader(String),

    /// An importer canonicalized a URL to a scheme it had itself declared
    /// non-canonical.
    NonCanonicalScheme { url: String, scheme: String },

    /// A canonical URL could not be turned into an absolute URL.
    InvalidUrl(String),
}

impl error::Error for ImportError {}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ImportError::NotFound(ref url) => write!(f, "can't find stylesheet to import: {}", url),

            ImportError::Loader(ref msg) => write!(f, "error loading stylesheet: {}", msg),

            ImportError::NonCanonicalScheme {
                ref url,
                ref scheme,
            } => write!(
                f,
                "importer canonicalized {} to a URL with scheme \"{}\", which it declared as non-canonical",
                url, scheme
            ),

            ImportError::InvalidUrl(ref url) => write!(f, "invalid URL: {}", url),
        }
    }
}

/// Errors from applying `@extend` rules.
#[derive(Debug, Clone)]
pub enum ExtendError {
    /// A mandatory `@extend` never found its target in the stylesheet.
    TargetNotFound { target: String, span: Span },

    /// A rewrite generated more selectors than
    /// [`crate::limits::MAX_GENERATED_SELECTORS`].
    TooManyExtensions { selector: String, span: Span },
}

impl error::Error for ExtendError {}

impl fmt::Display for ExtendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ExtendError::TargetNotFound { ref target, .. } => {
                write!(
                    f,
                    "the target selector was not found: {}; use \"@extend {} !optional\" to avoid this error",
                    target, target
                )
            }

            ExtendError::TooManyExtensions { ref selector, .. } => {
                write!(f, "too many extensions while rewriting {}", selector)
            }
        }
    }
}
