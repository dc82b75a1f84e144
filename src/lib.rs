//! Compile Sass stylesheets to CSS.
//!
//! This crate implements the language-semantic core of a Sass compiler:
//! the runtime value model, the selector algebra behind `@extend`, the
//! module-aware lexical environment, and the import/canonicalization
//! cache.  The surface parser, the evaluator that walks the parsed tree,
//! and the serializer that renders the resulting CSS live downstream and
//! drive this crate through its public types.
//!
//! # Architecture
//!
//! * [`value`], [`number`], [`color`]: the SassScript value model.
//!   Values are immutable; numbers carry full unit lists and convert
//!   between compatible units.
//!
//! * [`selector`]: the selector data model and the algebra over it:
//!   unification, superselector relations, weaving and trimming.  This is
//!   what gives `@extend` its semantics.
//!
//! * [`environment`] and [`module`]: lexically-scoped name resolution
//!   for variables, functions and mixins, and the module system that
//!   `@use`, `@forward` and `@import` compose.
//!
//! * [`import_cache`] and [`importer`]: resolution of load URLs through
//!   a chain of caller-supplied importers, with careful tracking of which
//!   resolutions are context-sensitive and therefore uncacheable.
//!
//! * [`extension`]: the `@extend` engine, which rewrites the selectors
//!   of registered style rules in place.
//!
//! A compilation is single-threaded and self-contained: it owns its
//! [`Environment`](environment::Environment),
//! [`ImportCache`](import_cache::ImportCache) and
//! [`Extender`](extension::Extender), and shares nothing with other
//! compilations.
//!
//! # Logging
//!
//! Set the `SASS_LOG` environment variable to make the library print
//! diagnostics to stdout: ignored rules, deprecated importer behavior,
//! cache invalidations.

#![allow(clippy::too_many_arguments)]

use std::rc::Rc;

pub mod color;
pub mod environment;
pub mod error;
pub mod extension;
pub mod import_cache;
pub mod importer;
pub mod limits;
pub mod log;
pub mod module;
pub mod number;
pub mod parsers;
pub mod selector;
pub mod session;
pub mod stylesheet;
pub mod value;

use import_cache::ImportCache;
use importer::Importer;
use session::Session;
use stylesheet::Syntax;

/// Options for a compilation.
///
/// This is what API entry points build before handing control to the
/// evaluator: the importer chain to resolve loads through, the syntax to
/// assume for the entry point, and whether to suppress diagnostics.
pub struct CompileOptions {
    pub importers: Vec<Rc<dyn Importer>>,
    pub syntax: Syntax,
    pub quiet: bool,
}

impl CompileOptions {
    pub fn new() -> CompileOptions {
        CompileOptions {
            importers: Vec::new(),
            syntax: Syntax::Scss,
            quiet: false,
        }
    }

    pub fn with_importer(mut self, importer: Rc<dyn Importer>) -> CompileOptions {
        self.importers.push(importer);
        self
    }

    pub fn session(&self) -> Session {
        if self.quiet {
            Session::quiet()
        } else {
            Session::new()
        }
    }

    /// Builds the import cache for one compilation with these options.
    pub fn import_cache(&self) -> ImportCache {
        ImportCache::new(self.importers.clone(), self.session())
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions::new()
    }
}
