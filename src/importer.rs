//! The importer capability: how the compiler is given access to source
//! files.
//!
//! The core never touches the filesystem itself.  Callers inject
//! [`Importer`] implementations, which resolve *load URLs* (the strings
//! written in `@use`/`@import`) to canonical URLs and supply source text
//! for them.  The [`ImportCache`](crate::import_cache::ImportCache) drives
//! the chain of importers and memoizes their answers.

use std::cell::Cell;

use url::Url;

use crate::error::ImportError;
use crate::stylesheet::Syntax;

/// The dynamic context for one `canonicalize` call.
///
/// Access to [`CanonicalizeContext::containing_url`] is tracked: a result
/// computed without looking at it is valid for any containing URL and can
/// be cached across the whole compilation.
pub struct CanonicalizeContext {
    containing_url: Option<Url>,
    for_import: bool,
    containing_url_accessed: Cell<bool>,
}

impl CanonicalizeContext {
    pub fn new(containing_url: Option<Url>, for_import: bool) -> CanonicalizeContext {
        CanonicalizeContext {
            containing_url,
            for_import,
            containing_url_accessed: Cell::new(false),
        }
    }

    /// The canonical URL of the file containing the load, if the cache
    /// chose to expose it.  Reading this marks the result
    /// context-sensitive.
    pub fn containing_url(&self) -> Option<&Url> {
        self.containing_url_accessed.set(true);
        self.containing_url.as_ref()
    }

    /// Whether this load comes from an `@import` rather than a `@use` or
    /// `@forward`, for importers that implement import-only files.
    pub fn for_import(&self) -> bool {
        self.for_import
    }

    pub(crate) fn was_containing_url_accessed(&self) -> bool {
        self.containing_url_accessed.get()
    }
}

/// A successfully loaded source file.
#[derive(Debug, Clone)]
pub struct ImporterResult {
    pub contents: String,
    pub syntax: Syntax,
    pub source_map_url: Option<Url>,
}

/// Resolves load URLs and supplies source text.
///
/// `canonicalize` must be pure with respect to the context it is given:
/// for a fixed context, the same URL must always canonicalize to the same
/// result within a compilation.  It may read the filesystem or network.
pub trait Importer {
    /// Returns the canonical URL for `url`, or `None` if this importer
    /// does not recognize it.
    ///
    /// The returned URL should be absolute; a relative result is
    /// deprecated and is resolved against the load URL by the cache.
    fn canonicalize(
        &self,
        url: &str,
        context: &CanonicalizeContext,
    ) -> Result<Option<String>, ImportError>;

    /// Loads the contents of a canonical URL returned by `canonicalize`,
    /// or `None` if the URL has since become unloadable.
    fn load(&self, canonical_url: &Url) -> Result<Option<ImporterResult>, ImportError>;

    /// Schemes this importer refuses to emit as canonical.  URLs with such
    /// a scheme get the containing URL exposed during canonicalization,
    /// and a canonical result using one is a fatal error.
    fn is_non_canonical_scheme(&self, _scheme: &str) -> bool {
        false
    }
}

/// Extracts the scheme of a URL-shaped string, or `None` for relative
/// references.
pub fn scheme_of(url: &str) -> Option<&str> {
    let colon = url.find(':')?;
    if let Some(slash) = url.find('/') {
        if slash < colon {
            return None;
        }
    }

    let scheme = &url[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }

    Some(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_detection() {
        assert_eq!(scheme_of("file:///a/b"), Some("file"));
        assert_eq!(scheme_of("custom+x:foo"), Some("custom+x"));
        assert_eq!(scheme_of("a/b.scss"), None);
        assert_eq!(scheme_of("../b.scss"), None);
        assert_eq!(scheme_of("a/b:c.scss"), None);
        assert_eq!(scheme_of("1http:foo"), None);
    }

    #[test]
    fn containing_url_access_is_tracked() {
        let url = Url::parse("file:///base.scss").unwrap();
        let context = CanonicalizeContext::new(Some(url), false);
        assert!(!context.was_containing_url_accessed());

        assert!(context.containing_url().is_some());
        assert!(context.was_containing_url_accessed());
    }
}
