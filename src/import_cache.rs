//! An in-memory cache of canonicalized URLs and loaded stylesheets.
//!
//! Canonicalization runs a load URL through the compilation's chain of
//! importers.  The result is cached at two levels: a whole-chain cache for
//! context-insensitive resolutions, and a per-importer cache for results
//! that depend on dynamic context (e.g. an importer that read the
//! containing URL) or on where in the chain resolution stopped.  The
//! per-importer cache also guarantees that the same URL resolves through
//! the same importer for the whole compilation even when the whole-chain
//! cache cannot be used.
//!
//! Loaded and parsed stylesheets are cached by canonical URL, so each file
//! is read and parsed at most once per compilation.

use std::collections::HashMap;
use std::rc::Rc;

use url::Url;

use crate::error::ImportError;
use crate::importer::{scheme_of, CanonicalizeContext, Importer, ImporterResult};
use crate::sass_log;
use crate::session::Session;
use crate::stylesheet::Stylesheet;

/// A successful canonicalization: which importer won, the canonical URL it
/// produced, and the URL text that was being resolved.
#[derive(Clone)]
pub struct CanonicalResult {
    /// Index of the importer in the compilation's chain.
    pub importer: usize,
    pub canonical_url: Url,
    pub original_url: String,
}

pub struct ImportCache {
    importers: Vec<Rc<dyn Importer>>,
    session: Session,

    /// Whole-chain cache; only holds results that are valid regardless of
    /// context.
    canonicalize_cache: HashMap<(String, bool), Option<CanonicalResult>>,

    /// Per-importer cache for context-sensitive or partial-chain results.
    per_importer_cache: HashMap<(usize, String, bool), Option<CanonicalResult>>,

    /// For entries in the per-importer cache that came from resolving a
    /// relative load, the original relative URL; used for invalidation.
    relative_urls: HashMap<(usize, String, bool), String>,

    /// Parsed stylesheets by canonical URL.
    import_cache: HashMap<Url, Option<Rc<Stylesheet>>>,

    /// Raw importer results by canonical URL, kept for source-map
    /// generation.
    result_cache: HashMap<Url, Rc<ImporterResult>>,
}

impl ImportCache {
    pub fn new(importers: Vec<Rc<dyn Importer>>, session: Session) -> ImportCache {
        ImportCache {
            importers,
            session,
            canonicalize_cache: HashMap::new(),
            per_importer_cache: HashMap::new(),
            relative_urls: HashMap::new(),
            import_cache: HashMap::new(),
            result_cache: HashMap::new(),
        }
    }

    pub fn importer(&self, index: usize) -> &Rc<dyn Importer> {
        &self.importers[index]
    }

    /// Resolves `url` to a canonical URL.
    ///
    /// When `base_importer` is given and `url` is relative, it is first
    /// resolved against `base_url` and offered to the base importer alone;
    /// this is how `@use "sibling"` finds files next to the current one.
    /// Otherwise every importer in the chain is consulted in order.
    pub fn canonicalize(
        &mut self,
        url: &str,
        base_importer: Option<usize>,
        base_url: Option<&Url>,
        for_import: bool,
    ) -> Result<Option<CanonicalResult>, ImportError> {
        if let Some(base_importer) = base_importer {
            if scheme_of(url).is_none() {
                let resolved = match base_url {
                    Some(base) => base
                        .join(url)
                        .map_err(|_| ImportError::InvalidUrl(url.to_string()))?
                        .to_string(),
                    None => url.to_string(),
                };

                let key = (base_importer, resolved, for_import);
                if !self.per_importer_cache.contains_key(&key) {
                    let (result, cacheable) =
                        self.canonicalize_one(base_importer, &key.1, base_url, for_import)?;
                    // Relative loads never expose the containing URL, so
                    // they are always cacheable.
                    debug_assert!(cacheable);
                    if base_url.is_some() {
                        self.relative_urls.insert(key.clone(), url.to_string());
                    }
                    self.per_importer_cache.insert(key.clone(), result);
                }

                if let Some(result) = self.per_importer_cache[&key].clone() {
                    return Ok(Some(result));
                }
            }
        }

        let key = (url.to_string(), for_import);
        if let Some(cached) = self.canonicalize_cache.get(&key) {
            return Ok(cached.clone());
        }

        let mut cacheable = true;
        for i in 0..self.importers.len() {
            let per_key = (i, url.to_string(), for_import);
            match self.per_importer_cache.get(&per_key) {
                Some(Some(result)) => return Ok(Some(result.clone())),
                Some(None) => continue,
                None => {}
            }

            let (result, importer_cacheable) =
                self.canonicalize_one(i, url, base_url, for_import)?;

            if importer_cacheable && cacheable {
                if result.is_some() {
                    self.canonicalize_cache.insert(key, result.clone());
                    return Ok(result);
                }
                // A miss is recorded in the whole-chain cache only once
                // every importer has been tried.
            } else if importer_cacheable {
                self.per_importer_cache.insert(per_key, result.clone());
                if result.is_some() {
                    return Ok(result);
                }
            } else {
                if cacheable {
                    // The chain up to here saw only misses; record them so
                    // later canonicalizations skip these importers.
                    for j in 0..i {
                        self.per_importer_cache
                            .insert((j, url.to_string(), for_import), None);
                    }
                    cacheable = false;
                }
                if result.is_some() {
                    return Ok(result);
                }
            }
        }

        if cacheable {
            self.canonicalize_cache.insert(key, None);
        }
        Ok(None)
    }

    /// Runs a single importer's `canonicalize` in a fresh context and
    /// post-processes its result.  Returns the result plus whether it may
    /// be cached beyond this exact context.
    fn canonicalize_one(
        &self,
        index: usize,
        url: &str,
        base_url: Option<&Url>,
        for_import: bool,
    ) -> Result<(Option<CanonicalResult>, bool), ImportError> {
        let importer = &self.importers[index];
        let scheme = scheme_of(url);

        let pass_containing_url = base_url.is_some()
            && (scheme.is_none() || importer.is_non_canonical_scheme(scheme.unwrap()));
        let context = CanonicalizeContext::new(
            if pass_containing_url {
                base_url.cloned()
            } else {
                None
            },
            for_import,
        );

        let canonical = importer.canonicalize(url, &context)?;
        let cacheable = !pass_containing_url || !context.was_containing_url_accessed();

        let result = match canonical {
            None => None,

            Some(canonical) => match scheme_of(&canonical) {
                Some(scheme) => {
                    if importer.is_non_canonical_scheme(scheme) {
                        return Err(ImportError::NonCanonicalScheme {
                            url: url.to_string(),
                            scheme: scheme.to_string(),
                        });
                    }
                    let parsed = Url::parse(&canonical)
                        .map_err(|_| ImportError::InvalidUrl(canonical.clone()))?;
                    Some(CanonicalResult {
                        importer: index,
                        canonical_url: parsed,
                        original_url: url.to_string(),
                    })
                }

                None => {
                    sass_log!(
                        self.session,
                        "importer canonicalized \"{}\" to \"{}\"; relative canonical URLs are deprecated and will eventually be disallowed",
                        url,
                        canonical
                    );
                    let base = match Url::parse(url) {
                        Ok(absolute) => absolute,
                        Err(_) => base_url
                            .ok_or_else(|| ImportError::InvalidUrl(canonical.clone()))?
                            .join(url)
                            .map_err(|_| ImportError::InvalidUrl(url.to_string()))?,
                    };
                    let absolute = base
                        .join(&canonical)
                        .map_err(|_| ImportError::InvalidUrl(canonical.clone()))?;
                    Some(CanonicalResult {
                        importer: index,
                        canonical_url: absolute,
                        original_url: url.to_string(),
                    })
                }
            },
        };

        Ok((result, cacheable))
    }

    /// Canonicalizes and loads in one step.
    pub fn import(
        &mut self,
        url: &str,
        base_importer: Option<usize>,
        base_url: Option<&Url>,
        for_import: bool,
    ) -> Result<Option<(CanonicalResult, Rc<Stylesheet>)>, ImportError> {
        match self.canonicalize(url, base_importer, base_url, for_import)? {
            None => Ok(None),
            Some(result) => {
                match self.import_canonical(result.importer, &result.canonical_url)? {
                    None => Ok(None),
                    Some(stylesheet) => Ok(Some((result, stylesheet))),
                }
            }
        }
    }

    /// Loads and parses a canonical URL, memoizing the result.
    pub fn import_canonical(
        &mut self,
        importer: usize,
        canonical_url: &Url,
    ) -> Result<Option<Rc<Stylesheet>>, ImportError> {
        if let Some(cached) = self.import_cache.get(canonical_url) {
            return Ok(cached.clone());
        }

        let loaded = self.importers[importer].load(canonical_url)?;
        let entry = match loaded {
            None => None,
            Some(result) => {
                let contents = result.contents.clone();
                let syntax = result.syntax;
                self.result_cache
                    .insert(canonical_url.clone(), Rc::new(result));
                Some(Rc::new(Stylesheet::parse(
                    contents,
                    syntax,
                    canonical_url.clone(),
                )))
            }
        };

        self.import_cache.insert(canonical_url.clone(), entry.clone());
        Ok(entry)
    }

    /// The raw importer result for a canonical URL, if it has been loaded.
    pub fn load_result(&self, canonical_url: &Url) -> Option<&Rc<ImporterResult>> {
        self.result_cache.get(canonical_url)
    }

    /// Forgets the canonicalization of `url`, in both `for_import`
    /// variants, including per-importer entries recorded under a resolved
    /// form of the same relative URL.
    pub fn clear_canonicalize(&mut self, url: &str) {
        self.canonicalize_cache.remove(&(url.to_string(), false));
        self.canonicalize_cache.remove(&(url.to_string(), true));

        let relative_urls = &self.relative_urls;
        self.per_importer_cache.retain(|key, _| {
            key.1 != url && relative_urls.get(key).map(String::as_str) != Some(url)
        });
        self.relative_urls
            .retain(|key, original| key.1 != url && original != url);
    }

    /// Forgets the loaded stylesheet for a canonical URL.
    pub fn clear_import(&mut self, canonical_url: &Url) {
        self.import_cache.remove(canonical_url);
        self.result_cache.remove(canonical_url);
    }

    /// A human-oriented rendering of a canonical URL: the shortest load
    /// URL that resolved to it, with the canonical basename spliced back
    /// in (so a partial like `example` displays as `_example.scss`).
    pub fn humanize(&self, canonical_url: &Url) -> String {
        let whole_chain = self
            .canonicalize_cache
            .values()
            .flatten()
            .filter(|result| &result.canonical_url == canonical_url)
            .map(|result| result.original_url.as_str());

        // Relative loads only ever land in the per-importer cache; for
        // those, the URL as written is in `relative_urls` rather than in
        // the base-resolved `original_url`.
        let per_importer = self
            .per_importer_cache
            .iter()
            .filter_map(|(key, result)| {
                let result = result.as_ref()?;
                if &result.canonical_url != canonical_url {
                    return None;
                }
                Some(
                    self.relative_urls
                        .get(key)
                        .map(String::as_str)
                        .unwrap_or(result.original_url.as_str()),
                )
            });

        let best = whole_chain
            .chain(per_importer)
            .min_by_key(|url| url.len());

        let original = match best {
            Some(original) => original,
            None => return canonical_url.to_string(),
        };

        let basename = canonical_url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or("");

        match original.rfind('/') {
            Some(i) => format!("{}/{}", &original[..i], basename),
            None => basename.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::Syntax;
    use std::cell::Cell;
    use std::collections::HashMap as StdHashMap;

    /// An importer over an in-memory file map, counting canonicalize
    /// calls.
    struct MapImporter {
        files: StdHashMap<String, String>,
        canonicalize_calls: Cell<usize>,
        access_containing_url: bool,
    }

    impl MapImporter {
        fn new(files: &[(&str, &str)]) -> MapImporter {
            MapImporter {
                files: files
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                canonicalize_calls: Cell::new(0),
                access_containing_url: false,
            }
        }

        fn context_sensitive(files: &[(&str, &str)]) -> MapImporter {
            MapImporter {
                access_containing_url: true,
                ..MapImporter::new(files)
            }
        }
    }

    impl Importer for MapImporter {
        fn canonicalize(
            &self,
            url: &str,
            context: &CanonicalizeContext,
        ) -> Result<Option<String>, ImportError> {
            self.canonicalize_calls.set(self.canonicalize_calls.get() + 1);
            if self.access_containing_url {
                let _ = context.containing_url();
            }

            let path = url.strip_prefix("file:///").unwrap_or(url);
            let candidates = [path.to_string(), format!("{}.scss", path)];
            for candidate in candidates {
                if self.files.contains_key(&candidate) {
                    return Ok(Some(format!("file:///{}", candidate)));
                }
            }
            Ok(None)
        }

        fn load(&self, canonical_url: &Url) -> Result<Option<ImporterResult>, ImportError> {
            let path = canonical_url.path().trim_start_matches('/');
            Ok(self.files.get(path).map(|contents| ImporterResult {
                contents: contents.clone(),
                syntax: Syntax::Scss,
                source_map_url: None,
            }))
        }
    }

    fn cache_with(importers: Vec<Rc<dyn Importer>>) -> ImportCache {
        ImportCache::new(importers, Session::quiet())
    }

    #[test]
    fn canonicalize_caches_hits() {
        let importer = Rc::new(MapImporter::new(&[("a.scss", "a {}")]));
        let mut cache = cache_with(vec![importer.clone()]);

        let first = cache.canonicalize("a", None, None, false).unwrap().unwrap();
        assert_eq!(first.canonical_url.as_str(), "file:///a.scss");
        assert_eq!(importer.canonicalize_calls.get(), 1);

        let second = cache.canonicalize("a", None, None, false).unwrap().unwrap();
        assert_eq!(second.canonical_url.as_str(), "file:///a.scss");
        assert_eq!(importer.canonicalize_calls.get(), 1);
    }

    #[test]
    fn clear_canonicalize_reinvokes_the_chain() {
        let importer = Rc::new(MapImporter::new(&[("a.scss", "a {}")]));
        let mut cache = cache_with(vec![importer.clone()]);

        cache.canonicalize("a.scss", None, None, false).unwrap().unwrap();
        assert_eq!(importer.canonicalize_calls.get(), 1);

        cache.clear_canonicalize("a.scss");
        cache.canonicalize("a.scss", None, None, false).unwrap().unwrap();
        assert_eq!(importer.canonicalize_calls.get(), 2);
    }

    #[test]
    fn canonicalize_misses_are_cached_too() {
        let importer = Rc::new(MapImporter::new(&[("a.scss", "a {}")]));
        let mut cache = cache_with(vec![importer.clone()]);

        assert!(cache.canonicalize("nope", None, None, false).unwrap().is_none());
        assert!(cache.canonicalize("nope", None, None, false).unwrap().is_none());
        assert_eq!(importer.canonicalize_calls.get(), 1);
    }

    #[test]
    fn context_sensitive_results_bypass_the_chain_cache() {
        let importer = Rc::new(MapImporter::context_sensitive(&[("a.scss", "a {}")]));
        let mut cache = cache_with(vec![importer.clone()]);
        let base = Url::parse("file:///base.scss").unwrap();

        // A relative URL with no base importer goes through the chain with
        // the containing URL exposed; the importer reads it, so the result
        // must not land in the whole-chain cache.
        let first = cache
            .canonicalize("a", None, Some(&base), false)
            .unwrap()
            .unwrap();
        assert_eq!(first.canonical_url.as_str(), "file:///a.scss");
        assert_eq!(importer.canonicalize_calls.get(), 1);

        cache.canonicalize("a", None, Some(&base), false).unwrap().unwrap();
        assert_eq!(importer.canonicalize_calls.get(), 2);
    }

    #[test]
    fn relative_loads_use_the_base_importer() {
        let importer = Rc::new(MapImporter::new(&[("dir/b.scss", "b {}")]));
        let mut cache = cache_with(vec![importer.clone()]);
        let base = Url::parse("file:///dir/a.scss").unwrap();

        let result = cache
            .canonicalize("b", Some(0), Some(&base), false)
            .unwrap()
            .unwrap();
        assert_eq!(result.canonical_url.as_str(), "file:///dir/b.scss");

        // The resolved relative load is cached per-importer.
        cache.canonicalize("b", Some(0), Some(&base), false).unwrap().unwrap();
        assert_eq!(importer.canonicalize_calls.get(), 1);

        // Clearing by the original relative URL invalidates it.
        cache.clear_canonicalize("b");
        cache.canonicalize("b", Some(0), Some(&base), false).unwrap().unwrap();
        assert_eq!(importer.canonicalize_calls.get(), 2);
    }

    #[test]
    fn chain_falls_through_to_later_importers() {
        let first = Rc::new(MapImporter::new(&[("x.scss", "x {}")]));
        let second = Rc::new(MapImporter::new(&[("y.scss", "y {}")]));
        let mut cache = cache_with(vec![first.clone(), second.clone()]);

        let result = cache.canonicalize("y", None, None, false).unwrap().unwrap();
        assert_eq!(result.importer, 1);
        assert_eq!(result.canonical_url.as_str(), "file:///y.scss");
    }

    #[test]
    fn import_canonical_is_memoized() {
        let importer = Rc::new(MapImporter::new(&[("a.scss", "a { b: c }")]));
        let mut cache = cache_with(vec![importer.clone()]);

        let (result, stylesheet) = cache.import("a", None, None, false).unwrap().unwrap();
        assert_eq!(stylesheet.contents, "a { b: c }");
        assert_eq!(stylesheet.url.as_str(), "file:///a.scss");

        let again = cache
            .import_canonical(result.importer, &result.canonical_url)
            .unwrap()
            .unwrap();
        assert!(Rc::ptr_eq(&stylesheet, &again));

        cache.clear_import(&result.canonical_url);
        let reloaded = cache
            .import_canonical(result.importer, &result.canonical_url)
            .unwrap()
            .unwrap();
        assert!(!Rc::ptr_eq(&stylesheet, &reloaded));
    }

    #[test]
    fn failed_loads_are_cached_as_missing() {
        let importer = Rc::new(MapImporter::new(&[]));
        let mut cache = cache_with(vec![importer]);
        let url = Url::parse("file:///gone.scss").unwrap();

        assert!(cache.import_canonical(0, &url).unwrap().is_none());
        assert!(cache.import_canonical(0, &url).unwrap().is_none());
        assert!(cache.load_result(&url).is_none());
    }

    #[test]
    fn non_canonical_scheme_is_fatal() {
        struct BadImporter;
        impl Importer for BadImporter {
            fn canonicalize(
                &self,
                _url: &str,
                _context: &CanonicalizeContext,
            ) -> Result<Option<String>, ImportError> {
                Ok(Some("virtual:thing".to_string()))
            }
            fn load(&self, _url: &Url) -> Result<Option<ImporterResult>, ImportError> {
                Ok(None)
            }
            fn is_non_canonical_scheme(&self, scheme: &str) -> bool {
                scheme == "virtual"
            }
        }

        let mut cache = cache_with(vec![Rc::new(BadImporter)]);
        assert!(matches!(
            cache.canonicalize("thing", None, None, false),
            Err(ImportError::NonCanonicalScheme { .. })
        ));
    }

    #[test]
    fn relative_canonical_urls_are_resolved() {
        struct RelativeImporter;
        impl Importer for RelativeImporter {
            fn canonicalize(
                &self,
                url: &str,
                _context: &CanonicalizeContext,
            ) -> Result<Option<String>, ImportError> {
                if url == "file:///dir/a" {
                    Ok(Some("_a.scss".to_string()))
                } else {
                    Ok(None)
                }
            }
            fn load(&self, _url: &Url) -> Result<Option<ImporterResult>, ImportError> {
                Ok(None)
            }
        }

        let mut cache = cache_with(vec![Rc::new(RelativeImporter)]);
        let result = cache
            .canonicalize("file:///dir/a", None, None, false)
            .unwrap()
            .unwrap();
        assert_eq!(result.canonical_url.as_str(), "file:///dir/_a.scss");
    }

    #[test]
    fn humanize_prefers_the_shortest_original() {
        let importer = Rc::new(MapImporter::new(&[("dir/_example.scss", "a {}")]));
        let mut cache = cache_with(vec![importer]);

        cache
            .canonicalize("dir/_example.scss", None, None, false)
            .unwrap()
            .unwrap();
        let result = cache
            .canonicalize("dir/_example", None, None, false)
            .unwrap()
            .unwrap();

        assert_eq!(cache.humanize(&result.canonical_url), "dir/_example.scss");

        let unknown = Url::parse("file:///other.scss").unwrap();
        assert_eq!(cache.humanize(&unknown), "file:///other.scss");
    }

    #[test]
    fn humanize_covers_relative_loads() {
        let importer = Rc::new(MapImporter::new(&[("dir/b.scss", "b {}")]));
        let mut cache = cache_with(vec![importer]);
        let base = Url::parse("file:///dir/a.scss").unwrap();

        let result = cache
            .canonicalize("b", Some(0), Some(&base), false)
            .unwrap()
            .unwrap();

        // The load was cached per-importer only, but the URL as written
        // is still the one surfaced.
        assert_eq!(cache.humanize(&result.canonical_url), "b.scss");
    }
}
