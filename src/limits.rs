//! Processing limits to mitigate malicious or pathological stylesheets.

/// Maximum number of complex selectors that a single `@extend` rewrite may
/// generate for one style rule.
///
/// Mutually recursive extensions terminate because every rewrite strictly
/// grows the selector list, but the growth can be exponential in the number
/// of registered extensions.  Past this bound the extension engine gives up
/// with an error instead of consuming unbounded memory.
pub const MAX_GENERATED_SELECTORS: usize = 2000;

/// Maximum number of candidate selectors that `trim` will examine.
///
/// Trimming is quadratic in the number of candidates; past this bound it
/// degenerates to a simple flatten.
pub const TRIM_LIMIT: usize = 100;
