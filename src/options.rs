use serde::{Deserialize, Serialize};

/// Duplicate key handling policy for mappings.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Error out on encountering a duplicate key.
    Error,
    /// First key wins: later duplicate pairs are skipped (key+value are consumed and ignored).
    FirstWins,
    /// Last key wins: a later value replaces the earlier one, keeping the key's original position.
    LastWins,
}

/// Deserializer configuration options.
///
/// Example: read a list of integers, tolerating duplicate keys elsewhere.
///
/// ```rust
/// use saphyr_graph::options::DuplicateKeyPolicy;
/// use saphyr_graph::{from_str_with_options, Type, Value};
///
/// let options = saphyr_graph::options! {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
/// };
///
/// let v = from_str_with_options("[1, 2, 3]", &Type::list(Type::I32), options).unwrap();
/// assert_eq!(v.as_sequence().unwrap().get(2), Some(Value::I32(3)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Policy for duplicate keys in mappings read as dictionaries or objects.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Silently skip mapping keys that match no member of the target class.
    pub ignore_unmatched: bool,
    /// Match mapping keys to member names ignoring ASCII case.
    pub case_insensitive: bool,
    /// For fully open targets, infer bool/int/float from plain scalars instead of keeping strings.
    pub attempt_unquoted_inference: bool,
    /// Reject tags that map to no known type.
    pub strict_tags: bool,
    /// Maximum nesting depth of the document.
    pub max_depth: usize,
    /// If true, interpret integers with a leading 0 as octal, as YAML 1.1 did.
    pub legacy_octal_numbers: bool,
    /// If true, only `true`/`false` are booleans; YAML 1.1 forms like `yes`/`on` are rejected.
    pub strict_booleans: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::Error,
            ignore_unmatched: false,
            case_insensitive: false,
            attempt_unquoted_inference: true,
            strict_tags: false,
            max_depth: 50,
            legacy_octal_numbers: false,
            strict_booleans: false,
        }
    }
}
