use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::ser_error::Error;

bitflags! {
    /// Which member values the serializer leaves out.
    ///
    /// Flags combine freely:
    ///
    /// ```
    /// use saphyr_graph::DefaultValuesHandling;
    ///
    /// let h = DefaultValuesHandling::OMIT_NULL | DefaultValuesHandling::OMIT_EMPTY_COLLECTIONS;
    /// assert!(h.contains(DefaultValuesHandling::OMIT_NULL));
    /// assert!(!h.contains(DefaultValuesHandling::OMIT_DEFAULTS));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DefaultValuesHandling: u8 {
        /// Emit every member.
        const PRESERVE = 0;
        /// Skip members whose value is null.
        const OMIT_NULL = 1 << 0;
        /// Skip members equal to their declared default (or the zero value of their type).
        const OMIT_DEFAULTS = 1 << 1;
        /// Skip members holding an empty sequence or mapping.
        const OMIT_EMPTY_COLLECTIONS = 1 << 2;
    }
}

/// How the traversal picks the type a value is serialized as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeResolution {
    /// Use the runtime type of the value (polymorphic members are tagged).
    #[default]
    Dynamic,
    /// Use the declared type unless it is open (`Any` or abstract).
    Static,
}

/// Serializer options.
///
/// Build them with [`crate::serializer_options!`] to stay source compatible when
/// fields are added:
///
/// ```rust
/// let opts = saphyr_graph::serializer_options! {
///     indent_step: 4,
///     aliases: false,
/// };
/// assert_eq!(opts.indent_step, 4);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializerOptions {
    /// Number of spaces per block indentation level.
    pub indent_step: usize,
    /// Maximum nesting depth of the object graph.
    pub max_recursion: usize,
    /// Emit anchors and aliases for instances reachable more than once.
    pub aliases: bool,
    /// Members left out of the output.
    pub default_values: DefaultValuesHandling,
    /// Emit JSON compatible flow output instead of block YAML.
    pub json: bool,
    /// Only writable members are emitted, and types without a default
    /// constructor (and no converter) are rejected up front.
    pub roundtrip: bool,
    /// Double-quote strings that would otherwise read back as another type.
    pub quote_necessary_strings: bool,
    /// Runtime or declared type drives traversal.
    pub type_resolution: TypeResolution,
    /// Start the document with an explicit `---`.
    pub explicit_start: bool,
    /// Emit member descriptions as `#` comments.
    pub comments: bool,
}

impl Default for SerializerOptions {
    fn default() -> Self {
        Self {
            indent_step: 2,
            max_recursion: 50,
            aliases: true,
            default_values: DefaultValuesHandling::PRESERVE,
            json: false,
            roundtrip: false,
            quote_necessary_strings: true,
            type_resolution: TypeResolution::Dynamic,
            explicit_start: false,
            comments: true,
        }
    }
}

impl SerializerOptions {
    /// Reject option combinations that cannot produce valid output.
    pub(crate) fn consistent(&self) -> Result<(), Error> {
        if self.indent_step == 0 || self.indent_step > 9 {
            return Err(Error::InvalidOptions(format!(
                "indent_step must be between 1 and 9, got {}",
                self.indent_step
            )));
        }
        if self.max_recursion == 0 {
            return Err(Error::InvalidOptions(
                "max_recursion must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = SerializerOptions::default();
        assert_eq!(opts.indent_step, 2);
        assert_eq!(opts.max_recursion, 50);
        assert!(opts.aliases);
        assert_eq!(opts.default_values, DefaultValuesHandling::PRESERVE);
        assert!(opts.consistent().is_ok());
    }

    #[test]
    fn zero_indent_is_rejected() {
        let opts = crate::serializer_options! { indent_step: 0 };
        assert!(matches!(opts.consistent(), Err(Error::InvalidOptions(_))));
    }
}
