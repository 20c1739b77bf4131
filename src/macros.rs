//! `options!` and `serializer_options!`: name only the settings that differ
//! from the defaults, e.g. `options! { case_insensitive: true }`.

/// Reader [`crate::Options`] with the listed fields overridden.
///
/// ```rust
/// use saphyr_graph::options::DuplicateKeyPolicy;
///
/// let options = saphyr_graph::options! {
///     duplicate_keys: DuplicateKeyPolicy::LastWins,
///     ignore_unmatched: true,
/// };
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Writer [`crate::SerializerOptions`] with the listed fields overridden.
///
/// ```rust
/// let opts = saphyr_graph::serializer_options! {
///     indent_step: 4,
///     json: true,
/// };
/// ```
#[macro_export]
macro_rules! serializer_options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::SerializerOptions::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Short alias for [`serializer_options!`].
#[macro_export]
macro_rules! ser_options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        $crate::serializer_options! { $( $field : $value ),* }
    }};
}
