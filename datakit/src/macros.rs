//! Macros for building and returning [`crate::error::DataKitError`]s.

/// Creates a [`crate::error::DataKitError`] from a kind and static description.
///
/// Accepts optional dynamic detail (use `detail =` to move an owned [`String`]) and an
/// optional `source:` error.
#[macro_export]
macro_rules! datakit_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::DataKitError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::DataKitError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::DataKitError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::DataKitError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::DataKitError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::DataKitError::from(($kind, $desc, $detail.to_string()))
            .with_source($source)
    };
}

/// Returns early with a [`crate::error::DataKitError`], taking the same arguments as
/// [`datakit_error!`].
#[macro_export]
macro_rules! bail {
    ($($args:tt)*) => {
        return ::core::result::Result::Err($crate::datakit_error!($($args)*))
    };
}
