//! Construction of [`crate::error::RiversError`] values.

/// Creates a [`crate::error::RiversError`] from an error kind and description.
///
/// An optional third argument is rendered with `to_string` into the error detail,
/// and a trailing `source: err` attaches the originating error.
///
/// ```ignore
/// rivers_error!(ErrorKind::InvalidTableName, "Configured table name is invalid", name, source: err)
/// ```
#[macro_export]
macro_rules! rivers_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::RiversError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::RiversError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::RiversError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::RiversError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}
