use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The configuration doesn't list any table.
    #[error("no tables in configuration")]
    NoTables,
    /// Every configured table is inactive.
    #[error("no active tables in configuration")]
    NoActiveTables,
    /// Two tables share the same name.
    #[error("table `{0}` is configured more than once")]
    DuplicateTable(String),
    /// A field holds a value outside of its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A query template is missing one of the id placeholders.
    #[error("query template of table `{table}` is missing the `{placeholder}` placeholder")]
    MissingPlaceholder {
        table: String,
        placeholder: &'static str,
    },
}

impl ValidationError {
    /// Shorthand for building [`ValidationError::InvalidFieldValue`].
    pub(crate) fn invalid(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}
