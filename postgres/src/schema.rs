use std::fmt;
use std::str::FromStr;

use pg_escape::quote_identifier;

/// Possibly schema-qualified Postgres table name.
///
/// Table names come from configuration as `table` or `schema.table` and are only
/// ever interpolated into SQL through [`TableName::as_quoted_identifier`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableName {
    /// Schema containing the table, `None` to resolve through `search_path`.
    pub schema: Option<String>,
    /// Name of the table within the schema.
    pub name: String,
}

impl TableName {
    /// Creates a [`TableName`] resolved through `search_path`.
    pub fn unqualified(name: impl Into<String>) -> TableName {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Returns the table name as a properly quoted identifier.
    pub fn as_quoted_identifier(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(schema),
                quote_identifier(&self.name)
            ),
            None => quote_identifier(&self.name).into_owned(),
        }
    }

    /// Returns the quoted name of an index on this table.
    ///
    /// Index names live in the table's schema and cannot be qualified, so only the
    /// table name is used as prefix, e.g. `merged_rivers_strahler_idx`.
    pub fn quoted_index_name(&self, suffix: &str) -> String {
        quote_identifier(&format!("{}_{suffix}", self.name)).into_owned()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Error returned when a configured table name is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTableNameError(String);

impl fmt::Display for ParseTableNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid table name `{}`, expected `table` or `schema.table`",
            self.0
        )
    }
}

impl std::error::Error for ParseTableNameError {}

impl FromStr for TableName {
    type Err = ParseTableNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(TableName::unqualified(*name)),
            [schema, name] if !schema.is_empty() && !name.is_empty() => Ok(TableName {
                schema: Some((*schema).to_string()),
                name: (*name).to_string(),
            }),
            _ => Err(ParseTableNameError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unqualified_name() {
        let table: TableName = "merged_rivers".parse().unwrap();

        assert_eq!(table, TableName::unqualified("merged_rivers"));
        assert_eq!(table.as_quoted_identifier(), "merged_rivers");
        assert_eq!(table.quoted_index_name("strahler_idx"), "merged_rivers_strahler_idx");
    }

    #[test]
    fn test_parse_qualified_name_quotes_both_parts() {
        let table: TableName = "nhd.Rivers".parse().unwrap();

        assert_eq!(table.schema.as_deref(), Some("nhd"));
        assert_eq!(table.as_quoted_identifier(), r#"nhd."Rivers""#);
        assert_eq!(table.to_string(), "nhd.Rivers");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert!("".parse::<TableName>().is_err());
        assert!("a.b.c".parse::<TableName>().is_err());
        assert!(".rivers".parse::<TableName>().is_err());
    }
}
