use std::collections::HashMap;

/// Maps declared source column types to target column types.
///
/// With no overrides this is the identity: declared types are copied
/// verbatim and may be invalid on the target. Overrides are matched on the
/// trimmed, case-insensitive declared type, so `integer` and ` INTEGER `
/// share one entry.
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    overrides: HashMap<String, String>,
}

impl TypeMapper {
    /// Identity mapping
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut mapper = Self::new();
        for (source, target) in overrides {
            mapper.add_override(source.as_ref(), target);
        }
        mapper
    }

    /// Add or replace the target type for one declared source type
    pub fn add_override(&mut self, source_type: &str, target_type: impl Into<String>) {
        self.overrides.insert(normalize(source_type), target_type.into());
    }

    /// Target type fragment for `declared_type`
    pub fn map<'a>(&'a self, declared_type: &'a str) -> &'a str {
        self.overrides
            .get(&normalize(declared_type))
            .map(String::as_str)
            .unwrap_or(declared_type)
    }
}

fn normalize(declared_type: &str) -> String {
    declared_type.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_copies_verbatim() {
        let mapper = TypeMapper::new();
        assert_eq!(mapper.map("INTEGER"), "INTEGER");
        assert_eq!(mapper.map("varchar(20)"), "varchar(20)");
        assert_eq!(mapper.map("NOT_A_REAL_TYPE"), "NOT_A_REAL_TYPE");
        assert_eq!(mapper.map(""), "");
    }

    #[test]
    fn test_override_is_case_insensitive() {
        let mapper = TypeMapper::with_overrides([("integer", "BIGINT")]);
        assert_eq!(mapper.map("INTEGER"), "BIGINT");
        assert_eq!(mapper.map(" Integer "), "BIGINT");
        assert_eq!(mapper.map("TEXT"), "TEXT");
    }

    #[test]
    fn test_override_untyped_columns() {
        let mut mapper = TypeMapper::new();
        mapper.add_override("", "TEXT");
        assert_eq!(mapper.map(""), "TEXT");
        assert_eq!(mapper.map("BLOB"), "BLOB");
    }

    #[test]
    fn test_later_override_wins() {
        let mapper = TypeMapper::with_overrides([("DATETIME", "TIMESTAMP"), ("datetime", "TIMESTAMPTZ")]);
        assert_eq!(mapper.map("DATETIME"), "TIMESTAMPTZ");
    }
}
