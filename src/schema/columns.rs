use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered column name -> declared type mapping.
///
/// Kusto assigns stable ordinal positions to columns, so insertion order is
/// part of the schema, not just membership. Names are unique; inserting an
/// existing name replaces its type in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<(String, String)>,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, column_type: impl Into<String>) {
        let name = name.into();
        let column_type = column_type.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = column_type,
            None => self.columns.push((name, column_type)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, column_type: impl Into<String>) -> Self {
        self.insert(name, column_type);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.position(name)?;
        Some(self.columns.remove(idx).1)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renders `Name:type` pairs the way Kusto schema clauses expect them.
    pub fn to_kql(&self) -> String {
        self.columns
            .iter()
            .map(|(n, t)| format!("{}:{}", crate::script::quote_identifier(n), t))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<N, T> FromIterator<(N, T)> for ColumnSchema
where
    N: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut schema = ColumnSchema::new();
        for (name, column_type) in iter {
            schema.insert(name, column_type);
        }
        schema
    }
}

impl fmt::Display for ColumnSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.to_kql())
    }
}

impl Serialize for ColumnSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, column_type) in &self.columns {
            map.serialize_entry(name, column_type)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColumnSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ColumnSchemaVisitor;

        impl<'de> Visitor<'de> for ColumnSchemaVisitor {
            type Value = ColumnSchema;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of column name to type")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut schema = ColumnSchema::new();
                while let Some((name, column_type)) = access.next_entry::<String, String>()? {
                    if schema.contains(&name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate column '{}'",
                            name
                        )));
                    }
                    schema.insert(name, column_type);
                }
                Ok(schema)
            }
        }

        deserializer.deserialize_map(ColumnSchemaVisitor)
    }
}
