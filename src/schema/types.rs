use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KqlType {
    Bool,
    Int,
    Long,
    Real,
    Decimal,
    String,
    DateTime,
    TimeSpan,
    Guid,
    Dynamic,
    Other(String),
}

impl KqlType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "int" | "int32" => Self::Int,
            "long" | "int64" => Self::Long,
            "real" | "double" => Self::Real,
            "decimal" => Self::Decimal,
            "string" => Self::String,
            "datetime" | "date" => Self::DateTime,
            "timespan" | "time" => Self::TimeSpan,
            "guid" | "uuid" | "uniqueid" => Self::Guid,
            "dynamic" | "any" => Self::Dynamic,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Long => "long",
            Self::Real => "real",
            Self::Decimal => "decimal",
            Self::String => "string",
            Self::DateTime => "datetime",
            Self::TimeSpan => "timespan",
            Self::Guid => "guid",
            Self::Dynamic => "dynamic",
            Self::Other(s) => s,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Long | Self::Real | Self::Decimal)
    }

    fn numeric_rank(&self) -> u8 {
        match self {
            Self::Int => 1,
            Self::Long => 2,
            Self::Real => 3,
            Self::Decimal => 4,
            _ => 0,
        }
    }

    /// Result type of arithmetic between two numeric operands.
    pub fn widen(&self, other: &Self) -> Option<Self> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        if self.numeric_rank() >= other.numeric_rank() {
            Some(self.clone())
        } else {
            Some(other.clone())
        }
    }
}

impl fmt::Display for KqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for KqlType {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Whether a value of `source` type can land in a column declared as `target`.
pub fn is_type_compatible(source: &str, target: &str, strict: bool) -> bool {
    if source.trim().eq_ignore_ascii_case(target.trim()) {
        return true;
    }
    let source = KqlType::parse(source);
    let target = KqlType::parse(target);
    if source == target {
        return true;
    }
    if source == KqlType::Dynamic || target == KqlType::Dynamic {
        return true;
    }
    !strict && source.is_numeric() && target.is_numeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(KqlType::parse("double"), KqlType::Real);
        assert_eq!(KqlType::parse("Int64"), KqlType::Long);
        assert_eq!(KqlType::parse("boolean"), KqlType::Bool);
        assert_eq!(KqlType::parse("weird"), KqlType::Other("weird".to_string()));
    }

    #[test]
    fn test_int_to_real_depends_on_strictness() {
        assert!(is_type_compatible("int", "real", false));
        assert!(!is_type_compatible("int", "real", true));
    }

    #[test]
    fn test_dynamic_is_compatible_both_ways() {
        for strict in [false, true] {
            assert!(is_type_compatible("dynamic", "string", strict));
            assert!(is_type_compatible("datetime", "dynamic", strict));
        }
    }

    #[test]
    fn test_datetime_to_string_never_compatible() {
        assert!(!is_type_compatible("datetime", "string", false));
        assert!(!is_type_compatible("datetime", "string", true));
    }

    #[test]
    fn test_widen_picks_wider_numeric() {
        assert_eq!(KqlType::Int.widen(&KqlType::Long), Some(KqlType::Long));
        assert_eq!(KqlType::Real.widen(&KqlType::Int), Some(KqlType::Real));
        assert_eq!(KqlType::String.widen(&KqlType::Int), None);
    }
}
