use crate::schema::KqlType;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// How a scalar or aggregate function's result type is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Fixed(KqlType),
    /// Same type as the argument at this index.
    Arg(usize),
    /// `sum`-style widening: integers become `long`, other numerics keep their type.
    Sum,
}

const KEYWORDS: &[&str] = &[
    "and", "or", "not", "by", "on", "asc", "desc", "nulls", "first", "last", "with", "kind",
    "hint", "inner", "outer", "leftouter", "rightouter", "fullouter", "leftanti", "rightanti",
    "leftsemi", "rightsemi", "innerunique", "anti", "semi", "true", "false", "null", "between",
    "in", "has", "has_any", "has_all", "hasprefix", "hassuffix", "contains", "startswith",
    "endswith", "matches", "regex", "let", "project", "project-away", "project-keep",
    "project-rename", "project-reorder", "extend", "where", "filter", "summarize", "take",
    "limit", "sort", "order", "top", "distinct", "join", "union", "lookup", "mv-expand",
    "mv-apply", "parse", "parse-where", "parse-kv", "evaluate", "datatable", "print", "as",
    "sample", "serialize", "invoke", "render", "make-series", "from", "to", "step",
    "of", "bag_unpack", "typeof", "range", "getschema", "consume", "facet", "fork", "partition",
    "scan", "search", "table", "database", "cluster", "materialize", "toscalar", "totable",
    "withsource", "isfuzzy", "bool", "boolean", "int", "long", "real", "double", "decimal",
    "string", "datetime", "timespan", "dynamic", "guid", "notcontains", "notcontains_cs",
    "contains_cs", "has_cs", "startswith_cs", "endswith_cs", "notbetween", "like",
];

static KEYWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| KEYWORDS.iter().copied().collect());

static FUNCTIONS: Lazy<HashMap<&'static str, ReturnType>> = Lazy::new(|| {
    use KqlType::*;
    use ReturnType::{Arg, Fixed};

    let mut table: HashMap<&'static str, ReturnType> = HashMap::new();
    let mut add = |names: &[&'static str], ret: ReturnType| {
        for name in names {
            table.insert(*name, ret.clone());
        }
    };

    add(
        &[
            "tostring", "strcat", "strcat_delim", "substring", "tolower", "toupper", "trim",
            "trim_start", "trim_end", "replace", "replace_string", "replace_regex", "extract",
            "format_datetime", "format_timespan", "tohex", "url_encode", "url_decode",
            "base64_encode_tostring", "base64_decode_tostring", "hash_sha256", "hash_md5",
            "hash_sha1", "strrep", "reverse", "translate", "parse_ipv4_mask", "gettype",
            "current_database", "current_cluster_endpoint", "current_principal",
        ],
        Fixed(String),
    );
    add(
        &[
            "now", "ago", "todatetime", "startofday", "startofweek", "startofmonth",
            "startofyear", "endofday", "endofweek", "endofmonth", "endofyear", "make_datetime",
            "datetime_add", "unixtime_seconds_todatetime", "unixtime_milliseconds_todatetime",
            "unixtime_microseconds_todatetime", "unixtime_nanoseconds_todatetime",
            "ingestion_time", "datetime_utc_to_local", "datetime_local_to_utc",
        ],
        Fixed(DateTime),
    );
    add(
        &[
            "tolong", "strlen", "countof", "count", "countif", "dcount", "dcountif", "hash",
            "datetime_diff", "array_length", "bitset_count_ones", "estimate_data_size",
            "row_number",
        ],
        Fixed(Long),
    );
    add(
        &["toint", "getyear", "getmonth", "week_of_year", "hourofday", "indexof"],
        Fixed(Int),
    );
    add(
        &[
            "toreal", "todouble", "avg", "avgif", "stdev", "stdevif", "variance", "varianceif",
            "sqrt", "log", "log10", "log2", "exp", "exp2", "exp10", "pow", "rand", "percentile",
            "pi", "cos", "sin", "tan",
        ],
        Fixed(Real),
    );
    add(
        &[
            "tobool", "toboolean", "isempty", "isnotempty", "isnull", "isnotnull", "isnan",
            "isinf", "isfinite", "ipv4_is_private", "ipv4_is_in_range", "not", "isascii",
            "isutf8",
        ],
        Fixed(Bool),
    );
    add(
        &[
            "parse_json", "todynamic", "pack", "bag_pack", "pack_array", "pack_all",
            "make_list", "make_list_if", "make_set", "make_set_if", "make_bag", "make_bag_if",
            "split", "extract_all", "bag_keys", "bag_merge", "array_concat", "array_slice",
            "dynamic", "parse_url", "parse_csv", "parse_xml", "parse_user_agent", "zip",
            "percentiles_array",
        ],
        Fixed(Dynamic),
    );
    add(&["toguid", "new_guid"], Fixed(Guid));
    add(&["totimespan", "time", "make_timespan"], Fixed(TimeSpan));
    add(&["todecimal"], Fixed(Decimal));
    add(
        &[
            "min", "max", "minif", "maxif", "any", "take_any", "take_anyif", "bin", "floor",
            "round", "abs", "bin_at", "prev", "next", "coalesce", "ceiling", "arg_min",
            "arg_max",
        ],
        Arg(0),
    );
    add(&["iff", "iif", "case"], Arg(1));
    add(&["sum", "sumif"], ReturnType::Sum);
    table
});

/// `datetime(...)` and friends are literal constructors, not column references.
const LITERAL_CONSTRUCTORS: &[(&str, KqlType)] = &[
    ("datetime", KqlType::DateTime),
    ("timespan", KqlType::TimeSpan),
    ("guid", KqlType::Guid),
    ("int", KqlType::Int),
    ("long", KqlType::Long),
    ("real", KqlType::Real),
    ("decimal", KqlType::Decimal),
    ("bool", KqlType::Bool),
];

const AGGREGATES: &[&str] = &[
    "count", "countif", "dcount", "dcountif", "sum", "sumif", "avg", "avgif", "min", "max",
    "minif", "maxif", "any", "take_any", "take_anyif", "arg_max", "arg_min", "make_list",
    "make_list_if", "make_set", "make_set_if", "make_bag", "make_bag_if", "percentile",
    "percentiles_array", "stdev", "stdevif", "variance", "varianceif",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORD_SET.contains(word.to_ascii_lowercase().as_str())
}

pub fn is_known_function(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    FUNCTIONS.contains_key(lower.as_str())
        || LITERAL_CONSTRUCTORS.iter().any(|(n, _)| *n == lower)
}

pub fn is_aggregate(name: &str) -> bool {
    AGGREGATES.contains(&name.to_ascii_lowercase().as_str())
}

pub fn return_type(name: &str) -> Option<ReturnType> {
    let lower = name.to_ascii_lowercase();
    if let Some((_, ty)) = LITERAL_CONSTRUCTORS.iter().find(|(n, _)| *n == lower) {
        return Some(ReturnType::Fixed(ty.clone()));
    }
    FUNCTIONS.get(lower.as_str()).cloned()
}

pub fn sum_type(arg: &KqlType) -> KqlType {
    match arg {
        KqlType::Int | KqlType::Long => KqlType::Long,
        KqlType::Real => KqlType::Real,
        KqlType::Decimal => KqlType::Decimal,
        _ => KqlType::Dynamic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_is_case_insensitive() {
        assert!(is_keyword("BY"));
        assert!(is_keyword("project-away"));
        assert!(!is_keyword("Timestamp"));
    }

    #[test]
    fn test_return_types() {
        assert_eq!(return_type("now"), Some(ReturnType::Fixed(KqlType::DateTime)));
        assert_eq!(return_type("count"), Some(ReturnType::Fixed(KqlType::Long)));
        assert_eq!(return_type("datetime"), Some(ReturnType::Fixed(KqlType::DateTime)));
        assert_eq!(return_type("iff"), Some(ReturnType::Arg(1)));
        assert_eq!(return_type("my_udf"), None);
    }

    #[test]
    fn test_sum_widening() {
        assert_eq!(sum_type(&KqlType::Int), KqlType::Long);
        assert_eq!(sum_type(&KqlType::Real), KqlType::Real);
        assert_eq!(sum_type(&KqlType::String), KqlType::Dynamic);
    }
}
