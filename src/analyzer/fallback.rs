use super::functions::{self, ReturnType};
use super::lexer::{check_balance, tokenize, Token, TokenKind};
use super::{Analysis, Diagnostic, QueryAnalyzer, SchemaContext};
use crate::error::Result;
use crate::schema::{ColumnSchema, KqlType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

// Signed and scientific literals are deliberately not recognised; they infer as dynamic.
static INTEGER_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").expect("integer literal regex is valid"));

static DECIMAL_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+$").expect("decimal literal regex is valid"));

const COMPARISON_SYMBOLS: &[&str] = &["==", "!=", "<", ">", "<=", ">=", "=~", "!~"];

const PREDICATE_WORDS: &[&str] = &[
    "and", "or", "has", "has_cs", "has_any", "has_all", "hasprefix", "hassuffix", "contains",
    "contains_cs", "notcontains", "notcontains_cs", "startswith", "startswith_cs", "endswith",
    "endswith_cs", "in", "between", "notbetween", "matches", "like",
];

const ARITHMETIC_SYMBOLS: &[&str] = &["+", "-", "*", "/", "%"];

/// Operators that filter or reorder rows without touching the schema.
const ROW_OPERATORS: &[&str] = &[
    "where", "filter", "take", "limit", "sort", "order", "top", "sample", "render", "consume",
];

/// Token-level approximation of the query analyzer.
///
/// Understands the schema-shaping tabular operators (`project*`, `extend`,
/// `summarize`, `distinct`, `mv-expand`, `parse`) and treats everything else
/// as opaque. Never fails: anything it cannot follow becomes a warning.
#[derive(Debug, Clone, Default)]
pub struct LexicalAnalyzer;

impl LexicalAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, query: &str, context: &SchemaContext) -> Analysis {
        let lexed = tokenize(query);
        let balance = check_balance(&lexed.tokens);

        let mut walk = Walk::new(context);
        for error in lexed.errors.iter().chain(balance.iter()) {
            walk.diagnostics
                .push(Diagnostic::warning(error.offset, error.message.clone()));
        }
        walk.run(&lexed.tokens);

        debug!(
            table = %context.table_name,
            columns = walk.schema.len(),
            references = walk.referenced.len(),
            "Lexical analysis complete"
        );

        Analysis {
            diagnostics: walk.diagnostics,
            result_schema: walk.schema,
            referenced_columns: walk.referenced,
        }
    }
}

impl QueryAnalyzer for LexicalAnalyzer {
    fn parse_and_analyze(&self, text: &str, context: &SchemaContext) -> Result<Analysis> {
        Ok(self.analyze(text, context))
    }

    fn parse(&self, text: &str) -> Vec<Diagnostic> {
        let lexed = tokenize(text);
        let balance = check_balance(&lexed.tokens);
        lexed
            .errors
            .iter()
            .chain(balance.iter())
            .map(|e| Diagnostic::error(e.offset, e.message.clone()))
            .collect()
    }
}

struct Walk<'a> {
    context: &'a SchemaContext,
    schema: ColumnSchema,
    /// Columns the query itself introduces through assignments.
    defined: HashSet<String>,
    /// Names bound by `let` statements or `as`.
    bound: HashSet<String>,
    referenced: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Walk<'a> {
    fn new(context: &'a SchemaContext) -> Self {
        Self {
            context,
            schema: context.columns.clone(),
            defined: HashSet::new(),
            bound: HashSet::new(),
            referenced: BTreeSet::new(),
            diagnostics: Vec::new(),
        }
    }

    fn run(&mut self, tokens: &[Token]) {
        let statements: Vec<&[Token]> = split_top_level(tokens, ";")
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        let Some((body, lets)) = statements.split_last() else {
            return;
        };

        for statement in lets {
            if statement[0].is_ident("let") {
                if let Some(name) = statement.get(1).filter(|t| t.kind == TokenKind::Ident) {
                    self.bound.insert(name.text.clone());
                }
            }
        }

        // the first segment names the source
        for segment in split_top_level(body, "|").into_iter().skip(1) {
            self.apply_operator(segment);
        }
    }

    fn apply_operator(&mut self, segment: &[Token]) {
        let Some((operator, args)) = segment.split_first() else {
            self.diagnostics
                .push(Diagnostic::warning(0, "empty pipeline segment"));
            return;
        };
        if operator.kind != TokenKind::Ident {
            self.diagnostics.push(Diagnostic::warning(
                operator.offset,
                format!("unexpected '{}' where a tabular operator was expected", operator.text),
            ));
            return;
        }

        match operator.text.to_ascii_lowercase().as_str() {
            "project" => {
                let mut output = ColumnSchema::new();
                let mut unnamed = 0;
                for item in split_items(args) {
                    self.add_column(item, &mut output, &mut unnamed);
                }
                self.schema = output;
            }
            "extend" | "serialize" => {
                let mut output = self.schema.clone();
                let mut unnamed = 0;
                for item in split_items(args) {
                    self.add_column(item, &mut output, &mut unnamed);
                }
                self.schema = output;
            }
            "project-away" => {
                for item in split_items(args) {
                    self.collect_references(item);
                    if let [name] = item {
                        self.schema.remove(&name.text);
                    }
                }
            }
            "project-keep" => {
                let keep = self.listed_names(args);
                self.schema = self
                    .schema
                    .iter()
                    .filter(|(name, _)| keep.iter().any(|k| k == name))
                    .collect();
            }
            "project-rename" => self.rename(args),
            "project-reorder" => {
                let listed = self.listed_names(args);
                let mut output: ColumnSchema = listed
                    .iter()
                    .filter_map(|name| self.schema.get(name).map(|t| (name.clone(), t.to_string())))
                    .collect();
                for (name, column_type) in self.schema.iter() {
                    if !output.contains(name) {
                        output.insert(name, column_type);
                    }
                }
                self.schema = output;
            }
            "summarize" => self.summarize(args),
            "distinct" => {
                if !matches!(args, [star] if star.is_symbol("*")) {
                    let mut output = ColumnSchema::new();
                    let mut unnamed = 0;
                    for item in split_items(args) {
                        self.add_column(item, &mut output, &mut unnamed);
                    }
                    self.schema = output;
                }
            }
            "count" => self.schema = ColumnSchema::new().with("Count", "long"),
            "mv-expand" => self.mv_expand(args),
            "parse" | "parse-where" => self.parse_operator(args),
            "as" => {
                if let Some(name) = args.iter().rev().find(|t| t.kind == TokenKind::Ident) {
                    self.bound.insert(name.text.clone());
                }
            }
            name if ROW_OPERATORS.contains(&name) => self.collect_references(args),
            other => self.diagnostics.push(Diagnostic::warning(
                operator.offset,
                format!(
                    "operator '{}' is not modelled by the lexical analyzer; \
                     output schema may be incomplete",
                    other
                ),
            )),
        }
    }

    /// Handles one `Name = expr` or bare `expr` item of a projection.
    fn add_column(&mut self, item: &[Token], output: &mut ColumnSchema, unnamed: &mut usize) {
        if item.is_empty() {
            return;
        }
        let (target, expr) = split_assignment(item);
        self.collect_references(expr);
        let column_type = self.infer(expr);
        let name = match target {
            Some(name) => {
                self.defined.insert(name.to_string());
                name.to_string()
            }
            None => default_name(expr, unnamed),
        };
        output.insert(name, column_type.as_str());
    }

    fn rename(&mut self, args: &[Token]) {
        for item in split_items(args) {
            let (target, expr) = split_assignment(item);
            self.collect_references(expr);
            let (Some(new_name), [old]) = (target, expr) else {
                continue;
            };
            self.defined.insert(new_name.to_string());
            self.schema = self
                .schema
                .iter()
                .map(|(name, column_type)| {
                    if name == old.text {
                        (new_name, column_type)
                    } else {
                        (name, column_type)
                    }
                })
                .collect();
        }
    }

    fn summarize(&mut self, args: &[Token]) {
        let (aggregates, keys) = match find_top_level_ident(args, "by") {
            Some(index) => (&args[..index], &args[index + 1..]),
            None => (args, &args[args.len()..]),
        };

        let mut output = ColumnSchema::new();
        let mut unnamed = 0;
        for item in split_items(keys) {
            self.add_column(item, &mut output, &mut unnamed);
        }
        for item in split_items(aggregates) {
            self.add_column(item, &mut output, &mut unnamed);
        }
        self.schema = output;
    }

    fn mv_expand(&mut self, args: &[Token]) {
        for item in split_items(args) {
            let item = match find_top_level_ident(item, "to")
                .or_else(|| find_top_level_ident(item, "limit"))
            {
                Some(index) => &item[..index],
                None => item,
            };
            let (target, expr) = split_assignment(item);
            match target.map(|t| t.to_ascii_lowercase()).as_deref() {
                Some("bagexpansion") => continue,
                Some("with_itemindex") => {
                    if let Some(index) = expr.first() {
                        self.defined.insert(index.text.clone());
                        self.schema.insert(index.text.clone(), "long");
                    }
                    continue;
                }
                _ => {}
            }
            self.collect_references(expr);
            let name = match (target, expr) {
                (Some(name), _) => {
                    self.defined.insert(name.to_string());
                    name.to_string()
                }
                (None, [column]) if column.kind == TokenKind::Ident => column.text.clone(),
                _ => continue,
            };
            self.schema.insert(name, "dynamic");
        }
    }

    /// `parse Expr with * "literal" Name:type ...`
    fn parse_operator(&mut self, args: &[Token]) {
        let Some(with) = find_top_level_ident(args, "with") else {
            self.diagnostics.push(Diagnostic::warning(
                args.first().map_or(0, |t| t.offset),
                "parse operator without a 'with' pattern",
            ));
            return;
        };
        let source = &args[..with];
        let source = match source {
            [kind, eq, _, rest @ ..] if kind.is_ident("kind") && eq.is_symbol("=") => rest,
            _ => source,
        };
        self.collect_references(source);

        let pattern = &args[with + 1..];
        let mut i = 0;
        while i < pattern.len() {
            let token = &pattern[i];
            if token.kind != TokenKind::Ident {
                i += 1;
                continue;
            }
            let column_type = match (pattern.get(i + 1), pattern.get(i + 2)) {
                (Some(colon), Some(ty)) if colon.is_symbol(":") && ty.kind == TokenKind::Ident => {
                    i += 2;
                    KqlType::parse(&ty.text)
                }
                _ => KqlType::String,
            };
            self.defined.insert(token.text.clone());
            self.schema.insert(token.text.clone(), column_type.as_str());
            i += 1;
        }
    }

    fn listed_names(&mut self, args: &[Token]) -> Vec<String> {
        self.collect_references(args);
        split_items(args)
            .into_iter()
            .filter_map(|item| item.first())
            .filter(|t| t.kind == TokenKind::Ident)
            .map(|t| t.text.clone())
            .collect()
    }

    fn collect_references(&mut self, tokens: &[Token]) {
        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident {
                continue;
            }
            let next = tokens.get(i + 1);
            let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
            if next.is_some_and(|t| t.is_symbol("(") || t.is_symbol("=")) {
                continue;
            }
            if prev.is_some_and(|t| t.is_symbol(".") || t.is_symbol("$")) {
                continue;
            }
            if functions::is_keyword(&token.text) {
                continue;
            }
            let name = &token.text;
            if *name == self.context.table_name || self.bound.contains(name) {
                continue;
            }
            if self.defined.contains(name) && !self.context.columns.contains(name) {
                continue;
            }
            // bare function name, e.g. `now` without parentheses
            if functions::is_known_function(name) && !self.context.columns.contains(name) {
                continue;
            }
            self.referenced.insert(name.clone());
        }
    }

    fn infer(&self, expr: &[Token]) -> KqlType {
        let expr = strip_parens(expr);
        match expr {
            [] => KqlType::Dynamic,
            [single] => self.infer_atom(single),
            _ => {
                if let Some((name, args)) = as_call(expr) {
                    return self.infer_call(name, &args);
                }
                if has_top_level(expr, is_predicate) {
                    return KqlType::Bool;
                }
                self.infer_arithmetic(expr).unwrap_or(KqlType::Dynamic)
            }
        }
    }

    fn infer_atom(&self, token: &Token) -> KqlType {
        match token.kind {
            TokenKind::Ident if token.is_ident("true") || token.is_ident("false") => KqlType::Bool,
            TokenKind::Ident => self
                .schema
                .get(&token.text)
                .map(KqlType::parse)
                .unwrap_or(KqlType::Dynamic),
            TokenKind::Number if INTEGER_LITERAL.is_match(&token.text) => KqlType::Int,
            TokenKind::Number if DECIMAL_LITERAL.is_match(&token.text) => KqlType::Real,
            TokenKind::Str => KqlType::String,
            _ => KqlType::Dynamic,
        }
    }

    fn infer_call(&self, name: &str, args: &[&[Token]]) -> KqlType {
        let arg_type = |index: usize| {
            args.get(index)
                .map(|arg| self.infer(arg))
                .unwrap_or(KqlType::Dynamic)
        };
        match functions::return_type(name) {
            Some(ReturnType::Fixed(ty)) => ty,
            Some(ReturnType::Arg(index)) => arg_type(index),
            Some(ReturnType::Sum) => functions::sum_type(&arg_type(0)),
            None => KqlType::Dynamic,
        }
    }

    fn infer_arithmetic(&self, expr: &[Token]) -> Option<KqlType> {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut depth = 0i32;
        let mut start = 0;
        for (i, token) in expr.iter().enumerate() {
            match bracket_delta(token) {
                0 if depth == 0
                    && token.kind == TokenKind::Symbol
                    && ARITHMETIC_SYMBOLS.contains(&token.text.as_str()) =>
                {
                    operands.push(&expr[start..i]);
                    operators.push(token.text.as_str());
                    start = i + 1;
                }
                delta => depth += delta,
            }
        }
        if operators.is_empty() {
            return None;
        }
        operands.push(&expr[start..]);

        if operands.iter().any(|operand| operand.is_empty()) {
            return Some(KqlType::Dynamic);
        }
        let mut types = operands.iter().map(|operand| self.infer(operand));
        let mut result = types.next()?;
        for (operator, right) in operators.into_iter().zip(types) {
            result = combine(&result, operator, &right);
        }
        Some(result)
    }
}

fn combine(left: &KqlType, operator: &str, right: &KqlType) -> KqlType {
    if let Some(wider) = left.widen(right) {
        return wider;
    }
    match (left, operator, right) {
        (KqlType::DateTime, "-", KqlType::DateTime) => KqlType::TimeSpan,
        (KqlType::DateTime, "+" | "-", KqlType::TimeSpan)
        | (KqlType::TimeSpan, "+", KqlType::DateTime) => KqlType::DateTime,
        (KqlType::TimeSpan, "+" | "-", KqlType::TimeSpan) => KqlType::TimeSpan,
        (KqlType::TimeSpan, "*" | "/", n) if n.is_numeric() => KqlType::TimeSpan,
        _ => KqlType::Dynamic,
    }
}

fn is_predicate(token: &Token) -> bool {
    match token.kind {
        TokenKind::Symbol => COMPARISON_SYMBOLS.contains(&token.text.as_str()),
        TokenKind::Ident => PREDICATE_WORDS.contains(&token.text.to_ascii_lowercase().as_str()),
        _ => false,
    }
}

fn bracket_delta(token: &Token) -> i32 {
    if token.kind != TokenKind::Symbol {
        return 0;
    }
    match token.text.as_str() {
        "(" | "[" | "{" => 1,
        ")" | "]" | "}" => -1,
        _ => 0,
    }
}

fn split_top_level<'t>(tokens: &'t [Token], separator: &str) -> Vec<&'t [Token]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match bracket_delta(token) {
            0 if depth == 0 && token.is_symbol(separator) => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            delta => depth += delta,
        }
    }
    parts.push(&tokens[start..]);
    parts
}

fn split_items(tokens: &[Token]) -> Vec<&[Token]> {
    split_top_level(tokens, ",")
        .into_iter()
        .filter(|item| !item.is_empty())
        .collect()
}

fn has_top_level(tokens: &[Token], predicate: fn(&Token) -> bool) -> bool {
    let mut depth = 0i32;
    for token in tokens {
        depth += bracket_delta(token);
        if depth == 0 && predicate(token) {
            return true;
        }
    }
    false
}

fn find_top_level_ident(tokens: &[Token], word: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, token) in tokens.iter().enumerate() {
        depth += bracket_delta(token);
        if depth == 0 && token.is_ident(word) {
            return Some(i);
        }
    }
    None
}

fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        depth += bracket_delta(token);
        if depth == 0 {
            return Some(i);
        }
    }
    None
}

fn strip_parens(mut expr: &[Token]) -> &[Token] {
    while expr.len() >= 2
        && expr[0].is_symbol("(")
        && matching_close(expr, 0) == Some(expr.len() - 1)
    {
        expr = &expr[1..expr.len() - 1];
    }
    expr
}

/// Splits `name(arg, ...)` when the call spans the whole expression.
fn as_call(expr: &[Token]) -> Option<(&str, Vec<&[Token]>)> {
    if expr.len() < 3 || expr[0].kind != TokenKind::Ident || !expr[1].is_symbol("(") {
        return None;
    }
    if matching_close(expr, 1) != Some(expr.len() - 1) {
        return None;
    }
    Some((expr[0].text.as_str(), split_items(&expr[2..expr.len() - 1])))
}

fn split_assignment(item: &[Token]) -> (Option<&str>, &[Token]) {
    match item {
        [name, eq, rest @ ..] if name.kind == TokenKind::Ident && eq.is_symbol("=") => {
            (Some(name.text.as_str()), rest)
        }
        _ => (None, item),
    }
}

/// Column name Kusto assigns to an unaliased expression.
fn default_name(expr: &[Token], unnamed: &mut usize) -> String {
    let expr = strip_parens(expr);
    if let [column] = expr {
        if column.kind == TokenKind::Ident {
            return column.text.clone();
        }
    }
    if let Some((name, args)) = as_call(expr) {
        let first_column = args.first().and_then(|arg| match strip_parens(arg) {
            [column] if column.kind == TokenKind::Ident => Some(column.text.clone()),
            _ => None,
        });
        if functions::is_aggregate(name) {
            return format!("{}_{}", name, first_column.unwrap_or_default());
        }
        if let Some(column) = first_column {
            return column;
        }
    }
    *unnamed += 1;
    format!("Column{}", unnamed)
}
