//! Translation of lead list query parameters into a typed filter.
//!
//! A field is filtered with `<field>=<value>`, optionally `<field>_op=<operator>`
//! and, for `between`, `<field>_to=<upper bound>`. Clauses combine with AND.
//! Nothing here touches the database: [`LeadFilter`] is rendered into SQL by
//! the lead store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;

use crate::db::{LeadSource, LeadStatus};
use crate::utils::{start_of_day, start_of_next_day, TimeInput};
use crate::validation::FieldErrors;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Comparison requested through `<field>_op`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    Contains,
    In,
    Gt,
    Lt,
    Between,
    Before,
    After,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::In => "in",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Between => "between",
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equals" | "eq" => Ok(Self::Equals),
            "contains" => Ok(Self::Contains),
            "in" => Ok(Self::In),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "between" => Ok(Self::Between),
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            _ => Err(format!("Unknown operator: {}", s)),
        }
    }
}

/// How a field's values are parsed and compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Enum,
    Numeric,
    Temporal,
    Boolean,
}

/// Lead fields that can be filtered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadField {
    Email,
    Company,
    City,
    Status,
    Source,
    Score,
    LeadValue,
    CreatedAt,
    LastActivityAt,
    IsQualified,
}

impl LeadField {
    pub const ALL: [LeadField; 10] = [
        Self::Email,
        Self::Company,
        Self::City,
        Self::Status,
        Self::Source,
        Self::Score,
        Self::LeadValue,
        Self::CreatedAt,
        Self::LastActivityAt,
        Self::IsQualified,
    ];

    /// Query parameter name; also the column name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Company => "company",
            Self::City => "city",
            Self::Status => "status",
            Self::Source => "source",
            Self::Score => "score",
            Self::LeadValue => "lead_value",
            Self::CreatedAt => "created_at",
            Self::LastActivityAt => "last_activity_at",
            Self::IsQualified => "is_qualified",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Email | Self::Company | Self::City => FieldKind::Text,
            Self::Status | Self::Source => FieldKind::Enum,
            Self::Score | Self::LeadValue => FieldKind::Numeric,
            Self::CreatedAt | Self::LastActivityAt => FieldKind::Temporal,
            Self::IsQualified => FieldKind::Boolean,
        }
    }
}

impl FieldKind {
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            Self::Text => &[Operator::Equals, Operator::Contains],
            Self::Enum => &[Operator::Equals, Operator::In],
            Self::Numeric => &[Operator::Equals, Operator::Gt, Operator::Lt, Operator::Between],
            Self::Temporal => &[
                Operator::Equals,
                Operator::Before,
                Operator::After,
                Operator::Between,
            ],
            Self::Boolean => &[Operator::Equals],
        }
    }
}

/// A typed comparison operand
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// What a single field must satisfy
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    /// Case-insensitive substring; the needle is already lowercased
    Contains(String),
    OneOf(Vec<Value>),
    GreaterThan(Value),
    LessThan(Value),
    AtLeast(Value),
    /// Inclusive on both ends
    Between(Value, Value),
    /// Half-open `[start, end)`
    Within(Value, Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: LeadField,
    pub condition: Condition,
}

/// Conjunction of clauses; empty means "every lead"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    clauses: Vec<Clause>,
}

impl LeadFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: LeadField, condition: Condition) -> Self {
        self.clauses.push(Clause { field, condition });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn condition(&self, field: LeadField) -> Option<&Condition> {
        self.clauses
            .iter()
            .find(|c| c.field == field)
            .map(|c| &c.condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Rows to skip; saturates so any accepted page yields a valid offset
    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.limit - 1) / self.limit
    }
}

/// A parsed `GET /api/leads` query string
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: LeadFilter,
    pub pagination: Pagination,
}

/// Parse filter and pagination together, reporting every bad parameter.
pub fn parse_list_query(params: &HashMap<String, String>) -> Result<ListQuery, FieldErrors> {
    let mut errors = FieldErrors::new();

    let pagination = parse_pagination_into(params, &mut errors);
    let filter = translate_into(params, &mut errors);

    errors.finish()?;
    Ok(ListQuery { filter, pagination })
}

pub fn translate(params: &HashMap<String, String>) -> Result<LeadFilter, FieldErrors> {
    let mut errors = FieldErrors::new();
    let filter = translate_into(params, &mut errors);
    errors.finish()?;
    Ok(filter)
}

pub fn parse_pagination(params: &HashMap<String, String>) -> Result<Pagination, FieldErrors> {
    let mut errors = FieldErrors::new();
    let pagination = parse_pagination_into(params, &mut errors);
    errors.finish()?;
    Ok(pagination)
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_pagination_into(params: &HashMap<String, String>, errors: &mut FieldErrors) -> Pagination {
    let page = match param(params, "page") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(page) if page >= 1 => page,
            _ => {
                errors.add("page", "Page must be a positive integer");
                DEFAULT_PAGE
            }
        },
        None => DEFAULT_PAGE,
    };

    let limit = match param(params, "limit") {
        Some(raw) => match raw.parse::<i64>() {
            Ok(limit) if limit >= 1 => limit.min(MAX_LIMIT),
            _ => {
                errors.add("limit", "Limit must be a positive integer");
                DEFAULT_LIMIT
            }
        },
        None => DEFAULT_LIMIT,
    };

    Pagination { page, limit }
}

fn translate_into(params: &HashMap<String, String>, errors: &mut FieldErrors) -> LeadFilter {
    let mut filter = LeadFilter::new();

    for field in LeadField::ALL {
        let Some(raw) = param(params, field.name()) else {
            continue;
        };

        let op_key = format!("{}_op", field.name());
        let operator = match param(params, &op_key) {
            Some(op) => match op.parse::<Operator>() {
                Ok(op) => op,
                Err(e) => {
                    errors.add(op_key, e);
                    continue;
                }
            },
            None => Operator::Equals,
        };

        if !field.kind().operators().contains(&operator) {
            errors.add(
                op_key,
                format!(
                    "Operator '{}' is not supported for {}",
                    operator.as_str(),
                    field.name()
                ),
            );
            continue;
        }

        let to_key = format!("{}_to", field.name());
        let upper = param(params, &to_key);

        match condition_for(field, operator, raw, upper) {
            Ok(condition) => filter = filter.with(field, condition),
            Err((suffix, message)) => {
                let key = match suffix {
                    Bound::Value => field.name().to_string(),
                    Bound::To => to_key,
                };
                errors.add(key, message);
            }
        }
    }

    filter
}

/// Which parameter a failure belongs to
enum Bound {
    Value,
    To,
}

type ConditionResult = Result<Condition, (Bound, String)>;

fn condition_for(
    field: LeadField,
    operator: Operator,
    raw: &str,
    upper: Option<&str>,
) -> ConditionResult {
    match field.kind() {
        FieldKind::Text => Ok(text_condition(field, operator, raw)),
        FieldKind::Enum => enum_condition(field, operator, raw),
        FieldKind::Numeric => numeric_condition(field, operator, raw, upper),
        FieldKind::Temporal => temporal_condition(field, operator, raw, upper),
        FieldKind::Boolean => parse_bool(raw)
            .map(|b| Condition::Equals(Value::Bool(b)))
            .ok_or((
                Bound::Value,
                format!("{} must be 'true' or 'false'", field.name()),
            )),
    }
}

fn text_condition(field: LeadField, operator: Operator, raw: &str) -> Condition {
    match operator {
        Operator::Contains => Condition::Contains(raw.to_lowercase()),
        // Emails are stored lowercased
        _ if field == LeadField::Email => Condition::Equals(Value::Text(raw.to_lowercase())),
        _ => Condition::Equals(Value::Text(raw.to_string())),
    }
}

fn enum_value(field: LeadField, raw: &str) -> Result<Value, String> {
    let canonical = match field {
        LeadField::Status => raw.parse::<LeadStatus>()?.as_str(),
        _ => raw.parse::<LeadSource>()?.as_str(),
    };
    Ok(Value::Text(canonical.to_string()))
}

fn enum_condition(field: LeadField, operator: Operator, raw: &str) -> ConditionResult {
    match operator {
        Operator::In => {
            let values = raw
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| enum_value(field, v))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| (Bound::Value, e))?;
            if values.is_empty() {
                return Err((
                    Bound::Value,
                    format!("{} needs at least one value", field.name()),
                ));
            }
            Ok(Condition::OneOf(values))
        }
        _ => enum_value(field, raw)
            .map(Condition::Equals)
            .map_err(|e| (Bound::Value, e)),
    }
}

fn parse_number(field: LeadField, raw: &str) -> Result<Value, String> {
    match field {
        LeadField::Score => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("{} must be an integer", field.name())),
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Value::Real(n)),
            _ => Err(format!("{} must be a number", field.name())),
        },
    }
}

fn value_le(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => a <= b,
        (Value::Real(a), Value::Real(b)) => a <= b,
        (Value::Timestamp(a), Value::Timestamp(b)) => a <= b,
        _ => true,
    }
}

fn upper_bound<'a>(field: LeadField, upper: Option<&'a str>) -> Result<&'a str, (Bound, String)> {
    upper.ok_or((
        Bound::To,
        format!("{}_to is required for 'between'", field.name()),
    ))
}

fn numeric_condition(
    field: LeadField,
    operator: Operator,
    raw: &str,
    upper: Option<&str>,
) -> ConditionResult {
    let value = parse_number(field, raw).map_err(|e| (Bound::Value, e))?;
    match operator {
        Operator::Gt => Ok(Condition::GreaterThan(value)),
        Operator::Lt => Ok(Condition::LessThan(value)),
        Operator::Between => {
            let high = parse_number(field, upper_bound(field, upper)?)
                .map_err(|e| (Bound::To, e))?;
            if !value_le(&value, &high) {
                return Err((
                    Bound::To,
                    format!("{}_to must not be less than {}", field.name(), field.name()),
                ));
            }
            Ok(Condition::Between(value, high))
        }
        _ => Ok(Condition::Equals(value)),
    }
}

fn parse_time(field: LeadField, raw: &str) -> Result<TimeInput, String> {
    TimeInput::parse(raw).ok_or_else(|| {
        format!(
            "{} must be a date (YYYY-MM-DD) or an RFC 3339 timestamp",
            field.name()
        )
    })
}

fn temporal_condition(
    field: LeadField,
    operator: Operator,
    raw: &str,
    upper: Option<&str>,
) -> ConditionResult {
    let input = parse_time(field, raw).map_err(|e| (Bound::Value, e))?;
    let ts = Value::Timestamp;

    match operator {
        Operator::Before => Ok(Condition::LessThan(ts(input.start()))),
        Operator::After => Ok(match input {
            TimeInput::Day(day) => Condition::AtLeast(ts(start_of_next_day(day))),
            TimeInput::Instant(at) => Condition::GreaterThan(ts(at)),
        }),
        Operator::Between => {
            let to = parse_time(field, upper_bound(field, upper)?).map_err(|e| (Bound::To, e))?;
            let low = ts(input.start());
            let condition = match to {
                TimeInput::Day(day) => Condition::Within(low.clone(), ts(start_of_next_day(day))),
                TimeInput::Instant(at) => Condition::Between(low.clone(), ts(at)),
            };
            if !value_le(&low, &ts(to.start())) {
                return Err((
                    Bound::To,
                    format!("{}_to must not be earlier than {}", field.name(), field.name()),
                ));
            }
            Ok(condition)
        }
        _ => {
            let day = input.day();
            Ok(Condition::Within(
                ts(start_of_day(day)),
                ts(start_of_next_day(day)),
            ))
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
