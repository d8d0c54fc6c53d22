//! Composite assignment: one typed value rebuilt from indexed sub-parameters.
//!
//! Form helpers submit a date as `date(1i)=1982`, `date(2i)=10`,
//! `date(3i)=19`. The annotation is the 1-based argument position, optionally
//! suffixed with `i` (integer) or `f` (float).

use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;

use crate::coerce::{coerce, parse_integer};
use crate::core::{FieldType, ModelError, Result, Value};
use crate::schema::ModelSchema;

lazy_static! {
    static ref COMPOSITE_KEY: Regex = Regex::new(r"^([^()]+)\(([^()]*)\)$").unwrap();
    static ref LEADING_INTEGER: Regex = Regex::new(r"^\s*[+-]?\d+").unwrap();
    static ref LEADING_FLOAT: Regex =
        Regex::new(r"^\s*[+-]?(\d+(\.\d+)?([eE][+-]?\d+)?|\.\d+)").unwrap();
}

/// Positions past this are rejected rather than allocated.
const MAX_POSITION: i64 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartHint {
    Integer,
    Float,
    Raw,
}

/// A parsed `base(Ni)` key. `position` is 0-based and may be negative for
/// malformed annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    pub base: String,
    pub position: i64,
    pub hint: PartHint,
}

impl CompositeKey {
    pub fn parse(key: &str) -> Option<Self> {
        let caps = COMPOSITE_KEY.captures(key)?;
        let annotation = &caps[2];

        let hint = if annotation.ends_with('i') {
            PartHint::Integer
        } else if annotation.ends_with('f') {
            PartHint::Float
        } else {
            PartHint::Raw
        };

        Some(Self {
            base: caps[1].to_string(),
            position: leading_integer(annotation) - 1,
            hint,
        })
    }
}

/// Integer prefix of `text`, or 0 when there is none.
fn leading_integer(text: &str) -> i64 {
    LEADING_INTEGER
        .find(text)
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(0)
}

fn leading_float(text: &str) -> f64 {
    LEADING_FLOAT
        .find(text)
        .and_then(|m| m.as_str().trim().parse().ok())
        .unwrap_or(0.0)
}

fn convert_part(value: Value, hint: PartHint) -> Value {
    if value.is_blank() {
        return Value::Null;
    }
    match (hint, value) {
        (PartHint::Integer, Value::Text(text)) => Value::Integer(leading_integer(&text)),
        (PartHint::Float, Value::Text(text)) => Value::Float(leading_float(&text)),
        (_, value) => value,
    }
}

/// Splits `pairs` into values composed for virtual fields and the pairs left
/// for ordinary assignment.
///
/// Every composite group is built before anything is returned, so a bad group
/// leaves the record untouched.
pub fn compose(
    schema: &ModelSchema,
    pairs: Vec<(String, Value)>,
) -> Result<(Vec<(String, Value)>, Vec<(String, Value)>)> {
    let mut groups: Vec<(String, FieldType, Vec<Value>)> = Vec::new();
    let mut passthrough = Vec::new();

    for (key, value) in pairs {
        let composite = match CompositeKey::parse(&key) {
            Some(composite) => composite,
            None => {
                passthrough.push((key, value));
                continue;
            }
        };
        let spec = match schema.field(&composite.base) {
            Some(spec) => spec,
            None => {
                passthrough.push((key, value));
                continue;
            }
        };

        let field_type = spec.field_type.ok_or_else(|| {
            ModelError::Configuration(format!(
                "{} has no type and cannot be used for multiparameter assignment",
                composite.base
            ))
        })?;
        if composite.position < 0 {
            return Err(ModelError::Index(format!(
                "Out-of-bounds multiparameter argument index in '{}'",
                key
            )));
        }
        if composite.position > MAX_POSITION {
            return Err(ModelError::Index(format!(
                "Multiparameter argument index in '{}' exceeds {}",
                key,
                MAX_POSITION + 1
            )));
        }

        let slot = composite.position as usize;
        let args = match groups.iter().position(|(base, _, _)| *base == composite.base) {
            Some(idx) => &mut groups[idx].2,
            None => {
                let idx = groups.len();
                groups.push((composite.base.clone(), field_type, Vec::new()));
                &mut groups[idx].2
            }
        };
        if args.len() <= slot {
            args.resize(slot + 1, Value::Null);
        }
        args[slot] = convert_part(value, composite.hint);
    }

    let mut composed = Vec::with_capacity(groups.len());
    for (base, field_type, args) in groups {
        let value = if args.iter().all(Value::is_null) {
            Value::Null
        } else {
            construct(field_type, &args)?
        };
        trace!("composed multiparameter field: field='{}' value='{}'", base, value);
        composed.push((base, value));
    }

    Ok((composed, passthrough))
}

/// Builds a value of `field_type` from positional arguments.
pub fn construct(field_type: FieldType, args: &[Value]) -> Result<Value> {
    match field_type {
        FieldType::Date => {
            let year = integer_part(args, 0, None, "year")?;
            let month = integer_part(args, 1, Some(1), "month")?;
            let day = integer_part(args, 2, Some(1), "day")?;
            Ok(Value::Date(civil_date(year, month, day)?))
        }
        FieldType::Timestamp => {
            let date = civil_date(
                integer_part(args, 0, None, "year")?,
                integer_part(args, 1, Some(1), "month")?,
                integer_part(args, 2, Some(1), "day")?,
            )?;
            let hour = integer_part(args, 3, Some(0), "hour")?;
            let minute = integer_part(args, 4, Some(0), "minute")?;
            let second = integer_part(args, 5, Some(0), "second")?;
            let time = u32::try_from(hour)
                .ok()
                .zip(u32::try_from(minute).ok())
                .zip(u32::try_from(second).ok())
                .and_then(|((h, m), s)| date.and_hms_opt(h, m, s))
                .ok_or_else(|| {
                    ModelError::TypeMismatch(format!(
                        "invalid time {:02}:{:02}:{:02}",
                        hour, minute, second
                    ))
                })?;
            Ok(Value::Timestamp(time.and_utc()))
        }
        FieldType::Text => match single_argument(field_type, args)? {
            Value::Text(text) => Ok(Value::Text(text.clone())),
            other => Ok(Value::Text(other.to_string())),
        },
        FieldType::Integer | FieldType::Float | FieldType::Boolean => {
            let arg = single_argument(field_type, args)?.clone();
            Ok(match (field_type, coerce(arg, Some(field_type))) {
                (FieldType::Float, Value::Integer(i)) => Value::Float(i as f64),
                (_, value) => value,
            })
        }
        FieldType::Sequence => Ok(Value::Sequence(args.to_vec())),
        FieldType::Null => Ok(Value::Null),
        FieldType::Mapping => Err(ModelError::TypeMismatch(
            "a mapping cannot be built from positional arguments".to_string(),
        )),
    }
}

fn single_argument(field_type: FieldType, args: &[Value]) -> Result<&Value> {
    match args {
        [arg] => Ok(arg),
        _ => Err(ModelError::TypeMismatch(format!(
            "{} takes one argument, got {}",
            field_type,
            args.len()
        ))),
    }
}

fn integer_part(args: &[Value], idx: usize, default: Option<i64>, label: &str) -> Result<i64> {
    let parsed = match args.get(idx) {
        None | Some(Value::Null) => default,
        Some(Value::Text(text)) => parse_integer(text),
        Some(other) => other.as_i64(),
    };
    parsed.ok_or_else(|| ModelError::TypeMismatch(format!("invalid or missing {}", label)))
}

fn civil_date(year: i64, month: i64, day: i64) -> Result<NaiveDate> {
    i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| {
            ModelError::TypeMismatch(format!("invalid date {}-{}-{}", year, month, day))
        })
}
