//! Typed task parameters
//!
//! Tasks describe their inputs with [`ParameterSpec`]s. Callers hand in loosely
//! typed [`ParameterValue`]s (often plain strings from a query string); binding
//! coerces each value to the declared [`ParameterKind`] and produces a
//! [`ParameterSet`] the task reads through [`BoundParameter::get`].

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{WorkerError, WorkerResult};

/// Arguments supplied by a caller, keyed by parameter name
pub type Arguments = HashMap<String, ParameterValue>;

/// Something that can be referenced by slug or by numeric id.
///
/// Passing an identifiable value as an argument lets a task read it back either
/// whole (as a [`ParameterValue`]) or projected to its slug or id.
pub trait Identifiable: fmt::Debug + Send + Sync {
    /// Stable string identity
    fn slug(&self) -> &str;

    /// Numeric identity
    fn id(&self) -> i64;
}

/// Type a parameter is declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Keeps whatever the caller supplied
    Any,
    Text,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A runtime argument value
#[derive(Debug, Clone)]
pub enum ParameterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Resource(Arc<dyn Identifiable>),
}

impl ParameterValue {
    /// Wrap an identifiable value
    pub fn resource<R: Identifiable + 'static>(resource: R) -> Self {
        Self::Resource(Arc::new(resource))
    }

    /// Coerce this value to the given kind.
    ///
    /// Resources are left untouched for every kind so that they can still be
    /// projected to their slug or id when read.
    pub fn coerce(self, kind: ParameterKind) -> Option<Self> {
        match (kind, self) {
            (ParameterKind::Any, value) | (_, value @ Self::Resource(_)) => Some(value),

            (ParameterKind::Text, Self::Text(s)) => Some(Self::Text(s)),
            (ParameterKind::Text, Self::Integer(i)) => Some(Self::Text(i.to_string())),
            (ParameterKind::Text, Self::Float(f)) => Some(Self::Text(f.to_string())),
            (ParameterKind::Text, Self::Boolean(b)) => Some(Self::Text(b.to_string())),

            (ParameterKind::Integer, value) => i64::from_value(&value).map(Self::Integer),
            (ParameterKind::Float, value) => f64::from_value(&value).map(Self::Float),
            (ParameterKind::Boolean, value) => bool::from_value(&value).map(Self::Boolean),
        }
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Resource(a), Self::Resource(b)) => a.id() == b.id() && a.slug() == b.slug(),
            _ => false,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Resource(r) => write!(f, "{}#{}", r.slug(), r.id()),
        }
    }
}

impl Serialize for ParameterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Resource(r) => serializer.serialize_str(r.slug()),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

/// Conversion from a bound value into a concrete Rust type
pub trait FromParameter: Sized {
    /// Name used in conversion errors
    const TARGET: &'static str;

    fn from_value(value: &ParameterValue) -> Option<Self>;
}

impl FromParameter for ParameterValue {
    const TARGET: &'static str = "any";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromParameter for String {
    const TARGET: &'static str = "string";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        Some(match value {
            ParameterValue::Text(s) => s.clone(),
            ParameterValue::Resource(r) => r.slug().to_string(),
            ParameterValue::Integer(i) => i.to_string(),
            ParameterValue::Float(f) => f.to_string(),
            ParameterValue::Boolean(b) => b.to_string(),
        })
    }
}

impl FromParameter for i64 {
    const TARGET: &'static str = "integer";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Integer(i) => Some(*i),
            ParameterValue::Resource(r) => Some(r.id()),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            ParameterValue::Float(f)
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
            {
                Some(*f as i64)
            }
            _ => None,
        }
    }
}

macro_rules! narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FromParameter for $ty {
                const TARGET: &'static str = stringify!($ty);

                fn from_value(value: &ParameterValue) -> Option<Self> {
                    i64::from_value(value).and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

narrow_integer!(i32, u32, u64, usize);

impl FromParameter for f64 {
    const TARGET: &'static str = "float";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Float(f) => Some(*f),
            ParameterValue::Integer(i) => Some(*i as f64),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromParameter for bool {
    const TARGET: &'static str = "boolean";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Boolean(b) => Some(*b),
            ParameterValue::Integer(0) => Some(false),
            ParameterValue::Integer(1) => Some(true),
            ParameterValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromParameter for PathBuf {
    const TARGET: &'static str = "path";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Text(s) => Some(PathBuf::from(s)),
            _ => None,
        }
    }
}

/// Declaration of a single task parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,
}

impl ParameterSpec {
    /// Declare a parameter that must be supplied (or defaulted)
    pub fn required(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
            default: None,
        }
    }

    /// Declare a parameter that may be left out
    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, description, kind)
        }
    }

    /// Set the value used when the caller does not supply one
    pub fn with_default(mut self, value: impl Into<ParameterValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Case-insensitive name comparison
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Bind a caller-supplied value (or the default) to this parameter
    pub fn bind(&self, raw: Option<ParameterValue>) -> WorkerResult<BoundParameter> {
        let value = match raw.or_else(|| self.default.clone()) {
            Some(value) => Some(value.coerce(self.kind).ok_or_else(|| {
                WorkerError::invalid_argument(format!(
                    "the argument {} expects a value of type {}",
                    self.name, self.kind
                ))
            })?),
            None if self.required => {
                return Err(WorkerError::invalid_argument(format!(
                    "the argument {} is required but it was not specified",
                    self.name
                )))
            }
            None => None,
        };

        Ok(BoundParameter {
            spec: self.clone(),
            value,
        })
    }
}

/// A parameter declaration paired with its runtime value
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    spec: ParameterSpec,
    value: Option<ParameterValue>,
}

impl BoundParameter {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    /// The raw bound value, if any
    pub fn raw(&self) -> Option<&ParameterValue> {
        self.value.as_ref()
    }

    /// Read the value as `T`.
    ///
    /// Fails with [`WorkerError::Conversion`] when no value is bound or the
    /// value cannot be represented as `T`. Use [`BoundParameter::get_opt`]
    /// for parameters that may be absent.
    pub fn get<T: FromParameter>(&self) -> WorkerResult<T> {
        self.value
            .as_ref()
            .and_then(T::from_value)
            .ok_or_else(|| WorkerError::conversion(self.name(), T::TARGET))
    }

    /// Read an optional value, `None` when nothing is bound
    pub fn get_opt<T: FromParameter>(&self) -> WorkerResult<Option<T>> {
        match &self.value {
            None => Ok(None),
            Some(_) => self.get::<T>().map(Some),
        }
    }
}

/// Bound parameters handed to a running task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    parameters: Vec<BoundParameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, parameter: BoundParameter) {
        self.parameters.push(parameter);
    }

    /// Look a parameter up by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        self.parameters.iter().find(|p| p.spec.matches(name))
    }

    /// Read a declared parameter as `T`
    pub fn value<T: FromParameter>(&self, name: &str) -> WorkerResult<T> {
        self.get(name)
            .ok_or_else(|| WorkerError::invalid_argument(format!("unknown parameter {}", name)))?
            .get::<T>()
    }

    /// Read a declared parameter that may have no value
    pub fn value_opt<T: FromParameter>(&self, name: &str) -> WorkerResult<Option<T>> {
        self.get(name)
            .ok_or_else(|| WorkerError::invalid_argument(format!("unknown parameter {}", name)))?
            .get_opt::<T>()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BoundParameter> {
        self.parameters.iter()
    }
}

impl FromIterator<BoundParameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = BoundParameter>>(iter: I) -> Self {
        Self {
            parameters: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a BoundParameter;
    type IntoIter = std::slice::Iter<'a, BoundParameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for parameter in &self.parameters {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match &parameter.value {
                Some(value) => write!(f, "{}={}", parameter.name(), value)?,
                None => write!(f, "{}=<none>", parameter.name())?,
            }
        }
        Ok(())
    }
}

/// Reject any argument whose name matches no declared parameter
pub fn validate_argument_names(
    specs: &[ParameterSpec],
    arguments: &Arguments,
    task_name: &str,
) -> WorkerResult<()> {
    let mut invalid: Vec<&str> = arguments
        .keys()
        .filter(|key| !specs.iter().any(|spec| spec.matches(key)))
        .map(String::as_str)
        .collect();

    if !invalid.is_empty() {
        invalid.sort_unstable();
        return Err(WorkerError::invalid_argument(format!(
            "{} are invalid arguments for the task {}",
            invalid.join(", "),
            task_name
        )));
    }

    // Names match case-insensitively, so two spellings of one name are ambiguous
    for spec in specs {
        let mut spellings: Vec<&str> = arguments
            .keys()
            .filter(|key| spec.matches(key))
            .map(String::as_str)
            .collect();
        if spellings.len() > 1 {
            spellings.sort_unstable();
            return Err(WorkerError::invalid_argument(format!(
                "{} all name the argument {} of the task {}",
                spellings.join(", "),
                spec.name,
                task_name
            )));
        }
    }

    Ok(())
}

/// Bind every declared parameter against the caller's arguments
pub fn bind_arguments(
    specs: &[ParameterSpec],
    arguments: &Arguments,
    task_name: &str,
) -> WorkerResult<ParameterSet> {
    validate_argument_names(specs, arguments, task_name)?;

    specs
        .iter()
        .map(|spec| {
            let supplied = arguments
                .iter()
                .find(|(key, _)| spec.matches(key))
                .map(|(_, value)| value.clone());
            spec.bind(supplied).map_err(|e| match e {
                WorkerError::InvalidArgument(msg) => {
                    WorkerError::InvalidArgument(format!("{} (task {})", msg, task_name))
                }
                other => other,
            })
        })
        .collect()
}
