//! Serializable view of a parsed command line.

use std::collections::BTreeMap;
use std::str::FromStr;

use cmdtree_core::{Application, FlagArg, Value};
use serde::Serialize;

use crate::error::{CliError, Result};

/// Output encoding for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

impl OutputFormat {
    pub fn render<T: Serialize>(self, value: &T) -> Result<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(value)?,
            Self::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

/// A bound value: a string, or a list for cumulative elements.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    One(String),
    Many(Vec<String>),
}

impl From<&Value> for ReportValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::One(scalar) => Self::One(scalar.to_string()),
            Value::Many(_) => Self::Many(value.strings()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementReport {
    pub value: ReportValue,
    pub set_by_user: bool,
}

impl ElementReport {
    fn of(element: &dyn FlagArg) -> Self {
        Self {
            value: ReportValue::from(&element.value()),
            set_by_user: element.is_set_by_user(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgReport {
    pub name: String,
    #[serde(flatten)]
    pub element: ElementReport,
}

/// What a parse resolved to: the command plus every in-scope flag and argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseReport {
    pub command: String,
    pub flags: BTreeMap<String, ElementReport>,
    pub args: Vec<ArgReport>,
}

impl ParseReport {
    pub fn from_app(app: &Application) -> Self {
        let flags = app
            .in_scope_flags()
            .into_iter()
            .map(|flag| (flag.name().to_string(), ElementReport::of(flag)))
            .collect();
        let args = app
            .in_scope_args()
            .into_iter()
            .map(|arg| ArgReport {
                name: arg.name().to_string(),
                element: ElementReport::of(arg),
            })
            .collect();
        Self {
            command: app.full_command(),
            flags,
            args,
        }
    }
}
