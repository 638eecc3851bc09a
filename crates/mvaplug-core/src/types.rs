//! Host data model shared by all methods

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Replace every character that is not valid in an identifier with `_`.
///
/// Variable expressions such as `log(pt)` or `jet[0].eta` are referred to
/// by this normalized form everywhere a plain name is needed.
pub fn internal_name(expression: &str) -> String {
    static NON_IDENT: OnceLock<Regex> = OnceLock::new();
    let re = NON_IDENT.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("constant pattern"));
    re.replace_all(expression.trim(), "_").into_owned()
}

/// One declared input variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableInfo {
    /// Expression as declared by the user
    pub expression: String,

    /// Normalized name used for lookups
    pub internal_name: String,
}

impl VariableInfo {
    /// Create a variable from its expression
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let internal_name = internal_name(&expression);
        Self {
            expression,
            internal_name,
        }
    }
}

/// Dataset description handed to every method at construction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSetInfo {
    /// Dataset name
    pub name: String,

    /// Input variables in declaration order
    pub variables: Vec<VariableInfo>,
}

impl DataSetInfo {
    /// Create a dataset description from variable expressions
    pub fn new<I, S>(name: impl Into<String>, expressions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variables: expressions.into_iter().map(VariableInfo::new).collect(),
        }
    }

    /// Number of declared input variables
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Normalized name of variable `index`
    pub fn internal_name(&self, index: usize) -> Option<&str> {
        self.variables.get(index).map(|v| v.internal_name.as_str())
    }

    /// Index of the variable whose normalized name equals `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.internal_name == name)
    }

    /// True if the event belongs to the signal class
    pub fn is_signal(&self, event: &Event) -> bool {
        event.class == EventClass::Signal
    }
}

/// Truth class of a training event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    Signal,
    Background,
}

/// A single event: one value per declared variable plus a weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Variable values in declaration order
    pub values: Vec<f32>,

    /// Event weight
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Truth class (ignored at evaluation time)
    pub class: EventClass,
}

impl Event {
    /// Create a unit-weight event
    pub fn new(values: Vec<f32>, class: EventClass) -> Self {
        Self {
            values,
            weight: default_weight(),
            class,
        }
    }

    /// Set the event weight
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Value of variable `index`, if present
    pub fn value(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }
}

fn default_weight() -> f64 {
    1.0
}

/// Kind of analysis a method is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Classification,
    Regression,
    Multiclass,
}
