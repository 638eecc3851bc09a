//! Per-variable preprocessing directives
//!
//! Two encodings are accepted, never both at once:
//! - positional: `12.1.2,0,7` gives one directive per declared variable,
//!   `0` meaning "no individual preprocessing";
//! - name-keyed: `pt=5.3,eta=19` matches variables by normalized name.
//!
//! Each directive is `<flag>.<param>.<param>...`.

use crate::engine::TeacherEngine;
use mvaplug_core::{internal_name, DataSetInfo, Error, Result};
use tracing::{debug, info, warn};

/// Preprocessing flag plus its ordered parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub flag: i32,
    pub parameters: Vec<i32>,
}

impl Directive {
    /// Parse `<flag>.<param>...`; a zero flag yields `None`
    pub fn parse(token: &str) -> Result<Option<Self>> {
        let mut parts = token.trim().split('.');
        let flag = parse_int(parts.next().unwrap_or_default(), token)?;
        if flag == 0 {
            return Ok(None);
        }
        let parameters = parts
            .map(|p| parse_int(p, token))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self { flag, parameters }))
    }

    /// Space separated flag and parameters, as the engine's reports expect
    pub fn render(&self) -> String {
        std::iter::once(self.flag)
            .chain(self.parameters.iter().copied())
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_int(raw: &str, token: &str) -> Result<i32> {
    raw.trim().parse().map_err(|_| {
        Error::config(format!(
            "invalid preprocessing directive '{}': '{}' is not an integer",
            token, raw
        ))
    })
}

/// Directives for every declared variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessingPlan {
    directives: Vec<Option<Directive>>,
    unresolved: Vec<String>,
}

impl PreprocessingPlan {
    /// A plan without individual directives
    pub fn empty(n_variables: usize) -> Self {
        Self {
            directives: vec![None; n_variables],
            unresolved: Vec::new(),
        }
    }

    /// Build a plan from the two option strings.
    ///
    /// Setting both strings is a configuration error.
    pub fn from_options(by_index: &str, by_name: &str, dataset: &DataSetInfo) -> Result<Self> {
        match (by_index.trim().is_empty(), by_name.trim().is_empty()) {
            (false, false) => Err(Error::config(
                "individual preprocessing given both by index and by name; set only one",
            )),
            (false, true) => Self::parse_positional(by_index, dataset),
            (true, false) => Self::parse_by_name(by_name, dataset),
            (true, true) => Ok(Self::empty(dataset.n_variables())),
        }
    }

    /// Parse the positional encoding; the entry count must equal the
    /// number of declared variables.
    pub fn parse_positional(list: &str, dataset: &DataSetInfo) -> Result<Self> {
        let tokens: Vec<&str> = list.trim().split(',').map(str::trim).collect();
        let n_variables = dataset.n_variables();

        if tokens.len() != n_variables {
            return Err(Error::config(format!(
                "{} preprocessing flag(s) set, but there are {} variables; \
                 use flag 0 for variables without individual preprocessing",
                tokens.len(),
                n_variables
            )));
        }

        let mut plan = Self::empty(n_variables);
        for (index, token) in tokens.into_iter().enumerate() {
            let name = dataset.internal_name(index).unwrap_or_default();
            match Directive::parse(token)? {
                Some(directive) => {
                    info!("Preprocessing for variable {} is set to {}", name, directive.render());
                    plan.directives[index] = Some(directive);
                }
                None => debug!("No individual preprocessing for variable {}", name),
            }
        }
        Ok(plan)
    }

    /// Parse the name-keyed encoding; unknown names are skipped with a warning
    pub fn parse_by_name(list: &str, dataset: &DataSetInfo) -> Result<Self> {
        let mut plan = Self::empty(dataset.n_variables());

        for entry in list.trim().split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry.split_once('=').ok_or_else(|| {
                Error::config(format!(
                    "preprocessing entry '{}' must look like <variable>=<flag>",
                    entry
                ))
            })?;

            let Some(directive) = Directive::parse(value)? else {
                continue;
            };

            let normalized = internal_name(name);
            match dataset.index_of(&normalized) {
                Some(index) => {
                    info!(
                        "Preprocessing for variable {} (#{}, internal {}) is set to {}",
                        name.trim(),
                        index,
                        normalized,
                        directive.render()
                    );
                    plan.directives[index] = Some(directive);
                }
                None => {
                    warn!("{} not found in variable list, directive ignored", name.trim());
                    plan.unresolved.push(name.trim().to_string());
                }
            }
        }
        Ok(plan)
    }

    /// Directive for variable `index`
    pub fn get(&self, index: usize) -> Option<&Directive> {
        self.directives.get(index).and_then(Option::as_ref)
    }

    /// Names from the name-keyed encoding that matched no variable
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    /// Number of variables with an individual directive
    pub fn count(&self) -> usize {
        self.directives.iter().filter(|d| d.is_some()).count()
    }

    /// Push every directive to the engine
    pub fn apply(&self, engine: &mut dyn TeacherEngine) {
        for (index, directive) in self.directives.iter().enumerate() {
            let Some(directive) = directive else { continue };
            engine.set_individual_preprocessing(index, directive.flag);
            for (position, value) in directive.parameters.iter().enumerate() {
                engine.set_individual_parameter(index, position, *value);
            }
        }
    }

    /// One label per variable: internal name followed by its directive
    pub fn labels(&self, dataset: &DataSetInfo) -> Vec<String> {
        dataset
            .variables
            .iter()
            .enumerate()
            .map(|(index, var)| match self.get(index) {
                Some(directive) => format!("{} {}", var.internal_name, directive.render()),
                None => var.internal_name.clone(),
            })
            .collect()
    }
}
