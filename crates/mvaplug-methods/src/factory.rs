//! Host-side method factory keyed by method name

use crate::method::{Method, MethodArgs};
use mvaplug_core::{DataSetInfo, Error, Result};
use std::collections::HashMap;
use tracing::info;

/// Constructor stored in a registration table
pub type MethodCreator = Box<dyn Fn(MethodArgs) -> Result<Box<dyn Method>> + Send + Sync>;

/// Registration table from method name to constructor
#[derive(Default)]
pub struct MethodFactory {
    creators: HashMap<String, MethodCreator>,
}

impl MethodFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor; a name can only be registered once
    pub fn register(&mut self, name: impl Into<String>, creator: MethodCreator) -> Result<()> {
        let name = name.into();
        if self.creators.contains_key(&name) {
            return Err(Error::DuplicateRegistration(name));
        }
        info!("Registered method '{}'", name);
        self.creators.insert(name, creator);
        Ok(())
    }

    /// Construct method `name` with the host's four arguments
    pub fn create(
        &self,
        name: &str,
        job: &str,
        title: &str,
        dataset: DataSetInfo,
        option: &str,
    ) -> Result<Box<dyn Method>> {
        let creator = self
            .creators
            .get(name)
            .ok_or_else(|| Error::lookup(format!("method '{}' is not registered", name)))?;
        creator(MethodArgs::from_host(job, title, dataset, option))
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.creators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
