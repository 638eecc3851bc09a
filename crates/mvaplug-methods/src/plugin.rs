//! Plugin registry and resolver
//!
//! Plugins are registered up front in an explicit table keyed by
//! `(family, name)`. The resolver is itself registered in the host
//! [`MethodFactory`] under [`PLUGINS_METHOD`]; when the host asks for it,
//! the resolver finds the real handler, loads it once, and forwards the
//! construction arguments unchanged.

use crate::factory::{MethodCreator, MethodFactory};
use crate::method::{Method, MethodArgs};
use mvaplug_core::{DataSetInfo, Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Family every method plugin is registered under
pub const METHOD_FAMILY: &str = "MethodBase";

/// Name the resolver is registered under in the host factory
pub const PLUGINS_METHOD: &str = "Plugins";

/// One-time initialization run before a handler's first use
pub type PluginLoader = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Extract the method name from a weight file named
/// `<anything>_<METHOD>.<extension>`: the text after the first `_` and
/// before the last `.`.
pub fn infer_method_name(weight_file: &str) -> Result<String> {
    let path = weight_file.trim();
    let underscore = path
        .find('_')
        .ok_or_else(|| Error::lookup(format!("cannot infer method name from '{}': no '_'", path)))?;
    let dot = path
        .rfind('.')
        .ok_or_else(|| Error::lookup(format!("cannot infer method name from '{}': no '.'", path)))?;

    if dot <= underscore {
        return Err(Error::lookup(format!(
            "cannot infer method name from '{}': no text between '_' and '.'",
            path
        )));
    }

    let name = &path[underscore + 1..dot];
    if name.is_empty() {
        return Err(Error::lookup(format!(
            "cannot infer method name from '{}': empty name",
            path
        )));
    }
    Ok(name.to_string())
}

/// A registered plugin: constructor plus optional lazy loader
pub struct PluginHandler {
    family: String,
    name: String,
    creator: MethodCreator,
    loader: Option<PluginLoader>,
    loaded: Mutex<bool>,
}

impl PluginHandler {
    /// Create a handler that needs no loading
    pub fn new(family: impl Into<String>, name: impl Into<String>, creator: MethodCreator) -> Self {
        Self {
            family: family.into(),
            name: name.into(),
            creator,
            loader: None,
            loaded: Mutex::new(false),
        }
    }

    /// Run `loader` once before the first construction
    pub fn with_loader(mut self, loader: PluginLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Handler family
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Handler name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the plugin. Loading an already loaded plugin does nothing; a
    /// failed load is reported and retried on the next call.
    pub fn load(&self) -> Result<()> {
        let mut loaded = self.loaded.lock();
        if *loaded {
            return Ok(());
        }
        if let Some(loader) = &self.loader {
            loader().map_err(|e| Error::PluginLoad {
                name: self.name.clone(),
                message: e.to_string(),
            })?;
        }
        debug!("Loaded plugin {}::{}", self.family, self.name);
        *loaded = true;
        Ok(())
    }

    /// Whether `load` has succeeded
    pub fn is_loaded(&self) -> bool {
        *self.loaded.lock()
    }

    /// Load if needed, then construct
    pub fn exec(&self, args: MethodArgs) -> Result<Box<dyn Method>> {
        self.load()?;
        (self.creator)(args)
    }
}

/// Table of plugin handlers keyed by `(family, name)`
#[derive(Default)]
pub struct PluginRegistry {
    handlers: HashMap<(String, String), Arc<PluginHandler>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler; a `(family, name)` pair can only be registered once
    pub fn register(&mut self, handler: PluginHandler) -> Result<()> {
        let key = (handler.family.clone(), handler.name.clone());
        if self.handlers.contains_key(&key) {
            return Err(Error::DuplicateRegistration(format!("{}::{}", key.0, key.1)));
        }
        info!("Registered plugin {}::{}", key.0, key.1);
        self.handlers.insert(key, Arc::new(handler));
        Ok(())
    }

    /// Find the handler for `name` within `family`
    pub fn find(&self, family: &str, name: &str) -> Option<Arc<PluginHandler>> {
        self.handlers
            .get(&(family.to_string(), name.to_string()))
            .cloned()
    }

    /// Handler names registered under `family`, sorted
    pub fn names(&self, family: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .filter(|(f, _)| f == family)
            .map(|(_, n)| n.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Resolves plugin methods by name and constructs them
#[derive(Clone)]
pub struct PluginResolver {
    registry: Arc<PluginRegistry>,
}

impl PluginResolver {
    /// Create a resolver over a populated registry
    pub fn new(registry: PluginRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Lookup key for the given construction shape: the inferred name for
    /// reloads, the method title for training.
    pub fn lookup_name(args: &MethodArgs) -> Result<String> {
        match args {
            MethodArgs::Expert { weight_file, .. } => infer_method_name(weight_file),
            MethodArgs::Teacher { title, .. } => Ok(title.clone()),
        }
    }

    /// Find, load and construct the requested plugin
    pub fn resolve(&self, args: MethodArgs) -> Result<Box<dyn Method>> {
        let name = Self::lookup_name(&args)?;

        let handler = self.registry.find(METHOD_FAMILY, &name).ok_or_else(|| {
            error!("Couldn't find plugin handler for {} and {}", METHOD_FAMILY, name);
            Error::PluginNotFound {
                family: METHOD_FAMILY.to_string(),
                name: name.clone(),
            }
        })?;

        debug!("Resolved plugin '{}' ({:?} construction)", name, args.mode());
        handler.exec(args).map_err(|e| {
            error!("Plugin '{}' failed to construct: {}", name, e);
            e
        })
    }

    /// Resolve from the host's four construction arguments
    pub fn resolve_host(
        &self,
        job: &str,
        title: &str,
        dataset: DataSetInfo,
        option: &str,
    ) -> Result<Box<dyn Method>> {
        self.resolve(MethodArgs::from_host(job, title, dataset, option))
    }

    /// Register this resolver in the host factory under [`PLUGINS_METHOD`]
    pub fn install(&self, factory: &mut MethodFactory) -> Result<()> {
        let resolver = self.clone();
        factory.register(PLUGINS_METHOD, Box::new(move |args| resolver.resolve(args)))
    }
}
