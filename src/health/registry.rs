//! Registry of probes: registration, lazy loading and isolated execution.
//!
//! Lifecycle: a fresh registry is unloaded. The first [`Registry::run`] loads
//! it by registering the configured default probes and then, when
//! autodiscovery is on, invoking every installed [`Extension`]. [`Registry::reset`]
//! returns to the unloaded state so the next run loads again.
//!
//! The registry does no internal locking. `register`, `load` and `reset` must
//! not race with `run`; callers sharing a registry serialize access themselves
//! (the HTTP layer keeps it behind a read-write lock and writes only to load or reset).

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;

use super::database::{DatabaseProbe, TcpConnector, DATABASE_PROBE_NAME};
use super::probe::{structural_name, Probe, ProbeError};
use super::result::{Outcome, ProbeResult};
use crate::config::{DatabaseConfig, HealthConfig};
use crate::error::SetupError;

/// Default probe references used when none are configured.
pub const DEFAULT_PROBES: &[&str] = &[DATABASE_PROBE_NAME];

/// Reported as `exception_class` for default references the catalog does not know.
pub const UNKNOWN_REFERENCE_KIND: &str = "UnknownReference";

/// Reported name for a probe whose `name()` panics.
pub const UNNAMED_PROBE: &str = "unnamed";

/// Builds a probe for a catalog reference.
pub type Factory = Arc<dyn Fn() -> Arc<dyn Probe> + Send + Sync>;

/// Named probe factories that default references resolve against.
#[derive(Clone, Default)]
pub struct Catalog {
    factories: HashMap<String, Factory>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in `database` probe.
    pub fn builtin(database: &DatabaseConfig) -> Self {
        let database = database.clone();
        let mut catalog = Self::new();
        catalog.insert(DATABASE_PROBE_NAME, move || {
            Arc::new(DatabaseProbe::new(TcpConnector::new(
                database.address.clone(),
                Duration::from_secs(database.timeout_seconds),
            ))) as Arc<dyn Probe>
        });
        catalog
    }

    pub fn insert<F>(&mut self, reference: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Probe> + Send + Sync + 'static,
    {
        self.factories.insert(reference.into(), Arc::new(factory));
    }

    pub fn get(&self, reference: &str) -> Option<&Factory> {
        self.factories.get(reference)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.factories.contains_key(reference)
    }
}

/// A discoverable unit that contributes probes when the registry loads.
#[derive(Clone)]
pub struct Extension {
    name: String,
    register: Arc<dyn Fn(&mut Registry) + Send + Sync>,
}

impl Extension {
    pub fn new<F>(name: impl Into<String>, register: F) -> Self
    where
        F: Fn(&mut Registry) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            register: Arc::new(register),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension").field("name", &self.name).finish()
    }
}

/// How registered probes are awaited during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// One after another, in registration order.
    #[default]
    Sequential,
    /// All at once; results still come back in registration order.
    Concurrent,
}

/// A registration: either a ready instance, or a type constructed fresh on every run.
#[derive(Clone)]
enum Entry {
    Instance(Arc<dyn Probe>),
    Type {
        name: String,
        make: fn() -> Box<dyn Probe>,
    },
}

impl Entry {
    fn name(&self) -> String {
        match self {
            Entry::Instance(probe) => {
                probe_name(probe.as_ref()).unwrap_or_else(|_| UNNAMED_PROBE.to_string())
            }
            Entry::Type { name, .. } => name.clone(),
        }
    }
}

/// Fails with the reference it was registered under; stands in for unresolvable defaults.
struct UnknownReference(String);

#[async_trait]
impl Probe for UnknownReference {
    fn name(&self) -> String {
        self.0.clone()
    }

    async fn check(&self) -> Result<Outcome, ProbeError> {
        Err(ProbeError::new(
            UNKNOWN_REFERENCE_KIND,
            format!("no probe registered under '{}'", self.0),
        ))
    }
}

/// Ordered collection of probes.
pub struct Registry {
    entries: Vec<Entry>,
    loaded: bool,
    defaults: Vec<String>,
    catalog: Catalog,
    autodiscover: bool,
    extensions: Vec<Extension>,
    mode: RunMode,
}

impl Registry {
    /// Unloaded registry using [`DEFAULT_PROBES`], autodiscovery on, sequential runs.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            entries: Vec::new(),
            loaded: false,
            defaults: DEFAULT_PROBES.iter().map(|s| s.to_string()).collect(),
            catalog,
            autodiscover: true,
            extensions: Vec::new(),
            mode: RunMode::Sequential,
        }
    }

    /// Builds a registry from configuration, rejecting default references the catalog cannot resolve.
    pub fn from_config(config: &HealthConfig, catalog: Catalog) -> Result<Self, SetupError> {
        let mut registry = Self::new(catalog).with_autodiscover(config.autodiscover);
        if let Some(probes) = &config.probes {
            registry = registry.with_defaults(probes.clone());
        }
        if config.concurrent {
            registry = registry.with_mode(RunMode::Concurrent);
        }

        if let Some(unknown) = registry
            .defaults
            .iter()
            .find(|reference| !registry.catalog.contains(reference))
        {
            return Err(SetupError::UnknownProbe(unknown.clone()));
        }

        Ok(registry)
    }

    /// Replaces the default probe references.
    pub fn with_defaults<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_autodiscover(mut self, enabled: bool) -> Self {
        self.autodiscover = enabled;
        self
    }

    /// Installs an extension to be invoked during autodiscovery.
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Registers a probe instance. Valid in any state.
    pub fn register<P: Probe + 'static>(&mut self, probe: P) {
        self.register_shared(Arc::new(probe));
    }

    /// Registers an already shared probe instance.
    pub fn register_shared(&mut self, probe: Arc<dyn Probe>) {
        self.entries.push(Entry::Instance(probe));
    }

    /// Registers a probe type; a fresh value is built with `Default` on every run.
    pub fn register_type<T: Probe + Default + 'static>(&mut self) {
        fn make<T: Probe + Default + 'static>() -> Box<dyn Probe> {
            Box::new(T::default())
        }
        self.entries.push(Entry::Type {
            name: structural_name(std::any::type_name::<T>()),
            make: make::<T>,
        });
    }

    /// Registers the default probes, then runs extensions if autodiscovery is on.
    ///
    /// Not guarded: loading twice without [`Registry::reset`] registers everything
    /// twice. [`Registry::run`] loads on its own when needed.
    pub fn load(&mut self) {
        let defaults: Vec<(String, Option<Factory>)> = self
            .defaults
            .iter()
            .map(|reference| (reference.clone(), self.catalog.get(reference).cloned()))
            .collect();
        for (reference, factory) in defaults {
            match factory {
                Some(factory) => self.register_shared(factory()),
                None => {
                    tracing::warn!(reference = %reference, "Unknown default probe reference");
                    self.register(UnknownReference(reference));
                }
            }
        }

        if self.autodiscover {
            let extensions = self.extensions.clone();
            for extension in &extensions {
                tracing::debug!(extension = %extension.name(), "Loading probes from extension");
                (extension.register)(self);
            }
        }

        self.loaded = true;
        tracing::info!(probes = self.entries.len(), "Health probes loaded");
    }

    /// Clears every registration and marks the registry unloaded.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the registered probes, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(Entry::name).collect()
    }

    /// Runs every probe, loading first if needed.
    ///
    /// Returns one result per registration, in registration order. A probe that
    /// errors or panics yields a failed result and never affects the others.
    pub async fn run(&mut self) -> Vec<ProbeResult> {
        if !self.loaded {
            self.load();
        }
        self.run_loaded().await
    }

    /// Runs the probes registered so far without loading.
    ///
    /// Takes `&self`, so callers holding a loaded registry behind a read lock
    /// can run it from several tasks at once.
    pub async fn run_loaded(&self) -> Vec<ProbeResult> {
        match self.mode {
            RunMode::Sequential => {
                let mut results = Vec::with_capacity(self.entries.len());
                for entry in &self.entries {
                    results.push(invoke(entry).await);
                }
                results
            }
            RunMode::Concurrent => join_all(self.entries.iter().map(invoke)).await,
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("probes", &self.names())
            .field("loaded", &self.loaded)
            .field("defaults", &self.defaults)
            .field("autodiscover", &self.autodiscover)
            .field("extensions", &self.extensions)
            .field("mode", &self.mode)
            .finish()
    }
}

async fn invoke(entry: &Entry) -> ProbeResult {
    match entry {
        Entry::Instance(probe) => execute(probe.as_ref()).await,
        Entry::Type { name, make } => match catch_unwind(*make) {
            Ok(probe) => execute(probe.as_ref()).await,
            Err(payload) => failure(name.clone(), ProbeError::from_panic(payload)),
        },
    }
}

/// `Probe::name`, with a panic turned into an error.
fn probe_name(probe: &dyn Probe) -> Result<String, ProbeError> {
    catch_unwind(AssertUnwindSafe(|| probe.name())).map_err(ProbeError::from_panic)
}

async fn execute(probe: &dyn Probe) -> ProbeResult {
    let start = Instant::now();
    let result = match probe_name(probe) {
        Ok(name) => match AssertUnwindSafe(probe.check()).catch_unwind().await {
            Ok(Ok(Outcome::Status(status))) => ProbeResult::new(name, status),
            Ok(Ok(Outcome::Result(result))) => result,
            Ok(Err(err)) => failure(name, err),
            Err(payload) => failure(name, ProbeError::from_panic(payload)),
        },
        Err(err) => failure(UNNAMED_PROBE.to_string(), err),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if result.status() {
        tracing::debug!(probe = %result.name(), elapsed_ms, "Probe passed");
    } else {
        tracing::warn!(probe = %result.name(), elapsed_ms, extras = ?result.extras(), "Probe failed");
    }
    result
}

fn failure(name: String, err: ProbeError) -> ProbeResult {
    ProbeResult::failed(name)
        .with_extra("exception", err.message())
        .with_extra("exception_class", err.kind())
}
