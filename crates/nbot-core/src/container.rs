//! Name-keyed dependency container.
//!
//! Entries are either plain values or singleton factories. A factory declares the
//! names it depends on; those are resolved (recursively, with cycle detection)
//! before the factory runs, and the factory can only read what it declared.
//! Resolution hands out clones of the stored value, so registering `Arc`s keeps
//! every consumer on the same instance.

use std::{
    any::{type_name, Any},
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::errors::{ContainerError, Error};

/// Well-known entry names shared by the bootstrap and controllers.
pub mod names {
    /// `Arc<dyn BotApi>`, the outbound-wrapped client. Registered by the orchestrator.
    pub const API: &str = "api";
    pub const CONFIG: &str = "config";
    pub const LOGGER: &str = "logger";
    pub const CACHE: &str = "cache";
    pub const PERSISTENCE: &str = "persistence";
    pub const LOCALE: &str = "locale";
    pub const TEXT_MODEL: &str = "text_model";
}

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Deps) -> crate::Result<Instance> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifetime {
    Value,
    Singleton,
}

/// One container entry.
pub struct Registration {
    deps: Vec<String>,
    kind: Kind,
}

enum Kind {
    Value(Instance),
    Singleton {
        factory: Factory,
        cell: Mutex<Option<Instance>>,
    },
}

impl Registration {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            deps: Vec::new(),
            kind: Kind::Value(Arc::new(value)),
        }
    }

    /// Lazily constructed singleton. `deps` are resolved before `factory` runs.
    pub fn singleton<T, F>(deps: &[&str], factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Deps) -> crate::Result<T> + Send + Sync + 'static,
    {
        Self {
            deps: deps.iter().map(|d| d.to_string()).collect(),
            kind: Kind::Singleton {
                factory: Box::new(move |deps| Ok(Arc::new(factory(deps)?) as Instance)),
                cell: Mutex::new(None),
            },
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        match self.kind {
            Kind::Value(_) => Lifetime::Value,
            Kind::Singleton { .. } => Lifetime::Singleton,
        }
    }
}

/// Resolved dependencies handed to a factory.
pub struct Deps {
    owner: String,
    values: HashMap<String, Instance>,
}

impl Deps {
    pub fn get<T: Any + Clone>(&self, name: &str) -> Result<T, ContainerError> {
        let instance = self
            .values
            .get(name)
            .ok_or_else(|| ContainerError::Undeclared {
                name: name.to_string(),
                owner: self.owner.clone(),
            })?;
        downcast(name, instance)
    }
}

#[derive(Default)]
pub struct Container {
    entries: HashMap<String, Registration>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entries; an existing name is overwritten.
    pub fn register<N: Into<String>>(
        &mut self,
        entries: impl IntoIterator<Item = (N, Registration)>,
    ) -> &mut Self {
        for (name, registration) in entries {
            let name = name.into();
            if self.entries.insert(name.clone(), registration).is_some() {
                tracing::debug!(name = %name, "container entry overwritten");
            }
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolve `name` as a `T`, constructing it on first access.
    pub fn resolve<T: Any + Clone>(&self, name: &str) -> Result<T, ContainerError> {
        let instance = self.resolve_instance(name, None, &mut Vec::new())?;
        downcast(name, &instance)
    }

    fn resolve_instance(
        &self,
        name: &str,
        required_by: Option<&str>,
        stack: &mut Vec<String>,
    ) -> Result<Instance, ContainerError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| ContainerError::Unregistered {
                name: name.to_string(),
                required_by: required_by.map(str::to_string),
            })?;

        let (factory, cell) = match &entry.kind {
            Kind::Value(v) => return Ok(v.clone()),
            Kind::Singleton { factory, cell } => (factory, cell),
        };

        if let Some(existing) = lock(cell).as_ref() {
            return Ok(existing.clone());
        }

        if stack.iter().any(|s| s == name) {
            let mut chain = stack.clone();
            chain.push(name.to_string());
            return Err(ContainerError::Cycle { chain });
        }

        stack.push(name.to_string());
        let mut values = HashMap::with_capacity(entry.deps.len());
        for dep in &entry.deps {
            match self.resolve_instance(dep, Some(name), stack) {
                Ok(v) => {
                    values.insert(dep.clone(), v);
                }
                Err(e) => {
                    stack.pop();
                    return Err(e);
                }
            }
        }
        stack.pop();

        // Construct under the entry lock so concurrent first access builds once.
        let mut slot = lock(cell);
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }
        let deps = Deps {
            owner: name.to_string(),
            values,
        };
        let instance = factory(&deps).map_err(|e| match e {
            Error::Container(inner) => inner,
            other => ContainerError::Factory {
                name: name.to_string(),
                reason: other.to_string(),
            },
        })?;
        *slot = Some(instance.clone());
        Ok(instance)
    }
}

fn lock(cell: &Mutex<Option<Instance>>) -> std::sync::MutexGuard<'_, Option<Instance>> {
    // A panicking factory leaves the slot empty; the data is still consistent.
    cell.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn downcast<T: Any + Clone>(name: &str, instance: &Instance) -> Result<T, ContainerError> {
    instance
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ContainerError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}
