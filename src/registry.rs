//! Instance registry: the fixed set of configured automation targets for a
//! run, the source of truth for what *should* be running.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::schema::InstanceEntry;
use crate::error::ConfigError;

/// One configured automation target. Identity is the name, unique within a
/// registry; immutable once loaded.
#[derive(Debug, Clone)]
pub struct Instance {
    pub name: String,
    /// adb device address, e.g. `127.0.0.1:5555` or `emulator-5554`.
    pub device: String,
    /// Bot config forwarded to the worker.
    pub config: PathBuf,
    /// Extra launch arguments, appended verbatim after the standard flags.
    pub extra_args: Vec<String>,
}

/// Where the registry's instances come from.
#[derive(Debug)]
pub enum RegistrySource {
    /// `[[instances]]` entries from the instances file.
    Entries(Vec<InstanceEntry>),
    /// CLI-supplied device addresses sharing one worker config.
    Devices(Vec<String>),
}

/// Fallbacks applied to entries that omit optional fields.
#[derive(Debug, Clone)]
pub struct InstanceDefaults {
    pub name_prefix: String,
    pub config: PathBuf,
    pub extra_args: Vec<String>,
}

/// The instance set for a run. Iteration order is load order, which is also
/// the display order of the dashboard table.
#[derive(Debug, Clone)]
pub struct Registry {
    instances: Vec<Instance>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Resolves a source into a validated registry.
    ///
    /// Fails when a device address is missing or empty, when names collide
    /// (explicit or auto-generated), or when the source yields no instances.
    pub fn load(
        source: RegistrySource,
        defaults: &InstanceDefaults,
    ) -> Result<Registry, ConfigError> {
        let instances = match source {
            RegistrySource::Entries(entries) => resolve_entries(entries, defaults)?,
            RegistrySource::Devices(devices) => resolve_devices(devices, defaults)?,
        };

        if instances.is_empty() {
            return Err(ConfigError::EmptyRegistry);
        }

        let mut by_name = HashMap::new();
        for (index, instance) in instances.iter().enumerate() {
            if by_name.insert(instance.name.clone(), index).is_some() {
                return Err(ConfigError::DuplicateName {
                    name: instance.name.clone(),
                });
            }
        }

        Ok(Registry { instances, by_name })
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.by_name.get(name).map(|&index| &self.instances[index])
    }

    /// Instances in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// Instance names in load order.
    pub fn names(&self) -> Vec<String> {
        self.instances.iter().map(|i| i.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn resolve_entries(
    entries: Vec<InstanceEntry>,
    defaults: &InstanceDefaults,
) -> Result<Vec<Instance>, ConfigError> {
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let name = entry
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| auto_name(&defaults.name_prefix, index));
            let device = entry
                .device
                .filter(|d| !d.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingDevice { name: name.clone() })?;
            Ok(Instance {
                name,
                device,
                config: entry.config.unwrap_or_else(|| defaults.config.clone()),
                extra_args: entry
                    .extra_args
                    .unwrap_or_else(|| defaults.extra_args.clone()),
            })
        })
        .collect()
}

fn resolve_devices(
    devices: Vec<String>,
    defaults: &InstanceDefaults,
) -> Result<Vec<Instance>, ConfigError> {
    devices
        .into_iter()
        .enumerate()
        .map(|(index, device)| {
            let name = auto_name(&defaults.name_prefix, index);
            if device.trim().is_empty() {
                return Err(ConfigError::MissingDevice { name });
            }
            Ok(Instance {
                name,
                device,
                config: defaults.config.clone(),
                extra_args: defaults.extra_args.clone(),
            })
        })
        .collect()
}

/// Position-based name for entries without an explicit one: `bot-01`, ...
fn auto_name(prefix: &str, index: usize) -> String {
    format!("{}-{:02}", prefix, index + 1)
}
