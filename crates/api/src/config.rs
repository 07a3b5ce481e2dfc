//! Types for use when configuring hashvend modules.

use crate::*;
use std::sync::Mutex;

/// helper transcode function
fn tc<S: serde::Serialize, D: serde::de::DeserializeOwned>(
    s: &S,
) -> VendResult<D> {
    serde_json::from_value(
        serde_json::to_value(s)
            .map_err(|e| VendError::other_src("encode", e))?,
    )
    .map_err(|e| VendError::other_src("decode", e))
}

/// Denotes a type used to configure a specific hashvend module.
///
/// A module config is a struct with a single field named after the module
/// (e.g. `coreFetch`) holding the actual parameters, so that several module
/// configs can share one [Config] without their properties colliding.
///
/// The deserialization of a module config should be tolerant of missing
/// properties, falling back to sane defaults.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

/// Hashvend configuration.
#[derive(Debug, Default)]
pub struct Config(Mutex<serde_json::Map<String, serde_json::Value>>);

impl serde::Serialize for Config {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.lock().unwrap().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let map = serde_json::Map::deserialize(deserializer)?;
        Ok(Self(Mutex::new(map)))
    }
}

impl Config {
    /// When generating a default configuration, module factories call
    /// this to add their default parameters. Refuses to overwrite a module
    /// that is already configured.
    pub fn add_default_module_config<M: ModConfig>(&self) -> VendResult<()> {
        let value = module_object(&M::default())?;
        let mut lock = self.0.lock().unwrap();
        if let Some(name) = value.keys().find(|k| lock.contains_key(*k)) {
            return Err(VendError::other(format!(
                "Refusing to overwrite conflicting module name: {name}"
            )));
        }
        lock.extend(value);
        Ok(())
    }

    /// Set (or replace) the configuration of a module.
    pub fn set_module_config<M: ModConfig>(&self, config: &M) -> VendResult<()> {
        let value = module_object(config)?;
        self.0.lock().unwrap().extend(value);
        Ok(())
    }

    /// Extract a module config. Properties not present in this config take
    /// the module's defaults, properties of other modules are ignored.
    pub fn get_module_config<M: ModConfig>(&self) -> VendResult<M> {
        let lock = self.0.lock().unwrap();
        tc(&*lock)
    }
}

fn module_object<M: ModConfig>(
    config: &M,
) -> VendResult<serde_json::Map<String, serde_json::Value>> {
    match tc::<M, serde_json::Value>(config)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(VendError::other(format!(
            "module config must serialize to an object, got: {other}"
        ))),
    }
}
