use std::{collections::BTreeMap, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use shroud_lattice::{APPROX_LIGHT, APPROX_STANDARD, EXACT_LIGHT, EXACT_STANDARD, Params, Scheme};

use crate::{Error, Result};

/// The preset protocols use when a request doesn't name one.
pub const DEFAULT_PRESET: &str = "light";

/// The prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "SHROUD_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Runtime configuration for an [`Engine`](crate::Engine).
pub struct EngineConfig {
    /// When `false`, every entry point fails with [`Error::Unavailable`].
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// The maximum number of payloads held at once. The least recently used payload is evicted
    /// when a new one would exceed this.
    #[serde(default = "default_payload_capacity")]
    pub payload_capacity: usize,

    /// Share key material between contexts with the same scheme, preset and key options.
    #[serde(default = "default_pool_contexts")]
    pub pool_contexts: bool,

    /// The named parameter sets contexts can be generated with.
    #[serde(default)]
    pub presets: Presets,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Named [`Params`] for each scheme.
pub struct Presets {
    /// Presets for [`Scheme::ApproxReal`].
    #[serde(default = "default_approx_presets")]
    pub approx_real: BTreeMap<String, Params>,

    /// Presets for [`Scheme::ExactInteger`].
    #[serde(default = "default_exact_presets")]
    pub exact_integer: BTreeMap<String, Params>,
}

impl Default for Presets {
    fn default() -> Self {
        Self {
            approx_real: default_approx_presets(),
            exact_integer: default_exact_presets(),
        }
    }
}

impl Presets {
    /// The presets for `scheme`.
    pub fn for_scheme(&self, scheme: Scheme) -> &BTreeMap<String, Params> {
        match scheme {
            Scheme::ApproxReal => &self.approx_real,
            Scheme::ExactInteger => &self.exact_integer,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_payload_capacity() -> usize {
    4096
}

fn default_pool_contexts() -> bool {
    true
}

fn default_approx_presets() -> BTreeMap<String, Params> {
    BTreeMap::from([
        ("light".to_owned(), APPROX_LIGHT),
        ("standard".to_owned(), APPROX_STANDARD),
    ])
}

fn default_exact_presets() -> BTreeMap<String, Params> {
    BTreeMap::from([
        ("light".to_owned(), EXACT_LIGHT),
        ("standard".to_owned(), EXACT_STANDARD),
    ])
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            payload_capacity: default_payload_capacity(),
            pool_contexts: default_pool_contexts(),
            presets: Presets::default(),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from the defaults, then the TOML file at `path` if given, then
    /// `SHROUD_`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }

            figment = figment.merge(Toml::file(path));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Loads the configuration from the defaults overridden by a TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Checks the payload capacity and every preset.
    pub fn validate(&self) -> Result<()> {
        if self.payload_capacity == 0 {
            return Err(Error::Config("payload_capacity must be positive".to_owned()));
        }

        for scheme in [Scheme::ApproxReal, Scheme::ExactInteger] {
            let presets = self.presets.for_scheme(scheme);

            if !presets.contains_key(DEFAULT_PRESET) {
                return Err(Error::Config(format!(
                    "{scheme} has no \"{DEFAULT_PRESET}\" preset"
                )));
            }

            for (name, params) in presets {
                if params.scheme != scheme {
                    return Err(Error::Config(format!(
                        "{scheme} preset \"{name}\" has scheme {}",
                        params.scheme
                    )));
                }

                params
                    .validate()
                    .map_err(|e| Error::Config(format!("{scheme} preset \"{name}\": {e}")))?;
            }
        }

        Ok(())
    }

    /// Looks up the named preset for `scheme`.
    pub fn preset(&self, scheme: Scheme, name: &str) -> Result<&Params> {
        self.presets
            .for_scheme(scheme)
            .get(name)
            .ok_or_else(|| Error::invalid_input(format!("unknown {scheme} preset \"{name}\"")))
    }
}
