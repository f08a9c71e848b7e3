//! Layered configuration loading and querying.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::Arc,
};

use figment::{
    error::Kind,
    providers::{Env, Serialized},
    Figment, Provider,
};
use serde::Deserialize;
use snafu::Snafu;
use summit_error::GenericError;
use tracing::debug;

mod provider;
use self::provider::{FileFormat, FileProvider};

/// Configuration error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ConfigurationError {
    /// The environment variable prefix was empty.
    #[snafu(display("environment variable prefix must not be empty"))]
    EmptyPrefix,

    /// The configuration file's format could not be determined from its extension.
    #[snafu(display("unsupported configuration file '{}' (expected a .yaml, .yml, or .json extension)", path.display()))]
    UnsupportedFileFormat {
        /// Path to the configuration file.
        path: PathBuf,
    },

    /// A requested key was not present in any source.
    #[snafu(display("configuration key '{}' is not set. {}", field, help_text))]
    MissingField {
        /// Suggestion listing every spelling of the key that would satisfy the lookup.
        help_text: String,

        /// Key that was requested.
        field: Cow<'static, str>,
    },

    /// A requested key held a value of the wrong type.
    #[snafu(display("configuration key '{}' should be {}, found {}", field, expected_ty, actual_ty))]
    InvalidFieldType {
        /// Period-separated path to the key.
        field: String,

        /// Expected type.
        expected_ty: String,

        /// Type that was found.
        actual_ty: String,
    },

    /// Any other failure while loading or querying configuration.
    #[snafu(display("failed to load or query configuration"))]
    Generic { source: GenericError },
}

impl From<figment::Error> for ConfigurationError {
    fn from(e: figment::Error) -> Self {
        convert_figment_error(&[], e)
    }
}

struct SharedProvider(Box<dyn Provider + Send + Sync>);

impl Provider for SharedProvider {
    fn metadata(&self) -> figment::Metadata {
        self.0.metadata()
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        self.0.data()
    }
}

/// Builds a layered configuration.
///
/// Each source overrides the sources added before it. Summit binaries typically layer a configuration file beneath
/// `SUMMIT_`-prefixed environment variables, and then query it by key through [`GenericConfiguration`].
#[derive(Default)]
pub struct ConfigurationLoader {
    env_prefixes: Vec<String>,
    providers: Vec<SharedProvider>,
}

impl ConfigurationLoader {
    /// Adds a configuration file, parsed as YAML or JSON according to its extension.
    ///
    /// # Errors
    ///
    /// If the extension is not recognized, or the file could not be read or parsed, an error is returned.
    pub fn from_file<P>(mut self, path: P) -> Result<Self, ConfigurationError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = FileFormat::from_path(path).ok_or_else(|| ConfigurationError::UnsupportedFileFormat {
            path: path.to_path_buf(),
        })?;

        let provider = FileProvider::load(path, format)?;
        debug!(path = %path.display(), ?format, "Loaded configuration file.");

        self.providers.push(SharedProvider(Box::new(provider)));
        Ok(self)
    }

    /// Adds every environment variable starting with `prefix`.
    ///
    /// The prefix is matched case-insensitively, with an underscore separating it from the key: `summit` matches
    /// `SUMMIT_SCRAPE_ADDRESS`, which is then visible as `scrape_address` (and, through the fallback lookup in
    /// [`GenericConfiguration`], as `scrape.address`).
    ///
    /// # Errors
    ///
    /// If the prefix is empty, or the environment could not be read, an error is returned.
    pub fn from_environment(mut self, prefix: &str) -> Result<Self, ConfigurationError> {
        if prefix.is_empty() {
            return Err(ConfigurationError::EmptyPrefix);
        }

        let mut prefix = prefix.to_uppercase();
        if !prefix.ends_with('_') {
            prefix.push('_');
        }

        // `Env` is not `Send + Sync`, so take a snapshot.
        let values = Env::prefixed(&prefix).data()?;
        if let Some(dict) = values.get(&figment::Profile::Default) {
            self.providers
                .push(SharedProvider(Box::new(Serialized::defaults(dict.clone()))));
            if !self.env_prefixes.contains(&prefix) {
                self.env_prefixes.push(prefix);
            }
        }
        Ok(self)
    }

    /// Adds `defaults` beneath every other source.
    pub fn with_defaults<T>(mut self, defaults: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        self.providers
            .insert(0, SharedProvider(Box::new(Serialized::defaults(defaults))));
        self
    }

    fn merged(&self) -> Figment {
        self.providers
            .iter()
            .fold(Figment::new(), |figment, provider| figment.admerge(provider))
    }

    /// Deserializes the merged configuration as `T`.
    ///
    /// # Errors
    ///
    /// If the merged configuration does not match `T`, an error is returned.
    pub fn into_typed<'a, T>(self) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.merged()
            .extract()
            .map_err(|e| convert_figment_error(&self.env_prefixes, e))
    }

    /// Finishes loading, returning the merged configuration for key-based queries.
    pub fn into_generic(self) -> GenericConfiguration {
        GenericConfiguration {
            inner: Arc::new(Inner {
                figment: self.merged(),
                env_prefixes: self.env_prefixes,
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    figment: Figment,
    env_prefixes: Vec<String>,
}

/// Merged configuration, queried by key.
///
/// Keys are period-separated paths (`summary.bucket.capacity`). A key that is not found is retried with its periods
/// replaced by underscores, so that values set through environment variables satisfy nested lookups.
#[derive(Clone, Debug)]
pub struct GenericConfiguration {
    inner: Arc<Inner>,
}

impl GenericConfiguration {
    fn lookup<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        let figment = &self.inner.figment;
        let result = match figment.extract_inner(key) {
            Err(e) if key.contains('.') && matches!(e.kind, Kind::MissingField(_)) => {
                figment.extract_inner(&key.replace('.', "_"))
            }
            result => result,
        };
        result.map_err(|e| convert_figment_error(&self.inner.env_prefixes, e))
    }

    /// Gets the value at `key`.
    ///
    /// # Errors
    ///
    /// If the key is not set, or its value does not match `T`, an error is returned.
    pub fn get_typed<'a, T>(&self, key: &str) -> Result<T, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        self.lookup(key)
    }

    /// Gets the value at `key`, or `None` if it is not set.
    ///
    /// # Errors
    ///
    /// If the key is set but its value does not match `T`, an error is returned.
    pub fn try_get_typed<'a, T>(&self, key: &str) -> Result<Option<T>, ConfigurationError>
    where
        T: Deserialize<'a>,
    {
        match self.lookup(key) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigurationError::MissingField { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn convert_figment_error(env_prefixes: &[String], e: figment::Error) -> ConfigurationError {
    match e.kind {
        Kind::MissingField(field) => {
            let env_key = field.replace('.', "_").to_uppercase();
            let suggestions = std::iter::once(field.to_string())
                .chain(env_prefixes.iter().map(|prefix| format!("{}{}", prefix, env_key)))
                .collect::<Vec<_>>();
            let help_text = format!("Try setting `{}`.", suggestions.join("` or `"));

            ConfigurationError::MissingField { help_text, field }
        }
        Kind::InvalidType(actual, expected) => ConfigurationError::InvalidFieldType {
            field: e.path.join("."),
            expected_ty: expected,
            actual_ty: actual.to_string(),
        },
        _ => ConfigurationError::Generic { source: e.into() },
    }
}
