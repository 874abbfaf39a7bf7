//! # foundry-decoder-config
//!
//! Configuration for the foundry value decoder.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

use eyre::WrapErr;
use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map},
};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod error;
pub use error::DecoderConfigError;

// reexport so callers can merge their own providers into the decoder figment
pub use figment;

/// Decoder configuration.
///
/// Values are layered, in ascending priority order, from [`DecoderConfig::default()`], the
/// `decoder.toml` file found in the root (or the file named by `DECODER_CONFIG`) and
/// `DECODER_` prefixed environment variables.
///
/// The toml file is keyed by profile:
///
/// ```toml
/// [default]
/// strict_padding = true
/// max_storage_words = 1024
///
/// [ci]
/// solc_version = "0.8.24"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// The selected profile. **(default: _default_ `default`)**
    ///
    /// **Note:** This field is never serialized nor deserialized. When a `DecoderConfig` is
    /// merged into a `Figment` as a provider, this profile is selected on the `Figment`. When a
    /// `DecoderConfig` is extracted, this field is set to the extracting Figment's selected
    /// `Profile`.
    #[serde(skip)]
    pub profile: Profile,
    /// The root the config file is resolved against.
    #[serde(skip)]
    pub root: PathBuf,
    /// Whether ABI encoded words must be cleanly padded and booleans must be 0 or 1.
    pub strict_padding: bool,
    /// Largest number of storage words a single range read may span.
    pub max_storage_words: u64,
    /// Largest array, `bytes` or `string` length that is materialized.
    pub max_container_length: u64,
    /// Compiler version used to pick the magic variable family when the caller has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solc_version: Option<Version>,
}

impl DecoderConfig {
    /// The default profile: "default"
    pub const DEFAULT_PROFILE: Profile = Profile::const_new("default");

    /// File name of config toml file
    pub const FILE_NAME: &'static str = "decoder.toml";

    /// Environment variable that overrides the config file path.
    pub const CONFIG_ENV: &'static str = "DECODER_CONFIG";

    /// Environment variable that selects the profile.
    pub const PROFILE_ENV: &'static str = "DECODER_PROFILE";

    /// Prefix of the environment variables merged into the config.
    pub const ENV_PREFIX: &'static str = "DECODER_";

    /// Default for [`Self::max_storage_words`].
    pub const DEFAULT_MAX_STORAGE_WORDS: u64 = 65_536;

    /// Default for [`Self::max_container_length`].
    pub const DEFAULT_MAX_CONTAINER_LENGTH: u64 = 1 << 20;

    /// Returns the current `DecoderConfig`, resolved against the current directory.
    ///
    /// See [`figment`](Self::figment) for more details.
    #[track_caller]
    pub fn load() -> Self {
        Self::from_provider(Self::figment())
    }

    /// Returns the `DecoderConfig` resolved against the given root.
    #[track_caller]
    pub fn load_with_root(root: impl AsRef<Path>) -> Self {
        Self::from_provider(Self::figment_with_root(root))
    }

    /// Returns the `DecoderConfig` resolved against the given root, validating the result.
    pub fn try_load_with_root(root: impl AsRef<Path>) -> eyre::Result<Self> {
        let root = root.as_ref();
        let config = Self::try_from(Self::figment_with_root(root))
            .and_then(|config| config.validate().map(|()| config))
            .wrap_err_with(|| format!("failed to load decoder config in {}", root.display()))?;
        Ok(config)
    }

    /// Extract a `DecoderConfig` from `provider`, panicking if extraction fails.
    ///
    /// # Panics
    ///
    /// If extraction fails, prints an error message indicating the failure and
    /// panics. For a version that doesn't panic, use [`DecoderConfig::try_from()`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use figment::providers::{Format, Toml};
    /// use foundry_decoder_config::DecoderConfig;
    ///
    /// let figment = DecoderConfig::figment().merge(Toml::file("other.toml").nested());
    ///
    /// let config = DecoderConfig::from_provider(figment);
    /// ```
    #[track_caller]
    pub fn from_provider<T: Provider>(provider: T) -> Self {
        trace!("load decoder config with provider: {:?}", provider.metadata());
        Self::try_from(provider).unwrap_or_else(|err| panic!("{}", err))
    }

    /// Attempts to extract a `DecoderConfig` from `provider`, returning the result.
    pub fn try_from<T: Provider>(provider: T) -> Result<Self, DecoderConfigError> {
        let figment = Figment::from(provider);
        let mut config = figment.extract::<Self>().map_err(DecoderConfigError::Extract)?;
        config.profile = figment.profile().clone();
        Ok(config)
    }

    /// Returns the default figment
    ///
    /// The default figment reads from the following sources, in ascending
    /// priority order:
    ///
    ///   1. [`DecoderConfig::default()`]
    ///   2. `decoder.toml` _or_ filename in `DECODER_CONFIG` environment variable
    ///   3. `DECODER_` prefixed environment variables
    ///
    /// The profile selected is the value set in the `DECODER_PROFILE`
    /// environment variable. If it is not set, it defaults to `default`.
    pub fn figment() -> Figment {
        Self::default().into()
    }

    /// Returns the default figment with the config file resolved against `root`.
    pub fn figment_with_root(root: impl AsRef<Path>) -> Figment {
        Self::with_root(root).into()
    }

    /// Creates a new config that resolves its config file against `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf(), ..Self::default() }
    }

    /// Returns the selected profile.
    ///
    /// If the `DECODER_PROFILE` env variable is not set, this returns the `DEFAULT_PROFILE`.
    pub fn selected_profile() -> Profile {
        Profile::from_env_or(Self::PROFILE_ENV, Self::DEFAULT_PROFILE)
    }

    /// Returns the path of the config file for this config's root.
    pub fn config_file(&self) -> PathBuf {
        std::env::var_os(Self::CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.root.join(Self::FILE_NAME))
    }

    /// Checks that the limits are usable.
    pub fn validate(&self) -> Result<(), DecoderConfigError> {
        let at_least_one = |setting| DecoderConfigError::InvalidSetting {
            setting,
            reason: "must be at least 1",
        };
        if self.max_storage_words == 0 {
            return Err(at_least_one("max_storage_words"));
        }
        if self.max_container_length == 0 {
            return Err(at_least_one("max_container_length"));
        }
        Ok(())
    }

    /// Returns the populated [Figment] for this config.
    pub fn to_figment(self) -> Figment {
        let profile = Self::selected_profile();
        let file = self.config_file();
        trace!(file = %file.display(), %profile, "merging decoder config file");

        let figment = Figment::new()
            .merge(Toml::file(file).nested())
            .merge(Env::prefixed(Self::ENV_PREFIX).ignore(&["PROFILE", "CONFIG"]).global())
            .select(profile.clone());

        Figment::from(self).merge(figment).select(profile)
    }
}

impl From<DecoderConfig> for Figment {
    fn from(c: DecoderConfig) -> Self {
        c.to_figment()
    }
}

impl Provider for DecoderConfig {
    fn metadata(&self) -> Metadata {
        Metadata::named("Decoder Config")
    }

    #[track_caller]
    fn data(&self) -> Result<Map<Profile, Dict>, figment::Error> {
        Serialized::defaults(self).data()
    }

    fn profile(&self) -> Option<Profile> {
        Some(self.profile.clone())
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            profile: Self::DEFAULT_PROFILE,
            root: PathBuf::from("."),
            strict_padding: false,
            max_storage_words: Self::DEFAULT_MAX_STORAGE_WORDS,
            max_container_length: Self::DEFAULT_MAX_CONTAINER_LENGTH,
            solc_version: None,
        }
    }
}
