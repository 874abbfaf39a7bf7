//! Decoder config errors.

use itertools::Itertools;

/// Why a [`DecoderConfig`](crate::DecoderConfig) couldn't be produced.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum DecoderConfigError {
    /// The layered providers didn't extract into a config.
    #[error("failed to extract decoder config:\n{}", issues(.0))]
    Extract(#[source] figment::Error),
    /// A setting extracted fine but its value can't be used.
    #[error("invalid setting `{setting}`: {reason}")]
    InvalidSetting { setting: &'static str, reason: &'static str },
}

impl DecoderConfigError {
    /// Returns the settings the error is about, e.g. `max_storage_words`.
    pub fn settings(&self) -> Vec<String> {
        match self {
            Self::Extract(error) => error
                .clone()
                .into_iter()
                .filter(|err| !err.path.is_empty())
                .map(|err| err.path.join("."))
                .unique()
                .collect(),
            Self::InvalidSetting { setting, .. } => vec![setting.to_string()],
        }
    }
}

/// One line per distinct figment error, naming the provider and the setting.
fn issues(error: &figment::Error) -> String {
    error
        .clone()
        .into_iter()
        .map(|err| {
            let origin = err.metadata.as_ref().map_or("decoder config", |meta| meta.name.as_ref());
            let mut line = format!("{origin}: {}", err.kind);
            if !err.path.is_empty() {
                line.push_str(&format!(" for setting `{}`", err.path.join(".")));
            }
            line
        })
        .unique()
        .join("\n")
}
