//! Localized error messages
//!
//! Messages live in Fluent files under `locales/<lang>/errors.ftl`, keyed by
//! error code. The locale is negotiated from `Accept-Language`.

use fluent::concurrent::FluentBundle;
use fluent::{FluentArgs, FluentResource};
use fluent_langneg::{accepted_languages, negotiate_languages, NegotiationStrategy};
use once_cell::sync::Lazy;
use thiserror::Error;
use unic_langid::LanguageIdentifier;

const SOURCES: &[(&str, &str)] = &[
    ("en-US", include_str!("../locales/en-US/errors.ftl")),
    ("es-AR", include_str!("../locales/es-AR/errors.ftl")),
];

static AVAILABLE: Lazy<Vec<LanguageIdentifier>> = Lazy::new(|| {
    SOURCES
        .iter()
        .filter_map(|(tag, _)| tag.parse().ok())
        .collect()
});

#[derive(Debug, Error)]
pub enum I18nError {
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Invalid Fluent resource for {locale}: {message}")]
    InvalidResource { locale: String, message: String },
}

/// Message bundles for every shipped locale
pub struct Localizer {
    bundles: Vec<(LanguageIdentifier, FluentBundle<FluentResource>)>,
    default_locale: LanguageIdentifier,
}

impl std::fmt::Debug for Localizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Localizer")
            .field("locales", &AVAILABLE.as_slice())
            .field("default_locale", &self.default_locale)
            .finish()
    }
}

impl Localizer {
    /// Loads the bundled resources; `default_locale` must be one of them
    pub fn new(default_locale: &str) -> Result<Self, I18nError> {
        let default_locale: LanguageIdentifier = default_locale
            .parse()
            .map_err(|_| I18nError::UnsupportedLocale(default_locale.to_string()))?;
        if !AVAILABLE.contains(&default_locale) {
            return Err(I18nError::UnsupportedLocale(default_locale.to_string()));
        }

        let mut bundles = Vec::with_capacity(SOURCES.len());
        for (tag, source) in SOURCES {
            let locale: LanguageIdentifier = tag
                .parse()
                .map_err(|_| I18nError::UnsupportedLocale(tag.to_string()))?;
            let resource = FluentResource::try_new(source.to_string()).map_err(|(_, errors)| {
                I18nError::InvalidResource {
                    locale: tag.to_string(),
                    message: format!("{errors:?}"),
                }
            })?;

            let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
            bundle.set_use_isolating(false);
            bundle
                .add_resource(resource)
                .map_err(|errors| I18nError::InvalidResource {
                    locale: tag.to_string(),
                    message: format!("{errors:?}"),
                })?;
            bundles.push((locale, bundle));
        }

        Ok(Self {
            bundles,
            default_locale,
        })
    }

    pub fn default_locale(&self) -> &LanguageIdentifier {
        &self.default_locale
    }

    /// Picks the best shipped locale for an `Accept-Language` header value
    pub fn negotiate(&self, accept_language: Option<&str>) -> LanguageIdentifier {
        let requested = accept_language
            .map(accepted_languages::parse)
            .unwrap_or_default();

        negotiate_languages(
            &requested,
            AVAILABLE.as_slice(),
            Some(&self.default_locale),
            NegotiationStrategy::Lookup,
        )
        .first()
        .map(|locale| (*locale).clone())
        .unwrap_or_else(|| self.default_locale.clone())
    }

    /// Formats the message for `code`, or `None` when no bundle has it
    pub fn format(
        &self,
        locale: &LanguageIdentifier,
        code: &str,
        args: &[(&'static str, String)],
    ) -> Option<String> {
        let bundle = self
            .bundle(locale)
            .filter(|bundle| bundle.has_message(code))
            .or_else(|| self.bundle(&self.default_locale))?;
        let pattern = bundle.get_message(code)?.value()?;

        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, value.clone());
        }

        let mut errors = Vec::new();
        let message = bundle.format_pattern(pattern, Some(&fluent_args), &mut errors);
        if !errors.is_empty() {
            tracing::warn!(code, ?errors, "message formatted with errors");
        }
        Some(message.into_owned())
    }

    fn bundle(&self, locale: &LanguageIdentifier) -> Option<&FluentBundle<FluentResource>> {
        self.bundles
            .iter()
            .find(|(candidate, _)| candidate == locale)
            .map(|(_, bundle)| bundle)
    }
}
