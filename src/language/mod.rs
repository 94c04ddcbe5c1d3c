//! Language classification
//!
//! Identifies whether a text sample is Spanish or English using `whatlang`
//! trigram statistics, which are deterministic for a given input. Anything
//! that is not confidently one of the two (another language, an empty
//! sample, an unreadable document) resolves to English. The fallback is never
//! silent: it is logged and carried on the returned [`Classification`].

use crate::extract::{self, SampleLimits};
use crate::metrics;
use crate::router::LanguageLabel;
use std::fmt;
use std::path::{Path, PathBuf};
use whatlang::Lang;

/// Label used whenever identification does not yield Spanish or English
pub const DEFAULT_LANGUAGE: LanguageLabel = LanguageLabel::English;

/// Why a classification fell back to [`DEFAULT_LANGUAGE`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The identifier recognised a language other than Spanish or English
    UnsupportedLanguage(String),
    /// The identifier could not decide (empty, too short, ambiguous)
    Undetermined,
    /// Text could not be sampled from the document
    ExtractionFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::UnsupportedLanguage(code) => write!(f, "detected '{}'", code),
            FallbackReason::Undetermined => f.write_str("language could not be identified"),
            FallbackReason::ExtractionFailed(e) => write!(f, "text extraction failed: {}", e),
        }
    }
}

/// Result of classifying a sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub language: LanguageLabel,
    pub fallback: Option<FallbackReason>,
}

impl Classification {
    fn detected(language: LanguageLabel) -> Self {
        Self {
            language,
            fallback: None,
        }
    }

    fn fallback(reason: FallbackReason) -> Self {
        Self {
            language: DEFAULT_LANGUAGE,
            fallback: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Classify a text sample
///
/// A Spanish or English guess that `whatlang` does not mark reliable (a
/// handful of words, a scanned page with little text) counts as undetermined.
pub fn classify(text: &str) -> Classification {
    let classification = if text.trim().is_empty() {
        Classification::fallback(FallbackReason::Undetermined)
    } else {
        match whatlang::detect(text) {
            Some(info) => match info.lang() {
                Lang::Spa | Lang::Eng if !info.is_reliable() => {
                    Classification::fallback(FallbackReason::Undetermined)
                }
                Lang::Spa => Classification::detected(LanguageLabel::Spanish),
                Lang::Eng => Classification::detected(LanguageLabel::English),
                other => Classification::fallback(FallbackReason::UnsupportedLanguage(
                    other.code().to_string(),
                )),
            },
            None => Classification::fallback(FallbackReason::Undetermined),
        }
    };

    metrics::record_classification(classification.language, classification.is_fallback());
    classification
}

/// Sample a document and classify its language.
///
/// Extraction failures are folded into the English fallback.
pub fn classify_file(path: &Path, limits: SampleLimits) -> Classification {
    let classification = match extract::sample(path, limits) {
        Ok(text) => classify(&text),
        Err(e) => {
            let classification =
                Classification::fallback(FallbackReason::ExtractionFailed(e.to_string()));
            metrics::record_classification(classification.language, true);
            classification
        }
    };

    if let Some(ref reason) = classification.fallback {
        tracing::warn!(
            file = %path.display(),
            reason = %reason,
            language = %classification.language,
            "Language fallback applied"
        );
    }

    classification
}

/// [`classify_file`] on the blocking pool, for callers on the async runtime
pub async fn classify_file_blocking(path: PathBuf, limits: SampleLimits) -> Classification {
    match tokio::task::spawn_blocking(move || classify_file(&path, limits)).await {
        Ok(classification) => classification,
        Err(e) => {
            tracing::warn!(error = %e, "Classification task failed");
            Classification::fallback(FallbackReason::ExtractionFailed(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPANISH: &str = "La planificación financiera es fundamental para alcanzar \
        la libertad económica. Es importante ahorrar una parte de los ingresos cada mes \
        y diversificar las inversiones para reducir los riesgos a largo plazo.";

    const ENGLISH: &str = "Financial planning is essential to reach economic freedom. \
        It is important to save part of your income every month and to diversify \
        your investments in order to reduce long term risks.";

    const GERMAN: &str = "Die Finanzplanung ist wichtig, um wirtschaftliche Freiheit zu \
        erreichen. Es ist wichtig, jeden Monat einen Teil des Einkommens zu sparen und \
        die Investitionen zu streuen, um langfristige Risiken zu verringern.";

    #[test]
    fn test_detects_spanish() {
        let result = classify(SPANISH);
        assert_eq!(result.language, LanguageLabel::Spanish);
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_detects_english() {
        let result = classify(ENGLISH);
        assert_eq!(result.language, LanguageLabel::English);
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_empty_text_defaults_to_english() {
        for text in ["", "   ", "\n\t"] {
            let result = classify(text);
            assert_eq!(result.language, LanguageLabel::English);
            assert_eq!(result.fallback, Some(FallbackReason::Undetermined));
        }
    }

    #[test]
    fn test_short_text_defaults_to_english() {
        for text in ["el", "de la", "gracias"] {
            let result = classify(text);
            assert_eq!(result.language, LanguageLabel::English, "{:?}", text);
            assert_eq!(result.fallback, Some(FallbackReason::Undetermined));
        }
    }

    #[test]
    fn test_other_language_defaults_to_english() {
        let result = classify(GERMAN);
        assert_eq!(result.language, LanguageLabel::English);
        assert_eq!(
            result.fallback,
            Some(FallbackReason::UnsupportedLanguage("deu".into()))
        );
    }

    #[test]
    fn test_classification_is_deterministic() {
        assert_eq!(classify(SPANISH), classify(SPANISH));
    }

    #[test]
    fn test_unreadable_file_defaults_to_english() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, "not a pdf").unwrap();

        let result = classify_file(&path, SampleLimits::default());
        assert_eq!(result.language, LanguageLabel::English);
        assert!(matches!(
            result.fallback,
            Some(FallbackReason::ExtractionFailed(_))
        ));
    }

    #[test]
    fn test_classify_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guia.txt");
        std::fs::write(&path, SPANISH).unwrap();

        let result = classify_file(&path, SampleLimits::default());
        assert_eq!(result.language, LanguageLabel::Spanish);
    }
}
