//! Destination routing
//!
//! Maps a document's category (and, for tiered categories, its detected
//! language) to the key prefix it is stored under. Routing is a pure
//! function: the same inputs always produce the same key, which is what
//! makes the bulk sync's skip-if-present check meaningful.

use std::fmt;

/// Prefix used for categories the router does not recognise
pub const OTHERS_PREFIX: &str = "others";

/// Document category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Personality,
    Instructions,
    Tier1,
    Tier2,
    Other,
}

impl Category {
    /// Parse the `type` field sent by the upload form.
    ///
    /// Anything other than `personality`, `instructions`, `Tier1` or `Tier2`
    /// maps to [`Category::Other`].
    pub fn from_form_value(value: &str) -> Self {
        match value {
            "personality" => Category::Personality,
            "instructions" => Category::Instructions,
            "Tier1" => Category::Tier1,
            "Tier2" => Category::Tier2,
            _ => Category::Other,
        }
    }

    /// Whether files of this category are routed by detected language
    pub fn requires_language(&self) -> bool {
        matches!(self, Category::Tier1 | Category::Tier2)
    }

    /// Display name of the tier (`Tier 1`), if this is a tiered category
    pub fn tier_name(&self) -> Option<&'static str> {
        match self {
            Category::Tier1 => Some("Tier 1"),
            Category::Tier2 => Some("Tier 2"),
            _ => None,
        }
    }
}

/// Detected document language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LanguageLabel {
    Spanish,
    English,
}

impl LanguageLabel {
    /// Every supported label, in the order prefixes are listed
    pub const ALL: [LanguageLabel; 2] = [LanguageLabel::Spanish, LanguageLabel::English];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLabel::Spanish => "spanish",
            LanguageLabel::English => "english",
        }
    }
}

impl fmt::Display for LanguageLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix for a tier folder and language, e.g. `Tier 1-spanish`
pub fn tier_prefix(tier_name: &str, language: LanguageLabel) -> String {
    format!("{}-{}", tier_name, language.as_str())
}

/// Compute the destination prefix for a category.
///
/// A tiered category without a language routes to English, the same
/// default the classifier applies when identification fails.
pub fn route(category: Category, language: Option<LanguageLabel>) -> String {
    match category {
        Category::Personality => "personality".to_string(),
        Category::Instructions => "instructions".to_string(),
        Category::Tier1 | Category::Tier2 => {
            let tier = category.tier_name().unwrap_or_default();
            tier_prefix(tier, language.unwrap_or(LanguageLabel::English))
        }
        Category::Other => OTHERS_PREFIX.to_string(),
    }
}

/// Full object key: `{prefix}/{filename}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    prefix: String,
    filename: String,
}

impl DestinationKey {
    pub fn new(prefix: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            filename: filename.into(),
        }
    }

    /// Route a category/language pair and attach the filename
    pub fn for_category(
        category: Category,
        language: Option<LanguageLabel>,
        filename: impl Into<String>,
    ) -> Self {
        Self::new(route(category, language), filename)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.filename)
    }
}

/// Filename component of a stored key: everything after the first `/`.
///
/// Keys without a `/` are returned whole.
pub fn filename_of(key: &str) -> &str {
    key.split_once('/').map(|(_, name)| name).unwrap_or(key)
}
