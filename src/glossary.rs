//! Lexical post-processing of translated text.
//!
//! Translation models render gaming slang literally ("аптечка" becomes
//! "pharmacy", "автомат" becomes "machine"). The glossary rewrites known
//! mistranslations into the terms players actually use. Pure text-to-text,
//! applied to final output only.

use crate::error::{DuotalkError, Result};
use regex::RegexBuilder;

/// Built-in rewrite table for English output in shooter voice chat.
/// Left side is a regex over the translated text, right side the
/// replacement.
pub const GAMING_GLOSSARY_EN: &[(&str, &str)] = &[
    // Medical / health
    (r"\bpharmacy\b", "medkit"),
    (r"\bhealth\s?issues\b", "HP"),
    (r"\bmedicine\s?cabinet\b", "medkit"),
    (r"\bfirst\s?aid\s?kit\b", "medkit"),
    (r"\btreating\b", "healing"),
    (r"\btreatment\b", "healing"),
    // Ammo / weapons
    (r"\bcartridges\b", "ammo"),
    (r"\bbullets\b", "ammo"),
    (r"\bspare\s?parts\b", "ammo"),
    (r"\brounds\b", "ammo"),
    (r"\bmachine\b", "AR"),
    (r"\bautomaton\b", "AR"),
    (r"\bgolden\s?machine\b", "Gold AR"),
    // Movement / actions
    (r"\bwander\b", "loot"),
    (r"\bcleaned\s?up\b", "cleared"),
    (r"\bjumping\b", "dropping"),
    // Locations
    (r"\bupstairs\b", "on high ground"),
    // Misc
    (r"\badversaries\b", "enemies"),
    (r"\bopponents\b", "enemies"),
    (r"\bmen\b", "players"),
    (r"\bpeople\b", "players"),
];

/// Compiled rewrite rules applied to translated text.
#[derive(Debug, Clone)]
pub struct Glossary {
    rules: Vec<(regex::Regex, String)>,
}

impl Glossary {
    /// Compiles a rule table. Patterns match case-insensitively.
    pub fn from_rules(rules: &[(&str, &str)]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for (pattern, replacement) in rules {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| DuotalkError::GlossaryRule {
                    pattern: (*pattern).to_string(),
                    message: e.to_string(),
                })?;
            compiled.push((regex, (*replacement).to_string()));
        }
        Ok(Self { rules: compiled })
    }

    /// The built-in English gaming table.
    pub fn gaming_english() -> Result<Self> {
        Self::from_rules(GAMING_GLOSSARY_EN)
    }

    /// A glossary that rewrites nothing.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Applies every rule in order and returns the rewritten text.
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, replacement) in &self.rules {
            result = regex
                .replace_all(&result, replacement.as_str())
                .into_owned();
        }
        result
    }

    /// Number of compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rules are loaded.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
