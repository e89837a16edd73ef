// src/relevance.rs
//! Relevance gate: decides whether incident text is in scope for alerting.
//!
//! Two policies share one config shape:
//! - `simple`: any configured location appears in the text.
//! - `strict`: a wildfire keyword, a location and an agency all appear, and no exclusion does.
//!
//! Matching is case-insensitive substring matching by default. `match_mode = "word"`
//! compiles each term set into a word-boundary regex instead.

use anyhow::{bail, Context};
use regex::Regex;
use serde::Deserialize;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[default]
    Simple,
    Strict,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Substring,
    Word,
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RelevanceCfg {
    #[serde(default)]
    pub policy: PolicyKind,
    #[serde(default)]
    pub match_mode: MatchMode,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub agencies: Vec<String>,
}

impl Default for RelevanceCfg {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Simple,
            match_mode: MatchMode::Substring,
            locations: vec!["Oregon".into(), "Washington".into()],
            keywords: Vec::new(),
            exclude: Vec::new(),
            agencies: Vec::new(),
        }
    }
}

impl RelevanceCfg {
    /// Reject criteria that can never match anything.
    pub fn validate(&self) -> anyhow::Result<()> {
        let filled = |terms: &[String]| terms.iter().any(|t| !t.trim().is_empty());
        let required: Vec<(&str, &[String])> = match self.policy {
            PolicyKind::Simple => vec![("locations", self.locations.as_slice())],
            PolicyKind::Strict => vec![
                ("keywords", self.keywords.as_slice()),
                ("locations", self.locations.as_slice()),
                ("agencies", self.agencies.as_slice()),
            ],
        };
        for (label, terms) in required {
            if !filled(terms) {
                bail!("{:?} relevance policy needs at least one entry in `{label}`", self.policy);
            }
        }
        Ok(())
    }
}

/* ----------------------------
Compiled policy
---------------------------- */

#[derive(Debug, Clone)]
struct TermSet {
    terms: Vec<String>,
    word_re: Option<Regex>,
}

impl TermSet {
    fn substring<S: AsRef<str>>(raw: &[S]) -> Self {
        let terms = raw
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            terms,
            word_re: None,
        }
    }

    fn compile(label: &str, raw: &[String], mode: MatchMode) -> anyhow::Result<Self> {
        let terms = Self::substring(raw).terms;

        let word_re = match mode {
            MatchMode::Word if !terms.is_empty() => {
                let alts: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
                let pattern = format!(r"(?i)\b(?:{})\b", alts.join("|"));
                Some(
                    Regex::new(&pattern)
                        .with_context(|| format!("compiling `{label}` word matcher"))?,
                )
            }
            _ => None,
        };

        Ok(Self { terms, word_re })
    }

    /// `lowered` must already be lowercase. An empty set never matches.
    fn any_in(&self, lowered: &str) -> bool {
        match &self.word_re {
            Some(re) => re.is_match(lowered),
            None => self.terms.iter().any(|t| lowered.contains(t.as_str())),
        }
    }
}

/// Compiled relevance predicate. Cheap to clone and share across sources.
#[derive(Debug, Clone)]
pub struct RelevancePolicy {
    kind: PolicyKind,
    locations: TermSet,
    keywords: TermSet,
    exclude: TermSet,
    agencies: TermSet,
}

impl RelevancePolicy {
    pub fn from_cfg(cfg: &RelevanceCfg) -> anyhow::Result<Self> {
        let mode = cfg.match_mode;
        Ok(Self {
            kind: cfg.policy,
            locations: TermSet::compile("locations", &cfg.locations, mode)?,
            keywords: TermSet::compile("keywords", &cfg.keywords, mode)?,
            exclude: TermSet::compile("exclude", &cfg.exclude, mode)?,
            agencies: TermSet::compile("agencies", &cfg.agencies, mode)?,
        })
    }

    /// Simple substring policy over the given location names.
    pub fn simple<S: AsRef<str>>(locations: &[S]) -> Self {
        let none: [&str; 0] = [];
        Self {
            kind: PolicyKind::Simple,
            locations: TermSet::substring(locations),
            keywords: TermSet::substring(&none),
            exclude: TermSet::substring(&none),
            agencies: TermSet::substring(&none),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    /// Case-insensitive relevance check. Empty text is never relevant.
    pub fn is_relevant(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();

        let verdict = match self.kind {
            PolicyKind::Simple => self.locations.any_in(&lowered),
            PolicyKind::Strict => {
                self.keywords.any_in(&lowered)
                    && !self.exclude.any_in(&lowered)
                    && self.locations.any_in(&lowered)
                    && self.agencies.any_in(&lowered)
            }
        };

        trace!(target: "relevance", policy = ?self.kind, verdict, "relevance check");
        verdict
    }

    /// True when a strict policy's exclusion terms appear in `text`.
    /// Used for supplementary text that may veto a match but never satisfy one.
    pub fn excludes(&self, text: &str) -> bool {
        self.kind == PolicyKind::Strict && self.exclude.any_in(&text.to_lowercase())
    }
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self::simple(&["Oregon", "Washington"])
    }
}
