// src/news/classify.rs
//! Topic classifier: an ordered keyword cascade.
//!
//! Rules are evaluated top to bottom against `title + " " + description`
//! (case-insensitive). The first matching rule decides the category and the
//! ranking score; later rules are never consulted. Text matching no rule gets
//! the default category.
//!
//! ASCII terms must start at a word boundary. Short ones (acronyms) must
//! also end at one; longer ones match as prefixes, so "hospital" also hits
//! "hospitalized". Terms containing non-ASCII characters (Thai) match as
//! plain substrings, since Thai script does not separate words with spaces.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::news::types::Category;

pub const ENV_CATEGORIES_PATH: &str = "NEWS_CATEGORIES_PATH";

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierRoot {
    pub rules: Vec<RuleCfg>,
    pub default: DefaultCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleCfg {
    pub id: String,
    pub th: String,
    pub en: String,
    pub score: i32,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefaultCfg {
    pub id: String,
    pub th: String,
    pub en: String,
    pub score: i32,
}

/// Category + ranking score produced by `classify`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub score: i32,
}

#[derive(Debug)]
struct CompiledRule {
    category: Category,
    score: i32,
    re: Regex,
}

#[derive(Debug)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
    fallback: Classification,
}

// (id, th, en, score, terms) in priority order.
const BUILTIN_RULES: &[(&str, &str, &str, i32, &[&str])] = &[
    (
        "sign-language",
        "ภาษามือ",
        "Sign Language",
        10,
        &[
            "sign language",
            "deaf",
            "hearing impaired",
            "hearing impairment",
            "asl",
            "bsl",
            "tsl",
            "ภาษามือ",
            "หูหนวก",
            "บกพร่องทางการได้ยิน",
        ],
    ),
    (
        "education",
        "การศึกษา",
        "Education",
        5,
        &[
            "education",
            "school",
            "student",
            "learning",
            "inclusive",
            "การศึกษา",
            "โรงเรียน",
            "นักเรียน",
        ],
    ),
    (
        "healthcare",
        "สุขภาพ",
        "Healthcare",
        4,
        &[
            "health",
            "medical",
            "hospital",
            "treatment",
            "สุขภาพ",
            "โรงพยาบาล",
        ],
    ),
    (
        "technology",
        "เทคโนโลยี",
        "Technology",
        4,
        &[
            "technology",
            "technologies",
            "app",
            "apps",
            "ai",
            "assistive",
            "digital",
            "เทคโนโลยี",
        ],
    ),
    (
        "disability",
        "คนพิการ",
        "Disability",
        3,
        &["disability", "disabilities", "disabled", "ผู้พิการ", "คนพิการ"],
    ),
    (
        "accessibility",
        "การเข้าถึง",
        "Accessibility",
        3,
        &["accessibility", "accessible", "barrier-free", "การเข้าถึง"],
    ),
    (
        "insurance",
        "ประกันและสวัสดิการ",
        "Insurance & Benefits",
        2,
        &[
            "insurance",
            "coverage",
            "benefit",
            "ประกัน",
            "สวัสดิการ",
        ],
    ),
];

const BUILTIN_DEFAULT: (&str, &str, &str, i32) = ("general", "ทั่วไป", "General", 1);

static BUILTIN: Lazy<Classifier> = Lazy::new(Classifier::builtin);

/// Classify with the built-in rule table.
pub fn classify(title: &str, description: &str) -> Classification {
    BUILTIN.classify(title, description)
}

/// ASCII terms shorter than this (acronyms like "ai", "asl") match whole
/// words only; longer ones also match derived forms ("health" → "healthcare").
const MIN_STEM_CHARS: usize = 4;

/// Build one case-insensitive pattern from a term list.
fn compile_terms(id: &str, terms: &[String]) -> Result<Regex> {
    let mut words = Vec::new();
    let mut stems = Vec::new();
    let mut substrings = Vec::new();
    for t in terms {
        let t = t.trim();
        if t.is_empty() {
            continue;
        }
        let escaped = regex::escape(t).replace(' ', r"\s+");
        if !t.is_ascii() {
            substrings.push(escaped);
        } else if t.len() < MIN_STEM_CHARS {
            words.push(escaped);
        } else {
            stems.push(escaped);
        }
    }

    let mut alts = Vec::with_capacity(3);
    if !words.is_empty() {
        alts.push(format!(r"\b(?:{})\b", words.join("|")));
    }
    if !stems.is_empty() {
        alts.push(format!(r"\b(?:{})", stems.join("|")));
    }
    if !substrings.is_empty() {
        alts.push(format!("(?:{})", substrings.join("|")));
    }
    if alts.is_empty() {
        return Err(anyhow!("rule `{id}` has no terms"));
    }

    let pattern = format!("(?i){}", alts.join("|"));
    Regex::new(&pattern).map_err(|e| anyhow!("rule `{id}` regex error: {e}"))
}

impl Classifier {
    /// The built-in bilingual rule table.
    pub fn builtin() -> Self {
        let root = ClassifierRoot {
            rules: BUILTIN_RULES
                .iter()
                .map(|(id, th, en, score, terms)| RuleCfg {
                    id: id.to_string(),
                    th: th.to_string(),
                    en: en.to_string(),
                    score: *score,
                    terms: terms.iter().map(|t| t.to_string()).collect(),
                })
                .collect(),
            default: DefaultCfg {
                id: BUILTIN_DEFAULT.0.to_string(),
                th: BUILTIN_DEFAULT.1.to_string(),
                en: BUILTIN_DEFAULT.2.to_string(),
                score: BUILTIN_DEFAULT.3,
            },
        };
        Self::from_root(root).expect("built-in classifier rules compile")
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let root: ClassifierRoot = toml::from_str(toml_str).context("parsing category rules")?;
        Self::from_root(root)
    }

    /// `$NEWS_CATEGORIES_PATH` when set, otherwise the built-in table.
    pub fn load_default() -> Result<Self> {
        match std::env::var(ENV_CATEGORIES_PATH) {
            Ok(p) => {
                let path = PathBuf::from(p);
                let content = fs::read_to_string(&path).with_context(|| {
                    format!("reading category rules from {}", path.display())
                })?;
                Self::from_toml_str(&content)
            }
            Err(_) => Ok(Self::builtin()),
        }
    }

    fn from_root(root: ClassifierRoot) -> Result<Self> {
        let rules = root
            .rules
            .into_iter()
            .map(|r| {
                let re = compile_terms(&r.id, &r.terms)?;
                Ok(CompiledRule {
                    category: Category {
                        id: r.id,
                        th: r.th,
                        en: r.en,
                    },
                    score: r.score,
                    re,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let fallback = Classification {
            category: Category {
                id: root.default.id,
                th: root.default.th,
                en: root.default.en,
            },
            score: root.default.score,
        };
        Ok(Self { rules, fallback })
    }

    pub fn classify(&self, title: &str, description: &str) -> Classification {
        let text = format!("{title} {description}");
        self.classify_text(&text)
    }

    /// First matching rule wins.
    pub fn classify_text(&self, text: &str) -> Classification {
        self.rules
            .iter()
            .find(|r| r.re.is_match(text))
            .map(|r| Classification {
                category: r.category.clone(),
                score: r.score,
            })
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Every category this classifier can assign, in priority order,
    /// default last.
    pub fn categories(&self) -> Vec<&Category> {
        self.rules
            .iter()
            .map(|r| &r.category)
            .chain(std::iter::once(&self.fallback.category))
            .collect()
    }
}
