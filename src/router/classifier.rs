//! Intent classification.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::provider::Tier;

/// Coarse category inferred from a prompt. Selects the initial tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Casual,
    Technical,
    Deep,
}

impl Intent {
    /// Initial tier for this intent.
    pub fn tier(&self) -> Tier {
        match self {
            Intent::Casual => Tier::Fast,
            Intent::Technical => Tier::Expert,
            Intent::Deep => Tier::Genius,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Casual => "casual",
            Intent::Technical => "technical",
            Intent::Deep => "deep",
        }
    }
}

/// Maps a prompt to an [`Intent`]. Must be pure and total.
pub trait Classifier: Send + Sync {
    fn classify(&self, prompt: &str) -> Intent;
}

/// Greeting, small-talk and closing patterns (Portuguese and English).
pub const DEFAULT_CASUAL_PATTERNS: &[&str] = &[
    r"^\s*(oi|olá|ola|opa|e aí|eai|hey|hi|hello|bom dia|boa tarde|boa noite|good morning|good afternoon|good evening)\b",
    r"\btudo (bem|bom|certo)\b",
    r"\bcomo (você|voce|vc) (está|esta|vai)\b",
    r"\bhow are you\b",
    r"\bwhat'?s up\b",
    r"\b(obrigad[oa]|valeu|thanks|thank you|thx)\b",
    r"\b(tchau|até mais|ate mais|até logo|ate logo|bye|goodbye|see you)\b",
];

/// Words that mark a prompt as technical.
pub const DEFAULT_TECHNICAL_KEYWORDS: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "rust",
    "java",
    "golang",
    "react",
    "vue",
    "angular",
    "node",
    "nodejs",
    "django",
    "flask",
    "sql",
    "api",
    "docker",
    "kubernetes",
    "git",
    "html",
    "css",
    "código",
    "codigo",
    "code",
    "função",
    "funcao",
    "function",
    "classe",
    "class",
    "algoritmo",
    "algorithm",
    "debug",
    "bug",
    "implement",
    "implementar",
    "compile",
    "compilar",
    "deploy",
];

/// Regex/keyword heuristic. First match wins: casual, then technical, else deep.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    casual: Vec<Regex>,
    technical: Option<Regex>,
}

impl KeywordClassifier {
    /// Build from pattern and keyword lists. Matching is case-insensitive.
    pub fn new<P, K>(casual_patterns: &[P], technical_keywords: &[K]) -> Result<Self, regex::Error>
    where
        P: AsRef<str>,
        K: AsRef<str>,
    {
        let casual = casual_patterns
            .iter()
            .map(|p| RegexBuilder::new(p.as_ref()).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;

        let words: Vec<String> = technical_keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let technical = if words.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b(?:{})\b", words.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self { casual, technical })
    }

    fn is_casual(&self, prompt: &str) -> bool {
        self.casual.iter().any(|re| re.is_match(prompt))
    }

    fn is_technical(&self, prompt: &str) -> bool {
        self.technical.as_ref().is_some_and(|re| re.is_match(prompt))
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CASUAL_PATTERNS, DEFAULT_TECHNICAL_KEYWORDS)
            .expect("built-in classifier patterns are valid")
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, prompt: &str) -> Intent {
        let intent = if self.is_casual(prompt) {
            Intent::Casual
        } else if self.is_technical(prompt) {
            Intent::Technical
        } else {
            Intent::Deep
        };
        tracing::debug!(intent = intent.as_str(), "Classified prompt");
        intent
    }
}
