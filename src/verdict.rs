// Shared result types, kept in one file so classifier modules and the fuser
// can all depend on them without import cycles.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::roi::BoundingBox;

/// Terminal classification of one analyzed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Fresh,
    Spoiled,
    Unknown,
    NotFruit,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Fresh => "fresh",
            Label::Spoiled => "spoiled",
            Label::Unknown => "unknown",
            Label::NotFruit => "not_fruit",
        }
    }

    /// Fresh and Spoiled are fruit verdicts; Unknown and NotFruit are not.
    pub fn is_fruit(self) -> bool {
        matches!(self, Label::Fresh | Label::Spoiled)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which classifier(s) produced the fused decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Heuristic,
    Model,
    Both,
    Mix,
    None,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Heuristic => "heuristic",
            Source::Model => "model",
            Source::Both => "both",
            Source::Mix => "mix",
            Source::None => "none",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single classifier path. Never mutated after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifierVerdict {
    pub label: Label,
    /// In [0, 1].
    pub confidence: f32,
}

impl ClassifierVerdict {
    pub fn new(label: Label, confidence: f32) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Fruit species estimated by the rule-based type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Apple,
    GreenApple,
    Banana,
    Orange,
    Lemon,
    Lime,
    Unknown,
}

impl Species {
    pub fn as_str(self) -> &'static str {
        match self {
            Species::Apple => "apple",
            Species::GreenApple => "green_apple",
            Species::Banana => "banana",
            Species::Orange => "orange",
            Species::Lemon => "lemon",
            Species::Lime => "lime",
            Species::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypeVerdict {
    pub species: Species,
    pub confidence: f32,
}

impl TypeVerdict {
    pub fn unknown() -> Self {
        Self {
            species: Species::Unknown,
            confidence: 0.0,
        }
    }
}

/// The unit handed upward and stored into history. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub label: Label,
    pub confidence: f32,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
    pub species: Species,
    pub species_confidence: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl FusedResult {
    pub fn is_fruit(&self) -> bool {
        self.label.is_fruit()
    }
}
