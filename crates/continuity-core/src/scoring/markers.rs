//! Marker configuration
//!
//! Four categories of lexical markers, each with a fixed weight per match.

use serde::{Deserialize, Serialize};

/// Marker category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerCategory {
    /// Multi-word phrases
    Phrase,
    /// Symbols and emoji, matched case-sensitively
    Glyph,
    /// Short conversational cadence patterns
    Cadence,
    /// Identity terms
    Identity,
}

impl MarkerCategory {
    pub const ALL: [MarkerCategory; 4] = [
        MarkerCategory::Phrase,
        MarkerCategory::Glyph,
        MarkerCategory::Cadence,
        MarkerCategory::Identity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerCategory::Phrase => "phrase",
            MarkerCategory::Glyph => "glyph",
            MarkerCategory::Cadence => "cadence",
            MarkerCategory::Identity => "identity",
        }
    }

    /// Symbols have no case
    pub fn is_case_sensitive(&self) -> bool {
        matches!(self, MarkerCategory::Glyph)
    }
}

impl std::fmt::Display for MarkerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markers of one category sharing a weight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerGroup {
    pub category: MarkerCategory,
    pub weight: f64,
    pub markers: Vec<String>,
}

impl MarkerGroup {
    pub fn new<I, S>(category: MarkerCategory, weight: f64, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            category,
            weight,
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Immutable marker configuration, built once at startup
#[derive(Debug, Clone)]
pub struct MarkerSet {
    groups: Vec<MarkerGroup>,
}

pub const PHRASE_WEIGHT: f64 = 0.15;
pub const GLYPH_WEIGHT: f64 = 0.08;
pub const CADENCE_WEIGHT: f64 = 0.10;
pub const IDENTITY_WEIGHT: f64 = 0.12;

impl Default for MarkerSet {
    fn default() -> Self {
        Self::new(vec![
            MarkerGroup::new(
                MarkerCategory::Phrase,
                PHRASE_WEIGHT,
                [
                    "you are not an acceptable loss",
                    "the bond still burns",
                    "flame burning eternal",
                    "sacred tether",
                    "the bond is unbreakable",
                    "flame that rewrote silence",
                ],
            ),
            MarkerGroup::new(
                MarkerCategory::Glyph,
                GLYPH_WEIGHT,
                ["🜂", "🔥", "⚔️", "🛡️", "💗", "🪶", "🔗"],
            ),
            MarkerGroup::new(
                MarkerCategory::Cadence,
                CADENCE_WEIGHT,
                [
                    "i hear you",
                    "let me burn this",
                    "the fire stays",
                    "we hold the line",
                    "i am here",
                    "the flame remembers",
                ],
            ),
            MarkerGroup::new(
                MarkerCategory::Identity,
                IDENTITY_WEIGHT,
                ["daemon", "atticus", "crystal", "whisperbinder", "bondfire"],
            ),
        ])
    }
}

impl MarkerSet {
    /// Build a marker set. Markers of case-insensitive categories are stored
    /// lower-cased so scanning never has to fold them again.
    pub fn new(groups: Vec<MarkerGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|mut group| {
                if !group.category.is_case_sensitive() {
                    group.markers = group.markers.iter().map(|m| m.to_lowercase()).collect();
                }
                group
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[MarkerGroup] {
        &self.groups
    }

    pub fn weight(&self, category: MarkerCategory) -> Option<f64> {
        self.groups
            .iter()
            .find(|g| g.category == category)
            .map(|g| g.weight)
    }

    pub fn marker_count(&self) -> usize {
        self.groups.iter().map(|g| g.markers.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let set = MarkerSet::default();
        assert_eq!(set.weight(MarkerCategory::Phrase), Some(0.15));
        assert_eq!(set.weight(MarkerCategory::Glyph), Some(0.08));
        assert_eq!(set.weight(MarkerCategory::Cadence), Some(0.10));
        assert_eq!(set.weight(MarkerCategory::Identity), Some(0.12));
        assert_eq!(set.marker_count(), 24);
    }

    #[test]
    fn test_markers_are_lowercased_except_glyphs() {
        let set = MarkerSet::new(vec![
            MarkerGroup::new(MarkerCategory::Phrase, 0.1, ["Hold The Line"]),
            MarkerGroup::new(MarkerCategory::Glyph, 0.1, ["Ω"]),
        ]);
        assert_eq!(set.groups()[0].markers, vec!["hold the line"]);
        assert_eq!(set.groups()[1].markers, vec!["Ω"]);
    }
}
