use serde::Deserialize;
use tracing::debug;

use crate::reflow::{Line, Word};

use super::classify::TokenClassifier;
use super::geom::{horizontal_gap, is_skewed, union_bbox};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Max difference between top edges of words on the same row.
    pub vertical_tolerance: i32,
    /// Max horizontal gap between neighbouring words of a line.
    pub max_gap: i32,
    /// Words tilted beyond this many degrees are dropped. `None` keeps all.
    pub skew_threshold: Option<f64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            vertical_tolerance: 10,
            max_gap: 10,
            skew_threshold: Some(10.0),
        }
    }
}

/// Groups detector-ordered words into lines in a single forward scan.
pub struct LineMerger<'a> {
    config: MergeConfig,
    classifier: &'a dyn TokenClassifier,
}

impl<'a> LineMerger<'a> {
    pub fn new(config: MergeConfig, classifier: &'a dyn TokenClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn merge(&self, words: &[Word]) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut current: Vec<&Word> = Vec::new();
        let mut current_y: Option<i32> = None;

        for word in words {
            if self.is_dropped(word) {
                debug!("dropping skewed word '{}' ({:?})", word.text, word.angle);
                continue;
            }

            let same_row = current_y
                .map(|y| (word.bbox.y0 - y).abs() <= self.config.vertical_tolerance)
                .unwrap_or(true);
            let joins = same_row
                && current
                    .last()
                    .map(|prev| self.should_combine(prev, word))
                    .unwrap_or(true);

            if !joins {
                if let Some(line) = combine_line(&current) {
                    lines.push(line);
                }
                current.clear();
            }
            current.push(word);
            current_y = Some(word.bbox.y0);
        }

        if let Some(line) = combine_line(&current) {
            lines.push(line);
        }
        lines
    }

    /// Never mixes trivial and non-trivial tokens; neighbours must touch or
    /// sit at most `max_gap` apart without overlapping.
    pub fn should_combine(&self, prev: &Word, next: &Word) -> bool {
        if self.classifier.is_trivial(&prev.text) != self.classifier.is_trivial(&next.text) {
            return false;
        }
        let gap = horizontal_gap(&prev.bbox, &next.bbox);
        (0..=self.config.max_gap).contains(&gap)
    }

    fn is_dropped(&self, word: &Word) -> bool {
        match (self.config.skew_threshold, word.angle) {
            (Some(threshold), Some(angle)) => is_skewed(angle, threshold),
            _ => false,
        }
    }
}

fn combine_line(words: &[&Word]) -> Option<Line> {
    let (first, rest) = words.split_first()?;
    let bbox = rest
        .iter()
        .fold(first.bbox, |acc, word| union_bbox(&acc, &word.bbox));
    let text = words
        .iter()
        .map(|word| word.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Some(Line { text, bbox })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflow::BoundingBox;
    use crate::reflow::engine::classify::{ScriptAwareClassifier, SimpleClassifier};

    fn word(text: &str, x0: i32, y0: i32, x1: i32, y1: i32) -> Word {
        Word {
            text: text.to_string(),
            bbox: BoundingBox::new(x0, y0, x1, y1),
            angle: Some(0.0),
        }
    }

    fn merge(words: &[Word]) -> Vec<Line> {
        let classifier = ScriptAwareClassifier::default();
        LineMerger::new(MergeConfig::default(), &classifier).merge(words)
    }

    #[test]
    fn adjacent_single_letters_merge_into_one_line() {
        let lines = merge(&[
            word("H", 0, 0, 10, 10),
            word("e", 10, 0, 20, 10),
            word("l", 20, 0, 30, 10),
        ]);
        assert_eq!(
            lines,
            vec![Line {
                text: "H e l".to_string(),
                bbox: BoundingBox::new(0, 0, 30, 10),
            }]
        );
        assert!(!ScriptAwareClassifier::default().is_trivial(&lines[0].text));
    }

    #[test]
    fn trivial_and_meaningful_tokens_stay_apart() {
        let lines = merge(&[word("Hello", 0, 0, 50, 10), word("!", 52, 0, 56, 10)]);
        let texts = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["Hello", "!"]);
    }

    #[test]
    fn gap_limits_are_inclusive_and_overlap_splits() {
        let joined = merge(&[word("ab", 0, 0, 20, 10), word("cd", 30, 0, 50, 10)]);
        assert_eq!(joined.len(), 1);

        let far = merge(&[word("ab", 0, 0, 20, 10), word("cd", 31, 0, 50, 10)]);
        assert_eq!(far.len(), 2);

        let overlapping = merge(&[word("ab", 0, 0, 20, 10), word("cd", 19, 0, 40, 10)]);
        assert_eq!(overlapping.len(), 2);
    }

    #[test]
    fn vertical_tolerance_tracks_last_word() {
        let lines = merge(&[
            word("one", 0, 0, 30, 10),
            word("two", 35, 8, 65, 18),
            word("three", 70, 16, 110, 26),
            word("four", 0, 40, 40, 50),
        ]);
        let texts = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["one two three", "four"]);
        assert_eq!(lines[0].bbox, BoundingBox::new(0, 0, 110, 26));
    }

    #[test]
    fn skewed_words_are_dropped_without_closing_the_line() {
        let mut tilted = word("tilt", 100, 100, 120, 140);
        tilted.angle = Some(35.0);
        let lines = merge(&[word("ab", 0, 0, 20, 10), tilted, word("cd", 25, 0, 45, 10)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ab cd");
    }

    #[test]
    fn skew_filter_can_be_disabled() {
        let classifier = SimpleClassifier;
        let config = MergeConfig {
            skew_threshold: None,
            ..MergeConfig::default()
        };
        let mut tilted = word("tilt", 0, 0, 20, 10);
        tilted.angle = Some(60.0);
        let lines = LineMerger::new(config, &classifier).merge(&[tilted]);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn single_ideograph_survives_as_its_own_line() {
        let lines = merge(&[word("汉", 5, 5, 25, 25)]);
        assert_eq!(lines.len(), 1);
        assert!(!ScriptAwareClassifier::default().is_trivial(&lines[0].text));
    }

    #[test]
    fn rows_already_split_are_preserved() {
        let rows = vec![
            word("first", 0, 0, 40, 10),
            word("second", 0, 30, 50, 40),
            word("third", 0, 60, 45, 70),
        ];
        let lines = merge(&rows);
        assert_eq!(lines.len(), 3);
        for (line, source) in lines.iter().zip(&rows) {
            assert_eq!(line.text, source.text);
            assert_eq!(line.bbox, source.bbox);
        }
    }

    #[test]
    fn empty_input_yields_no_lines() {
        assert!(merge(&[]).is_empty());
    }
}
