use serde::Deserialize;

/// Decides whether a token is left untouched instead of being translated and
/// redrawn.
pub trait TokenClassifier: Send + Sync {
    fn is_trivial(&self, text: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierPolicy {
    #[default]
    ScriptAware,
    Simple,
}

impl ClassifierPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierPolicy::ScriptAware => "script-aware",
            ClassifierPolicy::Simple => "simple",
        }
    }
}

/// How a single character of a script is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptKind {
    /// Letters of an alphabet such as Thai: a lone code point is noise, a run
    /// of them is a word.
    Alphabetic,
    /// Ideographs and syllable blocks: a lone character can be a whole word.
    Ideographic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScriptRange {
    pub start: u32,
    pub end: u32,
    pub kind: ScriptKind,
}

impl ScriptRange {
    pub const fn new(start: u32, end: u32, kind: ScriptKind) -> Self {
        Self { start, end, kind }
    }

    fn contains(&self, ch: char) -> bool {
        (self.start..=self.end).contains(&(ch as u32))
    }
}

const DEFAULT_SCRIPTS: &[ScriptRange] = &[
    // Thai
    ScriptRange::new(0x0E00, 0x0E7F, ScriptKind::Alphabetic),
    // CJK unified ideographs, extension A, Hangul syllables
    ScriptRange::new(0x4E00, 0x9FFF, ScriptKind::Ideographic),
    ScriptRange::new(0x3400, 0x4DBF, ScriptKind::Ideographic),
    ScriptRange::new(0xAC00, 0xD7AF, ScriptKind::Ideographic),
];

const SYMBOLS: &[char] = &[
    '%', '+', '!', '@', '#', '$', '&', '*', '(', ')', '=', '{', '}', '[', ']', ';', ':', '<', '>',
    ',', '.', '?', '/', '|', '\\', '^', '~', '`',
];

/// Table-driven classifier: single characters are trivial unless their script
/// says a lone character carries meaning; runs of characters never are.
#[derive(Debug, Clone)]
pub struct ScriptAwareClassifier {
    scripts: Vec<ScriptRange>,
}

impl Default for ScriptAwareClassifier {
    fn default() -> Self {
        Self {
            scripts: DEFAULT_SCRIPTS.to_vec(),
        }
    }
}

impl ScriptAwareClassifier {
    pub fn with_scripts(mut self, extra: &[ScriptRange]) -> Self {
        self.scripts.extend_from_slice(extra);
        self
    }

    fn script_of(&self, ch: char) -> Option<ScriptKind> {
        self.scripts
            .iter()
            .find(|range| range.contains(ch))
            .map(|range| range.kind)
    }
}

impl TokenClassifier for ScriptAwareClassifier {
    fn is_trivial(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }
        let mut chars = text.chars();
        let (Some(first), None) = (chars.next(), chars.next()) else {
            return false;
        };
        match self.script_of(first) {
            Some(ScriptKind::Alphabetic) => true,
            Some(ScriptKind::Ideographic) => false,
            None => true,
        }
    }
}

/// Lower-fidelity policy: single characters, numbers and anything carrying a
/// symbol are trivial.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleClassifier;

impl TokenClassifier for SimpleClassifier {
    fn is_trivial(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || text.chars().count() == 1 {
            return true;
        }
        if is_number(trimmed) {
            return true;
        }
        text.chars().any(|ch| SYMBOLS.contains(&ch))
    }
}

fn is_number(text: &str) -> bool {
    text.chars().any(|ch| ch.is_ascii_digit())
        && text
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
        && text.parse::<f64>().is_ok()
}

pub fn build_classifier(
    policy: ClassifierPolicy,
    extra_scripts: &[ScriptRange],
) -> Box<dyn TokenClassifier> {
    match policy {
        ClassifierPolicy::ScriptAware => {
            Box::new(ScriptAwareClassifier::default().with_scripts(extra_scripts))
        }
        ClassifierPolicy::Simple => Box::new(SimpleClassifier),
    }
}
