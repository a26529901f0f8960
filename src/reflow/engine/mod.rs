mod classify;
mod fit;
mod geom;
mod inpaint;
mod merge;

pub use classify::{
    ClassifierPolicy, ScriptAwareClassifier, ScriptKind, ScriptRange, SimpleClassifier,
    TokenClassifier, build_classifier,
};
pub use fit::{AverageColor, Ink, Placement, average_color, contrasting_ink, place_text};
pub use geom::{horizontal_gap, is_skewed, rotation_angle};
pub use inpaint::{EraseConfig, erase};
pub use merge::{LineMerger, MergeConfig};
