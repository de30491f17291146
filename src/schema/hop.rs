use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A probability-weighted edge from a source step to a target step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub target: String,
    /// Expected in 0.0..=1.0; the bounds compiler rejects lists that
    /// overshoot or fall short of 1.0.
    pub probability: f32,
}

impl Hop {
    pub fn new(target: impl Into<String>, probability: f32) -> Self {
        Self {
            target: target.into(),
            probability,
        }
    }
}

/// Hops leaving one source step, in declaration order.
pub type HopList = Vec<Hop>;

/// Source step name → its outgoing hops, for a single graph.
pub type HopMap = FxHashMap<String, HopList>;

/// Graph name → that graph's hop map.
pub type GraphMap = FxHashMap<String, HopMap>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_new_accepts_str_and_string() {
        let a = Hop::new("Add 0", 0.25);
        let b = Hop::new(String::from("Add 0"), 0.25);
        assert_eq!(a, b);
    }
}
