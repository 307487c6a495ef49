//! Named parameter bindings for weight evaluation.

use hashbrown::HashMap;
use smol_str::SmolStr;

/// A flat, immutable mapping from parameter name to real value.
///
/// Bindings are created in one go (from JSON or an iterator of pairs) and
/// never mutated afterwards. Names the machine does not reference are
/// harmless; names the machine references but the binding lacks surface as
/// [`WeightError::UnboundParameter`](crate::weight::WeightError) at
/// evaluation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    defs: HashMap<SmolStr, f64>,
}

impl Params {
    /// An empty binding.
    pub fn new() -> Params {
        Params::default()
    }

    /// Value bound to `name`, if any.
    #[inline(always)]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.defs.get(name).copied()
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True if no parameters are bound.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Iterate over the bound `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, f64)> {
        self.defs.iter().map(|(k, &v)| (k, v))
    }
}

impl<N: Into<SmolStr>> FromIterator<(N, f64)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, f64)>>(iter: I) -> Params {
        Params {
            defs: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
