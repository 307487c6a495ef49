use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};

/// Index of a state within a machine.
///
/// States are stored in a dense vector; state 0 is the start state and the
/// highest-numbered state is the end state. The ordering carries meaning:
/// an advancing machine has no silent transition to a lower-numbered state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[serde(transparent)]
pub struct StateIndex(pub u32);

impl StateIndex {
    /// The start state of any non-empty machine.
    pub const ZERO: Self = StateIndex(0);

    #[inline(always)]
    pub(crate) fn new(i: usize) -> Self {
        StateIndex(i as u32)
    }

    #[inline(always)]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub(crate) fn offset(self, base: u32) -> Self {
        StateIndex(self.0 + base)
    }
}

impl Display for StateIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for StateIndex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        StateIndex(self.0 + rhs.0)
    }
}

impl Sub for StateIndex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        StateIndex(self.0 - rhs.0)
    }
}

/// Token for a symbol in a machine alphabet.
///
/// Token 0 is reserved for the empty symbol (epsilon); real symbols are
/// numbered from 1 in discovery order.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Token(pub u32);

impl Token {
    /// The reserved empty (epsilon) token.
    pub const EMPTY: Self = Token(0);

    #[inline(always)]
    pub(crate) fn idx(self) -> usize {
        self.0 as usize
    }

    /// True for the reserved empty token.
    #[inline(always)]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordinal of a transition among the outgoing transitions of one state.
///
/// Preserves the emission order of transitions through evaluation, so the
/// evaluated adjacency maps can be unfolded back into the original order.
/// Together with a state's transition offset it forms a dense global edge id.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
#[serde(transparent)]
pub struct TransIndex(pub u32);

impl TransIndex {
    pub(crate) const ZERO: Self = TransIndex(0);

    #[inline(always)]
    pub(crate) fn incr(&self) -> Self {
        TransIndex(self.0 + 1)
    }
}

/// Natural logarithm of a transition weight.
///
/// Weights are multiplicative probabilities or pseudo-probabilities; the
/// evaluated machine keeps them in log space to avoid underflow on long
/// paths.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, PartialOrd)]
#[repr(transparent)]
#[serde(transparent)]
pub struct LogWeight(pub f64);

impl LogWeight {
    /// log(1): the weight of an unweighted transition.
    pub const ZERO: Self = LogWeight(0.0);

    /// The probability-space value, `exp` of the stored logarithm.
    #[inline(always)]
    pub fn to_probability(self) -> f64 {
        self.0.exp()
    }
}

impl Display for LogWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for LogWeight {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        LogWeight(self.0 + rhs.0)
    }
}
