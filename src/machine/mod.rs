//! Symbolic weighted finite-state transducers.
//!
//! A [`Machine`] is an ordered vector of states whose transitions carry an
//! input symbol, an output symbol and a symbolic [`WeightExpr`]. State 0 is
//! the start state and the last state is the end state; the ordering itself
//! is meaningful (see [`Machine::is_advancing`]).
//!
//! Machines are assembled with the constructors in [`algebra`] and brought
//! into normal forms with the rewrites in [`normalize`]; both keep every
//! weight symbolic. Numerical evaluation lives in [`crate::evaluated`].

pub mod algebra;
mod error;
pub mod normalize;

pub use self::error::MachineError;

use smol_str::SmolStr;

use crate::types::StateIndex;
use crate::weight::WeightExpr;

/// Optional caller-supplied identity of a state, kept verbatim through
/// rewrites. Any JSON value is allowed.
pub type StateName = Option<serde_json::Value>;

/// One edge of a machine: consume `input`, emit `output`, move to `dest`.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineTransition {
    /// Input symbol; empty for none.
    pub input: SmolStr,
    /// Output symbol; empty for none.
    pub output: SmolStr,
    /// Destination state.
    pub dest: StateIndex,
    /// Symbolic weight.
    pub weight: WeightExpr,
}

impl MachineTransition {
    /// Build a transition.
    pub fn new<I, O>(input: I, output: O, dest: StateIndex, weight: WeightExpr) -> MachineTransition
    where
        I: Into<SmolStr>,
        O: Into<SmolStr>,
    {
        MachineTransition {
            input: input.into(),
            output: output.into(),
            dest,
            weight,
        }
    }

    /// True if the transition consumes no input.
    #[inline(always)]
    pub fn input_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// True if the transition emits no output.
    #[inline(always)]
    pub fn output_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// True if the transition neither consumes nor emits.
    #[inline(always)]
    pub fn is_silent(&self) -> bool {
        self.input.is_empty() && self.output.is_empty()
    }

    /// True if the transition consumes or emits something.
    #[inline(always)]
    pub fn is_loud(&self) -> bool {
        !self.is_silent()
    }
}

/// A machine state: an optional name and the ordered outgoing transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineState {
    /// Caller-supplied identity, if any.
    pub name: StateName,
    /// Outgoing transitions in emission order.
    pub trans: Vec<MachineTransition>,
}

impl MachineState {
    /// True if some outgoing transition consumes input.
    pub fn exits_with_input(&self) -> bool {
        self.trans.iter().any(|t| !t.input_empty())
    }

    /// True if some outgoing transition consumes no input.
    pub fn exits_without_input(&self) -> bool {
        self.trans.iter().any(|t| t.input_empty())
    }

    /// True if some outgoing transition consumes or emits.
    pub fn exits_with_io(&self) -> bool {
        self.trans.iter().any(|t| t.is_loud())
    }

    /// True if some outgoing transition is silent.
    pub fn exits_without_io(&self) -> bool {
        self.trans.iter().any(|t| t.is_silent())
    }

    /// True if the state has no outgoing transitions. The end state is not
    /// required to have this property.
    pub fn terminates(&self) -> bool {
        self.trans.is_empty()
    }

    /// True if every outgoing transition consumes input.
    pub fn waits(&self) -> bool {
        !self.exits_without_input()
    }

    /// True if the state has outgoing transitions and none consume input.
    pub fn continues(&self) -> bool {
        !self.exits_with_input() && !self.terminates()
    }

    /// True if every outgoing transition is silent.
    pub fn is_silent(&self) -> bool {
        !self.exits_with_io()
    }

    /// True if the state has outgoing transitions and all of them are loud.
    pub fn is_loud(&self) -> bool {
        self.exits_with_io() && !self.exits_without_io()
    }
}

/// A weighted finite-state transducer in symbolic form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Machine {
    /// States in index order; state 0 is the start, the last is the end.
    pub state: Vec<MachineState>,
}

impl Machine {
    /// Number of states.
    #[inline(always)]
    pub fn n_states(&self) -> usize {
        self.state.len()
    }

    /// Total number of transitions across all states.
    pub fn n_transitions(&self) -> usize {
        self.state.iter().map(|s| s.trans.len()).sum()
    }

    /// The start state. Machines built by this crate are never empty.
    #[inline(always)]
    pub fn start_state(&self) -> StateIndex {
        StateIndex::ZERO
    }

    /// The end state.
    #[inline(always)]
    pub fn end_state(&self) -> StateIndex {
        debug_assert!(!self.state.is_empty(), "machine has no states");
        StateIndex::new(self.n_states().saturating_sub(1))
    }

    /// True for the single-state, transition-free machine: the identity of
    /// concatenation.
    pub fn is_null(&self) -> bool {
        self.n_states() == 1 && self.state[0].trans.is_empty()
    }

    /// Distinct non-empty input symbols, in first-seen scan order.
    pub fn input_alphabet(&self) -> Vec<SmolStr> {
        self.collect_alphabet(|t| &t.input)
    }

    /// Distinct non-empty output symbols, in first-seen scan order.
    pub fn output_alphabet(&self) -> Vec<SmolStr> {
        self.collect_alphabet(|t| &t.output)
    }

    fn collect_alphabet<F>(&self, side: F) -> Vec<SmolStr>
    where
        F: Fn(&MachineTransition) -> &SmolStr,
    {
        let mut seen = hashbrown::HashSet::new();
        let mut symbols = Vec::new();
        for state in &self.state {
            for trans in &state.trans {
                let sym = side(trans);
                if !sym.is_empty() && seen.insert(sym.clone()) {
                    symbols.push(sym.clone());
                }
            }
        }
        symbols
    }

    /// States reachable from the start state, in ascending index order.
    pub fn accessible_states(&self) -> Vec<StateIndex> {
        let mask = self.accessible_mask();
        (0..self.n_states())
            .filter(|&s| mask[s])
            .map(StateIndex::new)
            .collect()
    }

    pub(crate) fn accessible_mask(&self) -> Vec<bool> {
        let mut visited = vec![false; self.n_states()];
        let mut worklist = std::collections::VecDeque::new();
        if !self.state.is_empty() {
            visited[0] = true;
            worklist.push_back(0usize);
        }
        while let Some(s) = worklist.pop_front() {
            for trans in &self.state[s].trans {
                let d = trans.dest.idx();
                if !visited[d] {
                    visited[d] = true;
                    worklist.push_back(d);
                }
            }
        }
        visited
    }

    /// True if every state is reachable from the start state.
    pub fn is_ergodic(&self) -> bool {
        self.accessible_mask().into_iter().all(|reached| reached)
    }

    /// True if every state either waits (all outgoing consume input) or
    /// continues (no outgoing consumes input).
    pub fn is_waiting(&self) -> bool {
        self.state.iter().all(|s| s.waits() || s.continues())
    }

    /// True if no silent transition leads to a lower-numbered state.
    pub fn is_advancing(&self) -> bool {
        self.state.iter().enumerate().all(|(s, state)| {
            state
                .trans
                .iter()
                .all(|t| !t.is_silent() || t.dest.idx() >= s)
        })
    }

    /// True if no ordered state pair carries two transitions with the same
    /// input and output labels.
    pub fn is_aligning(&self) -> bool {
        self.state.iter().all(|state| {
            let mut seen = hashbrown::HashSet::new();
            state
                .trans
                .iter()
                .all(|t| seen.insert((t.dest, t.input.clone(), t.output.clone())))
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::params::Params;
    use crate::weight;

    // Deep enough that the truncated tail of any convergent silent cycle in
    // a test machine is far below assertion tolerances.
    const MAX_PATH_DEPTH: usize = 400;

    /// Total weight of paths from start to end that consume exactly `input`
    /// and emit exactly `output`. Weights must be parameter-free.
    pub(crate) fn path_weight(m: &Machine, input: &[&str], output: &[&str]) -> f64 {
        let params = Params::new();
        fn go(
            m: &Machine,
            params: &Params,
            s: usize,
            i: usize,
            o: usize,
            input: &[&str],
            output: &[&str],
            depth: usize,
        ) -> f64 {
            if depth == 0 {
                return 0.0;
            }
            let mut total = 0.0;
            if s == m.end_state().idx() && i == input.len() && o == output.len() {
                total += 1.0;
            }
            for t in &m.state[s].trans {
                let mut ni = i;
                let mut no = o;
                if !t.input_empty() {
                    if i >= input.len() || input[i] != t.input.as_str() {
                        continue;
                    }
                    ni += 1;
                }
                if !t.output_empty() {
                    if o >= output.len() || output[o] != t.output.as_str() {
                        continue;
                    }
                    no += 1;
                }
                let w = weight::eval(&t.weight, params).expect("parameter-free test weight");
                if w != 0.0 {
                    total += w * go(m, params, t.dest.idx(), ni, no, input, output, depth - 1);
                }
            }
            total
        }
        go(m, &params, 0, 0, 0, input, output, MAX_PATH_DEPTH)
    }

    /// Structural equality that ignores the order of transitions within a
    /// state. Weights are compared on their debug form.
    pub(crate) fn assert_same_machine(a: &Machine, b: &Machine) {
        assert_eq!(a.n_states(), b.n_states(), "state counts differ");
        for (s, (sa, sb)) in a.state.iter().zip(&b.state).enumerate() {
            assert_eq!(sa.name, sb.name, "state {} name differs", s);
            let key = |t: &MachineTransition| {
                (
                    t.dest,
                    t.input.clone(),
                    t.output.clone(),
                    format!("{:?}", t.weight),
                )
            };
            let mut ta: Vec<_> = sa.trans.iter().map(key).collect();
            let mut tb: Vec<_> = sb.trans.iter().map(key).collect();
            ta.sort();
            tb.sort();
            assert_eq!(ta, tb, "state {} transitions differ", s);
        }
    }

    pub(crate) fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {} but got {}",
            expected,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight;

    #[test]
    fn generator_shape_and_alphabets() {
        let m = Machine::generator("g", &["A", "C"]);
        assert_eq!(m.n_states(), 3);
        assert_eq!(m.n_transitions(), 2);
        assert_eq!(m.output_alphabet(), vec!["A", "C"]);
        assert!(m.input_alphabet().is_empty());
        assert!(m.is_ergodic());
        assert!(m.is_advancing());
        assert!(m.is_aligning());
    }

    #[test]
    fn state_predicates() {
        let mut s = MachineState::default();
        assert!(s.terminates());
        assert!(s.waits());
        assert!(!s.continues());

        s.trans.push(MachineTransition::new(
            "a",
            "",
            StateIndex(1),
            weight::one(),
        ));
        assert!(s.waits());
        assert!(!s.continues());
        assert!(s.is_loud());

        s.trans.push(MachineTransition::new(
            "",
            "",
            StateIndex(2),
            weight::one(),
        ));
        assert!(!s.waits());
        assert!(!s.continues());
        assert!(!s.is_silent());
        assert!(!s.is_loud());
    }

    #[test]
    fn advancing_rejects_silent_back_edges() {
        let mut m = Machine::generator("g", &["A"]);
        // loud back edges are fine
        m.state[1]
            .trans
            .push(MachineTransition::new("x", "", StateIndex(0), weight::one()));
        assert!(m.is_advancing());
        m.state[1]
            .trans
            .push(MachineTransition::new("", "", StateIndex(0), weight::one()));
        assert!(!m.is_advancing());
    }

    #[test]
    fn emission_back_edges_keep_a_machine_advancing() {
        // the shape used by k-mer emitters: output emissions are the only
        // backward edges, silent edges all point forward
        let mut m = Machine {
            state: vec![MachineState::default(); 4],
        };
        m.state[0]
            .trans
            .push(MachineTransition::new("", "", StateIndex(1), weight::one()));
        m.state[1].trans.push(MachineTransition::new(
            "",
            "A",
            StateIndex(1),
            weight::lit(0.5),
        ));
        m.state[1].trans.push(MachineTransition::new(
            "",
            "",
            StateIndex(2),
            weight::lit(0.5),
        ));
        m.state[2].trans.push(MachineTransition::new(
            "",
            "A",
            StateIndex(1),
            weight::lit(0.25),
        ));
        m.state[2].trans.push(MachineTransition::new(
            "",
            "",
            StateIndex(3),
            weight::lit(0.75),
        ));
        assert!(m.is_advancing());
    }

    #[test]
    fn aligning_detects_duplicate_labels() {
        let mut m = Machine::generator("g", &["A"]);
        m.state[0].trans.push(MachineTransition::new(
            "",
            "A",
            StateIndex(1),
            weight::lit(0.5),
        ));
        assert!(!m.is_aligning());
    }

    #[test]
    fn accessible_states_ignores_unreachable() {
        let mut m = Machine::generator("g", &["A"]);
        m.state.push(MachineState::default());
        let reachable = m.accessible_states();
        assert_eq!(reachable, vec![StateIndex(0), StateIndex(1)]);
        assert!(!m.is_ergodic());
    }
}
