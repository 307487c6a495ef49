//! Structural normal forms: ergodic, waiting, and advancing machines.
//!
//! Each rewrite is idempotent and leaves the symbolic weights symbolic; the
//! advancing rewrite is the only one that combines them, by summing
//! parallel edges and closing silent cycles with a geometric series.

use std::collections::{BTreeMap, VecDeque};

use serde_json::{json, Value};
use smol_str::SmolStr;

use super::{Machine, MachineError, MachineState, MachineTransition};
use crate::types::StateIndex;
use crate::weight::{self, WeightExpr};

/// Collects transitions, merging parallel edges that share destination,
/// input and output by summing their weights. Emission order is
/// `(dest, input, output)`.
#[derive(Debug, Default)]
pub struct TransAccumulator {
    t: BTreeMap<StateIndex, BTreeMap<SmolStr, BTreeMap<SmolStr, WeightExpr>>>,
}

impl TransAccumulator {
    /// An empty accumulator.
    pub fn new() -> TransAccumulator {
        TransAccumulator::default()
    }

    /// Add one transition, summing into any parallel edge already present.
    pub fn accumulate(&mut self, trans: MachineTransition) {
        let by_output = self
            .t
            .entry(trans.dest)
            .or_default()
            .entry(trans.input)
            .or_default();
        match by_output.remove(&trans.output) {
            Some(existing) => {
                by_output.insert(trans.output, weight::sum(vec![existing, trans.weight]));
            }
            None => {
                by_output.insert(trans.output, trans.weight);
            }
        }
    }

    /// The merged transitions.
    pub fn transitions(self) -> Vec<MachineTransition> {
        let mut out = Vec::new();
        for (dest, by_input) in self.t {
            for (input, by_output) in by_input {
                for (output, weight) in by_output {
                    out.push(MachineTransition {
                        input: input.clone(),
                        output,
                        dest,
                        weight,
                    });
                }
            }
        }
        out
    }
}

impl Machine {
    /// Drop states unreachable from the start, renumbering the survivors in
    /// their original order.
    pub fn ergodic_machine(&self) -> Machine {
        let mask = self.accessible_mask();
        if mask.iter().all(|&reached| reached) {
            return self.clone();
        }
        let mut remap = vec![usize::MAX; self.n_states()];
        let mut next = 0;
        for (s, &reached) in mask.iter().enumerate() {
            if reached {
                remap[s] = next;
                next += 1;
            }
        }
        let mut m = Machine {
            state: Vec::with_capacity(next),
        };
        for (s, &reached) in mask.iter().enumerate() {
            if !reached {
                continue;
            }
            let mut state = self.state[s].clone();
            for t in &mut state.trans {
                t.dest = StateIndex::new(remap[t.dest.idx()]);
            }
            m.state.push(state);
        }
        m
    }

    /// Split every state that mixes input-consuming and input-free
    /// transitions, so each state uniformly waits or continues.
    ///
    /// A mixed state becomes a continue state (keeping its name, incoming
    /// edges and input-free transitions) with a silent weight-1 edge to a
    /// fresh wait state holding the input-consuming transitions.
    pub fn waiting_machine(&self) -> Machine {
        if self.is_waiting() {
            return self.clone();
        }
        let mut old2new = vec![0usize; self.n_states()];
        let mut next = 0usize;
        for (s, state) in self.state.iter().enumerate() {
            old2new[s] = next;
            next += if state.waits() || state.continues() { 1 } else { 2 };
        }

        let mut m = Machine {
            state: Vec::with_capacity(next),
        };
        for state in &self.state {
            if state.waits() || state.continues() {
                let mut kept = state.clone();
                for t in &mut kept.trans {
                    t.dest = StateIndex::new(old2new[t.dest.idx()]);
                }
                m.state.push(kept);
                continue;
            }
            let wait_index = StateIndex::new(m.state.len() + 1);
            let mut continue_state = MachineState {
                name: state.name.clone(),
                trans: Vec::new(),
            };
            let mut wait_state = MachineState {
                name: Some(json!([
                    "wait",
                    state.name.clone().unwrap_or(Value::Null)
                ])),
                trans: Vec::new(),
            };
            for t in &state.trans {
                let mut t = t.clone();
                t.dest = StateIndex::new(old2new[t.dest.idx()]);
                if t.input_empty() {
                    continue_state.trans.push(t);
                } else {
                    wait_state.trans.push(t);
                }
            }
            continue_state.trans.push(MachineTransition::new(
                "",
                "",
                wait_index,
                weight::one(),
            ));
            m.state.push(continue_state);
            m.state.push(wait_state);
        }
        m
    }

    /// Eliminate silent transitions to earlier states.
    ///
    /// States are rewritten in index order. A silent edge into an earlier
    /// state is substituted by that state's already-rewritten transitions,
    /// scaled by the edge weight; a silent self-loop of total weight `w` is
    /// removed and the state's remaining transitions scaled by the
    /// geometric series `1/(1−w)`. Parallel edges produced along the way
    /// are merged by summing, so the result is also aligning per state.
    ///
    /// Fails with [`MachineError::NonConvergent`] when a silent cycle has a
    /// literal weight of one or more; symbolic cycle weights are taken on
    /// trust and diverge, if they do, at evaluation time.
    pub fn advancing_machine(&self) -> Result<Machine, MachineError> {
        if self.is_advancing() {
            return Ok(self.clone());
        }
        let mut m = Machine {
            state: Vec::with_capacity(self.n_states()),
        };
        for (s, state) in self.state.iter().enumerate() {
            let mut acc = TransAccumulator::new();
            let mut self_loop: Option<WeightExpr> = None;
            let mut pending: VecDeque<MachineTransition> = state.trans.iter().cloned().collect();
            while let Some(t) = pending.pop_front() {
                if !t.is_silent() || t.dest.idx() > s {
                    acc.accumulate(t);
                    continue;
                }
                if t.dest.idx() == s {
                    self_loop = Some(match self_loop.take() {
                        Some(w) => weight::sum(vec![w, t.weight]),
                        None => t.weight,
                    });
                    continue;
                }
                // Substitute the earlier state's rewritten transitions; its
                // silent edges point strictly forward, so this terminates.
                for sub in &m.state[t.dest.idx()].trans {
                    pending.push_back(MachineTransition::new(
                        sub.input.clone(),
                        sub.output.clone(),
                        sub.dest,
                        weight::product(vec![t.weight.clone(), sub.weight.clone()]),
                    ));
                }
            }
            let mut trans = acc.transitions();
            if let Some(w) = self_loop {
                if let WeightExpr::Lit(x) = w {
                    if x >= 1.0 {
                        return Err(MachineError::NonConvergent);
                    }
                }
                let factor = weight::geometric_sum(w);
                for t in &mut trans {
                    t.weight = weight::product(vec![factor.clone(), t.weight.clone()]);
                }
            }
            m.state.push(MachineState {
                name: state.name.clone(),
                trans,
            });
        }
        Ok(m)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{assert_close, path_weight};
    use super::*;
    use crate::weight::lit;

    fn silent(dest: u32, w: WeightExpr) -> MachineTransition {
        MachineTransition::new("", "", StateIndex(dest), w)
    }

    #[test]
    fn accumulator_merges_parallel_edges() {
        let mut acc = TransAccumulator::new();
        acc.accumulate(MachineTransition::new("a", "b", StateIndex(2), lit(0.25)));
        acc.accumulate(MachineTransition::new("a", "b", StateIndex(2), lit(0.5)));
        acc.accumulate(MachineTransition::new("a", "c", StateIndex(1), lit(1.0)));
        let trans = acc.transitions();
        assert_eq!(trans.len(), 2);
        // (dest, input, output) order
        assert_eq!(trans[0].dest, StateIndex(1));
        assert_eq!(trans[1].weight, lit(0.75));
    }

    #[test]
    fn ergodic_machine_drops_and_renumbers() {
        let mut m = Machine::generator("g", &["A"]);
        // unreachable state wedged between the chain and a new end
        m.state.push(MachineState::default());
        m.state.push(MachineState::default());
        let end = m.end_state();
        m.state[1].trans.push(silent(end.0, weight::one()));
        let e = m.ergodic_machine();
        assert_eq!(e.n_states(), 3);
        assert!(e.is_ergodic());
        assert_eq!(e.state[1].trans[0].dest, StateIndex(2));
    }

    #[test]
    fn waiting_machine_splits_mixed_states() {
        let mut m = Machine::acceptor("a", &["x"]);
        // state 0 now both consumes and emits without consuming
        m.state[0].trans.push(MachineTransition::new(
            "",
            "B",
            StateIndex(1),
            lit(0.5),
        ));
        assert!(!m.is_waiting());
        let w = m.waiting_machine();
        assert!(w.is_waiting());
        assert_eq!(w.n_states(), 3);
        assert_close(path_weight(&w, &["x"], &[]), 1.0);
        assert_close(path_weight(&w, &[], &["B"]), 0.5);
    }

    #[test]
    fn advancing_machine_reverses_silent_back_edges() {
        let m = Machine::generator("g", &["A"]).kleene_closure_weighted(lit(0.5), lit(0.5));
        assert!(!m.is_advancing());
        let a = m.advancing_machine().unwrap();
        assert!(a.is_advancing());
        for k in 0..5 {
            let output: Vec<&str> = std::iter::repeat("A").take(k).collect();
            assert_close(path_weight(&a, &[], &output), path_weight(&m, &[], &output));
        }
    }

    #[test]
    fn advancing_machine_closes_silent_self_loops() {
        // 0 →silent(1)→ 1; 1 loops silently back to 0 with 0.5 and exits
        // with "A"; the closed form scales the exit by 1/(1−0.5) = 2.
        let mut m = Machine {
            state: vec![
                MachineState::default(),
                MachineState::default(),
                MachineState::default(),
            ],
        };
        m.state[0].trans.push(silent(1, weight::one()));
        m.state[1].trans.push(silent(0, lit(0.5)));
        m.state[1].trans.push(MachineTransition::new(
            "",
            "A",
            StateIndex(2),
            lit(0.25),
        ));
        let a = m.advancing_machine().unwrap();
        assert!(a.is_advancing());
        assert_close(path_weight(&a, &[], &["A"]), 0.5);
        assert_close(path_weight(&m, &[], &["A"]), 0.5);
    }

    #[test]
    fn advancing_machine_rejects_divergent_cycles() {
        let mut m = Machine {
            state: vec![MachineState::default(), MachineState::default()],
        };
        m.state[0].trans.push(silent(1, weight::one()));
        m.state[1].trans.push(silent(0, weight::one()));
        assert_eq!(m.advancing_machine(), Err(MachineError::NonConvergent));
    }

    #[test]
    fn normalizers_are_idempotent() {
        let m = Machine::generator("g", &["A"])
            .union_of_prob(&Machine::acceptor("a", &["B"]), lit(0.5))
            .kleene_closure_weighted(lit(0.25), lit(0.75));

        let e = m.ergodic_machine();
        assert_eq!(e.ergodic_machine(), e);
        let w = m.waiting_machine();
        assert_eq!(w.waiting_machine(), w);
        let a = m.advancing_machine().unwrap();
        assert_eq!(a.advancing_machine().unwrap(), a);
    }
}
