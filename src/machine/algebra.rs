//! Constructors and combinators of the machine algebra.
//!
//! Every constructor returns a machine whose start state is 0 and whose end
//! state is the last. Rewrites move symbolic weights around without
//! evaluating them.

use hashbrown::HashMap;
use serde_json::{json, Value};
use smol_str::SmolStr;

use super::{Machine, MachineError, MachineState, MachineTransition};
use crate::types::StateIndex;
use crate::weight::{self, WeightExpr};

impl Machine {
    /// The single-state machine with no transitions: the identity of
    /// [`concatenate`](Machine::concatenate).
    pub fn null() -> Machine {
        Machine {
            state: vec![MachineState::default()],
        }
    }

    /// A linear chain that emits `seq` while consuming nothing.
    pub fn generator<S: AsRef<str>>(name: &str, seq: &[S]) -> Machine {
        chain(name, seq, false)
    }

    /// A linear chain that consumes `seq` while emitting nothing.
    pub fn acceptor<S: AsRef<str>>(name: &str, seq: &[S]) -> Machine {
        chain(name, seq, true)
    }

    /// Run `self`, then `other`.
    ///
    /// `other`'s states follow `self`'s. When `self`'s end state has no
    /// outgoing transitions, edges into it are redirected straight to
    /// `other`'s start, leaving no silent hop; otherwise the end state keeps
    /// its transitions and gains a silent weight-1 tie to `other`'s start.
    pub fn concatenate(&self, other: &Machine) -> Machine {
        if self.is_null() {
            return other.clone();
        }
        if other.is_null() {
            return self.clone();
        }
        let offset = self.n_states() as u32;
        let left_end = self.end_state();
        let left_end_terminates = self.state[left_end.idx()].terminates();
        let other_start = other.start_state().offset(offset);

        let mut m = Machine {
            state: Vec::with_capacity(self.n_states() + other.n_states()),
        };
        for state in &self.state {
            let mut s = state.clone();
            if left_end_terminates {
                for t in &mut s.trans {
                    if t.dest == left_end {
                        t.dest = other_start;
                    }
                }
            }
            m.state.push(s);
        }
        for state in &other.state {
            let mut s = state.clone();
            for t in &mut s.trans {
                t.dest = t.dest.offset(offset);
            }
            m.state.push(s);
        }
        if !left_end_terminates {
            m.state[left_end.idx()].trans.push(MachineTransition::new(
                "",
                "",
                other_start,
                weight::one(),
            ));
        }
        m
    }

    /// Branch to `self` or `other`, both with weight 1.
    pub fn union_of(&self, other: &Machine) -> Machine {
        self.union_of_weighted(other, weight::one(), weight::one())
    }

    /// Branch to `self` with probability `p_first`, to `other` with the
    /// complement `1 − p_first`.
    pub fn union_of_prob(&self, other: &Machine, p_first: WeightExpr) -> Machine {
        let p_second = weight::sub(weight::one(), p_first.clone());
        self.union_of_weighted(other, p_first, p_second)
    }

    /// Branch to `self` with weight `p_first`, to `other` with weight
    /// `p_second`. A fresh start state fans out silently; a fresh end state
    /// collects both operand ends with weight 1.
    pub fn union_of_weighted(
        &self,
        other: &Machine,
        p_first: WeightExpr,
        p_second: WeightExpr,
    ) -> Machine {
        let first_offset = 1u32;
        let second_offset = 1 + self.n_states() as u32;
        let end = StateIndex::new(1 + self.n_states() + other.n_states());

        let mut start = MachineState::default();
        start.trans.push(MachineTransition::new(
            "",
            "",
            self.start_state().offset(first_offset),
            p_first,
        ));
        start.trans.push(MachineTransition::new(
            "",
            "",
            other.start_state().offset(second_offset),
            p_second,
        ));

        let mut m = Machine {
            state: Vec::with_capacity(end.idx() + 1),
        };
        m.state.push(start);
        append_offset(&mut m, self, first_offset);
        append_offset(&mut m, other, second_offset);
        m.state[self.end_state().offset(first_offset).idx()]
            .trans
            .push(MachineTransition::new("", "", end, weight::one()));
        m.state[other.end_state().offset(second_offset).idx()]
            .trans
            .push(MachineTransition::new("", "", end, weight::one()));
        m.state.push(MachineState::default());
        m
    }

    /// Zero or more repetitions of `self`, with unit weights throughout.
    pub fn kleene_closure(&self) -> Machine {
        self.kleene_closure_weighted(weight::one(), weight::one())
    }

    /// Zero or more repetitions of `self`. Each repetition costs `extend`,
    /// finishing costs `end`: emitting the body exactly `k` times carries
    /// weight `extendᵏ · end`.
    pub fn kleene_closure_weighted(&self, extend: WeightExpr, end: WeightExpr) -> Machine {
        let offset = 1u32;
        let end_state = StateIndex::new(self.n_states() + 1);

        let mut start = MachineState::default();
        start.trans.push(MachineTransition::new(
            "",
            "",
            self.start_state().offset(offset),
            extend.clone(),
        ));
        start
            .trans
            .push(MachineTransition::new("", "", end_state, end.clone()));

        let mut m = Machine {
            state: Vec::with_capacity(self.n_states() + 2),
        };
        m.state.push(start);
        append_offset(&mut m, self, offset);
        let body_end = self.end_state().offset(offset).idx();
        m.state[body_end].trans.push(MachineTransition::new(
            "",
            "",
            self.start_state().offset(offset),
            extend,
        ));
        m.state[body_end]
            .trans
            .push(MachineTransition::new("", "", end_state, end));
        m.state.push(MachineState::default());
        m
    }

    /// Standard transducer composition under the convention
    /// `self.output = other.input`.
    ///
    /// `other` is first brought into waiting form so that exactly one
    /// operand moves at each composite state: `other` when its state
    /// continues, `self` otherwise. Composite states are discovered
    /// breadth-first from the start pair and numbered in discovery order,
    /// except that the end pair is placed last; the result is then advanced.
    pub fn compose(&self, other: &Machine) -> Result<Machine, MachineError> {
        let second = other.waiting_machine();
        let start_pair = (self.start_state(), second.start_state());
        let end_pair = (self.end_state(), second.end_state());

        let mut slot: HashMap<(StateIndex, StateIndex), usize> = HashMap::new();
        let mut pairs: Vec<(StateIndex, StateIndex)> = Vec::new();
        slot.insert(start_pair, 0);
        pairs.push(start_pair);

        // (input, output, destination slot, weight) per discovered pair
        let mut edges: Vec<Vec<(SmolStr, SmolStr, usize, WeightExpr)>> = Vec::new();
        let mut next = 0;
        while next < pairs.len() {
            let (a, b) = pairs[next];
            next += 1;
            let mut out = Vec::new();
            let second_state = &second.state[b.idx()];
            if second_state.continues() {
                for t2 in &second_state.trans {
                    let dest = intern((a, t2.dest), &mut slot, &mut pairs);
                    out.push((
                        SmolStr::default(),
                        t2.output.clone(),
                        dest,
                        t2.weight.clone(),
                    ));
                }
            } else {
                for t1 in &self.state[a.idx()].trans {
                    if t1.output_empty() {
                        let dest = intern((t1.dest, b), &mut slot, &mut pairs);
                        out.push((
                            t1.input.clone(),
                            SmolStr::default(),
                            dest,
                            t1.weight.clone(),
                        ));
                    } else {
                        for t2 in &second_state.trans {
                            if t2.input == t1.output {
                                let dest = intern((t1.dest, t2.dest), &mut slot, &mut pairs);
                                out.push((
                                    t1.input.clone(),
                                    t2.output.clone(),
                                    dest,
                                    weight::product(vec![t1.weight.clone(), t2.weight.clone()]),
                                ));
                            }
                        }
                    }
                }
            }
            edges.push(out);
        }

        // The end pair must land on the last index; everything else keeps
        // its discovery order. An unreached end pair becomes a dead state.
        let discovered = pairs.len();
        let end_slot = slot.get(&end_pair).copied();
        let renumber = |s: usize| -> usize {
            match end_slot {
                Some(e) if s == e => discovered - 1,
                Some(e) if s > e => s - 1,
                _ => s,
            }
        };
        let n_states = if end_slot.is_some() {
            discovered
        } else {
            discovered + 1
        };

        let mut m = Machine {
            state: vec![MachineState::default(); n_states],
        };
        for (s, pair_edges) in edges.into_iter().enumerate() {
            let (a, b) = pairs[s];
            let target = &mut m.state[renumber(s)];
            target.name = Some(json!([
                pair_name(self, a),
                pair_name(&second, b)
            ]));
            for (input, output, dest, w) in pair_edges {
                target
                    .trans
                    .push(MachineTransition::new(input, output, StateIndex::new(renumber(dest)), w));
            }
        }
        if end_slot.is_none() {
            m.state[n_states - 1].name = Some(json!([
                pair_name(self, end_pair.0),
                pair_name(&second, end_pair.1)
            ]));
        }
        m.advancing_machine()
    }

    /// Flip every transition `i → j` into `j → i`, swapping the roles of
    /// start and end by renumbering `s → N−1−s`. Labels and weights are
    /// kept.
    pub fn reverse(&self) -> Machine {
        let n = self.n_states();
        let mut m = Machine {
            state: (0..n)
                .map(|s| MachineState {
                    name: self.state[n - 1 - s].name.clone(),
                    trans: Vec::new(),
                })
                .collect(),
        };
        for (src, state) in self.state.iter().enumerate() {
            for t in &state.trans {
                m.state[n - 1 - t.dest.idx()].trans.push(MachineTransition::new(
                    t.input.clone(),
                    t.output.clone(),
                    StateIndex::new(n - 1 - src),
                    t.weight.clone(),
                ));
            }
        }
        m
    }

    /// Swap every transition's input and output symbols.
    pub fn flip_in_out(&self) -> Machine {
        Machine {
            state: self
                .state
                .iter()
                .map(|state| MachineState {
                    name: state.name.clone(),
                    trans: state
                        .trans
                        .iter()
                        .map(|t| {
                            MachineTransition::new(
                                t.output.clone(),
                                t.input.clone(),
                                t.dest,
                                t.weight.clone(),
                            )
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

fn chain<S: AsRef<str>>(name: &str, seq: &[S], consume: bool) -> Machine {
    let mut m = Machine {
        state: Vec::with_capacity(seq.len() + 1),
    };
    for pos in 0..=seq.len() {
        let mut state = MachineState {
            name: Some(json!([name, pos])),
            trans: Vec::new(),
        };
        if pos < seq.len() {
            let sym = seq[pos].as_ref();
            let (input, output) = if consume { (sym, "") } else { ("", sym) };
            state.trans.push(MachineTransition::new(
                input,
                output,
                StateIndex::new(pos + 1),
                weight::one(),
            ));
        }
        m.state.push(state);
    }
    m
}

fn append_offset(m: &mut Machine, operand: &Machine, offset: u32) {
    for state in &operand.state {
        let mut s = state.clone();
        for t in &mut s.trans {
            t.dest = t.dest.offset(offset);
        }
        m.state.push(s);
    }
}

fn intern(
    pair: (StateIndex, StateIndex),
    slot: &mut HashMap<(StateIndex, StateIndex), usize>,
    pairs: &mut Vec<(StateIndex, StateIndex)>,
) -> usize {
    if let Some(&s) = slot.get(&pair) {
        return s;
    }
    let s = pairs.len();
    slot.insert(pair, s);
    pairs.push(pair);
    s
}

fn pair_name(m: &Machine, s: StateIndex) -> Value {
    m.state[s.idx()]
        .name
        .clone()
        .unwrap_or_else(|| json!(s.0))
}
