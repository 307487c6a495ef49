//! Numerically evaluated machines and the silent-path closure.
//!
//! An [`EvaluatedMachine`] is the compiled form of a symbolic
//! [`Machine`]: alphabets frozen into tokenizers, every transition weight
//! folded against a parameter binding and stored as a log weight, and
//! adjacency laid out as nested token-indexed maps for the benefit of
//! downstream dynamic programming. Once built it is immutable.

mod error;
pub mod linalg;

pub use self::error::EvalError;

use std::collections::BTreeMap;

use ndarray::Array2;
use smol_str::SmolStr;

use self::linalg::LuDecomposition;
use crate::constants::SUSPICIOUS_EXIT_PROBABILITY;
use crate::machine::{Machine, MachineState, MachineTransition, StateName};
use crate::params::Params;
use crate::report::{LogObserver, Observer};
use crate::tokenizer::Tokenizer;
use crate::types::{LogWeight, StateIndex, Token, TransIndex};
use crate::weight;

/// One evaluated transition: its log weight and its ordinal among the
/// source state's outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalTrans {
    /// Natural log of the evaluated weight.
    pub log_weight: LogWeight,
    /// Position of the edge in the source state's original emission order.
    pub trans_index: TransIndex,
}

/// Adjacency indexed by input token, then output token, then neighbour
/// state. Parallel transitions sharing labels and endpoints coexist in the
/// innermost vector, told apart by their `trans_index`.
pub type TokenAdjacency = BTreeMap<Token, BTreeMap<Token, BTreeMap<StateIndex, Vec<EvalTrans>>>>;

/// One state of an evaluated machine.
#[derive(Debug, Clone, Default)]
pub struct EvaluatedState {
    /// The symbolic state's name, carried over unchanged.
    pub name: StateName,
    /// Outgoing adjacency, keyed `(in, out) → dest`.
    pub outgoing: TokenAdjacency,
    /// Incoming adjacency, keyed `(in, out) → src`.
    pub incoming: TokenAdjacency,
    /// Number of outgoing transitions.
    pub n_transitions: u32,
    /// Sum of `n_transitions` over all earlier states; together with a
    /// `trans_index` this forms a dense global edge id.
    pub trans_offset: u32,
}

/// A machine compiled against a parameter binding.
#[derive(Debug, Clone)]
pub struct EvaluatedMachine {
    /// Tokenizer over the machine's input alphabet.
    pub input_tokenizer: Tokenizer,
    /// Tokenizer over the machine's output alphabet.
    pub output_tokenizer: Tokenizer,
    /// Evaluated states, same indexing as the source machine.
    pub state: Vec<EvaluatedState>,
    /// Total transition count.
    pub n_transitions: u32,
}

impl EvaluatedMachine {
    /// Compile `machine`, evaluating each weight against `params`; with no
    /// binding every log weight is 0 (weight 1), which suits structural
    /// queries and the closure of unweighted machines.
    ///
    /// The machine must be advancing.
    pub fn evaluate(machine: &Machine, params: Option<&Params>) -> Result<EvaluatedMachine, EvalError> {
        if !machine.is_advancing() {
            return Err(EvalError::NotAdvancing);
        }
        let input_tokenizer = Tokenizer::new(machine.input_alphabet());
        let output_tokenizer = Tokenizer::new(machine.output_alphabet());
        let mut state: Vec<EvaluatedState> = machine
            .state
            .iter()
            .map(|s| EvaluatedState {
                name: s.name.clone(),
                ..EvaluatedState::default()
            })
            .collect();

        let mut cumulative = 0u32;
        for (s, machine_state) in machine.state.iter().enumerate() {
            let src = StateIndex::new(s);
            let mut ti = TransIndex::ZERO;
            for trans in &machine_state.trans {
                let in_tok = lookup(&input_tokenizer, &trans.input)?;
                let out_tok = lookup(&output_tokenizer, &trans.output)?;
                let log_weight = match params {
                    Some(p) => LogWeight(weight::eval(&trans.weight, p)?.ln()),
                    None => LogWeight::ZERO,
                };
                let record = EvalTrans {
                    log_weight,
                    trans_index: ti,
                };
                state[s]
                    .outgoing
                    .entry(in_tok)
                    .or_default()
                    .entry(out_tok)
                    .or_default()
                    .entry(trans.dest)
                    .or_default()
                    .push(record);
                state[trans.dest.idx()]
                    .incoming
                    .entry(in_tok)
                    .or_default()
                    .entry(out_tok)
                    .or_default()
                    .entry(src)
                    .or_default()
                    .push(record);
                ti = ti.incr();
            }
            state[s].n_transitions = ti.0;
            state[s].trans_offset = cumulative;
            cumulative += ti.0;
        }

        Ok(EvaluatedMachine {
            input_tokenizer,
            output_tokenizer,
            state,
            n_transitions: cumulative,
        })
    }

    /// Number of states.
    #[inline(always)]
    pub fn n_states(&self) -> usize {
        self.state.len()
    }

    /// The start state.
    #[inline(always)]
    pub fn start_state(&self) -> StateIndex {
        StateIndex::ZERO
    }

    /// The end state.
    #[inline(always)]
    pub fn end_state(&self) -> StateIndex {
        debug_assert!(!self.state.is_empty(), "evaluated machine has no states");
        StateIndex::new(self.n_states().saturating_sub(1))
    }

    /// Global id of the first edge leaving `s`.
    pub fn trans_offset(&self, s: StateIndex) -> u32 {
        self.state[s.idx()].trans_offset
    }

    /// A state's name as compact JSON, falling back to its index.
    pub fn state_name_json(&self, s: StateIndex) -> String {
        match &self.state[s.idx()].name {
            Some(name) => name.to_string(),
            None => s.to_string(),
        }
    }

    /// Log-space closure over output-empty transition paths, warnings going
    /// to the `log` facade.
    pub fn sum_in_trans(&self) -> Result<Array2<f64>, EvalError> {
        self.sum_in_trans_observed(&mut LogObserver)
    }

    /// Log-space closure over output-empty transition paths.
    ///
    /// Entry `[s][d]` of the result is the log of the summed weight of all
    /// paths `s → d` that emit no output, the zero-length path included:
    /// in probability space the geometric series `I + N + N² + …`, summed
    /// in closed form as `(I − N)⁻¹`. A state whose output-empty exit
    /// probabilities sum past [`SUSPICIOUS_EXIT_PROBABILITY`] is reported
    /// to `observer`; a singular system fails with
    /// [`EvalError::NonConvergent`].
    pub fn sum_in_trans_observed(
        &self,
        observer: &mut dyn Observer,
    ) -> Result<Array2<f64>, EvalError> {
        let n = self.n_states();
        let mut one_minus_null = Array2::<f64>::eye(n);
        let mut p_exit = vec![0.0; n];
        for (s, state) in self.state.iter().enumerate() {
            for by_out in state.outgoing.values() {
                let by_dest = match by_out.get(&Token::EMPTY) {
                    Some(by_dest) => by_dest,
                    None => continue,
                };
                for (&dest, records) in by_dest {
                    for record in records {
                        let p = record.log_weight.to_probability();
                        one_minus_null[[s, dest.idx()]] -= p;
                        p_exit[s] += p;
                        if p_exit[s] > SUSPICIOUS_EXIT_PROBABILITY {
                            observer.warning(&format!(
                                "eliminating output-empty transitions: exit probability from state {} is {}",
                                self.state_name_json(StateIndex::new(s)),
                                p_exit[s]
                            ));
                        }
                    }
                }
            }
        }
        let lu = LuDecomposition::decompose(one_minus_null)
            .map_err(|_| EvalError::NonConvergent)?;
        Ok(lu.invert().mapv(f64::ln))
    }

    /// Unfold back into a symbolic machine with literal `exp(log_weight)`
    /// weights, restoring each state's original transition order.
    pub fn explicit_machine(&self) -> Machine {
        let mut m = Machine::default();
        for evaluated in &self.state {
            let mut edges: Vec<(TransIndex, MachineTransition)> =
                Vec::with_capacity(evaluated.n_transitions as usize);
            for (&in_tok, by_out) in &evaluated.outgoing {
                for (&out_tok, by_dest) in by_out {
                    for (&dest, records) in by_dest {
                        for record in records {
                            edges.push((
                                record.trans_index,
                                MachineTransition::new(
                                    self.input_tokenizer.sym(in_tok).unwrap_or_default(),
                                    self.output_tokenizer.sym(out_tok).unwrap_or_default(),
                                    dest,
                                    weight::lit(record.log_weight.to_probability()),
                                ),
                            ));
                        }
                    }
                }
            }
            edges.sort_by_key(|(ti, _)| *ti);
            m.state.push(MachineState {
                name: evaluated.name.clone(),
                trans: edges.into_iter().map(|(_, t)| t).collect(),
            });
        }
        m
    }
}

fn lookup(tokenizer: &Tokenizer, sym: &SmolStr) -> Result<Token, EvalError> {
    if sym.is_empty() {
        return Ok(Token::EMPTY);
    }
    tokenizer
        .tok(sym)
        .ok_or_else(|| EvalError::MissingSymbol(sym.clone()))
}
