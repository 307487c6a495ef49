/*! Construction, composition and numerical evaluation of weighted
finite-state transducers.

A [`machine::Machine`] is a directed graph whose edges carry an input
symbol, an output symbol and a symbolic [`weight::WeightExpr`] over named
parameters, describing a weighted relation between input and output
symbol sequences. Machines are assembled with the algebra in
[`machine::algebra`] (concatenation, union, Kleene closure, composition,
reversal), brought into structural normal forms with
[`machine::normalize`], and folded against a [`params::Params`] binding
into an [`evaluated::EvaluatedMachine`]: a token-indexed numerical view
with log-space weights and a closed-form sum over silent transition
paths, ready for downstream dynamic programming (Forward, Viterbi and
friends, which live outside this crate).

Everything is value-typed and immutable once built; the library keeps no
global state, so machines on different threads never contend.

Machines and parameter bindings read and write a small JSON dialect; see
[`json`].
*/

pub mod constants;
pub mod evaluated;
pub mod json;
pub mod machine;
pub mod params;
pub mod report;
pub mod tokenizer;
pub mod types;
pub mod weight;
