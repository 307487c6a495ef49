//! JSON reading and writing for machines, parameters and weights.
//!
//! The machine format is a `{"state": [...]}` object where each state
//! carries its index `"n"`, an optional free-form `"id"` and its
//! transitions; weight expressions are numbers, parameter-name strings, or
//! single-key operator objects (`"+"`, `"*"`, `"-"`, `"/"`, `"log"`,
//! `"exp"`, `"pow"`). Reading validates against this schema and fails with
//! [`CodecError::SchemaViolation`]; `write ∘ read` is semantic identity.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::evaluated::EvaluatedMachine;
use crate::machine::{Machine, MachineState, MachineTransition};
use crate::params::Params;
use crate::types::{StateIndex, Token};
use crate::weight::{self, WeightExpr};

/// Errors raised by JSON input and output.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The document parsed but does not match the expected schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// The document is not valid JSON.
    #[error("JSON syntax error")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the underlying file failed.
    #[error("IO error")]
    Io(#[from] std::io::Error),
}

fn schema_violation(message: impl Into<String>) -> CodecError {
    CodecError::SchemaViolation(message.into())
}

/// Parse a weight expression from its JSON form: a non-negative number, a
/// parameter-name string, or a single-key operator object.
pub fn weight_from_json(value: &Value) -> Result<WeightExpr, CodecError> {
    match value {
        Value::Number(n) => {
            let x = n
                .as_f64()
                .ok_or_else(|| schema_violation("weight literal is not representable"))?;
            if x < 0.0 {
                return Err(schema_violation("weight literals must be non-negative"));
            }
            Ok(weight::lit(x))
        }
        Value::String(name) => Ok(weight::param(name.as_str())),
        Value::Object(map) if map.len() == 1 => {
            let (op, arg) = match map.iter().next() {
                Some(entry) => entry,
                None => return Err(schema_violation("weight operator object is empty")),
            };
            let args = arg
                .as_array()
                .ok_or_else(|| schema_violation(format!("\"{}\" takes an argument array", op)))?;
            match op.as_str() {
                "+" => Ok(weight::sum(weights_from_json(args)?)),
                "*" => Ok(weight::product(weights_from_json(args)?)),
                "-" => match weights_from_json(args)?.as_slice() {
                    [a, b] => Ok(weight::sub(a.clone(), b.clone())),
                    _ => Err(schema_violation("\"-\" takes exactly two arguments")),
                },
                "/" => match weights_from_json(args)?.as_slice() {
                    [x] => Ok(weight::reciprocal(x.clone())),
                    [a, b] => Ok(weight::product(vec![
                        a.clone(),
                        weight::reciprocal(b.clone()),
                    ])),
                    _ => Err(schema_violation("\"/\" takes one or two arguments")),
                },
                "log" => match weights_from_json(args)?.as_slice() {
                    [x] => Ok(weight::log_of(x.clone())),
                    _ => Err(schema_violation("\"log\" takes exactly one argument")),
                },
                "exp" => match weights_from_json(args)?.as_slice() {
                    [x] => Ok(weight::exp_of(x.clone())),
                    _ => Err(schema_violation("\"exp\" takes exactly one argument")),
                },
                "pow" => {
                    if args.len() != 2 {
                        return Err(schema_violation("\"pow\" takes a base and an exponent"));
                    }
                    let base = weight_from_json(&args[0])?;
                    let exponent = args[1]
                        .as_i64()
                        .and_then(|k| i32::try_from(k).ok())
                        .ok_or_else(|| {
                            schema_violation("\"pow\" exponent must be a small integer")
                        })?;
                    Ok(weight::pow_of(base, exponent))
                }
                other => Err(schema_violation(format!(
                    "unknown weight operator \"{}\"",
                    other
                ))),
            }
        }
        _ => Err(schema_violation(
            "weight must be a number, a parameter name or an operator object",
        )),
    }
}

fn weights_from_json(values: &[Value]) -> Result<Vec<WeightExpr>, CodecError> {
    values.iter().map(weight_from_json).collect()
}

/// Render a weight expression to its JSON form.
pub fn weight_to_json(expr: &WeightExpr) -> Value {
    match expr {
        WeightExpr::Lit(x) => json!(x),
        WeightExpr::Param(name) => json!(name.as_str()),
        WeightExpr::Sum(terms) => json!({ "+": weights_to_json(terms) }),
        WeightExpr::Product(factors) => json!({ "*": weights_to_json(factors) }),
        WeightExpr::Sub(a, b) => json!({ "-": [weight_to_json(a), weight_to_json(b)] }),
        WeightExpr::Reciprocal(x) => json!({ "/": [weight_to_json(x)] }),
        WeightExpr::Log(x) => json!({ "log": [weight_to_json(x)] }),
        WeightExpr::Exp(x) => json!({ "exp": [weight_to_json(x)] }),
        WeightExpr::Pow(base, exponent) => json!({ "pow": [weight_to_json(base), exponent] }),
    }
}

fn weights_to_json(exprs: &[WeightExpr]) -> Vec<Value> {
    exprs.iter().map(weight_to_json).collect()
}

impl Machine {
    /// Read a machine from a parsed JSON document.
    pub fn from_json_value(value: &Value) -> Result<Machine, CodecError> {
        let obj = value
            .as_object()
            .ok_or_else(|| schema_violation("machine must be an object"))?;
        let states = obj
            .get("state")
            .and_then(Value::as_array)
            .ok_or_else(|| schema_violation("machine requires a \"state\" array"))?;
        if states.is_empty() {
            return Err(schema_violation("machine requires at least one state"));
        }

        let mut m = Machine {
            state: Vec::with_capacity(states.len()),
        };
        for (i, state_value) in states.iter().enumerate() {
            let state_obj = state_value
                .as_object()
                .ok_or_else(|| schema_violation(format!("state {} must be an object", i)))?;
            let n = state_obj
                .get("n")
                .and_then(Value::as_u64)
                .ok_or_else(|| schema_violation(format!("state {} requires an index \"n\"", i)))?;
            if n != i as u64 {
                return Err(schema_violation(format!(
                    "state at position {} is numbered {}",
                    i, n
                )));
            }
            let mut state = MachineState {
                name: state_obj.get("id").cloned(),
                trans: Vec::new(),
            };
            if let Some(trans_value) = state_obj.get("trans") {
                let trans = trans_value.as_array().ok_or_else(|| {
                    schema_violation(format!("state {} \"trans\" must be an array", i))
                })?;
                for t in trans {
                    state.trans.push(transition_from_json(t, states.len())?);
                }
            }
            m.state.push(state);
        }
        Ok(m)
    }

    /// Render to a JSON document. Empty labels and unit weights are
    /// omitted.
    pub fn to_json_value(&self) -> Value {
        let states: Vec<Value> = self
            .state
            .iter()
            .enumerate()
            .map(|(i, state)| {
                let mut obj = Map::new();
                obj.insert("n".into(), json!(i));
                if let Some(name) = &state.name {
                    obj.insert("id".into(), name.clone());
                }
                if !state.trans.is_empty() {
                    let trans: Vec<Value> = state.trans.iter().map(transition_to_json).collect();
                    obj.insert("trans".into(), Value::Array(trans));
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "state": states })
    }

    /// Read a machine from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Machine, CodecError> {
        Machine::from_json_value(&serde_json::from_str(text)?)
    }

    /// Read a machine from a reader carrying a JSON document.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Machine, CodecError> {
        Machine::from_json_value(&serde_json::from_reader(reader)?)
    }

    /// Read a machine from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Machine, CodecError> {
        Machine::from_json_reader(BufReader::new(File::open(path)?))
    }

    /// Pretty-print to a JSON string.
    pub fn to_json_string(&self) -> String {
        let mut text = serde_json::to_string_pretty(&self.to_json_value())
            .unwrap_or_else(|_| String::from("{}"));
        text.push('\n');
        text
    }

    /// Pretty-print to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_json_value())?;
        writeln!(writer)?;
        Ok(())
    }
}

fn transition_from_json(value: &Value, n_states: usize) -> Result<MachineTransition, CodecError> {
    let obj = value
        .as_object()
        .ok_or_else(|| schema_violation("transition must be an object"))?;
    let to = obj
        .get("to")
        .and_then(Value::as_u64)
        .ok_or_else(|| schema_violation("transition requires a destination \"to\""))?;
    if to >= n_states as u64 {
        return Err(schema_violation(format!(
            "transition destination {} is out of range",
            to
        )));
    }
    let input = label_from_json(obj, "in")?;
    let output = label_from_json(obj, "out")?;
    let weight = match obj.get("weight") {
        Some(w) => weight_from_json(w)?,
        None => weight::one(),
    };
    Ok(MachineTransition::new(
        input,
        output,
        StateIndex(to as u32),
        weight,
    ))
}

fn label_from_json<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, CodecError> {
    match obj.get(key) {
        None => Ok(""),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(schema_violation(format!(
            "transition \"{}\" must be a string",
            key
        ))),
    }
}

fn transition_to_json(t: &MachineTransition) -> Value {
    let mut obj = Map::new();
    obj.insert("to".into(), json!(t.dest.0));
    if !t.input.is_empty() {
        obj.insert("in".into(), json!(t.input.as_str()));
    }
    if !t.output.is_empty() {
        obj.insert("out".into(), json!(t.output.as_str()));
    }
    if t.weight != weight::one() {
        obj.insert("weight".into(), weight_to_json(&t.weight));
    }
    Value::Object(obj)
}

impl Params {
    /// Read a parameter binding from a parsed JSON document: a flat object
    /// whose values are numbers.
    pub fn from_json_value(value: &Value) -> Result<Params, CodecError> {
        let obj = value
            .as_object()
            .ok_or_else(|| schema_violation("params must be an object"))?;
        let mut pairs = Vec::with_capacity(obj.len());
        for (name, v) in obj {
            let x = v.as_f64().ok_or_else(|| {
                schema_violation(format!("parameter \"{}\" must be a number", name))
            })?;
            pairs.push((name.as_str(), x));
        }
        Ok(pairs.into_iter().collect())
    }

    /// Render to a JSON document with names in sorted order.
    pub fn to_json_value(&self) -> Value {
        let mut sorted: Vec<(&str, f64)> = self.iter().map(|(k, v)| (k.as_str(), v)).collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut obj = Map::new();
        for (name, v) in sorted {
            obj.insert(name.into(), json!(v));
        }
        Value::Object(obj)
    }

    /// Read a binding from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Params, CodecError> {
        Params::from_json_value(&serde_json::from_str(text)?)
    }

    /// Read a binding from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Params, CodecError> {
        Params::from_json_value(&serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }

    /// Pretty-print to a JSON file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.to_json_value())?;
        writeln!(writer)?;
        Ok(())
    }
}

impl EvaluatedMachine {
    /// Render the evaluated form: per state, `incoming` and `outgoing`
    /// arrays of `{from/to, in, out, logWeight}` records. Empty labels are
    /// omitted. This form is write-only.
    pub fn to_json_value(&self) -> Value {
        let states: Vec<Value> = (0..self.n_states())
            .map(|s| {
                let state = &self.state[s];
                let mut obj = Map::new();
                obj.insert("n".into(), json!(s));
                if let Some(name) = &state.name {
                    obj.insert("id".into(), name.clone());
                }
                let incoming = self.adjacency_to_json(&state.incoming, "from");
                if !incoming.is_empty() {
                    obj.insert("incoming".into(), Value::Array(incoming));
                }
                let outgoing = self.adjacency_to_json(&state.outgoing, "to");
                if !outgoing.is_empty() {
                    obj.insert("outgoing".into(), Value::Array(outgoing));
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "state": states })
    }

    fn adjacency_to_json(
        &self,
        adjacency: &crate::evaluated::TokenAdjacency,
        neighbour_key: &str,
    ) -> Vec<Value> {
        let mut records = Vec::new();
        for (&in_tok, by_out) in adjacency {
            for (&out_tok, by_neighbour) in by_out {
                for (&neighbour, transes) in by_neighbour {
                    for t in transes {
                        let mut obj = Map::new();
                        obj.insert(neighbour_key.into(), json!(neighbour.0));
                        if in_tok != Token::EMPTY {
                            if let Some(sym) = self.input_tokenizer.sym(in_tok) {
                                obj.insert("in".into(), json!(sym));
                            }
                        }
                        if out_tok != Token::EMPTY {
                            if let Some(sym) = self.output_tokenizer.sym(out_tok) {
                                obj.insert("out".into(), json!(sym));
                            }
                        }
                        obj.insert("logWeight".into(), json!(t.log_weight.0));
                        records.push(Value::Object(obj));
                    }
                }
            }
        }
        records
    }

    /// Pretty-print the evaluated form to a JSON string.
    pub fn to_json_string(&self) -> String {
        let mut text = serde_json::to_string_pretty(&self.to_json_value())
            .unwrap_or_else(|_| String::from("{}"));
        text.push('\n');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weight::{lit, log_of, param, pow_of, product, reciprocal, sub, sum};

    #[test]
    fn machine_round_trips_through_json() {
        let m = Machine::generator("g", &["A"]).union_of_prob(
            &Machine::acceptor("a", &["B", "C"]),
            param("p"),
        );
        let round_tripped = Machine::from_json_value(&m.to_json_value()).unwrap();
        assert_eq!(round_tripped, m);
    }

    #[test]
    fn params_round_trip_through_json() {
        let p = Params::from_json_str(r#"{"a": 0.25, "b": 2}"#).unwrap();
        assert_eq!(p.get("a"), Some(0.25));
        assert_eq!(p.get("b"), Some(2.0));
        let round_tripped = Params::from_json_value(&p.to_json_value()).unwrap();
        assert_eq!(round_tripped, p);
    }

    #[test]
    fn weight_forms_round_trip() {
        let exprs = vec![
            lit(0.5),
            param("p"),
            sum(vec![param("a"), param("b")]),
            product(vec![param("a"), lit(2.0)]),
            sub(param("p"), lit(0.25)),
            reciprocal(param("q")),
            log_of(param("q")),
            pow_of(param("q"), 3),
        ];
        for expr in exprs {
            let round_tripped = weight_from_json(&weight_to_json(&expr)).unwrap();
            assert_eq!(round_tripped, expr);
        }
    }

    #[test]
    fn missing_weight_defaults_to_one() {
        let m = Machine::from_json_str(
            r#"{"state": [{"n": 0, "trans": [{"to": 1, "out": "A"}]}, {"n": 1}]}"#,
        )
        .unwrap();
        assert_eq!(m.state[0].trans[0].weight, lit(1.0));
        assert_eq!(m.state[0].trans[0].output, "A");
        assert!(m.state[0].trans[0].input_empty());
    }

    #[test]
    fn schema_violations_are_reported() {
        let bad = [
            r#"[]"#,
            r#"{}"#,
            r#"{"state": []}"#,
            r#"{"state": [{"n": 1}]}"#,
            r#"{"state": [{"n": 0, "trans": [{"to": 5}]}]}"#,
            r#"{"state": [{"n": 0, "trans": [{"to": 0, "weight": -1}]}]}"#,
            r#"{"state": [{"n": 0, "trans": [{"to": 0, "weight": true}]}]}"#,
            r#"{"state": [{"n": 0, "trans": [{"to": 0, "weight": {"hypot": [1]}}]}]}"#,
            r#"{"state": [{"n": 0, "trans": [{"to": 0, "in": 3}]}]}"#,
        ];
        for text in bad {
            assert!(
                matches!(
                    Machine::from_json_str(text),
                    Err(CodecError::SchemaViolation(_))
                ),
                "accepted: {}",
                text
            );
        }
        assert!(matches!(
            Params::from_json_str(r#"{"p": "x"}"#),
            Err(CodecError::SchemaViolation(_))
        ));
    }

    #[test]
    fn evaluated_machine_writes_adjacency() {
        let m = Machine::generator("g", &["A"]);
        let e = crate::evaluated::EvaluatedMachine::evaluate(&m, None).unwrap();
        let v = e.to_json_value();
        let states = v["state"].as_array().unwrap();
        assert_eq!(states.len(), 2);
        let outgoing = states[0]["outgoing"].as_array().unwrap();
        assert_eq!(outgoing[0]["to"], json!(1));
        assert_eq!(outgoing[0]["out"], json!("A"));
        assert_eq!(outgoing[0]["logWeight"], json!(0.0));
        assert!(outgoing[0].get("in").is_none());
        let incoming = states[1]["incoming"].as_array().unwrap();
        assert_eq!(incoming[0]["from"], json!(0));
    }
}
