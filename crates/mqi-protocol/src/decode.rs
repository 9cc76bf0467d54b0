//! JSON answer-payload decoding into [`Term`] (spec §4.B).

use crate::term::Term;
use num_bigint::BigInt;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("invalid answer JSON: {0}")]
    InvalidJson(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// The top-level dispatch of an engine reply (spec §6): `true(<solutions>)`,
/// `false`, or `exception(<kind>)`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReply {
    True(Term),
    False,
    Exception(Term),
}

/// Parse one frame payload (already stripped of its `.\n` terminator) as a
/// JSON reply and normalize its top-level shape.
pub fn decode_reply(payload: &str) -> Result<RawReply, DecodeError> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| DecodeError::InvalidJson(format!("{e}")))?;
    let term = decode_term(&value)?;
    match &term {
        Term::Atom(a) if a == "false" => Ok(RawReply::False),
        Term::Compound { functor, args } if functor == "true" && args.len() == 1 => {
            Ok(RawReply::True(args[0].clone()))
        }
        Term::Compound { functor, args } if functor == "exception" && args.len() == 1 => {
            Ok(RawReply::Exception(args[0].clone()))
        }
        _ => Err(DecodeError::ProtocolViolation(format!(
            "expected true(_)/false/exception(_), got {term}"
        ))),
    }
}

/// Recursively decode a JSON value into a [`Term`], per the normalization
/// rules in spec §4.B.
pub fn decode_term(value: &Value) -> Result<Term, DecodeError> {
    match value {
        Value::String(s) => {
            if s == "[]" {
                Ok(Term::List(vec![]))
            } else {
                Ok(Term::Atom(s.clone()))
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Term::Integer(BigInt::from(i)))
            } else if n.is_f64() && n.to_string().contains(['.', 'e', 'E']) {
                n.as_f64()
                    .map(Term::Float)
                    .ok_or_else(|| DecodeError::InvalidJson(format!("bad number: {n}")))
            } else {
                // Integer too large for i64 but has no fractional part:
                // arbitrary-precision via the decimal string form.
                n.to_string()
                    .parse::<BigInt>()
                    .map(Term::Integer)
                    .map_err(|e| DecodeError::InvalidJson(format!("bad integer literal: {e}")))
            }
        }
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Term::List(vec![]))
            } else {
                let decoded: Result<Vec<Term>, DecodeError> =
                    items.iter().map(decode_term).collect();
                Ok(Term::List(decoded?))
            }
        }
        Value::Object(map) => decode_compound(map),
        Value::Bool(b) => Ok(Term::Atom(b.to_string())),
        Value::Null => Ok(Term::Atom("null".to_owned())),
    }
}

fn decode_compound(map: &serde_json::Map<String, Value>) -> Result<Term, DecodeError> {
    let functor = map
        .get("functor")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::InvalidJson("object missing string 'functor'".into()))?;
    let args_value = map
        .get("args")
        .ok_or_else(|| DecodeError::InvalidJson("object missing 'args'".into()))?;
    let Value::Array(raw_args) = args_value else {
        return Err(DecodeError::InvalidJson("'args' must be an array".into()));
    };

    if functor == "variable" && raw_args.len() == 1 {
        let name = raw_args[0]
            .as_str()
            .ok_or_else(|| DecodeError::InvalidJson("variable name must be a string".into()))?;
        return Ok(Term::Variable(name.to_owned()));
    }

    let args: Result<Vec<Term>, DecodeError> = raw_args.iter().map(decode_term).collect();
    Ok(Term::Compound {
        functor: functor.to_owned(),
        args: args?,
    })
}

/// Extract a [`Solution`](crate::Solution) (variable-name -> Term mapping)
/// from one answer's binding list, per spec §4.B "Binding extraction".
///
/// A binding is `=(Variable(v), T)` or, when the engine mis-types the
/// variable name as a bare atom, `=(Atom(v), T)` — both are accepted with
/// identical meaning.
pub fn extract_binding(term: &Term) -> Result<(String, Term), DecodeError> {
    match term {
        Term::Compound { functor, args } if functor == "=" && args.len() == 2 => {
            let name = match &args[0] {
                Term::Variable(v) => v.clone(),
                Term::Atom(a) => a.clone(),
                other => {
                    return Err(DecodeError::ProtocolViolation(format!(
                        "binding left-hand side is not a name-bearing term: {other}"
                    )));
                }
            };
            Ok((name, args[1].clone()))
        }
        other => Err(DecodeError::ProtocolViolation(format!(
            "expected a '=' binding compound, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_atom_and_empty_list_equivalently() {
        assert_eq!(
            decode_term(&serde_json::json!("[]")).unwrap(),
            Term::List(vec![])
        );
        assert_eq!(
            decode_term(&serde_json::json!([])).unwrap(),
            Term::List(vec![])
        );
    }

    #[test]
    fn decodes_integer_vs_float() {
        assert_eq!(decode_term(&serde_json::json!(42)).unwrap(), Term::integer(42));
        assert_eq!(decode_term(&serde_json::json!(1.5)).unwrap(), Term::Float(1.5));
    }

    #[test]
    fn decodes_variable_compound() {
        let v = serde_json::json!({"functor": "variable", "args": ["X"]});
        assert_eq!(decode_term(&v).unwrap(), Term::Variable("X".into()));
    }

    #[test]
    fn decodes_ordinary_compound() {
        let v = serde_json::json!({"functor": "member", "args": ["a", "b"]});
        let decoded = decode_term(&v).unwrap();
        assert_eq!(
            decoded,
            Term::compound("member", vec![Term::atom("a"), Term::atom("b")])
        );
    }

    #[test]
    fn decode_reply_dispatches_true_false_exception() {
        assert_eq!(decode_reply("\"false\"").unwrap(), RawReply::False);
        assert_eq!(
            decode_reply(r#"{"functor":"true","args":[[]]}"#).unwrap(),
            RawReply::True(Term::List(vec![]))
        );
        assert_eq!(
            decode_reply(r#"{"functor":"exception","args":["time_limit_exceeded"]}"#).unwrap(),
            RawReply::Exception(Term::atom("time_limit_exceeded"))
        );
    }

    #[test]
    fn decode_reply_rejects_unknown_top_level_shape() {
        let err = decode_reply(r#"{"functor":"foo","args":[1]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::ProtocolViolation(_)));
    }

    #[test]
    fn extract_binding_accepts_variable_or_atom_lhs() {
        let via_var = Term::compound("=", vec![Term::Variable("X".into()), Term::integer(1)]);
        assert_eq!(extract_binding(&via_var).unwrap(), ("X".to_owned(), Term::integer(1)));

        let via_atom = Term::compound("=", vec![Term::atom("X"), Term::integer(1)]);
        assert_eq!(extract_binding(&via_atom).unwrap(), ("X".to_owned(), Term::integer(1)));
    }

    #[test]
    fn extract_binding_rejects_non_name_lhs() {
        let bad = Term::compound("=", vec![Term::integer(1), Term::integer(2)]);
        assert!(matches!(
            extract_binding(&bad),
            Err(DecodeError::ProtocolViolation(_))
        ));
    }
}
