//! Type predicates and the `ifTYPE` dispatch family.

use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::Value;
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("integer", is_integer),
        ("char", is_char),
        ("logical", is_logical),
        ("float", is_float),
        ("string", is_string),
        ("list", is_list),
        ("set", is_set),
        ("leaf", is_leaf),
        ("user", is_user),
        ("file", is_file),
        ("ifinteger", if_integer),
        ("ifchar", if_char),
        ("iffloat", if_float),
        ("ifstring", if_string),
        ("iflist", if_list),
        ("ifset", if_set),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

fn predicate(m: &mut Machine, op: &str, test: fn(&Value) -> bool) -> Result<(), Error> {
    m.need(1, op)?;
    let v = m.pop()?;
    m.push(Value::Bool(test(&v)));
    Ok(())
}

fn is_integer(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "integer", |v| matches!(v, Value::Int(_)))
}

fn is_char(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "char", |v| matches!(v, Value::Char(_)))
}

fn is_logical(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "logical", |v| matches!(v, Value::Bool(_)))
}

fn is_float(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "float", |v| matches!(v, Value::Float(_)))
}

fn is_string(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "string", |v| matches!(v, Value::Str(_)))
}

fn is_list(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "list", |v| matches!(v, Value::List(_)))
}

fn is_set(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "set", |v| matches!(v, Value::Set(_)))
}

/// Anything that is not a list.
fn is_leaf(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "leaf", |v| !matches!(v, Value::List(_)))
}

fn is_user(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "user", |v| matches!(v, Value::Word(_)))
}

fn is_file(m: &mut Machine) -> Result<(), Error> {
    predicate(m, "file", |v| matches!(v, Value::File(_)))
}

/// X [T] [F] -> X ... — run T when X matches the type, else F; X stays.
fn dispatch(m: &mut Machine, op: &str, test: fn(&Value) -> bool) -> Result<(), Error> {
    m.need(3, op)?;
    let if_other = m.pop_quotation(op)?;
    let if_match = m.pop_quotation(op)?;
    let matched = test(m.peek()?);
    if matched {
        m.execute(&if_match)
    } else {
        m.execute(&if_other)
    }
}

fn if_integer(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "ifinteger", |v| matches!(v, Value::Int(_)))
}

fn if_char(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "ifchar", |v| matches!(v, Value::Char(_)))
}

fn if_float(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "iffloat", |v| matches!(v, Value::Float(_)))
}

fn if_string(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "ifstring", |v| matches!(v, Value::Str(_)))
}

fn if_list(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "iflist", |v| matches!(v, Value::List(_)))
}

fn if_set(m: &mut Machine) -> Result<(), Error> {
    dispatch(m, "ifset", |v| matches!(v, Value::Set(_)))
}
