//! Recursion combinators. Each one factors a recursive computation into
//! explicit quotation parts; tests always run under the snapshot
//! discipline so they can inspect operands without consuming them.
//!
//! `tailrec` iterates in a host loop rather than recursing, so
//! tail-recursive programs run in bounded host stack regardless of the
//! iteration count.

use std::rc::Rc;

use super::combinator::run_test;
use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::{Program, Value, SET_SIZE};
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("tailrec", tailrec),
        ("linrec", linrec),
        ("binrec", binrec),
        ("genrec", genrec),
        ("primrec", primrec),
        ("condlinrec", condlinrec),
        ("condnestrec", condnestrec),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

/// [P] [T] [R] -> ... — if P, run T and stop; else run R and repeat.
fn tailrec(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "tailrec")?;
    let again = m.pop_quotation("tailrec")?;
    let then = m.pop_quotation("tailrec")?;
    let test = m.pop_quotation("tailrec")?;
    loop {
        if run_test(m, &test)? {
            return m.execute(&then);
        }
        m.execute(&again)?;
    }
}

/// [P] [T] [R1] [R2] -> ... — if P, T; else R1, recurse, R2.
fn linrec(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "linrec")?;
    let r2 = m.pop_quotation("linrec")?;
    let r1 = m.pop_quotation("linrec")?;
    let then = m.pop_quotation("linrec")?;
    let test = m.pop_quotation("linrec")?;
    linrec_step(m, &test, &then, &r1, &r2)
}

fn linrec_step(
    m: &mut Machine,
    test: &Program,
    then: &Program,
    r1: &Program,
    r2: &Program,
) -> Result<(), Error> {
    if run_test(m, test)? {
        m.execute(then)
    } else {
        m.execute(r1)?;
        linrec_step(m, test, then, r1, r2)?;
        m.execute(r2)
    }
}

/// [P] [T] [R1] [R2] -> ... — R1 splits into two values; recurse on each
/// half, then R2 combines.
fn binrec(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "binrec")?;
    let r2 = m.pop_quotation("binrec")?;
    let r1 = m.pop_quotation("binrec")?;
    let then = m.pop_quotation("binrec")?;
    let test = m.pop_quotation("binrec")?;
    binrec_step(m, &test, &then, &r1, &r2)
}

fn binrec_step(
    m: &mut Machine,
    test: &Program,
    then: &Program,
    r1: &Program,
    r2: &Program,
) -> Result<(), Error> {
    if run_test(m, test)? {
        m.execute(then)
    } else {
        m.execute(r1)?;
        let second = m.pop()?;
        binrec_step(m, test, then, r1, r2)?;
        m.push(second);
        binrec_step(m, test, then, r1, r2)?;
        m.execute(r2)
    }
}

/// [P] [T] [R1] [R2] -> ... — if P, T; else R1, then R2 with the literal
/// self-reference `[P T R1 R2 genrec]` on top.
fn genrec(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "genrec")?;
    let r2 = m.pop_quotation("genrec")?;
    let r1 = m.pop_quotation("genrec")?;
    let then = m.pop_quotation("genrec")?;
    let test = m.pop_quotation("genrec")?;
    if run_test(m, &test)? {
        m.execute(&then)
    } else {
        m.execute(&r1)?;
        m.push(Value::list(vec![
            Value::List(test),
            Value::List(then),
            Value::List(r1),
            Value::List(Rc::clone(&r2)),
            super::builtin("genrec"),
        ]));
        m.execute(&r2)
    }
}

/// X [I] [C] -> ... — decompose X into constituents on the stack, run I
/// once for the base, then C once per constituent.
fn primrec(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "primrec")?;
    let combine = m.pop_quotation("primrec")?;
    let init = m.pop_quotation("primrec")?;
    let constituents: Vec<Value> = match m.pop()? {
        Value::Int(n) => {
            if n < 0 {
                return Err(Error::expected("primrec", "non-negative integer"));
            }
            (1..=n).map(Value::Int).collect()
        }
        Value::List(items) => items.as_ref().clone(),
        Value::Str(s) => s.chars().map(|ch| Value::Char(ch as i64)).collect(),
        Value::Set(bits) => (0..SET_SIZE)
            .filter(|member| bits & (1 << member) != 0)
            .map(|member| Value::Int(i64::from(member)))
            .collect(),
        _ => return Err(Error::expected("primrec", "aggregate or integer")),
    };
    // first constituent ends up on top of the stack
    for item in constituents.iter().rev() {
        m.push(item.clone());
    }
    m.execute(&init)?;
    for _ in &constituents {
        m.execute(&combine)?;
    }
    Ok(())
}

/// Clause list `[[C1 B1 P1?] ... [D P?]]` — the matching clause's body
/// runs; a present post part recurses on the whole clause list first.
fn condlinrec(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "condlinrec")?;
    let clauses = m.pop_quotation("condlinrec")?;
    condlinrec_step(m, &clauses)
}

fn condlinrec_step(m: &mut Machine, clauses: &Program) -> Result<(), Error> {
    for (index, clause) in clauses.iter().enumerate() {
        let Value::List(parts) = clause else {
            return Err(Error::expected("condlinrec", "non-empty clause"));
        };
        if parts.is_empty() {
            return Err(Error::expected("condlinrec", "non-empty clause"));
        }
        let last = index + 1 == clauses.len();
        let (body, post) = if last {
            (parts.first(), parts.get(1))
        } else {
            let Value::List(test) = &parts[0] else {
                return Err(Error::expected("condlinrec", "quotation condition"));
            };
            if !run_test(m, test)? {
                continue;
            }
            (parts.get(1), parts.get(2))
        };
        if let Some(Value::List(body)) = body {
            let body = Rc::clone(body);
            m.execute(&body)?;
        }
        if let Some(Value::List(post)) = post {
            if !post.is_empty() {
                let post = Rc::clone(post);
                condlinrec_step(m, clauses)?;
                m.execute(&post)?;
            }
        }
        return Ok(());
    }
    Ok(())
}

/// Clause list `[[C1 R1 R2...] ... [D...]]` — the matching clause's parts
/// run with a recursive call between each adjacent pair.
fn condnestrec(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "condnestrec")?;
    let clauses = m.pop_quotation("condnestrec")?;
    condnestrec_step(m, &clauses)
}

fn condnestrec_step(m: &mut Machine, clauses: &Program) -> Result<(), Error> {
    for (index, clause) in clauses.iter().enumerate() {
        let Value::List(parts) = clause else {
            return Err(Error::expected("condnestrec", "non-empty clause"));
        };
        if parts.is_empty() {
            return Err(Error::expected("condnestrec", "non-empty clause"));
        }
        let last = index + 1 == clauses.len();
        let run_parts: &[Value] = if last {
            parts
        } else {
            let Value::List(test) = &parts[0] else {
                return Err(Error::expected("condnestrec", "quotation condition"));
            };
            if !run_test(m, test)? {
                continue;
            }
            &parts[1..]
        };
        let run_parts = run_parts.to_vec();
        for (i, part) in run_parts.iter().enumerate() {
            if let Value::List(body) = part {
                let body = Rc::clone(body);
                m.execute(&body)?;
            }
            if i + 1 < run_parts.len() {
                condnestrec_step(m, clauses)?;
            }
        }
        return Ok(());
    }
    Ok(())
}
