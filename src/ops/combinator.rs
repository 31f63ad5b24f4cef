//! Combinators: operators that consume quotations as control arguments.
//!
//! The ones that run a test against the current stack (`ifte`, `cond`,
//! `nullary`, `while`, ...) snapshot the operand stack by value, run the
//! test, restore the snapshot, and only then run the chosen branch, so a
//! test can consume operands freely without affecting the branch.

use std::rc::Rc;

use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::{Program, Value, SET_SIZE};
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("i", i),
        ("x", x),
        ("dip", dip),
        ("dipd", dipd),
        ("dipdd", dipdd),
        ("app1", app1),
        ("app2", app2),
        ("app3", app3),
        ("branch", branch),
        ("ifte", ifte),
        ("cond", cond),
        ("times", times),
        ("step", step),
        ("map", map),
        ("filter", filter),
        ("fold", fold),
        ("construct", construct),
        ("nullary", nullary),
        ("unary", unary),
        ("unary2", unary2),
        ("binary", binary),
        ("ternary", ternary),
        ("cleave", cleave),
        ("infra", infra),
        ("treestep", treestep),
        ("treerec", treerec),
        ("treegenrec", treegenrec),
        ("some", some),
        ("all", all),
        ("while", while_op),
        ("opcase", opcase),
        ("case", case),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

/// Run a test quotation under the snapshot discipline and report its
/// truthiness; the stack is restored before returning.
pub(super) fn run_test(m: &mut Machine, test: &Program) -> Result<bool, Error> {
    let saved = m.stack.clone();
    m.execute(test)?;
    let outcome = m.pop()?;
    m.stack = saved;
    Ok(outcome.is_truthy())
}

/// Elements of an aggregate in iteration order, as values.
pub(super) fn elements(agg: &Value, op: &str) -> Result<Vec<Value>, Error> {
    match agg {
        Value::List(items) => Ok(items.as_ref().clone()),
        Value::Str(s) => Ok(s.chars().map(|ch| Value::Char(ch as i64)).collect()),
        Value::Set(bits) => Ok((0..SET_SIZE)
            .filter(|member| bits & (1 << member) != 0)
            .map(|member| Value::Int(i64::from(member)))
            .collect()),
        _ => Err(Error::expected(op, "aggregate")),
    }
}

/// [P] -> ...
fn i(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "i")?;
    let quot = m.pop_quotation("i")?;
    m.execute(&quot)
}

/// [P] -> [P] ... — execute without consuming the quotation.
fn x(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "x")?;
    let Value::List(quot) = m.peek()? else {
        return Err(Error::expected("x", "quotation"));
    };
    let quot = Rc::clone(quot);
    m.execute(&quot)
}

/// X [P] -> ... X
fn dip(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "dip")?;
    let quot = m.pop_quotation("dip")?;
    let x1 = m.pop()?;
    m.execute(&quot)?;
    m.push(x1);
    Ok(())
}

/// Y X [P] -> ... Y X
fn dipd(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "dipd")?;
    let quot = m.pop_quotation("dipd")?;
    let x1 = m.pop()?;
    let y1 = m.pop()?;
    m.execute(&quot)?;
    m.push(y1);
    m.push(x1);
    Ok(())
}

/// Z Y X [P] -> ... Z Y X
fn dipdd(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "dipdd")?;
    let quot = m.pop_quotation("dipdd")?;
    let x1 = m.pop()?;
    let y1 = m.pop()?;
    let z1 = m.pop()?;
    m.execute(&quot)?;
    m.push(z1);
    m.push(y1);
    m.push(x1);
    Ok(())
}

/// X [P] -> R
fn app1(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "app1")?;
    let quot = m.pop_quotation("app1")?;
    m.execute(&quot)
}

/// X Y [P] -> Rx Ry, applying P to X first, then to Y.
fn app2(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "app2")?;
    let quot = m.pop_quotation("app2")?;
    let y = m.pop()?;
    let x1 = m.pop()?;
    m.push(x1);
    m.execute(&quot)?;
    let rx = m.pop()?;
    m.push(y);
    m.execute(&quot)?;
    let ry = m.pop()?;
    m.push(rx);
    m.push(ry);
    Ok(())
}

/// X Y Z [P] -> Rx Ry Rz
fn app3(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "app3")?;
    let quot = m.pop_quotation("app3")?;
    let z = m.pop()?;
    let y = m.pop()?;
    let x1 = m.pop()?;
    m.push(x1);
    m.execute(&quot)?;
    let rx = m.pop()?;
    m.push(y);
    m.execute(&quot)?;
    let ry = m.pop()?;
    m.push(z);
    m.execute(&quot)?;
    let rz = m.pop()?;
    m.push(rx);
    m.push(ry);
    m.push(rz);
    Ok(())
}

/// B [T] [F] -> ... without any stack restoration.
fn branch(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "branch")?;
    let if_false = m.pop_quotation("branch")?;
    let if_true = m.pop_quotation("branch")?;
    let cond = m.pop()?;
    if cond.is_truthy() {
        m.execute(&if_true)
    } else {
        m.execute(&if_false)
    }
}

/// [B] [T] [F] -> ... with the test run under a snapshot. A non-quotation
/// first argument is used directly by truthiness.
fn ifte(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "ifte")?;
    let if_false = m.pop_quotation("ifte")?;
    let if_true = m.pop_quotation("ifte")?;
    let test = m.pop()?;
    let outcome = match &test {
        Value::List(quot) => run_test(m, quot)?,
        other => other.is_truthy(),
    };
    if outcome {
        m.execute(&if_true)
    } else {
        m.execute(&if_false)
    }
}

/// Clause list: every non-final clause is `[test body...]`; the final
/// clause is the default and runs whole.
fn cond(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "cond")?;
    let clauses = m.pop_quotation("cond")?;
    for (index, clause) in clauses.iter().enumerate() {
        let Value::List(parts) = clause else {
            return Err(Error::expected("cond", "clause list"));
        };
        if index + 1 == clauses.len() {
            return m.execute(parts);
        }
        if parts.is_empty() {
            return Err(Error::expected("cond", "non-empty clause"));
        }
        let matched = match &parts[0] {
            Value::List(test) => run_test(m, test)?,
            other => other.is_truthy(),
        };
        if matched {
            return m.execute(&Rc::new(parts[1..].to_vec()));
        }
    }
    Ok(())
}

/// N [P] -> ... — run P, N times.
fn times(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "times")?;
    let quot = m.pop_quotation("times")?;
    let count = m.pop()?.scalar_int("times")?;
    for _ in 0..count {
        m.execute(&quot)?;
    }
    Ok(())
}

/// A [P] -> ... — push each element and run P.
fn step(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "step")?;
    let quot = m.pop_quotation("step")?;
    let agg = m.pop()?;
    for item in elements(&agg, "step")? {
        m.push(item);
        m.execute(&quot)?;
    }
    Ok(())
}

/// A [P] -> B — apply P to each element, rebuilding the aggregate shape.
fn map(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "map")?;
    let quot = m.pop_quotation("map")?;
    match m.pop()? {
        Value::List(items) => {
            let mut mapped = Vec::with_capacity(items.len());
            for item in items.iter() {
                m.push(item.clone());
                m.execute(&quot)?;
                mapped.push(m.pop()?);
            }
            m.push(Value::list(mapped));
        }
        Value::Str(s) => {
            let mut mapped = String::new();
            for ch in s.chars() {
                m.push(Value::Char(ch as i64));
                m.execute(&quot)?;
                if let Value::Char(code) | Value::Int(code) = m.pop()? {
                    if let Some(ch) = char::from_u32(code as u32) {
                        mapped.push(ch);
                    }
                }
            }
            m.push(Value::Str(mapped));
        }
        Value::Set(bits) => {
            let mut mapped = 0u32;
            for member in 0..SET_SIZE {
                if bits & (1 << member) != 0 {
                    m.push(Value::Int(i64::from(member)));
                    m.execute(&quot)?;
                    let result = m.pop()?.scalar_int("map")?;
                    if (0..i64::from(SET_SIZE)).contains(&result) {
                        mapped |= 1 << result;
                    }
                }
            }
            m.push(Value::Set(mapped));
        }
        _ => return Err(Error::expected("map", "aggregate")),
    }
    Ok(())
}

/// A [P] -> B — keep the elements whose P result is truthy.
fn filter(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "filter")?;
    let quot = m.pop_quotation("filter")?;
    match m.pop()? {
        Value::List(items) => {
            let mut kept = Vec::new();
            for item in items.iter() {
                m.push(item.clone());
                m.execute(&quot)?;
                if m.pop()?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            m.push(Value::list(kept));
        }
        Value::Str(s) => {
            let mut kept = String::new();
            for ch in s.chars() {
                m.push(Value::Char(ch as i64));
                m.execute(&quot)?;
                if m.pop()?.is_truthy() {
                    kept.push(ch);
                }
            }
            m.push(Value::Str(kept));
        }
        Value::Set(bits) => {
            let mut kept = 0u32;
            for member in 0..SET_SIZE {
                if bits & (1 << member) != 0 {
                    m.push(Value::Int(i64::from(member)));
                    m.execute(&quot)?;
                    if m.pop()?.is_truthy() {
                        kept |= 1 << member;
                    }
                }
            }
            m.push(Value::Set(kept));
        }
        _ => return Err(Error::expected("filter", "aggregate")),
    }
    Ok(())
}

/// V0 A [P] -> V — left fold: V0 stays on the stack, each element is
/// pushed and P combines it into the accumulator.
fn fold(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "fold")?;
    let quot = m.pop_quotation("fold")?;
    let agg = m.pop()?;
    for item in elements(&agg, "fold")? {
        m.push(item);
        m.execute(&quot)?;
    }
    Ok(())
}

/// [P] [[Q1] [Q2] ...] -> ... [R1 R2 ...] — run P, then each Qi against
/// the post-P stack, collecting one result per Qi.
fn construct(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "construct")?;
    let specs = m.pop_quotation("construct")?;
    let prelude = m.pop_quotation("construct")?;
    let saved = m.stack.clone();
    m.execute(&prelude)?;
    let after_prelude = m.stack.clone();
    let mut results = Vec::with_capacity(specs.len());
    for spec in specs.iter() {
        m.stack = after_prelude.clone();
        if let Value::List(quot) = spec {
            m.execute(quot)?;
        }
        results.push(m.pop()?);
    }
    m.stack = saved;
    m.push(Value::list(results));
    Ok(())
}

/// Restore the stack after running a quotation, drop `consumed` operands,
/// then push the single result.
fn reducing(m: &mut Machine, op: &str, consumed: usize) -> Result<(), Error> {
    m.need(consumed + 1, op)?;
    let quot = m.pop_quotation(op)?;
    let saved = m.stack.clone();
    m.execute(&quot)?;
    let result = m.pop()?;
    m.stack = saved;
    m.stack.truncate(m.stack.len() - consumed);
    m.push(result);
    Ok(())
}

/// [P] -> R — preserve the whole stack.
fn nullary(m: &mut Machine) -> Result<(), Error> {
    reducing(m, "nullary", 0)
}

/// X [P] -> R
fn unary(m: &mut Machine) -> Result<(), Error> {
    reducing(m, "unary", 1)
}

/// X Y [P] -> R
fn binary(m: &mut Machine) -> Result<(), Error> {
    reducing(m, "binary", 2)
}

/// X Y Z [P] -> R
fn ternary(m: &mut Machine) -> Result<(), Error> {
    reducing(m, "ternary", 3)
}

/// X Y [P] -> R S — apply P to X, then to Y, each against the stack below
/// the pair.
fn unary2(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "unary2")?;
    let quot = m.pop_quotation("unary2")?;
    let y = m.pop()?;
    let saved = m.stack.clone(); // X on top
    m.execute(&quot)?;
    let r = m.pop()?;
    m.stack = saved[..saved.len() - 1].to_vec();
    m.push(y);
    m.execute(&quot)?;
    let s = m.pop()?;
    m.stack = saved[..saved.len() - 1].to_vec();
    m.push(r);
    m.push(s);
    Ok(())
}

/// X [P] [Q] -> R1 R2 — P and Q each applied to X, X consumed.
fn cleave(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "cleave")?;
    let q2 = m.pop_quotation("cleave")?;
    let q1 = m.pop_quotation("cleave")?;
    let saved = m.stack.clone();
    m.execute(&q1)?;
    let r1 = m.pop()?;
    m.stack = saved.clone();
    m.execute(&q2)?;
    let r2 = m.pop()?;
    m.stack = saved;
    m.stack.pop();
    m.push(r1);
    m.push(r2);
    Ok(())
}

/// L [P] -> L2 — run P with the list as the operand stack.
fn infra(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "infra")?;
    let quot = m.pop_quotation("infra")?;
    let Value::List(items) = m.pop()? else {
        return Err(Error::expected("infra", "list"));
    };
    let saved = std::mem::take(&mut m.stack);
    m.stack = items.iter().rev().cloned().collect();
    m.execute(&quot)?;
    let result: Vec<Value> = m.stack.iter().rev().cloned().collect();
    m.stack = saved;
    m.push(Value::list(result));
    Ok(())
}

/// T [P] -> ... — depth-first traversal pushing each leaf and running P.
fn treestep(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "treestep")?;
    let quot = m.pop_quotation("treestep")?;
    let tree = m.pop()?;
    treestep_walk(m, &tree, &quot)
}

fn treestep_walk(m: &mut Machine, tree: &Value, quot: &Program) -> Result<(), Error> {
    match tree {
        Value::List(children) => {
            for child in children.iter() {
                treestep_walk(m, child, quot)?;
            }
            Ok(())
        }
        leaf => {
            m.push(leaf.clone());
            m.execute(quot)
        }
    }
}

/// T [O] [C] -> ... — leaves run O; after a branch's children, C combines.
fn treerec(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "treerec")?;
    let combine = m.pop_quotation("treerec")?;
    let leaf_op = m.pop_quotation("treerec")?;
    let tree = m.pop()?;
    treerec_walk(m, &tree, &leaf_op, &combine)
}

fn treerec_walk(
    m: &mut Machine,
    tree: &Value,
    leaf_op: &Program,
    combine: &Program,
) -> Result<(), Error> {
    match tree {
        Value::List(children) => {
            for child in children.iter() {
                treerec_walk(m, child, leaf_op, combine)?;
            }
            m.execute(combine)
        }
        leaf => {
            m.push(leaf.clone());
            m.execute(leaf_op)
        }
    }
}

/// T [O1] [O2] [C] -> ... — general tree recursion. A leaf runs O1; a
/// branch runs O2 and then C with the self-referencing quotation
/// `[O1 O2 C treegenrec]` on top.
fn treegenrec(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "treegenrec")?;
    let combine = m.pop_quotation("treegenrec")?;
    let branch_op = m.pop_quotation("treegenrec")?;
    let leaf_op = m.pop_quotation("treegenrec")?;
    let tree = m.pop()?;
    match tree {
        Value::List(_) => {
            m.push(tree);
            m.execute(&branch_op)?;
            m.push(Value::list(vec![
                Value::List(leaf_op),
                Value::List(branch_op),
                Value::List(Rc::clone(&combine)),
                super::builtin("treegenrec"),
            ]));
            m.execute(&combine)
        }
        leaf => {
            m.push(leaf);
            m.execute(&leaf_op)
        }
    }
}

/// A [B] -> X — true when any element satisfies B.
fn some(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "some")?;
    let test = m.pop_quotation("some")?;
    let agg = m.pop()?;
    for item in elements(&agg, "some")? {
        m.push(item);
        m.execute(&test)?;
        if m.pop()?.is_truthy() {
            m.push(Value::Bool(true));
            return Ok(());
        }
    }
    m.push(Value::Bool(false));
    Ok(())
}

/// A [B] -> X — true when every element satisfies B.
fn all(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "all")?;
    let test = m.pop_quotation("all")?;
    let agg = m.pop()?;
    for item in elements(&agg, "all")? {
        m.push(item);
        m.execute(&test)?;
        if !m.pop()?.is_truthy() {
            m.push(Value::Bool(false));
            return Ok(());
        }
    }
    m.push(Value::Bool(true));
    Ok(())
}

/// [B] [P] -> ... — while B (under snapshot) is truthy, run P.
fn while_op(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "while")?;
    let body = m.pop_quotation("while")?;
    let test = m.pop_quotation("while")?;
    while run_test(m, &test)? {
        m.execute(&body)?;
    }
    Ok(())
}

/// X [[X1 P1] [X2 P2] ... [D]] -> X [P] — select the body paired with the
/// first matching case, keeping X; the last clause is the default.
fn opcase(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "opcase")?;
    let cases = m.pop_quotation("opcase")?;
    let x1 = m.peek()?.clone();
    for case in cases.iter() {
        if let Value::List(parts) = case {
            if parts.first() == Some(&x1) {
                m.push(Value::list(parts[1..].to_vec()));
                return Ok(());
            }
        }
    }
    if let Some(last) = cases.last() {
        match last {
            Value::List(_) => m.push(last.clone()),
            other => m.push(Value::list(vec![other.clone()])),
        }
    }
    Ok(())
}

/// X [[X1 P1...] [X2 P2...] ... [D...]] -> ... — run the body paired with
/// the first matching case, consuming X; the last clause is the default.
fn case(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "case")?;
    let cases = m.pop_quotation("case")?;
    let x1 = m.pop()?;
    for case in cases.iter() {
        if let Value::List(parts) = case {
            if parts.len() >= 2 && parts[0] == x1 {
                return m.execute(&Rc::new(parts[1..].to_vec()));
            }
        }
    }
    if let Some(Value::List(body)) = cases.last() {
        let body = Rc::clone(body);
        return m.execute(&body);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::machine::Machine;
    use crate::value::Value;

    fn eval(source: &str) -> Vec<Value> {
        let mut m = Machine::new();
        m.run_line(source).unwrap();
        m.stack.clone()
    }

    fn top(source: &str) -> Value {
        eval(source).last().cloned().unwrap()
    }

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|&n| Value::Int(n)).collect()
    }

    #[test]
    fn execution_combinators() {
        assert_eq!(top("[3 2 +] i"), Value::Int(5));
        assert_eq!(top("5 [dup *] i"), Value::Int(25));
        // x keeps the quotation below its result
        assert_eq!(eval("[2 3 +] x"), vec![top("[[2 3 +]] first"), Value::Int(5)]);
        assert_eq!(eval("1 2 3 [+] dip"), ints(&[3, 3]));
        assert_eq!(eval("9 1 2 3 [+] dipd"), ints(&[9, 3, 2, 3]));
        assert_eq!(eval("7 8 9 1 [dup *] dipdd"), ints(&[49, 8, 9, 1]));
    }

    #[test]
    fn app_family() {
        assert_eq!(eval("5 [dup *] app1"), ints(&[25]));
        assert_eq!(eval("2 3 [dup *] app2"), ints(&[4, 9]));
        assert_eq!(eval("2 3 4 [1 +] app3"), ints(&[3, 4, 5]));
    }

    #[test]
    fn branching() {
        assert_eq!(top("true [1] [2] branch"), Value::Int(1));
        assert_eq!(top("false [1] [2] branch"), Value::Int(2));
        assert_eq!(top("true [1] [2] ifte"), Value::Int(1));
        assert_eq!(top("false [1] [2] ifte"), Value::Int(2));
        // the test runs under a snapshot: it may consume the operand
        assert_eq!(top("5 [0 >] [dup *] [neg] ifte"), Value::Int(25));
        assert_eq!(top("-3 [0 >] [dup *] [neg] ifte"), Value::Int(3));
    }

    #[test]
    fn cond_selects_first_match() {
        let source = "[[[0 <] \"neg\"] [[0 >] \"pos\"] [\"zero\"]] cond";
        assert_eq!(top(&format!("-5 {source}")), Value::Str("neg".into()));
        assert_eq!(top(&format!("5 {source}")), Value::Str("pos".into()));
        assert_eq!(top(&format!("0 {source}")), Value::Str("zero".into()));
    }

    #[test]
    fn iteration() {
        assert_eq!(top("0 5 [1 +] times"), Value::Int(5));
        assert_eq!(top("2 3 [dup *] times"), Value::Int(256));
        assert_eq!(top("0 [1 2 3] [+] step"), Value::Int(6));
        assert_eq!(top("0 \"abc\" [ord +] step"), Value::Int(294));
        assert_eq!(top("0 {1 2 3} [+] step"), Value::Int(6));
        assert_eq!(
            top("[3 2 4] [dup +] map"),
            Value::list(ints(&[6, 4, 8]))
        );
        assert_eq!(top("\"abc\" [succ chr] map"), Value::Str("bcd".into()));
        assert_eq!(top("{1 2} [1 +] map"), Value::Set(0b1100));
        assert_eq!(
            top("[5 16 3 7 14] [10 <] filter"),
            Value::list(ints(&[5, 3, 7]))
        );
        assert_eq!(top("\"hello\" ['l !=] filter"), Value::Str("heo".into()));
        assert_eq!(top("0 [1 2 3 4 5] [+] fold"), Value::Int(15));
    }

    #[test]
    fn stack_preserving_combinators() {
        assert_eq!(eval("5 [dup *] nullary"), ints(&[5, 25]));
        assert_eq!(eval("5 [dup *] unary"), ints(&[25]));
        assert_eq!(eval("2 3 [+] binary"), ints(&[5]));
        assert_eq!(eval("1 2 3 [+ +] ternary"), ints(&[6]));
        assert_eq!(eval("7 2 3 [10 *] unary2"), ints(&[7, 20, 30]));
        assert_eq!(eval("3 [1 +] [dup *] cleave"), ints(&[4, 9]));
    }

    #[test]
    fn construct_collects_results() {
        assert_eq!(
            eval("1 [2] [[dup +] [dup *]] construct"),
            vec![Value::Int(1), Value::list(ints(&[4, 4]))]
        );
    }

    #[test]
    fn infra_runs_inside_the_list() {
        assert_eq!(top("[1 2 3] [+ +] infra"), Value::list(ints(&[6])));
        assert_eq!(eval("9 [1 2] [pop] infra"), vec![Value::Int(9), Value::list(ints(&[2]))]);
    }

    #[test]
    fn tree_combinators() {
        assert_eq!(top("0 [1 [2 [3 4]] 5] [+] treestep"), Value::Int(15));
        // sum each branch: leaves push themselves, branches add pairwise
        assert_eq!(eval("[[1 2] [3 4]] [] [+] treerec"), ints(&[10]));
        // count leaves via treegenrec: each leaf bumps the counter, each
        // branch steps its children through the self-referencing quotation
        assert_eq!(
            top("0 [1 [2 3] 4] [pop 1 +] [] [step] treegenrec"),
            Value::Int(4)
        );
    }

    #[test]
    fn quantifiers() {
        assert_eq!(top("[1 2 3] [2 >] some"), Value::Bool(true));
        assert_eq!(top("[1 2 3] [5 >] some"), Value::Bool(false));
        assert_eq!(top("[1 2 3] [0 >] all"), Value::Bool(true));
        assert_eq!(top("[1 2 3] [2 >] all"), Value::Bool(false));
        assert_eq!(top("{} [0 >] all"), Value::Bool(true));
    }

    #[test]
    fn while_iterates_with_snapshot() {
        assert_eq!(top("1 [10 <] [2 *] while"), Value::Int(16));
        assert_eq!(top("10 [0 >] [1 -] while"), Value::Int(0));
    }

    #[test]
    fn case_dispatch() {
        let table = "[['a 1] ['b 2] [99]]";
        assert_eq!(top(&format!("'a {table} case")), Value::Int(1));
        assert_eq!(top(&format!("'b {table} case")), Value::Int(2));
        assert_eq!(top(&format!("'z {table} case")), Value::Int(99));
        // opcase keeps the operand and pushes the body
        assert_eq!(
            eval(&format!("'a {table} opcase")),
            vec![Value::Char('a' as i64), Value::list(ints(&[1]))]
        );
    }
}
