//! Pure stack reshuffling: no computation, only rearrangement of the top
//! few operands. The `...d` family performs the same rearrangement one
//! position below the top.

use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::Value;
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("pop", pop),
        ("dup", dup),
        ("swap", swap),
        ("rollup", rollup),
        ("rolldown", rolldown),
        ("rotate", rotate),
        ("popd", popd),
        ("dupd", dupd),
        ("swapd", swapd),
        ("rollupd", rollupd),
        ("rolldownd", rolldownd),
        ("rotated", rotated),
        ("id", id),
        ("newstack", newstack),
        ("stack", stack),
        ("unstack", unstack),
        ("choice", choice),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

fn pop(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "pop")?;
    m.pop()?;
    Ok(())
}

fn dup(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "dup")?;
    let top = m.peek()?.clone();
    m.push(top);
    Ok(())
}

fn swap(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "swap")?;
    let n = m.stack.len();
    m.stack.swap(n - 1, n - 2);
    Ok(())
}

/// X Y Z -> Z X Y
fn rollup(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "rollup")?;
    let n = m.stack.len();
    m.stack[n - 3..].rotate_right(1);
    Ok(())
}

/// X Y Z -> Y Z X
fn rolldown(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "rolldown")?;
    let n = m.stack.len();
    m.stack[n - 3..].rotate_left(1);
    Ok(())
}

/// X Y Z -> Z Y X
fn rotate(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "rotate")?;
    let n = m.stack.len();
    m.stack.swap(n - 3, n - 1);
    Ok(())
}

fn popd(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "popd")?;
    let n = m.stack.len();
    m.stack.remove(n - 2);
    Ok(())
}

fn dupd(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "dupd")?;
    let n = m.stack.len();
    let second = m.stack[n - 2].clone();
    m.stack.insert(n - 1, second);
    Ok(())
}

fn swapd(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "swapd")?;
    let n = m.stack.len();
    m.stack.swap(n - 2, n - 3);
    Ok(())
}

fn rollupd(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "rollupd")?;
    let n = m.stack.len();
    m.stack[n - 4..n - 1].rotate_right(1);
    Ok(())
}

fn rolldownd(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "rolldownd")?;
    let n = m.stack.len();
    m.stack[n - 4..n - 1].rotate_left(1);
    Ok(())
}

fn rotated(m: &mut Machine) -> Result<(), Error> {
    m.need(4, "rotated")?;
    let n = m.stack.len();
    m.stack.swap(n - 4, n - 2);
    Ok(())
}

fn id(_m: &mut Machine) -> Result<(), Error> {
    Ok(())
}

fn newstack(m: &mut Machine) -> Result<(), Error> {
    m.stack.clear();
    Ok(())
}

/// Push a list mirroring the current stack, top element first.
fn stack(m: &mut Machine) -> Result<(), Error> {
    let items: Vec<Value> = m.stack.iter().rev().cloned().collect();
    m.push(Value::list(items));
    Ok(())
}

/// Replace the stack with the top list; its first element ends up on top.
fn unstack(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "unstack")?;
    let top = m.pop()?;
    let Value::List(items) = top else {
        return Err(Error::expected("unstack", "list"));
    };
    m.stack.clear();
    for item in items.iter().rev() {
        m.push(item.clone());
    }
    Ok(())
}

/// B T F -> T or F depending on the truthiness of B.
fn choice(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "choice")?;
    let if_false = m.pop()?;
    let if_true = m.pop()?;
    let cond = m.pop()?;
    m.push(if cond.is_truthy() { if_true } else { if_false });
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::machine::Machine;
    use crate::value::Value;

    fn stack_after(source: &str) -> Vec<Value> {
        let mut m = Machine::new();
        m.run_line(source).unwrap();
        m.stack.clone()
    }

    fn ints(ns: &[i64]) -> Vec<Value> {
        ns.iter().map(|&n| Value::Int(n)).collect()
    }

    #[test]
    fn shufflers() {
        let cases: Vec<(&str, Vec<i64>)> = vec![
            ("1 2 pop", vec![1]),
            ("5 dup", vec![5, 5]),
            ("1 2 swap", vec![2, 1]),
            ("1 2 3 rollup", vec![3, 1, 2]),
            ("1 2 3 rolldown", vec![2, 3, 1]),
            ("1 2 3 rotate", vec![3, 2, 1]),
            ("1 2 popd", vec![2]),
            ("1 2 dupd", vec![1, 1, 2]),
            ("1 2 3 swapd", vec![2, 1, 3]),
            ("1 2 3 4 rollupd", vec![3, 1, 2, 4]),
            ("1 2 3 4 rolldownd", vec![2, 3, 1, 4]),
            ("1 2 3 4 rotated", vec![3, 2, 1, 4]),
            ("7 id", vec![7]),
            ("1 2 newstack", vec![]),
        ];
        for (source, expected) in cases {
            assert_eq!(stack_after(source), ints(&expected), "case: {source}");
        }
    }

    #[test]
    fn stack_and_unstack() {
        assert_eq!(
            stack_after("1 2 3 stack"),
            vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::list(ints(&[3, 2, 1])),
            ]
        );
        // unstack replaces the stack; first element of the list ends on top
        assert_eq!(stack_after("9 9 [1 2 3] unstack"), ints(&[3, 2, 1]));
    }

    #[test]
    fn choice_takes_branch_by_truthiness() {
        assert_eq!(stack_after("true 1 2 choice"), ints(&[1]));
        assert_eq!(stack_after("false 1 2 choice"), ints(&[2]));
        assert_eq!(stack_after("0 1 2 choice"), ints(&[2]));
    }

    #[test]
    fn underflow_reports_operator() {
        let mut m = Machine::new();
        let err = m.run_line("1 swap").unwrap_err();
        assert_eq!(err.message, "swap: expected 2 parameters, got 1");
    }
}
