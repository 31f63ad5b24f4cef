//! The builtin operator registry. Every named operator is an [`Op`]: a
//! static name plus a host function acting on the machine. The registry is
//! built once, on first use, as a single contiguous table plus a name
//! index; alias entries (`fputstring` for `fputchars`) are resolved at
//! registration time by sharing the function pointer.
//!
//! Operators are grouped by theme into submodules, each contributing its
//! entries through an `install` function. Stack-underflow checks are
//! uniform: every operator validates its parameter count up front and
//! raises `NAME: expected K parameters, got M`.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::machine::Machine;
use crate::value::Value;
use crate::Error;

mod aggregate;
mod arith;
mod combinator;
mod inout;
mod predicate;
mod recursion;
mod stack;
mod system;

/// Canonical signature of a builtin operator.
pub type OpFn = fn(&mut Machine) -> Result<(), Error>;

pub struct Op {
    pub name: &'static str,
    pub func: OpFn,
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Op({})", self.name)
    }
}

static TABLE: LazyLock<Vec<Op>> = LazyLock::new(|| {
    let mut table = Vec::new();
    stack::install(&mut table);
    arith::install(&mut table);
    aggregate::install(&mut table);
    combinator::install(&mut table);
    recursion::install(&mut table);
    predicate::install(&mut table);
    inout::install(&mut table);
    system::install(&mut table);
    table
});

static BY_NAME: LazyLock<HashMap<&'static str, &'static Op>> = LazyLock::new(|| {
    let table: &'static [Op] = TABLE.as_slice();
    table.iter().map(|op| (op.name, op)).collect()
});

/// Look up an operator by name.
pub fn find(name: &str) -> Option<&'static Op> {
    BY_NAME.get(name).copied()
}

/// The whole registry, in installation order.
pub fn all() -> &'static [Op] {
    TABLE.as_slice()
}

/// Registry operator as a value, for combinators that build
/// self-referencing quotations.
pub(crate) fn builtin(name: &str) -> Value {
    Value::Builtin(find(name).expect("operator must be registered"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let add = find("+").unwrap();
        assert_eq!(add.name, "+");
        assert!(find("no-such-operator").is_none());
        assert!(!all().is_empty());

        // aliases share the implementation
        let canonical = find("fputchars").unwrap();
        let alias = find("fputstring").unwrap();
        assert_eq!(canonical.func as usize, alias.func as usize);
    }

    #[test]
    fn no_duplicate_names() {
        let mut seen = std::collections::HashSet::new();
        for op in all() {
            assert!(seen.insert(op.name), "duplicate operator {}", op.name);
        }
    }
}
