//! Arithmetic, comparison, logic and floating-point math.
//!
//! Mixed Integer/Float operands promote to Float; pure Integer arithmetic
//! wraps at 64 bits. Division and remainder by zero raise. The logic
//! operators act bitwise when both operands are sets and on truthiness
//! otherwise.

use std::cmp::Ordering;

use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::Value;
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("+", add),
        ("-", sub),
        ("*", mul),
        ("/", divide),
        ("rem", rem),
        ("div", int_div),
        ("succ", succ),
        ("pred", pred),
        ("neg", neg),
        ("abs", abs),
        ("sign", sign),
        ("max", max),
        ("min", min),
        ("ord", ord),
        ("chr", chr),
        ("<", lt),
        ("<=", le),
        (">", gt),
        (">=", ge),
        ("=", eq),
        ("!=", ne),
        ("compare", compare),
        ("and", and_op),
        ("or", or_op),
        ("xor", xor),
        ("not", not),
        ("sqrt", sqrt),
        ("floor", floor),
        ("ceil", ceil),
        ("trunc", trunc),
        ("sin", sin),
        ("cos", cos),
        ("tan", tan),
        ("asin", asin),
        ("acos", acos),
        ("atan", atan),
        ("atan2", atan2),
        ("log", log),
        ("log10", log10),
        ("exp", exp),
        ("pow", pow),
        ("ldexp", ldexp),
        ("frexp", frexp),
        ("modf", modf),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

fn is_float(v: &Value) -> bool {
    matches!(v, Value::Float(_))
}

fn add(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "+")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if is_float(&a) || is_float(&b) {
        m.push(Value::Float(a.numeric("+")? + b.numeric("+")?));
    } else {
        m.push(Value::Int(a.scalar_int("+")?.wrapping_add(b.scalar_int("+")?)));
    }
    Ok(())
}

fn sub(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "-")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if is_float(&a) || is_float(&b) {
        m.push(Value::Float(a.numeric("-")? - b.numeric("-")?));
    } else {
        m.push(Value::Int(a.scalar_int("-")?.wrapping_sub(b.scalar_int("-")?)));
    }
    Ok(())
}

fn mul(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "*")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if is_float(&a) || is_float(&b) {
        m.push(Value::Float(a.numeric("*")? * b.numeric("*")?));
    } else {
        m.push(Value::Int(a.scalar_int("*")?.wrapping_mul(b.scalar_int("*")?)));
    }
    Ok(())
}

/// `/` is integer division on two Integers, Float division otherwise.
fn divide(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "/")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if is_float(&a) || is_float(&b) {
        let divisor = b.numeric("/")?;
        if divisor == 0.0 {
            return Err(Error::div_by_zero("/"));
        }
        m.push(Value::Float(a.numeric("/")? / divisor));
    } else {
        let divisor = b.scalar_int("/")?;
        if divisor == 0 {
            return Err(Error::div_by_zero("/"));
        }
        m.push(Value::Int(a.scalar_int("/")?.wrapping_div(divisor)));
    }
    Ok(())
}

fn rem(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "rem")?;
    let b = m.pop()?.scalar_int("rem")?;
    let a = m.pop()?.scalar_int("rem")?;
    if b == 0 {
        return Err(Error::div_by_zero("rem"));
    }
    m.push(Value::Int(a.wrapping_rem(b)));
    Ok(())
}

fn int_div(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "div")?;
    let b = m.pop()?.scalar_int("div")?;
    let a = m.pop()?.scalar_int("div")?;
    if b == 0 {
        return Err(Error::div_by_zero("div"));
    }
    m.push(Value::Int(a.wrapping_div(b)));
    Ok(())
}

fn succ(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "succ")?;
    let a = m.pop()?.scalar_int("succ")?;
    m.push(Value::Int(a.wrapping_add(1)));
    Ok(())
}

fn pred(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "pred")?;
    let a = m.pop()?.scalar_int("pred")?;
    m.push(Value::Int(a.wrapping_sub(1)));
    Ok(())
}

fn neg(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "neg")?;
    match m.pop()? {
        Value::Float(x) => m.push(Value::Float(-x)),
        other => m.push(Value::Int(other.scalar_int("neg")?.wrapping_neg())),
    }
    Ok(())
}

fn abs(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "abs")?;
    match m.pop()? {
        Value::Float(x) => m.push(Value::Float(x.abs())),
        other => m.push(Value::Int(other.scalar_int("abs")?.wrapping_abs())),
    }
    Ok(())
}

fn sign(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "sign")?;
    let x = m.pop()?.numeric("sign")?;
    let s = if x < 0.0 {
        -1
    } else if x > 0.0 {
        1
    } else {
        0
    };
    m.push(Value::Int(s));
    Ok(())
}

fn max(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "max")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if a.compare(&b, "max")? == Ordering::Less {
        m.push(b);
    } else {
        m.push(a);
    }
    Ok(())
}

fn min(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "min")?;
    let b = m.pop()?;
    let a = m.pop()?;
    if a.compare(&b, "min")? == Ordering::Greater {
        m.push(b);
    } else {
        m.push(a);
    }
    Ok(())
}

fn ord(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "ord")?;
    match m.pop()? {
        Value::Char(n) => m.push(Value::Int(n)),
        v @ Value::Int(_) => m.push(v),
        _ => return Err(Error::expected("ord", "char or integer")),
    }
    Ok(())
}

fn chr(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "chr")?;
    let n = m.pop()?.scalar_int("chr")?;
    m.push(Value::Char(n));
    Ok(())
}

fn comparison(m: &mut Machine, op: &str, pick: fn(Ordering) -> bool) -> Result<(), Error> {
    m.need(2, op)?;
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(pick(a.compare(&b, op)?)));
    Ok(())
}

fn lt(m: &mut Machine) -> Result<(), Error> {
    comparison(m, "<", |o| o == Ordering::Less)
}

fn le(m: &mut Machine) -> Result<(), Error> {
    comparison(m, "<=", |o| o != Ordering::Greater)
}

fn gt(m: &mut Machine) -> Result<(), Error> {
    comparison(m, ">", |o| o == Ordering::Greater)
}

fn ge(m: &mut Machine) -> Result<(), Error> {
    comparison(m, ">=", |o| o != Ordering::Less)
}

fn eq(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "=")?;
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a == b));
    Ok(())
}

fn ne(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "!=")?;
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a != b));
    Ok(())
}

fn compare(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "compare")?;
    let b = m.pop()?;
    let a = m.pop()?;
    let n = match a.compare(&b, "compare")? {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    m.push(Value::Int(n));
    Ok(())
}

fn and_op(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "and")?;
    let b = m.pop()?;
    let a = m.pop()?;
    match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => m.push(Value::Set(x & y)),
        _ => m.push(Value::Bool(a.is_truthy() && b.is_truthy())),
    }
    Ok(())
}

fn or_op(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "or")?;
    let b = m.pop()?;
    let a = m.pop()?;
    match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => m.push(Value::Set(x | y)),
        _ => m.push(Value::Bool(a.is_truthy() || b.is_truthy())),
    }
    Ok(())
}

fn xor(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "xor")?;
    let b = m.pop()?;
    let a = m.pop()?;
    match (&a, &b) {
        (Value::Set(x), Value::Set(y)) => m.push(Value::Set(x ^ y)),
        _ => m.push(Value::Bool(a.is_truthy() != b.is_truthy())),
    }
    Ok(())
}

fn not(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "not")?;
    match m.pop()? {
        Value::Set(bits) => m.push(Value::Set(!bits)),
        other => m.push(Value::Bool(!other.is_truthy())),
    }
    Ok(())
}

fn float_unary(m: &mut Machine, op: &str, f: fn(f64) -> f64) -> Result<(), Error> {
    m.need(1, op)?;
    let x = m.pop()?.numeric(op)?;
    m.push(Value::Float(f(x)));
    Ok(())
}

fn sqrt(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "sqrt", f64::sqrt)
}

/// floor, ceil and trunc round to an Integer.
fn floor(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "floor")?;
    let x = m.pop()?.numeric("floor")?;
    m.push(Value::Int(x.floor() as i64));
    Ok(())
}

fn ceil(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "ceil")?;
    let x = m.pop()?.numeric("ceil")?;
    m.push(Value::Int(x.ceil() as i64));
    Ok(())
}

fn trunc(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "trunc")?;
    let x = m.pop()?.numeric("trunc")?;
    m.push(Value::Int(x.trunc() as i64));
    Ok(())
}

fn sin(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "sin", f64::sin)
}

fn cos(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "cos", f64::cos)
}

fn tan(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "tan", f64::tan)
}

fn asin(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "asin", f64::asin)
}

fn acos(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "acos", f64::acos)
}

fn atan(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "atan", f64::atan)
}

fn atan2(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "atan2")?;
    let y = m.pop()?.numeric("atan2")?;
    let x = m.pop()?.numeric("atan2")?;
    m.push(Value::Float(x.atan2(y)));
    Ok(())
}

fn log(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "log", f64::ln)
}

fn log10(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "log10", f64::log10)
}

fn exp(m: &mut Machine) -> Result<(), Error> {
    float_unary(m, "exp", f64::exp)
}

fn pow(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "pow")?;
    let e = m.pop()?.numeric("pow")?;
    let base = m.pop()?.numeric("pow")?;
    m.push(Value::Float(base.powf(e)));
    Ok(())
}

/// F I -> F * 2^I
fn ldexp(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "ldexp")?;
    let i = m.pop()?.scalar_int("ldexp")?;
    let x = m.pop()?.numeric("ldexp")?;
    m.push(Value::Float(x * 2f64.powi(i as i32)));
    Ok(())
}

/// F -> G I with F = G * 2^I and G in [0.5, 1).
fn frexp(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "frexp")?;
    let x = m.pop()?.numeric("frexp")?;
    let (frac, exp) = frexp_parts(x);
    m.push(Value::Float(frac));
    m.push(Value::Int(i64::from(exp)));
    Ok(())
}

fn frexp_parts(x: f64) -> (f64, i32) {
    if x == 0.0 || x.is_nan() || x.is_infinite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // subnormal: normalize first, then rebias
        let (frac, exp) = frexp_parts(x * 2f64.powi(64));
        return (frac, exp - 64);
    }
    let exp = biased - 1022;
    let frac = f64::from_bits((bits & !(0x7ffu64 << 52)) | (1022u64 << 52));
    (frac, exp)
}

/// F -> G H splitting F into fractional part G and integer part H.
fn modf(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "modf")?;
    let x = m.pop()?.numeric("modf")?;
    m.push(Value::Float(x.fract()));
    m.push(Value::Float(x.trunc()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::frexp_parts;
    use crate::machine::Machine;
    use crate::value::Value;

    fn top_after(source: &str) -> Value {
        let mut m = Machine::new();
        m.run_line(source).unwrap();
        m.stack.last().cloned().unwrap()
    }

    #[test]
    fn integer_arithmetic() {
        let cases: Vec<(&str, i64)> = vec![
            ("2 3 +", 5),
            ("10 3 -", 7),
            ("7 6 *", 42),
            ("20 4 /", 5),
            ("7 2 /", 3),
            ("17 5 rem", 2),
            ("17 5 div", 3),
            ("5 succ", 6),
            ("5 pred", 4),
            ("-7 neg", 7),
            ("-3 abs", 3),
            ("-9 sign", -1),
            ("0 sign", 0),
            ("4 sign", 1),
            ("3 5 max", 5),
            ("3 5 min", 3),
            ("'A ord", 65),
        ];
        for (source, expected) in cases {
            assert_eq!(top_after(source), Value::Int(expected), "case: {source}");
        }
        assert_eq!(top_after("65 chr"), Value::Char(65));
    }

    #[test]
    fn float_promotion() {
        assert_eq!(top_after("2.5 3.5 +"), Value::Float(6.0));
        assert_eq!(top_after("1 0.5 +"), Value::Float(1.5));
        assert_eq!(top_after("9.0 sqrt"), Value::Float(3.0));
        assert_eq!(top_after("3.7 floor"), Value::Int(3));
        assert_eq!(top_after("3.2 ceil"), Value::Int(4));
        assert_eq!(top_after("-3.7 trunc"), Value::Int(-3));
        assert_eq!(top_after("7 2.0 /"), Value::Float(3.5));
    }

    #[test]
    fn wrapping_at_64_bits() {
        assert_eq!(top_after("maxint 1 +"), Value::Int(i64::MIN));
        assert_eq!(top_after("maxint neg 1 - 1 -"), Value::Int(i64::MAX));
    }

    #[test]
    fn division_by_zero() {
        let mut m = Machine::new();
        assert_eq!(
            m.run_line("1 0 /").unwrap_err().message,
            "/: division by zero"
        );
        assert_eq!(
            m.run_line("1 0 rem").unwrap_err().message,
            "rem: division by zero"
        );
        assert_eq!(
            m.run_line("1 0.0 /").unwrap_err().message,
            "/: division by zero"
        );
    }

    #[test]
    fn comparisons() {
        let cases: Vec<(&str, bool)> = vec![
            ("3 5 <", true),
            ("5 3 <", false),
            ("3 3 <=", true),
            ("5 3 >", true),
            ("3 5 >=", false),
            ("3 3 =", true),
            ("3 4 =", false),
            ("3 4 !=", true),
            ("1 1.0 <", false),
            ("'a 'b <", true),
            ("\"abc\" \"abd\" <", true),
        ];
        for (source, expected) in cases {
            assert_eq!(top_after(source), Value::Bool(expected), "case: {source}");
        }
        assert_eq!(top_after("3 5 compare"), Value::Int(-1));
        assert_eq!(top_after("5 5 compare"), Value::Int(0));
        assert_eq!(top_after("7 5 compare"), Value::Int(1));
    }

    #[test]
    fn logic_on_truthiness_and_sets() {
        assert_eq!(top_after("true false and"), Value::Bool(false));
        assert_eq!(top_after("true false or"), Value::Bool(true));
        assert_eq!(top_after("true false xor"), Value::Bool(true));
        assert_eq!(top_after("true not"), Value::Bool(false));
        assert_eq!(top_after("{1 2 3} {2 3 4} and"), Value::Set(0b1100));
        assert_eq!(top_after("{1 2} {3 4} or"), Value::Set(0b11110));
        assert_eq!(top_after("{1 2} {2 3} xor"), Value::Set(0b1010));
        assert_eq!(top_after("{0} not {0 1} and"), Value::Set(0b10));
    }

    #[test]
    fn frexp_round_trip() {
        for &x in &[1.0, 0.75, -6.5, 1e-300, 12345.678] {
            let (frac, exp) = frexp_parts(x);
            assert!((0.5..1.0).contains(&frac.abs()), "frac for {x}: {frac}");
            assert_eq!(frac * 2f64.powi(exp), x);
        }
        assert_eq!(frexp_parts(0.0), (0.0, 0));
    }
}
