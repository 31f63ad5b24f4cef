//! Host-facing operators: time, random numbers, environment access,
//! dictionary introspection, source inclusion and the REPL flags.

use std::rc::Rc;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, Local, Offset, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use super::{Op, OpFn};
use crate::machine::Machine;
use crate::value::{Value, SET_SIZE};
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("maxint", maxint),
        ("setsize", setsize),
        ("typeof", type_of),
        ("sametype", sametype),
        ("equal", equal),
        ("name", name),
        ("body", body),
        ("undefs", undefs),
        ("getenv", getenv),
        ("argc", argc),
        ("argv", argv),
        ("quit", quit),
        ("abort", abort_op),
        ("include", include),
        ("libload", libload),
        ("help", help),
        ("helpdetail", helpdetail),
        ("setautoput", setautoput),
        ("setecho", setecho),
        ("setundeferror", setundeferror),
        ("__settracegc", settracegc),
        ("srand", srand),
        ("rand", rand_op),
        ("time", time),
        ("clock", clock),
        ("localtime", localtime),
        ("gmtime", gmtime),
        ("mktime", mktime),
        ("strftime", strftime),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
}

fn maxint(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::Int(i64::MAX));
    Ok(())
}

fn setsize(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::Int(i64::from(SET_SIZE)));
    Ok(())
}

fn type_of(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "typeof")?;
    let v = m.pop()?;
    m.push(Value::Int(v.tag()));
    Ok(())
}

fn sametype(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "sametype")?;
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a.tag() == b.tag()));
    Ok(())
}

fn equal(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "equal")?;
    let b = m.pop()?;
    let a = m.pop()?;
    m.push(Value::Bool(a == b));
    Ok(())
}

/// The name of an operator or word as a string.
fn name(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "name")?;
    match m.pop()? {
        Value::Builtin(op) => m.push(Value::Str(op.name.to_owned())),
        Value::Word(word) => m.push(Value::Str(word)),
        _ => return Err(Error::expected("name", "function")),
    }
    Ok(())
}

/// The dictionary body of a word, as a quotation.
fn body(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "body")?;
    let Value::Word(word) = m.pop()? else {
        return Err(Error::expected("body", "user-defined symbol"));
    };
    match m.dict.get(&word) {
        Some(definition) => {
            let definition = Rc::clone(definition);
            m.push(Value::List(definition));
            Ok(())
        }
        None => Err(Error::new(format!("body: undefined: {word}"))),
    }
}

/// Names referenced by dictionary bodies but defined nowhere, sorted.
fn undefs(m: &mut Machine) -> Result<(), Error> {
    let mut missing: Vec<String> = Vec::new();
    for definition in m.dict.values() {
        for term in definition.iter() {
            if let Value::Word(word) = term {
                if !m.dict.contains_key(word)
                    && super::find(word).is_none()
                    && !missing.contains(word)
                {
                    missing.push(word.clone());
                }
            }
        }
    }
    missing.sort();
    m.push(Value::list(missing.into_iter().map(Value::Str).collect()));
    Ok(())
}

fn getenv(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "getenv")?;
    let Value::Str(key) = m.pop()? else {
        return Err(Error::expected("getenv", "string"));
    };
    m.push(Value::Str(std::env::var(&key).unwrap_or_default()));
    Ok(())
}

fn argc(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::Int(std::env::args().count() as i64));
    Ok(())
}

fn argv(m: &mut Machine) -> Result<(), Error> {
    let args: Vec<Value> = std::env::args().map(Value::Str).collect();
    m.push(Value::list(args));
    Ok(())
}

fn quit(_m: &mut Machine) -> Result<(), Error> {
    std::process::exit(0);
}

fn abort_op(_m: &mut Machine) -> Result<(), Error> {
    Err(Error::new("abort"))
}

/// S -> ... — locate, guard and evaluate a source file.
fn include(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "include")?;
    let Value::Str(file) = m.pop()? else {
        return Err(Error::expected("include", "string"));
    };
    m.run_file(&file)
}

/// Like include, for a bare library name: NAME becomes NAME.joy.
fn libload(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "libload")?;
    let library = match m.pop()? {
        Value::Str(text) => text,
        Value::Word(word) => word,
        _ => return Err(Error::expected("libload", "library name")),
    };
    m.run_file(&format!("{library}.joy"))
}

fn help(m: &mut Machine) -> Result<(), Error> {
    let mut names: Vec<&'static str> = super::all().iter().map(|op| op.name).collect();
    names.sort_unstable();
    let mut listing = String::from("built-in operators:\n");
    for row in names.chunks(5) {
        for name in row {
            listing.push_str(&format!("  {name:<14}"));
        }
        listing.push('\n');
    }
    listing.push_str(&format!("total: {} operators\n", names.len()));
    m.write_out(&listing)
}

/// L -> — classify each named item in the list.
fn helpdetail(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "helpdetail")?;
    let Value::List(items) = m.pop()? else {
        return Err(Error::expected("helpdetail", "list"));
    };
    let mut listing = String::new();
    for item in items.iter() {
        let name = match item {
            Value::Builtin(op) => op.name.to_owned(),
            Value::Word(word) => word.clone(),
            Value::Str(text) => text.clone(),
            other => other.to_string(),
        };
        let kind = if super::find(&name).is_some() {
            "built-in"
        } else if m.dict.contains_key(&name) {
            "user-defined"
        } else {
            "unknown"
        };
        listing.push_str(&format!("{name} : {kind}\n"));
    }
    m.write_out(&listing)
}

fn setautoput(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "setautoput")?;
    m.autoput = m.pop()?.scalar_int("setautoput")?;
    Ok(())
}

fn setecho(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "setecho")?;
    m.echo = m.pop()?.scalar_int("setecho")?;
    Ok(())
}

fn setundeferror(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "setundeferror")?;
    m.undef_error = m.pop()?.scalar_int("setundeferror")?;
    Ok(())
}

/// Accepted for compatibility; the argument is discarded.
fn settracegc(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "__settracegc")?;
    m.pop()?;
    Ok(())
}

fn srand(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "srand")?;
    let seed = m.pop()?.scalar_int("srand")?;
    m.rng = StdRng::seed_from_u64(seed as u64);
    Ok(())
}

/// -> I — next non-negative integer from the machine's seeded generator.
fn rand_op(m: &mut Machine) -> Result<(), Error> {
    let n = (m.rng.next_u64() >> 1) as i64;
    m.push(Value::Int(n));
    Ok(())
}

fn time(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::Int(Utc::now().timestamp()));
    Ok(())
}

/// Microsecond-resolution timestamp.
fn clock(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::Int(Utc::now().timestamp_micros()));
    Ok(())
}

/// `[year month day hour minute second isdst yearday weekday]`,
/// weekday counting Mon=1..Sun=7.
fn time_list<Tz: TimeZone>(moment: &DateTime<Tz>, dst: bool) -> Value {
    Value::list(vec![
        Value::Int(i64::from(moment.year())),
        Value::Int(i64::from(moment.month())),
        Value::Int(i64::from(moment.day())),
        Value::Int(i64::from(moment.hour())),
        Value::Int(i64::from(moment.minute())),
        Value::Int(i64::from(moment.second())),
        Value::Int(i64::from(dst)),
        Value::Int(i64::from(moment.ordinal())),
        Value::Int(i64::from(moment.weekday().number_from_monday())),
    ])
}

fn localtime(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "localtime")?;
    let seconds = m.pop()?.scalar_int("localtime")?;
    let moment = Local
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| Error::expected("localtime", "valid timestamp"))?;
    // DST approximation: offset differs from the year's January offset
    let january = Local.with_ymd_and_hms(moment.year(), 1, 1, 0, 0, 0).single();
    let dst = january
        .map(|jan| jan.offset().fix() != moment.offset().fix())
        .unwrap_or(false);
    m.push(time_list(&moment, dst));
    Ok(())
}

fn gmtime(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "gmtime")?;
    let seconds = m.pop()?.scalar_int("gmtime")?;
    let moment = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| Error::expected("gmtime", "valid timestamp"))?;
    m.push(time_list(&moment, false));
    Ok(())
}

fn time_fields(v: &Value, op: &str) -> Result<[i64; 6], Error> {
    let Value::List(items) = v else {
        return Err(Error::expected(op, "time list"));
    };
    if items.len() < 6 {
        return Err(Error::expected(op, "time list with at least 6 elements"));
    }
    let mut fields = [0i64; 6];
    for (slot, item) in fields.iter_mut().zip(items.iter()) {
        *slot = item.scalar_int(op)?;
    }
    Ok(fields)
}

/// L -> I — local time list back to a Unix timestamp.
fn mktime(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "mktime")?;
    let v = m.pop()?;
    let [year, month, day, hour, minute, second] = time_fields(&v, "mktime")?;
    let moment = Local
        .with_ymd_and_hms(
            year as i32,
            month as u32,
            day as u32,
            hour as u32,
            minute as u32,
            second as u32,
        )
        .single()
        .ok_or_else(|| Error::expected("mktime", "valid time list"))?;
    m.push(Value::Int(moment.timestamp()));
    Ok(())
}

/// L S -> S2 — format a time list with strftime-style directives.
fn strftime(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "strftime")?;
    let Value::Str(format) = m.pop()? else {
        return Err(Error::expected("strftime", "format string"));
    };
    let v = m.pop()?;
    let [year, month, day, hour, minute, second] = time_fields(&v, "strftime")?;
    let moment = Local
        .with_ymd_and_hms(
            year as i32,
            month as u32,
            day as u32,
            hour as u32,
            minute as u32,
            second as u32,
        )
        .single()
        .ok_or_else(|| Error::expected("strftime", "valid time list"))?;
    let items: Vec<Item> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::expected("strftime", "valid format string"));
    }
    let rendered = moment.format_with_items(items.into_iter()).to_string();
    m.push(Value::Str(rendered));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::machine::Machine;
    use crate::value::Value;

    fn top(source: &str) -> Value {
        let mut m = Machine::new();
        m.run_line(source).unwrap();
        m.stack.last().cloned().unwrap()
    }

    #[test]
    fn constants_and_types() {
        assert_eq!(top("maxint"), Value::Int(i64::MAX));
        assert_eq!(top("setsize"), Value::Int(32));
        assert_eq!(top("42 typeof"), Value::Int(2));
        assert_eq!(top("1 2 sametype"), Value::Bool(true));
        assert_eq!(top("1 'a sametype"), Value::Bool(false));
        assert_eq!(top("[1] [1] equal"), Value::Bool(true));
    }

    #[test]
    fn introspection() {
        let mut m = Machine::new();
        m.run_line("DEFINE triple == 3 * . ").unwrap();
        m.run_line("\"triple\" intern name").unwrap();
        assert_eq!(m.stack.last(), Some(&Value::Str("triple".into())));
        m.run_line("pop \"triple\" intern body size").unwrap();
        assert_eq!(m.stack.last(), Some(&Value::Int(2)));
    }

    #[test]
    fn undefs_lists_missing_names() {
        let mut m = Machine::new();
        m.run_line("DEFINE broken == ghost1 dup ghost2 .").unwrap();
        m.run_line("undefs").unwrap();
        assert_eq!(
            m.stack.last(),
            Some(&Value::list(vec![
                Value::Str("ghost1".into()),
                Value::Str("ghost2".into())
            ]))
        );
    }

    #[test]
    fn seeded_random_is_deterministic() {
        let run = || {
            let mut m = Machine::new();
            m.run_line("7 srand rand rand rand").unwrap();
            m.stack.clone()
        };
        let first = run();
        assert_eq!(first, run());
        for v in &first {
            let Value::Int(n) = v else { panic!("rand pushes integers") };
            assert!(*n >= 0);
        }
        // different seed, different sequence
        let mut m = Machine::new();
        m.run_line("8 srand rand rand rand").unwrap();
        assert_ne!(first, m.stack);
    }

    #[test]
    fn abort_raises() {
        let err = Machine::new().run_line("abort").unwrap_err();
        assert_eq!(err.message, "abort");
    }

    #[test]
    fn settracegc_discards_its_argument() {
        let mut m = Machine::new();
        m.run_line("1 __settracegc").unwrap();
        assert!(m.stack.is_empty());
    }

    #[test]
    fn time_list_round_trip() {
        let mut m = Machine::new();
        // a timestamp survives localtime/mktime in the machine's own zone
        m.run_line("1700000000 localtime mktime").unwrap();
        assert_eq!(m.stack.last(), Some(&Value::Int(1700000000)));
    }

    #[test]
    fn gmtime_fields() {
        let mut m = Machine::new();
        // 2023-11-14T22:13:20Z, a Tuesday, day 318 of the year
        m.run_line("1700000000 gmtime").unwrap();
        let expected: Vec<i64> = vec![2023, 11, 14, 22, 13, 20, 0, 318, 2];
        assert_eq!(
            m.stack.last(),
            Some(&Value::list(expected.into_iter().map(Value::Int).collect()))
        );
    }

    #[test]
    fn strftime_formats() {
        let mut m = Machine::new();
        m.run_line("[2023 11 14 22 13 20] \"%Y-%m-%d %H:%M:%S\" strftime")
            .unwrap();
        assert_eq!(
            m.stack.last(),
            Some(&Value::Str("2023-11-14 22:13:20".into()))
        );
    }
}
