//! End-to-end tests driving whole source lines through the public API,
//! checking printed output and the machine state left behind.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rjoy::machine::Machine;
use rjoy::value::Value;

#[derive(Clone, Default)]
struct Sink(Rc<RefCell<Vec<u8>>>);

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn session() -> (Machine, Sink) {
    let sink = Sink::default();
    let mut machine = Machine::new();
    machine.set_output(Box::new(sink.clone()));
    (machine, sink)
}

fn output_of(lines: &[&str]) -> String {
    let (mut machine, sink) = session();
    for line in lines {
        machine.run_line(line).unwrap();
    }
    let bytes = sink.0.borrow().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn arithmetic_prints() {
    assert_eq!(output_of(&["2 3 + ."]), "5\n");
    assert_eq!(output_of(&["7 6 * ."]), "42\n");
    assert_eq!(output_of(&["2.5 3.5 + ."]), "6.0\n");
}

#[test]
fn map_over_list() {
    assert_eq!(output_of(&["[3 2 4] [dup +] map ."]), "[6 4 8]\n");
}

#[test]
fn ifte_with_stack_restoration() {
    assert_eq!(output_of(&["5 [0 >] [dup *] [neg] ifte ."]), "25\n");
    assert_eq!(output_of(&["-3 [0 >] [dup *] [neg] ifte ."]), "3\n");
}

#[test]
fn recursive_factorial_definition() {
    assert_eq!(
        output_of(&[
            "DEFINE factorial == [0 =] [pop 1] [dup 1 - factorial *] ifte .",
            "5 factorial .",
        ]),
        "120\n"
    );
}

#[test]
fn hide_scopes_the_helper_away() {
    let (mut machine, sink) = session();
    machine
        .run_line("HIDE helper == 2 * IN double == helper END 5 double .")
        .unwrap();
    assert_eq!(String::from_utf8(sink.0.borrow().clone()).unwrap(), "10\n");

    let err = machine.run_line("5 helper .").unwrap_err();
    assert_eq!(err.message, "undefined: helper");
}

#[test]
fn module_exposes_dotted_names_only() {
    let (mut machine, sink) = session();
    machine
        .run_line("MODULE m PRIVATE v == 10 PUBLIC get == v END m.get .")
        .unwrap();
    assert_eq!(String::from_utf8(sink.0.borrow().clone()).unwrap(), "10\n");

    let err = machine.run_line("m.v .").unwrap_err();
    assert_eq!(err.message, "undefined: m.v");
}

#[test]
fn binrec_fibonacci() {
    assert_eq!(output_of(&["7 [small] [] [pred dup pred] [+] binrec ."]), "13\n");
}

#[test]
fn tailrec_reaches_zero_in_bounded_stack() {
    assert_eq!(output_of(&["10 [0 =] [] [1 -] tailrec ."]), "0\n");
    // a much larger count exercises the iterative loop; recursion here
    // would exhaust the host stack long before a million frames
    assert_eq!(output_of(&["1000000 [0 =] [] [1 -] tailrec ."]), "0\n");
}

#[test]
fn sort_prints_ordered_list() {
    assert_eq!(output_of(&["[5 3 1 4 2] sort ."]), "[1 2 3 4 5]\n");
}

#[test]
fn include_loads_a_file_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mylib.joy");
    std::fs::write(&path, "DEFINE seven == 7 .\nseven\n").unwrap();
    let path = path.to_string_lossy();

    let (mut machine, _) = session();
    machine.run_line(&format!("\"{path}\" include")).unwrap();
    machine.run_line(&format!("\"{path}\" include")).unwrap();
    // the file's contribution appears exactly once
    assert_eq!(machine.stack, vec![Value::Int(7)]);
}

#[test]
fn libload_appends_the_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("numbers.joy"), "42\n").unwrap();

    let (mut machine, _) = session();
    machine.lib_paths.push(dir.path().to_path_buf());
    machine.run_line("\"numbers\" libload").unwrap();
    assert_eq!(machine.stack, vec![Value::Int(42)]);
}

#[test]
fn fixed_seed_makes_runs_deterministic() {
    let run = || {
        output_of(&[
            "123 srand",
            "rand rand + .",
            "[5 1 4] sort .",
            "0 10 [1 +] times .",
        ])
    };
    assert_eq!(run(), run());
}

#[test]
fn error_recovery_keeps_the_session_alive() {
    let (mut machine, sink) = session();
    machine.run_line("DEFINE sq == dup * .").unwrap();
    let before: Vec<String> = {
        let mut names: Vec<String> = machine.dict.keys().cloned().collect();
        names.sort();
        names
    };

    assert!(machine.run_line("1 2 + pop pop pop").is_err());

    let after: Vec<String> = {
        let mut names: Vec<String> = machine.dict.keys().cloned().collect();
        names.sort();
        names
    };
    assert_eq!(before, after);

    machine.run_line("6 sq .").unwrap();
    assert_eq!(String::from_utf8(sink.0.borrow().clone()).unwrap(), "36\n");
}

#[test]
fn reverse_round_trips() {
    let (mut machine, _) = session();
    machine.run_line("[1 \"two\" [3] {4}] dup reverse reverse =").unwrap();
    assert_eq!(machine.stack.last(), Some(&Value::Bool(true)));
}

#[test]
fn times_leaves_n_copies() {
    let (mut machine, _) = session();
    machine.run_line("7 4 [9] times").unwrap();
    assert_eq!(
        machine.stack,
        vec![
            Value::Int(7),
            Value::Int(9),
            Value::Int(9),
            Value::Int(9),
            Value::Int(9)
        ]
    );
}

#[test]
fn size_matches_step_iterations() {
    for agg in ["[1 2 3 4]", "\"abc\"", "{1 5 9}", "[]"] {
        let (mut machine, _) = session();
        machine
            .run_line(&format!("{agg} size 0 {agg} [pop 1 +] step ="))
            .unwrap();
        assert_eq!(
            machine.stack.last(),
            Some(&Value::Bool(true)),
            "aggregate: {agg}"
        );
    }
}

#[test]
fn unit_first_is_identity() {
    let (mut machine, _) = session();
    machine.run_line("\"x\" dup unit first =").unwrap();
    assert_eq!(machine.stack.last(), Some(&Value::Bool(true)));
}

#[test]
fn pair_uncons_recovers_the_parts() {
    let (mut machine, _) = session();
    machine.run_line("1 2 pair uncons").unwrap();
    assert_eq!(
        machine.stack,
        vec![Value::Int(1), Value::list(vec![Value::Int(2)])]
    );
}

#[test]
fn sort_is_idempotent() {
    let (mut machine, _) = session();
    machine.run_line("[9 1 8 2 7] sort dup sort =").unwrap();
    assert_eq!(machine.stack.last(), Some(&Value::Bool(true)));
}

#[test]
fn empty_aggregate_boundaries() {
    assert_eq!(output_of(&["[] null .", "\"\" null .", "{} null ."]), "true\ntrue\ntrue\n");
    assert_eq!(output_of(&["[] size ."]), "0\n");
    let (mut machine, _) = session();
    assert!(machine.run_line("[] first").is_err());
    assert!(machine.run_line("[] rest").is_err());
    assert!(machine.run_line("{35}").is_err());
}

#[test]
fn integer_arithmetic_wraps() {
    assert_eq!(
        output_of(&["maxint 1 + ."]),
        format!("{}\n", i64::MIN)
    );
}

#[test]
fn stray_definition_terminator_prints() {
    // `.` doubles as print-and-pop; `.s` shows the stack untouched
    assert_eq!(output_of(&["1 2 3 .s"]), "1 2 3\n");
    assert_eq!(output_of(&["1 2 3 rollup .s"]), "3 1 2\n");
}

#[test]
fn prelude_definitions_compose() {
    let (mut machine, _) = session();
    machine.run_file("inilib.joy").unwrap();
    machine.run_line("[1 2 3 4] sum [2 3 4] product pair").unwrap();
    assert_eq!(
        machine.stack,
        vec![Value::list(vec![Value::Int(10), Value::Int(24)])]
    );
}
