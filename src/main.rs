use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use rjoy::machine::Machine;
use rjoy::Error;

/// Interpreter for a Joy-family concatenative stack language.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Skip the automatic `include inilib.joy` at startup.
    #[arg(long)]
    no_stdlib: bool,

    /// Source files to evaluate in order; with none, start a REPL.
    files: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let mut machine = Machine::new();

    // library search: the executable-relative lib/ directory, then JOYLIB
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            machine.lib_paths.push(dir.join("lib"));
        }
    }
    if let Ok(joylib) = std::env::var("JOYLIB") {
        for dir in joylib.split(':').filter(|dir| !dir.is_empty()) {
            machine.lib_paths.push(PathBuf::from(dir));
        }
    }

    if !args.no_stdlib {
        // the prelude may be absent; that is not an error
        let _ = machine.run_file("inilib.joy");
    }

    if !args.files.is_empty() {
        machine.set_input(Box::new(std::io::stdin().lock()));
        for file in &args.files {
            if let Err(err) = machine.run_file(&file.to_string_lossy()) {
                report(&err);
                process::exit(1);
            }
        }
        return;
    }

    if std::io::stdin().is_terminal() {
        repl(&mut machine);
    } else {
        piped_repl(&mut machine);
    }
}

fn repl(machine: &mut Machine) {
    println!("Joy interpreter — type 'quit' to exit");
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(_) => return piped_repl(machine),
    };
    let history = std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".joy_history"));
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline("joy> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                eval_line(machine, line);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                eprintln!("error: {err}");
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = editor.save_history(path);
    }
    println!();
}

fn piped_repl(machine: &mut Machine) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        eval_line(machine, line);
    }
}

fn eval_line(machine: &mut Machine, line: &str) {
    if machine.echo > 0 {
        println!("{line}");
    }
    match machine.run_line(line) {
        Err(err) => report(&err),
        Ok(()) => match machine.autoput {
            1 => {
                if let Ok(top) = machine.peek() {
                    println!("{top}");
                }
            }
            2 => {
                if !machine.stack.is_empty() {
                    println!("{}", machine.print_stack());
                }
            }
            _ => {}
        },
    }
}

fn report(err: &Error) {
    match err.column {
        Some(column) => eprintln!("error at col {column}: {}", err.message),
        None => eprintln!("error: {}", err.message),
    }
}
