//! The machine: operand stack, definitions dictionary, lexical flags,
//! include guard, library search paths, the seeded random generator and
//! the output sink. One machine is owned by one evaluation at a time;
//! combinators re-enter [`Machine::execute`] on quotations.
//!
//! The evaluator walks a program left to right: literals push themselves,
//! builtins run against the machine, and words resolve through the
//! dictionary. A word in terminal position replaces the current program
//! in place instead of recursing, so directly tail-recursive definitions
//! run in constant host stack.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::lexer;
use crate::parser;
use crate::value::{Program, Value};
use crate::Error;

static INILIB: &str = include_str!("../lib/inilib.joy");

fn embedded_lib(name: &str) -> Option<&'static str> {
    match name {
        "inilib.joy" => Some(INILIB),
        _ => None,
    }
}

pub struct Machine {
    /// Operand stack, top at the back.
    pub stack: Vec<Value>,
    /// Definitions dictionary: word name to body.
    pub dict: HashMap<String, Program>,
    /// Monotonic counter backing HIDE/MODULE scope mangling.
    pub(crate) scope_id: u64,
    /// REPL flag: 0 off, 1 print the top, 2 print the whole stack.
    pub autoput: i64,
    /// REPL flag: echo input lines when positive.
    pub echo: i64,
    /// When 0, an undefined word pushes itself instead of raising.
    pub undef_error: i64,
    /// Library search directories, in order.
    pub lib_paths: Vec<PathBuf>,
    included: HashSet<String>,
    pub(crate) rng: StdRng,
    input: Option<Box<dyn BufRead>>,
    out: Box<dyn Write>,
}

impl Machine {
    pub fn new() -> Self {
        Machine {
            stack: Vec::with_capacity(256),
            dict: HashMap::new(),
            scope_id: 0,
            autoput: 0,
            echo: 0,
            undef_error: 1,
            lib_paths: Vec::new(),
            included: HashSet::new(),
            rng: StdRng::seed_from_u64(0),
            input: None,
            out: Box::new(io::stdout()),
        }
    }

    /// Redirect printing operators, e.g. into a buffer under test.
    pub fn set_output(&mut self, out: Box<dyn Write>) {
        self.out = out;
    }

    /// Attach the line source consumed by the `get` operator.
    pub fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.input = Some(input);
    }

    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Result<Value, Error> {
        self.stack.pop().ok_or_else(|| Error::new("stack underflow"))
    }

    pub fn peek(&self) -> Result<&Value, Error> {
        self.stack.last().ok_or_else(|| Error::new("stack underflow"))
    }

    /// Uniform parameter check raised before an operator touches the
    /// stack.
    pub fn need(&self, count: usize, op: &str) -> Result<(), Error> {
        if self.stack.len() < count {
            return Err(Error::underflow(op, count, self.stack.len()));
        }
        Ok(())
    }

    /// Pop a quotation, raising the uniform type mismatch otherwise.
    pub fn pop_quotation(&mut self, op: &str) -> Result<Program, Error> {
        match self.pop()? {
            Value::List(items) => Ok(items),
            _ => Err(Error::expected(op, "quotation")),
        }
    }

    pub fn write_out(&mut self, text: &str) -> Result<(), Error> {
        self.out.write_all(text.as_bytes())?;
        Ok(())
    }

    pub fn write_bytes_out(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.out.write_all(bytes)?;
        Ok(())
    }

    pub fn flush_out(&mut self) -> Result<(), Error> {
        self.out.flush()?;
        Ok(())
    }

    /// One line from the attached input source, without its newline.
    pub fn read_input_line(&mut self) -> Result<String, Error> {
        let source = self
            .input
            .as_mut()
            .ok_or_else(|| Error::new("get: end of input"))?;
        let mut line = String::new();
        if source.read_line(&mut line)? == 0 {
            return Err(Error::new("get: end of input"));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    /// The stack, bottom to top, space separated.
    pub fn print_stack(&self) -> String {
        let parts: Vec<String> = self.stack.iter().map(Value::to_string).collect();
        parts.join(" ")
    }

    /// Walk a program term by term. A word in terminal position becomes
    /// the new current program rather than a nested call.
    pub fn execute(&mut self, program: &Program) -> Result<(), Error> {
        let mut program = Rc::clone(program);
        'replaced: loop {
            for i in 0..program.len() {
                match &program[i] {
                    Value::Builtin(op) => {
                        let func = op.func;
                        func(self)?;
                    }
                    Value::Word(word) => match self.dict.get(word.as_str()) {
                        Some(body) => {
                            let body = Rc::clone(body);
                            if i + 1 == program.len() {
                                program = body;
                                continue 'replaced;
                            }
                            self.execute(&body)?;
                        }
                        None => {
                            if self.undef_error == 0 {
                                let literal = program[i].clone();
                                self.push(literal);
                            } else {
                                return Err(Error::undefined(word));
                            }
                        }
                    },
                    literal => {
                        let value = literal.clone();
                        self.push(value);
                    }
                }
            }
            return Ok(());
        }
    }

    /// Evaluate a term slice against this machine.
    pub fn execute_program(&mut self, terms: &[Value]) -> Result<(), Error> {
        self.execute(&Rc::new(terms.to_vec()))
    }

    /// The recovery boundary: an error raised anywhere below unwinds to
    /// here, leaving the stack changes made so far and the dictionary
    /// intact, so the machine stays usable for the next line.
    pub fn run_safe(&mut self, terms: &[Value]) -> Result<(), Error> {
        self.execute_program(terms)
    }

    /// Lex, parse (installing definitions) and evaluate one source
    /// string.
    pub fn run_line(&mut self, source: &str) -> Result<(), Error> {
        let tokens = lexer::lex(source)?;
        let program = parser::parse(tokens, self)?;
        self.run_safe(&program)
    }

    /// Locate a source file, apply include-once, and evaluate it.
    pub fn run_file(&mut self, file: &str) -> Result<(), Error> {
        let (text, canonical) = self.read_source(file)?;
        if !self.included.insert(canonical) {
            return Ok(());
        }
        self.run_line(&text)
    }

    /// Search order: direct path for absolute or dot-relative names, the
    /// current directory, the configured library paths, finally the
    /// embedded library filesystem.
    fn read_source(&self, file: &str) -> Result<(String, String), Error> {
        let path = Path::new(file);
        if path.is_absolute() || file.starts_with('.') {
            let text = fs::read_to_string(path)
                .map_err(|err| Error::new(format!("cannot read {file}: {err}")))?;
            return Ok((text, canonical_id(path)));
        }
        if let Ok(text) = fs::read_to_string(path) {
            return Ok((text, canonical_id(path)));
        }
        for dir in &self.lib_paths {
            let full = dir.join(file);
            if let Ok(text) = fs::read_to_string(&full) {
                return Ok((text, canonical_id(&full)));
            }
        }
        if let Some(text) = embedded_lib(file) {
            return Ok((text.to_owned(), format!("embedded:lib/{file}")));
        }
        Err(Error::new(format!("cannot find {file}")))
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical_id(path: &Path) -> String {
    fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}
