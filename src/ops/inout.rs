//! Console and file I/O. Console printing goes through the machine's
//! output sink; file operators work on [`FileHandle`] values. Most file
//! predicates report false rather than raising, and closing a handle
//! twice is a no-op. The standard streams are never closed.

use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};

use super::{Op, OpFn};
use crate::lexer;
use crate::machine::Machine;
use crate::parser;
use crate::value::{FileHandle, Stream, Value};
use crate::Error;

pub(super) fn install(table: &mut Vec<Op>) {
    let ops: &[(&'static str, OpFn)] = &[
        ("put", put),
        ("putch", putch),
        ("putchars", putchars),
        (".", put_line),
        (".s", put_stack),
        ("newline", newline),
        ("get", get),
        ("fopen", fopen),
        ("fclose", fclose),
        ("feof", feof),
        ("ferror", ferror),
        ("fflush", fflush),
        ("fgets", fgets),
        ("fgetch", fgetch),
        ("fread", fread),
        ("fwrite", fwrite),
        ("fput", fput),
        ("fputch", fputch),
        ("fputchars", fputchars),
        ("fseek", fseek),
        ("ftell", ftell),
        ("fremove", fremove),
        ("frename", frename),
        ("stdin", stdin),
        ("stdout", stdout),
        ("stderr", stderr),
    ];
    for &(name, func) in ops {
        table.push(Op { name, func });
    }
    let fputchars_fn = table
        .iter()
        .find(|op| op.name == "fputchars")
        .map(|op| op.func)
        .expect("fputchars registered above");
    table.push(Op {
        name: "fputstring",
        func: fputchars_fn,
    });
}

fn put(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "put")?;
    let v = m.pop()?;
    m.write_out(&v.to_string())
}

/// Print a char or small integer as its character, without quoting.
fn putch(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "putch")?;
    let v = m.pop()?;
    let text = match &v {
        Value::Char(code) | Value::Int(code) => char::from_u32(*code as u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
        other => other.to_string(),
    };
    m.write_out(&text)
}

/// Print a string without its quotes.
fn putchars(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "putchars")?;
    let v = m.pop()?;
    let text = match &v {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    };
    m.write_out(&text)
}

/// `.` pops and prints the top value followed by a newline.
fn put_line(m: &mut Machine) -> Result<(), Error> {
    m.need(1, ".")?;
    let v = m.pop()?;
    m.write_out(&format!("{v}\n"))
}

/// `.s` prints the whole stack without consuming it.
fn put_stack(m: &mut Machine) -> Result<(), Error> {
    let line = format!("{}\n", m.print_stack());
    m.write_out(&line)
}

fn newline(m: &mut Machine) -> Result<(), Error> {
    m.write_out("\n")
}

/// Read one line from the machine's input source, parse it as source
/// text, and push the resulting terms.
fn get(m: &mut Machine) -> Result<(), Error> {
    let line = m.read_input_line()?;
    let tokens = lexer::lex(&line)?;
    let program = parser::parse(tokens, m)?;
    for term in program {
        m.push(term);
    }
    Ok(())
}

fn open_options(mode: &str) -> Option<OpenOptions> {
    let mut options = OpenOptions::new();
    match mode {
        "r" => options.read(true),
        "w" => options.write(true).create(true).truncate(true),
        "a" => options.append(true).create(true),
        "r+" => options.read(true).write(true),
        "w+" => options.read(true).write(true).create(true).truncate(true),
        "a+" => options.read(true).append(true).create(true),
        _ => return None,
    };
    Some(options)
}

/// P M -> F — open path P with mode M. A failed open still pushes a file
/// value; its slot is simply empty.
fn fopen(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fopen")?;
    let (Value::Str(mode), Value::Str(path)) = (m.pop()?, m.pop()?) else {
        return Err(Error::expected("fopen", "two strings"));
    };
    let Some(options) = open_options(&mode) else {
        return Err(Error::new(format!("fopen: invalid mode \"{mode}\"")));
    };
    let file = options.open(&path).ok();
    m.push(Value::File(FileHandle::disk(path, file)));
    Ok(())
}

fn pop_file(m: &mut Machine, op: &str) -> Result<FileHandle, Error> {
    match m.pop()? {
        Value::File(handle) => Ok(handle),
        _ => Err(Error::expected(op, "file")),
    }
}

fn peek_file(m: &mut Machine, op: &str) -> Result<FileHandle, Error> {
    match m.peek()? {
        Value::File(handle) => Ok(handle.clone()),
        _ => Err(Error::expected(op, "file")),
    }
}

fn fclose(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "fclose")?;
    let handle = pop_file(m, "fclose")?;
    if let Stream::Disk(slot) = &handle.stream {
        slot.borrow_mut().take();
    }
    Ok(())
}

/// F -> F B
fn feof(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "feof")?;
    let handle = peek_file(m, "feof")?;
    let at_end = match &handle.stream {
        Stream::Disk(slot) => {
            let mut slot = slot.borrow_mut();
            let file = slot
                .as_mut()
                .ok_or_else(|| Error::expected("feof", "open file"))?;
            let position = file.stream_position()?;
            let end = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(position))?;
            position >= end
        }
        _ => false,
    };
    m.push(Value::Bool(at_end));
    Ok(())
}

/// F -> F B
fn ferror(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "ferror")?;
    peek_file(m, "ferror")?;
    m.push(Value::Bool(false));
    Ok(())
}

fn fflush(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "fflush")?;
    let handle = peek_file(m, "fflush")?;
    match &handle.stream {
        Stream::Disk(slot) => {
            if let Some(file) = slot.borrow_mut().as_mut() {
                file.sync_all().ok();
            }
        }
        Stream::Stdout => m.flush_out()?,
        _ => {}
    }
    Ok(())
}

fn read_byte(handle: &FileHandle, op: &str) -> Result<Option<u8>, Error> {
    let mut buf = [0u8; 1];
    let read = match &handle.stream {
        Stream::Stdin => io::stdin().lock().read(&mut buf)?,
        Stream::Disk(slot) => {
            let mut slot = slot.borrow_mut();
            let file = slot
                .as_mut()
                .ok_or_else(|| Error::expected(op, "open file"))?;
            file.read(&mut buf)?
        }
        _ => return Err(Error::expected(op, "readable file")),
    };
    Ok((read > 0).then(|| buf[0]))
}

/// F -> F L — read one line as a list of chars, newline included.
fn fgets(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "fgets")?;
    let handle = peek_file(m, "fgets")?;
    let mut chars = Vec::new();
    while let Some(byte) = read_byte(&handle, "fgets")? {
        chars.push(Value::Char(i64::from(byte)));
        if byte == b'\n' {
            break;
        }
    }
    m.push(Value::list(chars));
    Ok(())
}

/// F -> F C — read one character; -1 on end of file.
fn fgetch(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "fgetch")?;
    let handle = peek_file(m, "fgetch")?;
    match read_byte(&handle, "fgetch")? {
        Some(byte) => m.push(Value::Char(i64::from(byte))),
        None => m.push(Value::Int(-1)),
    }
    Ok(())
}

/// F N -> F L — read up to N bytes as a list of integers.
fn fread(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fread")?;
    let count = m.pop()?.scalar_int("fread")?;
    let handle = peek_file(m, "fread")?;
    let mut bytes = Vec::new();
    for _ in 0..count.max(0) {
        match read_byte(&handle, "fread")? {
            Some(byte) => bytes.push(Value::Int(i64::from(byte))),
            None => break,
        }
    }
    m.push(Value::list(bytes));
    Ok(())
}

fn write_to(m: &mut Machine, handle: &FileHandle, op: &str, bytes: &[u8]) -> Result<(), Error> {
    match &handle.stream {
        Stream::Stdout => m.write_bytes_out(bytes),
        Stream::Stderr => {
            io::stderr().write_all(bytes)?;
            Ok(())
        }
        Stream::Stdin => Err(Error::expected(op, "writable file")),
        Stream::Disk(slot) => {
            let mut slot = slot.borrow_mut();
            let file = slot
                .as_mut()
                .ok_or_else(|| Error::expected(op, "open file"))?;
            file.write_all(bytes)?;
            Ok(())
        }
    }
}

/// F L -> F — write a list of small integers as bytes.
fn fwrite(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fwrite")?;
    let Value::List(items) = m.pop()? else {
        return Err(Error::expected("fwrite", "list"));
    };
    let handle = peek_file(m, "fwrite")?;
    let mut bytes = Vec::with_capacity(items.len());
    for item in items.iter() {
        bytes.push(item.scalar_int("fwrite")? as u8);
    }
    write_to(m, &handle, "fwrite", &bytes)
}

/// F X -> F — write the print form of X.
fn fput(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fput")?;
    let v = m.pop()?;
    let handle = peek_file(m, "fput")?;
    write_to(m, &handle, "fput", v.to_string().as_bytes())
}

/// F C -> F — write a single character.
fn fputch(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fputch")?;
    let v = m.pop()?;
    let handle = peek_file(m, "fputch")?;
    let text = match &v {
        Value::Char(code) | Value::Int(code) => char::from_u32(*code as u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string(),
        other => other.to_string(),
    };
    write_to(m, &handle, "fputch", text.as_bytes())
}

/// F S -> F — write string contents without quotes.
fn fputchars(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "fputchars")?;
    let v = m.pop()?;
    let handle = peek_file(m, "fputchars")?;
    let text = match &v {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    };
    write_to(m, &handle, "fputchars", text.as_bytes())
}

/// F P W -> F — seek to P relative to W (0 start, 1 current, 2 end).
fn fseek(m: &mut Machine) -> Result<(), Error> {
    m.need(3, "fseek")?;
    let whence = m.pop()?.scalar_int("fseek")?;
    let position = m.pop()?.scalar_int("fseek")?;
    let handle = peek_file(m, "fseek")?;
    let Stream::Disk(slot) = &handle.stream else {
        return Err(Error::expected("fseek", "seekable file"));
    };
    let target = match whence {
        0 => SeekFrom::Start(position.max(0) as u64),
        1 => SeekFrom::Current(position),
        2 => SeekFrom::End(position),
        _ => return Err(Error::expected("fseek", "whence in 0..2")),
    };
    let mut slot = slot.borrow_mut();
    let file = slot
        .as_mut()
        .ok_or_else(|| Error::expected("fseek", "open file"))?;
    file.seek(target)?;
    Ok(())
}

/// F -> F I
fn ftell(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "ftell")?;
    let handle = peek_file(m, "ftell")?;
    let Stream::Disk(slot) = &handle.stream else {
        return Err(Error::expected("ftell", "seekable file"));
    };
    let position = {
        let mut slot = slot.borrow_mut();
        let file = slot
            .as_mut()
            .ok_or_else(|| Error::expected("ftell", "open file"))?;
        file.stream_position()?
    };
    m.push(Value::Int(position as i64));
    Ok(())
}

/// P -> B
fn fremove(m: &mut Machine) -> Result<(), Error> {
    m.need(1, "fremove")?;
    let Value::Str(path) = m.pop()? else {
        return Err(Error::expected("fremove", "string"));
    };
    m.push(Value::Bool(std::fs::remove_file(path).is_ok()));
    Ok(())
}

/// P1 P2 -> B
fn frename(m: &mut Machine) -> Result<(), Error> {
    m.need(2, "frename")?;
    let (Value::Str(to), Value::Str(from)) = (m.pop()?, m.pop()?) else {
        return Err(Error::expected("frename", "two strings"));
    };
    m.push(Value::Bool(std::fs::rename(from, to).is_ok()));
    Ok(())
}

fn stdin(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::File(FileHandle {
        path: "stdin".into(),
        stream: Stream::Stdin,
    }));
    Ok(())
}

fn stdout(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::File(FileHandle {
        path: "stdout".into(),
        stream: Stream::Stdout,
    }));
    Ok(())
}

fn stderr(m: &mut Machine) -> Result<(), Error> {
    m.push(Value::File(FileHandle {
        path: "stderr".into(),
        stream: Stream::Stderr,
    }));
    Ok(())
}
