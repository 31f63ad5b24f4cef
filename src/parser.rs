//! The parser consumes a token stream, installs DEFINE/HIDE/MODULE
//! definitions into the machine's dictionary, and returns the residual
//! program for evaluation.
//!
//! Scoping works by name-mangling against a flat dictionary: every HIDE
//! or MODULE block draws a fresh `__scope_N_` prefix from the machine's
//! counter, registers its private names in a scope map, and resolves
//! atoms through the scope stack at parse time. Scope maps live only
//! while their block is being parsed; the mangled names they installed
//! into the dictionary outlive them.

use std::collections::HashMap;
use std::rc::Rc;

use crate::lexer::{Token, TokenKind};
use crate::machine::Machine;
use crate::ops;
use crate::value::{Value, SET_SIZE};
use crate::Error;

/// Parse a token stream against a machine: definitions are installed as
/// a side effect, and the residual program is returned.
pub fn parse(tokens: Vec<Token>, machine: &mut Machine) -> Result<Vec<Value>, Error> {
    Parser::new(tokens, machine).run()
}

struct Parser<'m> {
    tokens: Vec<Token>,
    pos: usize,
    machine: &'m mut Machine,
    /// Innermost scope last; each maps original name to mangled name.
    scopes: Vec<HashMap<String, String>>,
    /// `"name."` inside a MODULE's PUBLIC section, otherwise empty.
    module_prefix: String,
    /// Index into `scopes` of the active MODULE scope.
    module_scope: Option<usize>,
}

impl<'m> Parser<'m> {
    fn new(tokens: Vec<Token>, machine: &'m mut Machine) -> Self {
        Parser {
            tokens,
            pos: 0,
            machine,
            scopes: Vec::new(),
            module_prefix: String::new(),
            module_scope: None,
        }
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn push_scope(&mut self) -> String {
        self.machine.scope_id += 1;
        let prefix = format!("__scope_{}_", self.machine.scope_id);
        self.scopes.push(HashMap::new());
        prefix
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn run(&mut self) -> Result<Vec<Value>, Error> {
        let mut program = Vec::new();
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Define => self.parse_define()?,
                TokenKind::Hide => self.parse_hide()?,
                TokenKind::Module => self.parse_module()?,
                // stray semicolons (e.g. after END;) are harmless
                TokenKind::Semi => {
                    self.advance();
                }
                _ => {
                    if let Some(term) = self.parse_term()? {
                        program.push(term);
                    }
                }
            }
        }
        Ok(program)
    }

    /// DEFINE name == body ; ... . — bodies install under their plain
    /// names. Nested HIDE and MODULE blocks are allowed.
    fn parse_define(&mut self) -> Result<(), Error> {
        self.advance();
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Dot | TokenKind::End => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Hide => {
                    self.parse_hide()?;
                    continue;
                }
                TokenKind::Module => {
                    self.parse_module()?;
                    continue;
                }
                TokenKind::Semi => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            let token = self.advance();
            let TokenKind::Atom(name) = token.kind else {
                return Err(Error::at(token.column, "expected atom in DEFINE"));
            };
            self.expect_eqdef(&name)?;
            let body = self.read_body()?;
            self.machine.dict.insert(name, Rc::new(body));
            if matches!(self.peek().kind, TokenKind::Semi) {
                self.advance();
            }
        }
        Ok(())
    }

    fn expect_eqdef(&mut self, name: &str) -> Result<(), Error> {
        let token = self.advance();
        if !matches!(token.kind, TokenKind::EqDef) {
            return Err(Error::at(token.column, format!("expected == after {name}")));
        }
        Ok(())
    }

    /// HIDE private IN public END.
    fn parse_hide(&mut self) -> Result<(), Error> {
        self.advance();
        let prefix = self.push_scope();
        self.prescan_names(&prefix);
        self.parse_def_sequence(&prefix)?;

        let token = self.advance();
        if !matches!(token.kind, TokenKind::In) {
            return Err(Error::at(token.column, "expected IN after HIDE definitions"));
        }

        // inside a MODULE the public names keep the module naming
        let public_prefix = self.module_prefix.clone();
        self.parse_def_sequence(&public_prefix)?;

        let token = self.advance();
        if !matches!(token.kind, TokenKind::End) {
            return Err(Error::at(token.column, "expected END after IN definitions"));
        }
        self.pop_scope();
        Ok(())
    }

    /// MODULE name PRIVATE private PUBLIC public END. Private names are
    /// scope-mangled; public names install as `name.member` and are also
    /// visible as plain members within the module.
    fn parse_module(&mut self) -> Result<(), Error> {
        self.advance();
        let token = self.advance();
        let TokenKind::Atom(module) = token.kind else {
            return Err(Error::at(token.column, "expected module name after MODULE"));
        };
        let prefix = self.push_scope();

        let saved_prefix = std::mem::replace(&mut self.module_prefix, format!("{module}."));
        let saved_scope = self.module_scope.replace(self.scopes.len() - 1);

        let token = self.advance();
        if !matches!(token.kind, TokenKind::Hide) {
            return Err(Error::at(
                token.column,
                format!("expected PRIVATE after MODULE {module}"),
            ));
        }

        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Define | TokenKind::In | TokenKind::End | TokenKind::Dot => break,
                TokenKind::Hide => {
                    self.parse_hide()?;
                    continue;
                }
                _ => {}
            }
            let token = self.advance();
            let TokenKind::Atom(name) = token.kind else {
                return Err(Error::at(token.column, "expected atom in MODULE PRIVATE"));
            };
            self.expect_eqdef(&name)?;
            let mangled = format!("{prefix}{name}");
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(name, mangled.clone());
            }
            let body = self.read_body()?;
            self.machine.dict.insert(mangled, Rc::new(body));
            if matches!(self.peek().kind, TokenKind::Semi) {
                self.advance();
            }
        }

        let token = self.advance();
        if !matches!(token.kind, TokenKind::Define | TokenKind::In) {
            return Err(Error::at(
                token.column,
                format!("expected PUBLIC after MODULE {module} PRIVATE definitions"),
            ));
        }

        let public_prefix = self.module_prefix.clone();
        self.parse_def_sequence(&public_prefix)?;

        let token = self.advance();
        if !matches!(token.kind, TokenKind::End) {
            return Err(Error::at(token.column, format!("expected END for MODULE {module}")));
        }

        self.module_prefix = saved_prefix;
        self.module_scope = saved_scope;
        self.pop_scope();
        Ok(())
    }

    /// Pre-register every `name ==` at the current nesting level so that
    /// forward references and mutual recursion among private helpers
    /// resolve. Bracket and brace depth is tracked so names inside
    /// quotations are ignored.
    fn prescan_names(&mut self, prefix: &str) {
        let mut cursor = self.pos;
        let mut depth = 0usize;
        while cursor < self.tokens.len() {
            let kind = &self.tokens[cursor].kind;
            if depth == 0
                && matches!(kind, TokenKind::In | TokenKind::End | TokenKind::Dot)
            {
                break;
            }
            match kind {
                TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RBracket | TokenKind::RBrace => depth = depth.saturating_sub(1),
                TokenKind::Atom(name) if depth == 0 => {
                    if matches!(
                        self.tokens.get(cursor + 1).map(|t| &t.kind),
                        Some(TokenKind::EqDef)
                    ) {
                        let mangled = format!("{prefix}{name}");
                        if let Some(scope) = self.scopes.last_mut() {
                            scope.insert(name.clone(), mangled);
                        }
                    }
                }
                TokenKind::Eof => break,
                _ => {}
            }
            cursor += 1;
        }
    }

    /// A run of `name == body` definitions, stopping at IN, END or `.`.
    /// With a non-empty prefix the names are mangled and registered in
    /// the current scope (and in the surrounding MODULE scope, so they
    /// survive a nested HIDE being popped).
    fn parse_def_sequence(&mut self, prefix: &str) -> Result<(), Error> {
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::In | TokenKind::End | TokenKind::Dot => break,
                TokenKind::Hide => {
                    self.parse_hide()?;
                    continue;
                }
                // an optional DEFINE keyword inside a block
                TokenKind::Define => {
                    self.advance();
                    continue;
                }
                TokenKind::Semi => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            let token = self.advance();
            let TokenKind::Atom(name) = token.kind else {
                return Err(Error::at(token.column, "expected atom in definition"));
            };
            self.expect_eqdef(&name)?;

            // registered before the body parses so self-recursion resolves
            let dict_name = if prefix.is_empty() {
                name
            } else {
                let mangled = format!("{prefix}{name}");
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), mangled.clone());
                }
                if let Some(module_scope) = self.module_scope {
                    if module_scope + 1 < self.scopes.len() {
                        self.scopes[module_scope].insert(name, mangled.clone());
                    }
                }
                mangled
            };

            let body = self.read_body()?;
            self.machine.dict.insert(dict_name, Rc::new(body));
            if matches!(self.peek().kind, TokenKind::Semi) {
                self.advance();
            }
        }
        Ok(())
    }

    /// Terms up to the end of the current definition body. The
    /// look-ahead for `atom ==` lets an omitted semicolon still close
    /// the body before the next definition.
    fn read_body(&mut self) -> Result<Vec<Value>, Error> {
        let mut body = Vec::new();
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Semi
                | TokenKind::Dot
                | TokenKind::In
                | TokenKind::End
                | TokenKind::Hide
                | TokenKind::Define
                | TokenKind::Module => break,
                TokenKind::Atom(_) => {
                    if matches!(
                        self.tokens.get(self.pos + 1).map(|t| &t.kind),
                        Some(TokenKind::EqDef)
                    ) {
                        break;
                    }
                }
                _ => {}
            }
            if let Some(term) = self.parse_term()? {
                body.push(term);
            }
        }
        Ok(body)
    }

    fn parse_term(&mut self) -> Result<Option<Value>, Error> {
        match self.peek().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Some(Value::Int(n)))
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Some(Value::Float(x)))
            }
            TokenKind::Char(c) => {
                self.advance();
                Ok(Some(Value::Char(c)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Some(Value::Str(s)))
            }
            TokenKind::LBracket => Ok(Some(self.parse_list()?)),
            TokenKind::LBrace => Ok(Some(self.parse_set()?)),
            TokenKind::Dot => {
                self.advance();
                Ok(Some(self.resolve_atom(".")))
            }
            TokenKind::Atom(name) => {
                self.advance();
                Ok(Some(self.resolve_atom(&name)))
            }
            TokenKind::Eof => Ok(None),
            other => {
                let column = self.advance().column;
                Err(Error::at(column, format!("unexpected token: {other:?}")))
            }
        }
    }

    /// `[ terms ]`; an unclosed bracket consumes to end of input.
    fn parse_list(&mut self) -> Result<Value, Error> {
        self.advance();
        let mut items = Vec::new();
        while !self.at_end() && !matches!(self.peek().kind, TokenKind::RBracket) {
            if let Some(term) = self.parse_term()? {
                items.push(term);
            }
        }
        if !self.at_end() {
            self.advance();
        }
        Ok(Value::list(items))
    }

    /// `{ members }` with integer or char members in `0..SET_SIZE`.
    fn parse_set(&mut self) -> Result<Value, Error> {
        self.advance();
        let mut bits = 0u32;
        while !self.at_end() && !matches!(self.peek().kind, TokenKind::RBrace) {
            let token = self.advance();
            let member = match token.kind {
                TokenKind::Int(n) | TokenKind::Char(n) => n,
                other => {
                    return Err(Error::at(
                        token.column,
                        format!("set members must be small integers or characters, got {other:?}"),
                    ));
                }
            };
            if !(0..i64::from(SET_SIZE)).contains(&member) {
                return Err(Error::at(
                    token.column,
                    format!("set member {member} out of range 0..{}", SET_SIZE - 1),
                ));
            }
            bits |= 1 << member;
        }
        if !self.at_end() {
            self.advance();
        }
        Ok(Value::Set(bits))
    }

    /// Builtins win; `true`/`false` are literals; then the scope stack,
    /// innermost outward; anything else is a plain word resolved at
    /// execution time.
    fn resolve_atom(&self, name: &str) -> Value {
        if let Some(op) = ops::find(name) {
            return Value::Builtin(op);
        }
        match name {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        for scope in self.scopes.iter().rev() {
            if let Some(mangled) = scope.get(name) {
                return Value::Word(mangled.clone());
            }
        }
        Value::Word(name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_with(source: &str) -> (Machine, Vec<Value>) {
        let mut machine = Machine::new();
        let program = parse(lex(source).unwrap(), &mut machine).unwrap();
        (machine, program)
    }

    #[test]
    fn residual_program_and_resolution() {
        let (_, program) = parse_with("2 3 + x");
        assert_eq!(program.len(), 4);
        assert_eq!(program[0], Value::Int(2));
        assert!(matches!(&program[2], Value::Builtin(op) if op.name == "+"));
        assert_eq!(program[3], Value::Word("x".into()));
        let (_, program) = parse_with("true false");
        assert_eq!(program, vec![Value::Bool(true), Value::Bool(false)]);
    }

    #[test]
    fn define_installs_bodies() {
        let (machine, program) = parse_with("DEFINE sq == dup * ; cube == dup dup * * .");
        assert!(program.is_empty());
        assert_eq!(machine.dict["sq"].len(), 2);
        assert_eq!(machine.dict["cube"].len(), 5);
    }

    #[test]
    fn define_redefinition_replaces() {
        let (machine, _) = parse_with("DEFINE f == 1 . DEFINE f == 2 .");
        assert_eq!(machine.dict["f"].as_ref(), &vec![Value::Int(2)]);
    }

    #[test]
    fn missing_eqdef_is_a_column_error() {
        let mut machine = Machine::new();
        let err = parse(lex("DEFINE sq dup * .").unwrap(), &mut machine).unwrap_err();
        assert!(err.message.contains("expected == after sq"));
        assert_eq!(err.column, Some(11));
    }

    #[test]
    fn hide_mangles_private_names() {
        let (machine, _) = parse_with("HIDE helper == 2 * IN double == helper END");
        assert!(machine.dict.contains_key("__scope_1_helper"));
        assert!(!machine.dict.contains_key("helper"));
        // the public body references the mangled helper
        assert_eq!(
            machine.dict["double"].as_ref(),
            &vec![Value::Word("__scope_1_helper".into())]
        );
    }

    #[test]
    fn hide_prescan_resolves_forward_references() {
        let (machine, _) = parse_with("HIDE a == b ; b == 1 IN c == a END");
        assert_eq!(
            machine.dict["__scope_1_a"].as_ref(),
            &vec![Value::Word("__scope_1_b".into())]
        );
    }

    #[test]
    fn nested_hide_scopes_shadow() {
        let (machine, _) =
            parse_with("HIDE h == 1 IN outer == h HIDE h == 2 IN inner == h END END");
        // inner sees the inner mangling, outer the outer one
        assert_eq!(
            machine.dict["inner"].as_ref(),
            &vec![Value::Word("__scope_2_h".into())]
        );
        assert_eq!(
            machine.dict["outer"].as_ref(),
            &vec![Value::Word("__scope_1_h".into())]
        );
    }

    #[test]
    fn module_public_names_are_dotted() {
        let (machine, _) = parse_with("MODULE m PRIVATE v == 10 PUBLIC get == v END");
        assert!(machine.dict.contains_key("m.get"));
        assert!(machine.dict.contains_key("__scope_1_v"));
        assert!(!machine.dict.contains_key("get"));
        assert_eq!(
            machine.dict["m.get"].as_ref(),
            &vec![Value::Word("__scope_1_v".into())]
        );
    }

    #[test]
    fn module_members_call_each_other_by_plain_name() {
        let (machine, _) =
            parse_with("MODULE m PRIVATE k == 2 PUBLIC double == k * ; quad == double double END");
        assert_eq!(
            machine.dict["m.quad"].as_ref(),
            &vec![
                Value::Word("m.double".into()),
                Value::Word("m.double".into())
            ]
        );
    }

    #[test]
    fn hide_inside_module_public_keeps_module_prefix() {
        let (machine, _) = parse_with(
            "MODULE m PRIVATE z == 1 PUBLIC HIDE inner == 3 IN api == inner z END END",
        );
        assert!(machine.dict.contains_key("m.api"), "dict: {:?}", machine.dict.keys());
        assert_eq!(
            machine.dict["m.api"].as_ref(),
            &vec![
                Value::Word("__scope_2_inner".into()),
                Value::Word("__scope_1_z".into())
            ]
        );
    }

    #[test]
    fn list_and_set_literals() {
        let (_, program) = parse_with("[1 [2] 3] {1 2 '\\5}");
        assert_eq!(
            program[0],
            Value::list(vec![
                Value::Int(1),
                Value::list(vec![Value::Int(2)]),
                Value::Int(3)
            ])
        );
        // char members contribute their code points
        assert_eq!(program[1], Value::Set(0b100110));
    }

    #[test]
    fn set_member_range_is_checked() {
        let mut machine = Machine::new();
        let err = parse(lex("{40}").unwrap(), &mut machine).unwrap_err();
        assert!(err.message.contains("set member 40 out of range 0..31"));
        let err = parse(lex("{ [1] }").unwrap(), &mut machine).unwrap_err();
        assert!(err.message.contains("set members must be small integers"));
    }

    #[test]
    fn unclosed_brackets_consume_to_eof() {
        let (_, program) = parse_with("[1 2");
        assert_eq!(program, vec![Value::list(vec![Value::Int(1), Value::Int(2)])]);
        let (_, program) = parse_with("{1 2");
        assert_eq!(program, vec![Value::Set(0b110)]);
    }

    #[test]
    fn stray_semicolons_are_skipped() {
        let (_, program) = parse_with("; 1 ;");
        assert_eq!(program, vec![Value::Int(1)]);
    }
}
