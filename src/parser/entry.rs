//! Compilation entry points.
//!
//! All parser state lives in the [`Parser`](super::expr::Parser) value, so
//! compilations are independent and reentrant.

use std::fmt;

use crate::bytecode::BytecodeProgram;
use crate::opcode::ScopeCodeFlags;

use super::emit::eval_ret_operand;
use super::error::{ErrorClass, ParserError};
use super::expr::Parser;
use super::scopes::{ScopeFlags, ScopeKind};

#[derive(Clone, Debug, Default)]
pub struct CompilerOptions {
    /// Print each serialized instruction after a successful compilation.
    pub show_instrs: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    class: ErrorClass,
    message: String,
    position: usize,
}

impl CompileError {
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl From<ParserError> for CompileError {
    fn from(err: ParserError) -> Self {
        Self {
            class: err.class(),
            message: err.message().into_owned(),
            position: err.position(),
        }
    }
}

/// Compile global code; non-strict by default.
pub fn parse_script(
    source: &[u8],
    options: &CompilerOptions,
) -> Result<BytecodeProgram, CompileError> {
    parse_program(source, false, false, options)
}

/// Compile eval code. The produced program reports whether any function
/// declaration or expression appeared anywhere in the source.
pub fn parse_eval(
    source: &[u8],
    is_strict: bool,
    options: &CompilerOptions,
) -> Result<BytecodeProgram, CompileError> {
    parse_program(source, true, is_strict, options)
}

fn parse_program(
    source: &[u8],
    in_eval: bool,
    is_strict: bool,
    options: &CompilerOptions,
) -> Result<BytecodeProgram, CompileError> {
    let mut parser = Parser::new(source, in_eval);

    let scope_kind = if in_eval {
        ScopeKind::Eval
    } else {
        ScopeKind::Global
    };
    let root = parser.tree.open(scope_kind, None);
    parser.scope_stack.push(root);
    parser.tree.scope_mut(root).set_strict_mode(is_strict);
    parser.lexer.set_strict_mode(is_strict);

    parser.skip_newlines()?;

    // Promotion is never attempted for global or eval code itself; nested
    // function scopes opt in on their own.
    parser.parse_source_element_list(true, false)?;
    parser.skip_newlines()?;

    {
        let (dumper, scope) = parser.emitter();
        if in_eval {
            dumper.dump_retval(scope, eval_ret_operand());
        } else {
            dumper.dump_ret(scope);
        }
    }

    let root_scope = parser.tree.scope(root);
    let mut scope_flags = ScopeCodeFlags::empty();
    if root_scope.strict_mode() {
        scope_flags |= ScopeCodeFlags::STRICT;
    }
    if !root_scope.flags().contains(ScopeFlags::REFS_ARGUMENTS) {
        scope_flags |= ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER;
    }
    if !root_scope.flags().contains(ScopeFlags::REFS_EVAL) {
        scope_flags |= ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER;
    }
    let contains_functions = root_scope
        .flags()
        .contains(ScopeFlags::CONTAINS_FUNCTIONS);

    let (instrs, lit_map) = parser.tree.serialize_all(root);
    let program = BytecodeProgram::new(instrs, lit_map, parser.lits, scope_flags, contains_functions);
    if options.show_instrs {
        print!("{}", program.disassemble());
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{OpCode, OP_ASSIGNMENT, OP_REG_VAR_DECL, OP_RET, OP_RETVAL, OP_VAR_DECL};

    fn opcodes(program: &BytecodeProgram) -> Vec<OpCode> {
        program.instrs().iter().map(|i| i.opcode()).collect()
    }

    #[test]
    fn empty_script_compiles_to_prologue_and_ret() {
        let program = parse_script(b"", &CompilerOptions::default()).expect("compile");
        let ops = opcodes(&program);
        assert_eq!(ops.last(), Some(&OP_RET));
        assert!(ops.contains(&OP_REG_VAR_DECL));
        assert!(program
            .scope_flags()
            .contains(ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER));
        assert!(!program.contains_functions());
    }

    #[test]
    fn eval_programs_return_the_eval_register() {
        let program = parse_eval(b"1", false, &CompilerOptions::default()).expect("compile");
        let ops = opcodes(&program);
        assert_eq!(ops.last(), Some(&OP_RETVAL));
        assert!(ops.contains(&OP_ASSIGNMENT));
    }

    #[test]
    fn var_statement_matches_expected_sequence() {
        let program = parse_script(b"var x = 1;", &CompilerOptions::default()).expect("compile");
        let ops = opcodes(&program);
        assert!(ops.contains(&OP_VAR_DECL));
        assert!(ops.contains(&OP_ASSIGNMENT));
        assert_eq!(ops.last(), Some(&OP_RET));
    }

    #[test]
    fn syntax_error_carries_class_and_position() {
        let err = parse_script(b"return 1;", &CompilerOptions::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Syntax);
        assert_eq!(err.message(), "return not in a function");
        assert_eq!(err.position(), 0);
    }

    #[test]
    fn reference_error_class_is_distinguished() {
        let err = parse_script(b"1 = 2;", &CompilerOptions::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Reference);
    }
}
