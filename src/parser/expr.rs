//! Recursive-descent expression grammar.
//!
//! Each production consumes tokens, drives the emitter, and returns a value
//! operand (register, literal, or empty). Statement productions live in
//! `stmt.rs`; both halves share the [`Parser`] state defined here.

use crate::lit::LitTable;
use crate::opcode::{
    CallSiteFlags, OpCode, OP_ADDITION, OP_B_AND, OP_B_NOT, OP_B_OR, OP_B_SHIFT_LEFT,
    OP_B_SHIFT_RIGHT, OP_B_SHIFT_URIGHT, OP_B_XOR, OP_DIVISION, OP_EQUAL_VALUE,
    OP_EQUAL_VALUE_TYPE, OP_GREATER_OR_EQUAL_THAN, OP_GREATER_THAN, OP_IN, OP_INSTANCEOF,
    OP_LESS_OR_EQUAL_THAN, OP_LESS_THAN, OP_LOGICAL_NOT, OP_MULTIPLICATION, OP_NOT_EQUAL_VALUE,
    OP_NOT_EQUAL_VALUE_TYPE, OP_POST_DECR, OP_POST_INCR, OP_PRE_DECR, OP_PRE_INCR, OP_REMAINDER,
    OP_SUBSTRACTION, OP_TYPEOF, OP_UNARY_MINUS, OP_UNARY_PLUS,
};

use super::early_error::{EarlyErrorChecker, PropKind};
use super::emit::{eval_ret_operand, this_operand, Dumper, Operand, VargKind};
use super::error::ParserError;
use super::labels::LabelSet;
use super::lexer::Lexer;
use super::scopes::{Scope, ScopeFlags, ScopeId, ScopeKind, ScopeTree};
use super::tokens::{
    keyword_name, keyword_of_token, TOK_AND_ASSIGN, TOK_DEC, TOK_DELETE, TOK_DIV_ASSIGN,
    TOK_EQ, TOK_FALSE, TOK_FUNCTION, TOK_GTE, TOK_IDENT, TOK_IN, TOK_INC, TOK_INSTANCEOF,
    TOK_LAND, TOK_LOR, TOK_LTE, TOK_MINUS_ASSIGN, TOK_MOD_ASSIGN, TOK_MUL_ASSIGN, TOK_NEQ,
    TOK_NEWLINE, TOK_NEW, TOK_NULL, TOK_NUMBER, TOK_OR_ASSIGN, TOK_PLUS_ASSIGN, TOK_REGEXP,
    TOK_SAR, TOK_SAR_ASSIGN, TOK_SHL, TOK_SHL_ASSIGN, TOK_SHR, TOK_SHR_ASSIGN, TOK_SMALL_INT,
    TOK_STRICT_EQ, TOK_STRICT_NEQ, TOK_STRING, TOK_THIS, TOK_TRUE, TOK_TYPEOF, TOK_VOID,
    TOK_XOR_ASSIGN,
};
use super::types::{SourcePos, Token, TokenExtra};

const ERR_EXPECTED_LITERAL: &str = "expected literal";
const ERR_EXPECTED_IDENTIFIER: &str = "expected identifier";
const ERR_UNEXPECTED_TOKEN: &str = "unexpected token";
const ERR_EXPECTED_FUNCTION_NAME: &str = "expected function name";
const ERR_WRONG_PROPERTY_NAME: &str = "wrong property name type";

/// Base object and property name of the reference an expression evaluated
/// to, when it was a member access; both empty otherwise.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MemberAccess {
    pub base: Operand,
    pub prop: Operand,
}

impl MemberAccess {
    pub fn none() -> Self {
        Self {
            base: Operand::Empty,
            prop: Operand::Empty,
        }
    }

    fn is_some(&self) -> bool {
        !self.base.is_empty() && !self.prop.is_empty()
    }
}

pub struct Parser<'a> {
    pub(super) lexer: Lexer<'a>,
    pub(super) lits: LitTable,
    pub(super) tree: ScopeTree,
    pub(super) scope_stack: Vec<ScopeId>,
    pub(super) dumper: Dumper,
    pub(super) labels: LabelSet,
    pub(super) early: EarlyErrorChecker,
    pub(super) inside_eval: bool,
    pub(super) inside_function: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a [u8], inside_eval: bool) -> Self {
        Self {
            lexer: Lexer::new(source),
            lits: LitTable::new(),
            tree: ScopeTree::new(),
            scope_stack: Vec::new(),
            dumper: Dumper::new(),
            labels: LabelSet::new(),
            early: EarlyErrorChecker::new(),
            inside_eval,
            inside_function: false,
        }
    }

    // ---- token plumbing -------------------------------------------------

    pub(super) fn token(&self) -> Token {
        self.lexer.token()
    }

    pub(super) fn token_is(&self, val: i32) -> bool {
        self.token().val() == val
    }

    pub(super) fn token_is_char(&self, ch: u8) -> bool {
        self.token_is(ch as i32)
    }

    pub(super) fn skip_token(&mut self) -> Result<(), ParserError> {
        self.lexer.next_token(&mut self.lits, false)?;
        Ok(())
    }

    pub(super) fn skip_newlines(&mut self) -> Result<(), ParserError> {
        loop {
            self.skip_token()?;
            if !self.token_is(TOK_NEWLINE) {
                return Ok(());
            }
        }
    }

    fn rescan_regexp_token(&mut self) -> Result<(), ParserError> {
        self.lexer.seek(self.token().pos());
        self.lexer.next_token(&mut self.lits, true)?;
        Ok(())
    }

    pub(super) fn current_token_must_be(&self, ch: u8) -> Result<(), ParserError> {
        if !self.token_is_char(ch) {
            return Err(ParserError::expecting(ch, self.token().pos() as usize));
        }
        Ok(())
    }

    pub(super) fn next_token_must_be(&mut self, ch: u8) -> Result<(), ParserError> {
        self.skip_token()?;
        self.current_token_must_be(ch)
    }

    pub(super) fn token_after_newlines_must_be(&mut self, ch: u8) -> Result<(), ParserError> {
        self.skip_newlines()?;
        self.current_token_must_be(ch)
    }

    pub(super) fn parser_error(&self, message: &'static str) -> ParserError {
        ParserError::syntax(message, self.token().pos() as usize)
    }

    // ---- scope plumbing -------------------------------------------------

    pub(super) fn cur_scope_id(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack underflow")
    }

    pub(super) fn cur_scope(&self) -> &Scope {
        self.tree.scope(self.cur_scope_id())
    }

    pub(super) fn emitter(&mut self) -> (&mut Dumper, &mut Scope) {
        let id = *self.scope_stack.last().expect("scope stack underflow");
        (&mut self.dumper, self.tree.scope_mut(id))
    }

    pub(super) fn is_strict_mode(&self) -> bool {
        self.cur_scope().strict_mode()
    }

    pub(super) fn mark_scope_flag(&mut self, flag: ScopeFlags) {
        let id = self.cur_scope_id();
        self.tree.scope_mut(id).mark_flag(flag);
    }

    fn check_eval_and_arguments(
        &self,
        operand: Operand,
        pos: SourcePos,
    ) -> Result<(), ParserError> {
        self.early
            .check_for_eval_and_arguments(&self.lits, operand, self.is_strict_mode(), pos)
    }

    fn is_eval_literal(&self, operand: Operand) -> bool {
        operand
            .lit()
            .is_some_and(|lit| self.lits.str_equals(lit, b"eval"))
    }

    // ---- property names -------------------------------------------------

    /* property_name
      : Identifier | Keyword | StringLiteral | NumericLiteral | 'null' | BooleanLiteral
      ; */
    fn parse_property_name(&mut self) -> Result<Operand, ParserError> {
        let token = self.token();
        match token.val() {
            TOK_IDENT | TOK_STRING => Ok(Operand::Lit(token.lit().expect("payload"))),
            TOK_NUMBER => {
                let num = self
                    .lits
                    .get(token.lit().expect("payload"))
                    .as_number()
                    .expect("number literal");
                Ok(Operand::Lit(self.lits.intern_number_as_string(num)))
            }
            TOK_SMALL_INT => {
                let TokenExtra::SmallInt(value) = token.extra() else {
                    unreachable!("small-int token without payload");
                };
                Ok(Operand::Lit(self.lits.intern_number_as_string(value as f64)))
            }
            TOK_NULL => Ok(Operand::Lit(self.lits.intern_string(b"null"))),
            TOK_TRUE => Ok(Operand::Lit(self.lits.intern_string(b"true"))),
            TOK_FALSE => Ok(Operand::Lit(self.lits.intern_string(b"false"))),
            val => match keyword_of_token(val) {
                Some(kw) => Ok(Operand::Lit(self.lits.intern_string(keyword_name(kw).as_bytes()))),
                None => Err(self.parser_error(ERR_WRONG_PROPERTY_NAME)),
            },
        }
    }

    /* property_name_and_value
      : property_name LT!* ':' LT!* assignment_expression
      ; */
    fn parse_property_name_and_value(&mut self) -> Result<(), ParserError> {
        let name = self.parse_property_name()?;
        self.token_after_newlines_must_be(b':')?;
        self.skip_newlines()?;
        let value = self.parse_assignment_expression(true)?;
        let (dumper, scope) = self.emitter();
        dumper.dump_prop_name_and_value(scope, name, value);
        self.early.add_prop_name(name, PropKind::Data);
        Ok(())
    }

    /* property_assignment
      : property_name_and_value
      | 'get'|'set' LT!* property_name LT!* '(' ... ')' LT!* '{' function_body '}'
      ; */
    fn parse_property_assignment(&mut self) -> Result<(), ParserError> {
        if !self.token_is(TOK_IDENT) {
            return self.parse_property_name_and_value();
        }
        let name_lit = self.token().lit().expect("payload");
        let is_setter = if self.lits.str_equals(name_lit, b"get") {
            false
        } else if self.lits.str_equals(name_lit, b"set") {
            true
        } else {
            return self.parse_property_name_and_value();
        };

        let temp = self.token();
        self.skip_newlines()?;
        if self.token_is_char(b':') {
            // Plain property actually named "get" / "set".
            let current = self.token();
            self.lexer.save_token(current);
            self.lexer.set_current(temp);
            return self.parse_property_name_and_value();
        }

        let name = self.parse_property_name()?;
        self.early.add_prop_name(
            name,
            if is_setter {
                PropKind::Setter
            } else {
                PropKind::Getter
            },
        );

        self.mark_scope_flag(ScopeFlags::CONTAINS_FUNCTIONS);
        let parent = self.cur_scope_id();
        let fn_scope = self.tree.open(ScopeKind::Function, Some(parent));
        let parent_strict = self.tree.scope(parent).strict_mode();
        self.tree.scope_mut(fn_scope).set_strict_mode(parent_strict);
        self.scope_stack.push(fn_scope);
        self.lexer.set_strict_mode(parent_strict);

        self.early.start_checking_of_vargs();
        self.skip_newlines()?;
        let func = self.parse_argument_list(VargKind::FuncExpr, Operand::Empty, Operand::Empty)?;

        let (dumper, scope) = self.emitter();
        dumper.dump_function_end_for_rewrite(scope);

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;

        let was_in_function = self.inside_function;
        self.inside_function = true;
        self.labels.mask_set();
        self.parse_source_element_list(false, true)?;
        self.labels.restore_set();
        self.token_after_newlines_must_be(b'}')?;

        self.finish_function_scope()?;

        if is_setter {
            let (dumper, scope) = self.emitter();
            dumper.dump_prop_setter_decl(scope, name, func);
        } else {
            let (dumper, scope) = self.emitter();
            dumper.dump_prop_getter_decl(scope, name, func);
        }
        self.inside_function = was_in_function;
        Ok(())
    }

    /// Common closing sequence for function scopes: final `ret`, the
    /// function-end rewrite, strict-mode formal checks, and the pop back to
    /// the parent scope.
    fn finish_function_scope(&mut self) -> Result<(), ParserError> {
        let fn_scope = self.cur_scope_id();
        let extra = self.tree.count_subscope_instructions(fn_scope)
            + self.tree.scope(fn_scope).local_count() as u32;
        let (dumper, scope) = self.emitter();
        dumper.dump_ret(scope);
        dumper.rewrite_function_end(scope, extra);

        let is_strict = self.is_strict_mode();
        self.early.check_for_syntax_errors_in_formal_param_list(
            &self.lits,
            is_strict,
            self.token().pos(),
        )?;

        self.scope_stack.pop();
        self.lexer.set_strict_mode(self.is_strict_mode());
        Ok(())
    }

    // ---- argument lists --------------------------------------------------

    /// Parse a comma-separated list of identifiers, assignment expressions
    /// or property assignments and dump the matching varg sequence; the
    /// header's argument count is rewritten at the end.
    pub(super) fn parse_argument_list(
        &mut self,
        vlt: VargKind,
        obj: Operand,
        this_arg: Operand,
    ) -> Result<Operand, ParserError> {
        let close: u8 = match vlt {
            VargKind::FuncDecl | VargKind::FuncExpr | VargKind::ConstructExpr | VargKind::CallExpr => {
                self.current_token_must_be(b'(')?;
                b')'
            }
            VargKind::ArrayDecl => {
                self.current_token_must_be(b'[')?;
                b']'
            }
            VargKind::ObjDecl => {
                self.current_token_must_be(b'{')?;
                b'}'
            }
        };

        if vlt == VargKind::CallExpr {
            let mut flags = CallSiteFlags::empty();
            let mut this_value = Operand::Empty;
            if !this_arg.is_empty() {
                flags |= CallSiteFlags::HAVE_THIS_ARG;
                // The base of the call may be evaluated once more here; a
                // literal base must flow through a register first.
                this_value = if this_arg.is_lit() {
                    let (dumper, scope) = self.emitter();
                    dumper.dump_variable_assignment_res(scope, this_arg)?
                } else {
                    this_arg
                };
            } else if self.is_eval_literal(obj) {
                flags |= CallSiteFlags::DIRECT_CALL_TO_EVAL_FORM;
            }

            let (dumper, scope) = self.emitter();
            dumper.dump_varg_header_for_rewrite(scope, vlt, obj);
            if !flags.is_empty() {
                dumper.dump_call_site_info(scope, flags, this_value);
            }
        } else {
            if vlt == VargKind::ObjDecl {
                self.early.start_checking_of_prop_names();
            }
            let (dumper, scope) = self.emitter();
            dumper.dump_varg_header_for_rewrite(scope, vlt, obj);
        }

        let mut args_num = 0usize;
        self.skip_newlines()?;
        while !self.token_is_char(close) {
            self.dumper.start_varg_code_sequence();

            match vlt {
                VargKind::FuncDecl | VargKind::FuncExpr => {
                    if !self.token_is(TOK_IDENT) {
                        return Err(self.parser_error(ERR_EXPECTED_IDENTIFIER));
                    }
                    let lit = self.token().lit().expect("payload");
                    let operand = Operand::Lit(lit);
                    self.early.add_varg(operand);
                    let id = self.cur_scope_id();
                    self.tree.scope_mut(id).add_variable(lit, true);
                    let (dumper, scope) = self.emitter();
                    dumper.dump_varg(scope, operand);
                    self.skip_newlines()?;
                }
                VargKind::ConstructExpr | VargKind::CallExpr => {
                    let operand = self.parse_assignment_expression(true)?;
                    let (dumper, scope) = self.emitter();
                    dumper.dump_varg(scope, operand);
                    self.skip_newlines()?;
                }
                VargKind::ArrayDecl => {
                    if self.token_is_char(b',') {
                        let (dumper, scope) = self.emitter();
                        let hole = dumper.dump_array_hole_assignment_res(scope)?;
                        dumper.dump_varg(scope, hole);
                    } else {
                        let operand = self.parse_assignment_expression(true)?;
                        let (dumper, scope) = self.emitter();
                        dumper.dump_varg(scope, operand);
                        self.skip_newlines()?;
                    }
                }
                VargKind::ObjDecl => {
                    self.parse_property_assignment()?;
                    self.skip_newlines()?;
                }
            }

            if self.token_is_char(b',') {
                self.skip_newlines()?;
            } else {
                self.current_token_must_be(close)?;
            }

            args_num += 1;
            self.dumper.finish_varg_code_sequence();
        }

        if vlt == VargKind::ObjDecl {
            let is_strict = self.is_strict_mode();
            self.early
                .check_for_duplication_of_prop_names(is_strict, self.token().pos())?;
        }
        let (dumper, scope) = self.emitter();
        dumper.rewrite_varg_header_set_args_count(scope, args_num)
    }

    // ---- function forms --------------------------------------------------

    /* function_declaration
      : 'function' LT!* Identifier LT!* '(' formal_parameter_list? ')' LT!* function_body
      ; */
    pub(super) fn parse_function_declaration(&mut self) -> Result<(), ParserError> {
        debug_assert!(self.token_is(TOK_FUNCTION));

        self.labels.mask_set();
        self.mark_scope_flag(ScopeFlags::CONTAINS_FUNCTIONS);

        let parent = self.cur_scope_id();
        let fn_scope = self.tree.open(ScopeKind::Function, Some(parent));
        let parent_strict = self.tree.scope(parent).strict_mode();
        self.tree.scope_mut(fn_scope).set_strict_mode(parent_strict);
        self.scope_stack.push(fn_scope);
        self.lexer.set_strict_mode(parent_strict);

        self.skip_newlines()?;
        if !self.token_is(TOK_IDENT) {
            return Err(self.parser_error(ERR_EXPECTED_FUNCTION_NAME));
        }
        let name = Operand::Lit(self.token().lit().expect("payload"));

        self.skip_newlines()?;
        self.early.start_checking_of_vargs();
        self.parse_argument_list(VargKind::FuncDecl, name, Operand::Empty)?;

        let (dumper, scope) = self.emitter();
        dumper.dump_function_end_for_rewrite(scope);

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;

        let was_in_function = self.inside_function;
        self.inside_function = true;
        self.parse_source_element_list(false, true)?;
        self.next_token_must_be(b'}')?;

        self.check_eval_and_arguments(name, self.token().pos())?;
        self.finish_function_scope()?;
        self.inside_function = was_in_function;
        self.labels.restore_set();
        Ok(())
    }

    /* function_expression
      : 'function' LT!* Identifier? LT!* '(' formal_parameter_list? ')' LT!* function_body
      ; */
    fn parse_function_expression(&mut self) -> Result<Operand, ParserError> {
        debug_assert!(self.token_is(TOK_FUNCTION));

        self.early.start_checking_of_vargs();
        self.mark_scope_flag(ScopeFlags::CONTAINS_FUNCTIONS);

        let parent = self.cur_scope_id();
        let fn_scope = self.tree.open(ScopeKind::Function, Some(parent));
        let parent_strict = self.tree.scope(parent).strict_mode();
        self.tree.scope_mut(fn_scope).set_strict_mode(parent_strict);
        self.scope_stack.push(fn_scope);
        self.lexer.set_strict_mode(parent_strict);

        self.skip_newlines()?;
        let mut name = Operand::Empty;
        let res = if self.token_is(TOK_IDENT) {
            name = Operand::Lit(self.token().lit().expect("payload"));
            self.skip_newlines()?;
            self.parse_argument_list(VargKind::FuncExpr, name, Operand::Empty)?
        } else {
            let current = self.token();
            self.lexer.save_token(current);
            self.skip_newlines()?;
            self.parse_argument_list(VargKind::FuncExpr, Operand::Empty, Operand::Empty)?
        };

        let (dumper, scope) = self.emitter();
        dumper.dump_function_end_for_rewrite(scope);

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;

        let was_in_function = self.inside_function;
        self.inside_function = true;
        self.labels.mask_set();
        self.parse_source_element_list(false, true)?;
        self.labels.restore_set();
        self.next_token_must_be(b'}')?;

        if !name.is_empty() {
            self.check_eval_and_arguments(name, self.token().pos())?;
        }
        self.finish_function_scope()?;
        self.inside_function = was_in_function;
        Ok(res)
    }

    // ---- primary expressions ---------------------------------------------

    fn parse_array_literal(&mut self) -> Result<Operand, ParserError> {
        self.parse_argument_list(VargKind::ArrayDecl, Operand::Empty, Operand::Empty)
    }

    fn parse_object_literal(&mut self) -> Result<Operand, ParserError> {
        self.parse_argument_list(VargKind::ObjDecl, Operand::Empty, Operand::Empty)
    }

    fn parse_literal(&mut self) -> Result<Operand, ParserError> {
        let token = self.token();
        match token.val() {
            TOK_NUMBER => {
                let lit = token.lit().expect("payload");
                let (dumper, scope) = self.emitter();
                dumper.dump_number_assignment_res(scope, lit)
            }
            TOK_STRING => {
                let lit = token.lit().expect("payload");
                let (dumper, scope) = self.emitter();
                dumper.dump_string_assignment_res(scope, lit)
            }
            TOK_REGEXP => {
                let lit = token.lit().expect("payload");
                let (dumper, scope) = self.emitter();
                dumper.dump_regexp_assignment_res(scope, lit)
            }
            TOK_NULL => {
                let (dumper, scope) = self.emitter();
                dumper.dump_null_assignment_res(scope)
            }
            TOK_TRUE | TOK_FALSE => {
                let is_true = token.val() == TOK_TRUE;
                let (dumper, scope) = self.emitter();
                dumper.dump_boolean_assignment_res(scope, is_true)
            }
            TOK_SMALL_INT => {
                let TokenExtra::SmallInt(value) = token.extra() else {
                    unreachable!("small-int token without payload");
                };
                let (dumper, scope) = self.emitter();
                dumper.dump_smallint_assignment_res(scope, value)
            }
            _ => Err(self.parser_error(ERR_EXPECTED_LITERAL)),
        }
    }

    /* primary_expression
      : 'this' | Identifier | literal | array_literal | object_literal
      | '(' LT!* expression LT!* ')'
      ; */
    fn parse_primary_expression(&mut self) -> Result<Operand, ParserError> {
        if self.token_is(TOK_THIS) {
            return Ok(this_operand());
        }

        if self.token_is_char(b'/') || self.token_is(TOK_DIV_ASSIGN) {
            // Must be a regexp literal: rescan from the token start.
            self.rescan_regexp_token()?;
            return self.parse_literal();
        }

        match self.token().val() {
            TOK_NULL | TOK_TRUE | TOK_FALSE | TOK_SMALL_INT | TOK_NUMBER | TOK_REGEXP
            | TOK_STRING => self.parse_literal(),
            TOK_IDENT => {
                let lit = self.token().lit().expect("payload");
                if self.lits.str_equals(lit, b"arguments") {
                    self.mark_scope_flag(ScopeFlags::REFS_ARGUMENTS);
                }
                if self.lits.str_equals(lit, b"eval") {
                    self.mark_scope_flag(ScopeFlags::REFS_EVAL);
                }
                Ok(Operand::Lit(lit))
            }
            val if val == b'[' as i32 => self.parse_array_literal(),
            val if val == b'{' as i32 => self.parse_object_literal(),
            val if val == b'(' as i32 => {
                self.skip_newlines()?;
                if !self.token_is_char(b')') {
                    let res = self.parse_expression(true, false)?;
                    self.token_after_newlines_must_be(b')')?;
                    return Ok(res);
                }
                Err(self.parser_error(ERR_UNEXPECTED_TOKEN))
            }
            _ => Err(self.parser_error(ERR_UNEXPECTED_TOKEN)),
        }
    }

    /// Property name after `.`: identifier, keyword, boolean or null.
    fn parse_member_prop_name(&mut self) -> Result<Operand, ParserError> {
        let token = self.token();
        let lit = match token.val() {
            TOK_IDENT => token.lit().expect("payload"),
            TOK_NULL => self.lits.intern_string(b"null"),
            TOK_TRUE => self.lits.intern_string(b"true"),
            TOK_FALSE => self.lits.intern_string(b"false"),
            val => match keyword_of_token(val) {
                Some(kw) => self.lits.intern_string(keyword_name(kw).as_bytes()),
                None => return Err(self.parser_error(ERR_EXPECTED_IDENTIFIER)),
            },
        };
        let (dumper, scope) = self.emitter();
        dumper.dump_string_assignment_res(scope, lit)
    }

    /* member_expression
      : (primary_expression | function_expression
         | 'new' LT!* member_expression (LT!* '(' arguments? ')')?)
        (LT!* ('[' expression ']' | '.' Identifier))*
      ; */
    fn parse_member_expression(&mut self) -> Result<(Operand, MemberAccess), ParserError> {
        let mut expr;
        let mut access = MemberAccess::none();

        if self.token_is(TOK_FUNCTION) {
            expr = self.parse_function_expression()?;
        } else if self.token_is(TOK_NEW) {
            self.skip_newlines()?;
            let (inner, inner_access) = self.parse_member_expression()?;
            access = inner_access;
            expr = inner;

            self.skip_newlines()?;
            if self.token_is_char(b'(') {
                expr = self.parse_argument_list(VargKind::ConstructExpr, expr, Operand::Empty)?;
            } else {
                let current = self.token();
                self.lexer.save_token(current);
                let (dumper, scope) = self.emitter();
                dumper.dump_varg_header_for_rewrite(scope, VargKind::ConstructExpr, expr);
                expr = dumper.rewrite_varg_header_set_args_count(scope, 0)?;
            }
        } else {
            expr = self.parse_primary_expression()?;
        }

        self.skip_newlines()?;
        while self.token_is_char(b'[') || self.token_is_char(b'.') {
            let prop = if self.token_is_char(b'[') {
                self.skip_newlines()?;
                let prop = self.parse_expression(true, false)?;
                self.next_token_must_be(b']')?;
                prop
            } else {
                self.skip_newlines()?;
                self.parse_member_prop_name()?
            };
            self.skip_newlines()?;

            access.base = expr;
            access.prop = prop;
            let (dumper, scope) = self.emitter();
            expr = dumper.dump_prop_getter_res(scope, expr, prop)?;
        }

        let current = self.token();
        self.lexer.save_token(current);
        Ok((expr, access))
    }

    /* call_expression
      : member_expression (LT!* (arguments | '[' expression ']' | '.' Identifier))*
      ; */
    fn parse_call_expression(&mut self) -> Result<(Operand, MemberAccess), ParserError> {
        let (mut expr, mut access) = self.parse_member_expression()?;

        self.skip_newlines()?;
        if !self.token_is_char(b'(') {
            let current = self.token();
            self.lexer.save_token(current);
            return Ok((expr, access));
        }

        expr = self.parse_argument_list(VargKind::CallExpr, expr, access.base)?;
        access = MemberAccess::none();

        self.skip_newlines()?;
        while self.token_is_char(b'(') || self.token_is_char(b'[') || self.token_is_char(b'.') {
            if self.token_is_char(b'(') {
                expr = self.parse_argument_list(VargKind::CallExpr, expr, access.base)?;
                access = MemberAccess::none();
                self.skip_newlines()?;
            } else {
                access.base = expr;
                let prop = if self.token_is_char(b'[') {
                    self.skip_newlines()?;
                    let prop = self.parse_expression(true, false)?;
                    self.next_token_must_be(b']')?;
                    prop
                } else {
                    self.skip_newlines()?;
                    self.parse_member_prop_name()?
                };
                access.prop = prop;
                let (dumper, scope) = self.emitter();
                expr = dumper.dump_prop_getter_res(scope, expr, prop)?;
                self.skip_newlines()?;
            }
        }
        let current = self.token();
        self.lexer.save_token(current);
        Ok((expr, access))
    }

    pub(super) fn parse_left_hand_side_expression(
        &mut self,
    ) -> Result<(Operand, MemberAccess), ParserError> {
        self.parse_call_expression()
    }

    /* postfix_expression
      : left_hand_side_expression ('++' | '--')?
      ; */
    fn parse_postfix_expression(&mut self) -> Result<(Operand, MemberAccess), ParserError> {
        let (mut expr, access) = self.parse_left_hand_side_expression()?;

        if self.lexer.prev_token_val() == TOK_NEWLINE {
            return Ok((expr, access));
        }

        self.skip_token()?;
        if self.token_is(TOK_INC) || self.token_is(TOK_DEC) {
            let op = if self.token_is(TOK_INC) {
                OP_POST_INCR
            } else {
                OP_POST_DECR
            };
            self.check_eval_and_arguments(expr, self.token().pos())?;
            let (dumper, scope) = self.emitter();
            let res = dumper.dump_double_address_res(scope, op, expr)?;
            if access.is_some() {
                dumper.dump_prop_setter(scope, access.base, access.prop, expr);
            }
            expr = res;
        } else {
            let current = self.token();
            self.lexer.save_token(current);
        }
        Ok((expr, access))
    }

    /* unary_expression
      : postfix_expression
      | ('delete' | 'void' | 'typeof' | '++' | '--' | '+' | '-' | '~' | '!') unary_expression
      ; */
    fn parse_unary_expression(&mut self) -> Result<(Operand, MemberAccess), ParserError> {
        let token_val = self.token().val();
        match token_val {
            TOK_INC | TOK_DEC => {
                let op = if token_val == TOK_INC {
                    OP_PRE_INCR
                } else {
                    OP_PRE_DECR
                };
                self.skip_newlines()?;
                let (inner, access) = self.parse_unary_expression()?;
                self.check_eval_and_arguments(inner, self.token().pos())?;
                let pos = self.token().pos();
                let (dumper, scope) = self.emitter();
                let expr = dumper.dump_prefix_op_res(scope, op, inner, pos)?;
                if access.is_some() {
                    dumper.dump_prop_setter(scope, access.base, access.prop, expr);
                }
                Ok((expr, access))
            }
            val if val == b'+' as i32 => self.parse_simple_unary(OP_UNARY_PLUS),
            val if val == b'-' as i32 => self.parse_simple_unary(OP_UNARY_MINUS),
            val if val == b'~' as i32 => self.parse_simple_unary(OP_B_NOT),
            val if val == b'!' as i32 => self.parse_simple_unary(OP_LOGICAL_NOT),
            TOK_DELETE => {
                self.mark_scope_flag(ScopeFlags::CONTAINS_DELETE);
                self.skip_newlines()?;
                let (inner, _) = self.parse_unary_expression()?;
                let is_strict = self.is_strict_mode();
                let pos = self.token().pos();
                let id = self.cur_scope_id();
                let scope = self.tree.scope_mut(id);
                let expr =
                    self.dumper
                        .dump_delete_res(scope, &self.lits, inner, is_strict, pos)?;
                Ok((expr, MemberAccess::none()))
            }
            TOK_VOID => {
                self.skip_newlines()?;
                let (inner, _) = self.parse_unary_expression()?;
                let (dumper, scope) = self.emitter();
                let expr = dumper.dump_variable_assignment_res(scope, inner)?;
                dumper.dump_undefined_assignment(scope, expr);
                Ok((expr, MemberAccess::none()))
            }
            TOK_TYPEOF => {
                self.skip_newlines()?;
                let (inner, _) = self.parse_unary_expression()?;
                let (dumper, scope) = self.emitter();
                let expr = dumper.dump_double_address_res(scope, OP_TYPEOF, inner)?;
                Ok((expr, MemberAccess::none()))
            }
            _ => self.parse_postfix_expression(),
        }
    }

    fn parse_simple_unary(&mut self, op: OpCode) -> Result<(Operand, MemberAccess), ParserError> {
        self.skip_newlines()?;
        let (inner, _) = self.parse_unary_expression()?;
        let (dumper, scope) = self.emitter();
        let expr = dumper.dump_double_address_res(scope, op, inner)?;
        Ok((expr, MemberAccess::none()))
    }

    /// Literal operands flow through a register before participating in a
    /// binary operation chain.
    pub(super) fn dump_assignment_of_lhs_if_literal(
        &mut self,
        expr: Operand,
    ) -> Result<Operand, ParserError> {
        if expr.is_lit() {
            let (dumper, scope) = self.emitter();
            return dumper.dump_variable_assignment_res(scope, expr);
        }
        Ok(expr)
    }

    fn parse_binary_tier<F>(
        &mut self,
        mut parse_next: F,
        op_of_token: fn(i32) -> Option<OpCode>,
    ) -> Result<Operand, ParserError>
    where
        F: FnMut(&mut Self) -> Result<Operand, ParserError>,
    {
        let mut expr = parse_next(self)?;
        self.skip_newlines()?;
        loop {
            let Some(op) = op_of_token(self.token().val()) else {
                let current = self.token();
                self.lexer.save_token(current);
                return Ok(expr);
            };
            expr = self.dump_assignment_of_lhs_if_literal(expr)?;
            self.skip_newlines()?;
            let rhs = parse_next(self)?;
            let (dumper, scope) = self.emitter();
            expr = dumper.dump_triple_address_res(scope, op, expr, rhs)?;
            self.skip_newlines()?;
        }
    }

    /* multiplicative_expression
      : unary_expression (LT!* ('*' | '/' | '%') LT!* unary_expression)*
      ; */
    fn parse_multiplicative_expression(&mut self) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_unary_expression().map(|(expr, _)| expr),
            |val| match val {
                v if v == b'*' as i32 => Some(OP_MULTIPLICATION),
                v if v == b'/' as i32 => Some(OP_DIVISION),
                v if v == b'%' as i32 => Some(OP_REMAINDER),
                _ => None,
            },
        )
    }

    /* additive_expression
      : multiplicative_expression (LT!* ('+' | '-') LT!* multiplicative_expression)*
      ; */
    fn parse_additive_expression(&mut self) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_multiplicative_expression(),
            |val| match val {
                v if v == b'+' as i32 => Some(OP_ADDITION),
                v if v == b'-' as i32 => Some(OP_SUBSTRACTION),
                _ => None,
            },
        )
    }

    /* shift_expression
      : additive_expression (LT!* ('<<' | '>>' | '>>>') LT!* additive_expression)*
      ; */
    fn parse_shift_expression(&mut self) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_additive_expression(),
            |val| match val {
                TOK_SHL => Some(OP_B_SHIFT_LEFT),
                TOK_SAR => Some(OP_B_SHIFT_RIGHT),
                TOK_SHR => Some(OP_B_SHIFT_URIGHT),
                _ => None,
            },
        )
    }

    /* relational_expression
      : shift_expression (LT!* ('<' | '>' | '<=' | '>=' | 'instanceof' | 'in') LT!* shift_expression)*
      ; */
    fn parse_relational_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_shift_expression(),
            if in_allowed {
                |val| match val {
                    v if v == b'<' as i32 => Some(OP_LESS_THAN),
                    v if v == b'>' as i32 => Some(OP_GREATER_THAN),
                    TOK_LTE => Some(OP_LESS_OR_EQUAL_THAN),
                    TOK_GTE => Some(OP_GREATER_OR_EQUAL_THAN),
                    TOK_INSTANCEOF => Some(OP_INSTANCEOF),
                    TOK_IN => Some(OP_IN),
                    _ => None,
                }
            } else {
                |val| match val {
                    v if v == b'<' as i32 => Some(OP_LESS_THAN),
                    v if v == b'>' as i32 => Some(OP_GREATER_THAN),
                    TOK_LTE => Some(OP_LESS_OR_EQUAL_THAN),
                    TOK_GTE => Some(OP_GREATER_OR_EQUAL_THAN),
                    TOK_INSTANCEOF => Some(OP_INSTANCEOF),
                    _ => None,
                }
            },
        )
    }

    /* equality_expression
      : relational_expression (LT!* ('==' | '!=' | '===' | '!==') LT!* relational_expression)*
      ; */
    fn parse_equality_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_relational_expression(in_allowed),
            |val| match val {
                TOK_EQ => Some(OP_EQUAL_VALUE),
                TOK_NEQ => Some(OP_NOT_EQUAL_VALUE),
                TOK_STRICT_EQ => Some(OP_EQUAL_VALUE_TYPE),
                TOK_STRICT_NEQ => Some(OP_NOT_EQUAL_VALUE_TYPE),
                _ => None,
            },
        )
    }

    fn parse_bitwise_and_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_equality_expression(in_allowed),
            |val| (val == b'&' as i32).then_some(OP_B_AND),
        )
    }

    fn parse_bitwise_xor_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_bitwise_and_expression(in_allowed),
            |val| (val == b'^' as i32).then_some(OP_B_XOR),
        )
    }

    fn parse_bitwise_or_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        self.parse_binary_tier(
            |parser| parser.parse_bitwise_xor_expression(in_allowed),
            |val| (val == b'|' as i32).then_some(OP_B_OR),
        )
    }

    /* logical_and_expression
      : bitwise_or_expression (LT!* '&&' LT!* bitwise_or_expression)*
      ; */
    fn parse_logical_and_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        let expr = self.parse_bitwise_or_expression(in_allowed)?;
        self.skip_newlines()?;
        if !self.token_is(TOK_LAND) {
            let current = self.token();
            self.lexer.save_token(current);
            return Ok(expr);
        }

        let tmp = {
            let (dumper, scope) = self.emitter();
            let tmp = dumper.dump_variable_assignment_res(scope, expr)?;
            dumper.start_dumping_logical_and_checks();
            dumper.dump_logical_and_check_for_rewrite(scope, tmp);
            tmp
        };
        while self.token_is(TOK_LAND) {
            self.skip_newlines()?;
            let rhs = self.parse_bitwise_or_expression(in_allowed)?;
            let (dumper, scope) = self.emitter();
            dumper.dump_variable_assignment(scope, tmp, rhs);
            self.skip_newlines()?;
            if self.token_is(TOK_LAND) {
                let (dumper, scope) = self.emitter();
                dumper.dump_logical_and_check_for_rewrite(scope, tmp);
            }
        }
        let current = self.token();
        self.lexer.save_token(current);
        let (dumper, scope) = self.emitter();
        dumper.rewrite_logical_and_checks(scope);
        Ok(tmp)
    }

    /* logical_or_expression
      : logical_and_expression (LT!* '||' LT!* logical_and_expression)*
      ; */
    fn parse_logical_or_expression(&mut self, in_allowed: bool) -> Result<Operand, ParserError> {
        let expr = self.parse_logical_and_expression(in_allowed)?;
        self.skip_newlines()?;
        if !self.token_is(TOK_LOR) {
            let current = self.token();
            self.lexer.save_token(current);
            return Ok(expr);
        }

        let tmp = {
            let (dumper, scope) = self.emitter();
            let tmp = dumper.dump_variable_assignment_res(scope, expr)?;
            dumper.start_dumping_logical_or_checks();
            dumper.dump_logical_or_check_for_rewrite(scope, tmp);
            tmp
        };
        while self.token_is(TOK_LOR) {
            self.skip_newlines()?;
            let rhs = self.parse_logical_and_expression(in_allowed)?;
            let (dumper, scope) = self.emitter();
            dumper.dump_variable_assignment(scope, tmp, rhs);
            self.skip_newlines()?;
            if self.token_is(TOK_LOR) {
                let (dumper, scope) = self.emitter();
                dumper.dump_logical_or_check_for_rewrite(scope, tmp);
            }
        }
        let current = self.token();
        self.lexer.save_token(current);
        let (dumper, scope) = self.emitter();
        dumper.rewrite_logical_or_checks(scope);
        Ok(tmp)
    }

    /* conditional_expression
      : logical_or_expression (LT!* '?' LT!* assignment_expression ':' assignment_expression)?
      ; */
    fn parse_conditional_expression(
        &mut self,
        in_allowed: bool,
    ) -> Result<(Operand, bool), ParserError> {
        let expr = self.parse_logical_or_expression(in_allowed)?;
        self.skip_newlines()?;
        if !self.token_is_char(b'?') {
            let current = self.token();
            self.lexer.save_token(current);
            return Ok((expr, false));
        }

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_conditional_check_for_rewrite(scope, expr);
        }
        self.skip_newlines()?;
        let then_value = self.parse_assignment_expression(in_allowed)?;
        let tmp = {
            let (dumper, scope) = self.emitter();
            dumper.dump_variable_assignment_res(scope, then_value)?
        };
        self.token_after_newlines_must_be(b':')?;
        {
            let (dumper, scope) = self.emitter();
            dumper.dump_jump_to_end_for_rewrite(scope);
            dumper.rewrite_conditional_check(scope);
        }
        self.skip_newlines()?;
        let else_value = self.parse_assignment_expression(in_allowed)?;
        let (dumper, scope) = self.emitter();
        dumper.dump_variable_assignment(scope, tmp, else_value);
        dumper.rewrite_jump_to_end(scope);
        Ok((tmp, true))
    }

    /* assignment_expression
      : conditional_expression
      | left_hand_side_expression LT!* assignment_operator LT!* assignment_expression
      ; */
    pub(super) fn parse_assignment_expression(
        &mut self,
        in_allowed: bool,
    ) -> Result<Operand, ParserError> {
        let lhs_pos = self.token().pos();
        let (expr, is_conditional) = self.parse_conditional_expression(in_allowed)?;
        if is_conditional {
            return Ok(expr);
        }

        self.skip_newlines()?;
        let tt = self.token().val();
        let compound_op = match tt {
            TOK_EQ_CHAR => None,
            TOK_MUL_ASSIGN => Some(OP_MULTIPLICATION),
            TOK_DIV_ASSIGN => Some(OP_DIVISION),
            TOK_MOD_ASSIGN => Some(OP_REMAINDER),
            TOK_PLUS_ASSIGN => Some(OP_ADDITION),
            TOK_MINUS_ASSIGN => Some(OP_SUBSTRACTION),
            TOK_SHL_ASSIGN => Some(OP_B_SHIFT_LEFT),
            TOK_SAR_ASSIGN => Some(OP_B_SHIFT_RIGHT),
            TOK_SHR_ASSIGN => Some(OP_B_SHIFT_URIGHT),
            TOK_AND_ASSIGN => Some(OP_B_AND),
            TOK_XOR_ASSIGN => Some(OP_B_XOR),
            TOK_OR_ASSIGN => Some(OP_B_OR),
            _ => {
                let current = self.token();
                self.lexer.save_token(current);
                return Ok(expr);
            }
        };

        self.check_eval_and_arguments(expr, self.token().pos())?;
        self.skip_newlines()?;
        {
            let (dumper, scope) = self.emitter();
            dumper.start_dumping_assignment_expression(scope, expr, lhs_pos)?;
        }
        let assign_expr = self.parse_assignment_expression(in_allowed)?;

        let (dumper, scope) = self.emitter();
        match compound_op {
            None => dumper.dump_prop_setter_or_variable_assignment_res(scope, expr, assign_expr),
            Some(op) => dumper.dump_prop_setter_or_triple_address_res(scope, op, expr, assign_expr),
        }
    }

    /* expression
      : assignment_expression (LT!* ',' LT!* assignment_expression)*
      ; */
    pub(super) fn parse_expression(
        &mut self,
        in_allowed: bool,
        dump_eval_ret_store: bool,
    ) -> Result<Operand, ParserError> {
        let mut expr = self.parse_assignment_expression(in_allowed)?;

        loop {
            self.skip_newlines()?;
            if self.token_is_char(b',') {
                let _ = self.dump_assignment_of_lhs_if_literal(expr)?;
                self.skip_newlines()?;
                expr = self.parse_assignment_expression(in_allowed)?;
            } else {
                let current = self.token();
                self.lexer.save_token(current);
                break;
            }
        }

        if self.inside_eval && dump_eval_ret_store && !self.inside_function {
            let (dumper, scope) = self.emitter();
            dumper.dump_variable_assignment(scope, eval_ret_operand(), expr);
        }
        Ok(expr)
    }
}

const TOK_EQ_CHAR: i32 = b'=' as i32;
