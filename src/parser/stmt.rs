//! Statement grammar, source-element lists and the promotion pass.

use crate::opcode::{MetaType, ScopeCodeFlags, IDX_EMPTY, OP_FUNC_DECL_N, OP_FUNC_EXPR_N};

use super::emit::{eval_ret_operand, for_in_prop_name_operand, Operand};
use super::error::ParserError;
use super::labels::{LabelId, LabelKind};
use super::scopes::{InstrCounter, ScopeFlags, ScopeKind};
use super::tokens::{
    TOK_BREAK, TOK_CASE, TOK_CATCH, TOK_CONTINUE, TOK_DEFAULT, TOK_DO, TOK_EOF, TOK_FINALLY,
    TOK_FOR, TOK_FUNCTION, TOK_IDENT, TOK_IF, TOK_IN, TOK_NEWLINE, TOK_RETURN, TOK_STRING,
    TOK_SWITCH, TOK_THROW, TOK_TRY, TOK_VAR, TOK_WHILE, TOK_WITH, TOK_ELSE,
};
use super::types::{SourcePos, TokenExtra};
use super::expr::Parser;

const ERR_EXPECTED_IDENTIFIER: &str = "expected identifier";
const ERR_UNEXPECTED_TOKEN: &str = "unexpected token";
const ERR_UNMATCHED_BRACE: &str = "unmatched } brace";
const ERR_INVALID_FOR: &str = "invalid for statement";
const ERR_EXPECTED_SEMI_OR_NEWLINE: &str = "expected either ';' or newline token";
const ERR_RETURN_NOT_IN_FUNCTION: &str = "return not in a function";
const ERR_LABEL_NOT_FOUND: &str = "label not found";
const ERR_NO_BREAK_TARGET: &str = "no corresponding statement for the break";
const ERR_NO_CONTINUE_TARGET: &str = "no corresponding statement for the continue";
const ERR_DUPLICATE_LABEL: &str = "label is duplicated";
const ERR_DUPLICATE_DEFAULT: &str = "duplication of 'default' clause";
const ERR_WITH_IN_STRICT: &str = "'with' expression is not allowed in strict mode";
const ERR_EXPECTED_CATCH_OR_FINALLY: &str = "expected either 'catch' or 'finally' token";
const ERR_EXPECTED_WHILE: &str = "expected 'while' keyword";

impl<'a> Parser<'a> {
    // ---- token scanning helpers -----------------------------------------

    /// Skip a balanced brace block; the opening brace must be current and
    /// the matching closing brace is current on return.
    pub(super) fn skip_braces(&mut self, open: u8) -> Result<(), ParserError> {
        self.current_token_must_be(open)?;
        let close = match open {
            b'(' => b')',
            b'{' => b'}',
            _ => {
                debug_assert_eq!(open, b'[');
                b']'
            }
        };

        self.skip_newlines()?;
        while !self.token_is_char(close) && !self.token_is(TOK_EOF) {
            if self.token_is_char(b'(') || self.token_is_char(b'{') || self.token_is_char(b'[') {
                let inner = self.token().val() as u8;
                self.skip_braces(inner)?;
            }
            self.skip_newlines()?;
        }
        self.current_token_must_be(close)
    }

    /// Scan forward for a token before `end_pos`, optionally treating `{}`
    /// blocks as opaque. On a miss the current position is `end_pos`.
    fn find_next_token_before_the_pos(
        &mut self,
        token_to_find: i32,
        end_pos: SourcePos,
        skip_brace_blocks: bool,
    ) -> Result<bool, ParserError> {
        debug_assert!(token_to_find != TOK_NEWLINE && token_to_find != TOK_EOF);

        while self.token().pos() < end_pos {
            if skip_brace_blocks {
                if self.token_is_char(b'{') {
                    self.skip_braces(b'{')?;
                    self.skip_newlines()?;
                    if self.token().pos() >= end_pos {
                        self.lexer.seek(end_pos);
                        self.skip_token()?;
                        return Ok(false);
                    }
                } else if self.token_is_char(b'}') {
                    return Err(self.parser_error(ERR_UNMATCHED_BRACE));
                }
            }

            if self.token_is(token_to_find) {
                return Ok(true);
            }
            debug_assert!(!self.token_is(TOK_EOF));
            self.skip_newlines()?;
        }
        Ok(false)
    }

    // ---- variable declarations ------------------------------------------

    /* variable_declaration
      : Identifier LT!* ('=' LT!* assignment_expression)?
      ; */
    fn parse_variable_declaration(&mut self) -> Result<Operand, ParserError> {
        if !self.token_is(TOK_IDENT) {
            return Err(self.parser_error(ERR_EXPECTED_IDENTIFIER));
        }
        let lit = self.token().lit().expect("payload");
        let name = Operand::Lit(lit);

        if !self.cur_scope().variable_exists(lit) {
            self.early.check_for_eval_and_arguments(
                &self.lits,
                name,
                self.is_strict_mode(),
                self.token().pos(),
            )?;
            let id = self.cur_scope_id();
            self.tree.scope_mut(id).add_variable(lit, false);
        }

        self.skip_newlines()?;
        if self.token_is_char(b'=') {
            self.skip_newlines()?;
            let expr = self.parse_assignment_expression(true)?;
            let (dumper, scope) = self.emitter();
            dumper.dump_prop_setter_or_variable_assignment_res(scope, name, expr)?;
        } else {
            let current = self.token();
            self.lexer.save_token(current);
        }
        Ok(name)
    }

    fn parse_variable_declaration_list(&mut self) -> Result<(), ParserError> {
        loop {
            self.skip_newlines()?;
            self.parse_variable_declaration()?;
            self.skip_newlines()?;
            if !self.token_is_char(b',') {
                let current = self.token();
                self.lexer.save_token(current);
                return Ok(());
            }
        }
    }

    // ---- iteration statements -------------------------------------------

    /* Layout:       Initializer
     *               Jump -> ConditionCheck
     * NextIteration: Body
     * ContinueTarget: Increment
     * ConditionCheck: Condition; is_true_jmp_up -> NextIteration
     */
    fn parse_for_statement(
        &mut self,
        outermost_label: LabelId,
        body_pos: SourcePos,
    ) -> Result<(), ParserError> {
        self.current_token_must_be(b'(')?;
        self.skip_newlines()?;

        if self.token_is(TOK_VAR) {
            self.parse_variable_declaration_list()?;
            self.skip_token()?;
        } else if !self.token_is_char(b';') {
            self.parse_expression(false, false)?;
            self.skip_token()?;
        }

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_jump_to_end_for_rewrite(scope);
            dumper.set_next_iteration_target(scope);
        }

        self.current_token_must_be(b';')?;
        self.skip_token()?;
        let condition_pos = self.token().pos();

        if !self.find_next_token_before_the_pos(b';' as i32, body_pos, true)? {
            return Err(self.parser_error(ERR_INVALID_FOR));
        }
        self.current_token_must_be(b';')?;
        self.skip_token()?;
        let increment_pos = self.token().pos();

        self.lexer.seek(body_pos);
        self.skip_newlines()?;
        self.parse_statement(None)?;

        let loop_end_pos = self.token().pos();
        let continue_target = self.cur_scope().instrs_count();
        self.labels.setup_continue_target(outermost_label, continue_target);

        self.lexer.seek(increment_pos);
        self.skip_newlines()?;
        if !self.token_is_char(b')') {
            self.parse_expression(true, false)?;
        }
        self.current_token_must_be(b')')?;

        {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_jump_to_end(scope);
        }

        self.lexer.seek(condition_pos);
        self.skip_newlines()?;
        if self.token_is_char(b';') {
            let (dumper, scope) = self.emitter();
            dumper.dump_continue_iterations_check(scope, Operand::Empty);
        } else {
            let cond = self.parse_expression(true, false)?;
            let (dumper, scope) = self.emitter();
            dumper.dump_continue_iterations_check(scope, cond);
        }

        self.lexer.seek(loop_end_pos);
        self.skip_newlines()?;
        if !self.token_is_char(b'}') {
            let current = self.token();
            self.lexer.save_token(current);
        }
        Ok(())
    }

    /// Iterator clause of a for-in: returns the base/property pair for a
    /// member-expression target, or the bare identifier.
    fn parse_for_in_statement_iterator(
        &mut self,
    ) -> Result<(Operand, Operand), ParserError> {
        if self.token_is(TOK_VAR) {
            self.skip_newlines()?;
            let name = self.parse_variable_declaration()?;
            Ok((Operand::Empty, name))
        } else {
            let (expr, access) = self.parse_left_hand_side_expression()?;
            if access.base.is_empty() {
                Ok((Operand::Empty, expr))
            } else {
                Ok((access.base, access.prop))
            }
        }
    }

    /* Layout:        tmp <- Collection
     *                for_in instruction (tmp, distance to end mark)
     *                 iterator <- for-in property-name register
     *                 Body
     * ContinueTarget: meta end_for_in
     */
    fn parse_for_in_statement(
        &mut self,
        outermost_label: LabelId,
        body_pos: SourcePos,
    ) -> Result<(), ParserError> {
        self.labels.raise_nested_jumpable_border();

        self.current_token_must_be(b'(')?;
        self.skip_newlines()?;
        let iterator_pos = self.token().pos();

        if !self.find_next_token_before_the_pos(TOK_IN, body_pos, true)? {
            return Err(self.parser_error(ERR_INVALID_FOR));
        }
        self.skip_newlines()?;

        let collection = self.parse_expression(true, false)?;
        self.current_token_must_be(b')')?;
        self.skip_token()?;

        let for_in_oc = {
            let (dumper, scope) = self.emitter();
            dumper.dump_for_in_for_rewrite(scope, collection)
        };

        self.lexer.seek(iterator_pos);
        self.skip_token()?;
        let (base, identifier) = self.parse_for_in_statement_iterator()?;
        {
            let (dumper, scope) = self.emitter();
            if base.is_empty() {
                dumper.dump_variable_assignment(scope, identifier, for_in_prop_name_operand());
            } else {
                dumper.dump_prop_setter(scope, base, identifier, for_in_prop_name_operand());
            }
        }

        self.lexer.seek(body_pos);
        self.skip_token()?;
        self.parse_statement(None)?;

        let loop_end_pos = self.token().pos();
        let continue_target = self.cur_scope().instrs_count();
        self.labels.setup_continue_target(outermost_label, continue_target);

        {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_for_in(scope, for_in_oc);
            dumper.dump_for_in_end(scope);
        }

        self.lexer.seek(loop_end_pos);
        self.skip_token()?;
        if !self.token_is_char(b'}') {
            let current = self.token();
            self.lexer.save_token(current);
        }

        self.labels.remove_nested_jumpable_border();
        Ok(())
    }

    /// Distinguish plain-for from for-in by scanning the parenthesized head
    /// for a top-level `;`, then reparse from the opening paren.
    fn parse_for_or_for_in_statement(
        &mut self,
        outermost_label: LabelId,
    ) -> Result<(), ParserError> {
        self.token_after_newlines_must_be(b'(')?;
        let open_paren_pos = self.token().pos();

        self.skip_braces(b'(')?;
        self.skip_newlines()?;
        let body_pos = self.token().pos();

        self.lexer.seek(open_paren_pos);
        self.skip_token()?;
        let is_plain_for =
            self.find_next_token_before_the_pos(b';' as i32, body_pos, true)?;
        self.lexer.seek(open_paren_pos);
        self.skip_token()?;

        if is_plain_for {
            self.parse_for_statement(outermost_label, body_pos)
        } else {
            self.parse_for_in_statement(outermost_label, body_pos)
        }
    }

    fn parse_expression_inside_parens(&mut self) -> Result<Operand, ParserError> {
        self.token_after_newlines_must_be(b'(')?;
        self.skip_newlines()?;
        let res = self.parse_expression(true, false)?;
        self.token_after_newlines_must_be(b')')?;
        Ok(res)
    }

    fn parse_statement_list(&mut self) -> Result<(), ParserError> {
        loop {
            self.parse_statement(None)?;
            self.skip_newlines()?;
            while self.token_is_char(b';') {
                self.skip_newlines()?;
            }
            if self.token_is_char(b'}') {
                let current = self.token();
                self.lexer.save_token(current);
                return Ok(());
            }
            if self.token_is(TOK_CASE) || self.token_is(TOK_DEFAULT) {
                let current = self.token();
                self.lexer.save_token(current);
                return Ok(());
            }
        }
    }

    /* if_statement
      : 'if' '(' expression ')' statement ('else' statement)?
      ; */
    fn parse_if_statement(&mut self) -> Result<(), ParserError> {
        let cond = self.parse_expression_inside_parens()?;
        {
            let (dumper, scope) = self.emitter();
            dumper.dump_conditional_check_for_rewrite(scope, cond);
        }

        self.skip_newlines()?;
        self.parse_statement(None)?;

        self.skip_newlines()?;
        if self.token_is(TOK_ELSE) {
            {
                let (dumper, scope) = self.emitter();
                dumper.dump_jump_to_end_for_rewrite(scope);
                dumper.rewrite_conditional_check(scope);
            }
            self.skip_newlines()?;
            self.parse_statement(None)?;
            let (dumper, scope) = self.emitter();
            dumper.rewrite_jump_to_end(scope);
        } else {
            let current = self.token();
            self.lexer.save_token(current);
            let (dumper, scope) = self.emitter();
            dumper.rewrite_conditional_check(scope);
        }
        Ok(())
    }

    fn parse_do_while_statement(&mut self, outermost_label: LabelId) -> Result<(), ParserError> {
        {
            let (dumper, scope) = self.emitter();
            dumper.set_next_iteration_target(scope);
        }

        self.skip_newlines()?;
        self.parse_statement(None)?;

        let continue_target = self.cur_scope().instrs_count();
        self.labels.setup_continue_target(outermost_label, continue_target);

        self.skip_newlines()?;
        if !self.token_is(TOK_WHILE) {
            return Err(self.parser_error(ERR_EXPECTED_WHILE));
        }
        let cond = self.parse_expression_inside_parens()?;
        let (dumper, scope) = self.emitter();
        dumper.dump_continue_iterations_check(scope, cond);
        Ok(())
    }

    fn parse_while_statement(&mut self, outermost_label: LabelId) -> Result<(), ParserError> {
        self.token_after_newlines_must_be(b'(')?;
        let cond_pos = self.token().pos();
        self.skip_braces(b'(')?;

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_jump_to_end_for_rewrite(scope);
            dumper.set_next_iteration_target(scope);
        }

        self.skip_newlines()?;
        self.parse_statement(None)?;

        let continue_target = self.cur_scope().instrs_count();
        self.labels.setup_continue_target(outermost_label, continue_target);

        {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_jump_to_end(scope);
        }

        let end_pos = self.token().pos();
        self.lexer.seek(cond_pos);
        let cond = self.parse_expression_inside_parens()?;
        {
            let (dumper, scope) = self.emitter();
            dumper.dump_continue_iterations_check(scope, cond);
        }

        self.lexer.seek(end_pos);
        self.skip_token()?;
        Ok(())
    }

    /* with_statement
      : 'with' '(' expression ')' statement
      ; */
    fn parse_with_statement(&mut self) -> Result<(), ParserError> {
        if self.is_strict_mode() {
            return Err(self.parser_error(ERR_WITH_IN_STRICT));
        }
        let obj = self.parse_expression_inside_parens()?;

        self.mark_scope_flag(ScopeFlags::CONTAINS_WITH);
        self.labels.raise_nested_jumpable_border();

        let with_oc = {
            let (dumper, scope) = self.emitter();
            dumper.dump_with_for_rewrite(scope, obj)
        };
        self.skip_newlines()?;
        self.parse_statement(None)?;
        {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_with(scope, with_oc);
            dumper.dump_with_end(scope);
        }

        self.labels.remove_nested_jumpable_border();
        Ok(())
    }

    fn skip_case_clause_body(&mut self) -> Result<(), ParserError> {
        while !self.token_is(TOK_CASE)
            && !self.token_is(TOK_DEFAULT)
            && !self.token_is_char(b'}')
        {
            if self.token_is_char(b'{') {
                self.skip_braces(b'{')?;
            }
            self.skip_newlines()?;
        }
        Ok(())
    }

    /* switch_statement: the clause checks are dumped in a first scan, the
     * bodies are parsed in a second pass that seeks back to each clause. */
    fn parse_switch_statement(&mut self) -> Result<(), ParserError> {
        let switch_expr = {
            let expr = self.parse_expression_inside_parens()?;
            self.dump_assignment_of_lhs_if_literal(expr)?
        };
        self.token_after_newlines_must_be(b'{')?;

        self.dumper.start_dumping_case_clauses();
        let start_pos = self.token().pos();
        let mut was_default = false;
        let mut default_body_index = 0usize;
        let mut body_positions: Vec<SourcePos> = Vec::new();

        // First pass: dump the jump table.
        self.skip_newlines()?;
        while self.token_is(TOK_CASE) || self.token_is(TOK_DEFAULT) {
            if self.token_is(TOK_CASE) {
                self.skip_newlines()?;
                let case_expr = self.parse_expression(true, false)?;
                self.next_token_must_be(b':')?;
                {
                    let (dumper, scope) = self.emitter();
                    dumper.dump_case_clause_check_for_rewrite(scope, switch_expr, case_expr)?;
                }
                self.skip_newlines()?;
                body_positions.push(self.token().pos());
                self.skip_case_clause_body()?;
            } else {
                if was_default {
                    return Err(self.parser_error(ERR_DUPLICATE_DEFAULT));
                }
                was_default = true;
                self.token_after_newlines_must_be(b':')?;
                self.skip_newlines()?;
                default_body_index = body_positions.len();
                body_positions.push(self.token().pos());
                self.skip_case_clause_body()?;
            }
        }
        self.current_token_must_be(b'}')?;

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_default_clause_check_for_rewrite(scope);
        }

        self.lexer.seek(start_pos);
        self.next_token_must_be(b'{')?;

        let label = self.labels.push(LabelKind::UNNAMED_BREAKS, None);

        // Second pass: parse the bodies and point each check at its body.
        self.skip_newlines()?;
        for index in 0..body_positions.len() {
            self.lexer.seek(body_positions[index]);
            self.skip_newlines()?;
            if was_default && default_body_index == index {
                let (dumper, scope) = self.emitter();
                dumper.rewrite_default_clause(scope);
                if self.token_is(TOK_CASE) {
                    continue;
                }
            } else {
                {
                    let (dumper, scope) = self.emitter();
                    dumper.rewrite_case_clause(scope);
                }
                if self.token_is(TOK_CASE) || self.token_is(TOK_DEFAULT) {
                    continue;
                }
            }
            self.parse_statement_list()?;
            self.skip_newlines()?;
        }

        if !was_default {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_default_clause(scope);
        }
        self.current_token_must_be(b'}')?;

        self.rewrite_jumps_and_pop(label);
        self.dumper.finish_dumping_case_clauses();
        Ok(())
    }

    /* catch_clause
      : 'catch' '(' Identifier ')' '{' statement_list '}'
      ; */
    fn parse_catch_clause(&mut self) -> Result<(), ParserError> {
        self.token_after_newlines_must_be(b'(')?;
        self.skip_newlines()?;
        if !self.token_is(TOK_IDENT) {
            return Err(self.parser_error(ERR_EXPECTED_IDENTIFIER));
        }
        let exception = Operand::Lit(self.token().lit().expect("payload"));
        self.early.check_for_eval_and_arguments(
            &self.lits,
            exception,
            self.is_strict_mode(),
            self.token().pos(),
        )?;
        self.token_after_newlines_must_be(b')')?;

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_catch_for_rewrite(scope, exception);
        }

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;
        self.parse_statement_list()?;
        self.next_token_must_be(b'}')?;

        let (dumper, scope) = self.emitter();
        dumper.rewrite_catch(scope);
        Ok(())
    }

    fn parse_finally_clause(&mut self) -> Result<(), ParserError> {
        {
            let (dumper, scope) = self.emitter();
            dumper.dump_finally_for_rewrite(scope);
        }

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;
        self.parse_statement_list()?;
        self.next_token_must_be(b'}')?;

        let (dumper, scope) = self.emitter();
        dumper.rewrite_finally(scope);
        Ok(())
    }

    /* try_statement
      : 'try' '{' statement_list '}' (finally_clause | catch_clause finally_clause?)
      ; */
    fn parse_try_statement(&mut self) -> Result<(), ParserError> {
        self.mark_scope_flag(ScopeFlags::CONTAINS_TRY);
        self.labels.raise_nested_jumpable_border();

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_try_for_rewrite(scope);
        }

        self.token_after_newlines_must_be(b'{')?;
        self.skip_newlines()?;
        self.parse_statement_list()?;
        self.next_token_must_be(b'}')?;

        {
            let (dumper, scope) = self.emitter();
            dumper.rewrite_try(scope);
        }

        self.skip_newlines()?;
        if self.token_is(TOK_CATCH) {
            self.parse_catch_clause()?;
            self.skip_newlines()?;
            if self.token_is(TOK_FINALLY) {
                self.parse_finally_clause()?;
            } else {
                let current = self.token();
                self.lexer.save_token(current);
            }
        } else if self.token_is(TOK_FINALLY) {
            self.parse_finally_clause()?;
        } else {
            return Err(self.parser_error(ERR_EXPECTED_CATCH_OR_FINALLY));
        }

        {
            let (dumper, scope) = self.emitter();
            dumper.dump_end_try_catch_finally(scope);
        }

        self.labels.remove_nested_jumpable_border();
        Ok(())
    }

    fn insert_semicolon(&mut self) -> Result<(), ParserError> {
        self.skip_token()?;

        let is_new_line =
            self.token_is(TOK_NEWLINE) || self.lexer.prev_token_val() == TOK_NEWLINE;
        let is_close_brace_or_eof = self.token_is_char(b'}') || self.token_is(TOK_EOF);

        if is_new_line || is_close_brace_or_eof {
            let current = self.token();
            self.lexer.save_token(current);
        } else if !self.token_is_char(b';') && !self.token_is(TOK_EOF) {
            return Err(self.parser_error(ERR_EXPECTED_SEMI_OR_NEWLINE));
        }
        Ok(())
    }

    /// Resolve a popped label's pending jumps: breaks land here, continues
    /// land on the recorded continue target (or here when none was set).
    pub(super) fn rewrite_jumps_and_pop(&mut self, label_id: LabelId) {
        let here = self.cur_scope().instrs_count();
        let label = self.labels.pop(label_id);
        let continue_target = label.continue_target().unwrap_or(here);
        let id = self.cur_scope_id();
        let scope = self.tree.scope_mut(id);
        for &jump_oc in label.pending_breaks() {
            self.dumper.rewrite_simple_or_nested_jump(scope, jump_oc, here);
        }
        for &jump_oc in label.pending_continues() {
            self.dumper
                .rewrite_simple_or_nested_jump(scope, jump_oc, continue_target);
        }
    }

    fn parse_iterational_statement(
        &mut self,
        outermost_named_label: Option<LabelId>,
    ) -> Result<(), ParserError> {
        let label = self.labels.push(
            LabelKind::UNNAMED_BREAKS | LabelKind::UNNAMED_CONTINUES,
            None,
        );
        let outermost = outermost_named_label.unwrap_or(label);

        if self.token_is(TOK_DO) {
            self.parse_do_while_statement(outermost)?;
        } else if self.token_is(TOK_WHILE) {
            self.parse_while_statement(outermost)?;
        } else {
            debug_assert!(self.token_is(TOK_FOR));
            self.parse_for_or_for_in_statement(outermost)?;
        }

        self.rewrite_jumps_and_pop(label);
        Ok(())
    }

    fn parse_break_or_continue(&mut self) -> Result<(), ParserError> {
        let is_break = self.token_is(TOK_BREAK);
        let pos = self.token().pos();
        self.skip_token()?;

        let found = if self.token_is(TOK_IDENT) {
            let name = self.token().lit();
            self.labels
                .find(LabelKind::NAMED, name)
                .ok_or_else(|| ParserError::syntax(ERR_LABEL_NOT_FOUND, pos as usize))?
        } else if is_break {
            self.labels
                .find(LabelKind::UNNAMED_BREAKS, None)
                .ok_or_else(|| ParserError::syntax(ERR_NO_BREAK_TARGET, pos as usize))?
        } else {
            self.labels
                .find(LabelKind::UNNAMED_CONTINUES, None)
                .ok_or_else(|| ParserError::syntax(ERR_NO_CONTINUE_TARGET, pos as usize))?
        };
        let (label_id, is_simply_jumpable) = found;

        if self.token_is_char(b'}') {
            let current = self.token();
            self.lexer.save_token(current);
        }

        let jump_oc = {
            let (dumper, scope) = self.emitter();
            dumper.dump_simple_or_nested_jump_for_rewrite(scope, is_simply_jumpable)
        };
        self.labels.add_jump(label_id, jump_oc, is_break);
        Ok(())
    }

    fn parse_return_statement(&mut self) -> Result<(), ParserError> {
        if !self.inside_function {
            return Err(self.parser_error(ERR_RETURN_NOT_IN_FUNCTION));
        }

        self.skip_token()?;
        if !self.token_is_char(b';') && !self.token_is(TOK_NEWLINE) && !self.token_is_char(b'}') {
            let value = self.parse_expression(true, false)?;
            let (dumper, scope) = self.emitter();
            dumper.dump_retval(scope, value);
            self.insert_semicolon()
        } else {
            let (dumper, scope) = self.emitter();
            dumper.dump_ret(scope);
            if self.token_is_char(b'}') {
                let current = self.token();
                self.lexer.save_token(current);
            }
            Ok(())
        }
    }

    /* statement
      : block | variable_statement | empty_statement | if_statement
      | iteration_statement | continue_statement | break_statement
      | return_statement | with_statement | labelled_statement
      | switch_statement | throw_statement | try_statement
      | expression_statement
      ; */
    pub(super) fn parse_statement(
        &mut self,
        outermost_stmt_label: Option<LabelId>,
    ) -> Result<(), ParserError> {
        {
            let (dumper, scope) = self.emitter();
            dumper.new_statement(scope);
        }

        if self.token_is_char(b'}') {
            let current = self.token();
            self.lexer.save_token(current);
            return Ok(());
        }
        if self.token_is_char(b'{') {
            self.skip_newlines()?;
            if !self.token_is_char(b'}') {
                self.parse_statement_list()?;
                self.next_token_must_be(b'}')?;
            }
            return Ok(());
        }
        if self.token_is(TOK_VAR) {
            self.parse_variable_declaration_list()?;
            if self.token_is_char(b';') {
                self.skip_newlines()?;
            } else {
                self.insert_semicolon()?;
            }
            return Ok(());
        }
        if self.token_is(TOK_FUNCTION) {
            return self.parse_function_declaration();
        }
        if self.token_is_char(b';') {
            return Ok(());
        }
        if self.token_is(TOK_CASE) || self.token_is(TOK_DEFAULT) {
            return Ok(());
        }
        if self.token_is(TOK_IF) {
            return self.parse_if_statement();
        }
        if self.token_is(TOK_DO) || self.token_is(TOK_WHILE) || self.token_is(TOK_FOR) {
            return self.parse_iterational_statement(outermost_stmt_label);
        }
        if self.token_is(TOK_CONTINUE) || self.token_is(TOK_BREAK) {
            return self.parse_break_or_continue();
        }
        if self.token_is(TOK_RETURN) {
            return self.parse_return_statement();
        }
        if self.token_is(TOK_WITH) {
            return self.parse_with_statement();
        }
        if self.token_is(TOK_SWITCH) {
            return self.parse_switch_statement();
        }
        if self.token_is(TOK_THROW) {
            self.skip_token()?;
            let value = self.parse_expression(true, false)?;
            self.insert_semicolon()?;
            let (dumper, scope) = self.emitter();
            dumper.dump_throw(scope, value);
            return Ok(());
        }
        if self.token_is(TOK_TRY) {
            return self.parse_try_statement();
        }

        if self.token_is(TOK_IDENT) {
            let temp = self.token();
            self.skip_newlines()?;
            if self.token_is_char(b':') {
                self.skip_newlines()?;

                let name = temp.lit();
                if self.labels.find(LabelKind::NAMED, name).is_some() {
                    return Err(ParserError::syntax(
                        ERR_DUPLICATE_LABEL,
                        temp.pos() as usize,
                    ));
                }
                let label = self.labels.push(LabelKind::NAMED, name);
                self.parse_statement(Some(outermost_stmt_label.unwrap_or(label)))?;
                self.rewrite_jumps_and_pop(label);
            } else {
                let current = self.token();
                self.lexer.save_token(current);
                self.lexer.set_current(temp);
                let expr = self.parse_expression(true, true)?;
                self.dump_assignment_of_lhs_if_literal(expr)?;
                self.insert_semicolon()?;
            }
            return Ok(());
        }

        self.parse_expression(true, true)?;
        self.insert_semicolon()
    }

    fn parse_source_element(&mut self) -> Result<(), ParserError> {
        if self.token_is(TOK_FUNCTION) {
            self.parse_function_declaration()
        } else {
            self.parse_statement(None)
        }
    }

    /// Walk the leading string-literal statements; an escape-free
    /// "use strict" switches the scope and lexer to strict mode. The list
    /// is reparsed from its start afterwards.
    fn check_directive_prologue_for_use_strict(&mut self) -> Result<(), ParserError> {
        let start_pos = self.token().pos();

        while self.token_is(TOK_STRING) {
            if let TokenExtra::String { lit, has_escape } = self.token().extra() {
                if !has_escape && self.lits.str_equals(lit, b"use strict") {
                    let id = self.cur_scope_id();
                    self.tree.scope_mut(id).set_strict_mode(true);
                    self.lexer.set_strict_mode(true);
                    break;
                }
            }
            self.skip_newlines()?;
            if self.token_is_char(b';') {
                self.skip_newlines()?;
            }
        }

        if self.token().pos() != start_pos {
            self.lexer.seek(start_pos);
        } else {
            let current = self.token();
            self.lexer.save_token(current);
        }
        Ok(())
    }

    /* source_element_list
      : source_element (LT!* source_element)*
      ; */
    pub(super) fn parse_source_element_list(
        &mut self,
        is_global: bool,
        is_try_replace_local_vars_with_regs: bool,
    ) -> Result<(), ParserError> {
        self.dumper.new_scope();

        let mut scope_code_flags_oc = {
            let (dumper, scope) = self.emitter();
            dumper.dump_scope_code_flags_for_rewrite(scope)
        };

        self.check_directive_prologue_for_use_strict()?;

        let mut reg_var_decl_oc = {
            let (dumper, scope) = self.emitter();
            dumper.dump_reg_var_decl_for_rewrite(scope)
        };

        if self.inside_eval && !self.inside_function {
            let (dumper, scope) = self.emitter();
            dumper.dump_undefined_assignment(scope, eval_ret_operand());
        }

        self.skip_newlines()?;
        while !self.token_is(TOK_EOF) && !self.token_is_char(b'}') {
            self.parse_source_element()?;
            self.skip_newlines()?;
        }

        let at_end = if is_global {
            self.token_is(TOK_EOF)
        } else {
            self.token_is_char(b'}')
        };
        if !at_end {
            return Err(self.parser_error(ERR_UNEXPECTED_TOKEN));
        }
        let current = self.token();
        self.lexer.save_token(current);

        let scope_id = self.cur_scope_id();
        let mut scope_flags = ScopeCodeFlags::empty();
        {
            let scope = self.tree.scope(scope_id);
            if scope.strict_mode() {
                scope_flags |= ScopeCodeFlags::STRICT;
            }
            if !scope.flags().contains(ScopeFlags::REFS_ARGUMENTS) {
                scope_flags |= ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER;
            }
            if !scope.flags().contains(ScopeFlags::REFS_EVAL) {
                scope_flags |= ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER;
            }
        }

        if is_try_replace_local_vars_with_regs
            && self.tree.scope(scope_id).kind() == ScopeKind::Function
        {
            self.try_replace_local_vars_with_regs(
                &mut scope_flags,
                &mut scope_code_flags_oc,
                &mut reg_var_decl_oc,
            );
        }

        let (dumper, scope) = self.emitter();
        dumper.rewrite_scope_code_flags(scope, scope_code_flags_oc, scope_flags);
        dumper.rewrite_reg_var_decl(scope, reg_var_decl_oc);
        self.dumper.finish_scope();
        Ok(())
    }

    /// Local-variable-to-register promotion, run at function scope close.
    ///
    /// Applies only when no construct in the scope can observe variables
    /// through a lexical environment: no nested functions and no
    /// eval/arguments references, with, try, or delete.
    fn try_replace_local_vars_with_regs(
        &mut self,
        scope_flags: &mut ScopeCodeFlags,
        scope_code_flags_oc: &mut InstrCounter,
        reg_var_decl_oc: &mut InstrCounter,
    ) {
        let scope_id = self.cur_scope_id();
        let may_replace = !self.tree.scope(scope_id).flags().intersects(
            ScopeFlags::REFS_EVAL
                | ScopeFlags::REFS_ARGUMENTS
                | ScopeFlags::CONTAINS_WITH
                | ScopeFlags::CONTAINS_TRY
                | ScopeFlags::CONTAINS_DELETE
                | ScopeFlags::CONTAINS_FUNCTIONS,
        );
        if !may_replace {
            return;
        }
        debug_assert!(self.tree.scope(scope_id).children().is_empty());

        let header_oc: InstrCounter = 0;
        {
            let header = self.tree.scope(scope_id).op_meta(header_oc);
            let op = header.instr.opcode();
            debug_assert!(op == OP_FUNC_EXPR_N || op == OP_FUNC_DECL_N);
        }

        // The formal-parameter vargs sit between the header and the
        // function-end marker.
        let first_varg_oc: InstrCounter = 1;
        let mut function_end_oc = first_varg_oc;
        loop {
            let om = self.tree.scope(scope_id).op_meta(function_end_oc);
            match om.instr.meta_type() {
                Some(MetaType::FunctionEnd) => break,
                Some(MetaType::Varg) => function_end_oc += 1,
                other => {
                    debug_assert!(false, "unexpected prologue meta: {other:?}");
                    return;
                }
            }
        }

        self.dumper.start_move_of_vars_to_regs();
        let mut variable_pos = 0usize;
        loop {
            let scope = self.tree.scope_mut(scope_id);
            if variable_pos >= scope.variables().len() {
                break;
            }
            let var = scope.variables()[variable_pos];
            if !var.is_param {
                if self
                    .dumper
                    .try_replace_identifier_name_with_reg(scope, var.lit, false)
                {
                    scope.remove_local_variable(variable_pos);
                } else {
                    variable_pos += 1;
                }
            } else {
                variable_pos += 1;
            }
        }

        let args_num = self.tree.scope(scope_id).param_count() as u32;
        if !self.dumper.start_move_of_args_to_regs(args_num) {
            return;
        }

        *scope_flags |= ScopeCodeFlags::ARGUMENTS_ON_REGISTERS;
        debug_assert_eq!(self.tree.scope(scope_id).local_count(), 0);
        *scope_flags |= ScopeCodeFlags::NO_LEX_ENV;

        // Registers carry the arguments now; the header declares none.
        {
            let scope = self.tree.scope_mut(scope_id);
            let mut header = scope.op_meta(header_oc);
            match header.instr.opcode() {
                OP_FUNC_EXPR_N => header.instr.args[2] = 0,
                OP_FUNC_DECL_N => header.instr.args[1] = 0,
                other => unreachable!("not a function header: {other:?}"),
            }
            scope.set_op_meta(header_oc, header);
        }

        // A duplicated argument name keeps only its last declaration; the
        // earlier vargs are blanked so the later one wins.
        {
            let scope = self.tree.scope_mut(scope_id);
            for arg1_oc in first_varg_oc..function_end_oc {
                let om1 = scope.op_meta(arg1_oc);
                for arg2_oc in arg1_oc + 1..function_end_oc {
                    let om2 = scope.op_meta(arg2_oc);
                    if om1.lit_ids[1] == om2.lit_ids[1] {
                        let mut blanked = om1;
                        blanked.instr.args[1] = IDX_EMPTY;
                        blanked.lit_ids[1] = None;
                        scope.set_op_meta(arg1_oc, blanked);
                        break;
                    }
                }
            }
        }

        loop {
            let scope = self.tree.scope_mut(scope_id);
            let om = scope.op_meta(first_varg_oc);
            match om.instr.meta_type() {
                Some(MetaType::FunctionEnd) => break,
                Some(MetaType::Varg) => {
                    if om.instr.args[1] == IDX_EMPTY {
                        debug_assert!(om.lit_ids[1].is_none());
                        self.dumper.alloc_reg_for_unused_arg();
                    } else {
                        let name = om.lit_ids[1].expect("varg without a name literal");
                        let replaced = self
                            .dumper
                            .try_replace_identifier_name_with_reg(scope, name, true);
                        debug_assert!(replaced);
                    }
                    let scope = self.tree.scope_mut(scope_id);
                    scope.remove_op_meta(first_varg_oc);
                    *reg_var_decl_oc -= 1;
                    *scope_code_flags_oc -= 1;
                    self.dumper.decrement_function_end_pos();
                }
                other => unreachable!("unexpected prologue meta: {other:?}"),
            }
        }
    }
}
