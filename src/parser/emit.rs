//! Byte-code emitter ("dumper").
//!
//! Appends op-metas to the current scope's instruction buffer and patches
//! previously appended instructions once forward information (jump targets,
//! argument counts, register counts) becomes known. Owns the register
//! allocator and the per-construct fixup stacks.

use crate::cutils::split_counter;
use crate::lit::{LitId, LitTable, Literal};
use crate::opcode::{
    ArgType, CallSiteFlags, Instr, MetaType, OpCode, ScopeCodeFlags, SimpleValue, IDX_EMPTY,
    IDX_REWRITE_GENERAL, IDX_REWRITE_LITERAL, OP_ARRAY_DECL, OP_ASSIGNMENT, OP_CALL_N,
    OP_CONSTRUCT_N, OP_DELETE_PROP, OP_DELETE_VAR, OP_FOR_IN, OP_FUNC_DECL_N, OP_FUNC_EXPR_N,
    OP_IS_FALSE_JMP_DOWN, OP_IS_TRUE_JMP_DOWN, OP_IS_TRUE_JMP_UP, OP_JMP_BREAK_CONTINUE,
    OP_JMP_DOWN, OP_JMP_UP, OP_META, OP_OBJ_DECL, OP_PRE_DECR, OP_PRE_INCR, OP_PROP_GETTER,
    OP_PROP_SETTER, OP_REG_VAR_DECL, OP_RET, OP_RETVAL, OP_THROW_VALUE, OP_TRY_BLOCK, OP_WITH,
    REG_GENERAL_FIRST, REG_GENERAL_LAST, REG_SPECIAL_EVAL_RET,
    REG_SPECIAL_FOR_IN_PROPERTY_NAME, REG_SPECIAL_THIS_BINDING,
};

use super::error::ParserError;
use super::scopes::{InstrCounter, OpMeta, Scope};
use super::types::SourcePos;

const ERR_NOT_ENOUGH_REGISTERS: &str = "not enough registers";
const ERR_TOO_MANY_ARGS: &str = "no more than 255 formal parameters or arguments are supported";
const ERR_TOO_MANY_DECL_ITEMS: &str = "no more than 65535 literal elements are supported";
const ERR_INVALID_PREFIX_TARGET: &str = "invalid left-hand-side expression in prefix operation";
const ERR_INVALID_LHS: &str = "invalid left-hand-side expression";
const ERR_STRICT_DELETE: &str = "delete of an unqualified identifier in strict mode";

/// Value descriptor used between the parser and the emitter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Operand {
    Empty,
    /// Literal reference; materialized as a rewrite sentinel plus a lit-id.
    Lit(LitId),
    /// Byte-code register index.
    Reg(u8),
    /// Immediate byte constant.
    IdxConst(u8),
    /// Placeholder patched by a later rewrite.
    Unknown,
}

impl Operand {
    pub fn is_empty(self) -> bool {
        self == Operand::Empty
    }

    pub fn is_lit(self) -> bool {
        matches!(self, Operand::Lit(_))
    }

    pub fn is_reg(self) -> bool {
        matches!(self, Operand::Reg(_))
    }

    pub fn idx(self) -> u8 {
        match self {
            Operand::Empty => IDX_EMPTY,
            Operand::Lit(_) => IDX_REWRITE_LITERAL,
            Operand::Reg(reg) => reg,
            Operand::IdxConst(value) => value,
            Operand::Unknown => IDX_REWRITE_GENERAL,
        }
    }

    pub fn lit(self) -> Option<LitId> {
        match self {
            Operand::Lit(lit) => Some(lit),
            _ => None,
        }
    }
}

/// Rebuild an operand out of a stored raw arg byte and its lit-id slot.
fn operand_from_raw(raw: u8, lit: Option<LitId>) -> Operand {
    if raw == IDX_REWRITE_LITERAL {
        Operand::Lit(lit.expect("literal slot without lit-id"))
    } else {
        debug_assert!(lit.is_none());
        Operand::Reg(raw)
    }
}

fn gen_op_meta(op: OpCode, ops: &[Operand]) -> OpMeta {
    debug_assert!(ops.len() <= 3);
    let mut instr = Instr::new(op, [IDX_EMPTY; 3]);
    let mut lit_ids = [None; 3];
    for (slot, operand) in ops.iter().enumerate() {
        instr.args[slot] = operand.idx();
        lit_ids[slot] = operand.lit();
    }
    OpMeta { instr, lit_ids }
}

pub fn eval_ret_operand() -> Operand {
    Operand::Reg(REG_SPECIAL_EVAL_RET)
}

pub fn for_in_prop_name_operand() -> Operand {
    Operand::Reg(REG_SPECIAL_FOR_IN_PROPERTY_NAME)
}

pub fn this_operand() -> Operand {
    Operand::Reg(REG_SPECIAL_THIS_BINDING)
}

/// Kind of N-ary header whose argument count is patched later.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VargKind {
    FuncDecl,
    FuncExpr,
    ArrayDecl,
    ObjDecl,
    ConstructExpr,
    CallExpr,
}

#[derive(Debug, Default)]
pub struct Dumper {
    reg_next: u8,
    reg_max_for_temps: u8,
    reg_max_for_local_var: Option<u8>,
    reg_max_for_args: Option<u8>,
    reg_id_stack: Vec<u8>,
    statement_start: InstrCounter,
    statement_start_stack: Vec<InstrCounter>,

    varg_headers: Vec<InstrCounter>,
    function_ends: Vec<InstrCounter>,
    group_starts: Vec<u8>,
    logical_and_checks: Vec<InstrCounter>,
    logical_or_checks: Vec<InstrCounter>,
    conditional_checks: Vec<InstrCounter>,
    jumps_to_end: Vec<InstrCounter>,
    prop_getters: Vec<OpMeta>,
    next_iterations: Vec<InstrCounter>,
    case_clauses: Vec<InstrCounter>,
    case_cursors: Vec<u8>,
    tries: Vec<InstrCounter>,
    catches: Vec<InstrCounter>,
    finallies: Vec<InstrCounter>,
}

impl Dumper {
    pub fn new() -> Self {
        Self {
            reg_next: REG_GENERAL_FIRST,
            reg_max_for_temps: REG_GENERAL_FIRST,
            statement_start: InstrCounter::MAX,
            ..Self::default()
        }
    }

    // ---- register allocator -------------------------------------------

    fn alloc_temp(&mut self) -> Result<u8, ParserError> {
        debug_assert!(self.reg_max_for_local_var.is_none());
        debug_assert!(self.reg_max_for_args.is_none());

        let next_reg = self.reg_next;
        if next_reg > REG_GENERAL_LAST {
            return Err(ParserError::syntax(ERR_NOT_ENOUGH_REGISTERS, 0));
        }
        self.reg_next += 1;
        if self.reg_max_for_temps < next_reg {
            self.reg_max_for_temps = next_reg;
        }
        Ok(next_reg)
    }

    fn tmp_operand(&mut self) -> Result<Operand, ParserError> {
        Ok(Operand::Reg(self.alloc_temp()?))
    }

    fn is_temp_register(&self, reg: u8) -> bool {
        (REG_GENERAL_FIRST..=self.reg_max_for_temps).contains(&reg)
    }

    /// Temporaries do not survive across statements. The recorded position
    /// also gates the destination-rewrite peephole to the current statement.
    pub fn new_statement(&mut self, scope: &Scope) {
        self.reg_next = REG_GENERAL_FIRST;
        self.statement_start = scope.instrs_count();
    }

    pub fn new_scope(&mut self) {
        debug_assert!(self.reg_max_for_local_var.is_none());
        debug_assert!(self.reg_max_for_args.is_none());
        self.reg_id_stack.push(self.reg_next);
        self.reg_id_stack.push(self.reg_max_for_temps);
        self.statement_start_stack.push(self.statement_start);
        self.reg_next = REG_GENERAL_FIRST;
        self.reg_max_for_temps = REG_GENERAL_FIRST;
        self.statement_start = InstrCounter::MAX;
    }

    pub fn finish_scope(&mut self) {
        debug_assert!(self.reg_max_for_local_var.is_none());
        debug_assert!(self.reg_max_for_args.is_none());
        self.reg_max_for_temps = self.reg_id_stack.pop().expect("scope register save");
        self.reg_next = self.reg_id_stack.pop().expect("scope register save");
        self.statement_start = self
            .statement_start_stack
            .pop()
            .expect("scope statement save");
    }

    /// Registers used to evaluate one argument are reused for the next.
    pub fn start_varg_code_sequence(&mut self) {
        self.reg_id_stack.push(self.reg_next);
    }

    pub fn finish_varg_code_sequence(&mut self) {
        self.reg_next = self.reg_id_stack.pop().expect("varg register save");
    }

    // ---- low-level emission -------------------------------------------

    fn dump(&mut self, scope: &mut Scope, op: OpCode, ops: &[Operand]) {
        scope.push_op_meta(gen_op_meta(op, ops));
    }

    fn dump_single_address(&mut self, scope: &mut Scope, op: OpCode, operand: Operand) {
        self.dump(scope, op, &[operand]);
    }

    fn dump_double_address(&mut self, scope: &mut Scope, op: OpCode, res: Operand, obj: Operand) {
        self.dump(scope, op, &[res, obj]);
    }

    fn dump_triple_address(
        &mut self,
        scope: &mut Scope,
        op: OpCode,
        res: Operand,
        lhs: Operand,
        rhs: Operand,
    ) {
        self.dump(scope, op, &[res, lhs, rhs]);
    }

    fn last_dumped_op_meta(&self, scope: &Scope) -> OpMeta {
        scope.op_meta(scope.instrs_count() - 1)
    }

    fn get_diff_from(&self, scope: &Scope, oc: InstrCounter) -> InstrCounter {
        scope.instrs_count() - oc
    }

    // ---- literal-to-register assignments ------------------------------

    pub fn dump_array_hole_assignment_res(
        &mut self,
        scope: &mut Scope,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Simple.as_u8()),
            Operand::IdxConst(SimpleValue::ArrayHole.as_u8()),
        );
        Ok(res)
    }

    pub fn dump_boolean_assignment(&mut self, scope: &mut Scope, res: Operand, is_true: bool) {
        let value = if is_true {
            SimpleValue::True
        } else {
            SimpleValue::False
        };
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Simple.as_u8()),
            Operand::IdxConst(value.as_u8()),
        );
    }

    pub fn dump_boolean_assignment_res(
        &mut self,
        scope: &mut Scope,
        is_true: bool,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_boolean_assignment(scope, res, is_true);
        Ok(res)
    }

    pub fn dump_string_assignment(&mut self, scope: &mut Scope, res: Operand, lit: LitId) {
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::String.as_u8()),
            Operand::Lit(lit),
        );
    }

    pub fn dump_string_assignment_res(
        &mut self,
        scope: &mut Scope,
        lit: LitId,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_string_assignment(scope, res, lit);
        Ok(res)
    }

    pub fn dump_number_assignment(&mut self, scope: &mut Scope, res: Operand, lit: LitId) {
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Number.as_u8()),
            Operand::Lit(lit),
        );
    }

    pub fn dump_number_assignment_res(
        &mut self,
        scope: &mut Scope,
        lit: LitId,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_number_assignment(scope, res, lit);
        Ok(res)
    }

    pub fn dump_regexp_assignment_res(
        &mut self,
        scope: &mut Scope,
        lit: LitId,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Regexp.as_u8()),
            Operand::Lit(lit),
        );
        Ok(res)
    }

    pub fn dump_smallint_assignment_res(
        &mut self,
        scope: &mut Scope,
        value: u8,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::SmallInt.as_u8()),
            Operand::IdxConst(value),
        );
        Ok(res)
    }

    pub fn dump_undefined_assignment(&mut self, scope: &mut Scope, res: Operand) {
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Simple.as_u8()),
            Operand::IdxConst(SimpleValue::Undefined.as_u8()),
        );
    }

    pub fn dump_undefined_assignment_res(
        &mut self,
        scope: &mut Scope,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_undefined_assignment(scope, res);
        Ok(res)
    }

    pub fn dump_null_assignment_res(&mut self, scope: &mut Scope) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Simple.as_u8()),
            Operand::IdxConst(SimpleValue::Null.as_u8()),
        );
        Ok(res)
    }

    pub fn dump_variable_assignment(&mut self, scope: &mut Scope, res: Operand, var: Operand) {
        self.dump_triple_address(
            scope,
            OP_ASSIGNMENT,
            res,
            Operand::IdxConst(ArgType::Variable.as_u8()),
            var,
        );
    }

    pub fn dump_variable_assignment_res(
        &mut self,
        scope: &mut Scope,
        var: Operand,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_variable_assignment(scope, res, var);
        Ok(res)
    }

    // ---- varg headers --------------------------------------------------

    pub fn dump_varg_header_for_rewrite(
        &mut self,
        scope: &mut Scope,
        kind: VargKind,
        obj: Operand,
    ) {
        self.varg_headers.push(scope.instrs_count());
        match kind {
            VargKind::FuncExpr => {
                self.dump_triple_address(scope, OP_FUNC_EXPR_N, Operand::Unknown, obj, Operand::Unknown);
            }
            VargKind::ConstructExpr => {
                self.dump_triple_address(scope, OP_CONSTRUCT_N, Operand::Unknown, obj, Operand::Unknown);
            }
            VargKind::CallExpr => {
                self.dump_triple_address(scope, OP_CALL_N, Operand::Unknown, obj, Operand::Unknown);
            }
            VargKind::FuncDecl => {
                self.dump_double_address(scope, OP_FUNC_DECL_N, obj, Operand::Unknown);
            }
            VargKind::ArrayDecl => {
                self.dump_double_address(scope, OP_ARRAY_DECL, Operand::Unknown, Operand::Unknown);
            }
            VargKind::ObjDecl => {
                self.dump_double_address(scope, OP_OBJ_DECL, Operand::Unknown, Operand::Unknown);
            }
        }
    }

    pub fn rewrite_varg_header_set_args_count(
        &mut self,
        scope: &mut Scope,
        args_count: usize,
    ) -> Result<Operand, ParserError> {
        let header_oc = *self.varg_headers.last().expect("open varg header");
        let mut om = scope.op_meta(header_oc);
        let res = match om.instr.opcode() {
            OP_FUNC_EXPR_N | OP_CONSTRUCT_N | OP_CALL_N => {
                if args_count > 255 {
                    return Err(ParserError::syntax(ERR_TOO_MANY_ARGS, 0));
                }
                let res = self.tmp_operand()?;
                om.instr.args[2] = args_count as u8;
                om.instr.args[0] = res.idx();
                res
            }
            OP_FUNC_DECL_N => {
                if args_count > 255 {
                    return Err(ParserError::syntax(ERR_TOO_MANY_ARGS, 0));
                }
                om.instr.args[1] = args_count as u8;
                Operand::Empty
            }
            OP_ARRAY_DECL | OP_OBJ_DECL => {
                if args_count > 65535 {
                    return Err(ParserError::syntax(ERR_TOO_MANY_DECL_ITEMS, 0));
                }
                let res = self.tmp_operand()?;
                let (hi, lo) = split_counter(args_count as u16);
                om.instr.args[0] = res.idx();
                om.instr.args[1] = hi;
                om.instr.args[2] = lo;
                res
            }
            other => unreachable!("not a varg header: {other:?}"),
        };
        scope.set_op_meta(header_oc, om);
        self.varg_headers.pop();
        Ok(res)
    }

    pub fn dump_call_site_info(
        &mut self,
        scope: &mut Scope,
        flags: CallSiteFlags,
        this_arg: Operand,
    ) {
        if flags.contains(CallSiteFlags::HAVE_THIS_ARG) {
            debug_assert!(this_arg.is_reg());
        } else {
            debug_assert!(this_arg.is_empty());
        }
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::CallSiteInfo.as_u8()),
            Operand::IdxConst(flags.bits()),
            this_arg,
        );
    }

    pub fn dump_varg(&mut self, scope: &mut Scope, operand: Operand) {
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::Varg.as_u8()),
            operand,
            Operand::Empty,
        );
    }

    // ---- object literal properties ------------------------------------

    pub fn dump_prop_name_and_value(&mut self, scope: &mut Scope, name: Operand, value: Operand) {
        debug_assert!(name.is_lit());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::VargPropData.as_u8()),
            name,
            value,
        );
    }

    pub fn dump_prop_getter_decl(&mut self, scope: &mut Scope, name: Operand, func: Operand) {
        debug_assert!(name.is_lit());
        debug_assert!(func.is_reg());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::VargPropGetter.as_u8()),
            name,
            func,
        );
    }

    pub fn dump_prop_setter_decl(&mut self, scope: &mut Scope, name: Operand, func: Operand) {
        debug_assert!(name.is_lit());
        debug_assert!(func.is_reg());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::VargPropSetter.as_u8()),
            name,
            func,
        );
    }

    // ---- property access -----------------------------------------------

    pub fn dump_prop_getter_res(
        &mut self,
        scope: &mut Scope,
        obj: Operand,
        prop: Operand,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(scope, OP_PROP_GETTER, res, obj, prop);
        Ok(res)
    }

    pub fn dump_prop_setter(&mut self, scope: &mut Scope, obj: Operand, prop: Operand, val: Operand) {
        self.dump_triple_address(scope, OP_PROP_SETTER, obj, prop, val);
    }

    fn dump_prop_setter_op_meta(&mut self, scope: &mut Scope, getter: OpMeta, val: Operand) {
        debug_assert_eq!(getter.instr.opcode(), OP_PROP_GETTER);
        let obj = operand_from_raw(getter.instr.args[1], getter.lit_ids[1]);
        let prop = operand_from_raw(getter.instr.args[2], getter.lit_ids[2]);
        self.dump_prop_setter(scope, obj, prop, val);
    }

    // ---- function end marker -------------------------------------------

    pub fn dump_function_end_for_rewrite(&mut self, scope: &mut Scope) {
        self.function_ends.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::FunctionEnd.as_u8()),
            Operand::Unknown,
            Operand::Unknown,
        );
    }

    pub fn rewrite_function_end(&mut self, scope: &mut Scope, subscope_instrs: u32) {
        let marker_oc = *self.function_ends.last().expect("open function end");
        let oc = self.get_diff_from(scope, marker_oc) as u32 + subscope_instrs;
        let (id1, id2) = split_counter(oc as u16);

        let mut om = scope.op_meta(marker_oc);
        debug_assert_eq!(om.instr.meta_type(), Some(MetaType::FunctionEnd));
        debug_assert_eq!(om.instr.args[1], IDX_REWRITE_GENERAL);
        debug_assert_eq!(om.instr.args[2], IDX_REWRITE_GENERAL);
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(marker_oc, om);
        self.function_ends.pop();
    }

    /// Used when a formal-parameter `varg` before the marker is deleted.
    pub fn decrement_function_end_pos(&mut self) {
        let oc = self.function_ends.last_mut().expect("open function end");
        *oc -= 1;
    }

    // ---- unary and binary operations -----------------------------------

    pub fn dump_double_address_res(
        &mut self,
        scope: &mut Scope,
        op: OpCode,
        obj: Operand,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_double_address(scope, op, res, obj);
        Ok(res)
    }

    /// Pre-increment / pre-decrement with the reference-target check.
    pub fn dump_prefix_op_res(
        &mut self,
        scope: &mut Scope,
        op: OpCode,
        obj: Operand,
        pos: SourcePos,
    ) -> Result<Operand, ParserError> {
        debug_assert!(op == OP_PRE_INCR || op == OP_PRE_DECR);
        let last = self.last_dumped_op_meta(scope);
        if last.instr.opcode() != OP_PROP_GETTER && obj.is_reg() {
            return Err(ParserError::reference(ERR_INVALID_PREFIX_TARGET, pos as usize));
        }
        self.dump_double_address_res(scope, op, obj)
    }

    pub fn dump_triple_address_res(
        &mut self,
        scope: &mut Scope,
        op: OpCode,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(scope, op, res, lhs, rhs);
        Ok(res)
    }

    pub fn dump_delete_res(
        &mut self,
        scope: &mut Scope,
        lits: &LitTable,
        operand: Operand,
        is_strict: bool,
        pos: SourcePos,
    ) -> Result<Operand, ParserError> {
        let res = self.tmp_operand()?;
        match operand {
            Operand::Lit(lit) => match lits.get(lit) {
                Literal::String(_) => {
                    if is_strict {
                        return Err(ParserError::syntax(ERR_STRICT_DELETE, pos as usize));
                    }
                    self.dump_double_address(scope, OP_DELETE_VAR, res, operand);
                }
                Literal::Number(_) => {
                    self.dump_boolean_assignment(scope, res, true);
                }
            },
            _ => {
                debug_assert!(operand.is_reg());
                let last = self.last_dumped_op_meta(scope);
                if last.instr.opcode() == OP_PROP_GETTER {
                    scope.truncate(scope.instrs_count() - 1);
                    let obj = operand_from_raw(last.instr.args[1], last.lit_ids[1]);
                    let prop = operand_from_raw(last.instr.args[2], last.lit_ids[2]);
                    self.dump_triple_address(scope, OP_DELETE_PROP, res, obj, prop);
                } else {
                    self.dump_boolean_assignment(scope, res, true);
                }
            }
        }
        Ok(res)
    }

    // ---- logical chains, conditionals, plain forward jumps -------------

    pub fn start_dumping_logical_and_checks(&mut self) {
        self.group_starts.push(self.logical_and_checks.len() as u8);
    }

    pub fn dump_logical_and_check_for_rewrite(&mut self, scope: &mut Scope, operand: Operand) {
        self.logical_and_checks.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_IS_FALSE_JMP_DOWN,
            operand,
            Operand::Unknown,
            Operand::Unknown,
        );
    }

    pub fn rewrite_logical_and_checks(&mut self, scope: &mut Scope) {
        let start = self.group_starts.pop().expect("open logical-and group") as usize;
        for idx in start..self.logical_and_checks.len() {
            let jmp_oc = self.logical_and_checks[idx];
            let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
            let mut om = scope.op_meta(jmp_oc);
            debug_assert_eq!(om.instr.opcode(), OP_IS_FALSE_JMP_DOWN);
            om.instr.args[1] = id1;
            om.instr.args[2] = id2;
            scope.set_op_meta(jmp_oc, om);
        }
        self.logical_and_checks.truncate(start);
    }

    pub fn start_dumping_logical_or_checks(&mut self) {
        self.group_starts.push(self.logical_or_checks.len() as u8);
    }

    pub fn dump_logical_or_check_for_rewrite(&mut self, scope: &mut Scope, operand: Operand) {
        self.logical_or_checks.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_IS_TRUE_JMP_DOWN,
            operand,
            Operand::Unknown,
            Operand::Unknown,
        );
    }

    pub fn rewrite_logical_or_checks(&mut self, scope: &mut Scope) {
        let start = self.group_starts.pop().expect("open logical-or group") as usize;
        for idx in start..self.logical_or_checks.len() {
            let jmp_oc = self.logical_or_checks[idx];
            let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
            let mut om = scope.op_meta(jmp_oc);
            debug_assert_eq!(om.instr.opcode(), OP_IS_TRUE_JMP_DOWN);
            om.instr.args[1] = id1;
            om.instr.args[2] = id2;
            scope.set_op_meta(jmp_oc, om);
        }
        self.logical_or_checks.truncate(start);
    }

    pub fn dump_conditional_check_for_rewrite(&mut self, scope: &mut Scope, operand: Operand) {
        self.conditional_checks.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_IS_FALSE_JMP_DOWN,
            operand,
            Operand::Unknown,
            Operand::Unknown,
        );
    }

    pub fn rewrite_conditional_check(&mut self, scope: &mut Scope) {
        let jmp_oc = self.conditional_checks.pop().expect("open conditional check");
        let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
        let mut om = scope.op_meta(jmp_oc);
        debug_assert_eq!(om.instr.opcode(), OP_IS_FALSE_JMP_DOWN);
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(jmp_oc, om);
    }

    pub fn dump_jump_to_end_for_rewrite(&mut self, scope: &mut Scope) {
        self.jumps_to_end.push(scope.instrs_count());
        self.dump_double_address(scope, OP_JMP_DOWN, Operand::Unknown, Operand::Unknown);
    }

    pub fn rewrite_jump_to_end(&mut self, scope: &mut Scope) {
        let jmp_oc = self.jumps_to_end.pop().expect("open jump to end");
        let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
        let mut om = scope.op_meta(jmp_oc);
        debug_assert_eq!(om.instr.opcode(), OP_JMP_DOWN);
        om.instr.args[0] = id1;
        om.instr.args[1] = id2;
        scope.set_op_meta(jmp_oc, om);
    }

    // ---- assignment expressions ----------------------------------------

    /// Prepare the left-hand side: a register target must be the result of a
    /// just-emitted `prop_getter`, which is unlinked and stashed for the
    /// matching `prop_setter`; anything else in a register is an invalid
    /// assignment target.
    pub fn start_dumping_assignment_expression(
        &mut self,
        scope: &mut Scope,
        lhs: Operand,
        pos: SourcePos,
    ) -> Result<(), ParserError> {
        if !lhs.is_reg() {
            return Ok(());
        }
        let last = self.last_dumped_op_meta(scope);
        if last.instr.opcode() == OP_PROP_GETTER {
            scope.truncate(scope.instrs_count() - 1);
            self.prop_getters.push(last);
            Ok(())
        } else {
            Err(ParserError::reference(ERR_INVALID_LHS, pos as usize))
        }
    }

    pub fn dump_prop_setter_or_variable_assignment_res(
        &mut self,
        scope: &mut Scope,
        res: Operand,
        value: Operand,
    ) -> Result<Operand, ParserError> {
        if res.is_reg() {
            let getter = self.prop_getters.pop().expect("stashed prop getter");
            self.dump_prop_setter_op_meta(scope, getter, value);
            return Ok(value);
        }

        let mut last = self.last_dumped_op_meta(scope);
        let last_op = last.instr.opcode();
        if self.varg_headers.is_empty()
            && scope.instrs_count() > self.statement_start
            && (last_op == OP_ASSIGNMENT || last_op == crate::opcode::OP_ADDITION)
            && self.is_temp_register(last.instr.args[0])
        {
            last.instr.args[0] = res.idx();
            last.lit_ids[0] = res.lit();
            let oc = scope.instrs_count() - 1;
            scope.set_op_meta(oc, last);
            Ok(res)
        } else {
            self.dump_variable_assignment(scope, res, value);
            Ok(value)
        }
    }

    /// Compound assignment: through the stashed `prop_getter` when the
    /// target is a member expression, as a plain three-address op otherwise.
    pub fn dump_prop_setter_or_triple_address_res(
        &mut self,
        scope: &mut Scope,
        op: OpCode,
        res: Operand,
        value: Operand,
    ) -> Result<Operand, ParserError> {
        if res.is_reg() {
            let getter = self.prop_getters.pop().expect("stashed prop getter");
            debug_assert_eq!(getter.instr.opcode(), OP_PROP_GETTER);
            let obj = operand_from_raw(getter.instr.args[1], getter.lit_ids[1]);
            let prop = operand_from_raw(getter.instr.args[2], getter.lit_ids[2]);
            let tmp = self.dump_prop_getter_res(scope, obj, prop)?;
            self.dump_triple_address(scope, op, tmp, tmp, value);
            self.dump_prop_setter(scope, obj, prop, tmp);
            Ok(tmp)
        } else {
            self.dump_triple_address(scope, op, res, res, value);
            Ok(res)
        }
    }

    // ---- iteration targets ---------------------------------------------

    pub fn set_next_iteration_target(&mut self, scope: &Scope) {
        self.next_iterations.push(scope.instrs_count());
    }

    pub fn dump_continue_iterations_check(&mut self, scope: &mut Scope, cond: Operand) {
        let target = self.next_iterations.pop().expect("open iteration target");
        let diff = scope.instrs_count() - target;
        let (id1, id2) = split_counter(diff);
        if cond.is_empty() {
            self.dump_double_address(
                scope,
                OP_JMP_UP,
                Operand::IdxConst(id1),
                Operand::IdxConst(id2),
            );
        } else {
            self.dump_triple_address(
                scope,
                OP_IS_TRUE_JMP_UP,
                cond,
                Operand::IdxConst(id1),
                Operand::IdxConst(id2),
            );
        }
    }

    // ---- break/continue jumps ------------------------------------------

    /// Emit a `jmp_down` or `jmp_break_continue` template and return its
    /// position; the label manager records it for the pop-time rewrite.
    pub fn dump_simple_or_nested_jump_for_rewrite(
        &mut self,
        scope: &mut Scope,
        is_simple_jump: bool,
    ) -> InstrCounter {
        let oc = scope.instrs_count();
        let op = if is_simple_jump {
            OP_JMP_DOWN
        } else {
            OP_JMP_BREAK_CONTINUE
        };
        self.dump_double_address(scope, op, Operand::Unknown, Operand::Unknown);
        oc
    }

    pub fn rewrite_simple_or_nested_jump(
        &mut self,
        scope: &mut Scope,
        jump_oc: InstrCounter,
        target_oc: InstrCounter,
    ) {
        let mut om = scope.op_meta(jump_oc);
        let op = om.instr.opcode();
        debug_assert!(op == OP_JMP_DOWN || op == OP_JMP_BREAK_CONTINUE);
        let (id1, id2) = split_counter(target_oc - jump_oc);
        om.instr.args[0] = id1;
        om.instr.args[1] = id2;
        scope.set_op_meta(jump_oc, om);
    }

    // ---- switch case clauses -------------------------------------------

    pub fn start_dumping_case_clauses(&mut self) {
        self.case_cursors.push(self.case_clauses.len() as u8);
        self.group_starts.push(self.case_clauses.len() as u8);
    }

    pub fn dump_case_clause_check_for_rewrite(
        &mut self,
        scope: &mut Scope,
        switch_expr: Operand,
        case_expr: Operand,
    ) -> Result<(), ParserError> {
        let res = self.tmp_operand()?;
        self.dump_triple_address(
            scope,
            crate::opcode::OP_EQUAL_VALUE_TYPE,
            res,
            switch_expr,
            case_expr,
        );
        self.case_clauses.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_IS_TRUE_JMP_DOWN,
            res,
            Operand::Unknown,
            Operand::Unknown,
        );
        Ok(())
    }

    pub fn dump_default_clause_check_for_rewrite(&mut self, scope: &mut Scope) {
        self.case_clauses.push(scope.instrs_count());
        self.dump_double_address(scope, OP_JMP_DOWN, Operand::Unknown, Operand::Unknown);
    }

    pub fn rewrite_case_clause(&mut self, scope: &mut Scope) {
        let cursor = self.case_cursors.last_mut().expect("open case group");
        let jmp_oc = self.case_clauses[*cursor as usize];
        *cursor += 1;
        let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
        let mut om = scope.op_meta(jmp_oc);
        debug_assert_eq!(om.instr.opcode(), OP_IS_TRUE_JMP_DOWN);
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(jmp_oc, om);
    }

    pub fn rewrite_default_clause(&mut self, scope: &mut Scope) {
        let jmp_oc = *self.case_clauses.last().expect("open case group");
        let (id1, id2) = split_counter(self.get_diff_from(scope, jmp_oc));
        let mut om = scope.op_meta(jmp_oc);
        debug_assert_eq!(om.instr.opcode(), OP_JMP_DOWN);
        om.instr.args[0] = id1;
        om.instr.args[1] = id2;
        scope.set_op_meta(jmp_oc, om);
    }

    pub fn finish_dumping_case_clauses(&mut self) {
        let start = self.group_starts.pop().expect("open case group");
        self.case_clauses.truncate(start as usize);
        self.case_cursors.pop();
    }

    // ---- with / for-in blocks ------------------------------------------

    pub fn dump_with_for_rewrite(&mut self, scope: &mut Scope, obj: Operand) -> InstrCounter {
        let oc = scope.instrs_count();
        self.dump_triple_address(scope, OP_WITH, obj, Operand::Unknown, Operand::Unknown);
        oc
    }

    pub fn rewrite_with(&mut self, scope: &mut Scope, oc: InstrCounter) {
        let (id1, id2) = split_counter(self.get_diff_from(scope, oc));
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.opcode(), OP_WITH);
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_with_end(&mut self, scope: &mut Scope) {
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::EndWith.as_u8()),
            Operand::Empty,
            Operand::Empty,
        );
    }

    pub fn dump_for_in_for_rewrite(&mut self, scope: &mut Scope, collection: Operand) -> InstrCounter {
        let oc = scope.instrs_count();
        self.dump_triple_address(scope, OP_FOR_IN, collection, Operand::Unknown, Operand::Unknown);
        oc
    }

    pub fn rewrite_for_in(&mut self, scope: &mut Scope, oc: InstrCounter) {
        let (id1, id2) = split_counter(self.get_diff_from(scope, oc));
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.opcode(), OP_FOR_IN);
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_for_in_end(&mut self, scope: &mut Scope) {
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::EndForIn.as_u8()),
            Operand::Empty,
            Operand::Empty,
        );
    }

    // ---- try / catch / finally -----------------------------------------

    pub fn dump_try_for_rewrite(&mut self, scope: &mut Scope) {
        self.tries.push(scope.instrs_count());
        self.dump_double_address(scope, OP_TRY_BLOCK, Operand::Unknown, Operand::Unknown);
    }

    pub fn rewrite_try(&mut self, scope: &mut Scope) {
        let oc = self.tries.pop().expect("open try");
        let (id1, id2) = split_counter(self.get_diff_from(scope, oc));
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.opcode(), OP_TRY_BLOCK);
        om.instr.args[0] = id1;
        om.instr.args[1] = id2;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_catch_for_rewrite(&mut self, scope: &mut Scope, exception: Operand) {
        debug_assert!(exception.is_lit());
        self.catches.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::Catch.as_u8()),
            Operand::Unknown,
            Operand::Unknown,
        );
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::CatchExceptionIdentifier.as_u8()),
            exception,
            Operand::Empty,
        );
    }

    pub fn rewrite_catch(&mut self, scope: &mut Scope) {
        let oc = self.catches.pop().expect("open catch");
        let (id1, id2) = split_counter(self.get_diff_from(scope, oc));
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.meta_type(), Some(MetaType::Catch));
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_finally_for_rewrite(&mut self, scope: &mut Scope) {
        self.finallies.push(scope.instrs_count());
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::Finally.as_u8()),
            Operand::Unknown,
            Operand::Unknown,
        );
    }

    pub fn rewrite_finally(&mut self, scope: &mut Scope) {
        let oc = self.finallies.pop().expect("open finally");
        let (id1, id2) = split_counter(self.get_diff_from(scope, oc));
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.meta_type(), Some(MetaType::Finally));
        om.instr.args[1] = id1;
        om.instr.args[2] = id2;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_end_try_catch_finally(&mut self, scope: &mut Scope) {
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::EndTryCatchFinally.as_u8()),
            Operand::Empty,
            Operand::Empty,
        );
    }

    pub fn dump_throw(&mut self, scope: &mut Scope, value: Operand) {
        self.dump_single_address(scope, OP_THROW_VALUE, value);
    }

    // ---- scope prologue templates --------------------------------------

    pub fn dump_scope_code_flags_for_rewrite(&mut self, scope: &mut Scope) -> InstrCounter {
        let oc = scope.instrs_count();
        self.dump_triple_address(
            scope,
            OP_META,
            Operand::IdxConst(MetaType::ScopeCodeFlags.as_u8()),
            Operand::Unknown,
            Operand::Empty,
        );
        oc
    }

    pub fn rewrite_scope_code_flags(
        &mut self,
        scope: &mut Scope,
        oc: InstrCounter,
        flags: ScopeCodeFlags,
    ) {
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.meta_type(), Some(MetaType::ScopeCodeFlags));
        debug_assert_eq!(om.instr.args[1], IDX_REWRITE_GENERAL);
        om.instr.args[1] = flags.bits();
        scope.set_op_meta(oc, om);
    }

    pub fn dump_reg_var_decl_for_rewrite(&mut self, scope: &mut Scope) -> InstrCounter {
        let oc = scope.instrs_count();
        self.dump_triple_address(
            scope,
            OP_REG_VAR_DECL,
            Operand::Unknown,
            Operand::Unknown,
            Operand::Unknown,
        );
        oc
    }

    /// Write the three register-region sizes and close the tier state.
    pub fn rewrite_reg_var_decl(&mut self, scope: &mut Scope, oc: InstrCounter) {
        let mut om = scope.op_meta(oc);
        debug_assert_eq!(om.instr.opcode(), OP_REG_VAR_DECL);

        let tmp_regs = self.reg_max_for_temps - REG_GENERAL_FIRST + 1;
        let local_var_regs = match self.reg_max_for_local_var {
            Some(local_max) => {
                debug_assert!(local_max >= self.reg_max_for_temps);
                local_max - self.reg_max_for_temps
            }
            None => 0,
        };
        let arg_regs = match self.reg_max_for_args {
            Some(args_max) => match self.reg_max_for_local_var {
                Some(local_max) => {
                    debug_assert!(args_max >= local_max);
                    args_max - local_max
                }
                None => {
                    debug_assert!(args_max >= self.reg_max_for_temps);
                    args_max - self.reg_max_for_temps
                }
            },
            None => 0,
        };
        self.reg_max_for_local_var = None;
        self.reg_max_for_args = None;

        om.instr.args[0] = tmp_regs;
        om.instr.args[1] = local_var_regs;
        om.instr.args[2] = arg_regs;
        scope.set_op_meta(oc, om);
    }

    pub fn dump_ret(&mut self, scope: &mut Scope) {
        self.dump(scope, OP_RET, &[]);
    }

    pub fn dump_retval(&mut self, scope: &mut Scope, value: Operand) {
        self.dump_single_address(scope, OP_RETVAL, value);
    }

    // ---- local-variable promotion --------------------------------------

    pub fn start_move_of_vars_to_regs(&mut self) {
        debug_assert!(self.reg_max_for_local_var.is_none());
        debug_assert!(self.reg_max_for_args.is_none());
        self.reg_max_for_local_var = Some(self.reg_max_for_temps);
    }

    /// Reserve contiguous argument registers above the local-variable
    /// region; false when they do not fit.
    pub fn start_move_of_args_to_regs(&mut self, args_num: u32) -> bool {
        debug_assert!(self.reg_max_for_args.is_none());
        let base = match self.reg_max_for_local_var {
            Some(local_max) => local_max,
            None => self.reg_max_for_temps,
        };
        if args_num + base as u32 >= REG_GENERAL_LAST as u32 {
            return false;
        }
        self.reg_max_for_args = Some(base);
        true
    }

    /// Allocate the next promotion register and patch every reference to
    /// the named variable inside the scope. Returns false when no register
    /// is left for a local variable.
    pub fn try_replace_identifier_name_with_reg(
        &mut self,
        scope: &mut Scope,
        name: LitId,
        is_arg: bool,
    ) -> bool {
        let reg = if is_arg {
            let args_max = self.reg_max_for_args.expect("arg promotion not started");
            debug_assert!(args_max < REG_GENERAL_LAST);
            let reg = args_max + 1;
            self.reg_max_for_args = Some(reg);
            reg
        } else {
            let local_max = self.reg_max_for_local_var.expect("var promotion not started");
            if local_max == REG_GENERAL_LAST {
                return false;
            }
            let reg = local_max + 1;
            self.reg_max_for_local_var = Some(reg);
            reg
        };

        for instr_pos in 0..scope.instrs_count() {
            let mut om = scope.op_meta(instr_pos);
            let op = om.instr.opcode();
            let meta_type = om.instr.meta_type();
            let mut changed = false;
            for arg_index in 0..3usize {
                if op == OP_ASSIGNMENT
                    && arg_index == 1
                    && om.instr.args[1] != ArgType::Variable.as_u8()
                {
                    break;
                }
                if matches!(
                    meta_type,
                    Some(MetaType::VargPropData)
                        | Some(MetaType::VargPropGetter)
                        | Some(MetaType::VargPropSetter)
                ) && arg_index == 1
                {
                    continue;
                }
                if om.lit_ids[arg_index] == Some(name) {
                    debug_assert_eq!(om.instr.args[arg_index], IDX_REWRITE_LITERAL);
                    om.lit_ids[arg_index] = None;
                    om.instr.args[arg_index] = reg;
                    changed = true;
                }
            }
            if changed {
                scope.set_op_meta(instr_pos, om);
            }
        }
        true
    }

    /// A duplicated argument name still occupies its register slot.
    pub fn alloc_reg_for_unused_arg(&mut self) {
        let args_max = self.reg_max_for_args.expect("arg promotion not started");
        debug_assert!(args_max < REG_GENERAL_LAST);
        self.reg_max_for_args = Some(args_max + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutils::join_counter;
    use crate::lit::LitTable;
    use crate::parser::scopes::{ScopeKind, ScopeTree};

    fn new_scope() -> (ScopeTree, crate::parser::scopes::ScopeId) {
        let mut tree = ScopeTree::new();
        let id = tree.open(ScopeKind::Function, None);
        (tree, id)
    }

    #[test]
    fn temp_registers_reset_per_statement() {
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        let a = dumper.dump_undefined_assignment_res(scope).unwrap();
        let b = dumper.dump_undefined_assignment_res(scope).unwrap();
        assert_eq!(a, Operand::Reg(0));
        assert_eq!(b, Operand::Reg(1));
        dumper.new_statement(scope);
        let c = dumper.dump_undefined_assignment_res(scope).unwrap();
        assert_eq!(c, Operand::Reg(0));
        assert_eq!(dumper.reg_max_for_temps, 1);
    }

    #[test]
    fn varg_code_sequences_reuse_registers() {
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        dumper.start_varg_code_sequence();
        let first = dumper.dump_undefined_assignment_res(scope).unwrap();
        dumper.finish_varg_code_sequence();
        dumper.start_varg_code_sequence();
        let second = dumper.dump_undefined_assignment_res(scope).unwrap();
        dumper.finish_varg_code_sequence();
        assert_eq!(first, second);
    }

    #[test]
    fn call_header_rewrite_sets_count_and_result() {
        let mut lits = LitTable::new();
        let callee = lits.intern_string(b"f");
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        dumper.dump_varg_header_for_rewrite(scope, VargKind::CallExpr, Operand::Lit(callee));
        dumper.dump_varg(scope, Operand::Reg(1));
        let res = dumper
            .rewrite_varg_header_set_args_count(scope, 1)
            .unwrap();
        let header = scope.op_meta(0);
        assert_eq!(header.instr.opcode(), OP_CALL_N);
        assert_eq!(header.instr.args[0], res.idx());
        assert_eq!(header.instr.args[2], 1);
        assert_eq!(header.lit_ids[1], Some(callee));
    }

    #[test]
    fn obj_decl_header_splits_large_counts() {
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        dumper.dump_varg_header_for_rewrite(scope, VargKind::ObjDecl, Operand::Empty);
        let res = dumper
            .rewrite_varg_header_set_args_count(scope, 0x0203)
            .unwrap();
        let header = scope.op_meta(0);
        assert_eq!(header.instr.args[0], res.idx());
        assert_eq!(header.instr.args[1], 0x02);
        assert_eq!(header.instr.args[2], 0x03);
    }

    #[test]
    fn logical_and_chain_lands_on_one_point() {
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        let tmp = dumper.dump_boolean_assignment_res(scope, true).unwrap();
        dumper.start_dumping_logical_and_checks();
        dumper.dump_logical_and_check_for_rewrite(scope, tmp);
        dumper.dump_boolean_assignment(scope, tmp, false);
        dumper.dump_logical_and_check_for_rewrite(scope, tmp);
        dumper.dump_boolean_assignment(scope, tmp, true);
        dumper.rewrite_logical_and_checks(scope);

        let first = scope.op_meta(1);
        let second = scope.op_meta(3);
        assert_eq!(join_counter(first.instr.args[1], first.instr.args[2]), 4);
        assert_eq!(join_counter(second.instr.args[1], second.instr.args[2]), 2);
    }

    #[test]
    fn peephole_rewrites_assignment_destination() {
        let mut lits = LitTable::new();
        let x = lits.intern_string(b"x");
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        dumper.new_statement(scope);
        // x = 1  =>  the temp assignment retargets to x directly.
        let value = dumper.dump_smallint_assignment_res(scope, 1).unwrap();
        let out = dumper
            .dump_prop_setter_or_variable_assignment_res(scope, Operand::Lit(x), value)
            .unwrap();
        assert_eq!(out, Operand::Lit(x));
        assert_eq!(scope.instrs_count(), 1);
        let om = scope.op_meta(0);
        assert_eq!(om.instr.args[0], IDX_REWRITE_LITERAL);
        assert_eq!(om.lit_ids[0], Some(x));
    }

    #[test]
    fn prop_setter_resolution_consumes_stashed_getter() {
        let mut lits = LitTable::new();
        let obj = lits.intern_string(b"a");
        let prop = lits.intern_string(b"b");
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);

        let getter_res = dumper
            .dump_prop_getter_res(scope, Operand::Lit(obj), Operand::Lit(prop))
            .unwrap();
        dumper
            .start_dumping_assignment_expression(scope, getter_res, 0)
            .unwrap();
        assert_eq!(scope.instrs_count(), 0);
        let value = dumper.dump_smallint_assignment_res(scope, 7).unwrap();
        let out = dumper
            .dump_prop_setter_or_variable_assignment_res(scope, getter_res, value)
            .unwrap();
        assert_eq!(out, value);
        let setter = scope.op_meta(scope.instrs_count() - 1);
        assert_eq!(setter.instr.opcode(), OP_PROP_SETTER);
        assert_eq!(setter.lit_ids[0], Some(obj));
        assert_eq!(setter.lit_ids[1], Some(prop));
    }

    #[test]
    fn invalid_assignment_target_is_a_reference_error() {
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);
        let tmp = dumper.dump_boolean_assignment_res(scope, true).unwrap();
        let err = dumper
            .start_dumping_assignment_expression(scope, tmp, 5)
            .unwrap_err();
        assert_eq!(err.class(), crate::parser::error::ErrorClass::Reference);
    }

    #[test]
    fn reg_var_decl_reports_three_regions() {
        let mut lits = LitTable::new();
        let v = lits.intern_string(b"v");
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);

        let oc = dumper.dump_reg_var_decl_for_rewrite(scope);
        let _ = dumper.dump_undefined_assignment_res(scope).unwrap();
        let _ = dumper
            .dump_variable_assignment_res(scope, Operand::Lit(v))
            .unwrap();
        dumper.start_move_of_vars_to_regs();
        assert!(dumper.try_replace_identifier_name_with_reg(scope, v, false));
        assert!(dumper.start_move_of_args_to_regs(2));
        dumper.alloc_reg_for_unused_arg();
        dumper.alloc_reg_for_unused_arg();
        dumper.rewrite_reg_var_decl(scope, oc);

        let om = scope.op_meta(oc);
        assert_eq!(om.instr.args[0], 2);
        assert_eq!(om.instr.args[1], 1);
        assert_eq!(om.instr.args[2], 2);
    }

    #[test]
    fn promotion_patches_literal_references() {
        let mut lits = LitTable::new();
        let v = lits.intern_string(b"v");
        let w = lits.intern_string(b"w");
        let mut dumper = Dumper::new();
        let (mut tree, id) = new_scope();
        let scope = tree.scope_mut(id);

        let _ = dumper
            .dump_variable_assignment_res(scope, Operand::Lit(v))
            .unwrap();
        dumper.dump_string_assignment(scope, Operand::Lit(v), w);

        dumper.start_move_of_vars_to_regs();
        assert!(dumper.try_replace_identifier_name_with_reg(scope, v, false));

        let first = scope.op_meta(0);
        assert_eq!(first.lit_ids[2], None);
        assert_eq!(first.instr.args[2], 1);
        let second = scope.op_meta(1);
        // The string payload is not a variable reference; only the
        // destination slot is patched.
        assert_eq!(second.instr.args[0], 1);
        assert_eq!(second.lit_ids[2], Some(w));
    }
}
