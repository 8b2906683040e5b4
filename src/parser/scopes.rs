//! Lexical scope tree.
//!
//! Scopes are arena-allocated and addressed by [`ScopeId`]. Each scope owns
//! its op-meta instruction buffer and an ordered variable list in which
//! parameters precede locals. The serializer linearizes the tree depth-first
//! into the final instruction array.

use bitflags::bitflags;

use crate::bytecode::LitMap;
use crate::lit::LitId;
use crate::opcode::{
    ArgType, Instr, MetaType, OpCode, IDX_EMPTY, IDX_REWRITE_GENERAL, IDX_REWRITE_LITERAL,
    OPCODES, OP_META, OP_REG_VAR_DECL, OP_VAR_DECL,
};

/// Position of an instruction inside a scope (or the merged image).
pub type InstrCounter = u16;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Instruction plus the literal references its argument slots stand for.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpMeta {
    pub instr: Instr,
    pub lit_ids: [Option<LitId>; 3],
}

impl OpMeta {
    pub fn plain(instr: Instr) -> Self {
        Self {
            instr,
            lit_ids: [None; 3],
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScopeKind {
    Global,
    Eval,
    Function,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScopeFlags: u8 {
        const REFS_ARGUMENTS = 1 << 0;
        const REFS_EVAL = 1 << 1;
        const CONTAINS_WITH = 1 << 2;
        const CONTAINS_TRY = 1 << 3;
        const CONTAINS_DELETE = 1 << 4;
        const CONTAINS_FUNCTIONS = 1 << 5;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeVar {
    pub lit: LitId,
    pub is_param: bool,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    strict_mode: bool,
    flags: ScopeFlags,
    variables: Vec<ScopeVar>,
    param_count: u16,
    local_count: u16,
    instrs: Vec<OpMeta>,
    children: Vec<ScopeId>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            strict_mode: false,
            flags: ScopeFlags::empty(),
            variables: Vec::new(),
            param_count: 0,
            local_count: 0,
            instrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    pub fn set_strict_mode(&mut self, strict_mode: bool) {
        self.strict_mode = strict_mode;
    }

    pub fn flags(&self) -> ScopeFlags {
        self.flags
    }

    pub fn mark_flag(&mut self, flag: ScopeFlags) {
        self.flags |= flag;
    }

    pub fn instrs_count(&self) -> InstrCounter {
        self.instrs.len() as InstrCounter
    }

    pub fn push_op_meta(&mut self, om: OpMeta) {
        self.instrs.push(om);
    }

    pub fn op_meta(&self, oc: InstrCounter) -> OpMeta {
        self.instrs[oc as usize]
    }

    pub fn set_op_meta(&mut self, oc: InstrCounter, om: OpMeta) {
        self.instrs[oc as usize] = om;
    }

    pub fn remove_op_meta(&mut self, oc: InstrCounter) {
        self.instrs.remove(oc as usize);
    }

    /// Drop instructions from position `oc` onward.
    pub fn truncate(&mut self, oc: InstrCounter) {
        self.instrs.truncate(oc as usize);
    }

    pub fn variables(&self) -> &[ScopeVar] {
        &self.variables
    }

    pub fn param_count(&self) -> u16 {
        self.param_count
    }

    pub fn local_count(&self) -> u16 {
        self.local_count
    }

    pub fn variable_exists(&self, lit: LitId) -> bool {
        self.variables.iter().any(|var| var.lit == lit)
    }

    /// Register a declared variable. Duplicate locals are ignored; duplicate
    /// parameters are kept (the later declaration wins at runtime). All
    /// parameters precede locals in declaration order.
    pub fn add_variable(&mut self, lit: LitId, is_param: bool) {
        for var in &self.variables {
            if var.lit == lit {
                if !is_param {
                    return;
                }
                if var.is_param {
                    break;
                }
                debug_assert!(false, "parameters must precede locals");
            }
        }
        self.variables.push(ScopeVar { lit, is_param });
        if is_param {
            self.param_count += 1;
        } else {
            self.local_count += 1;
        }
    }

    /// Drop a non-parameter variable whose references were all promoted.
    pub fn remove_local_variable(&mut self, pos: usize) {
        debug_assert!(!self.variables[pos].is_param);
        self.variables.remove(pos);
        self.local_count -= 1;
    }

    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope; a parent link makes it that scope's next child.
    pub fn open(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(kind));
        if let Some(parent) = parent {
            self.scopes[parent.index()].children.push(id);
        }
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Serialized size of the scope's subtree, var-decls included.
    pub fn count_instructions(&self, id: ScopeId) -> u32 {
        let scope = self.scope(id);
        let mut total = scope.instrs.len() as u32 + scope.local_count as u32;
        for &child in &scope.children {
            total += self.count_instructions(child);
        }
        total
    }

    /// Serialized size of all subscopes of `id` parsed so far.
    pub fn count_subscope_instructions(&self, id: ScopeId) -> u32 {
        self.scope(id)
            .children
            .iter()
            .map(|&child| self.count_instructions(child))
            .sum()
    }

    /// Linearize the tree into one instruction array plus a literal map.
    ///
    /// Per scope the layout is: header instructions (everything up to and
    /// including the prologue metas and `reg_var_decl`), generated
    /// `var_decl`s for non-parameter variables, child scopes depth-first,
    /// then the remaining computational code.
    pub fn serialize_all(&self, root: ScopeId) -> (Vec<Instr>, LitMap) {
        let mut instrs = Vec::with_capacity(self.count_instructions(root) as usize);
        let mut lit_map = LitMap::new();
        self.merge_scope(root, &mut instrs, &mut lit_map);
        (instrs, lit_map)
    }

    fn merge_scope(&self, id: ScopeId, out: &mut Vec<Instr>, lit_map: &mut LitMap) {
        let scope = self.scope(id);

        let mut instr_pos = 0usize;
        let mut header = true;
        while instr_pos < scope.instrs.len() {
            let om = &scope.instrs[instr_pos];
            let op = om.instr.opcode();
            if op != OP_VAR_DECL && op != OP_META && !header {
                break;
            }
            if op == OP_REG_VAR_DECL {
                header = false;
            }
            emit_merged(om, out, lit_map);
            instr_pos += 1;
        }

        for var in &scope.variables {
            if !var.is_param {
                let om = build_variable_op_meta(var.lit);
                emit_merged(&om, out, lit_map);
            }
        }

        for &child in &scope.children {
            self.merge_scope(child, out, lit_map);
        }

        for om in &scope.instrs[instr_pos..] {
            emit_merged(om, out, lit_map);
        }
    }
}

pub fn build_variable_op_meta(lit: LitId) -> OpMeta {
    OpMeta {
        instr: Instr::new(OP_VAR_DECL, [IDX_REWRITE_LITERAL, IDX_EMPTY, IDX_EMPTY]),
        lit_ids: [Some(lit), None, None],
    }
}

/// Which argument slots of the instruction may carry a literal reference.
fn literal_arg_mask(om: &OpMeta) -> u8 {
    let op = om.instr.opcode();
    if op == OpCode::OP_ASSIGNMENT {
        // Simple and small-int payloads are immediate bytes; every other
        // type tag may reference the literal table through arg2.
        if om.instr.args[1] == ArgType::Simple.as_u8()
            || om.instr.args[1] == ArgType::SmallInt.as_u8()
        {
            return 0b100;
        }
        return 0b101;
    }
    if op == OP_META {
        return match om.instr.meta_type() {
            Some(MetaType::VargPropData)
            | Some(MetaType::VargPropGetter)
            | Some(MetaType::VargPropSetter) => 0b011,
            Some(MetaType::Varg) | Some(MetaType::CatchExceptionIdentifier) => 0b010,
            _ => 0b000,
        };
    }
    OPCODES[op.as_usize()].lit_mask
}

fn emit_merged(om: &OpMeta, out: &mut Vec<Instr>, lit_map: &mut LitMap) {
    let offset = out.len() as InstrCounter;
    let mask = literal_arg_mask(om);
    for slot in 0..3u8 {
        let raw = om.instr.args[slot as usize];
        debug_assert!(
            raw != IDX_REWRITE_GENERAL,
            "unresolved rewrite slot reached serialization"
        );
        if raw == IDX_REWRITE_LITERAL && (mask & (0b100 >> slot)) != 0 {
            let lit = om.lit_ids[slot as usize].expect("literal slot without lit-id");
            lit_map.insert(offset, slot, lit);
        } else {
            debug_assert!(
                om.lit_ids[slot as usize].is_none() || raw != IDX_REWRITE_LITERAL,
                "literal outside a literal-capable slot"
            );
        }
    }
    out.push(om.instr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lit::LitTable;
    use crate::opcode::{OP_ASSIGNMENT, OP_RET};

    fn assignment_meta(dst: u8, lit: LitId) -> OpMeta {
        OpMeta {
            instr: Instr::new(
                OP_ASSIGNMENT,
                [dst, ArgType::String.as_u8(), IDX_REWRITE_LITERAL],
            ),
            lit_ids: [None, None, Some(lit)],
        }
    }

    #[test]
    fn add_variable_orders_params_before_locals() {
        let mut lits = LitTable::new();
        let a = lits.intern_string(b"a");
        let b = lits.intern_string(b"b");
        let mut tree = ScopeTree::new();
        let id = tree.open(ScopeKind::Function, None);
        let scope = tree.scope_mut(id);
        scope.add_variable(a, true);
        scope.add_variable(b, false);
        scope.add_variable(b, false);
        assert_eq!(scope.param_count(), 1);
        assert_eq!(scope.local_count(), 1);

        scope.add_variable(a, true);
        assert_eq!(scope.param_count(), 2);
    }

    #[test]
    fn serialize_places_var_decls_after_header() {
        let mut lits = LitTable::new();
        let x = lits.intern_string(b"x");
        let mut tree = ScopeTree::new();
        let root = tree.open(ScopeKind::Global, None);
        let scope = tree.scope_mut(root);
        scope.push_op_meta(OpMeta::plain(Instr::new(
            OP_META,
            [MetaType::ScopeCodeFlags.as_u8(), 0, IDX_EMPTY],
        )));
        scope.push_op_meta(OpMeta::plain(Instr::new(OP_REG_VAR_DECL, [1, 0, 0])));
        scope.add_variable(x, false);
        scope.push_op_meta(assignment_meta(0, x));
        scope.push_op_meta(OpMeta::plain(Instr::new(OP_RET, [IDX_EMPTY; 3])));

        let (instrs, lit_map) = tree.serialize_all(root);
        let ops: Vec<OpCode> = instrs.iter().map(|i| i.opcode()).collect();
        assert_eq!(
            ops,
            vec![OP_META, OP_REG_VAR_DECL, OP_VAR_DECL, OP_ASSIGNMENT, OP_RET]
        );
        assert_eq!(lit_map.get(2, 0), Some(x));
        assert_eq!(lit_map.get(3, 2), Some(x));
        assert_eq!(lit_map.get(3, 0), None);
    }

    #[test]
    fn subscopes_merge_between_var_decls_and_code() {
        let mut lits = LitTable::new();
        let f = lits.intern_string(b"f");
        let mut tree = ScopeTree::new();
        let root = tree.open(ScopeKind::Global, None);
        tree.scope_mut(root)
            .push_op_meta(OpMeta::plain(Instr::new(OP_REG_VAR_DECL, [0, 0, 0])));

        let child = tree.open(ScopeKind::Function, Some(root));
        tree.scope_mut(child)
            .push_op_meta(build_variable_op_meta(f));
        tree.scope_mut(root)
            .push_op_meta(OpMeta::plain(Instr::new(OP_RET, [IDX_EMPTY; 3])));

        assert_eq!(tree.count_instructions(root), 3);
        assert_eq!(tree.count_subscope_instructions(root), 1);
        let (instrs, _) = tree.serialize_all(root);
        let ops: Vec<OpCode> = instrs.iter().map(|i| i.opcode()).collect();
        assert_eq!(ops, vec![OP_REG_VAR_DECL, OP_VAR_DECL, OP_RET]);
    }
}
