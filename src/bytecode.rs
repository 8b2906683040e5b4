//! Final byte-code image produced by a successful compilation.

use core::fmt::Write as _;

use rustc_hash::FxHashMap;
use zerocopy::IntoBytes;

use crate::lit::{LitId, LitTable, Literal};
use crate::opcode::{ArgType, Instr, MetaType, ScopeCodeFlags, IDX_EMPTY, OPCODES, OP_META};

/// Explicit mapping from (instruction offset, argument slot) to the literal
/// the `IDX_REWRITE_LITERAL` byte in that slot stands for.
#[derive(Debug, Default)]
pub struct LitMap {
    map: FxHashMap<(u16, u8), LitId>,
}

impl LitMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, offset: u16, slot: u8, lit: LitId) {
        debug_assert!(slot < 3);
        let prev = self.map.insert((offset, slot), lit);
        debug_assert!(prev.is_none());
    }

    pub fn get(&self, offset: u16, slot: u8) -> Option<LitId> {
        self.map.get(&(offset, slot)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[derive(Debug)]
pub struct BytecodeProgram {
    instrs: Vec<Instr>,
    lit_map: LitMap,
    lits: LitTable,
    scope_flags: ScopeCodeFlags,
    contains_functions: bool,
}

impl BytecodeProgram {
    pub(crate) fn new(
        instrs: Vec<Instr>,
        lit_map: LitMap,
        lits: LitTable,
        scope_flags: ScopeCodeFlags,
        contains_functions: bool,
    ) -> Self {
        Self {
            instrs,
            lit_map,
            lits,
            scope_flags,
            contains_functions,
        }
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn lit_map(&self) -> &LitMap {
        &self.lit_map
    }

    pub fn lits(&self) -> &LitTable {
        &self.lits
    }

    /// Scope-code flags of the root (global or eval) scope.
    pub fn scope_flags(&self) -> ScopeCodeFlags {
        self.scope_flags
    }

    pub fn contains_functions(&self) -> bool {
        self.contains_functions
    }

    /// Raw byte view of the fixed-width instruction records.
    pub fn as_bytes(&self) -> &[u8] {
        self.instrs.as_slice().as_bytes()
    }

    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for (offset, instr) in self.instrs.iter().enumerate() {
            let _ = writeln!(out, "{}", self.disassemble_instr(offset as u16, *instr));
        }
        out
    }

    fn disassemble_instr(&self, offset: u16, instr: Instr) -> String {
        let op = instr.opcode();
        let name = OPCODES[op.as_usize()].name;
        let mut line = format!("{offset:5}: {name}");
        if op == OP_META {
            match instr.meta_type() {
                Some(meta) => {
                    let _ = write!(line, " {}", meta.name());
                    if meta == MetaType::ScopeCodeFlags {
                        let _ = write!(line, " flags=0x{:02x}", instr.args[1]);
                        return line;
                    }
                }
                None => {
                    let _ = write!(line, " ?{}", instr.args[0]);
                }
            }
            for slot in 1..3u8 {
                let _ = write!(line, " {}", self.fmt_arg(offset, instr, slot));
            }
            return line;
        }
        if op == crate::opcode::OP_ASSIGNMENT {
            let type_name = match instr.args[1] {
                v if v == ArgType::Simple.as_u8() => "SIMPLE",
                v if v == ArgType::SmallInt.as_u8() => "SMALLINT",
                v if v == ArgType::Number.as_u8() => "NUMBER",
                v if v == ArgType::String.as_u8() => "STRING",
                v if v == ArgType::Regexp.as_u8() => "REGEXP",
                v if v == ArgType::Variable.as_u8() => "VARIABLE",
                _ => "?",
            };
            let _ = write!(
                line,
                " {} {} {}",
                self.fmt_arg(offset, instr, 0),
                type_name,
                self.fmt_arg(offset, instr, 2)
            );
            return line;
        }
        for slot in 0..3u8 {
            let _ = write!(line, " {}", self.fmt_arg(offset, instr, slot));
        }
        line
    }

    fn fmt_arg(&self, offset: u16, instr: Instr, slot: u8) -> String {
        if let Some(lit) = self.lit_map.get(offset, slot) {
            return match self.lits.get(lit) {
                Literal::String(bytes) => {
                    format!("'{}'", String::from_utf8_lossy(bytes))
                }
                Literal::Number(num) => format!("{num}"),
            };
        }
        let raw = instr.args[slot as usize];
        if raw == IDX_EMPTY {
            return "-".to_string();
        }
        format!("{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{Instr, OP_ADDITION, OP_RET};

    #[test]
    fn lit_map_lookup() {
        let mut lits = LitTable::new();
        let id = lits.intern_string(b"x");
        let mut map = LitMap::new();
        map.insert(4, 1, id);
        assert_eq!(map.get(4, 1), Some(id));
        assert_eq!(map.get(4, 0), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn as_bytes_is_four_bytes_per_instr() {
        let program = BytecodeProgram::new(
            vec![
                Instr::new(OP_ADDITION, [2, 0, 1]),
                Instr::new(OP_RET, [IDX_EMPTY; 3]),
            ],
            LitMap::new(),
            LitTable::new(),
            ScopeCodeFlags::empty(),
            false,
        );
        let bytes = program.as_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0], OP_ADDITION.as_u8());
        assert_eq!(bytes[4], OP_RET.as_u8());
    }

    #[test]
    fn disassembly_resolves_literals() {
        let mut lits = LitTable::new();
        let id = lits.intern_string(b"name");
        let mut map = LitMap::new();
        map.insert(0, 1, id);
        let program = BytecodeProgram::new(
            vec![Instr::new(OP_ADDITION, [2, crate::opcode::IDX_REWRITE_LITERAL, 1])],
            map,
            lits,
            ScopeCodeFlags::empty(),
            false,
        );
        let text = program.disassemble();
        assert!(text.contains("addition"));
        assert!(text.contains("'name'"));
    }
}
