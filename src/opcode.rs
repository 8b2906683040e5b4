//! Three-address opcode schema.
//!
//! Every instruction is a fixed-width record of one opcode byte and three
//! argument bytes. An argument byte is either a register index, a small
//! constant, or one of the rewrite sentinels resolved before serialization.

use bitflags::bitflags;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Argument slot is unused.
pub const IDX_EMPTY: u8 = 255;
/// Argument slot refers to a literal; the lit-id lives in the op-meta.
pub const IDX_REWRITE_LITERAL: u8 = 254;
/// Argument slot is a forward target patched by a later rewrite.
pub const IDX_REWRITE_GENERAL: u8 = 253;

pub const REG_SPECIAL_FOR_IN_PROPERTY_NAME: u8 = 252;
pub const REG_SPECIAL_EVAL_RET: u8 = 251;
pub const REG_SPECIAL_THIS_BINDING: u8 = 250;
pub const REG_GENERAL_LAST: u8 = 249;
pub const REG_GENERAL_FIRST: u8 = 0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OpCodeInfo {
    pub name: &'static str,
    /// Bit per argument position (0b100 = arg0) that may carry a literal
    /// reference. `assignment` and `meta` are refined dynamically.
    pub lit_mask: u8,
}

macro_rules! define_opcodes {
    ($(
        $op:ident, $name:expr, $lit_mask:expr;
    )+ $(;)?) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        #[allow(non_camel_case_types)]
        #[repr(u8)]
        pub enum OpCode {
            $($op,)+
        }

        pub use OpCode::*;

        impl OpCode {
            pub const fn as_u8(self) -> u8 {
                self as u8
            }

            pub const fn as_usize(self) -> usize {
                self as usize
            }

            pub fn from_u8(value: u8) -> Self {
                match value {
                    $(v if v == OpCode::$op as u8 => OpCode::$op,)+
                    _ => {
                        debug_assert!(false, "invalid opcode value: {}", value);
                        OpCode::OP_INVALID
                    }
                }
            }
        }

        pub const OP_COUNT: usize = [$(stringify!($op)),+].len();

        pub const OPCODES: [OpCodeInfo; OP_COUNT] = [
            $(OpCodeInfo { name: $name, lit_mask: $lit_mask },)+
        ];
    };
}

define_opcodes! {
    OP_INVALID, "invalid", 0b000;
    OP_ADDITION, "addition", 0b111;
    OP_SUBSTRACTION, "substraction", 0b111;
    OP_MULTIPLICATION, "multiplication", 0b111;
    OP_DIVISION, "division", 0b111;
    OP_REMAINDER, "remainder", 0b111;
    OP_B_AND, "b_and", 0b111;
    OP_B_OR, "b_or", 0b111;
    OP_B_XOR, "b_xor", 0b111;
    OP_B_NOT, "b_not", 0b110;
    OP_B_SHIFT_LEFT, "b_shift_left", 0b111;
    OP_B_SHIFT_RIGHT, "b_shift_right", 0b111;
    OP_B_SHIFT_URIGHT, "b_shift_uright", 0b111;
    OP_LESS_THAN, "less_than", 0b111;
    OP_GREATER_THAN, "greater_than", 0b111;
    OP_LESS_OR_EQUAL_THAN, "less_or_equal_than", 0b111;
    OP_GREATER_OR_EQUAL_THAN, "greater_or_equal_than", 0b111;
    OP_INSTANCEOF, "instanceof", 0b111;
    OP_IN, "in", 0b111;
    OP_EQUAL_VALUE, "equal_value", 0b111;
    OP_NOT_EQUAL_VALUE, "not_equal_value", 0b111;
    OP_EQUAL_VALUE_TYPE, "equal_value_type", 0b111;
    OP_NOT_EQUAL_VALUE_TYPE, "not_equal_value_type", 0b111;
    OP_UNARY_PLUS, "unary_plus", 0b110;
    OP_UNARY_MINUS, "unary_minus", 0b110;
    OP_LOGICAL_NOT, "logical_not", 0b110;
    OP_TYPEOF, "typeof", 0b110;
    OP_DELETE_VAR, "delete_var", 0b110;
    OP_DELETE_PROP, "delete_prop", 0b111;
    OP_POST_INCR, "post_incr", 0b110;
    OP_POST_DECR, "post_decr", 0b110;
    OP_PRE_INCR, "pre_incr", 0b110;
    OP_PRE_DECR, "pre_decr", 0b110;
    OP_PROP_GETTER, "prop_getter", 0b111;
    OP_PROP_SETTER, "prop_setter", 0b111;
    OP_ASSIGNMENT, "assignment", 0b101;
    OP_JMP_DOWN, "jmp_down", 0b000;
    OP_JMP_UP, "jmp_up", 0b000;
    OP_IS_FALSE_JMP_DOWN, "is_false_jmp_down", 0b100;
    OP_IS_FALSE_JMP_UP, "is_false_jmp_up", 0b100;
    OP_IS_TRUE_JMP_DOWN, "is_true_jmp_down", 0b100;
    OP_IS_TRUE_JMP_UP, "is_true_jmp_up", 0b100;
    OP_JMP_BREAK_CONTINUE, "jmp_break_continue", 0b000;
    OP_CALL_N, "call_n", 0b110;
    OP_CONSTRUCT_N, "construct_n", 0b110;
    OP_FUNC_EXPR_N, "func_expr_n", 0b110;
    OP_FUNC_DECL_N, "func_decl_n", 0b100;
    OP_ARRAY_DECL, "array_decl", 0b100;
    OP_OBJ_DECL, "obj_decl", 0b100;
    OP_TRY_BLOCK, "try_block", 0b000;
    OP_THROW_VALUE, "throw_value", 0b100;
    OP_RET, "ret", 0b000;
    OP_RETVAL, "retval", 0b100;
    OP_REG_VAR_DECL, "reg_var_decl", 0b000;
    OP_VAR_DECL, "var_decl", 0b100;
    OP_WITH, "with", 0b100;
    OP_FOR_IN, "for_in", 0b100;
    OP_META, "meta", 0b000;
}

/// Sub-type carried in the first argument of the polymorphic `meta` opcode.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaType {
    Varg = 0,
    VargPropData,
    VargPropGetter,
    VargPropSetter,
    FunctionEnd,
    Catch,
    CatchExceptionIdentifier,
    Finally,
    EndTryCatchFinally,
    EndWith,
    EndForIn,
    ScopeCodeFlags,
    CallSiteInfo,
}

impl MetaType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        const META_TYPES: [MetaType; 13] = [
            MetaType::Varg,
            MetaType::VargPropData,
            MetaType::VargPropGetter,
            MetaType::VargPropSetter,
            MetaType::FunctionEnd,
            MetaType::Catch,
            MetaType::CatchExceptionIdentifier,
            MetaType::Finally,
            MetaType::EndTryCatchFinally,
            MetaType::EndWith,
            MetaType::EndForIn,
            MetaType::ScopeCodeFlags,
            MetaType::CallSiteInfo,
        ];
        META_TYPES.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            MetaType::Varg => "varg",
            MetaType::VargPropData => "varg_prop_data",
            MetaType::VargPropGetter => "varg_prop_getter",
            MetaType::VargPropSetter => "varg_prop_setter",
            MetaType::FunctionEnd => "function_end",
            MetaType::Catch => "catch",
            MetaType::CatchExceptionIdentifier => "catch_exception_identifier",
            MetaType::Finally => "finally",
            MetaType::EndTryCatchFinally => "end_try_catch_finally",
            MetaType::EndWith => "end_with",
            MetaType::EndForIn => "end_for_in",
            MetaType::ScopeCodeFlags => "scope_code_flags",
            MetaType::CallSiteInfo => "call_site_info",
        }
    }
}

/// Inline type tag of the `assignment` opcode's right-hand argument.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgType {
    Simple = 0,
    SmallInt,
    Number,
    String,
    Regexp,
    Variable,
}

impl ArgType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Simple values referenced by `assignment` with the `Simple` type tag.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SimpleValue {
    Undefined = 0,
    Null,
    False,
    True,
    ArrayHole,
}

impl SimpleValue {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

bitflags! {
    /// Per-scope property bits carried by the `scope_code_flags` meta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ScopeCodeFlags: u8 {
        const STRICT = 1 << 0;
        const NOT_REF_ARGUMENTS_IDENTIFIER = 1 << 1;
        const NOT_REF_EVAL_IDENTIFIER = 1 << 2;
        const ARGUMENTS_ON_REGISTERS = 1 << 3;
        const NO_LEX_ENV = 1 << 4;
    }
}

bitflags! {
    /// Flags carried by the `call_site_info` meta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CallSiteFlags: u8 {
        const HAVE_THIS_ARG = 1 << 0;
        const DIRECT_CALL_TO_EVAL_FORM = 1 << 1;
    }
}

/// Fixed-width three-address instruction record.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned,
)]
#[repr(C)]
pub struct Instr {
    pub op: u8,
    pub args: [u8; 3],
}

impl Instr {
    pub fn new(op: OpCode, args: [u8; 3]) -> Self {
        Self {
            op: op.as_u8(),
            args,
        }
    }

    pub fn opcode(self) -> OpCode {
        OpCode::from_u8(self.op)
    }

    /// Meta sub-type, when the instruction is an `OP_META`.
    pub fn meta_type(self) -> Option<MetaType> {
        if self.opcode() == OP_META {
            MetaType::from_u8(self.args[0])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table_matches_enum() {
        assert_eq!(OPCODES.len(), OP_COUNT);
        assert_eq!(OPCODES[OP_ADDITION.as_usize()].name, "addition");
        assert_eq!(OPCODES[OP_ADDITION.as_usize()].lit_mask, 0b111);
        assert_eq!(OPCODES[OP_META.as_usize()].name, "meta");
        assert_eq!(OpCode::from_u8(OP_RETVAL.as_u8()), OP_RETVAL);
    }

    #[test]
    fn sentinels_do_not_collide_with_registers() {
        assert!(REG_GENERAL_LAST < REG_SPECIAL_THIS_BINDING);
        assert!(REG_SPECIAL_THIS_BINDING < REG_SPECIAL_EVAL_RET);
        assert!(REG_SPECIAL_EVAL_RET < REG_SPECIAL_FOR_IN_PROPERTY_NAME);
        assert!(REG_SPECIAL_FOR_IN_PROPERTY_NAME < IDX_REWRITE_GENERAL);
        assert!(IDX_REWRITE_GENERAL < IDX_REWRITE_LITERAL);
        assert!(IDX_REWRITE_LITERAL < IDX_EMPTY);
    }

    #[test]
    fn meta_type_roundtrip() {
        for raw in 0u8..13 {
            let meta = MetaType::from_u8(raw).unwrap();
            assert_eq!(meta.as_u8(), raw);
        }
        assert_eq!(MetaType::from_u8(13), None);
    }

    #[test]
    fn instr_is_four_bytes() {
        assert_eq!(core::mem::size_of::<Instr>(), 4);
        let instr = Instr::new(OP_META, [MetaType::Varg.as_u8(), 1, IDX_EMPTY]);
        assert_eq!(instr.meta_type(), Some(MetaType::Varg));
        assert_eq!(Instr::new(OP_RET, [IDX_EMPTY; 3]).meta_type(), None);
    }
}
