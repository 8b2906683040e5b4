//! End-to-end compilation tests driving the public API.

use mjsc::opcode::{
    ArgType, Instr, MetaType, OpCode, ScopeCodeFlags, IDX_REWRITE_LITERAL, OP_ADDITION,
    OP_ASSIGNMENT, OP_CALL_N, OP_FOR_IN, OP_FUNC_DECL_N, OP_IS_FALSE_JMP_DOWN, OP_IS_TRUE_JMP_UP,
    OP_JMP_DOWN, OP_META, OP_PROP_GETTER, OP_PROP_SETTER, OP_REG_VAR_DECL, OP_RET, OP_RETVAL,
    OP_THROW_VALUE, OP_TRY_BLOCK, OP_VAR_DECL, OP_WITH,
};
use mjsc::{parse_eval, parse_script, BytecodeProgram, CompilerOptions, ErrorClass};

fn compile(source: &str) -> BytecodeProgram {
    parse_script(source.as_bytes(), &CompilerOptions::default())
        .unwrap_or_else(|err| panic!("compile failed: {err}"))
}

fn compile_err(source: &str) -> mjsc::CompileError {
    parse_script(source.as_bytes(), &CompilerOptions::default())
        .err()
        .expect("expected a compile error")
}

fn opcodes(program: &BytecodeProgram) -> Vec<OpCode> {
    program.instrs().iter().map(|i| i.opcode()).collect()
}

fn meta_types(program: &BytecodeProgram) -> Vec<MetaType> {
    program
        .instrs()
        .iter()
        .filter_map(|i| i.meta_type())
        .collect()
}

fn lit_bytes(program: &BytecodeProgram, offset: u16, slot: u8) -> Vec<u8> {
    let lit = program
        .lit_map()
        .get(offset, slot)
        .unwrap_or_else(|| panic!("no literal at {offset}/{slot}"));
    program
        .lits()
        .get(lit)
        .as_string()
        .expect("string literal")
        .to_vec()
}

/// Every literal sentinel byte in a serialized instruction argument must be
/// backed by an entry in the literal map.
fn assert_literal_slots_resolved(program: &BytecodeProgram) {
    let lit_positions: Vec<(u16, u8)> = program
        .instrs()
        .iter()
        .enumerate()
        .flat_map(|(offset, instr): (usize, &Instr)| {
            (0..3u8).filter_map(move |slot| {
                (instr.args[slot as usize] == IDX_REWRITE_LITERAL).then_some((offset as u16, slot))
            })
        })
        .collect();
    let mapped = lit_positions
        .iter()
        .filter(|&&(offset, slot)| program.lit_map().get(offset, slot).is_some())
        .count();
    assert_eq!(mapped, program.lit_map().len());
}

// ---------------------------------------------------------------------------
// Emitted-sequence scenarios
// ---------------------------------------------------------------------------

#[test]
fn var_with_initializer_at_global_scope() {
    let program = compile("var x = 1;");
    assert_eq!(
        opcodes(&program),
        vec![OP_META, OP_REG_VAR_DECL, OP_VAR_DECL, OP_ASSIGNMENT, OP_RET]
    );

    // var_decl names x; the assignment goes straight to x with a small int.
    assert_eq!(lit_bytes(&program, 2, 0), b"x".to_vec());
    let assignment = program.instrs()[3];
    assert_eq!(lit_bytes(&program, 3, 0), b"x".to_vec());
    assert_eq!(assignment.args[1], ArgType::SmallInt.as_u8());
    assert_eq!(assignment.args[2], 1);

    // Neither "arguments" nor "eval" appears.
    let flags = ScopeCodeFlags::from_bits_truncate(program.instrs()[0].args[1]);
    assert!(flags.contains(
        ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER | ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER
    ));
    assert!(!flags.contains(ScopeCodeFlags::STRICT));
    assert_literal_slots_resolved(&program);
}

#[test]
fn function_parameters_promote_to_registers() {
    let program = compile("function f(a, b) { return a + b; }");
    assert_eq!(
        opcodes(&program),
        vec![
            OP_META,         // global scope_code_flags
            OP_REG_VAR_DECL, // global registers
            OP_FUNC_DECL_N,  // function header, arg list rewritten to zero
            OP_META,         // function_end
            OP_META,         // function scope_code_flags
            OP_REG_VAR_DECL, // function registers
            OP_ASSIGNMENT,   // a flows through a temp
            OP_ADDITION,
            OP_RETVAL,
            OP_RET, // function epilogue
            OP_RET, // global epilogue
        ]
    );

    let header = program.instrs()[2];
    assert_eq!(lit_bytes(&program, 2, 0), b"f".to_vec());
    assert_eq!(header.args[1], 0);

    // No formal-parameter vargs survive the promotion.
    assert!(!meta_types(&program).contains(&MetaType::Varg));

    // function_end spans to the instruction after the function epilogue.
    let fn_end = program.instrs()[3];
    assert_eq!(fn_end.args[1], 0);
    assert_eq!(fn_end.args[2], 7);

    let flags = ScopeCodeFlags::from_bits_truncate(program.instrs()[4].args[1]);
    assert!(flags.contains(
        ScopeCodeFlags::ARGUMENTS_ON_REGISTERS
            | ScopeCodeFlags::NO_LEX_ENV
            | ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER
            | ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER
    ));

    // Two temps, no local-variable registers, two argument registers.
    let reg_var_decl = program.instrs()[5];
    assert_eq!(reg_var_decl.args, [2, 0, 2]);

    // Both parameter references were patched to the argument registers.
    let assignment = program.instrs()[6];
    assert_eq!(assignment.args, [0, ArgType::Variable.as_u8(), 2]);
    let addition = program.instrs()[7];
    assert_eq!(addition.args, [1, 0, 3]);
    assert_literal_slots_resolved(&program);
}

#[test]
fn while_loop_with_break_resolves_all_jumps() {
    let program = compile("while (c) { if (x) break; }");
    assert_eq!(
        opcodes(&program),
        vec![
            OP_META,
            OP_REG_VAR_DECL,
            OP_JMP_DOWN,          // forward jump to the condition check
            OP_IS_FALSE_JMP_DOWN, // if (x)
            OP_JMP_DOWN,          // break
            OP_IS_TRUE_JMP_UP,    // continue-iterations check on c
            OP_RET,
        ]
    );

    // Forward jump to the condition check.
    assert_eq!(program.instrs()[2].args[0], 0);
    assert_eq!(program.instrs()[2].args[1], 3);
    // if-check falls through past the break.
    assert_eq!(program.instrs()[3].args[1], 0);
    assert_eq!(program.instrs()[3].args[2], 2);
    // break lands after the loop.
    assert_eq!(program.instrs()[4].args[0], 0);
    assert_eq!(program.instrs()[4].args[1], 2);
    // back-jump to the next-iteration target.
    assert_eq!(program.instrs()[5].args[1], 0);
    assert_eq!(program.instrs()[5].args[2], 2);
    assert_literal_slots_resolved(&program);
}

#[test]
fn with_statement_brackets_its_body() {
    let program = compile("with (o) { f(); }");
    assert_eq!(
        opcodes(&program),
        vec![OP_META, OP_REG_VAR_DECL, OP_WITH, OP_CALL_N, OP_META, OP_RET]
    );
    // The with template records the body length.
    assert_eq!(program.instrs()[2].args[1], 0);
    assert_eq!(program.instrs()[2].args[2], 2);
    assert_eq!(program.instrs()[4].meta_type(), Some(MetaType::EndWith));
}

#[test]
fn with_statement_is_rejected_in_strict_mode() {
    let err = compile_err("'use strict'; with (o) { f(); }");
    assert_eq!(err.class(), ErrorClass::Syntax);
}

#[test]
fn try_catch_finally_meta_sequence() {
    let program = compile("try { throw e; } catch (x) { } finally { }");
    assert_eq!(
        opcodes(&program),
        vec![
            OP_META,
            OP_REG_VAR_DECL,
            OP_TRY_BLOCK,
            OP_THROW_VALUE,
            OP_META, // catch
            OP_META, // catch_exception_identifier
            OP_META, // finally
            OP_META, // end_try_catch_finally
            OP_RET,
        ]
    );
    assert_eq!(
        meta_types(&program),
        vec![
            MetaType::ScopeCodeFlags,
            MetaType::Catch,
            MetaType::CatchExceptionIdentifier,
            MetaType::Finally,
            MetaType::EndTryCatchFinally,
        ]
    );
    assert_eq!(lit_bytes(&program, 5, 1), b"x".to_vec());
}

#[test]
fn compound_member_assignment_reuses_the_getter() {
    let program = compile("a.b = a.b + 1");
    let ops = opcodes(&program);

    let getter_at = ops.iter().position(|&op| op == OP_PROP_GETTER).unwrap();
    let addition_at = ops.iter().position(|&op| op == OP_ADDITION).unwrap();
    let setter_at = ops.iter().position(|&op| op == OP_PROP_SETTER).unwrap();
    assert!(getter_at < addition_at && addition_at < setter_at);

    // Exactly one getter survives: the left-hand side getter is unlinked
    // and replayed as the final setter.
    assert_eq!(ops.iter().filter(|&&op| op == OP_PROP_GETTER).count(), 1);
    assert_eq!(lit_bytes(&program, setter_at as u16, 0), b"a".to_vec());
    assert_literal_slots_resolved(&program);
}

// ---------------------------------------------------------------------------
// Grammar coverage
// ---------------------------------------------------------------------------

#[test]
fn for_in_statement_emits_iteration_markers() {
    let program = compile("for (var k in obj) { f(k); }");
    let ops = opcodes(&program);
    assert!(ops.contains(&OP_FOR_IN));
    assert!(meta_types(&program).contains(&MetaType::EndForIn));
    assert_literal_slots_resolved(&program);
}

#[test]
fn plain_for_statement_compiles() {
    let program = compile("for (var i = 0; i < 10; i = i + 1) { f(i); }");
    let ops = opcodes(&program);
    assert!(ops.contains(&OP_IS_TRUE_JMP_UP));
    assert_literal_slots_resolved(&program);
}

#[test]
fn for_head_containing_in_operator_is_for_in() {
    // The `in` inside the parenthesized initializer selects for-in parsing
    // only when no top-level semicolon is present.
    let program = compile("for (k in obj) f(k);");
    assert!(opcodes(&program).contains(&OP_FOR_IN));

    let program = compile("for (var i = ('a' in obj); i; i = 0) f(i);");
    assert!(!opcodes(&program).contains(&OP_FOR_IN));
}

#[test]
fn switch_statement_two_pass_layout() {
    let program = compile("switch (x) { case 1: f(); break; default: g(); }");
    let ops = opcodes(&program);
    assert!(ops.contains(&OP_JMP_DOWN));
    assert_literal_slots_resolved(&program);
}

#[test]
fn switch_with_duplicate_default_is_rejected() {
    let err = compile_err("switch (x) { default: ; default: ; }");
    assert_eq!(err.class(), ErrorClass::Syntax);
}

#[test]
fn labelled_continue_targets_the_outer_loop() {
    let program = compile("outer: while (a) { while (b) { continue outer; } }");
    assert_literal_slots_resolved(&program);
}

#[test]
fn break_and_continue_need_targets() {
    assert_eq!(compile_err("break;").class(), ErrorClass::Syntax);
    assert_eq!(compile_err("continue;").class(), ErrorClass::Syntax);
    assert_eq!(
        compile_err("while (a) { break missing; }").class(),
        ErrorClass::Syntax
    );
}

#[test]
fn duplicate_label_is_rejected() {
    let err = compile_err("lbl: lbl: f();");
    assert_eq!(err.message(), "label is duplicated");
}

#[test]
fn return_outside_function_is_rejected() {
    let err = compile_err("return 1;");
    assert_eq!(err.message(), "return not in a function");
}

#[test]
fn regexp_literal_after_seek_rescan() {
    let program = compile("var re = /ab+c/gi;");
    let assignment = program
        .instrs()
        .iter()
        .enumerate()
        .find(|(_, i)| {
            i.opcode() == OP_ASSIGNMENT && i.args[1] == ArgType::Regexp.as_u8()
        })
        .map(|(offset, _)| offset as u16)
        .expect("regexp assignment");
    assert_eq!(lit_bytes(&program, assignment, 2), b"/ab+c/gi".to_vec());
}

#[test]
fn division_still_parses_where_regexp_is_not_allowed() {
    let program = compile("var half = total / 2;");
    assert!(opcodes(&program).contains(&mjsc::opcode::OP_DIVISION));
}

#[test]
fn automatic_semicolon_insertion() {
    compile("var x = 1\nvar y = 2");
    compile("f()\ng()");
    let err = compile_err("var x = 1 var y = 2");
    assert_eq!(err.class(), ErrorClass::Syntax);
}

#[test]
fn object_literal_accessors_and_data() {
    let program = compile("var o = { a: 1, get b() { return 1; }, set b(v) { } };");
    let metas = meta_types(&program);
    assert!(metas.contains(&MetaType::VargPropData));
    assert!(metas.contains(&MetaType::VargPropGetter));
    assert!(metas.contains(&MetaType::VargPropSetter));
}

#[test]
fn object_literal_duplicate_rules() {
    // Duplicate data properties are fine in sloppy mode.
    compile("var o = { a: 1, a: 2 };");
    assert_eq!(
        compile_err("'use strict'; var o = { a: 1, a: 2 };").class(),
        ErrorClass::Syntax
    );
    assert_eq!(
        compile_err("var o = { a: 1, get a() { return 1; } };").class(),
        ErrorClass::Syntax
    );
    assert_eq!(
        compile_err("var o = { get a() { return 1; }, get a() { return 2; } };").class(),
        ErrorClass::Syntax
    );
    // A getter/setter pair for the same name is legal.
    compile("var o = { get a() { return 1; }, set a(v) { } };");
}

#[test]
fn property_named_get_is_not_an_accessor() {
    let program = compile("var o = { get: 1, set: 2 };");
    let metas = meta_types(&program);
    assert!(metas.contains(&MetaType::VargPropData));
    assert!(!metas.contains(&MetaType::VargPropGetter));
}

#[test]
fn strict_mode_propagates_into_nested_functions() {
    // The outer directive makes the nested function strict.
    let err = parse_script(
        b"'use strict'; function f() { with (o) { } }",
        &CompilerOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Syntax);

    // A nested directive strictens only the nested function.
    compile("function f() { 'use strict'; } with (o) { }");
    let err = compile_err("function f() { 'use strict'; with (o) { } }");
    assert_eq!(err.class(), ErrorClass::Syntax);
}

#[test]
fn directive_prologue_applies_retroactively() {
    let err = compile_err("'first'; 'use strict'; var o = { a: 1, a: 2 };");
    assert_eq!(err.class(), ErrorClass::Syntax);
}

#[test]
fn escaped_use_strict_does_not_enable_strict_mode() {
    compile("'use\\u0020strict'; with (o) { }");
}

#[test]
fn strict_mode_identifier_rules() {
    assert_eq!(
        compile_err("'use strict'; var eval = 1;").class(),
        ErrorClass::Syntax
    );
    assert_eq!(
        compile_err("'use strict'; arguments = 1;").class(),
        ErrorClass::Syntax
    );
    assert_eq!(
        compile_err("'use strict'; function f(a, a) { }").class(),
        ErrorClass::Syntax
    );
    assert_eq!(
        compile_err("'use strict'; delete x;").class(),
        ErrorClass::Syntax
    );
    compile("var eval = 1;");
    compile("function f(a, a) { }");
    compile("delete x;");
}

#[test]
fn invalid_assignment_targets_are_reference_errors() {
    assert_eq!(compile_err("1 = 2;").class(), ErrorClass::Reference);
    assert_eq!(compile_err("++1;").class(), ErrorClass::Reference);
}

#[test]
fn eval_reports_contained_functions() {
    let program = parse_eval(b"var f = function() { };", false, &CompilerOptions::default())
        .expect("compile");
    assert!(program.contains_functions());

    let program = parse_eval(b"1 + 2", false, &CompilerOptions::default()).expect("compile");
    assert!(!program.contains_functions());
    assert_eq!(opcodes(&program).last(), Some(&OP_RETVAL));
}

#[test]
fn functions_without_promotion_keep_their_vargs() {
    // `arguments` disables the promotion pass.
    let program = compile("function f(a) { return arguments; }");
    assert!(meta_types(&program).contains(&MetaType::Varg));
    let flags_meta = program
        .instrs()
        .iter()
        .filter(|i| i.meta_type() == Some(MetaType::ScopeCodeFlags))
        .nth(1)
        .expect("function scope flags");
    let flags = ScopeCodeFlags::from_bits_truncate(flags_meta.args[1]);
    assert!(!flags.contains(ScopeCodeFlags::ARGUMENTS_ON_REGISTERS));
    assert!(!flags.contains(ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER));
}

#[test]
fn duplicate_parameters_promote_to_the_last_declaration() {
    let program = compile("function f(a, a) { return a; }");
    // Promotion still applies; both parameter slots get registers and no
    // varg metas survive.
    assert!(!meta_types(&program).contains(&MetaType::Varg));
    let reg_var_decl = program
        .instrs()
        .iter()
        .filter(|i| i.opcode() == OP_REG_VAR_DECL)
        .nth(1)
        .expect("function reg_var_decl");
    assert_eq!(reg_var_decl.args[2], 2);
}

#[test]
fn nested_scopes_serialize_depth_first() {
    let program = compile("function outer() { function inner() { return 1; } } var tail = 0;");
    let ops = opcodes(&program);
    let headers: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, &op)| op == OP_FUNC_DECL_N)
        .map(|(offset, _)| offset)
        .collect();
    assert_eq!(headers.len(), 2);
    // inner's code nests inside outer's serialized span.
    let var_decl_at = ops.iter().position(|&op| op == OP_VAR_DECL).unwrap();
    assert!(headers[1] > headers[0]);
    assert!(var_decl_at < headers[0]);
    assert_literal_slots_resolved(&program);
}

#[test]
fn conditional_and_logical_operators_compile() {
    let program = compile("var r = a && b || (c ? d : e);");
    assert!(opcodes(&program).contains(&OP_IS_FALSE_JMP_DOWN));
    assert_literal_slots_resolved(&program);
}

#[test]
fn new_expressions_with_and_without_arguments() {
    let program = compile("var a = new F(); var b = new F; var c = new F(1, 2);");
    let constructs = opcodes(&program)
        .iter()
        .filter(|&&op| op == mjsc::opcode::OP_CONSTRUCT_N)
        .count();
    assert_eq!(constructs, 3);
}

#[test]
fn call_with_this_argument_emits_call_site_info() {
    let program = compile("obj.method(1);");
    assert!(meta_types(&program).contains(&MetaType::CallSiteInfo));
}

#[test]
fn direct_eval_call_form_is_flagged() {
    let program = compile("eval('1');");
    assert!(meta_types(&program).contains(&MetaType::CallSiteInfo));
    let flags_meta = program
        .instrs()
        .iter()
        .find(|i| i.meta_type() == Some(MetaType::CallSiteInfo))
        .unwrap();
    assert_eq!(
        flags_meta.args[1],
        mjsc::opcode::CallSiteFlags::DIRECT_CALL_TO_EVAL_FORM.bits()
    );
    // Referencing eval also clears the not-ref-eval bit.
    assert!(!program
        .scope_flags()
        .contains(ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER));
}

#[test]
fn array_literals_with_holes() {
    let program = compile("var a = [1, , 3];");
    let holes = program
        .instrs()
        .iter()
        .filter(|i| {
            i.opcode() == OP_ASSIGNMENT
                && i.args[1] == ArgType::Simple.as_u8()
                && i.args[2] == mjsc::opcode::SimpleValue::ArrayHole.as_u8()
        })
        .count();
    assert_eq!(holes, 1);
}

#[test]
fn too_many_call_arguments_is_rejected() {
    let mut source = String::from("f(");
    for index in 0..256 {
        if index > 0 {
            source.push(',');
        }
        source.push('0');
    }
    source.push_str(");");
    let err = compile_err(&source);
    assert_eq!(err.class(), ErrorClass::Syntax);
}
