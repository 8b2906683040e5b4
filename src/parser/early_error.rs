//! Early-error checks deferred until strict mode is known.
//!
//! Strict-mode checks run after the directive prologue could have switched
//! modes, so the collectors gather names first and validate on request.
//! Object literals and formal-parameter lists nest, hence the stacks.

use crate::lit::{LitId, LitTable};

use super::emit::Operand;
use super::error::ParserError;
use super::types::SourcePos;

const ERR_EVAL_ARGUMENTS_IN_STRICT: &str =
    "'eval' and 'arguments' are not allowed here in strict mode";
const ERR_DUPLICATE_PROP_DATA: &str = "duplicate data property in object literal";
const ERR_ACCESSOR_DATA_MIX: &str =
    "accessor and data property with the same name in object literal";
const ERR_DUPLICATE_ACCESSOR: &str = "duplicate accessor property in object literal";
const ERR_DUPLICATE_PARAMETER: &str = "duplicate formal parameter in strict mode";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PropKind {
    Data,
    Getter,
    Setter,
}

#[derive(Copy, Clone, Debug)]
struct PropEntry {
    name: LitId,
    kind: PropKind,
}

#[derive(Debug, Default)]
pub struct EarlyErrorChecker {
    prop_stack: Vec<Vec<PropEntry>>,
    varg_stack: Vec<Vec<LitId>>,
}

impl EarlyErrorChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error when a literal operand names `eval` or `arguments` and the
    /// surrounding code is strict; such identifiers may not be assignment,
    /// declaration or increment targets there.
    pub fn check_for_eval_and_arguments(
        &self,
        lits: &LitTable,
        operand: Operand,
        is_strict: bool,
        pos: SourcePos,
    ) -> Result<(), ParserError> {
        if !is_strict {
            return Ok(());
        }
        if let Some(lit) = operand.lit() {
            if lits.str_equals(lit, b"eval") || lits.str_equals(lit, b"arguments") {
                return Err(ParserError::syntax(
                    ERR_EVAL_ARGUMENTS_IN_STRICT,
                    pos as usize,
                ));
            }
        }
        Ok(())
    }

    // ---- object literal property names ---------------------------------

    pub fn start_checking_of_prop_names(&mut self) {
        self.prop_stack.push(Vec::new());
    }

    pub fn add_prop_name(&mut self, name: Operand, kind: PropKind) {
        let Some(lit) = name.lit() else {
            debug_assert!(false, "property name must be a literal");
            return;
        };
        let props = self.prop_stack.last_mut().expect("open object literal");
        props.push(PropEntry { name: lit, kind });
    }

    /// ES 5.1 section 11.1.5: duplicate data properties are an error only
    /// in strict mode; mixing data and accessor kinds, or repeating the
    /// same accessor kind, is always an error.
    pub fn check_for_duplication_of_prop_names(
        &mut self,
        is_strict: bool,
        pos: SourcePos,
    ) -> Result<(), ParserError> {
        let props = self.prop_stack.pop().expect("open object literal");
        for (idx, entry) in props.iter().enumerate() {
            for earlier in &props[..idx] {
                if earlier.name != entry.name {
                    continue;
                }
                match (earlier.kind, entry.kind) {
                    (PropKind::Data, PropKind::Data) => {
                        if is_strict {
                            return Err(ParserError::syntax(
                                ERR_DUPLICATE_PROP_DATA,
                                pos as usize,
                            ));
                        }
                    }
                    (PropKind::Data, _) | (_, PropKind::Data) => {
                        return Err(ParserError::syntax(ERR_ACCESSOR_DATA_MIX, pos as usize));
                    }
                    (a, b) if a == b => {
                        return Err(ParserError::syntax(ERR_DUPLICATE_ACCESSOR, pos as usize));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // ---- formal parameter lists ----------------------------------------

    pub fn start_checking_of_vargs(&mut self) {
        self.varg_stack.push(Vec::new());
    }

    pub fn add_varg(&mut self, name: Operand) {
        let Some(lit) = name.lit() else {
            debug_assert!(false, "formal parameter must be a literal");
            return;
        };
        let vargs = self.varg_stack.last_mut().expect("open formal list");
        vargs.push(lit);
    }

    pub fn check_for_syntax_errors_in_formal_param_list(
        &mut self,
        lits: &LitTable,
        is_strict: bool,
        pos: SourcePos,
    ) -> Result<(), ParserError> {
        let vargs = self.varg_stack.pop().expect("open formal list");
        if !is_strict {
            return Ok(());
        }
        for (idx, name) in vargs.iter().enumerate() {
            if vargs[..idx].contains(name) {
                return Err(ParserError::syntax(ERR_DUPLICATE_PARAMETER, pos as usize));
            }
            if lits.str_equals(*name, b"eval") || lits.str_equals(*name, b"arguments") {
                return Err(ParserError::syntax(
                    ERR_EVAL_ARGUMENTS_IN_STRICT,
                    pos as usize,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_and_arguments_only_flagged_in_strict() {
        let mut lits = LitTable::new();
        let eval = Operand::Lit(lits.intern_string(b"eval"));
        let plain = Operand::Lit(lits.intern_string(b"x"));
        let checker = EarlyErrorChecker::new();
        checker
            .check_for_eval_and_arguments(&lits, eval, false, 0)
            .unwrap();
        checker
            .check_for_eval_and_arguments(&lits, plain, true, 0)
            .unwrap();
        let err = checker
            .check_for_eval_and_arguments(&lits, eval, true, 7)
            .unwrap_err();
        assert_eq!(err.position(), 7);
    }

    #[test]
    fn duplicate_data_props_only_strict() {
        let mut lits = LitTable::new();
        let a = Operand::Lit(lits.intern_string(b"a"));
        let mut checker = EarlyErrorChecker::new();

        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Data);
        checker.add_prop_name(a, PropKind::Data);
        checker
            .check_for_duplication_of_prop_names(false, 0)
            .unwrap();

        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Data);
        checker.add_prop_name(a, PropKind::Data);
        assert!(checker.check_for_duplication_of_prop_names(true, 0).is_err());
    }

    #[test]
    fn accessor_mixes_always_error() {
        let mut lits = LitTable::new();
        let a = Operand::Lit(lits.intern_string(b"a"));
        let mut checker = EarlyErrorChecker::new();

        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Getter);
        checker.add_prop_name(a, PropKind::Data);
        assert!(checker
            .check_for_duplication_of_prop_names(false, 0)
            .is_err());

        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Setter);
        checker.add_prop_name(a, PropKind::Setter);
        assert!(checker
            .check_for_duplication_of_prop_names(false, 0)
            .is_err());

        // Getter plus setter of the same name is fine.
        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Getter);
        checker.add_prop_name(a, PropKind::Setter);
        checker
            .check_for_duplication_of_prop_names(false, 0)
            .unwrap();
    }

    #[test]
    fn duplicate_params_flagged_in_strict() {
        let mut lits = LitTable::new();
        let a = Operand::Lit(lits.intern_string(b"a"));
        let mut checker = EarlyErrorChecker::new();

        checker.start_checking_of_vargs();
        checker.add_varg(a);
        checker.add_varg(a);
        checker
            .check_for_syntax_errors_in_formal_param_list(&lits, false, 0)
            .unwrap();

        checker.start_checking_of_vargs();
        checker.add_varg(a);
        checker.add_varg(a);
        assert!(checker
            .check_for_syntax_errors_in_formal_param_list(&lits, true, 0)
            .is_err());
    }

    #[test]
    fn nested_literals_check_independently() {
        let mut lits = LitTable::new();
        let a = Operand::Lit(lits.intern_string(b"a"));
        let mut checker = EarlyErrorChecker::new();
        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Data);
        checker.start_checking_of_prop_names();
        checker.add_prop_name(a, PropKind::Data);
        checker
            .check_for_duplication_of_prop_names(true, 0)
            .unwrap();
        checker
            .check_for_duplication_of_prop_names(true, 0)
            .unwrap();
    }
}
