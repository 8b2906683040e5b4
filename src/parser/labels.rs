//! Break/continue label manager.
//!
//! Labels form a stack mirroring statement nesting. Each label keeps
//! explicit vectors of pending forward jumps, resolved when the label is
//! popped. A border counter tracks try/with/for-in boundaries so that a
//! jump crossing one is emitted as `jmp_break_continue` instead of a plain
//! `jmp_down`.

use bitflags::bitflags;

use crate::lit::LitId;

use super::scopes::InstrCounter;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LabelKind: u8 {
        const NAMED = 1 << 0;
        const UNNAMED_BREAKS = 1 << 1;
        const UNNAMED_CONTINUES = 1 << 2;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LabelId(usize);

#[derive(Debug)]
pub struct Label {
    kind: LabelKind,
    name: Option<LitId>,
    pending_breaks: Vec<InstrCounter>,
    pending_continues: Vec<InstrCounter>,
    continue_target: Option<InstrCounter>,
    border_count_at_push: u32,
}

impl Label {
    pub fn pending_breaks(&self) -> &[InstrCounter] {
        &self.pending_breaks
    }

    pub fn pending_continues(&self) -> &[InstrCounter] {
        &self.pending_continues
    }

    pub fn continue_target(&self) -> Option<InstrCounter> {
        self.continue_target
    }
}

#[derive(Debug, Default)]
pub struct LabelSet {
    labels: Vec<Label>,
    masks: Vec<usize>,
    border_count: u32,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn visible_base(&self) -> usize {
        self.masks.last().copied().unwrap_or(0)
    }

    pub fn push(&mut self, kind: LabelKind, name: Option<LitId>) -> LabelId {
        debug_assert_eq!(kind.contains(LabelKind::NAMED), name.is_some());
        let id = LabelId(self.labels.len());
        self.labels.push(Label {
            kind,
            name,
            pending_breaks: Vec::new(),
            pending_continues: Vec::new(),
            continue_target: None,
            border_count_at_push: self.border_count,
        });
        id
    }

    /// Find the innermost visible label matching kind (and name, for named
    /// lookups). The second result is false iff a nested-jumpable border
    /// was raised after the label was pushed and is still active.
    pub fn find(&self, kind: LabelKind, name: Option<LitId>) -> Option<(LabelId, bool)> {
        let base = self.visible_base();
        for (idx, label) in self.labels.iter().enumerate().skip(base).rev() {
            if !label.kind.intersects(kind) {
                continue;
            }
            if kind.contains(LabelKind::NAMED) && label.name != name {
                continue;
            }
            let is_simply_jumpable = self.border_count == label.border_count_at_push;
            return Some((LabelId(idx), is_simply_jumpable));
        }
        None
    }

    /// Record a jump template position for pop-time resolution.
    pub fn add_jump(&mut self, id: LabelId, jump_oc: InstrCounter, is_break: bool) {
        let label = &mut self.labels[id.0];
        if is_break {
            label.pending_breaks.push(jump_oc);
        } else {
            label.pending_continues.push(jump_oc);
        }
    }

    /// Set the continue target on every label from the top of the stack
    /// down to and including `outermost`.
    pub fn setup_continue_target(&mut self, outermost: LabelId, target: InstrCounter) {
        for label in &mut self.labels[outermost.0..] {
            label.continue_target = Some(target);
        }
    }

    /// Pop the label, which must be the stack top. The caller rewrites its
    /// pending jumps.
    pub fn pop(&mut self, id: LabelId) -> Label {
        debug_assert_eq!(id.0 + 1, self.labels.len());
        self.labels.pop().expect("label stack underflow")
    }

    pub fn raise_nested_jumpable_border(&mut self) {
        self.border_count += 1;
    }

    pub fn remove_nested_jumpable_border(&mut self) {
        debug_assert!(self.border_count > 0);
        self.border_count -= 1;
    }

    /// Hide all current labels (entering a nested function definition).
    pub fn mask_set(&mut self) {
        self.masks.push(self.labels.len());
    }

    pub fn restore_set(&mut self) {
        let base = self.masks.pop().expect("label mask underflow");
        debug_assert_eq!(base, self.labels.len());
    }
}
