//! Element slots: the variables that carry a pipeline element between stages.
//!
//! A slot starts life as an [`UnboundSlot`] collecting name candidates
//! (lambda parameter names, names derived from mapped expressions). Once all
//! stages have had their say, `register` consumes it and yields a
//! [`BoundSlot`] with a unique name. Reading a name from an unbound slot is
//! not expressible.

use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use loopify_ir::{JavaType, Operand, Precedence};

use crate::context::ReplacementContext;
use crate::error::{LowerError, LowerResult};

/// Index into a pipeline's [`SlotTable`].
///
/// # Design
/// - Memory: 4 bytes
/// - `STUB` marks the missing input of a source and output of a terminal
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct SlotId(u32);

impl SlotId {
    pub const STUB: SlotId = SlotId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        SlotId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_stub(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Hash for SlotId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.0);
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_stub() {
            write!(f, "SlotId::STUB")
        } else {
            write!(f, "SlotId({})", self.0)
        }
    }
}

/// A slot whose name is not chosen yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnboundSlot {
    ty: JavaType,
    best: SmallVec<[String; 2]>,
    other: SmallVec<[String; 4]>,
}

impl UnboundSlot {
    pub fn new(ty: JavaType) -> Self {
        UnboundSlot {
            ty,
            best: SmallVec::new(),
            other: SmallVec::new(),
        }
    }

    pub fn ty(&self) -> &JavaType {
        &self.ty
    }

    /// A name the user already wrote for this value (a lambda parameter).
    pub fn add_best_candidate(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.best.contains(&name) {
            self.best.push(name);
        }
    }

    /// A name derived heuristically.
    pub fn add_other_candidate(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.other.contains(&name) {
            self.other.push(name);
        }
    }

    /// Choose the final name.
    ///
    /// Best candidates win outright; otherwise heuristic candidates are
    /// followed by the host's suggestions for the slot type.
    pub fn register(self, ctx: &mut ReplacementContext<'_>) -> BoundSlot {
        let name = if self.best.is_empty() {
            let mut variants: Vec<String> = self.other.into_vec();
            for suggestion in ctx.host().suggest_names_for_type(&self.ty) {
                if !variants.contains(&suggestion) {
                    variants.push(suggestion);
                }
            }
            ctx.register_var_name(&variants)
        } else {
            ctx.register_var_name(self.best.as_slice())
        };
        BoundSlot {
            ty: self.ty,
            name,
            prec: Precedence::Primary,
        }
    }
}

/// A slot with its final name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundSlot {
    ty: JavaType,
    name: String,
    prec: Precedence,
}

impl BoundSlot {
    /// A slot that stands for an expression instead of a declared variable.
    pub fn synthetic(ty: JavaType, value: Operand) -> Self {
        BoundSlot {
            ty,
            name: value.text,
            prec: value.prec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &JavaType {
        &self.ty
    }

    pub fn operand(&self) -> Operand {
        Operand::new(self.name.clone(), self.prec)
    }

    /// `T name`, as used in a for-each header.
    pub fn declaration(&self) -> String {
        format!("{} {}", self.ty, self.name)
    }

    /// `T name = init;` followed by a newline.
    pub fn declare_with(&self, init: &str) -> String {
        format!("{} {} = {init};\n", self.ty, self.name)
    }
}

impl fmt::Display for BoundSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// All slots of one pipeline, nested pipelines included.
#[derive(Clone, Debug, Default)]
pub struct SlotTable {
    slots: Vec<UnboundSlot>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, ty: JavaType) -> SlotId {
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX - 1);
        self.slots.push(UnboundSlot::new(ty));
        SlotId::new(index)
    }

    /// `None` for `STUB`.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut UnboundSlot> {
        if id.is_stub() {
            return None;
        }
        self.slots.get_mut(id.index())
    }

    pub fn get(&self, id: SlotId) -> Option<&UnboundSlot> {
        if id.is_stub() {
            return None;
        }
        self.slots.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Register every slot in `order`, then any slot `order` missed.
    pub fn register_all(self, order: &[SlotId], ctx: &mut ReplacementContext<'_>) -> BoundSlots {
        let mut pending: Vec<Option<UnboundSlot>> = self.slots.into_iter().map(Some).collect();
        let mut bound: Vec<Option<BoundSlot>> = vec![None; pending.len()];
        let leftovers: Vec<SlotId> = (0..pending.len())
            .filter_map(|i| u32::try_from(i).ok().map(SlotId::new))
            .collect();
        for id in order.iter().chain(leftovers.iter()) {
            if let Some(slot) = pending.get_mut(id.index()).and_then(Option::take) {
                bound[id.index()] = Some(slot.register(ctx));
            }
        }
        BoundSlots { slots: bound }
    }
}

/// Registered slots, indexed by [`SlotId`].
#[derive(Clone, Debug, Default)]
pub struct BoundSlots {
    slots: Vec<Option<BoundSlot>>,
}

impl BoundSlots {
    pub fn get(&self, id: SlotId) -> LowerResult<&BoundSlot> {
        if id.is_stub() {
            return Err(LowerError::internal("read of the stub slot"));
        }
        self.slots
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or_else(|| LowerError::internal(format!("{id:?} read before registration")))
    }

    /// Names of all registered slots in slot order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().flatten().map(BoundSlot::name)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
