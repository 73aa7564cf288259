//! Per-element dirty tracking.

use bitflags::bitflags;

bitflags! {
    /// Which aspects of an element need reprocessing on the next render.
    ///
    /// An empty set means the element is clean. A newly constructed element
    /// carries [`Stain::FINALIZE`] until its styles have been embedded
    /// against a parent context.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Stain: u16 {
        /// Background or other color related changes.
        const COLOR = 1 << 0;
        /// Border and title changes.
        const EDGE = 1 << 1;
        /// Child changes; the render recurses into the subtree.
        const DEEP = 1 << 2;
        /// Width or height changed; the render buffer is reallocated.
        const STRETCH = 1 << 3;
        /// Unparsed style classes remain.
        const CLASS = 1 << 5;
        /// A show/hide transition is pending.
        const STATE = 1 << 6;
        /// The absolute-position cache is invalid.
        const MOVE = 1 << 7;
        /// Full repaint: the render buffer is refilled with the empty cell.
        const RESET = 1 << 8;
        /// Styles have not yet been embedded against a parent context.
        const FINALIZE = 1 << 9;
    }
}

impl Stain {
    /// Whether nothing is stained.
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }

    /// Mark the given aspects dirty.
    pub fn mark(&mut self, flags: Stain) {
        *self |= flags;
    }

    /// Clear the given aspects.
    pub fn clear(&mut self, flags: Stain) {
        *self &= !flags;
    }
}
