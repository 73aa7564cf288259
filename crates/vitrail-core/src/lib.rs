//! vitrail-core: a retained-mode terminal UI engine.
//!
//! This crate provides the rendering pipeline (stain-tracked element tree,
//! per-element rasterization with alpha compositing, run-length ANSI
//! encoding), byte-level terminal input decoding, and the three-thread
//! scheduler that coordinates the render, event and input workers behind a
//! single mutex and condvar.

pub mod border;
pub mod canvas;
pub mod cell;
pub mod color;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod events;
pub mod filestream;
pub mod geometry;
pub mod input;
pub mod list_view;
pub mod render;
pub mod report;
pub mod scratch;
pub mod settings;
pub mod stain;
pub mod style;
pub mod tasks;
pub mod terminal;
pub mod tree;

pub use border::{BorderConnection, BorderGlyphs};
pub use cell::{CELL_ENCODED_PARTS, Cell, CellFlags, Glyph};
pub use color::{Rgb, Rgba};
pub use encoder::{encode_buffer, liquify};
pub use engine::{CarryFlags, Engine, RenderStatus, World};
pub use error::{JobError, Result, VitrailError};
pub use events::{EventContext, EventHandler, HandlerJob};
pub use filestream::FileStream;
pub use geometry::{FVector3, Position, Size, collides, collides_point};
pub use input::{ButtonState, Criteria, InputRecord, Key, KeyboardStates};
pub use render::{FittingArea, compute_alpha_to_nesting, get_fitting_area};
pub use scratch::{CompactString, ScratchVec, SuperString};
pub use settings::Settings;
pub use stain::Stain;
pub use style::{
    Anchor, ColorTier, Dimension, FlowDirection, Property, PropertyStatus, Shadow, Style,
};
pub use tasks::{MemoryTask, TaskFlags, TaskJob};
pub use terminal::{PlatformState, TerminalSession};
pub use tree::{ElementKind, Hooks, NameIndex, Node, NodeId, Tree};
