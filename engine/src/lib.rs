#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[cfg(test)]
mod test_platform;

/// Low-level memory allocators used for all dynamic allocation in the engine.
///
/// The idea is to use any system allocators a few times at startup to create
/// these allocators, and then suballocate from that. This should keep
/// performance characteristics more predictable between different platforms.
pub mod allocators;
/// Asset resolution: named byte blobs served from a chain of providers
/// (plain directory, zip pack, in-memory/embedded).
pub mod assets;
/// Audio playback: the mixer, playable sound buffers, and format decoders.
#[cfg(feature = "audio")]
pub mod audio;
/// Binary container formats: the nestable chunked stream, and zip archives.
pub mod container;
/// Collection types for varying memory access patterns. Backing memory provided
/// by allocators in the [allocators] module.
pub mod collections;
mod engine;
/// Segmented sprite animation curves.
pub mod animation;
/// The fixed-timestep game loop scheduler.
pub mod game_loop;
mod geom;
/// Input events and their translation into game-specific actions.
pub mod input;
/// Low-level graphics-related data structures and functionality.
pub mod renderer;
/// Small self-contained utilities: paths, easing curves, perlin noise, CRC-32.
pub mod support;
/// Glyph atlas, text box layout, and the inline style tag parser.
pub mod text;

pub use engine::{Engine, EngineLimits};
pub use geom::Rect;
