// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

mod channel;
mod queue;
mod ring_buffer;
mod sparse_array;
mod vec;

pub use channel::channel;
pub use queue::Queue;
pub use ring_buffer::{RingAllocationMetadata, RingBox, RingBuffer, RingSlice};
pub use sparse_array::SparseArray;
pub use vec::FixedVec;
