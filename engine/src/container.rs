// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Binary container formats: the nestable tag/size/data chunk stream, and the
//! full ZIP reader/writer.

pub mod chunked;

#[cfg(feature = "zip")]
pub mod zip;
