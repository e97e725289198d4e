// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Glyph caching, text layout, and markup parsing.

pub mod glyph_atlas;
pub mod text_box;
pub mod text_parser;

pub use glyph_atlas::{Entry as GlyphEntry, GlyphAtlas, GlyphKey, GlyphRasterizer, GlyphStyle, RasterizedGlyph};
pub use text_box::{Attr as TextAttr, Char as TextChar, TextBox};
pub use text_parser::{StyleId, StyleToken, TextParser, TextParserSink};
