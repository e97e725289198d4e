// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Lays out a stream of styled characters into positioned glyphs, with
//! auto-wrap, kinsoku, ruby annotations, and grouping.
//!
//! Grounded on `KText.cpp`'s `CTextBox`: a character list built incrementally
//! by [`TextBox::append_char`], a cursor, a stack of font attributes, a stack
//! of saved cursor positions, and an optional "current group" used to keep a
//! run of characters (e.g. a word that shouldn't be split, or a ruby base)
//! from splitting across a wrap.

use alloc::vec::Vec;

use platform::{BlendMode, SpriteRef};

use crate::renderer::{DrawQueue, SpriteQuad};
use crate::text::glyph_atlas::{Entry as GlyphEntry, GlyphAtlas, GlyphKey, GlyphRasterizer, GlyphStyle};

/// Font/color/spacing attributes applied to characters as they're appended.
/// Pushed and popped as a stack so markup like `[b]...[/b]` can restore the
/// surrounding style on close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attr {
    pub font_id: u32,
    pub size_tenths: u16,
    pub style: GlyphStyle,
    pub with_alpha: bool,
    /// 0xAARRGGBB.
    pub color_argb: u32,
    pub secondary_color_argb: u32,
    /// Extra space added after each glyph's own advance, in the same units.
    pub pitch: f32,
}

impl Default for Attr {
    fn default() -> Self {
        Attr {
            font_id: 0,
            size_tenths: 120,
            style: GlyphStyle::Normal,
            with_alpha: true,
            color_argb: 0xFFFFFFFF,
            secondary_color_argb: 0,
            pitch: 0.0,
        }
    }
}

/// One laid-out character. `pos` is relative to `parent`'s own `pos` if
/// `parent` is `Some`, otherwise it's in the text box's own coordinate space.
#[derive(Debug, Clone)]
pub struct Char {
    pub code: char,
    pub attr: Attr,
    pub glyph: Option<GlyphEntry>,
    pub pos: (f32, f32),
    pub parent: Option<usize>,
    /// Fade-in progress, 0..1, multiplied into the glyph's alpha when
    /// emitting a mesh. Sits outside `Attr` because it's usually animated
    /// per-character rather than set once (e.g. a typewriter reveal effect).
    pub progress: f32,
}

/// Closing punctuation/kana that must not start a line. Intentionally
/// non-exhaustive: the common subset `KText.cpp` itself hardcodes, not a full
/// JIS X 4051 line-break class table.
const LINE_HEAD_FORBIDDEN: &[char] = &[
    ')', ']', '}', '、', '。', ',', '.', '!', '?', '」', '』', '・', 'ー', 'ゃ', 'ゅ', 'ょ', 'っ', 'ぁ', 'ぃ', 'ぅ',
    'ぇ', 'ぉ', 'ャ', 'ュ', 'ョ', 'ッ',
];

/// Opening punctuation that must not end a line.
const LINE_TAIL_FORBIDDEN: &[char] = &['(', '[', '{', '「', '『'];

fn is_line_head_forbidden(c: char) -> bool {
    LINE_HEAD_FORBIDDEN.contains(&c)
}

fn is_line_tail_forbidden(c: char) -> bool {
    LINE_TAIL_FORBIDDEN.contains(&c)
}

/// Positioned, styled text ready to be rendered. See the module documentation.
pub struct TextBox {
    chars: Vec<Char>,
    cursor: (f32, f32),
    attr_stack: Vec<Attr>,
    cursor_stack: Vec<(f32, f32)>,
    current_group: Option<usize>,
    auto_wrap_width: Option<f32>,
    kerning_enabled: bool,
    line_height_override: Option<f32>,
    tallest_since_line_break: f32,
    last_char: Option<(char, Attr)>,
}

impl Default for TextBox {
    fn default() -> Self {
        TextBox::new()
    }
}

impl TextBox {
    pub fn new() -> TextBox {
        TextBox {
            chars: Vec::new(),
            cursor: (0.0, 0.0),
            attr_stack: alloc::vec![Attr::default()],
            cursor_stack: Vec::new(),
            current_group: None,
            auto_wrap_width: None,
            kerning_enabled: true,
            line_height_override: None,
            tallest_since_line_break: 0.0,
            last_char: None,
        }
    }

    pub fn set_auto_wrap_width(&mut self, width: Option<f32>) {
        self.auto_wrap_width = width;
    }

    pub fn set_kerning_enabled(&mut self, enabled: bool) {
        self.kerning_enabled = enabled;
    }

    /// Overrides the line height used by wraps and explicit newlines. `None`
    /// (the default) uses the tallest glyph attribute seen since the last
    /// line break instead.
    pub fn set_line_height(&mut self, height: Option<f32>) {
        self.line_height_override = height;
    }

    pub fn chars(&self) -> &[Char] {
        &self.chars
    }

    pub fn cursor(&self) -> (f32, f32) {
        self.cursor
    }

    /// Pushes a copy of the current attributes, to be restored by [`TextBox::pop_attr`].
    pub fn push_attr(&mut self, attr: Attr) {
        self.attr_stack.push(attr);
    }

    pub fn pop_attr(&mut self) {
        if self.attr_stack.len() > 1 {
            self.attr_stack.pop();
        }
    }

    pub fn current_attr(&self) -> Attr {
        *self.attr_stack.last().unwrap()
    }

    /// Saves the current cursor position, to be restored by [`TextBox::pop_cursor`].
    pub fn push_cursor(&mut self) {
        self.cursor_stack.push(self.cursor);
    }

    pub fn pop_cursor(&mut self) {
        if let Some(pos) = self.cursor_stack.pop() {
            self.cursor = pos;
        }
    }

    /// Opens a group: an invisible anchor character is appended at the
    /// current cursor position, and subsequent characters are stored relative
    /// to it until [`TextBox::end_group`]. A group is never split across a
    /// line wrap; see [`TextBox::append_char`]'s wrap handling.
    pub fn begin_group(&mut self) -> usize {
        let idx = self.chars.len();
        self.chars.push(Char {
            code: '\0',
            attr: self.current_attr(),
            glyph: None,
            pos: self.cursor,
            parent: None,
            progress: 1.0,
        });
        self.current_group = Some(idx);
        idx
    }

    pub fn end_group(&mut self) {
        self.current_group = None;
    }

    fn line_height(&self) -> f32 {
        self.line_height_override.unwrap_or(self.tallest_since_line_break.max(1.0))
    }

    fn newline(&mut self) {
        let height = self.line_height();
        self.cursor.0 = 0.0;
        self.cursor.1 += height;
        self.tallest_since_line_break = 0.0;
    }

    /// Appends one codepoint, running the full layout algorithm: kerning,
    /// glyph lookup, auto-wrap, and cursor advance.
    pub fn append_char(&mut self, c: char, rasterizer: &dyn GlyphRasterizer, atlas: &mut GlyphAtlas) {
        let attr = self.current_attr();

        if self.kerning_enabled {
            if let Some((prev_c, prev_attr)) = self.last_char {
                if prev_attr.font_id == attr.font_id && prev_attr.size_tenths == attr.size_tenths {
                    let k = rasterizer.kerning(attr.font_id, attr.size_tenths, prev_c, c);
                    self.cursor.0 -= k;
                }
            }
        }

        let key = GlyphKey {
            font_id: attr.font_id,
            codepoint: c as u32,
            size_tenths: attr.size_tenths,
            style: attr.style,
            with_alpha: attr.with_alpha,
            primary_argb: attr.color_argb,
            secondary_argb: attr.secondary_color_argb,
        };
        let glyph = atlas.get(key, rasterizer);

        if let Some(wrap_width) = self.auto_wrap_width {
            let right_edge = self.cursor.0 + glyph.map(|g| g.right).unwrap_or(0.0);
            if right_edge > wrap_width {
                self.try_wrap(c);
            }
        }

        if let Some(g) = glyph {
            let glyph_height = g.bottom - g.top;
            if glyph_height > self.tallest_since_line_break {
                self.tallest_since_line_break = glyph_height;
            }
        }

        let pos = match self.current_group {
            Some(anchor) => {
                let anchor_pos = self.chars[anchor].pos;
                (self.cursor.0 - anchor_pos.0, self.cursor.1 - anchor_pos.1)
            }
            None => self.cursor,
        };

        self.chars.push(Char {
            code: c,
            attr,
            glyph,
            pos,
            parent: self.current_group,
            progress: 1.0,
        });

        let advance = (glyph.map(|g| g.advance).unwrap_or(0.0) + attr.pitch).trunc();
        self.cursor.0 += advance;
        self.last_char = Some((c, attr));
    }

    pub fn append_str(&mut self, text: &str, rasterizer: &dyn GlyphRasterizer, atlas: &mut GlyphAtlas) {
        for c in text.chars() {
            self.append_char(c, rasterizer, atlas);
        }
    }

    fn try_wrap(&mut self, c: char) {
        if let Some(anchor) = self.current_group {
            // A group never splits across a wrap: move the cursor and the
            // group's anchor down a line together, atomically.
            let height = self.line_height();
            self.cursor = (0.0, self.cursor.1 + height);
            self.chars[anchor].pos = self.cursor;
            self.tallest_since_line_break = 0.0;
            return;
        }

        if let Some(blank_idx) = self
            .chars
            .iter()
            .enumerate()
            .rev()
            .find(|(_, ch)| ch.parent.is_none() && ch.code == ' ')
            .map(|(idx, _)| idx)
        {
            self.rewrap_from(blank_idx + 1);
            return;
        }

        if is_line_head_forbidden(c) {
            return;
        }
        if let Some((last_c, _)) = self.last_char {
            if is_line_tail_forbidden(last_c) {
                return;
            }
        }
        self.newline();
    }

    /// Moves every top-level (non-grouped) character from `start_index`
    /// onward down by one line, preserving their relative positions, used
    /// when a word-wrap rewinds to the last blank.
    fn rewrap_from(&mut self, start_index: usize) {
        if start_index >= self.chars.len() {
            self.newline();
            return;
        }
        let height = self.line_height();
        let origin = self.chars[start_index].pos;
        let dx = -origin.0;
        let dy = height;
        for ch in &mut self.chars[start_index..] {
            if ch.parent.is_none() {
                ch.pos.0 += dx;
                ch.pos.1 += dy;
            }
        }
        self.cursor.0 += dx;
        self.cursor.1 += dy;
        self.tallest_since_line_break = 0.0;
    }

    fn resolve_position(&self, ch: &Char) -> (f32, f32) {
        match ch.parent {
            Some(parent) => {
                let parent_pos = self.resolve_position(&self.chars[parent]);
                (parent_pos.0 + ch.pos.0, parent_pos.1 + ch.pos.1)
            }
            None => ch.pos,
        }
    }

    /// Bounding box, in the text box's own coordinate space, of every
    /// character belonging to `group` (the index returned by
    /// [`TextBox::begin_group`]).
    fn group_bounds(&self, group: usize) -> Option<(f32, f32, f32, f32)> {
        let mut min_x = f32::MAX;
        let mut max_x = f32::MIN;
        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;
        for ch in self.chars.iter().filter(|ch| ch.parent == Some(group)) {
            let Some(g) = &ch.glyph else { continue };
            if g.u0 == g.u1 {
                continue;
            }
            let abs = self.resolve_position(ch);
            min_x = min_x.min(abs.0 + g.left);
            max_x = max_x.max(abs.0 + g.right);
            min_y = min_y.min(abs.1 + g.top);
            max_y = max_y.max(abs.1 + g.bottom);
        }
        if min_x > max_x {
            None
        } else {
            Some((min_x, min_y, max_x, max_y))
        }
    }

    /// Appends `text` as a ruby annotation above `group` (a group index
    /// returned by [`TextBox::begin_group`]), at `size_tenths`, horizontally
    /// centered against the group's midpoint. No-op if the group is empty or
    /// unknown.
    pub fn set_ruby(
        &mut self,
        group: usize,
        text: &str,
        size_tenths: u16,
        rasterizer: &dyn GlyphRasterizer,
        atlas: &mut GlyphAtlas,
    ) {
        let Some((min_x, min_y, max_x, _max_y)) = self.group_bounds(group) else {
            return;
        };
        let mid_x = (min_x + max_x) / 2.0;

        let mut ruby_attr = self.current_attr();
        ruby_attr.size_tenths = size_tenths;

        let mut measured: Vec<(char, Option<GlyphEntry>)> = Vec::new();
        let mut width = 0.0f32;
        for c in text.chars() {
            let key = GlyphKey {
                font_id: ruby_attr.font_id,
                codepoint: c as u32,
                size_tenths,
                style: ruby_attr.style,
                with_alpha: ruby_attr.with_alpha,
                primary_argb: ruby_attr.color_argb,
                secondary_argb: ruby_attr.secondary_color_argb,
            };
            let glyph = atlas.get(key, rasterizer);
            width += glyph.map(|g| g.advance).unwrap_or(0.0) + ruby_attr.pitch;
            measured.push((c, glyph));
        }

        let ruby_height = size_tenths as f32 / 10.0;
        let start_x = mid_x - width / 2.0;
        let ruby_y = min_y - ruby_height;

        let mut x = start_x;
        for (c, glyph) in measured {
            self.chars.push(Char {
                code: c,
                attr: ruby_attr,
                glyph,
                pos: (x, ruby_y),
                parent: None,
                progress: 1.0,
            });
            x += glyph.map(|g| g.advance).unwrap_or(0.0) + ruby_attr.pitch;
        }
    }

    /// Emits one quad (two triangles, per [`DrawQueue`]'s convention) per
    /// non-empty glyph into `draw_queue`. `sprite_for_page` maps a
    /// [`GlyphAtlas`] page id to the platform sprite it was uploaded as;
    /// `origin` offsets every character's position (e.g. the text box's
    /// on-screen placement).
    pub fn emit_mesh(
        &self,
        origin: (f32, f32),
        draw_order: u8,
        sprite_for_page: &dyn Fn(u32) -> SpriteRef,
        draw_queue: &mut DrawQueue,
    ) {
        for ch in &self.chars {
            let Some(glyph) = &ch.glyph else { continue };
            if glyph.u0 == glyph.u1 || glyph.v0 == glyph.v1 {
                continue;
            }
            let abs = self.resolve_position(ch);
            let left = origin.0 + abs.0 + glyph.left;
            let top = origin.1 + abs.1 + glyph.top;
            let right = origin.0 + abs.0 + glyph.right;
            let bottom = origin.1 + abs.1 + glyph.bottom;

            let [r, g, b, a] = argb_to_rgba_bytes(ch.attr.color_argb);
            let alpha = (a as f32 * ch.progress.clamp(0.0, 1.0)) as u8;

            let _ = draw_queue.sprites.push(SpriteQuad {
                position_top_left: (left, top),
                position_bottom_right: (right, bottom),
                texcoord_top_left: (glyph.u0, glyph.v0),
                texcoord_bottom_right: (glyph.u1, glyph.v1),
                draw_order,
                blend_mode: BlendMode::Blend,
                sprite: sprite_for_page(glyph.page_id),
                color: [r, g, b, alpha],
            });
        }
    }
}

fn argb_to_rgba_bytes(argb: u32) -> [u8; 4] {
    let a = ((argb >> 24) & 0xFF) as u8;
    let r = ((argb >> 16) & 0xFF) as u8;
    let g = ((argb >> 8) & 0xFF) as u8;
    let b = (argb & 0xFF) as u8;
    [r, g, b, a]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::{static_allocator, LinearAllocator};
    use crate::text::glyph_atlas::RasterizedGlyph;

    struct FixedRasterizer {
        glyph_w: u16,
    }

    impl GlyphRasterizer for FixedRasterizer {
        fn rasterize(&self, key: &GlyphKey) -> Option<RasterizedGlyph> {
            if key.codepoint == ' ' as u32 {
                return Some(RasterizedGlyph {
                    width: 0,
                    height: 0,
                    pixels: alloc::vec::Vec::new(),
                    left: 0.0,
                    top: 0.0,
                    right: self.glyph_w as f32,
                    bottom: 0.0,
                    advance: self.glyph_w as f32,
                });
            }
            Some(RasterizedGlyph {
                width: self.glyph_w,
                height: self.glyph_w,
                pixels: alloc::vec![0xFFu8; self.glyph_w as usize * self.glyph_w as usize * 4],
                left: 0.0,
                top: -(self.glyph_w as f32),
                right: self.glyph_w as f32,
                bottom: 0.0,
                advance: self.glyph_w as f32,
            })
        }
    }

    fn atlas(allocator: &'static LinearAllocator) -> GlyphAtlas {
        GlyphAtlas::new(allocator, 8, 512)
    }

    #[test]
    fn appended_chars_advance_the_cursor() {
        let allocator: &LinearAllocator = static_allocator!(1 << 20);
        let mut atlas = atlas(allocator);
        let rasterizer = FixedRasterizer { glyph_w: 10 };
        let mut text = TextBox::new();
        text.append_str("ab", &rasterizer, &mut atlas);
        assert_eq!(2, text.chars().len());
        assert_eq!(20.0, text.cursor().0);
    }

    #[test]
    fn wraps_at_the_last_blank_when_exceeding_width() {
        let allocator: &LinearAllocator = static_allocator!(1 << 20);
        let mut atlas = atlas(allocator);
        let rasterizer = FixedRasterizer { glyph_w: 10 };
        let mut text = TextBox::new();
        text.set_auto_wrap_width(Some(35.0));
        text.append_str("aa bb", &rasterizer, &mut atlas);
        // "bb" should have wrapped down to the next line, at x=0.
        let b_chars: Vec<_> = text.chars().iter().filter(|c| c.code == 'b').collect();
        assert!(b_chars.iter().all(|c| c.pos.1 > 0.0));
        assert_eq!(0.0, b_chars[0].pos.0);
    }

    #[test]
    fn group_moves_atomically_on_wrap() {
        let allocator: &LinearAllocator = static_allocator!(1 << 20);
        let mut atlas = atlas(allocator);
        let rasterizer = FixedRasterizer { glyph_w: 10 };
        let mut text = TextBox::new();
        text.set_auto_wrap_width(Some(15.0));
        let group = text.begin_group();
        text.append_str("xy", &rasterizer, &mut atlas);
        text.end_group();
        // Both glyphs in the group share the anchor's (wrapped) line.
        let anchor_y = text.chars()[group].pos.1;
        assert!(anchor_y > 0.0);
        for ch in text.chars().iter().filter(|c| c.parent == Some(group)) {
            let abs = text.resolve_position(ch);
            assert_eq!(anchor_y, abs.1);
        }
    }

    #[test]
    fn kinsoku_forbids_line_head_punctuation() {
        let allocator: &LinearAllocator = static_allocator!(1 << 20);
        let mut atlas = atlas(allocator);
        let rasterizer = FixedRasterizer { glyph_w: 10 };
        let mut text = TextBox::new();
        text.set_auto_wrap_width(Some(15.0));
        text.append_str("a、", &rasterizer, &mut atlas);
        // The forbidden char must not have started a new line on its own,
        // even though the wrap width is already exceeded by the time it's
        // appended: it stays on the same line as the character before it.
        let punct = text.chars().last().unwrap();
        assert_eq!(text.chars()[0].pos.1, punct.pos.1);
    }

    #[test]
    fn ruby_is_centered_above_its_group() {
        let allocator: &LinearAllocator = static_allocator!(1 << 20);
        let mut atlas = atlas(allocator);
        let rasterizer = FixedRasterizer { glyph_w: 10 };
        let mut text = TextBox::new();
        let group = text.begin_group();
        text.append_str("xy", &rasterizer, &mut atlas);
        text.end_group();
        text.set_ruby(group, "r", 60, &rasterizer, &mut atlas);
        let ruby_char = text.chars().last().unwrap();
        assert!(ruby_char.pos.1 < 0.0);
    }
}
