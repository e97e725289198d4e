// SPDX-FileCopyrightText: 2025 Jens Pitkänen <jens.pitkanen@helsinki.fi>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Segmented sprite animation curves.
//!
//! Grounded on `GameAnimationCurve.cpp`'s `SpriteAnimationCurve`: a sequence
//! of segments, each assigning a sprite name/label/command per layer, played
//! back by frame number.

use alloc::string::String;
use alloc::vec::Vec;

/// One layer's assignment within a segment: which sprite to show, an
/// optional label (used for variant lookups by the game), and an opaque
/// command string.
///
/// `command` is never parsed by this engine; `GameAnimationCurve.cpp`'s own
/// interpretation of these strings (e.g. `"blend=screen"`) is commented out
/// in the source it's grounded on, so the engine hands the string to the
/// caller of [`AnimationCurve::animate`] unexamined.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub sprite: String,
    pub label: String,
    pub command: String,
}

/// One segment of an [`AnimationCurve`]: a fixed duration, a name (for
/// [`AnimationCurve::frame_by_label`] lookups), a layer stack, and free-form
/// key/value parameters a game can read in [`AnimationCurve::user_parameters`].
#[derive(Debug, Clone, Default)]
pub struct Segment {
    pub duration_frames: u32,
    pub name: String,
    pub layers: Vec<Layer>,
    pub user_parameters: Vec<(String, String)>,
}

/// Target a [`Segment`]'s layer assignments are applied to by
/// [`AnimationCurve::animate`].
///
/// A capability set rather than a concrete sprite renderer: the engine core
/// has no entity/component system of its own, so whatever owns sprite state
/// for a given entity implements this.
pub trait AnimationTarget {
    /// Grows or shrinks the number of layers to exactly `count`, matching
    /// `SpriteAnimationCurve::start`'s layer-count reset (so a page with
    /// fewer layers than a previous one doesn't leave stale layers behind).
    fn set_layer_count(&mut self, count: usize);
    /// Assigns the sprite and label shown at `layer`.
    fn set_layer(&mut self, layer: usize, sprite: &str, label: &str);
}

/// A sequence of segments played back by frame number. See spec component
/// 4.K.
#[derive(Debug, Clone, Default)]
pub struct AnimationCurve {
    segments: Vec<Segment>,
}

impl AnimationCurve {
    pub fn new() -> AnimationCurve {
        AnimationCurve {
            segments: Vec::new(),
        }
    }

    /// Appends a segment to the end of the curve.
    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total duration across all segments, in frames.
    pub fn duration_frames(&self) -> u32 {
        self.segments.iter().map(|s| s.duration_frames).sum()
    }

    /// The highest layer count used by any segment. Used by
    /// [`AnimationCurve::animate`]'s callers to size a sprite renderer up
    /// front so playback never needs to grow it mid-curve.
    pub fn max_layer_count(&self) -> usize {
        self.segments.iter().map(|s| s.layers.len()).max().unwrap_or(0)
    }

    /// Returns the index of the segment whose cumulative frame range
    /// contains `frame`. Frames past the curve's end clamp to the last
    /// segment; an empty curve returns 0.
    pub fn segment_index_by_frame(&self, frame: u32) -> usize {
        let mut pos = 0u32;
        for (i, segment) in self.segments.iter().enumerate() {
            if frame < pos + segment.duration_frames {
                return i;
            }
            pos += segment.duration_frames;
        }
        self.segments.len().saturating_sub(1)
    }

    /// Returns the frame at which the segment named `label` starts, or
    /// `None` if no segment has that name.
    pub fn frame_by_label(&self, label: &str) -> Option<u32> {
        let mut pos = 0u32;
        for segment in &self.segments {
            if segment.name == label {
                return Some(pos);
            }
            pos += segment.duration_frames;
        }
        None
    }

    /// Applies the segment active at `frame` to `target`: sets its layer
    /// count to that segment's layer count, then assigns each layer's
    /// sprite and label.
    pub fn animate(&self, target: &mut dyn AnimationTarget, frame: u32) {
        let Some(segment) = self.segments.get(self.segment_index_by_frame(frame)) else {
            return;
        };
        target.set_layer_count(segment.layers.len());
        for (i, layer) in segment.layers.iter().enumerate() {
            target.set_layer(i, &layer.sprite, &layer.label);
        }
    }

    /// Free-form parameters attached to the segment active at `frame`.
    pub fn user_parameters(&self, frame: u32) -> &[(String, String)] {
        match self.segments.get(self.segment_index_by_frame(frame)) {
            Some(segment) => &segment.user_parameters,
            None => &[],
        }
    }

    /// Renders the curve into the textual dump format used for round-tripping
    /// test data: one `Page[i] { Name:, Dur:, Layer[j] {...} }` block per
    /// segment.
    pub fn export(&self) -> String {
        let mut out = String::new();
        out.push_str(&alloc::format!("TimeLength: {}\n", self.duration_frames()));
        out.push_str(&alloc::format!("Num pages: {}\n", self.segments.len()));
        for (i, segment) in self.segments.iter().enumerate() {
            out.push_str(&alloc::format!("Page[{i}] {{\n"));
            out.push_str(&alloc::format!("\tName: {}\n", segment.name));
            out.push_str(&alloc::format!("\tDur : {}\n", segment.duration_frames));
            for (j, layer) in segment.layers.iter().enumerate() {
                out.push_str(&alloc::format!("\tLayer[{j}]\n"));
                out.push_str(&alloc::format!("\t\tSprite : {}\n", layer.sprite));
                out.push_str(&alloc::format!("\t\tLabel  : {}\n", layer.label));
                out.push_str(&alloc::format!("\t\tCommand: {}\n", layer.command));
                out.push_str("\t\tParams {\n");
                for (key, value) in &segment.user_parameters {
                    out.push_str(&alloc::format!("\t\t\t{key}: {value}\n"));
                }
                out.push_str("\t\t} // Params\n");
                out.push_str("\t} // Layer\n");
            }
            out.push_str("} // Page\n");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::{AnimationCurve, AnimationTarget, Layer, Segment};
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    fn segment(name: &str, duration: u32, sprites: &[&str]) -> Segment {
        Segment {
            duration_frames: duration,
            name: name.to_string(),
            layers: sprites
                .iter()
                .map(|s| Layer {
                    sprite: s.to_string(),
                    label: String::new(),
                    command: String::new(),
                })
                .collect(),
            user_parameters: Vec::new(),
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        layer_count: usize,
        sprites: Vec<String>,
    }

    impl AnimationTarget for RecordingTarget {
        fn set_layer_count(&mut self, count: usize) {
            self.layer_count = count;
            self.sprites.clear();
            self.sprites.resize(count, String::new());
        }
        fn set_layer(&mut self, layer: usize, sprite: &str, _label: &str) {
            self.sprites[layer] = sprite.to_string();
        }
    }

    #[test]
    fn segment_index_follows_cumulative_duration() {
        let mut curve = AnimationCurve::new();
        curve.add_segment(segment("idle", 3, &["idle_0"]));
        curve.add_segment(segment("walk", 5, &["walk_0"]));

        assert_eq!(0, curve.segment_index_by_frame(0));
        assert_eq!(0, curve.segment_index_by_frame(2));
        assert_eq!(1, curve.segment_index_by_frame(3));
        assert_eq!(1, curve.segment_index_by_frame(7));
        // past the end clamps to the last segment
        assert_eq!(1, curve.segment_index_by_frame(100));
    }

    #[test]
    fn animate_applies_the_active_segments_layers() {
        let mut curve = AnimationCurve::new();
        curve.add_segment(segment("idle", 2, &["idle_a", "idle_b"]));
        curve.add_segment(segment("walk", 2, &["walk_a"]));

        let mut target = RecordingTarget::default();
        curve.animate(&mut target, 0);
        assert_eq!(2, target.layer_count);
        assert_eq!(vec!["idle_a".to_string(), "idle_b".to_string()], target.sprites);

        curve.animate(&mut target, 2);
        assert_eq!(1, target.layer_count);
        assert_eq!(vec!["walk_a".to_string()], target.sprites);
    }

    #[test]
    fn frame_by_label_finds_segment_start() {
        let mut curve = AnimationCurve::new();
        curve.add_segment(segment("idle", 4, &["idle_0"]));
        curve.add_segment(segment("walk", 6, &["walk_0"]));

        assert_eq!(Some(0), curve.frame_by_label("idle"));
        assert_eq!(Some(4), curve.frame_by_label("walk"));
        assert_eq!(None, curve.frame_by_label("run"));
    }

    #[test]
    fn max_layer_count_is_the_largest_segment() {
        let mut curve = AnimationCurve::new();
        curve.add_segment(segment("a", 1, &["x"]));
        curve.add_segment(segment("b", 1, &["x", "y", "z"]));
        assert_eq!(3, curve.max_layer_count());
    }

    #[test]
    fn export_includes_page_and_layer_structure() {
        let mut curve = AnimationCurve::new();
        curve.add_segment(segment("idle", 4, &["idle_0"]));
        let text = curve.export();
        assert!(text.contains("Page[0]"));
        assert!(text.contains("Name: idle"));
        assert!(text.contains("Dur : 4"));
        assert!(text.contains("Sprite : idle_0"));
    }
}
