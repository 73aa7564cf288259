//! Per-element style bag and its lazy evaluation rules.

use crate::border::BorderGlyphs;
use crate::color::{Rgb, Rgba};
use crate::geometry::FVector3;

/// Lifecycle of a style property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropertyStatus {
    /// Never touched.
    #[default]
    Uninitialized,
    /// Carries a default the user did not choose.
    Initialized,
    /// Carries a user-provided value.
    Value,
}

/// A typed style property with its status.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Property<T> {
    value: T,
    status: PropertyStatus,
}

impl<T> Property<T> {
    /// Create a property holding a default value.
    pub fn initialized(value: T) -> Self {
        Self {
            value,
            status: PropertyStatus::Initialized,
        }
    }

    /// Overwrite with a user-provided value.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.status = PropertyStatus::Value;
    }

    /// Current value.
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Current status.
    pub fn status(&self) -> PropertyStatus {
        self.status
    }

    /// Whether the user provided this value.
    pub fn is_value(&self) -> bool {
        self.status == PropertyStatus::Value
    }
}

/// A numeric style value resolved lazily against the parent context.
#[derive(Clone, Debug, PartialEq)]
pub enum Dimension {
    /// Used as-is.
    Absolute(i32),
    /// Fraction of the parent's extent, resolved with rounding.
    Percentage(f32),
    /// Sum of sub-values, each resolved recursively.
    Additive(Vec<Dimension>),
}

impl Default for Dimension {
    fn default() -> Self {
        Self::Absolute(0)
    }
}

impl Dimension {
    /// Resolve against the parent extent on the matching axis.
    pub fn evaluate(&self, parent_extent: u32) -> i32 {
        match self {
            Self::Absolute(v) => *v,
            Self::Percentage(p) => (p * parent_extent as f32).round_ties_even() as i32,
            Self::Additive(parts) => parts.iter().map(|d| d.evaluate(parent_extent)).sum(),
        }
    }

    /// Whether this value depends on the parent extent.
    pub fn is_percentage(&self) -> bool {
        matches!(self, Self::Percentage(_))
    }

    /// Whether re-evaluation can produce a different result over time.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Absolute(_) => false,
            Self::Percentage(_) => true,
            Self::Additive(parts) => parts.iter().any(Dimension::is_dynamic),
        }
    }
}

/// Horizontal anchoring of content inside an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Anchor {
    /// Content hugs the left edge.
    #[default]
    Left,
    /// Content is centered.
    Center,
    /// Content hugs the right edge.
    Right,
}

/// Direction in which a list view lays out its children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlowDirection {
    /// Children stack left to right.
    Row,
    /// Children stack top to bottom.
    #[default]
    Column,
}

/// Drop-shadow configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    /// Shadow color.
    pub color: Rgb,
    /// Offset and length vector; `z` controls the shadow length.
    pub direction: FVector3,
    /// Strength in `[0, 1]`.
    pub opacity: f32,
    /// Whether the shadow post-process runs at all.
    pub enabled: bool,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: Rgb::BLACK,
            direction: FVector3::new(0.0, 0.0, 0.5),
            opacity: 1.0,
            enabled: false,
        }
    }
}

/// One override tier of the color system. Unset entries fall through to
/// the tier below.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorTier {
    /// Text color override.
    pub text: Option<Rgba>,
    /// Background override.
    pub background: Option<Rgba>,
    /// Border text override.
    pub border: Option<Rgba>,
    /// Border background override.
    pub border_background: Option<Rgba>,
}

/// The style bag of one element.
#[derive(Clone, Debug)]
pub struct Style {
    /// Width, lazily resolved.
    pub width: Property<Dimension>,
    /// Height, lazily resolved.
    pub height: Property<Dimension>,
    /// Horizontal position.
    pub x: Property<Dimension>,
    /// Vertical position.
    pub y: Property<Dimension>,
    /// Painter priority.
    pub z: Property<Dimension>,
    /// Border toggle.
    pub border: Property<bool>,
    /// Border glyph table.
    pub border_glyphs: BorderGlyphs,
    /// Window title drawn into the top border row.
    pub title: String,
    /// Base text color.
    pub text_color: Rgba,
    /// Base background color.
    pub background_color: Rgba,
    /// Base border text color.
    pub border_color: Rgba,
    /// Base border background color.
    pub border_background_color: Rgba,
    /// Hover tier overrides.
    pub hover: ColorTier,
    /// Focus tier overrides.
    pub focus: ColorTier,
    /// Content anchoring.
    pub anchor: Anchor,
    /// Flow direction for list-like containers.
    pub flow: FlowDirection,
    /// When set, children are not clipped to the content box.
    pub allow_overflow: bool,
    /// When set, the element grows to fit its children.
    pub allow_dynamic_size: bool,
    /// Overflow wrapping toggle for list layouts.
    pub wrap: bool,
    /// Element opacity in `[0, 1]`.
    pub opacity: f32,
    /// Drop shadow.
    pub shadow: Shadow,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            width: Property::initialized(Dimension::Absolute(1)),
            height: Property::initialized(Dimension::Absolute(1)),
            x: Property::initialized(Dimension::Absolute(0)),
            y: Property::initialized(Dimension::Absolute(0)),
            z: Property::initialized(Dimension::Absolute(0)),
            border: Property::initialized(false),
            border_glyphs: BorderGlyphs::SINGLE_LINE,
            title: String::new(),
            text_color: Rgba::opaque(Rgb::WHITE),
            background_color: Rgba::opaque(Rgb::BLACK),
            border_color: Rgba::opaque(Rgb::WHITE),
            border_background_color: Rgba::opaque(Rgb::BLACK),
            hover: ColorTier::default(),
            focus: ColorTier::default(),
            anchor: Anchor::default(),
            flow: FlowDirection::default(),
            allow_overflow: false,
            allow_dynamic_size: false,
            wrap: false,
            opacity: 1.0,
            shadow: Shadow::default(),
        }
    }
}

impl Style {
    /// Set the width. A percentage width disables dynamic sizing; the two
    /// policies are mutually exclusive.
    pub fn set_width(&mut self, width: Dimension) {
        if width.is_percentage() {
            self.allow_dynamic_size = false;
        }
        self.width.set(width);
    }

    /// Set the height, with the same exclusivity rule as [`Self::set_width`].
    pub fn set_height(&mut self, height: Dimension) {
        if height.is_percentage() {
            self.allow_dynamic_size = false;
        }
        self.height.set(height);
    }

    /// Enable or disable dynamic sizing. Enabling it drops percentage
    /// dimensions back to their current absolute resolution on next embed.
    pub fn set_allow_dynamic_size(&mut self, allow: bool) {
        if allow {
            if self.width.get().is_percentage() {
                self.width.set(Dimension::Absolute(0));
            }
            if self.height.get().is_percentage() {
                self.height.set(Dimension::Absolute(0));
            }
        }
        self.allow_dynamic_size = allow;
    }

    /// Compose the effective text colors for the given interaction state.
    ///
    /// Focus wins over hover, hover over base; unset tier entries fall
    /// through.
    pub fn compose_text_colors(&self, focused: bool, hovered: bool) -> (Rgba, Rgba) {
        let fg = self.compose(focused, hovered, |t| t.text, self.text_color);
        let bg = self.compose(focused, hovered, |t| t.background, self.background_color);
        (fg, bg)
    }

    /// Compose the effective border colors for the given interaction state.
    pub fn compose_border_colors(&self, focused: bool, hovered: bool) -> (Rgba, Rgba) {
        let fg = self.compose(focused, hovered, |t| t.border, self.border_color);
        let bg = self.compose(
            focused,
            hovered,
            |t| t.border_background,
            self.border_background_color,
        );
        (fg, bg)
    }

    fn compose(
        &self,
        focused: bool,
        hovered: bool,
        pick: impl Fn(&ColorTier) -> Option<Rgba>,
        base: Rgba,
    ) -> Rgba {
        if focused
            && let Some(c) = pick(&self.focus)
        {
            return c;
        }
        if (focused || hovered)
            && let Some(c) = pick(&self.hover)
        {
            return c;
        }
        base
    }

    /// Whether the border is enabled.
    pub fn has_border(&self) -> bool {
        *self.border.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_evaluates_as_is() {
        assert_eq!(Dimension::Absolute(7).evaluate(100), 7);
    }

    #[test]
    fn percentage_rounds_against_parent() {
        assert_eq!(Dimension::Percentage(0.5).evaluate(21), 10);
        assert_eq!(Dimension::Percentage(0.25).evaluate(100), 25);
    }

    #[test]
    fn additive_sums_recursively() {
        let d = Dimension::Additive(vec![
            Dimension::Absolute(3),
            Dimension::Percentage(0.1),
            Dimension::Additive(vec![Dimension::Absolute(2)]),
        ]);
        assert_eq!(d.evaluate(100), 15);
        assert!(d.is_dynamic());
    }

    #[test]
    fn property_status_progression() {
        let mut p: Property<Dimension> = Property::initialized(Dimension::Absolute(1));
        assert_eq!(p.status(), PropertyStatus::Initialized);
        assert!(!p.is_value());
        p.set(Dimension::Absolute(5));
        assert!(p.is_value());
    }

    #[test]
    fn percentage_disables_dynamic_size() {
        let mut s = Style::default();
        s.set_allow_dynamic_size(true);
        assert!(s.allow_dynamic_size);
        s.set_width(Dimension::Percentage(0.5));
        assert!(!s.allow_dynamic_size);
    }

    #[test]
    fn dynamic_size_drops_percentages() {
        let mut s = Style::default();
        s.set_width(Dimension::Percentage(0.5));
        s.set_allow_dynamic_size(true);
        assert!(!s.width.get().is_percentage());
        assert!(s.allow_dynamic_size);
    }

    #[test]
    fn color_tiers_fall_through() {
        let mut s = Style::default();
        let base = s.text_color;
        let hover = Rgba::new(1, 1, 1, 255);
        let focus = Rgba::new(2, 2, 2, 255);

        assert_eq!(s.compose_text_colors(false, false).0, base);

        s.hover.text = Some(hover);
        assert_eq!(s.compose_text_colors(false, true).0, hover);
        // Focused with no focus override falls through to hover.
        assert_eq!(s.compose_text_colors(true, false).0, hover);

        s.focus.text = Some(focus);
        assert_eq!(s.compose_text_colors(true, false).0, focus);
        assert_eq!(s.compose_text_colors(false, true).0, hover);
    }

    #[test]
    fn border_colors_compose_independently() {
        let mut s = Style::default();
        s.focus.border = Some(Rgba::new(9, 9, 9, 255));
        let (fg, bg) = s.compose_border_colors(true, false);
        assert_eq!(fg, Rgba::new(9, 9, 9, 255));
        assert_eq!(bg, s.border_background_color);
    }

    #[test]
    fn setting_same_width_keeps_value_status() {
        let mut s = Style::default();
        s.set_width(Dimension::Absolute(10));
        s.set_width(Dimension::Absolute(10));
        assert!(s.width.is_value());
        assert_eq!(s.width.get().evaluate(0), 10);
    }
}
