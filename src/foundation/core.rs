use crate::foundation::error::{TableauError, TableauResult};

/// Frame-parity index selecting one of the two copies of double-buffered state.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BufferIndex(u8);

impl BufferIndex {
    /// Buffer used for the very first frame.
    pub const ZERO: Self = Self(0);
    /// The other buffer.
    pub const ONE: Self = Self(1);

    /// Index into a two-element array.
    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    /// The buffer that is not `self`.
    pub fn other(self) -> Self {
        Self(self.0 ^ 1)
    }
}

/// Two parity-indexed copies of a per-frame mutable value.
///
/// The update side writes the copy selected by the current [`BufferIndex`] while the previous
/// frame's copy stays readable; copies are never aliased across the parity boundary.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DoubleBuffered<T> {
    values: [T; 2],
}

impl<T: Clone> DoubleBuffered<T> {
    /// Both copies start at `value`.
    pub fn new(value: T) -> Self {
        Self {
            values: [value.clone(), value],
        }
    }

    /// Write `value` into both copies.
    pub fn set_both(&mut self, value: T) {
        self.values[1] = value.clone();
        self.values[0] = value;
    }
}

impl<T> DoubleBuffered<T> {
    /// Read the copy for `buffer`.
    pub fn get(&self, buffer: BufferIndex) -> &T {
        &self.values[buffer.as_usize()]
    }

    /// Mutable access to the copy for `buffer`.
    pub fn get_mut(&mut self, buffer: BufferIndex) -> &mut T {
        &mut self.values[buffer.as_usize()]
    }

    /// Replace the copy for `buffer`.
    pub fn set(&mut self, buffer: BufferIndex, value: T) {
        self.values[buffer.as_usize()] = value;
    }
}

impl<T: Clone + Default> Default for DoubleBuffered<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Integer rectangle in texel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Build a rectangle from origin and size.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether `self` lies entirely inside a `width` x `height` extent.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        let right = u64::from(self.x) + u64::from(self.width);
        let bottom = u64::from(self.y) + u64::from(self.height);
        right <= u64::from(width) && bottom <= u64::from(height)
    }

    /// Smallest rectangle covering both inputs. An empty rectangle is the identity.
    pub fn union(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        Rect::new(x, y, right - x, bottom - y)
    }

    /// `true` when the rectangle covers no texels.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Extent of a mip level: each level halves the base extent, never below one texel.
pub fn mip_extent(width: u32, height: u32, mip_level: u32) -> TableauResult<(u32, u32)> {
    if mip_level >= 32 {
        return Err(TableauError::validation(format!(
            "mip level {mip_level} is out of range"
        )));
    }
    Ok(((width >> mip_level).max(1), (height >> mip_level).max(1)))
}

/// Application-side frame identifier used by frame-rendered/presented callbacks.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameId(pub u32);

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
