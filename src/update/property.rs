use crate::foundation::core::{BufferIndex, DoubleBuffered};
use crate::foundation::error::{TableauError, TableauResult};

/// Value carried by an animatable property.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i32),
    Float(f32),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
}

/// Discriminant of a [`PropertyValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PropertyKind {
    Bool,
    Integer,
    Float,
    Vector2,
    Vector3,
    Vector4,
}

impl PropertyValue {
    /// Kind of the stored value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Integer(_) => PropertyKind::Integer,
            Self::Float(_) => PropertyKind::Float,
            Self::Vector2(_) => PropertyKind::Vector2,
            Self::Vector3(_) => PropertyKind::Vector3,
            Self::Vector4(_) => PropertyKind::Vector4,
        }
    }

    /// Scalar view used by notification conditions: floats and integers as-is, vectors by their
    /// first component, booleans as 0 or 1.
    pub fn as_scalar(&self) -> f32 {
        match *self {
            Self::Bool(b) => f32::from(u8::from(b)),
            Self::Integer(i) => i as f32,
            Self::Float(f) => f,
            Self::Vector2(v) => v[0],
            Self::Vector3(v) => v[0],
            Self::Vector4(v) => v[0],
        }
    }

    /// Interpolate towards `to` with progress `t` in `[0, 1]`.
    ///
    /// Booleans and integers step at the end of the interval.
    pub fn lerp(&self, to: &PropertyValue, t: f32) -> TableauResult<PropertyValue> {
        fn mix<const N: usize>(a: [f32; N], b: [f32; N], t: f32) -> [f32; N] {
            std::array::from_fn(|i| a[i] + (b[i] - a[i]) * t)
        }

        Ok(match (*self, *to) {
            (Self::Bool(a), Self::Bool(b)) => Self::Bool(if t >= 1.0 { b } else { a }),
            (Self::Integer(a), Self::Integer(b)) => {
                Self::Integer(if t >= 1.0 { b } else { a })
            }
            (Self::Float(a), Self::Float(b)) => Self::Float(a + (b - a) * t),
            (Self::Vector2(a), Self::Vector2(b)) => Self::Vector2(mix(a, b, t)),
            (Self::Vector3(a), Self::Vector3(b)) => Self::Vector3(mix(a, b, t)),
            (Self::Vector4(a), Self::Vector4(b)) => Self::Vector4(mix(a, b, t)),
            (a, b) => {
                return Err(TableauError::validation(format!(
                    "cannot interpolate {:?} towards {:?}",
                    a.kind(),
                    b.kind()
                )));
            }
        })
    }
}

/// Index of a property within its owner.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct PropertyIndex(pub u32);

const CLEAN_FLAG: u8 = 0x00;
const BAKED_FLAG: u8 = 0x01;
const SET_FLAG: u8 = 0x02;

/// Double-buffered property with a base value.
///
/// `set` writes only the current frame's copy; the base value is restored by
/// [`AnimatableProperty::reset_to_base`] on later frames. `bake` writes the copy and the base.
/// A dirty property needs two resets (one per buffer) after a `set`, one after a `bake`.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatableProperty {
    values: DoubleBuffered<PropertyValue>,
    base: PropertyValue,
    dirty: u8,
    /// Buffer restored by the latest reset since the last write. Several resetters may watch
    /// one property; only the first reset of a frame ages the dirty state.
    reset: Option<BufferIndex>,
}

impl AnimatableProperty {
    /// Property holding `initial` in both buffers and as base value.
    pub fn new(initial: PropertyValue) -> Self {
        Self {
            values: DoubleBuffered::new(initial),
            base: initial,
            dirty: CLEAN_FLAG,
            reset: None,
        }
    }

    /// Current value for `buffer`.
    pub fn get(&self, buffer: BufferIndex) -> PropertyValue {
        *self.values.get(buffer)
    }

    /// Base value restored by resets.
    pub fn base(&self) -> PropertyValue {
        self.base
    }

    /// Kind of value this property accepts.
    pub fn kind(&self) -> PropertyKind {
        self.base.kind()
    }

    /// Write the value for this frame only.
    pub fn set(&mut self, buffer: BufferIndex, value: PropertyValue) -> TableauResult<()> {
        self.check_kind(&value)?;
        self.values.set(buffer, value);
        self.dirty = SET_FLAG;
        self.reset = None;
        Ok(())
    }

    /// Write the value for this frame and make it the new base value.
    pub fn bake(&mut self, buffer: BufferIndex, value: PropertyValue) -> TableauResult<()> {
        self.check_kind(&value)?;
        self.values.set(buffer, value);
        self.base = value;
        self.dirty = BAKED_FLAG;
        self.reset = None;
        Ok(())
    }

    /// Copy the base value into `buffer` when dirty, ageing the dirty state by one frame.
    pub fn reset_to_base(&mut self, buffer: BufferIndex) {
        if self.dirty == CLEAN_FLAG || self.reset == Some(buffer) {
            return;
        }
        self.values.set(buffer, self.base);
        self.dirty >>= 1;
        self.reset = Some(buffer);
    }

    /// `true` once both buffers hold the base value.
    pub fn is_clean(&self) -> bool {
        self.dirty == CLEAN_FLAG
    }

    fn check_kind(&self, value: &PropertyValue) -> TableauResult<()> {
        if value.kind() != self.kind() {
            return Err(TableauError::validation(format!(
                "property expects {:?}, got {:?}",
                self.kind(),
                value.kind()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/update/property.rs"]
mod tests;
