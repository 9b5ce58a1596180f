use super::*;

const B0: BufferIndex = BufferIndex::ZERO;
const B1: BufferIndex = BufferIndex::ONE;

#[test]
fn set_is_undone_by_two_resets() {
    let mut p = AnimatableProperty::new(PropertyValue::Float(1.0));
    p.set(B0, PropertyValue::Float(5.0)).unwrap();
    assert_eq!(p.get(B0), PropertyValue::Float(5.0));
    assert_eq!(p.base(), PropertyValue::Float(1.0));

    p.reset_to_base(B1);
    assert!(!p.is_clean());
    p.reset_to_base(B0);
    assert!(p.is_clean());
    assert_eq!(p.get(B0), PropertyValue::Float(1.0));
    assert_eq!(p.get(B1), PropertyValue::Float(1.0));
}

#[test]
fn bake_updates_base_and_needs_one_reset() {
    let mut p = AnimatableProperty::new(PropertyValue::Vector3([0.0; 3]));
    p.bake(B0, PropertyValue::Vector3([1.0, 2.0, 3.0])).unwrap();
    assert_eq!(p.base(), PropertyValue::Vector3([1.0, 2.0, 3.0]));

    p.reset_to_base(B1);
    assert!(p.is_clean());
    assert_eq!(p.get(B1), PropertyValue::Vector3([1.0, 2.0, 3.0]));
}

#[test]
fn repeated_reset_of_one_buffer_ages_once() {
    let mut p = AnimatableProperty::new(PropertyValue::Float(0.0));
    p.set(B0, PropertyValue::Float(3.0)).unwrap();

    p.reset_to_base(B1);
    p.reset_to_base(B1);
    assert!(!p.is_clean());
    assert_eq!(p.get(B0), PropertyValue::Float(3.0));

    p.reset_to_base(B0);
    assert!(p.is_clean());
    assert_eq!(p.get(B0), PropertyValue::Float(0.0));
}

#[test]
fn mismatched_kind_is_rejected() {
    let mut p = AnimatableProperty::new(PropertyValue::Float(0.0));
    assert!(p.set(B0, PropertyValue::Bool(true)).is_err());
    assert!(p.bake(B0, PropertyValue::Integer(1)).is_err());
    assert_eq!(p.get(B0), PropertyValue::Float(0.0));
}

#[test]
fn lerp_mixes_components_and_steps_discrete_values() {
    let a = PropertyValue::Vector2([0.0, 10.0]);
    let b = PropertyValue::Vector2([10.0, 20.0]);
    assert_eq!(a.lerp(&b, 0.5).unwrap(), PropertyValue::Vector2([5.0, 15.0]));

    let i0 = PropertyValue::Integer(1);
    let i1 = PropertyValue::Integer(9);
    assert_eq!(i0.lerp(&i1, 0.99).unwrap(), i0);
    assert_eq!(i0.lerp(&i1, 1.0).unwrap(), i1);

    assert!(a.lerp(&i1, 0.5).is_err());
}

#[test]
fn scalar_view_uses_first_component() {
    assert_eq!(PropertyValue::Vector4([3.0, 1.0, 1.0, 1.0]).as_scalar(), 3.0);
    assert_eq!(PropertyValue::Bool(true).as_scalar(), 1.0);
    assert_eq!(PropertyValue::Integer(-2).as_scalar(), -2.0);
}
