use super::*;

#[test]
fn buffer_index_flips_between_two_values() {
    assert_eq!(BufferIndex::ZERO.other(), BufferIndex::ONE);
    assert_eq!(BufferIndex::ONE.other(), BufferIndex::ZERO);
    assert_eq!(BufferIndex::ONE.as_usize(), 1);
}

#[test]
fn double_buffered_copies_are_independent() {
    let mut v = DoubleBuffered::new(1.0_f32);
    v.set(BufferIndex::ONE, 5.0);
    assert_eq!(*v.get(BufferIndex::ZERO), 1.0);
    assert_eq!(*v.get(BufferIndex::ONE), 5.0);

    *v.get_mut(BufferIndex::ZERO) = 2.0;
    assert_eq!(*v.get(BufferIndex::ZERO), 2.0);

    v.set_both(9.0);
    assert_eq!(*v.get(BufferIndex::ZERO), 9.0);
    assert_eq!(*v.get(BufferIndex::ONE), 9.0);
}

#[test]
fn rect_fits_within_edges() {
    assert!(Rect::new(32, 32, 32, 32).fits_within(64, 64));
    assert!(!Rect::new(33, 32, 32, 32).fits_within(64, 64));
    assert!(!Rect::new(u32::MAX, 0, 2, 1).fits_within(64, 64));
    assert!(Rect::from_size(0, 0).fits_within(0, 0));
}

#[test]
fn rect_union_ignores_empty() {
    let a = Rect::new(0, 0, 10, 10);
    assert_eq!(Rect::default().union(a), a);
    assert_eq!(a.union(Rect::new(20, 5, 5, 10)), Rect::new(0, 0, 25, 15));
}

#[test]
fn mip_extent_halves_and_clamps() {
    assert_eq!(mip_extent(64, 32, 0).unwrap(), (64, 32));
    assert_eq!(mip_extent(64, 32, 1).unwrap(), (32, 16));
    assert_eq!(mip_extent(64, 32, 6).unwrap(), (1, 1));
    assert!(mip_extent(64, 32, 40).is_err());
}
