//! Tests for `vector_view` module

use super::vector_view::*;

#[test]
fn test_fixed_array_view_rows() {
    let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let view = FixedArrayView::new(&data, 2, 3).unwrap();
    assert_eq!(view.len(), 3);
    assert_eq!(view.row(0), &[1.0, 2.0]);
    assert_eq!(view.row(1), &[3.0, 4.0]);
    assert_eq!(view.row(2), &[5.0, 6.0]);
}

#[test]
fn test_fixed_array_view_rejects_wrong_length() {
    let data = vec![1.0, 2.0, 3.0];
    assert!(FixedArrayView::new(&data, 2, 2).is_err());
}

#[test]
fn test_variable_array_view_rows() {
    let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let offsets = vec![0, 2, 2, 5];
    let view = VariableArrayView::new(&data, &offsets, 3).unwrap();
    assert_eq!(view.row(0), &[1.0, 2.0]);
    assert_eq!(view.row(1), &[] as &[f32]);
    assert_eq!(view.row(2), &[3.0, 4.0, 5.0]);
}

#[test]
fn test_variable_array_view_rejects_bad_offsets_len() {
    let data = vec![1.0, 2.0];
    let offsets = vec![0, 2];
    assert!(VariableArrayView::new(&data, &offsets, 3).is_err());
}

#[test]
fn test_variable_array_view_rejects_decreasing_offsets() {
    let data = vec![1.0, 2.0, 3.0];
    let offsets = vec![0, 2, 1];
    assert!(VariableArrayView::new(&data, &offsets, 2).is_err());
}

#[test]
fn test_assert_uniform_dim_ok() {
    let data = vec![1.0, 2.0, 3.0, 4.0];
    let offsets = vec![0, 2, 4];
    let view = VariableArrayView::new(&data, &offsets, 2).unwrap();
    assert!(view.assert_uniform_dim(2).is_ok());
}

#[test]
fn test_assert_uniform_dim_rejects_mismatch() {
    let data = vec![1.0, 2.0, 3.0];
    let offsets = vec![0, 2, 3];
    let view = VariableArrayView::new(&data, &offsets, 2).unwrap();
    assert!(view.assert_uniform_dim(2).is_err());
}

#[test]
fn test_primitive_view() {
    let ids = vec![10_i64, 20, 30];
    let view = PrimitiveView::new(&ids);
    assert_eq!(view.len(), 3);
    assert_eq!(view.as_slice(), &[10, 20, 30]);
}

#[test]
fn test_vector_column_dispatch() {
    let data = vec![1.0, 2.0, 3.0, 4.0];
    let fixed = VectorColumn::Fixed(FixedArrayView::new(&data, 2, 2).unwrap());
    assert_eq!(fixed.len(), 2);
    assert_eq!(fixed.row(1), &[3.0, 4.0]);

    let offsets = vec![0, 2, 4];
    let variable = VectorColumn::Variable(VariableArrayView::new(&data, &offsets, 2).unwrap());
    assert_eq!(variable.len(), 2);
    assert_eq!(variable.row(0), &[1.0, 2.0]);
}
