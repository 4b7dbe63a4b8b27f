use geo::{Area, BooleanOps, Buffer, MultiPolygon, Validation, unary_union};

/// Repair an invalid shape through a self-union; valid shapes are returned unchanged.
pub(crate) fn repair(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if shape.is_valid() {
        return shape.clone();
    }
    unary_union(shape.0.iter())
}

/// Grow `shape` by `distance` CRS units; non-positive distances leave it alone.
pub(crate) fn buffer(shape: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    if distance <= 0.0 || shape.0.is_empty() {
        return shape.clone();
    }
    shape.buffer(distance)
}

/// Area of the overlap between two shapes.
#[inline]
pub(crate) fn intersection_area(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    a.intersection(b).unsigned_area()
}
