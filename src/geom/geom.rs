use geo::{Area, BoundingRect, Coord, MultiPolygon, Rect, unary_union};
use rstar::{AABB, RTree, primitives::{GeomWithData, Rectangle}};

/// Bounding box of one shape, tagged with the shape's index.
type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, usize>;

#[inline]
fn corners(rect: &Rect<f64>) -> ([f64; 2], [f64; 2]) {
    (rect.min().into(), rect.max().into())
}

/// A list of polygons tagged with their CRS and indexed by bounding box.
#[derive(Debug, Clone)]
pub struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<IndexedBox>,
    epsg: u32,
}

impl Geometries {
    /// Index `shapes`, which are expressed in EPSG:`epsg`. Empty shapes are kept but never indexed.
    pub fn new(shapes: Vec<MultiPolygon<f64>>, epsg: u32) -> Self {
        Self {
            rtree: RTree::bulk_load(
                shapes.iter().enumerate()
                    .filter_map(|(i, shape)| {
                        let (lo, hi) = corners(&shape.bounding_rect()?);
                        Some(IndexedBox::new(Rectangle::from_corners(lo, hi), i))
                    })
                    .collect()
            ),
            shapes,
            epsg,
        }
    }

    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn into_shapes(self) -> Vec<MultiPolygon<f64>> { self.shapes }

    #[inline] pub fn epsg(&self) -> u32 { self.epsg }

    /// Indices of shapes whose bounding box intersects `rect`.
    pub fn candidates(&self, rect: &Rect<f64>) -> impl Iterator<Item = usize> + '_ {
        let (lo, hi) = corners(rect);
        self.rtree.locate_in_envelope_intersecting(&AABB::from_corners(lo, hi)).map(|entry| entry.data)
    }

    /// Bounding rectangle of all shapes.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes.iter()
            .filter_map(|shape| shape.bounding_rect())
            .reduce(|a, b| Rect::new(
                Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
            ))
    }

    /// Planar area of each shape, in CRS units squared.
    pub fn areas(&self) -> Vec<f64> {
        self.shapes.iter().map(|shape| shape.unsigned_area()).collect()
    }

    /// Dissolve all shapes into one multipolygon.
    pub fn union(&self) -> MultiPolygon<f64> {
        unary_union(self.shapes.iter().flat_map(|shape| shape.0.iter()))
    }

    /// Shapes at `indices`, in that order, in the same CRS.
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self::new(indices.iter().map(|&i| self.shapes[i].clone()).collect(), self.epsg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Polygon, Rect, coord};

    fn square(x: f64, y: f64, size: f64) -> MultiPolygon<f64> {
        let rect = Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size });
        MultiPolygon::new(vec![rect.to_polygon()])
    }

    #[test]
    fn candidates_skip_empty_shapes() {
        let geoms = Geometries::new(vec![
            square(0.0, 0.0, 1.0),
            MultiPolygon::<f64>::new(Vec::<Polygon<f64>>::new()),
            square(5.0, 5.0, 1.0),
        ], 31983);

        let query = Rect::new(coord! { x: 0.5, y: 0.5 }, coord! { x: 5.5, y: 5.5 });
        let mut hits = geoms.candidates(&query).collect::<Vec<_>>();
        hits.sort();

        assert_eq!(hits, vec![0, 2]);
        assert_eq!(geoms.len(), 3);
    }

    #[test]
    fn union_dissolves_touching_squares() {
        let geoms = Geometries::new(vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)], 31983);
        let union = geoms.union();
        assert!((union.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(union.0.len(), 1);
    }
}
