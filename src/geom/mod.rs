mod geom;
mod ops;
mod proj;

pub use geom::Geometries;
pub(crate) use ops::*;
pub use proj::{SIRGAS_2000, WGS84, is_geographic, utm_epsg_for};
pub(crate) use proj::reproject_shapes;
