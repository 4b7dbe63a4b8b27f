mod frame;
mod fs;
mod io;
mod polygon;
mod source;
#[cfg(feature = "download")]
mod download;

pub(crate) use frame::*;
pub(crate) use fs::*;
pub(crate) use io::*;
pub(crate) use polygon::*;
pub use source::*;
#[cfg(feature = "download")]
pub use download::*;
