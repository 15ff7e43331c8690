pub mod envelope;
pub mod planar;
pub mod plane;
