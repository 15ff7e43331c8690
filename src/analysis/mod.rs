pub mod distance;
pub mod hull;
