pub mod voltage;
pub mod volume;
