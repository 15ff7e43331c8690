pub mod composition;
pub mod elements;
pub mod potentials;
