pub mod probe;
pub mod ranges;
pub mod scan;
