mod utils;

mod help;
mod probe;
mod ranges;
mod scan;
