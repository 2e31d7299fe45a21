pub mod quotation;

pub use quotation::*;
