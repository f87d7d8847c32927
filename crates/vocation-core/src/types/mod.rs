pub mod batch;
pub mod example;
pub mod matrix;

pub use batch::PaddedBatch;
pub use example::{Example, Partition};
pub use matrix::Matrix;
