pub mod detr;
pub mod model;
pub mod session;

pub use detr::DetrDetector;
