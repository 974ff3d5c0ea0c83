pub mod camera;
pub mod cube;
pub mod limiter;
pub mod pipeline;
pub mod rotation;
