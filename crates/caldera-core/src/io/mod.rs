pub mod atomic;
pub mod fits;
pub mod image_io;
pub mod loader;
