pub mod characterize;
pub mod combine;
pub mod config;
pub mod consts;
pub mod error;
pub mod frame;
pub mod io;
pub mod master;
pub mod progress;
pub mod source;
pub mod stats;
pub mod store;
