pub mod folder;
pub mod report;
pub mod service;

pub use folder::*;
pub use report::*;
pub use service::*;
