pub mod proxy;
pub mod request;
pub mod verdict;
pub mod website;

pub use proxy::*;
pub use request::*;
pub use verdict::*;
pub use website::*;
