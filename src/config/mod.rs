pub mod types;
pub mod loader;
pub mod options;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use loader::*;
pub use options::*;
pub use validator::*;
pub use resolved::*;
