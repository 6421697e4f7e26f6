pub mod directory;
pub mod lock;
pub mod session;
