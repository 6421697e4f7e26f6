pub mod directory_repo;
pub mod lock_repo;
pub mod session_repo;

pub use directory_repo::{FingerprintVersionRepo, PolicyRepo, ResourceRepo};
pub use lock_repo::ResourceLockRepo;
pub use session_repo::SessionSnapshotRepo;
