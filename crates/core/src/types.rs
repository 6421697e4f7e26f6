/// Resource (browser profile) identifier. Opaque to this service.
pub type ResourceId = String;

/// User identifier supplied by the identity context.
pub type UserId = String;

/// Team identifier supplied by the identity context.
pub type TeamId = String;

/// Fingerprint policy identifier.
pub type PolicyId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
