//! Product-wide constants.

/// Hours a message lives before it is considered expired, when the sender
/// does not choose a custom expiry.
pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

/// Minutes after creation during which the sender may still edit a message.
pub const EDIT_WINDOW_MINUTES: i64 = 15;

/// Default page size for message pagination.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
