/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Avatar used when a profile has none; `{id}` is replaced by the subject id
pub const DEFAULT_AVATAR_TEMPLATE: &str = "https://picsum.photos/seed/{id}/40/40";
