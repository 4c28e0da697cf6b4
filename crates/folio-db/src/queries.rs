//! Query methods on [`crate::Database`], one module per table group.

pub mod comments;
pub mod favorites;
pub mod images;
pub mod media;
pub mod messages;
pub mod password_resets;
pub mod profiles;
pub mod projects;
pub mod threads;
pub mod users;

/// `?{start}, ?{start+1}, ...` for an `IN (...)` list of `count` items.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
