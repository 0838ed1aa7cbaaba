//! Identifier generation.

use uuid::Uuid;

/// Generate a unique, time-sortable identifier.
///
/// Used for run ids, message ids, and tool result ids. UUIDv7 keeps ids
/// ordered by creation time.
pub fn generate_id() -> String {
    Uuid::now_v7().simple().to_string()
}
