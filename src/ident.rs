//! Client-side identifier generation.
//!
//! Record keys follow the 24-hex ObjectId layout the original ordering app
//! used (4-byte timestamp, 3-byte machine id, 2-byte process id, 3-byte
//! counter), with the non-timestamp segments random-filled. Uniqueness is
//! best-effort; at dashboard scale a collision is an accepted risk.

use rand::Rng;
use uuid::Uuid;

/// Generate a 24-character lowercase hex record id.
pub fn generate_record_id() -> String {
    let timestamp = chrono::Utc::now().timestamp().max(0) as u32;
    let mut rng = rand::thread_rng();
    format!(
        "{timestamp:08x}{:06x}{:04x}{:06x}",
        rng.gen_range(0..0x100_0000u32),
        rng.gen_range(0..0x1_0000u32),
        rng.gen_range(0..0x100_0000u32),
    )
}

/// Generate an uppercase version-4 UUID for a customer that has no prior
/// id on file.
pub fn generate_customer_uuid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}
