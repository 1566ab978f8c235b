//! Job id generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Bytes of randomness behind a job id.
pub const JOB_ID_LENGTH: usize = 16;

/// Generate a job id: `JOB_ID_LENGTH` bytes from the OS entropy source,
/// uppercase hex.
pub fn generate_job_id() -> String {
    let mut bytes = [0u8; JOB_ID_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}
