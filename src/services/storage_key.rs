use crate::services::media::AspectLabel;
use rand::{RngCore, rngs::OsRng};

const KEY_ENTROPY_BYTES: usize = 32;

/// Build `<label>/<64 hex chars>.mp4` from 32 bytes of OS randomness.
///
/// Uniqueness rests on the random component alone; no existing-key lookup is
/// performed.
pub fn build_key(label: AspectLabel) -> String {
    let mut bytes = [0u8; KEY_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}/{}.mp4", label, hex::encode(bytes))
}
