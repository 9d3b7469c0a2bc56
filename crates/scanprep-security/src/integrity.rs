// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page integrity: SHA-256 digests over decoded pixels.

use scanprep_core::error::{Result, ScanprepError};
use scanprep_imaging::PageImage;
use sha2::{Digest, Sha256};

/// SHA-256 of `data` as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of a page's geometry and raw samples.
///
/// Width, height and channel count are hashed ahead of the pixels, so two
/// pages with the same bytes laid out differently never collide.
pub fn page_digest(image: &PageImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update([image.channels()]);
    hasher.update(image.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a page against a digest recorded earlier.
pub fn verify_page(image: &PageImage, expected_hex: &str) -> Result<()> {
    let actual = page_digest(image);
    if actual == expected_hex {
        Ok(())
    } else {
        Err(ScanprepError::IntegrityMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}
