// SPDX-License-Identifier: AGPL-3.0-only

//! Activation clamp

/// `max(x, 0)`, written as a comparison so NaN passes through unchanged.
#[must_use]
pub fn relu(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else {
        x
    }
}
