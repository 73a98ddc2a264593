// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Seed recovery from raw image payloads.
//!
//! Some backends write the generation parameters as JSON text into a PNG
//! metadata chunk. When the request asked for a random seed (`-1`), that chunk
//! is the only place the actual seed shows up. This is a heuristic over an
//! undocumented backend format: absence of a match is normal and never an
//! error.

use regex::bytes::Regex;
use std::sync::LazyLock;

static SEED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""seed":(\d+)"#).expect("seed pattern is valid"));

/// Return the first `"seed":<digits>` value found in `payload`.
///
/// Values that do not fit in a `u64` are ignored.
pub fn extract_seed(payload: &[u8]) -> Option<u64> {
    let captures = SEED_PATTERN.captures(payload)?;
    let digits = std::str::from_utf8(captures.get(1)?.as_bytes()).ok()?;
    digits.parse().ok()
}
