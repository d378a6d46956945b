//! Universally unique, lexicographically sortable identifiers (ULID).
//!
//! Layout: a 48-bit millisecond timestamp followed by an 80-bit random
//! payload, rendered as 26 Crockford base-32 characters:
//!
//! ```text
//!  01AN4Z07BY      79KA1307SR9X4MV3
//! |----------|    |----------------|
//!  timestamp          randomness
//!   10 chars           16 chars
//! ```
//!
//! Both parts are rendered most significant digit first, so the string order
//! of two identifiers always equals the order of their `(timestamp, randomness)`
//! pairs. [`MonotonicGenerator`] extends this to identifiers minted within the
//! same millisecond.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::{const_mutex, Mutex};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{LogError, Result};

/// Crockford base-32 alphabet (no I, L, O, U).
const ENCODING: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Largest representable timestamp (2^48 - 1 milliseconds).
pub const TIME_MAX: u64 = (1 << 48) - 1;

/// Largest representable random payload (2^80 - 1).
pub const RANDOM_MAX: u128 = (1 << 80) - 1;

/// Length of the textual form.
pub const ULID_LEN: usize = TIME_LEN + RANDOM_LEN;

const TIME_LEN: usize = 10;
const RANDOM_LEN: usize = 16;

/// Busy-spin iterations before the monotonic generator starts yielding.
const SPIN_LIMIT: u32 = 64;

/// A 128-bit lexicographically sortable identifier.
///
/// Ordering compares the timestamp first, then the random payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ulid {
    timestamp_ms: u64,
    randomness: u128,
}

impl Ulid {
    /// Creates an identifier from its parts.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] if the timestamp exceeds 48 bits or the
    /// randomness exceeds 80 bits.
    pub fn new(timestamp_ms: u64, randomness: u128) -> Result<Self> {
        if timestamp_ms > TIME_MAX {
            return Err(LogError::validation(format!(
                "timestamp must be between 0 and {TIME_MAX}, got {timestamp_ms}"
            )));
        }
        if randomness > RANDOM_MAX {
            return Err(LogError::validation(format!(
                "randomness must be between 0 and {RANDOM_MAX}, got {randomness}"
            )));
        }
        Ok(Self {
            timestamp_ms,
            randomness,
        })
    }

    /// The all-zero identifier.
    #[must_use]
    pub const fn nil() -> Self {
        Self {
            timestamp_ms: 0,
            randomness: 0,
        }
    }

    /// Generates an identifier for the current millisecond with fresh randomness.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            timestamp_ms: now_ms(),
            randomness: random_payload(),
        }
    }

    /// Generates an identifier for a caller-supplied millisecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] if the timestamp exceeds 48 bits.
    pub fn generate_at(timestamp_ms: u64) -> Result<Self> {
        Self::new(timestamp_ms, random_payload())
    }

    /// Generates an identifier for the given instant.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Validation`] for instants before the Unix epoch or
    /// beyond the 48-bit millisecond range.
    pub fn from_datetime(dt: DateTime<Utc>) -> Result<Self> {
        let millis = u64::try_from(dt.timestamp_millis()).map_err(|_| {
            LogError::validation(format!("timestamp before Unix epoch: {dt}"))
        })?;
        Self::generate_at(millis)
    }

    /// Generates the next identifier from the process-wide monotonic generator.
    #[must_use]
    pub fn generate_monotonic() -> Self {
        GLOBAL_GENERATOR.generate()
    }

    /// Returns the millisecond timestamp component.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Returns the 80-bit random component.
    #[must_use]
    pub const fn randomness(&self) -> u128 {
        self.randomness
    }

    /// Returns the timestamp component as a UTC instant.
    #[must_use]
    pub fn datetime(&self) -> DateTime<Utc> {
        i64::try_from(self.timestamp_ms)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_default()
    }

    /// Packs the identifier into a single 128-bit integer.
    #[must_use]
    pub const fn to_u128(&self) -> u128 {
        ((self.timestamp_ms as u128) << 80) | self.randomness
    }

    /// Unpacks an identifier from a 128-bit integer.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            timestamp_ms: (value >> 80) as u64,
            randomness: value & RANDOM_MAX,
        }
    }

    fn encode(&self) -> [u8; ULID_LEN] {
        let mut out = [0u8; ULID_LEN];

        let mut ts = self.timestamp_ms;
        for slot in out[..TIME_LEN].iter_mut().rev() {
            *slot = ENCODING[(ts & 0x1F) as usize];
            ts >>= 5;
        }

        let mut rnd = self.randomness;
        for slot in out[TIME_LEN..].iter_mut().rev() {
            *slot = ENCODING[(rnd & 0x1F) as usize];
            rnd >>= 5;
        }

        out
    }
}

impl Default for Ulid {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        for byte in self.encode() {
            f.write_char(char::from(byte))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ulid({self})")
    }
}

impl FromStr for Ulid {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != ULID_LEN {
            return Err(LogError::validation(format!(
                "ULID must be {ULID_LEN} characters, got {}",
                s.len()
            )));
        }

        let bytes = s.as_bytes();
        let mut timestamp_ms = 0u64;
        for &byte in &bytes[..TIME_LEN] {
            timestamp_ms = (timestamp_ms << 5) | u64::from(decode_digit(byte)?);
        }

        let mut randomness = 0u128;
        for &byte in &bytes[TIME_LEN..] {
            randomness = (randomness << 5) | u128::from(decode_digit(byte)?);
        }

        Self::new(timestamp_ms, randomness)
    }
}

impl Serialize for Ulid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ulid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn decode_digit(byte: u8) -> Result<u8> {
    let upper = byte.to_ascii_uppercase();
    ENCODING
        .iter()
        .position(|&c| c == upper)
        .map(|pos| pos as u8)
        .ok_or_else(|| {
            LogError::validation(format!(
                "invalid ULID character: {:?}",
                char::from(byte)
            ))
        })
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis())
        .unwrap_or(0)
        .min(TIME_MAX)
}

fn random_payload() -> u128 {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes[6..]);
    u128::from_be_bytes(bytes)
}

// ============================================================================
// Monotonic generation
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct MonotonicState {
    issued: bool,
    last_timestamp: u64,
    last_randomness: u128,
}

/// Generator guaranteeing strictly increasing identifiers.
///
/// Within one millisecond the previous payload is incremented instead of
/// redrawn. When the payload is exhausted the generator spins until the clock
/// advances. A clock that steps backwards is clamped to the last issued
/// timestamp. All callers are serialized on a single mutex.
pub struct MonotonicGenerator {
    state: Mutex<MonotonicState>,
}

static GLOBAL_GENERATOR: MonotonicGenerator = MonotonicGenerator::new();

impl Default for MonotonicGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicGenerator {
    /// Creates a generator with no issued identifiers.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: const_mutex(MonotonicState {
                issued: false,
                last_timestamp: 0,
                last_randomness: 0,
            }),
        }
    }

    /// Returns the next identifier using the system clock.
    #[must_use]
    pub fn generate(&self) -> Ulid {
        self.generate_with(now_ms)
    }

    fn generate_with<C: FnMut() -> u64>(&self, mut clock: C) -> Ulid {
        let mut state = self.state.lock();
        let mut timestamp_ms = clock().min(TIME_MAX);
        if state.issued {
            timestamp_ms = timestamp_ms.max(state.last_timestamp);
        }

        let randomness = if state.issued && timestamp_ms == state.last_timestamp {
            if state.last_randomness >= RANDOM_MAX {
                timestamp_ms = wait_for_next_millisecond(state.last_timestamp, &mut clock);
                random_payload()
            } else {
                state.last_randomness + 1
            }
        } else {
            random_payload()
        };

        state.issued = true;
        state.last_timestamp = timestamp_ms;
        state.last_randomness = randomness;

        Ulid {
            timestamp_ms,
            randomness,
        }
    }

    #[cfg(test)]
    fn with_state(last_timestamp: u64, last_randomness: u128) -> Self {
        Self {
            state: const_mutex(MonotonicState {
                issued: true,
                last_timestamp,
                last_randomness,
            }),
        }
    }
}

/// Returns the next identifier from the process-wide monotonic generator.
#[must_use]
pub fn generate_monotonic() -> Ulid {
    GLOBAL_GENERATOR.generate()
}

fn wait_for_next_millisecond<C: FnMut() -> u64>(last: u64, clock: &mut C) -> u64 {
    let mut spins = 0u32;
    loop {
        let now = clock().min(TIME_MAX);
        if now > last {
            return now;
        }
        if spins < SPIN_LIMIT {
            spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use test_case::test_case;

    #[test]
    fn render_is_26_uppercase_chars() {
        let id = Ulid::generate();
        let text = id.to_string();
        assert_eq!(text.len(), ULID_LEN);
        assert_eq!(text, text.to_uppercase());
        assert!(text.bytes().all(|b| ENCODING.contains(&b)));
    }

    #[test]
    fn render_known_values() {
        assert_eq!(Ulid::nil().to_string(), "00000000000000000000000000");

        let max = Ulid::new(TIME_MAX, RANDOM_MAX).expect("max ulid");
        assert_eq!(max.to_string(), "7ZZZZZZZZZZZZZZZZZZZZZZZZZ");

        let one = Ulid::new(1, 1).expect("ulid");
        assert_eq!(one.to_string(), "00000000010000000000000001");
    }

    #[test]
    fn parse_is_case_insensitive() {
        let id = Ulid::new(1_700_000_000_000, 123_456_789).expect("ulid");
        let lower = id.to_string().to_lowercase();
        let parsed: Ulid = lower.parse().expect("parse lowercase");
        assert_eq!(parsed, id);
    }

    #[test_case("0123" ; "too short")]
    #[test_case("000000000000000000000000000" ; "too long")]
    #[test_case("0000000000000000000000000I" ; "ambiguous I")]
    #[test_case("0000000000000000000000000U" ; "excluded U")]
    #[test_case("00000000000000000000000-00" ; "punctuation")]
    #[test_case("80000000000000000000000000" ; "timestamp overflow")]
    fn parse_rejects(input: &str) {
        let result = input.parse::<Ulid>();
        assert!(matches!(result, Err(LogError::Validation(_))));
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert!(matches!(
            Ulid::new(TIME_MAX + 1, 0),
            Err(LogError::Validation(_))
        ));
        assert!(matches!(
            Ulid::new(0, RANDOM_MAX + 1),
            Err(LogError::Validation(_))
        ));
        assert!(Ulid::new(TIME_MAX, RANDOM_MAX).is_ok());
    }

    #[test]
    fn generate_at_uses_given_timestamp() {
        let id = Ulid::generate_at(42).expect("generate");
        assert_eq!(id.timestamp_ms(), 42);
        assert!(id.randomness() <= RANDOM_MAX);
    }

    #[test]
    fn datetime_roundtrip() {
        let dt = DateTime::<Utc>::from_timestamp_millis(1_704_067_200_000).expect("valid instant");
        let id = Ulid::from_datetime(dt).expect("from datetime");
        assert_eq!(id.datetime(), dt);
    }

    #[test]
    fn from_datetime_rejects_pre_epoch() {
        let dt = DateTime::<Utc>::from_timestamp_millis(-1).expect("valid instant");
        assert!(Ulid::from_datetime(dt).is_err());
    }

    #[test]
    fn u128_roundtrip() {
        let id = Ulid::new(987_654_321, RANDOM_MAX - 7).expect("ulid");
        assert_eq!(Ulid::from_u128(id.to_u128()), id);
    }

    #[test]
    fn serde_uses_string_form() {
        let id = Ulid::new(1, 1).expect("ulid");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"00000000010000000000000001\"");
        let back: Ulid = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);

        let bad = serde_json::from_str::<Ulid>("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn monotonic_same_millisecond_increments() {
        let generator = MonotonicGenerator::new();
        let first = generator.generate_with(|| 1_000);
        let second = generator.generate_with(|| 1_000);
        let third = generator.generate_with(|| 1_000);

        assert_eq!(second.timestamp_ms(), 1_000);
        assert_eq!(second.randomness(), first.randomness() + 1);
        assert_eq!(third.randomness(), first.randomness() + 2);
        assert!(first.to_string() < second.to_string());
        assert!(second.to_string() < third.to_string());
    }

    #[test]
    fn monotonic_new_millisecond_redraws() {
        let generator = MonotonicGenerator::with_state(1_000, RANDOM_MAX - 1);
        let next = generator.generate_with(|| 1_001);
        assert_eq!(next.timestamp_ms(), 1_001);
        assert!(next > Ulid::new(1_000, RANDOM_MAX - 1).expect("ulid"));
    }

    #[test]
    fn monotonic_overflow_waits_for_clock() {
        let generator = MonotonicGenerator::with_state(5_000, RANDOM_MAX);
        let mut ticks = 0u32;
        let next = generator.generate_with(|| {
            ticks += 1;
            if ticks < 200 { 5_000 } else { 5_001 }
        });

        assert_eq!(next.timestamp_ms(), 5_001);
        assert!(ticks >= 200);
        assert!(next > Ulid::new(5_000, RANDOM_MAX).expect("ulid"));
    }

    #[test]
    fn monotonic_clamps_backwards_clock() {
        let generator = MonotonicGenerator::with_state(9_000, 10);
        let next = generator.generate_with(|| 8_000);
        assert_eq!(next.timestamp_ms(), 9_000);
        assert_eq!(next.randomness(), 11);
    }

    #[test]
    fn monotonic_sequence_sorts_as_strings() {
        let ids: Vec<String> = (0..2_000).map(|_| generate_monotonic().to_string()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn monotonic_concurrent_callers_stay_ordered() {
        let generator = Arc::new(MonotonicGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..500).map(|_| generator.generate()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            let ids = handle.join().expect("thread join");
            for pair in ids.windows(2) {
                assert!(pair[0] < pair[1]);
                assert!(pair[0].to_string() < pair[1].to_string());
            }
            all.extend(ids);
        }
        assert_eq!(all.len(), 8 * 500);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_ulid() -> impl Strategy<Value = Ulid> {
            (0..=TIME_MAX, 0..=RANDOM_MAX)
                .prop_map(|(ts, rnd)| Ulid::from_u128((u128::from(ts) << 80) | rnd))
        }

        proptest! {
            #[test]
            fn parse_render_roundtrip(id in any_ulid()) {
                let parsed: Ulid = id.to_string().parse().expect("parse");
                prop_assert_eq!(parsed, id);
            }

            #[test]
            fn string_order_matches_pair_order(a in any_ulid(), b in any_ulid()) {
                let pair_order = (a.timestamp_ms(), a.randomness()).cmp(&(b.timestamp_ms(), b.randomness()));
                prop_assert_eq!(a.cmp(&b), pair_order);
                prop_assert_eq!(a.to_string().cmp(&b.to_string()), pair_order);
            }
        }
    }
}
