//! Fixed-offset time zones resolved from git's `±HHMM` offset tokens.
//!
//! Every commit header carries an offset string. A large history reuses a
//! handful of them, so the parser keeps a [`TimezoneCache`] that hands out a
//! shared [`TimezoneValue`] per distinct string.

use chrono::FixedOffset;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{Result, ScanError};

/// A constant offset from UTC together with its canonical `±HHMM` text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimezoneValue {
    text: String,
    offset: FixedOffset,
}

impl TimezoneValue {
    /// Parse an offset string such as `+0100` or `-0530`.
    ///
    /// The sign applies to both the hour and the minute field, so `-0530`
    /// is five and a half hours west of UTC.
    pub fn parse(offset: &str) -> Result<Self> {
        let bytes = offset.as_bytes();
        let well_formed = bytes.len() == 5
            && matches!(bytes[0], b'+' | b'-')
            && bytes[1..].iter().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(ScanError::MalformedOffset(offset.to_string()));
        }

        let digit = |i: usize| i32::from(bytes[i] - b'0');
        let hours = digit(1) * 10 + digit(2);
        let minutes = digit(3) * 10 + digit(4);
        let sign = if bytes[0] == b'-' { -1 } else { 1 };

        let fixed = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| ScanError::MalformedOffset(offset.to_string()))?;

        Ok(Self {
            text: offset.to_string(),
            offset: fixed,
        })
    }

    /// Render back to the `±HHMM` form this value was resolved from
    pub fn offset_string(&self) -> &str {
        &self.text
    }

    pub fn fixed_offset(&self) -> FixedOffset {
        self.offset
    }
}

impl fmt::Display for TimezoneValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Get-or-insert cache of resolved offsets.
///
/// Entries are created on first use and live as long as the cache. The cache
/// is safe to share between parser threads.
#[derive(Debug, Default)]
pub struct TimezoneCache {
    zones: RwLock<HashMap<String, Arc<TimezoneValue>>>,
}

impl TimezoneCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an offset string, returning the cached instance when the exact
    /// same string was seen before.
    pub fn resolve(&self, offset: &str) -> Result<Arc<TimezoneValue>> {
        {
            let zones = self.zones.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(zone) = zones.get(offset) {
                return Ok(Arc::clone(zone));
            }
        }

        let parsed = TimezoneValue::parse(offset)?;
        let mut zones = self.zones.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have inserted the same offset in between
        let zone = zones
            .entry(offset.to_string())
            .or_insert_with(|| Arc::new(parsed));
        Ok(Arc::clone(zone))
    }

    pub fn len(&self) -> usize {
        self.zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_negative_offset_applies_sign_to_minutes() {
        let tz = TimezoneValue::parse("-0530").unwrap();
        assert_eq!(tz.fixed_offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(tz.offset_string(), "-0530");
    }

    #[test]
    fn test_positive_offset() {
        let tz = TimezoneValue::parse("+0545").unwrap();
        assert_eq!(tz.fixed_offset().local_minus_utc(), 5 * 3600 + 45 * 60);
        assert_eq!(tz.to_string(), "+0545");
    }

    #[test]
    fn test_utc_offset() {
        let tz = TimezoneValue::parse("+0000").unwrap();
        assert_eq!(tz.fixed_offset().local_minus_utc(), 0);
        assert_eq!(tz.fixed_offset(), FixedOffset::east_opt(0).unwrap());
    }

    #[test]
    fn test_malformed_offsets_rejected() {
        for bad in ["", "0000", "+000", "+00000", "*0100", "+01a0", "UTC", " +0100", "+01:00"] {
            match TimezoneValue::parse(bad) {
                Err(ScanError::MalformedOffset(s)) => assert_eq!(s, bad),
                other => panic!("expected MalformedOffset for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_out_of_range_offset_rejected() {
        assert!(matches!(
            TimezoneValue::parse("+2400"),
            Err(ScanError::MalformedOffset(_))
        ));
        assert!(TimezoneValue::parse("-2359").is_ok());
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let cache = TimezoneCache::new();
        let first = cache.resolve("-0500").unwrap();
        let second = cache.resolve("-0500").unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let other = cache.resolve("+0100").unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let cache = TimezoneCache::new();
        assert!(cache.resolve("bogus").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_shared_between_threads() {
        let cache = Arc::new(TimezoneCache::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.resolve("+0200").unwrap())
            })
            .collect();
        let zones: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        for zone in &zones[1..] {
            assert!(Arc::ptr_eq(&zones[0], zone));
        }
    }

    proptest! {
        #[test]
        fn prop_offset_string_roundtrip(s in "[+-](0[0-9]|1[0-9]|2[0-3])[0-5][0-9]") {
            let cache = TimezoneCache::new();
            let tz = cache.resolve(&s).unwrap();
            prop_assert_eq!(tz.offset_string(), s.as_str());

            let again = cache.resolve(tz.offset_string()).unwrap();
            prop_assert_eq!(&*again, &*tz);
        }
    }
}
