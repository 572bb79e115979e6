use time::UtcOffset;

/// Create a UtcOffset from whole hours, falling back to UTC when out of range.
///
/// # Examples
///
/// ```
/// use logger::{UtcOffset, utc_offset_hours};
///
/// assert_eq!(utc_offset_hours(7).whole_hours(), 7); // UTC+7 (Jakarta, Bangkok)
/// assert_eq!(utc_offset_hours(99), UtcOffset::UTC);
/// ```
pub fn utc_offset_hours(hours: i8) -> UtcOffset {
    UtcOffset::from_hms(hours, 0, 0).unwrap_or(UtcOffset::UTC)
}

/// Resolve the configured timezone offset, `None` meaning UTC.
pub fn resolve_offset(hours: Option<i8>) -> UtcOffset {
    hours.map(utc_offset_hours).unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_offset() {
        assert_eq!(resolve_offset(None), UtcOffset::UTC);
        assert_eq!(resolve_offset(Some(-3)).whole_hours(), -3);
        assert_eq!(resolve_offset(Some(i8::MAX)), UtcOffset::UTC);
    }
}
