use std::fmt;
use std::time::Duration;

/// Parse a duration made of chained `<integer><unit>` components, such as
/// `"3s"`, `"1m30s"` or `"1h 5m"`.
///
/// Supported units are `ms`, `s`, `m`, `h` and `d`. Components may be
/// separated by whitespace or underscores and each unit may appear once.
/// A zero total is accepted; callers decide whether it is meaningful.
pub fn parse_duration(value: &str) -> Result<Duration, DurationParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let bytes = trimmed.as_bytes();
    let mut index = 0usize;
    let mut seen = [false; Unit::ALL.len()];
    let mut total_millis: u128 = 0;

    while index < bytes.len() {
        if bytes[index] == b'_' || bytes[index].is_ascii_whitespace() {
            index += 1;
            continue;
        }

        let start = index;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }
        if start == index {
            return Err(DurationParseError::ExpectedNumber {
                index,
                found: trimmed[index..].chars().next(),
            });
        }
        let number: u128 = trimmed[start..index]
            .parse()
            .map_err(|_| DurationParseError::TooLarge)?;

        let unit = Unit::ALL
            .into_iter()
            .find(|unit| trimmed[index..].starts_with(unit.symbol()))
            .ok_or_else(|| DurationParseError::ExpectedUnit {
                index,
                found: trimmed[index..].chars().next(),
            })?;
        index += unit.symbol().len();

        if std::mem::replace(&mut seen[unit as usize], true) {
            return Err(DurationParseError::DuplicateUnit { unit });
        }

        total_millis = number
            .checked_mul(unit.millis())
            .and_then(|component| total_millis.checked_add(component))
            .ok_or(DurationParseError::TooLarge)?;
    }

    if !seen.contains(&true) {
        return Err(DurationParseError::Empty);
    }

    u64::try_from(total_millis)
        .map(Duration::from_millis)
        .map_err(|_| DurationParseError::TooLarge)
}

/// Parse a tone length, which must be a whole number of seconds.
pub fn parse_whole_seconds(value: &str) -> Result<u32, DurationParseError> {
    let duration = parse_duration(value)?;
    if duration.subsec_nanos() != 0 {
        return Err(DurationParseError::FractionalSeconds);
    }
    u32::try_from(duration.as_secs()).map_err(|_| DurationParseError::TooLarge)
}

/// Parse a timeout, which must be greater than zero.
pub fn parse_timeout(value: &str) -> Result<Duration, DurationParseError> {
    let duration = parse_duration(value)?;
    if duration.is_zero() {
        return Err(DurationParseError::Zero);
    }
    Ok(duration)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    Empty,
    ExpectedNumber { index: usize, found: Option<char> },
    ExpectedUnit { index: usize, found: Option<char> },
    DuplicateUnit { unit: Unit },
    FractionalSeconds,
    Zero,
    TooLarge,
}

impl std::error::Error for DurationParseError {}

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationParseError::Empty => write!(f, "duration cannot be empty"),
            DurationParseError::ExpectedNumber { index, found: Some(ch) } => write!(
                f,
                "expected a number at position {} but found '{}'",
                index + 1,
                ch
            ),
            DurationParseError::ExpectedNumber { index, found: None } => {
                write!(f, "expected a number at position {}", index + 1)
            }
            DurationParseError::ExpectedUnit { index, found: Some(ch) } => write!(
                f,
                "expected a unit (ms, s, m, h, d) at position {} but found '{}'",
                index + 1,
                ch
            ),
            DurationParseError::ExpectedUnit { index, found: None } => {
                write!(f, "expected a unit (ms, s, m, h, d) at position {}", index + 1)
            }
            DurationParseError::DuplicateUnit { unit } => {
                write!(f, "unit '{}' appears more than once", unit.symbol())
            }
            DurationParseError::FractionalSeconds => {
                write!(f, "duration must be a whole number of seconds")
            }
            DurationParseError::Zero => write!(f, "duration must be greater than zero"),
            DurationParseError::TooLarge => write!(f, "duration is too large"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Unit {
    Millisecond = 0,
    Second = 1,
    Minute = 2,
    Hour = 3,
    Day = 4,
}

impl Unit {
    // `ms` must be tried before `m`.
    const ALL: [Unit; 5] = [
        Unit::Millisecond,
        Unit::Second,
        Unit::Minute,
        Unit::Hour,
        Unit::Day,
    ];

    fn millis(self) -> u128 {
        match self {
            Unit::Millisecond => 1,
            Unit::Second => 1_000,
            Unit::Minute => 60_000,
            Unit::Hour => 3_600_000,
            Unit::Day => 86_400_000,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Unit::Millisecond => "ms",
            Unit::Second => "s",
            Unit::Minute => "m",
            Unit::Hour => "h",
            Unit::Day => "d",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_chained_components() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration(" 1h 5m ").unwrap(), Duration::from_secs(3_900));
        assert_eq!(parse_duration("1d_1s").unwrap(), Duration::from_secs(86_401));
    }

    #[test]
    fn accepts_zero_duration() {
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_whole_seconds("0s").unwrap(), 0);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_duration(""), Err(DurationParseError::Empty));
        assert!(matches!(
            parse_duration("10"),
            Err(DurationParseError::ExpectedUnit { found: None, .. })
        ));
        assert!(matches!(
            parse_duration("5x"),
            Err(DurationParseError::ExpectedUnit { found: Some('x'), .. })
        ));
        assert!(matches!(
            parse_duration("s"),
            Err(DurationParseError::ExpectedNumber { .. })
        ));
        assert!(matches!(
            parse_duration("-1s"),
            Err(DurationParseError::ExpectedNumber { found: Some('-'), .. })
        ));
    }

    #[test]
    fn rejects_repeated_units() {
        assert_eq!(
            parse_duration("1s2s"),
            Err(DurationParseError::DuplicateUnit { unit: Unit::Second })
        );
    }

    #[test]
    fn whole_seconds_reject_fractions() {
        assert_eq!(parse_whole_seconds("2m").unwrap(), 120);
        assert_eq!(
            parse_whole_seconds("1s500ms"),
            Err(DurationParseError::FractionalSeconds)
        );
    }

    #[test]
    fn timeout_rejects_zero() {
        assert_eq!(parse_timeout("0ms"), Err(DurationParseError::Zero));
        assert_eq!(parse_timeout("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn detects_overflow() {
        let overflow = format!("{}ms", u128::from(u64::MAX) + 1);
        assert_eq!(parse_duration(&overflow), Err(DurationParseError::TooLarge));
        assert_eq!(
            parse_whole_seconds("5000000000s"),
            Err(DurationParseError::TooLarge)
        );
    }
}
