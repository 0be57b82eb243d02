//! Exam length and duration formatting.

/// Remaining time at which the one-shot low-time warning fires.
pub const LOW_TIME_WARNING_SECS: u32 = 300;

/// Session length for a given question count.
///
/// A coarse step function: up to 10 questions get 30 minutes, up to 30 get an
/// hour, up to 50 get 90 minutes, anything larger gets two hours.
#[must_use]
pub fn exam_duration_secs(question_count: u32) -> u32 {
    match question_count {
        0..=10 => 30 * 60,
        11..=30 => 60 * 60,
        31..=50 => 90 * 60,
        _ => 120 * 60,
    }
}

/// Long-form duration such as "1 hour 2 minutes 5 seconds".
///
/// Zero-valued units are omitted; a zero duration renders as "0 seconds".
#[must_use]
pub fn format_duration_secs(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::with_capacity(3);
    for (value, unit) in [(hours, "hour"), (minutes, "minute"), (seconds, "second")] {
        match value {
            0 => {}
            1 => parts.push(format!("1 {unit}")),
            n => parts.push(format!("{n} {unit}s")),
        }
    }

    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(" ")
    }
}

/// Compact countdown display: `MM:SS`, or `H:MM:SS` from one hour up.
#[must_use]
pub fn format_clock(secs: u32) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_steps() {
        assert_eq!(exam_duration_secs(1), 1800);
        assert_eq!(exam_duration_secs(10), 1800);
        assert_eq!(exam_duration_secs(11), 3600);
        assert_eq!(exam_duration_secs(30), 3600);
        assert_eq!(exam_duration_secs(31), 5400);
        assert_eq!(exam_duration_secs(50), 5400);
        assert_eq!(exam_duration_secs(51), 7200);
        assert_eq!(exam_duration_secs(500), 7200);
    }

    #[test]
    fn duration_is_monotonic() {
        let mut last = 0;
        for count in 0..200 {
            let current = exam_duration_secs(count);
            assert!(current >= last);
            last = current;
        }
    }

    #[test]
    fn long_form_omits_zero_units() {
        assert_eq!(format_duration_secs(0), "0 seconds");
        assert_eq!(format_duration_secs(1), "1 second");
        assert_eq!(format_duration_secs(60), "1 minute");
        assert_eq!(format_duration_secs(3725), "1 hour 2 minutes 5 seconds");
        assert_eq!(format_duration_secs(7200), "2 hours");
    }

    #[test]
    fn clock_display() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(299), "04:59");
        assert_eq!(format_clock(3600), "1:00:00");
        assert_eq!(format_clock(5405), "1:30:05");
    }
}
