/// Aggregated view of exam progress, useful for a progress sidebar.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamProgress {
    pub current: usize,
    pub total: usize,
    pub answered: usize,
    pub remaining_secs: u32,
    pub total_secs: u32,
}

impl ExamProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }

    /// Share of questions answered, 0..=100.
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        percent(self.answered as f64, self.total as f64)
    }

    /// Share of session time left, 0..=100.
    #[must_use]
    pub fn time_percent_left(&self) -> f64 {
        percent(f64::from(self.remaining_secs), f64::from(self.total_secs))
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { 100.0 * part / whole } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_handle_empty_totals() {
        let progress = ExamProgress {
            current: 0,
            total: 0,
            answered: 0,
            remaining_secs: 0,
            total_secs: 0,
        };
        assert_eq!(progress.percent_complete(), 0.0);
        assert_eq!(progress.time_percent_left(), 0.0);
    }

    #[test]
    fn percentages_follow_counts() {
        let progress = ExamProgress {
            current: 1,
            total: 4,
            answered: 1,
            remaining_secs: 900,
            total_secs: 1800,
        };
        assert_eq!(progress.unanswered(), 3);
        assert!((progress.percent_complete() - 25.0).abs() < f64::EPSILON);
        assert!((progress.time_percent_left() - 50.0).abs() < f64::EPSILON);
    }
}
