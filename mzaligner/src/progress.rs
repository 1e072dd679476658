use std::ops::{Add, AddAssign};

/// Counts accumulated while loading, processing and writing feature lists
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub lists_read: usize,
    pub rows_read: usize,
    pub features_read: usize,
    pub rows_written: usize,
    pub correlations: usize,
    pub tasks_failed: usize,
}

impl ProgressRecord {
    pub fn from_read(rows: usize, features: usize) -> Self {
        Self {
            lists_read: 1,
            rows_read: rows,
            features_read: features,
            ..Default::default()
        }
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.lists_read += rhs.lists_read;
        self.rows_read += rhs.rows_read;
        self.features_read += rhs.features_read;
        self.rows_written += rhs.rows_written;
        self.correlations += rhs.correlations;
        self.tasks_failed += rhs.tasks_failed;
    }
}
