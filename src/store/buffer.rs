//! Fixed-capacity rolling buffer of `(index, value)` points for one column.

use std::collections::VecDeque;

/// One observed value and the row index it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub index: u64,
    pub value: f64,
}

impl Point {
    pub fn new(index: u64, value: f64) -> Self {
        Self { index, value }
    }
}

/// The most recent points of one column, oldest first.
///
/// Holds at most `capacity` points; appending past capacity drops from the front.
#[derive(Debug, Clone, Default)]
pub struct ColumnBuffer {
    points: VecDeque<Point>,
    capacity: usize,
}

impl ColumnBuffer {
    /// Create a buffer seeded with `initial`, truncated to the last `capacity` points.
    pub fn create(initial: impl IntoIterator<Item = Point>, capacity: usize) -> Self {
        let mut buffer = Self {
            points: VecDeque::new(),
            capacity,
        };
        buffer.append(initial, capacity);
        buffer
    }

    /// Append points, then roll over to the last `capacity` points.
    pub fn append(&mut self, values: impl IntoIterator<Item = Point>, capacity: usize) {
        self.capacity = capacity;
        self.points.extend(values);
        if self.points.len() > capacity {
            let overflow = self.points.len() - capacity;
            self.points.drain(..overflow);
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn indices(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.index).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }
}
