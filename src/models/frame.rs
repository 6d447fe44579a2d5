use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::site::ObservationValue;

/// Time-indexed table of named numeric columns
///
/// Rows are kept in insertion order; readers append rows in time order.
/// Missing cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl Frame {
    /// Create an empty frame with the given column names
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            index: Vec::new(),
            columns: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    /// Append a row; columns absent from `row` get a missing cell
    pub fn push_row(&mut self, timestamp: DateTime<Utc>, row: &[(&str, Option<f64>)]) {
        let len = self.index.len();
        for (name, _) in row {
            self.columns
                .entry((*name).to_string())
                .or_insert_with(|| vec![None; len]);
        }
        for (name, cells) in self.columns.iter_mut() {
            let value = row
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .and_then(|(_, v)| *v);
            cells.push(value);
        }
        self.index.push(timestamp);
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Rows with `start <= timestamp <= end`
    pub fn slice(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Frame {
        let keep: Vec<usize> = self
            .index
            .iter()
            .enumerate()
            .filter(|(_, ts)| **ts >= start && **ts <= end)
            .map(|(i, _)| i)
            .collect();

        Frame {
            index: keep.iter().map(|&i| self.index[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, cells)| (name.clone(), keep.iter().map(|&i| cells[i]).collect()))
                .collect(),
        }
    }

    /// Stack frames vertically, aligning columns by name
    pub fn concat(frames: Vec<Frame>) -> Frame {
        let mut out = Frame::default();
        for frame in frames {
            let offset = out.index.len();
            for name in frame.columns.keys() {
                out.columns
                    .entry(name.clone())
                    .or_insert_with(|| vec![None; offset]);
            }
            for (name, cells) in out.columns.iter_mut() {
                match frame.columns.get(name) {
                    Some(theirs) => cells.extend_from_slice(theirs),
                    None => cells.extend(std::iter::repeat(None).take(frame.index.len())),
                }
            }
            out.index.extend(frame.index);
        }
        out
    }

    /// Rename a column; a no-op when `from` is absent
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let Some(cells) = self.columns.remove(from) {
            self.columns.insert(to.to_string(), cells);
        }
    }

    /// Present values of a column, ready to post with quality flag 0
    ///
    /// Returns `None` when the column does not exist.
    pub fn values(&self, variable: &str) -> Option<Vec<ObservationValue>> {
        let cells = self.columns.get(variable)?;
        Some(
            self.index
                .iter()
                .zip(cells)
                .filter_map(|(ts, cell)| match cell {
                    Some(v) if !v.is_nan() => Some(ObservationValue {
                        timestamp: *ts,
                        value: *v,
                        quality_flag: 0,
                    }),
                    _ => None,
                })
                .collect(),
        )
    }
}
