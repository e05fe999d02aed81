// THEORY:
// The fixation source is a CSV export from the eye tracker with at least the
// columns `username`, `gaze_x` and `gaze_y`. It is read wholesale and then
// filtered per request.
//
// The `username` column is written by different tools, sometimes as an integer
// column and sometimes as text. A lookup therefore runs in two stages: if the
// requested id parses as an integer it is compared numerically against every
// cell that also reads as an integer; when the id does not parse or nothing
// matches, the lookup falls back to exact text comparison.
//
// Raw gaze coordinates live in the tracker's own coordinate system, which is
// not assumed to line up with the stimulus image. `FixationTable::normalized`
// stretches each axis independently so the observed range covers the canvas.

use crate::error::{HeatmapError, Result};
use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;

const REQUIRED_COLUMNS: [&str; 3] = ["username", "gaze_x", "gaze_y"];

// Short rows are accepted; their missing trailing cells read as dropped samples.
fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).flexible(true);
    builder
}

/// One recorded gaze sample in raw tracker units. NaN marks a dropped sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixationPoint {
    pub x: f64,
    pub y: f64,
}

impl FixationPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// False when either coordinate is NaN.
    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FixationRecord {
    username: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    gaze_x: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    gaze_y: Option<f64>,
}

impl FixationRecord {
    fn point(&self) -> FixationPoint {
        FixationPoint::new(self.gaze_x.unwrap_or(f64::NAN), self.gaze_y.unwrap_or(f64::NAN))
    }

    /// The username read as an integer, accepting integral float spellings
    /// such as `11224498.0`.
    fn numeric_username(&self) -> Option<i64> {
        let cell = self.username.trim();
        if let Ok(id) = cell.parse::<i64>() {
            return Some(id);
        }
        let value = cell.parse::<f64>().ok()?;
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Some(value as i64)
        } else {
            None
        }
    }
}

/// How a requested user id was matched against the `username` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMatch {
    Numeric(i64),
    Text,
}

/// Every fixation row of a CSV export, loaded wholesale.
#[derive(Debug, Clone, Default)]
pub struct FixationSource {
    records: Vec<FixationRecord>,
}

impl FixationSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = reader_builder()
            .from_path(path)
            .map_err(|source| HeatmapError::FixationSource { path: path.to_path_buf(), source })?;
        Self::collect(reader).map_err(|source| HeatmapError::FixationSource { path: path.to_path_buf(), source })
    }

    pub fn from_reader<R: io::Read>(reader: R) -> std::result::Result<Self, csv::Error> {
        Self::collect(reader_builder().from_reader(reader))
    }

    fn collect<R: io::Read>(mut reader: csv::Reader<R>) -> std::result::Result<Self, csv::Error> {
        let headers = reader.headers()?;
        if let Some(missing) = REQUIRED_COLUMNS.iter().find(|&&column| !headers.iter().any(|h| h == column)) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("missing column `{missing}`")).into());
        }
        let records = reader.deserialize().collect::<std::result::Result<Vec<FixationRecord>, _>>()?;
        debug!("loaded {} fixation rows", records.len());
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Selects the rows belonging to `user_id`, or `None` when no row matches.
    pub fn select_user(&self, user_id: &str) -> Option<FixationTable> {
        let (points, matched) = self.lookup(user_id);
        if points.is_empty() {
            return None;
        }
        debug!("user {user_id}: {} fixations matched by {:?}", points.len(), matched);
        Some(FixationTable::new(user_id, points))
    }

    fn lookup(&self, user_id: &str) -> (Vec<FixationPoint>, UserMatch) {
        if let Ok(id) = user_id.trim().parse::<i64>() {
            let numeric: Vec<FixationPoint> = self
                .records
                .iter()
                .filter(|r| r.numeric_username() == Some(id))
                .map(FixationRecord::point)
                .collect();
            if !numeric.is_empty() {
                return (numeric, UserMatch::Numeric(id));
            }
        }
        let text = self
            .records
            .iter()
            .filter(|r| r.username == user_id)
            .map(FixationRecord::point)
            .collect();
        (text, UserMatch::Text)
    }

    /// Splits the rows into one table per distinct `username` text, in the
    /// order each user first appears.
    pub fn partition_by_user(&self) -> Vec<FixationTable> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut tables: Vec<FixationTable> = Vec::new();
        for record in &self.records {
            let slot = *index.entry(record.username.as_str()).or_insert_with(|| {
                tables.push(FixationTable::new(&record.username, Vec::new()));
                tables.len() - 1
            });
            tables[slot].points.push(record.point());
        }
        tables
    }
}

/// The fixations of a single user, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct FixationTable {
    user_id: String,
    points: Vec<FixationPoint>,
}

impl FixationTable {
    pub fn new(user_id: impl Into<String>, points: Vec<FixationPoint>) -> Self {
        Self { user_id: user_id.into(), points }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn points(&self) -> &[FixationPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rescales raw coordinates into pixel space of a `width x height` canvas.
    /// See [`rescale_axis`] for the per-axis rule.
    pub fn normalized(&self, width: u32, height: u32) -> Vec<FixationPoint> {
        let xs: Vec<f64> = self.points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.y).collect();
        let xs = rescale_axis(&xs, f64::from(width));
        let ys = rescale_axis(&ys, f64::from(height));
        xs.into_iter().zip(ys).map(|(x, y)| FixationPoint::new(x, y)).collect()
    }
}

/// Shifts a column so its minimum is 0 and stretches it so its maximum equals
/// `extent`. NaN entries are ignored for the min/max and stay NaN.
///
/// When the shifted maximum is not positive (every sample identical, or no
/// valid sample at all) the whole column collapses to 0.
pub fn rescale_axis(values: &[f64], extent: f64) -> Vec<f64> {
    let min = values.iter().copied().filter(|v| !v.is_nan()).fold(f64::INFINITY, f64::min);
    let max = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .map(|v| v - min)
        .fold(f64::NEG_INFINITY, f64::max);

    if max > 0.0 {
        values.iter().map(|v| (v - min) / max * extent).collect()
    } else {
        vec![0.0; values.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = "\
username,gaze_x,gaze_y,timestamp
11224498,100.0,200.0,0.1
11224499,5.0,5.0,0.2
11224498,300.0,400.0,0.3
Admin,1.0,2.0,0.4
11224498,,250.0,0.5
";

    fn sample() -> FixationSource {
        FixationSource::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn numeric_lookup_selects_user_rows() {
        let table = sample().select_user("11224498").unwrap();
        assert_eq!(table.user_id(), "11224498");
        assert_eq!(table.len(), 3);
        assert_eq!(table.points()[0], FixationPoint::new(100.0, 200.0));
        assert!(table.points()[2].x.is_nan());
        assert!(!table.points()[2].is_valid());
    }

    #[test]
    fn text_lookup_is_used_for_non_numeric_ids() {
        let table = sample().select_user("Admin").unwrap();
        assert_eq!(table.points(), &[FixationPoint::new(1.0, 2.0)]);
    }

    #[test]
    fn numeric_lookup_accepts_float_spelled_cells() {
        let src = FixationSource::from_reader("username,gaze_x,gaze_y\n42.0,1,2\n".as_bytes()).unwrap();
        assert_eq!(src.select_user("42").unwrap().len(), 1);
    }

    #[test]
    fn numeric_id_without_numeric_match_falls_back_to_text() {
        let src = FixationSource::from_reader("username,gaze_x,gaze_y\n0x10,1,2\n".as_bytes()).unwrap();
        assert!(src.select_user("16").is_none());
        assert_eq!(src.select_user("0x10").unwrap().len(), 1);
        assert_eq!(src.lookup("0x10").1, UserMatch::Text);
        assert_eq!(sample().lookup("11224499").1, UserMatch::Numeric(11224499));
    }

    #[test]
    fn unknown_user_is_none() {
        assert!(sample().select_user("99999999").is_none());
        assert!(sample().select_user("nobody").is_none());
    }

    #[test]
    fn partition_keeps_first_seen_order() {
        let tables = sample().partition_by_user();
        let ids: Vec<&str> = tables.iter().map(FixationTable::user_id).collect();
        assert_eq!(ids, ["11224498", "11224499", "Admin"]);
        assert_eq!(tables[0].len(), 3);
    }

    #[test]
    fn missing_column_is_an_error() {
        assert!(FixationSource::from_reader("username,gaze_x\n1,2\n".as_bytes()).is_err());
        assert!(FixationSource::from_reader("user,gaze_x,gaze_y\n1,2,3\n".as_bytes()).is_err());
    }

    #[test]
    fn short_row_reads_as_dropped_sample() {
        let src = FixationSource::from_reader("username,gaze_x,gaze_y\n1,2,3\n1,4\n1,6,9\n".as_bytes()).unwrap();
        let table = src.select_user("1").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.points()[0], FixationPoint::new(2.0, 3.0));
        assert_eq!(table.points()[1].x, 4.0);
        assert!(!table.points()[1].is_valid());
        assert_eq!(table.points()[2], FixationPoint::new(6.0, 9.0));

        let normalized = table.normalized(100, 60);
        assert_eq!(normalized[0], FixationPoint::new(0.0, 0.0));
        assert_eq!(normalized[2], FixationPoint::new(100.0, 60.0));
        assert!(normalized[1].y.is_nan());
    }

    #[test]
    fn rescale_maps_range_onto_extent() {
        let out = rescale_axis(&[10.0, 20.0, 30.0], 200.0);
        assert_eq!(out, vec![0.0, 100.0, 200.0]);
    }

    #[test]
    fn rescale_identical_values_collapse_to_zero() {
        let out = rescale_axis(&[7.0, 7.0, 7.0], 640.0);
        assert_eq!(out, vec![0.0; 3]);
        assert!(out.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn rescale_keeps_nan_entries() {
        let out = rescale_axis(&[0.0, f64::NAN, 4.0], 8.0);
        assert_eq!(out[0], 0.0);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 8.0);
    }

    #[test]
    fn rescale_all_nan_collapses_to_zero() {
        let out = rescale_axis(&[f64::NAN, f64::NAN], 8.0);
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn normalization_is_scale_invariant() {
        let raw = vec![
            FixationPoint::new(3.0, 9.0),
            FixationPoint::new(12.5, -4.0),
            FixationPoint::new(-1.25, 2.0),
        ];
        let scaled: Vec<FixationPoint> = raw.iter().map(|p| FixationPoint::new(p.x * 3.7, p.y * 3.7)).collect();
        let a = FixationTable::new("u", raw).normalized(640, 480);
        let b = FixationTable::new("u", scaled).normalized(640, 480);
        for (p, q) in a.iter().zip(&b) {
            assert_relative_eq!(p.x, q.x, epsilon = 1e-9);
            assert_relative_eq!(p.y, q.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn normalized_axes_are_independent() {
        let table = FixationTable::new(
            "u",
            vec![FixationPoint::new(5.0, 1.0), FixationPoint::new(5.0, 3.0)],
        );
        let out = table.normalized(100, 50);
        assert_eq!(out, vec![FixationPoint::new(0.0, 0.0), FixationPoint::new(0.0, 50.0)]);
    }
}
