//! Storage seams: where the measurements come from and where trained nets go.

mod file;
mod memory;

pub use file::*;
pub use memory::*;

use crate::*;

/// Measurements grouped in named series
pub trait PointStore: Send + Sync {
    /// Adds a point to a series, creating the series when needed. A point
    /// with the same id replaces the stored one.
    fn add_point(&self, series: &str, point: &Point) -> NetResult<()>;

    /// Up to `n` of the most recent points carrying all of `labels`, newest
    /// first
    fn get_last_n(&self, series: &str, labels: &HashMap<String, String>, n: usize) -> NetResult<Vec<Point>>;

    /// Points carrying all of `labels`, 0 for unknown series
    fn get_count(&self, series: &str, labels: &HashMap<String, String>) -> NetResult<usize>;

    fn exists(&self, series: &str) -> NetResult<bool>;

    /// Creates an empty series. Adding an existing one keeps its points.
    fn add_series(&self, series: &str) -> NetResult<()>;

    /// Drops a series with all of its points. Deleting a missing series is
    /// not an error.
    fn delete_series(&self, series: &str) -> NetResult<()>;

    /// Every stored series with its point count, sorted by name
    fn list_series(&self) -> NetResult<Vec<BriefSeries>>;

    /// The most recent point carrying all of `labels`
    fn get_latest(&self, series: &str, labels: &HashMap<String, String>) -> NetResult<Option<Point>> {
        Ok(self.get_last_n(series, labels, 1)?.into_iter().next())
    }
}

/// Series name with the number of points it holds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSeries {
    pub name: String,
    pub count: usize,
}

/// Shared storage for trained nets
pub trait ParamStore: Send + Sync {
    fn load(&self, id: &str) -> NetResult<Option<NetworkParams>>;

    fn save(&self, id: &str, params: &NetworkParams) -> NetResult<()>;

    /// Deleting a missing net is not an error
    fn delete(&self, id: &str) -> NetResult<()>;

    /// Ids matching the glob `pattern` in lexicographic order, starting at
    /// cursor `offset`. Returns the cursor of the next page, 0 when there is
    /// none. A `limit` of 0 means no limit.
    fn list(&self, offset: usize, limit: usize, pattern: &str) -> NetResult<(Vec<String>, usize)>;
}

/// Cuts one page out of sorted ids
pub(crate) fn page(ids: Vec<String>, offset: usize, limit: usize) -> (Vec<String>, usize) {
    let total = ids.len();
    let end = if limit == 0 {
        total
    } else {
        offset.saturating_add(limit).min(total)
    };
    let page: Vec<String> = ids.into_iter().skip(offset).take(end.saturating_sub(offset)).collect();
    let next = if end < total { end } else { 0 };
    (page, next)
}

pub(crate) fn has_labels(point: &Point, labels: &HashMap<String, String>) -> bool {
    labels
        .iter()
        .all(|(key, value)| point.labels.get(key) == Some(value))
}

/// Glob matching with `*` (any run of characters) and `?` (one character)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // let the last star swallow one more character
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}
