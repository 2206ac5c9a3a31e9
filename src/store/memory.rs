use crate::*;
use parking_lot::RwLock;

/// Series kept in process memory, mostly for tests and single instance setups.
/// Points of a series are keyed by their id.
#[derive(Default)]
pub struct MemoryPointStore {
    series: RwLock<HashMap<String, HashMap<String, Point>>>,
}

impl PointStore for MemoryPointStore {
    fn add_point(&self, series: &str, point: &Point) -> NetResult<()> {
        self.series
            .write()
            .entry(series.to_string())
            .or_default()
            .insert(point.id(), point.clone());
        Ok(())
    }

    fn get_last_n(&self, series: &str, labels: &HashMap<String, String>, n: usize) -> NetResult<Vec<Point>> {
        let all = self.series.read();
        let Some(points) = all.get(series) else {
            return Ok(Vec::new());
        };
        Ok(points
            .values()
            .filter(|p| has_labels(p, labels))
            .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
            .take(n)
            .cloned()
            .collect())
    }

    fn get_count(&self, series: &str, labels: &HashMap<String, String>) -> NetResult<usize> {
        Ok(self
            .series
            .read()
            .get(series)
            .map_or(0, |points| points.values().filter(|p| has_labels(p, labels)).count()))
    }

    fn exists(&self, series: &str) -> NetResult<bool> {
        Ok(self.series.read().contains_key(series))
    }

    fn add_series(&self, series: &str) -> NetResult<()> {
        self.series.write().entry(series.to_string()).or_default();
        Ok(())
    }

    fn delete_series(&self, series: &str) -> NetResult<()> {
        self.series.write().remove(series);
        Ok(())
    }

    fn list_series(&self) -> NetResult<Vec<BriefSeries>> {
        Ok(self
            .series
            .read()
            .iter()
            .map(|(name, points)| BriefSeries {
                name: name.clone(),
                count: points.len(),
            })
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }
}

/// Trained nets kept in process memory
#[derive(Default)]
pub struct MemoryParamStore {
    nets: RwLock<BTreeMap<String, NetworkParams>>,
}

impl ParamStore for MemoryParamStore {
    fn load(&self, id: &str) -> NetResult<Option<NetworkParams>> {
        Ok(self.nets.read().get(id).cloned())
    }

    fn save(&self, id: &str, params: &NetworkParams) -> NetResult<()> {
        self.nets.write().insert(id.to_string(), params.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> NetResult<()> {
        self.nets.write().remove(id);
        Ok(())
    }

    fn list(&self, offset: usize, limit: usize, pattern: &str) -> NetResult<(Vec<String>, usize)> {
        let ids = self
            .nets
            .read()
            .keys()
            .filter(|id| glob_match(pattern, id))
            .cloned()
            .collect();
        Ok(page(ids, offset, limit))
    }
}
