use crate::*;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Series stored as one directory each, one JSON file per point. Slow, meant
/// for testing and small deployments.
pub struct FilePointStore {
    path: PathBuf,
}

impl FilePointStore {
    pub fn new(path: impl Into<PathBuf>) -> NetResult<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn series_dir(&self, series: &str) -> PathBuf {
        let name: String = series
            .to_lowercase()
            .chars()
            .map(|c| if c == ':' || c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.path.join(name)
    }

    fn read_series(&self, series: &str) -> NetResult<Vec<Point>> {
        let dir = self.series_dir(series);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut points = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let data = fs::read(entry.path())?;
            points.push(serde_json::from_slice(&data)?);
        }
        Ok(points)
    }
}

impl PointStore for FilePointStore {
    fn add_point(&self, series: &str, point: &Point) -> NetResult<()> {
        let dir = self.series_dir(series);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(point.id()), serde_json::to_vec(point)?)?;
        tracing::trace!(series, point = %point.id(), "point written");
        Ok(())
    }

    fn get_last_n(&self, series: &str, labels: &HashMap<String, String>, n: usize) -> NetResult<Vec<Point>> {
        Ok(self
            .read_series(series)?
            .into_iter()
            .filter(|p| has_labels(p, labels))
            .sorted_by(|a, b| b.timestamp.cmp(&a.timestamp))
            .take(n)
            .collect())
    }

    fn get_count(&self, series: &str, labels: &HashMap<String, String>) -> NetResult<usize> {
        Ok(self
            .read_series(series)?
            .iter()
            .filter(|p| has_labels(p, labels))
            .count())
    }

    fn exists(&self, series: &str) -> NetResult<bool> {
        Ok(self.series_dir(series).is_dir())
    }

    fn add_series(&self, series: &str) -> NetResult<()> {
        fs::create_dir_all(self.series_dir(series))?;
        Ok(())
    }

    fn delete_series(&self, series: &str) -> NetResult<()> {
        match fs::remove_dir_all(self.series_dir(series)) {
            Err(err) if err.kind() != IoErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Names are the directory names, lowercased with separators replaced
    fn list_series(&self) -> NetResult<Vec<BriefSeries>> {
        let mut series = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let count = self.read_series(&name)?.len();
            series.push(BriefSeries { name, count });
        }
        series.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(series)
    }
}

/// Trained nets stored as one JSON file per net id
pub struct FileParamStore {
    path: PathBuf,
}

impl FileParamStore {
    pub fn new(path: impl Into<PathBuf>) -> NetResult<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&self, id: &str) -> NetResult<PathBuf> {
        if id.is_empty() || id.contains(|c: char| c == '/' || c == '\\') || id.starts_with('.') {
            return Err(NetError::MalformedId(id.to_string()));
        }
        Ok(self.path.join(id))
    }
}

impl ParamStore for FileParamStore {
    fn load(&self, id: &str) -> NetResult<Option<NetworkParams>> {
        match fs::read(self.file(id)?) {
            Ok(data) => Ok(Some(NetworkParams::from_json(&data)?)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, id: &str, params: &NetworkParams) -> NetResult<()> {
        fs::write(self.file(id)?, params.to_json()?)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> NetResult<()> {
        match fs::remove_file(self.file(id)?) {
            Err(err) if err.kind() != IoErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn list(&self, offset: usize, limit: usize, pattern: &str) -> NetResult<(Vec<String>, usize)> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if glob_match(pattern, name) {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(page(ids, offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn points_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FilePointStore::new(dir.path()).unwrap();
        assert!(!store.exists("App:Load").unwrap());
        assert_eq!(store.get_count("App:Load", &HashMap::new()).unwrap(), 0);

        for t in [5i64, 1, 3] {
            let point = Point {
                labels: [("host".to_string(), "a".to_string())].into_iter().collect(),
                values: [("load".to_string(), t as f32 / 10.0)].into_iter().collect(),
                timestamp: t,
            };
            store.add_point("App:Load", &point).unwrap();
        }
        assert!(store.exists("App:Load").unwrap());
        assert!(dir.path().join("app_load").is_dir());

        let last = store.get_last_n("App:Load", &HashMap::new(), 2).unwrap();
        assert_eq!(last.len(), 2);
        assert_eq!(last[0].timestamp, 5);
        assert_eq!(last[1].timestamp, 3);
        assert_eq!(last[0].values["load"], 0.5);

        let other: HashMap<String, String> = [("host".to_string(), "b".to_string())].into_iter().collect();
        assert_eq!(store.get_count("App:Load", &other).unwrap(), 0);
    }

    #[test]
    fn series_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FilePointStore::new(dir.path()).unwrap();
        assert!(store.list_series().unwrap().is_empty());

        store.add_series("Web:Hits").unwrap();
        assert!(dir.path().join("web_hits").is_dir());
        assert!(store.get_latest("Web:Hits", &HashMap::new()).unwrap().is_none());

        for t in [30i64, 10, 20] {
            let point = Point {
                labels: HashMap::new(),
                values: [("hits".to_string(), t as f32)].into_iter().collect(),
                timestamp: t,
            };
            store.add_point("Web:Hits", &point).unwrap();
        }
        store.add_series("Web:Hits").unwrap();
        store.add_series("idle").unwrap();
        // stray files next to the series are ignored
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let latest = store.get_latest("Web:Hits", &HashMap::new()).unwrap().unwrap();
        assert_eq!(latest.timestamp, 30);
        assert_eq!(
            store.list_series().unwrap(),
            vec![
                BriefSeries {
                    name: "idle".to_string(),
                    count: 0
                },
                BriefSeries {
                    name: "web_hits".to_string(),
                    count: 3
                },
            ]
        );

        store.delete_series("Web:Hits").unwrap();
        store.delete_series("Web:Hits").unwrap();
        assert!(!store.exists("Web:Hits").unwrap());
        assert_eq!(store.list_series().unwrap().len(), 1);
    }

    #[test]
    fn params_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileParamStore::new(dir.path().join("nets")).unwrap();
        let id = "series-aaa-bbb-mlp";
        assert!(store.load(id).unwrap().is_none());
        store.save(id, &sample_params()).unwrap();
        store.save("series-ccc-bbb-mlp", &sample_params()).unwrap();
        fs::create_dir(store.path().join("not-a-net")).unwrap();

        assert_eq!(store.load(id).unwrap(), Some(sample_params()));
        let (ids, next) = store.list(0, 10, "series-a*").unwrap();
        assert_eq!(ids, vec![id.to_string()]);
        assert_eq!(next, 0);
        assert_eq!(store.list(0, 0, "*").unwrap().0.len(), 2);

        store.delete(id).unwrap();
        store.delete(id).unwrap();
        assert!(store.load(id).unwrap().is_none());

        assert!(matches!(store.save("../escape", &sample_params()), Err(NetError::MalformedId(_))));
    }

    #[test]
    fn corrupt_params() {
        let dir = TempDir::new().unwrap();
        let store = FileParamStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad-a-b-mlp"), b"{not json").unwrap();
        let err = store.load("bad-a-b-mlp").unwrap_err();
        assert!(matches!(err, NetError::Serialization(_)));
    }
}
