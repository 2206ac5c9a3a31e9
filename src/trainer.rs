use crate::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Asks the trainer to create or update the nets of a series, one per output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    #[serde(rename = "seriesID")]
    pub series_id: String,
    /// Series values used as inputs, sorted
    pub inputs: Vec<String>,
    /// Series values to infer, sorted
    pub outputs: Vec<String>,
    /// Maximum distance between the expected and produced value to still
    /// count as correct when testing
    #[serde(rename = "errMargin")]
    pub err_margin: f32,
    /// Points of the series used to train and test
    pub required: usize,
}

/// Producer side of the bounded training queue
#[derive(Clone, Debug)]
pub struct TrainingQueue {
    tx: mpsc::Sender<TrainRequest>,
}

/// Bounded queue feeding a [`Trainer`]. Producers wait while it is full.
pub fn training_queue(capacity: usize) -> (TrainingQueue, mpsc::Receiver<TrainRequest>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TrainingQueue { tx }, rx)
}

impl TrainingQueue {
    pub async fn submit(&self, request: TrainRequest) -> NetResult<()> {
        self.tx.send(request).await.map_err(|_| NetError::QueueClosed)
    }

    /// For producers outside of the async runtime
    pub fn blocking_submit(&self, request: TrainRequest) -> NetResult<()> {
        self.tx.blocking_send(request).map_err(|_| NetError::QueueClosed)
    }
}

/// What happened to one requested output
#[derive(Clone, Debug, PartialEq)]
pub enum OutputResult {
    Trained(BriefNet),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrainReport {
    pub series_id: String,
    /// Per output, in request order
    pub outputs: Vec<(String, OutputResult)>,
}

impl TrainReport {
    pub fn trained(&self) -> impl Iterator<Item = &BriefNet> {
        self.outputs.iter().filter_map(|(_, result)| match result {
            OutputResult::Trained(net) => Some(net),
            OutputResult::Failed(_) => None,
        })
    }
}

/// Consumes training requests: fetches the points, searches the best net
/// for every output and stores it
pub struct Trainer {
    points: Arc<dyn PointStore>,
    params: Arc<dyn ParamStore>,
    config: TrainingConfig,
    rng: ChaCha8Rng,
}

impl Trainer {
    pub fn new(points: Arc<dyn PointStore>, params: Arc<dyn ParamStore>, config: TrainingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            points,
            params,
            config,
            rng,
        }
    }

    /// Trainer over the stores named in `config`
    pub fn from_config(config: TrainingConfig) -> NetResult<Self> {
        config.validate()?;
        let (points, params) = open_stores(&config)?;
        Ok(Self::new(points, params, config))
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Handles one request. Failing to fetch the points or to save a net
    /// aborts it; a failed search only skips its output.
    pub fn process(&mut self, request: &TrainRequest) -> NetResult<TrainReport> {
        tracing::info!(
            series = %request.series_id,
            inputs = ?request.inputs,
            outputs = ?request.outputs,
            required = request.required as u64,
            "processing training request"
        );
        let points = self
            .points
            .get_last_n(&request.series_id, &HashMap::new(), request.required)?;

        let mut report = TrainReport {
            series_id: request.series_id.clone(),
            outputs: Vec::with_capacity(request.outputs.len()),
        };
        for output in &request.outputs {
            let outputs = [output.clone()];
            let rng = ChaCha8Rng::seed_from_u64(self.rng.gen());
            let found = Population::new(&self.config, rng)
                .and_then(|mut population| population.optimal(request, &outputs, &points));
            match found {
                Ok(network) => {
                    network.save(self.params.as_ref())?;
                    let brief = network.params().brief(network.id());
                    tracing::info!(
                        series = %request.series_id,
                        output = %output,
                        net = %network.id(),
                        accuracy = brief.accuracy,
                        hidden_layers = brief.hidden_layers as u64,
                        "net trained and stored"
                    );
                    report.outputs.push((output.clone(), OutputResult::Trained(brief)));
                }
                Err(err) => {
                    tracing::error!(
                        series = %request.series_id,
                        output = %output,
                        error = %err,
                        "failed to find a net for the output"
                    );
                    report.outputs.push((output.clone(), OutputResult::Failed(err.to_string())));
                }
            }
        }
        Ok(report)
    }

    /// Processes requests one at a time until every [`TrainingQueue`] is
    /// dropped. Training runs on the blocking pool.
    pub async fn run(self, mut rx: mpsc::Receiver<TrainRequest>) -> NetResult<()> {
        let mut trainer = self;
        while let Some(request) = rx.recv().await {
            let handle = tokio::task::spawn_blocking(move || {
                let report = trainer.process(&request);
                (trainer, request, report)
            });
            let (returned, request, report) =
                handle.await.map_err(|err| NetError::Worker(err.to_string()))?;
            trainer = returned;
            match report {
                Ok(report) => tracing::info!(
                    series = %report.series_id,
                    trained = report.trained().count() as u64,
                    "training request done"
                ),
                Err(err) => tracing::error!(
                    series = %request.series_id,
                    error = %err,
                    "training request aborted"
                ),
            }
        }
        tracing::info!("training queue closed, trainer stopping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Never has points
    struct BrokenPointStore;

    impl PointStore for BrokenPointStore {
        fn add_point(&self, _: &str, _: &Point) -> NetResult<()> {
            Err(NetError::Store("offline".to_string()))
        }
        fn get_last_n(&self, _: &str, _: &HashMap<String, String>, _: usize) -> NetResult<Vec<Point>> {
            Err(NetError::Store("offline".to_string()))
        }
        fn get_count(&self, _: &str, _: &HashMap<String, String>) -> NetResult<usize> {
            Err(NetError::Store("offline".to_string()))
        }
        fn exists(&self, _: &str) -> NetResult<bool> {
            Err(NetError::Store("offline".to_string()))
        }
        fn add_series(&self, _: &str) -> NetResult<()> {
            Err(NetError::Store("offline".to_string()))
        }
        fn delete_series(&self, _: &str) -> NetResult<()> {
            Err(NetError::Store("offline".to_string()))
        }
        fn list_series(&self) -> NetResult<Vec<BriefSeries>> {
            Err(NetError::Store("offline".to_string()))
        }
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            generations: 1,
            variations: 3,
            max_epoch: 10,
            max_hidden_layers: 1,
            seed: Some(9),
            ..TrainingConfig::default()
        }
    }

    fn request(outputs: &[&str]) -> TrainRequest {
        TrainRequest {
            series_id: "shop".to_string(),
            inputs: vec!["visits".to_string()],
            outputs: outputs.iter().map(|o| o.to_string()).collect(),
            err_margin: 2.0,
            required: 40,
        }
    }

    fn seed(store: &dyn PointStore) {
        for t in 0..40 {
            let visits = (t % 10) as f32;
            let point = Point {
                labels: HashMap::new(),
                values: [("visits", visits), ("sales", visits * 2.0 + 1.0)]
                    .iter()
                    .map(|(l, v)| (l.to_string(), *v))
                    .collect(),
                timestamp: t,
            };
            store.add_point("shop", &point).unwrap();
        }
    }

    #[test]
    fn request_json() {
        let json = serde_json::to_value(request(&["sales"])).unwrap();
        assert_eq!(json["seriesID"], "shop");
        assert_eq!(json["errMargin"], 2.0);
        let back: TrainRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request(&["sales"]));
    }

    #[test]
    fn trains_and_stores() {
        let points = Arc::new(MemoryPointStore::default());
        let params = Arc::new(MemoryParamStore::default());
        seed(points.as_ref());
        let mut trainer = Trainer::new(points, params.clone(), config());

        let report = trainer.process(&request(&["sales"])).unwrap();
        assert_eq!(report.outputs.len(), 1);
        let net = report.trained().next().unwrap();
        let id = network_id("shop", &["visits".to_string()], &["sales".to_string()], NetKind::Mlp);
        assert_eq!(net.id, id);
        assert_eq!(params.load(&id).unwrap().unwrap().outputs, vec!["sales"]);
    }

    #[test]
    fn failed_output_is_skipped() {
        let points = Arc::new(MemoryPointStore::default());
        let params = Arc::new(MemoryParamStore::default());
        seed(points.as_ref());
        let mut trainer = Trainer::new(points, params.clone(), config());

        // "missing" has no values in the series
        let report = trainer.process(&request(&["missing", "sales"])).unwrap();
        assert!(matches!(report.outputs[0], (ref o, OutputResult::Failed(_)) if o == "missing"));
        assert!(matches!(report.outputs[1], (ref o, OutputResult::Trained(_)) if o == "sales"));
        assert_eq!(params.list(0, 0, "*").unwrap().0.len(), 1);
    }

    #[test]
    fn point_fetch_failure_aborts() {
        let params = Arc::new(MemoryParamStore::default());
        let mut trainer = Trainer::new(Arc::new(BrokenPointStore), params, config());
        let err = trainer.process(&request(&["sales"])).unwrap_err();
        assert!(matches!(err, NetError::Store(_)));
    }

    #[tokio::test]
    async fn closed_queue() {
        let (queue, rx) = training_queue(1);
        drop(rx);
        assert!(matches!(queue.submit(request(&["sales"])).await, Err(NetError::QueueClosed)));
    }
}
