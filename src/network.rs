use crate::*;
use sha1::{Digest, Sha1};

/// Network families the service can build
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetKind {
    #[serde(rename = "mlp")]
    Mlp,
}

impl NetKind {
    pub const ALL: [NetKind; 1] = [NetKind::Mlp];

    pub fn name(&self) -> &'static str {
        match self {
            NetKind::Mlp => "mlp",
        }
    }

    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl std::fmt::Display for NetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetKind {
    type Err = NetError;

    fn from_str(s: &str) -> NetResult<Self> {
        Self::ALL
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| NetError::UnknownNetKind(s.to_string()))
    }
}

/// A trained or trainable net of any supported kind
#[derive(Clone, Debug)]
pub enum Network {
    Mlp(Mlp),
}

impl Network {
    /// Builds an untrained net of the kind requested by `genes`
    pub fn new(
        id: &str,
        inputs: &[String],
        outputs: &[String],
        genes: &Genes,
        rng: &mut dyn RngCore,
    ) -> NetResult<Self> {
        match genes.kind {
            NetKind::Mlp => Ok(Network::Mlp(Mlp::new(id, inputs, outputs, genes, rng)?)),
        }
    }

    /// Rebuilds the net stored under `id`, `None` when the store doesn't have it
    pub fn load(id: &str, store: &dyn ParamStore) -> NetResult<Option<Self>> {
        match id_to_kind(id)? {
            NetKind::Mlp => match store.load(id)? {
                Some(params) => Ok(Some(Network::Mlp(Mlp::from_params(id, params)?))),
                None => Ok(None),
            },
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Network::Mlp(net) => net.id(),
        }
    }

    pub fn kind(&self) -> NetKind {
        match self {
            Network::Mlp(_) => NetKind::Mlp,
        }
    }

    pub fn params(&self) -> &NetworkParams {
        match self {
            Network::Mlp(net) => net.params(),
        }
    }

    pub fn evaluate(&mut self, inputs: &HashMap<String, f32>) -> NetResult<HashMap<String, f32>> {
        match self {
            Network::Mlp(net) => net.evaluate(inputs),
        }
    }

    pub fn train(
        &mut self,
        points: &[Point],
        max_epoch: usize,
        err_margin: f32,
        test_set: f32,
        tolerance: f32,
        rng: &mut dyn RngCore,
    ) -> NetResult<f32> {
        match self {
            Network::Mlp(net) => net.train(points, max_epoch, err_margin, test_set, tolerance, rng),
        }
    }

    pub fn save(&self, store: &dyn ParamStore) -> NetResult<()> {
        store.save(self.id(), self.params())
    }
}

/// Lowercase hex SHA-1 of the concatenated labels, which must already be sorted
pub fn hash_labels(labels: &[String]) -> String {
    let mut hasher = Sha1::new();
    for label in labels {
        hasher.update(label.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// `{series}-{hash(inputs)}-{hash(outputs)}-{kind}`
pub fn network_id(series_id: &str, inputs: &[String], outputs: &[String], kind: NetKind) -> String {
    format!(
        "{}-{}-{}-{}",
        series_id,
        hash_labels(inputs),
        hash_labels(outputs),
        kind
    )
}

/// Extracts the net kind from an id. There can be false negatives (a bad
/// series part isn't detected) but not false positives.
pub fn id_to_kind(id: &str) -> NetResult<NetKind> {
    let parts: Vec<&str> = id.split('-').collect();
    if parts.len() < 4 {
        return Err(NetError::MalformedId(id.to_string()));
    }
    parts[parts.len() - 1].parse()
}

/// Summaries of the stored nets matching `pattern`, with the cursor for the
/// next page (0 when there is none). Ids that don't look like net ids are
/// skipped.
pub fn list_networks(
    store: &dyn ParamStore,
    offset: usize,
    limit: usize,
    pattern: &str,
) -> NetResult<(Vec<BriefNet>, usize)> {
    let (ids, cursor) = store.list(offset, limit, pattern)?;
    let mut nets = Vec::with_capacity(ids.len());
    for id in ids {
        match id_to_kind(&id) {
            Ok(NetKind::Mlp) => {
                if let Some(params) = store.load(&id)? {
                    nets.push(params.brief(&id));
                }
            }
            Err(err) => {
                tracing::warn!(id = %id, error = %err, "encountered incorrectly formatted key in store");
            }
        }
    }
    Ok((nets, cursor))
}
