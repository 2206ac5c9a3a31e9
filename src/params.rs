use crate::*;

/// Everything needed to rebuild a trained MLP plus the metadata reported to
/// API clients. This is what the param stores persist, with PascalCase field
/// names (`Accuracy`, `ActivationFunc`, `Weights`, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkParams {
    /// Fraction of held-out points predicted within the error margin, -1 if never tested
    pub accuracy: f32,
    pub activation_func: ActivationFunc,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub averages: BTreeMap<String, f32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deviations: BTreeMap<String, f32>,
    pub epoch: usize,
    pub err_margin: f32,
    pub inputs: Vec<String>,
    pub learning_rate: f32,
    pub topology: Vec<usize>,
    pub outputs: Vec<String>,
    /// One flat vector per layer boundary, `(prev + 1) * next` entries each
    pub weights: Vec<Vec<f32>>,
}

impl NetworkParams {
    /// Fresh, untrained params with random weights
    pub fn random(
        inputs: &[String],
        outputs: &[String],
        genes: &Genes,
        rng: &mut dyn RngCore,
    ) -> Self {
        let topology = LayerTopology::mlp(inputs.len(), outputs.len(), genes.hidden_layers);
        let weights = topology.random_weights(rng);
        Self {
            accuracy: -1.0,
            activation_func: genes.activation_func,
            averages: BTreeMap::new(),
            deviations: BTreeMap::new(),
            epoch: 0,
            err_margin: 0.0,
            inputs: inputs.to_vec(),
            learning_rate: genes.learning_rate,
            topology: topology.neurons,
            outputs: outputs.to_vec(),
            weights,
        }
    }

    /// z-score of `value`, passed through untouched when the label has no stats yet
    pub fn normalize(&self, label: &str, value: f32) -> f32 {
        match (self.averages.get(label), self.deviations.get(label)) {
            (Some(avg), Some(dev)) => (value - avg) / dev,
            _ => value,
        }
    }

    pub fn denormalize(&self, label: &str, value: f32) -> f32 {
        match (self.averages.get(label), self.deviations.get(label)) {
            (Some(avg), Some(dev)) => value * dev + avg,
            _ => value,
        }
    }

    pub fn layer_topology(&self) -> NetResult<LayerTopology> {
        LayerTopology::from_widths(&self.topology)
    }

    /// Summary, not enough to rebuild the net but enough to compare it
    pub fn brief(&self, id: &str) -> BriefNet {
        BriefNet {
            id: id.to_string(),
            accuracy: self.accuracy,
            activation_func: self.activation_func,
            averages: self.averages.clone(),
            deviations: self.deviations.clone(),
            err_margin: self.err_margin,
            hidden_layers: self.topology.len().saturating_sub(2),
            inputs: self.inputs.clone(),
            learning_rate: self.learning_rate,
            outputs: self.outputs.clone(),
            kind: NetKind::Mlp,
        }
    }

    pub fn to_json(&self) -> NetResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> NetResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Stats of a net that never saw enough points are stored as `null`
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, f32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Lightweight representation of a stored net
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefNet {
    pub id: String,
    pub accuracy: f32,
    pub activation_func: ActivationFunc,
    pub averages: BTreeMap<String, f32>,
    pub deviations: BTreeMap<String, f32>,
    pub err_margin: f32,
    pub hidden_layers: usize,
    pub inputs: Vec<String>,
    pub learning_rate: f32,
    pub outputs: Vec<String>,
    #[serde(rename = "type")]
    pub kind: NetKind,
}

#[cfg(test)]
pub(crate) fn sample_params() -> NetworkParams {
    NetworkParams {
        accuracy: -1.0,
        activation_func: ActivationFunc::BipolarSigmoid,
        averages: BTreeMap::new(),
        deviations: BTreeMap::new(),
        epoch: 0,
        err_margin: 0.0,
        inputs: vec!["subs".to_string(), "events".to_string()],
        learning_rate: 0.25,
        topology: vec![2, 2, 1],
        outputs: vec!["size".to_string()],
        weights: vec![vec![0.4, 0.7, -0.2, 0.6, -0.4, 0.3], vec![-0.3, 0.5, 0.1]],
    }
}
