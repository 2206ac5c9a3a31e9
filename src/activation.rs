use crate::*;

/// Activation functions a network can be built with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationFunc {
    #[serde(rename = "bipolar-sigmoid")]
    BipolarSigmoid,
}

impl ActivationFunc {
    /// Every supported function, used both for sampling and validation
    pub const ALL: [ActivationFunc; 1] = [ActivationFunc::BipolarSigmoid];

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunc::BipolarSigmoid => "bipolar-sigmoid",
        }
    }

    /// Uniformly random pick from [`ActivationFunc::ALL`]
    pub fn random(rng: &mut dyn RngCore) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn apply(&self, x: f32) -> f32 {
        match self {
            ActivationFunc::BipolarSigmoid => bipolar_sigmoid(x),
        }
    }

    /// Derivative expressed in terms of the function's output `y`
    pub fn derive(&self, y: f32) -> f32 {
        match self {
            ActivationFunc::BipolarSigmoid => bipolar_sigmoid_derived(y),
        }
    }
}

impl std::fmt::Display for ActivationFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationFunc {
    type Err = NetError;

    fn from_str(s: &str) -> NetResult<Self> {
        Self::ALL
            .iter()
            .find(|func| func.name() == s)
            .copied()
            .ok_or_else(|| NetError::UnknownActivation(s.to_string()))
    }
}

/// F(x) = 2/(1+e^-x) - 1
pub fn bipolar_sigmoid(x: f32) -> f32 {
    (2.0 / (1.0 + (-(x as f64)).exp()) - 1.0) as f32
}

/// F'(y) = 0.5*(1+y)*(1-y), avoids recomputing the exponential
pub fn bipolar_sigmoid_derived(y: f32) -> f32 {
    0.5 * (1.0 + y) * (1.0 - y)
}
