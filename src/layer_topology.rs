use crate::*;

/// Топология сети: число нейронов по слоям, без смещений.
/// Каждый слой кроме последнего получает нейрон смещения под номером 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerTopology {
    pub neurons: Vec<usize>,
}

impl LayerTopology {
    /// `[входы, входы (x hidden_layers), выходы]`
    pub fn mlp(inputs: usize, outputs: usize, hidden_layers: usize) -> Self {
        let mut neurons = vec![inputs; hidden_layers + 1];
        neurons.push(outputs);
        Self { neurons }
    }

    pub fn from_widths(neurons: &[usize]) -> NetResult<Self> {
        if neurons.len() < 2 {
            return Err(NetError::InvalidTopology(format!(
                "at least 2 layers are required, got {}",
                neurons.len()
            )));
        }
        if let Some(layer) = neurons.iter().position(|n| *n == 0) {
            return Err(NetError::InvalidTopology(format!("layer {layer} has no neurons")));
        }
        Ok(Self { neurons: neurons.to_vec() })
    }

    pub fn hidden_layers(&self) -> usize {
        self.neurons.len().saturating_sub(2)
    }

    /// Нейронов в слое `layer` вместе со смещением
    pub fn layer_size(&self, layer: usize) -> usize {
        if layer + 1 == self.neurons.len() {
            self.neurons[layer]
        } else {
            self.neurons[layer] + 1
        }
    }

    /// Число весов между слоями `layer` и `layer + 1`
    pub fn boundary_weights(&self, layer: usize) -> usize {
        (self.neurons[layer] + 1) * self.neurons[layer + 1]
    }

    pub fn total_weights(&self) -> usize {
        (0..self.neurons.len() - 1).map(|l| self.boundary_weights(l)).sum()
    }

    /// Случайные веса в [-0.5, 0.5), по одному плоскому вектору на границу слоев
    pub fn random_weights(&self, rng: &mut dyn RngCore) -> Vec<Vec<f32>> {
        (0..self.neurons.len() - 1)
            .map(|l| {
                (0..self.boundary_weights(l))
                    .map(|_| rng.gen::<f32>() - 0.5)
                    .collect()
            })
            .collect()
    }
}

/// Сколько точек нужно, чтобы обучать сеть такой формы: десять образцов на вес
pub fn required_points(inputs: usize, outputs: usize, hidden_layers: usize) -> usize {
    LayerTopology::mlp(inputs, outputs, hidden_layers).total_weights() * 10
}
