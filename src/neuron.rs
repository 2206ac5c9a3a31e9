use crate::*;

/// Место веса в общем хранилище весов сети: `weights[boundary][offset]`,
/// граница `l` лежит между слоями `l` и `l+1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeightRef {
    pub boundary: usize,
    pub offset: usize,
}

impl WeightRef {
    /// Текущее значение веса
    pub fn get(&self, weights: &[Vec<f32>]) -> f32 {
        weights[self.boundary][self.offset]
    }
}

/// Связь с нейроном соседнего слоя
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Synapse {
    /// Номер нейрона на другом конце связи, внутри его слоя
    pub neuron: usize,
    pub weight: WeightRef,
}

/// Нейрон - наименьшая часть сети.
/// - `value` выход нейрона (у входов и смещений задается извне)
/// - `delta` ошибка нейрона при обратном распространении
/// - `inputs`, `outputs` связи со слоем ниже и слоем выше
///
/// Веса нейрону не принадлежат: оба конца связи ссылаются на одну и ту же
/// ячейку хранилища.
#[derive(Clone, Debug)]
pub struct Neuron {
    pub value: f32,
    pub delta: f32,
    inputs: Vec<Synapse>,
    outputs: Vec<Synapse>,
}

/// Значение 1.0: нейрон смещения всегда отдает единицу
impl Default for Neuron {
    fn default() -> Self {
        Self {
            value: 1.0,
            delta: 0.0,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl Neuron {
    pub fn inputs(&self) -> &[Synapse] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Synapse] {
        &self.outputs
    }

    pub fn add_input(&mut self, synapse: Synapse) {
        self.inputs.push(synapse);
    }

    pub fn add_output(&mut self, synapse: Synapse) {
        self.outputs.push(synapse);
    }

    /// Пересчет значения по слою ниже. Нейроны без входов (входной слой,
    /// смещения) сохраняют свое значение.
    pub fn refresh_value(
        &mut self,
        upstream: &[Neuron],
        weights: &[Vec<f32>],
        activation: ActivationFunc,
    ) -> f32 {
        if self.inputs.is_empty() {
            return self.value;
        }
        //взвешенная сумма входов
        let mut y_in = 0.0f32;
        for input in &self.inputs {
            y_in += upstream[input.neuron].value * input.weight.get(weights);
        }
        self.value = activation.apply(y_in);
        self.value
    }

    /// Пересчет ошибки по слою выше. Нейроны без выходов (последний слой)
    /// сохраняют свою дельту.
    pub fn refresh_delta(
        &mut self,
        downstream: &[Neuron],
        weights: &[Vec<f32>],
        activation: ActivationFunc,
    ) -> f32 {
        if self.outputs.is_empty() {
            return self.delta;
        }
        //ошибки слоя выше, взвешенные теми же весами
        let mut d_in = 0.0f32;
        for output in &self.outputs {
            d_in += downstream[output.neuron].delta * output.weight.get(weights);
        }
        self.delta = d_in * activation.derive(self.value);
        self.delta
    }
}

/// Соединяет `neurons[layer-1][from]` с `neurons[layer][to]` через `weight`.
/// Связь записывается с обеих сторон.
pub fn connect(neurons: &mut [Vec<Neuron>], layer: usize, from: usize, to: usize, weight: WeightRef) {
    neurons[layer][to].add_input(Synapse { neuron: from, weight });
    neurons[layer - 1][from].add_output(Synapse { neuron: to, weight });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair() -> (Vec<Vec<Neuron>>, Vec<Vec<f32>>) {
        // bias + 2 inputs -> 1 output
        let mut neurons = vec![vec![Neuron::default(); 3], vec![Neuron::default()]];
        let weights = vec![vec![0.1, 0.5, -0.25]];
        for n in 0..3 {
            connect(&mut neurons, 1, n, 0, WeightRef { boundary: 0, offset: n });
        }
        (neurons, weights)
    }

    #[test]
    fn value_without_inputs_is_kept() {
        let (mut neurons, weights) = pair();
        neurons[0][1].value = 0.3;
        let (first, _) = neurons.split_at_mut(1);
        let upstream: Vec<Neuron> = Vec::new();
        let v = first[0][1].refresh_value(&upstream, &weights, ActivationFunc::BipolarSigmoid);
        assert_relative_eq!(v, 0.3);
    }

    #[test]
    fn value_from_inputs() {
        let (mut neurons, weights) = pair();
        neurons[0][1].value = 0.5;
        neurons[0][2].value = -1.0;
        let (first, rest) = neurons.split_at_mut(1);
        let v = rest[0][0].refresh_value(&first[0], &weights, ActivationFunc::BipolarSigmoid);
        // 1*0.1 + 0.5*0.5 + -1*-0.25 = 0.6
        assert_relative_eq!(v, bipolar_sigmoid(0.6));
        assert_relative_eq!(rest[0][0].value, v);
        // upstream untouched
        assert_relative_eq!(first[0][1].value, 0.5);
    }

    #[test]
    fn delta_from_outputs() {
        let (mut neurons, weights) = pair();
        neurons[1][0].delta = 0.2;
        neurons[0][1].value = 0.5;
        let (first, rest) = neurons.split_at_mut(1);
        let d = first[0][1].refresh_delta(&rest[0], &weights, ActivationFunc::BipolarSigmoid);
        assert_relative_eq!(d, 0.2 * 0.5 * bipolar_sigmoid_derived(0.5));
        // last layer keeps its delta
        let d = rest[0][0].refresh_delta(&[], &weights, ActivationFunc::BipolarSigmoid);
        assert_relative_eq!(d, 0.2);
    }

    #[test]
    fn shared_weight_refs() {
        let (neurons, _) = pair();
        for n in 0..3 {
            assert_eq!(neurons[0][n].outputs()[0].weight, neurons[1][0].inputs()[n].weight);
        }
    }
}
