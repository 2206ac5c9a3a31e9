use crate::*;
use std::ops::Range;

/// Многослойный персептрон.
/// - `params` хранимое состояние сети: топология, веса, нормализация
/// - `neurons` нейроны по слоям, в каждом слое кроме последнего нулевой
///   нейрон смещения; значения и дельты живут здесь между проходами
/// - `neuron_count` все нейроны сети вместе со смещениями
///
/// Расчет меняет состояние нейронов, один экземпляр нельзя использовать
/// из двух мест одновременно.
#[derive(Clone, Debug)]
pub struct Mlp {
    id: String,
    params: NetworkParams,
    neurons: Vec<Vec<Neuron>>,
    neuron_count: usize,
}

impl Mlp {
    /// Новая сеть со случайными весами
    pub fn new(
        id: &str,
        inputs: &[String],
        outputs: &[String],
        genes: &Genes,
        rng: &mut dyn RngCore,
    ) -> NetResult<Self> {
        Self::from_params(id, NetworkParams::random(inputs, outputs, genes, rng))
    }

    /// Сеть, собранная по сохраненным параметрам. Число весов проверяется
    /// до соединения нейронов.
    pub fn from_params(id: &str, params: NetworkParams) -> NetResult<Self> {
        let topology = params.layer_topology()?;
        Self::check_params(&topology, &params)?;

        let last = topology.neurons.len() - 1;
        //пустые нейроны по слоям, размер слоя уже учитывает смещение
        let mut neurons: Vec<Vec<Neuron>> = (0..=last)
            .map(|l| vec![Neuron::default(); topology.layer_size(l)])
            .collect();
        let neuron_count = neurons.iter().map(Vec::len).sum();

        for layer in 1..=last {
            let prev = neurons[layer - 1].len();
            //нейрон смещения (j = 0 во всех слоях кроме последнего) входов не имеет
            let first = if layer == last { 0 } else { 1 };
            for j in first..neurons[layer].len() {
                //веса нейрона j лежат подряд: по одному на каждый нейрон слоя ниже
                let section = (j - first) * prev;
                for n in 0..prev {
                    tracing::trace!(
                        net = id,
                        "connecting L{}N{} to L{}N{} with weight {}:{}",
                        layer - 1,
                        n,
                        layer,
                        j,
                        layer - 1,
                        section + n
                    );
                    connect(
                        &mut neurons,
                        layer,
                        n,
                        j,
                        WeightRef { boundary: layer - 1, offset: section + n },
                    );
                }
            }
        }

        Ok(Self {
            id: id.to_string(),
            params,
            neurons,
            neuron_count,
        })
    }

    fn check_params(topology: &LayerTopology, params: &NetworkParams) -> NetResult<()> {
        let layers = topology.neurons.len();
        if params.inputs.len() != topology.neurons[0] {
            return Err(NetError::InvalidTopology(format!(
                "{} input labels for {} input neurons",
                params.inputs.len(),
                topology.neurons[0]
            )));
        }
        if params.outputs.len() != topology.neurons[layers - 1] {
            return Err(NetError::InvalidTopology(format!(
                "{} output labels for {} output neurons",
                params.outputs.len(),
                topology.neurons[layers - 1]
            )));
        }
        if params.weights.len() != layers - 1 {
            return Err(NetError::InvalidTopology(format!(
                "{} weight sets for {} layer boundaries",
                params.weights.len(),
                layers - 1
            )));
        }
        for (boundary, weights) in params.weights.iter().enumerate() {
            if weights.len() != topology.boundary_weights(boundary) {
                return Err(NetError::InvalidTopology(format!(
                    "boundary {} has {} weights, expected {}",
                    boundary,
                    weights.len(),
                    topology.boundary_weights(boundary)
                )));
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn into_params(self) -> NetworkParams {
        self.params
    }

    /// Число нейронов вместе со смещениями
    pub fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    /// Расчет в прямом направлении. Входы и выходы по меткам, выходы
    /// возвращаются в исходном масштабе (денормализованные)
    pub fn evaluate(&mut self, inputs: &HashMap<String, f32>) -> NetResult<HashMap<String, f32>> {
        let width = self.neurons[0].len() - 1;
        if inputs.len() < width {
            return Err(NetError::InputCountMismatch {
                expected: width,
                got: inputs.len(),
            });
        }
        for (n, label) in self.params.inputs.iter().enumerate() {
            let raw = *inputs
                .get(label)
                .ok_or_else(|| NetError::MissingValue(label.clone()))?;
            //+1 пропускает нейрон смещения
            self.neurons[0][n + 1].value = self.params.normalize(label, raw);
        }

        let activation = self.params.activation_func;
        //послойно: каждый слой читает уже посчитанный слой ниже
        for layer in 1..self.neurons.len() {
            let (done, rest) = self.neurons.split_at_mut(layer);
            let upstream = &done[layer - 1];
            for neuron in rest[0].iter_mut() {
                neuron.refresh_value(upstream, &self.params.weights, activation);
            }
        }

        let last = &self.neurons[self.neurons.len() - 1];
        Ok(self
            .params
            .outputs
            .iter()
            .enumerate()
            .map(|(n, label)| (label.clone(), self.params.denormalize(label, last[n].value)))
            .collect())
    }

    /// Обратное распространение ошибки после [`Mlp::evaluate`] на том же
    /// образце. Веса правятся сразу, по каждому образцу.
    fn backpropagate(&mut self, target: &HashMap<String, f32>) -> NetResult<()> {
        let last = self.neurons.len() - 1;
        let activation = self.params.activation_func;

        //ошибка выходного слоя, цель нормализуется как и значения нейронов
        for (i, label) in self.params.outputs.iter().enumerate() {
            let value = *target
                .get(label)
                .ok_or_else(|| NetError::MissingValue(label.clone()))?;
            let expected = self.params.normalize(label, value);
            let neuron = &mut self.neurons[last][i];
            neuron.delta = (expected - neuron.value) * activation.derive(neuron.value);
        }

        //дельты скрытых слоев сверху вниз
        for layer in (1..last).rev() {
            let (head, tail) = self.neurons.split_at_mut(layer + 1);
            let downstream = &tail[0];
            for neuron in head[layer].iter_mut() {
                neuron.refresh_delta(downstream, &self.params.weights, activation);
            }
        }

        //правка весов: скорость * дельта нейрона * значение входа
        let rate = self.params.learning_rate;
        for layer in (1..=last).rev() {
            for neuron in &self.neurons[layer] {
                for input in neuron.inputs() {
                    let upstream = self.neurons[layer - 1][input.neuron].value;
                    self.params.weights[input.weight.boundary][input.weight.offset] +=
                        rate * neuron.delta * upstream;
                }
            }
        }
        Ok(())
    }

    /// Пересчет средних и стандартных отклонений по обучающим точкам, точки
    /// тестового среза `test` не учитываются. Сами точки не меняются.
    fn update_norm_params(&mut self, points: &[Point], test: &Option<Range<usize>>) -> NetResult<()> {
        let train: Vec<&Point> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| !in_slice(test, *i))
            .map(|(_, p)| p)
            .collect();
        if train.len() <= 1 {
            tracing::warn!(
                net = %self.id,
                "there are not enough patterns to update the net's normalization parameters"
            );
            return Ok(());
        }
        let n = train.len() as f32;
        //метки берутся из первой точки, остальные обязаны их иметь

        let mut averages = BTreeMap::new();
        let mut deviations = BTreeMap::new();
        for label in train[0].values.keys().sorted() {
            let mut values = Vec::with_capacity(train.len());
            for point in &train {
                let value = *point
                    .values
                    .get(label)
                    .ok_or_else(|| NetError::MissingValue(label.clone()))?;
                values.push(value);
            }
            let avg = values.iter().sum::<f32>() / n;
            let sq = values.iter().map(|v| (v - avg) * (v - avg)).sum::<f32>();
            //выборочное отклонение, делитель n - 1
            let dev = ((sq / (n - 1.0)) as f64).sqrt() as f32;
            //постоянная метка не нормализуется
            if dev == 0.0 {
                return Err(NetError::DegenerateLabel(label.clone()));
            }
            averages.insert(label.clone(), avg);
            deviations.insert(label.clone(), dev);
        }
        self.params.averages = averages;
        self.params.deviations = deviations;
        Ok(())
    }

    /// Обучение сети на `points`. Возвращает точность на тестовом срезе из
    /// `floor(len * test_set)` точек, стоящем в случайном месте, или -1,
    /// если срез пустой.
    ///
    /// Останавливается через `max_epoch` эпох или когда относительное
    /// изменение ошибки между эпохами меньше `tolerance`.
    pub fn train(
        &mut self,
        points: &[Point],
        max_epoch: usize,
        err_margin: f32,
        test_set: f32,
        tolerance: f32,
        rng: &mut dyn RngCore,
    ) -> NetResult<f32> {
        let n_points = points.len();
        let n_test = ((n_points as f32 * test_set).floor().max(0.0) as usize).min(n_points);
        //тестовый срез: непрерывный кусок точек, начало случайное
        let test = if test_set > 0.0 {
            let start = rng.gen_range(0..=n_points - n_test);
            Some(start..start + n_test)
        } else {
            None
        };
        let n_train = n_points - test.as_ref().map_or(0, |t| t.len());
        tracing::debug!(
            net = %self.id,
            "training with {} patterns, {} of which will be used for testing",
            n_points,
            n_points - n_train
        );
        if n_train == 0 {
            return Err(NetError::InsufficientPoints {
                required: n_test + 1,
                available: n_points,
            });
        }

        self.update_norm_params(points, &test)?;

        //начальные значения гарантируют хотя бы одну эпоху
        let mut rmse_old = 1.0f32;
        let mut rmse_new = -1.0f32;
        let mut epoch = 0;
        while epoch < max_epoch && (1.0 - rmse_new / rmse_old).abs() >= tolerance {
            let mut diffc = 0.0f32;
            for (i, point) in points.iter().enumerate() {
                if in_slice(&test, i) {
                    continue;
                }
                let outputs = self.evaluate(&point.values)?;
                self.backpropagate(&point.values)?;
                //выходы денормализованы, как и сами точки
                for (label, output) in &outputs {
                    let target = point.values[label];
                    diffc += (output - target) * (output - target);
                }
            }
            rmse_old = rmse_new;
            //ошибка копится за всю эпоху и делится на образцы * нейроны
            rmse_new = diffc / (n_train * self.neuron_count) as f32;
            epoch += 1;
        }
        self.params.epoch = epoch;
        tracing::debug!(net = %self.id, epoch = epoch as u64, rmse = rmse_new, "training finished");

        let test = match test {
            Some(test) if !test.is_empty() => test,
            _ => return Ok(-1.0),
        };
        //ошибкой считается образец, у которого хоть один выход вне err_margin
        let mut errs = 0usize;
        for point in &points[test.clone()] {
            let outputs = self.evaluate(&point.values)?;
            for label in &self.params.outputs {
                let target = *point
                    .values
                    .get(label)
                    .ok_or_else(|| NetError::MissingValue(label.clone()))?;
                if (outputs[label] - target).abs() > err_margin {
                    errs += 1;
                    break;
                }
            }
        }
        self.params.err_margin = err_margin;
        self.params.accuracy = 1.0 - errs as f32 / test.len() as f32;
        Ok(self.params.accuracy)
    }
}

/// Номер точки попадает в тестовый срез
fn in_slice(slice: &Option<Range<usize>>, i: usize) -> bool {
    slice.as_ref().map_or(false, |s| s.contains(&i))
}
