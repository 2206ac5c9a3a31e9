use crate::*;

/// Конфигурация сети, которую кодирует хромосома
#[derive(Clone, Debug, PartialEq)]
pub struct Genes {
    pub activation_func: ActivationFunc,
    pub hidden_layers: usize,
    pub learning_rate: f32,
    pub kind: NetKind,
}

impl Genes {
    /// Число генов, которые умеет менять `Chromosome::mutate`
    pub const COUNT: usize = 3;
}

#[derive(Clone, Debug)]
pub enum Evaluation {
    Unevaluated,
    Evaluated { network: Network, fitness: f32 },
}

/// Конфигурация сети вместе с результатом ее обучения
#[derive(Clone, Debug)]
pub struct Chromosome {
    genes: Genes,
    evaluation: Evaluation,
}

impl Chromosome {
    pub fn new(genes: Genes) -> Self {
        Self {
            genes,
            evaluation: Evaluation::Unevaluated,
        }
    }

    pub fn genes(&self) -> &Genes {
        &self.genes
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(self.evaluation, Evaluation::Evaluated { .. })
    }

    /// Пригодность обученной сети, -1 пока не было [`Chromosome::check`]
    pub fn fitness(&self) -> f32 {
        match &self.evaluation {
            Evaluation::Unevaluated => -1.0,
            Evaluation::Evaluated { fitness, .. } => *fitness,
        }
    }

    pub fn network(&self) -> Option<&Network> {
        match &self.evaluation {
            Evaluation::Unevaluated => None,
            Evaluation::Evaluated { network, .. } => Some(network),
        }
    }

    pub fn into_network(self) -> Option<Network> {
        match self.evaluation {
            Evaluation::Unevaluated => None,
            Evaluation::Evaluated { network, .. } => Some(network),
        }
    }

    /// Обучает сеть с этой конфигурацией и запоминает ее пригодность.
    /// Уже оцененная хромосома не переобучается.
    pub fn check(
        &mut self,
        request: &TrainRequest,
        outputs: &[String],
        points: &[Point],
        config: &TrainingConfig,
        rng: &mut dyn RngCore,
    ) -> NetResult<()> {
        if self.is_evaluated() {
            return Ok(());
        }
        let id = network_id(&request.series_id, &request.inputs, outputs, self.genes.kind);
        let mut network = Network::new(&id, &request.inputs, outputs, &self.genes, rng)?;
        let fitness = network.train(
            points,
            config.max_epoch,
            request.err_margin,
            config.test_set,
            config.tolerance,
            rng,
        )?;
        self.evaluation = Evaluation::Evaluated { network, fitness };
        Ok(())
    }

    /// Два неоцененных потомка. Скорость обучения меняется всегда,
    /// при `depth >= 1` еще и число скрытых слоев, при `depth >= 2` и
    /// функция активации. Вид сети остается от родителя.
    pub fn crossover(&self, other: &Chromosome, depth: usize) -> [Chromosome; 2] {
        let mut a = self.genes.clone();
        let mut b = other.genes.clone();
        std::mem::swap(&mut a.learning_rate, &mut b.learning_rate);
        if depth >= 1 {
            std::mem::swap(&mut a.hidden_layers, &mut b.hidden_layers);
        }
        if depth >= 2 {
            std::mem::swap(&mut a.activation_func, &mut b.activation_func);
        }
        [Chromosome::new(a), Chromosome::new(b)]
    }

    /// Случайно меняет ген `gene` (0 активация, 1 скрытые слои, 2 скорость
    /// обучения). Неизвестные гены пропускаются.
    pub fn mutate(&mut self, gene: usize, rng: &mut dyn RngCore) {
        match gene {
            0 => self.genes.activation_func = ActivationFunc::random(rng),
            1 => {
                if self.genes.hidden_layers <= 1 {
                    self.genes.hidden_layers = 2;
                } else if rng.gen_bool(0.5) {
                    self.genes.hidden_layers += 1;
                } else {
                    self.genes.hidden_layers -= 1;
                }
            }
            2 => {
                //единица первой значащей цифры: 0.123 -> 0.1, 0.02 -> 0.01
                let unit = 1.0 / 10f32.powi(decimals(self.genes.learning_rate) as i32);
                let rate = self.genes.learning_rate;
                //ровно одна единица может только расти, иначе скорость обнулится
                self.genes.learning_rate = if rate <= unit {
                    2.0 * unit
                } else if rng.gen_bool(0.5) {
                    rate + unit
                } else {
                    rate - unit
                };
            }
            _ => return,
        }
        self.evaluation = Evaluation::Unevaluated;
    }
}

/// Разряд первой значащей десятичной цифры: 0.5 -> 1, 0.01 -> 2,
/// все что >= 1 -> 0
pub fn decimals(number: f32) -> u32 {
    if number.is_nan() || number <= 0.0 {
        return 0;
    }
    let mut scaled = number as f64;
    let mut count = 0;
    //0.01 после перевода в f64 равно 0.00999..., отсюда допуск
    while scaled < 1.0 - 1e-6 && count < 38 {
        scaled *= 10.0;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn genes(hidden_layers: usize, learning_rate: f32) -> Genes {
        Genes {
            activation_func: ActivationFunc::BipolarSigmoid,
            hidden_layers,
            learning_rate,
            kind: NetKind::Mlp,
        }
    }

    fn request() -> TrainRequest {
        TrainRequest {
            series_id: "test".to_string(),
            inputs: vec!["events".to_string(), "subs".to_string()],
            outputs: vec!["size".to_string()],
            err_margin: 0.5,
            required: 10,
        }
    }

    fn points(n: usize) -> Vec<Point> {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        (0..n)
            .map(|i| {
                let subs: f32 = rng.gen_range(0.0..10.0);
                let events: f32 = rng.gen_range(0.0..10.0);
                Point {
                    labels: HashMap::new(),
                    values: [("subs", subs), ("events", events), ("size", subs - events)]
                        .iter()
                        .map(|(l, v)| (l.to_string(), *v))
                        .collect(),
                    timestamp: i as i64,
                }
            })
            .collect()
    }

    #[test]
    fn decimal_places() {
        assert_eq!(decimals(0.5), 1);
        assert_eq!(decimals(0.123), 1);
        assert_eq!(decimals(0.01), 2);
        assert_eq!(decimals(0.001), 3);
        assert_eq!(decimals(0.035), 2);
        assert_eq!(decimals(1.0), 0);
        assert_eq!(decimals(3.5), 0);
        assert_eq!(decimals(0.0), 0);
    }

    #[test]
    fn hidden_layer_mutation() {
        let mut rng = ChaCha8Rng::from_seed(Default::default());
        for _ in 0..20 {
            let mut c = Chromosome::new(genes(1, 0.1));
            c.mutate(1, &mut rng);
            assert_eq!(c.genes().hidden_layers, 2);
        }
        for _ in 0..20 {
            let mut c = Chromosome::new(genes(3, 0.1));
            c.mutate(1, &mut rng);
            assert!([2, 4].contains(&c.genes().hidden_layers));
        }
    }

    #[test]
    fn learning_rate_mutation() {
        let mut rng = ChaCha8Rng::from_seed(Default::default());
        for _ in 0..20 {
            let mut c = Chromosome::new(genes(1, 0.01));
            c.mutate(2, &mut rng);
            assert_relative_eq!(c.genes().learning_rate, 0.02);
        }
        let mut seen = Vec::new();
        for _ in 0..50 {
            let mut c = Chromosome::new(genes(1, 0.02));
            c.mutate(2, &mut rng);
            let rate = c.genes().learning_rate;
            assert!((rate - 0.01).abs() < 1e-6 || (rate - 0.03).abs() < 1e-6, "{}", rate);
            seen.push((rate * 100.0).round() as i32);
        }
        assert!(seen.contains(&1) && seen.contains(&3));

        let mut c = Chromosome::new(genes(1, 0.3));
        c.mutate(2, &mut rng);
        let rate = c.genes().learning_rate;
        assert!((rate - 0.2).abs() < 1e-6 || (rate - 0.4).abs() < 1e-6, "{}", rate);
    }

    /// Младшие разряды скорости сохраняются, меняется только первая значащая цифра
    #[test]
    fn learning_rate_mutation_keeps_lower_digits() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for (start, down, up) in [
            (0.123, 0.023, 0.223),
            (0.15, 0.05, 0.25),
            (0.347, 0.247, 0.447),
            (0.149, 0.049, 0.249),
        ] {
            let (mut went_down, mut went_up) = (false, false);
            for _ in 0..50 {
                let mut c = Chromosome::new(genes(1, start));
                c.mutate(2, &mut rng);
                let rate = c.genes().learning_rate;
                if (rate - down).abs() < 1e-6 {
                    went_down = true;
                } else if (rate - up).abs() < 1e-6 {
                    went_up = true;
                } else {
                    panic!("{} mutated to {}", start, rate);
                }
            }
            assert!(went_down && went_up, "{}", start);
        }
    }

    #[test]
    fn unknown_gene() {
        let mut rng = ChaCha8Rng::from_seed(Default::default());
        let mut c = Chromosome::new(genes(2, 0.5));
        c.check(&request(), &["size".to_string()], &points(20), &TrainingConfig::default(), &mut rng)
            .unwrap();
        c.mutate(7, &mut rng);
        assert_eq!(c.genes(), &genes(2, 0.5));
        assert!(c.is_evaluated());

        c.mutate(0, &mut rng);
        assert!(!c.is_evaluated());
        assert_eq!(c.fitness(), -1.0);
    }

    #[test]
    fn crossover_depths() {
        let a = Chromosome::new(genes(1, 0.1));
        let b = Chromosome::new(Genes {
            activation_func: ActivationFunc::BipolarSigmoid,
            hidden_layers: 4,
            learning_rate: 0.7,
            kind: NetKind::Mlp,
        });

        let [x, y] = a.crossover(&b, 0);
        assert_eq!(x.genes().learning_rate, 0.7);
        assert_eq!(y.genes().learning_rate, 0.1);
        assert_eq!(x.genes().hidden_layers, 1);
        assert_eq!(y.genes().hidden_layers, 4);

        let [x, y] = a.crossover(&b, 1);
        assert_eq!(x.genes().hidden_layers, 4);
        assert_eq!(y.genes().hidden_layers, 1);

        let [x, y] = a.crossover(&b, 2);
        assert_eq!(x.genes().learning_rate, 0.7);
        assert_eq!(x.genes().hidden_layers, 4);
        assert_eq!(x.genes().activation_func, b.genes().activation_func);
        assert_eq!(y.genes().activation_func, a.genes().activation_func);
        assert_eq!(x.genes().kind, a.genes().kind);
        assert_eq!(y.genes().kind, b.genes().kind);
    }

    #[test]
    fn offspring_are_unevaluated() {
        let mut rng = ChaCha8Rng::from_seed(Default::default());
        let config = TrainingConfig::default();
        let outputs = vec!["size".to_string()];
        let pts = points(20);
        let mut a = Chromosome::new(genes(1, 0.1));
        let mut b = Chromosome::new(genes(2, 0.2));
        a.check(&request(), &outputs, &pts, &config, &mut rng).unwrap();
        b.check(&request(), &outputs, &pts, &config, &mut rng).unwrap();
        assert!(a.is_evaluated() && b.is_evaluated());

        for child in a.crossover(&b, 2) {
            assert!(!child.is_evaluated());
            assert_eq!(child.fitness(), -1.0);
            assert!(child.network().is_none());
        }
    }

    #[test]
    fn check_trains_once() {
        let mut rng = ChaCha8Rng::from_seed(Default::default());
        let config = TrainingConfig {
            max_epoch: 50,
            ..TrainingConfig::default()
        };
        let outputs = vec!["size".to_string()];
        let pts = points(20);
        let mut c = Chromosome::new(genes(1, 0.05));
        c.check(&request(), &outputs, &pts, &config, &mut rng).unwrap();
        let fitness = c.fitness();
        assert!((0.0..=1.0).contains(&fitness));

        let network = c.network().unwrap();
        assert_eq!(network.id(), network_id("test", &request().inputs, &outputs, NetKind::Mlp));
        assert_eq!(network.params().accuracy, fitness);
        let weights = network.params().weights.clone();

        c.check(&request(), &outputs, &pts, &config, &mut rng).unwrap();
        assert_eq!(c.network().unwrap().params().weights, weights);
    }
}
