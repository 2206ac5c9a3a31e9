use crate::*;

/// Номера лучшей, второй по качеству и худшей особей популяции
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ranking {
    pub first: usize,
    pub second: usize,
    pub last: usize,
}

/// Популяция конфигураций сети, которая эволюционирует к самой точной.
/// - `individuals` особи (хромосомы), их число постоянно
/// - `ranking` результат последнего ранжирования, `None` после любой замены особи
pub struct Population<R: RngCore> {
    individuals: Vec<Chromosome>,
    ranking: Option<Ranking>,
    config: TrainingConfig,
    rng: R,
}

impl<R: RngCore> Population<R> {
    /// `config.variations` случайных особей, ни одна ещё не обучена
    pub fn new(config: &TrainingConfig, mut rng: R) -> NetResult<Self> {
        //меньше трёх особей не дают трёх разных мест в рейтинге
        if config.variations < 3 {
            return Err(NetError::Config(format!(
                "a population needs at least 3 variations, got {}",
                config.variations
            )));
        }
        let individuals = (0..config.variations)
            .map(|_| {
                Chromosome::new(Genes {
                    activation_func: ActivationFunc::random(&mut rng),
                    // NOTE: диапазон [min, min + max], а не [min, max]
                    hidden_layers: rng.gen_range(0..=config.max_hidden_layers)
                        + config.min_hidden_layers,
                    //скорость обучения с шагом 0.001 в (0, 1]
                    learning_rate: rng.gen_range(1..=1000) as f32 / 1000.0,
                    kind: NetKind::random(&mut rng),
                })
            })
            .collect();
        Ok(Self {
            individuals,
            ranking: None,
            config: config.clone(),
            rng,
        })
    }

    pub fn individuals(&self) -> &[Chromosome] {
        &self.individuals
    }

    /// Результат последнего [`Population::rank`], если с тех пор особи не менялись
    pub fn ranking(&self) -> Option<Ranking> {
        self.ranking
    }

    /// Обучает необученных особей и находит лучшую, вторую и худшую.
    /// Один проход по популяции; при равенстве места наверху достаются
    /// более ранней особи.
    pub fn rank(
        &mut self,
        request: &TrainRequest,
        outputs: &[String],
        points: &[Point],
    ) -> NetResult<Ranking> {
        let mut first: Option<usize> = None;
        let mut second: Option<usize> = None;
        let mut last: Option<usize> = None;

        for i in 0..self.individuals.len() {
            //уже обученные особи не переобучаются
            self.individuals[i].check(request, outputs, points, &self.config, &mut self.rng)?;
            let fitness = |i: usize| self.individuals[i].fitness();

            //особь, которая выбыла из первой пары (или не попала в неё)
            let dropped;
            if first.map_or(true, |f| fitness(i) > fitness(f)) {
                dropped = second;
                second = first;
                first = Some(i);
            } else if second.map_or(true, |s| fitness(i) > fitness(s)) {
                dropped = second;
                second = Some(i);
            } else {
                dropped = Some(i);
            }
            //выбывшие претендуют на последнее место, при равенстве берём более позднюю
            if let Some(d) = dropped {
                if last.map_or(true, |l| fitness(d) <= fitness(l)) {
                    last = Some(d);
                }
            }
        }

        match (first, second, last) {
            (Some(first), Some(second), Some(last)) => {
                let ranking = Ranking { first, second, last };
                self.ranking = Some(ranking);
                Ok(ranking)
            }
            _ => Err(NetError::Config(format!(
                "cannot rank a population of {}",
                self.individuals.len()
            ))),
        }
    }

    /// Одно поколение: скрещивает две лучшие особи, иногда мутирует
    /// потомков и ставит лучшего потомка на место худшей особи.
    /// Ранжирует заново, если рейтинга нет.
    pub fn step(
        &mut self,
        request: &TrainRequest,
        outputs: &[String],
        points: &[Point],
    ) -> NetResult<()> {
        let ranking = match self.ranking {
            Some(ranking) => ranking,
            None => self.rank(request, outputs, points)?,
        };

        //глубина скрещивания: 0 - скорость, 1 - ещё и слои, 2 - ещё и активация
        let depth = self.rng.gen_range(0..3);
        let mut offspring =
            self.individuals[ranking.first].crossover(&self.individuals[ranking.second], depth);

        //мутация с вероятностью 1/5, по одному случайному гену у каждого потомка
        if self.rng.gen_range(0..5) == 0 {
            for child in offspring.iter_mut() {
                let gene = self.rng.gen_range(0..Genes::COUNT);
                child.mutate(gene, &mut self.rng);
            }
        }

        for child in offspring.iter_mut() {
            child.check(request, outputs, points, &self.config, &mut self.rng)?;
        }

        //при равенстве остаётся второй потомок
        let [a, b] = offspring;
        self.individuals[ranking.last] = if a.fitness() > b.fitness() { a } else { b };
        //номера мест больше не соответствуют особям
        self.ranking = None;
        Ok(())
    }

    /// Прогоняет заданное число поколений и возвращает самую точную сеть
    pub fn optimal(
        &mut self,
        request: &TrainRequest,
        outputs: &[String],
        points: &[Point],
    ) -> NetResult<Network> {
        let mut ranking = None;
        for generation in 0..self.config.generations {
            let ranked = self.rank(request, outputs, points)?;
            tracing::debug!(
                series = %request.series_id,
                generation = generation as u64,
                first = self.individuals[ranked.first].fitness(),
                second = self.individuals[ranked.second].fitness(),
                last = self.individuals[ranked.last].fitness(),
                "generation ranked"
            );
            self.step(request, outputs, points)?;
            ranking = Some(ranked);
        }

        let best = match ranking {
            //на месте худшей теперь новый потомок, он мог обойти лидера
            Some(Ranking { first, last, .. }) => {
                if self.individuals[last].fitness() > self.individuals[first].fitness() {
                    last
                } else {
                    first
                }
            }
            //поколений не было, просто ранжируем начальную популяцию
            None => self.rank(request, outputs, points)?.first,
        };

        self.individuals[best]
            .network()
            .cloned()
            .ok_or_else(|| NetError::Worker(format!("individual {} was never evaluated", best)))
    }
}
