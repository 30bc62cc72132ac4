//! Randomized statement generation.
//!
//! Each worker owns one generator seeded from the run seed and its worker
//! index, so a seeded run replays the same statement stream per worker.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::{
    Assignment, OperationKind, OperationMix, Predicate, SelectShape, Statement, StressRow,
    TableRef, WorkerId, WorkloadConfig,
};

/// Rows are bucketed into `cat_0..cat_{CATEGORY_COUNT - 1}` by id.
const CATEGORY_COUNT: i64 = 10;
const STATUSES: &[&str] = &["Active", "Pending", "Inactive", "Processing", "Completed"];
const PAYLOAD_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PAYLOAD_LEN: usize = 20;
/// Predicates target ids in `1..=DEFAULT_ID_SPACE` when the table was not pre-populated.
const DEFAULT_ID_SPACE: i64 = 10_000;

pub fn derive_worker_seed(seed: u64, worker_index: u64) -> u64 {
    let mut x = seed ^ (worker_index << 1);
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

pub struct StatementGenerator {
    rng: StdRng,
    table: TableRef,
    worker_label: String,
    mix: OperationMix,
    rows_per_insert: u32,
    id_space: i64,
}

impl StatementGenerator {
    pub fn new(
        table: TableRef,
        worker: &WorkerId,
        worker_index: u64,
        config: &WorkloadConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(derive_worker_seed(seed, worker_index)),
            None => StdRng::from_entropy(),
        };
        let id_space = if config.prepopulate_rows == 0 {
            DEFAULT_ID_SPACE
        } else {
            i64::try_from(config.prepopulate_rows).unwrap_or(i64::MAX)
        };
        Self {
            rng,
            table,
            worker_label: worker.to_string(),
            mix: config.mix,
            rows_per_insert: config.rows_per_insert,
            id_space,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn next_kind(&mut self) -> OperationKind {
        if let Some(kind) = self.mix.single_kind() {
            return kind;
        }
        let total = self.mix.total_weight().max(1);
        let point = self.rng.gen_range(0..total);
        self.mix.pick(point).unwrap_or(OperationKind::Select)
    }

    pub fn statement(&mut self, kind: OperationKind, sequence: u32) -> Statement {
        match kind {
            OperationKind::Insert => self.insert(sequence),
            OperationKind::Update => self.update(),
            OperationKind::Delete => self.delete(),
            OperationKind::Select => self.select(),
        }
    }

    fn insert(&mut self, sequence: u32) -> Statement {
        let batch_size = i64::from(self.rows_per_insert);
        let batch_id = i64::from(sequence);
        let base_id = batch_id * batch_size + self.rng.gen_range(1..=1_000_000);
        let rows = (0..batch_size)
            .map(|offset| {
                let id = base_id + offset;
                let name = format!("stress_{}_{}_{}", self.worker_label, batch_id, offset);
                let value = round2(self.rng.gen_range(1.0..1000.0));
                let status = pick(&mut self.rng, STATUSES);
                let random_data = payload(&mut self.rng);
                StressRow {
                    id,
                    batch_id,
                    worker: self.worker_label.clone(),
                    category: category_of(id),
                    thread_group: format!("group_{}", id % 100),
                    name,
                    value,
                    status,
                    priority: self.rng.gen_range(1..=5),
                    version: 1,
                    random_data,
                }
            })
            .collect();
        Statement::Insert {
            table: self.table.clone(),
            rows,
        }
    }

    fn id_range(&mut self, min_width: i64, max_width: i64) -> (i64, i64) {
        let upper_start = (self.id_space - max_width).max(1);
        let low = self.rng.gen_range(1..=upper_start);
        let high = low + self.rng.gen_range(min_width..=max_width);
        (low, high)
    }

    fn update(&mut self) -> Statement {
        let (assignments, predicate) = match self.rng.gen_range(0..6) {
            0 => {
                let (low, high) = self.id_range(1, 100);
                (
                    vec![
                        Assignment::SetValue(round2(self.rng.gen_range(10.0..2000.0))),
                        Assignment::Touch,
                        Assignment::BumpVersion,
                    ],
                    Predicate::IdBetween { low, high },
                )
            }
            1 => (
                vec![
                    Assignment::SetStatus(pick(&mut self.rng, STATUSES)),
                    Assignment::Touch,
                    Assignment::BumpVersion,
                ],
                Predicate::All(vec![
                    Predicate::CategoryIs(self.category()),
                    Predicate::PriorityAbove(self.rng.gen_range(1..=3)),
                ]),
            ),
            2 => (
                vec![
                    Assignment::SetPriority(self.rng.gen_range(1..=5)),
                    Assignment::Touch,
                    Assignment::BumpVersion,
                ],
                Predicate::ValueAbove(f64::from(self.rng.gen_range(100..=800_i32))),
            ),
            3 => (
                vec![
                    Assignment::SetCategory(self.category()),
                    Assignment::Touch,
                    Assignment::BumpVersion,
                ],
                Predicate::All(vec![
                    Predicate::StatusIs(pick(&mut self.rng, STATUSES)),
                    Predicate::IdModulo {
                        modulus: 10,
                        remainder: self.rng.gen_range(0..10),
                    },
                ]),
            ),
            4 => (
                vec![Assignment::BumpVersion, Assignment::Touch],
                Predicate::All(vec![
                    Predicate::ValueAbove(f64::from(self.rng.gen_range(50..=500_i32))),
                    Predicate::PriorityAtMost(3),
                ]),
            ),
            _ => (
                vec![
                    Assignment::ScaleValue(round2(self.rng.gen_range(0.8..1.2))),
                    Assignment::SetStatus(pick(&mut self.rng, STATUSES)),
                    Assignment::Touch,
                    Assignment::BumpVersion,
                ],
                Predicate::All(vec![
                    Predicate::CategoryIs(self.category()),
                    Predicate::VersionBelow(5),
                ]),
            ),
        };
        Statement::Update {
            table: self.table.clone(),
            assignments,
            predicate,
        }
    }

    fn delete(&mut self) -> Statement {
        let predicate = match self.rng.gen_range(0..5) {
            0 => {
                let (low, high) = self.id_range(10, 100);
                Predicate::IdBetween { low, high }
            }
            1 => Predicate::CategoryIs(self.category()),
            2 => Predicate::ThreadGroupIs(format!("group_{}", self.rng.gen_range(0..100))),
            3 => {
                let low = round2(self.rng.gen_range(1.0..500.0));
                let high = round2(low + self.rng.gen_range(50.0..200.0));
                Predicate::ValueBetween { low, high }
            }
            _ => {
                let modulus = self.rng.gen_range(50..=200);
                Predicate::IdModulo {
                    modulus,
                    remainder: self.rng.gen_range(0..modulus),
                }
            }
        };
        Statement::Delete {
            table: self.table.clone(),
            predicate,
        }
    }

    fn select(&mut self) -> Statement {
        let shape = match self.rng.gen_range(0..5) {
            0 => SelectShape::Count,
            1 => SelectShape::CountPerPartition,
            2 => SelectShape::AvgValuePerPartition,
            3 => SelectShape::Latest { limit: 10 },
            _ => SelectShape::ValueExtremesPerName { limit: 5 },
        };
        let predicate = (shape == SelectShape::Count && self.rng.gen_bool(0.5))
            .then(|| Predicate::ValueAbove(f64::from(self.rng.gen_range(100..=500_i32))));
        Statement::Select {
            table: self.table.clone(),
            shape,
            predicate,
        }
    }

    fn category(&mut self) -> String {
        category_of(self.rng.gen_range(0..CATEGORY_COUNT))
    }
}

/// Insert statements that fill ids `1..=total_rows` in batches of `batch_size`.
pub fn population_batches(
    table: &TableRef,
    total_rows: u64,
    batch_size: u32,
    seed: Option<u64>,
) -> Vec<Statement> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(derive_worker_seed(seed, u64::MAX)),
        None => StdRng::from_entropy(),
    };
    let total = i64::try_from(total_rows).unwrap_or(i64::MAX);
    let batch = i64::from(batch_size.max(1));

    let mut statements = Vec::new();
    let mut start = 1;
    while start <= total {
        let end = (start + batch - 1).min(total);
        let rows = (start..=end)
            .map(|id| StressRow {
                id,
                batch_id: (id - 1) / batch,
                worker: "populate".to_string(),
                category: category_of(id),
                thread_group: format!("group_{}", id % 100),
                name: format!("item_{}", id),
                value: round2(rng.gen_range(1.0..1000.0)),
                status: pick(&mut rng, STATUSES),
                priority: rng.gen_range(1..=5),
                version: 1,
                random_data: payload(&mut rng),
            })
            .collect();
        statements.push(Statement::Insert {
            table: table.clone(),
            rows,
        });
        start = end + 1;
    }
    statements
}

fn category_of(id: i64) -> String {
    format!("cat_{}", id.rem_euclid(CATEGORY_COUNT))
}

fn pick(rng: &mut StdRng, choices: &[&str]) -> String {
    choices.choose(rng).copied().unwrap_or_default().to_string()
}

fn payload(rng: &mut StdRng) -> String {
    (0..PAYLOAD_LEN)
        .map(|_| char::from(PAYLOAD_ALPHABET[rng.gen_range(0..PAYLOAD_ALPHABET.len())]))
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
