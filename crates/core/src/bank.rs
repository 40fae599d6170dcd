use std::cmp::Ordering;
use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;

use crate::model::{Difficulty, Question};

/// Random draws per catalog entry allowed while topping up an undershoot
/// before falling back to sampling from the unselected remainder.
const UNDERSHOOT_RETRY_FACTOR: usize = 32;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankError {
    #[error("question count cannot be negative, got {requested}")]
    NegativeCount { requested: i64 },
}

//
// ─── QUESTION BANK ─────────────────────────────────────────────────────────────
//

/// Fixed catalog of quiz questions with difficulty-proportional sampling.
///
/// The catalog is set at construction and never mutated, so a bank can be
/// shared behind an `Arc` by every chat session. Randomness is always supplied
/// by the caller.
///
/// # Examples
///
/// ```
/// # use placement_core::QuestionBank;
/// # use placement_core::model::{Difficulty, Question};
/// use rand::SeedableRng;
///
/// let q = |text: &str, d: i64| {
///     Question::new(text, "yes", vec!["no".into()], Difficulty::new(d).unwrap()).unwrap()
/// };
/// let bank = QuestionBank::new(vec![q("a", 1), q("b", 1), q("c", 3)]);
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
///
/// let quiz = bank.request_quiz(2, &mut rng)?;
/// assert_eq!(quiz.len(), 2);
/// assert!(bank.request_quiz(-1, &mut rng).is_err());
/// # Ok::<(), placement_core::BankError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Catalog indices grouped by difficulty, easiest first.
    #[must_use]
    pub fn strata(&self) -> BTreeMap<Difficulty, Vec<usize>> {
        let mut strata: BTreeMap<Difficulty, Vec<usize>> = BTreeMap::new();
        for (idx, q) in self.questions.iter().enumerate() {
            strata.entry(q.difficulty()).or_default().push(idx);
        }
        strata
    }

    /// Selects questions for a quiz of `count` questions.
    ///
    /// # Errors
    ///
    /// Returns `BankError::NegativeCount` when `count < 0`. Counts above the
    /// catalog size are clamped, not rejected.
    pub fn request_quiz<R: Rng + ?Sized>(
        &self,
        count: i64,
        rng: &mut R,
    ) -> Result<Vec<Question>, BankError> {
        let count = usize::try_from(count)
            .map_err(|_| BankError::NegativeCount { requested: count })?;
        Ok(self.sample(count, rng))
    }

    /// Owned copies of the questions picked by [`Self::sample_indices`].
    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        self.sample_indices(count, rng)
            .into_iter()
            .map(|idx| self.questions[idx].clone())
            .collect()
    }

    /// Picks `min(count, len)` distinct catalog indices in random order.
    ///
    /// Each difficulty stratum gets a quota proportional to its share of the
    /// catalog (rounded half-to-even, at least one per non-empty stratum),
    /// then the selection is topped up or trimmed at random to the exact
    /// count and shuffled.
    ///
    /// Topping up draws from the whole catalog and rejects duplicates; the
    /// number of draws is capped, see [`UNDERSHOOT_RETRY_FACTOR`].
    #[must_use]
    pub fn sample_indices<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<usize> {
        let total = self.questions.len();
        let count = count.min(total);
        if count == 0 {
            return Vec::new();
        }

        let strata = self.strata();
        let mut selected: Vec<usize> = Vec::with_capacity(count + strata.len());
        let mut chosen = vec![false; total];

        for members in strata.values() {
            let take = quota(count, members.len(), total)
                .max(1)
                .min(members.len());
            for &idx in members.choose_multiple(rng, take) {
                chosen[idx] = true;
                selected.push(idx);
            }
        }

        let max_attempts = total.saturating_mul(UNDERSHOOT_RETRY_FACTOR);
        fill_undershoot(&mut selected, &mut chosen, count, max_attempts, rng);

        self.trim_overshoot(&mut selected, count, rng);

        selected.shuffle(rng);
        selected
    }

    /// Removes random entries until `count` remain.
    ///
    /// Entries that are the last pick of their stratum are only removed when
    /// nothing else is left to remove, so stratum coverage survives trimming
    /// whenever `count` is at least the number of strata.
    fn trim_overshoot<R: Rng + ?Sized>(
        &self,
        selected: &mut Vec<usize>,
        count: usize,
        rng: &mut R,
    ) {
        let mut per_stratum: BTreeMap<Difficulty, usize> = BTreeMap::new();
        for &idx in selected.iter() {
            *per_stratum.entry(self.questions[idx].difficulty()).or_default() += 1;
        }

        while selected.len() > count {
            let removable: Vec<usize> = (0..selected.len())
                .filter(|&pos| {
                    per_stratum
                        .get(&self.questions[selected[pos]].difficulty())
                        .is_some_and(|n| *n > 1)
                })
                .collect();
            let pos = match removable.choose(rng) {
                Some(&pos) => pos,
                None => rng.random_range(0..selected.len()),
            };
            let removed = selected.swap_remove(pos);
            if let Some(n) = per_stratum.get_mut(&self.questions[removed].difficulty()) {
                *n -= 1;
            }
        }
    }
}

/// Quota for a stratum: `count * stratum / total`, rounded half-to-even.
///
/// Computed in integers so `.5` boundaries are exact.
#[must_use]
pub fn quota(count: usize, stratum: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    let numerator = count as u128 * stratum as u128;
    let total = total as u128;
    let (q, r) = (numerator / total, numerator % total);
    let rounded = match (2 * r).cmp(&total) {
        Ordering::Less => q,
        Ordering::Greater => q + 1,
        Ordering::Equal if q % 2 == 0 => q,
        Ordering::Equal => q + 1,
    };
    usize::try_from(rounded).unwrap_or(usize::MAX)
}

/// Adds random catalog entries not yet selected until `count` is reached.
///
/// After `max_attempts` rejected or accepted draws, the remaining slots are
/// filled from the unselected entries directly.
fn fill_undershoot<R: Rng + ?Sized>(
    selected: &mut Vec<usize>,
    chosen: &mut [bool],
    count: usize,
    max_attempts: usize,
    rng: &mut R,
) {
    let total = chosen.len();
    let mut attempts = 0;
    while selected.len() < count && attempts < max_attempts {
        attempts += 1;
        let idx = rng.random_range(0..total);
        if !chosen[idx] {
            chosen[idx] = true;
            selected.push(idx);
        }
    }

    if selected.len() < count {
        let missing = count - selected.len();
        tracing::warn!(
            attempts,
            missing,
            "undershoot repair hit retry cap, filling from unselected questions"
        );
        let remaining: Vec<usize> = (0..total).filter(|&idx| !chosen[idx]).collect();
        for &idx in remaining.choose_multiple(rng, missing) {
            chosen[idx] = true;
            selected.push(idx);
        }
    }
}
