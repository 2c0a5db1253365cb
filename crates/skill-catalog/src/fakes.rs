//! In-memory fakes for the catalog ports (testing only)
//!
//! Provides `MemoryCandidateIndex` and `ScriptedClassifier`, which satisfy
//! the port contracts deterministically and without network access.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CatalogUnavailable, ClassifyError};
use crate::model::{CatalogEntry, CatalogStats, ClassificationResult, SkillJudgement, WorkItem};
use crate::ports::{CandidateIndex, Classifier, ClassifyResult};

/// Build a judgement that points at `entry`.
pub fn judgement_for(entry: &CatalogEntry, confidence: f64) -> SkillJudgement {
    SkillJudgement {
        skill_name: entry.skill_name.clone(),
        level: entry.level,
        category: entry.category.clone(),
        subcategory: entry.subcategory.clone(),
        confidence,
        rationale: format!("matched {}", entry.key()),
    }
}

// ---------------------------------------------------------------------------
// MemoryCandidateIndex
// ---------------------------------------------------------------------------

/// Token-overlap similarity search over a fixed list of catalog entries.
///
/// Ranking is deterministic: higher overlap first, then `(skill_name, level)`.
/// The index can be switched off, or told to fail after a number of
/// successful lookups, to exercise the fatal `CatalogUnavailable` path.
#[derive(Debug)]
pub struct MemoryCandidateIndex {
    entries: Vec<CatalogEntry>,
    available: AtomicBool,
    fail_after: Option<usize>,
    lookups: AtomicUsize,
}

impl MemoryCandidateIndex {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            available: AtomicBool::new(true),
            fail_after: None,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Serve `limit` lookups, then report the catalog as unavailable.
    pub fn fail_after(mut self, limit: usize) -> Self {
        self.fail_after = Some(limit);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of lookups attempted so far, including failed ones.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats::from_entries(&self.entries)
    }
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl CandidateIndex for MemoryCandidateIndex {
    async fn lookup(
        &self,
        item: &WorkItem,
        top_k: usize,
    ) -> Result<Vec<CatalogEntry>, CatalogUnavailable> {
        let attempt = self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(CatalogUnavailable::new("index switched off"));
        }
        if let Some(limit) = self.fail_after {
            if attempt >= limit {
                return Err(CatalogUnavailable::new(format!(
                    "index failed after {limit} lookups"
                )));
            }
        }

        let query = tokens(&item.payload);
        let mut scored: Vec<(usize, &CatalogEntry)> = self
            .entries
            .iter()
            .map(|entry| {
                let doc = tokens(&format!(
                    "{} {} {} {}",
                    entry.skill_name, entry.category, entry.subcategory, entry.description
                ));
                (query.intersection(&doc).count(), entry)
            })
            .collect();
        scored.sort_by(|(sa, ea), (sb, eb)| sb.cmp(sa).then_with(|| ea.key().cmp(&eb.key())));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// ScriptedClassifier
// ---------------------------------------------------------------------------

/// One scripted reaction of [`ScriptedClassifier`] to a call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(ClassificationResult),
    Fail(ClassifyError),
    /// Sleep, then answer with the fallback response
    Stall(Duration),
    Panic(String),
}

#[derive(Debug, Clone, Copy)]
enum Fallback {
    Empty,
    TopCandidate { confidence: f64 },
}

/// Classifier whose answers are scripted per work item.
///
/// Each call for an item pops the next step from that item's script. Once a
/// script runs dry the fallback answers: an empty result, or (with
/// [`ScriptedClassifier::matching_top_candidate`]) a match on the first
/// candidate.
#[derive(Debug)]
pub struct ScriptedClassifier {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, usize>>,
    fallback: Fallback,
}

impl Default for ScriptedClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            fallback: Fallback::Empty,
        }
    }

    pub fn matching_top_candidate(confidence: f64) -> Self {
        Self {
            fallback: Fallback::TopCandidate { confidence },
            ..Self::new()
        }
    }

    /// Append `steps` to the script of `item_id`.
    pub fn script<I>(self, item_id: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = Scripted>,
    {
        self.push(item_id, steps);
        self
    }

    pub fn push<I>(&self, item_id: impl Into<String>, steps: I)
    where
        I: IntoIterator<Item = Scripted>,
    {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.entry(item_id.into()).or_default().extend(steps);
    }

    pub fn calls(&self, item_id: &str) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.get(item_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        let calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        calls.values().sum()
    }

    fn next_step(&self, item_id: &str) -> Option<Scripted> {
        {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            *calls.entry(item_id.to_string()).or_default() += 1;
        }
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.get_mut(item_id).and_then(VecDeque::pop_front)
    }

    fn fallback_response(&self, candidates: &[CatalogEntry]) -> ClassificationResult {
        match (self.fallback, candidates.first()) {
            (Fallback::TopCandidate { confidence }, Some(top)) => {
                ClassificationResult::empty().with_match(judgement_for(top, confidence))
            }
            _ => ClassificationResult::empty(),
        }
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        item: &WorkItem,
        candidates: &[CatalogEntry],
        _confidence_threshold: f64,
    ) -> ClassifyResult<ClassificationResult> {
        match self.next_step(&item.id) {
            None => Ok(self.fallback_response(candidates)),
            Some(Scripted::Respond(result)) => Ok(result),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(self.fallback_response(candidates))
            }
            Some(Scripted::Panic(message)) => panic!("{message}"),
        }
    }
}
