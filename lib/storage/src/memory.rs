use crate::{GraphBackend, StorageError, TripleCursor};
use oxrdf::{NamedNode, Subject, Term, Triple};
use rdf_quanta_model::{PatternTerm, TriplePattern};
use rustc_hash::FxHashMap;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An in-memory indexed triple store.
///
/// Terms are interned into a dictionary and the triples are kept in three
/// sorted permutation indexes (SPO, POS, OSP) so that every pattern shape
/// maps to one contiguous index range. Range lengths double as cardinality
/// estimates (exact here, but callers treat them as estimates).
///
/// The store is frozen after construction; the engine is read-only, so the
/// per-execution transactions only need to be observable, not durable.
pub struct MemoryGraph {
    data: Arc<GraphData>,
    commits: AtomicU64,
    aborts: AtomicU64,
}

struct GraphData {
    terms: Vec<Term>,
    ids: FxHashMap<Term, u32>,
    spo: Vec<[u32; 3]>,
    pos: Vec<[u32; 3]>,
    osp: Vec<[u32; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKind {
    Spo,
    Pos,
    Osp,
}

impl MemoryGraph {
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut terms = Vec::new();
        let mut ids = FxHashMap::default();
        let mut intern = |term: Term| -> u32 {
            if let Some(id) = ids.get(&term) {
                return *id;
            }
            let id = u32::try_from(terms.len()).expect("term dictionary overflow");
            terms.push(term.clone());
            ids.insert(term, id);
            id
        };

        let mut spo = Vec::new();
        for triple in triples {
            let s = intern(triple.subject.into());
            let p = intern(triple.predicate.into());
            let o = intern(triple.object);
            spo.push([s, p, o]);
        }
        spo.sort_unstable();
        spo.dedup();

        let mut pos: Vec<[u32; 3]> = spo.iter().map(|[s, p, o]| [*p, *o, *s]).collect();
        pos.sort_unstable();
        let mut osp: Vec<[u32; 3]> = spo.iter().map(|[s, p, o]| [*o, *s, *p]).collect();
        osp.sort_unstable();

        Self {
            data: Arc::new(GraphData {
                terms,
                ids,
                spo,
                pos,
                osp,
            }),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.data.spo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.spo.is_empty()
    }

    /// Number of committed transactions, observable for tests and metrics.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of aborted transactions, observable for tests and metrics.
    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }

    /// Picks the index and key prefix for a pattern, or `None` if the
    /// pattern references a term absent from the dictionary (empty scan).
    fn plan_scan(&self, pattern: &TriplePattern) -> Option<(IndexKind, Vec<u32>)> {
        let id_of = |slot: &PatternTerm| -> Result<Option<u32>, ()> {
            match slot {
                PatternTerm::Variable(_) => Ok(None),
                PatternTerm::Term(term) => {
                    self.data.ids.get(term).copied().map(Some).ok_or(())
                }
            }
        };
        let s = id_of(&pattern.subject).ok()?;
        let p = id_of(&pattern.predicate).ok()?;
        let o = id_of(&pattern.object).ok()?;

        let (index, prefix) = match (s, p, o) {
            (Some(s), Some(p), Some(o)) => (IndexKind::Spo, vec![s, p, o]),
            (Some(s), Some(p), None) => (IndexKind::Spo, vec![s, p]),
            (Some(s), None, None) => (IndexKind::Spo, vec![s]),
            (Some(s), None, Some(o)) => (IndexKind::Osp, vec![o, s]),
            (None, Some(p), Some(o)) => (IndexKind::Pos, vec![p, o]),
            (None, Some(p), None) => (IndexKind::Pos, vec![p]),
            (None, None, Some(o)) => (IndexKind::Osp, vec![o]),
            (None, None, None) => (IndexKind::Spo, Vec::new()),
        };
        Some((index, prefix))
    }

    fn scan_range(&self, pattern: &TriplePattern) -> (IndexKind, Range<usize>) {
        match self.plan_scan(pattern) {
            Some((index, prefix)) => {
                let rows = self.data.index(index);
                let start =
                    rows.partition_point(|row| row[..prefix.len()] < prefix[..]);
                let end = rows.partition_point(|row| row[..prefix.len()] <= prefix[..]);
                (index, start..end)
            }
            None => (IndexKind::Spo, 0..0),
        }
    }
}

impl GraphData {
    fn index(&self, kind: IndexKind) -> &[[u32; 3]] {
        match kind {
            IndexKind::Spo => &self.spo,
            IndexKind::Pos => &self.pos,
            IndexKind::Osp => &self.osp,
        }
    }

    fn decode(&self, kind: IndexKind, row: [u32; 3]) -> Result<Triple, StorageError> {
        let [s, p, o] = match kind {
            IndexKind::Spo => row,
            IndexKind::Pos => [row[2], row[0], row[1]],
            IndexKind::Osp => [row[1], row[2], row[0]],
        };
        let term = |id: u32| -> Result<Term, StorageError> {
            self.terms.get(id as usize).cloned().ok_or_else(|| {
                StorageError::corrupted_index(format!("unknown term id {id}"))
            })
        };
        let subject: Subject = match term(s)? {
            Term::NamedNode(node) => node.into(),
            Term::BlankNode(node) => node.into(),
            other => {
                return Err(StorageError::corrupted_index(format!(
                    "invalid subject term {other}"
                )));
            }
        };
        let predicate: NamedNode = match term(p)? {
            Term::NamedNode(node) => node,
            other => {
                return Err(StorageError::corrupted_index(format!(
                    "invalid predicate term {other}"
                )));
            }
        };
        Ok(Triple::new(subject, predicate, term(o)?))
    }
}

impl GraphBackend for MemoryGraph {
    fn search(
        &self,
        pattern: &TriplePattern,
        from: usize,
    ) -> Result<Box<dyn TripleCursor>, StorageError> {
        let (index, range) = self.scan_range(pattern);
        let position = from.min(range.len());
        Ok(Box::new(MemoryCursor {
            data: Arc::clone(&self.data),
            index,
            range,
            position,
        }))
    }

    fn estimate_cardinality(
        &self,
        pattern: &TriplePattern,
    ) -> Result<usize, StorageError> {
        let (_, range) = self.scan_range(pattern);
        Ok(range.len())
    }

    fn commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("transaction committed");
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("transaction aborted");
    }
}

struct MemoryCursor {
    data: Arc<GraphData>,
    index: IndexKind,
    range: Range<usize>,
    position: usize,
}

impl TripleCursor for MemoryCursor {
    fn next_triple(&mut self) -> Result<Option<Triple>, StorageError> {
        let offset = self.range.start + self.position;
        if offset >= self.range.end {
            return Ok(None);
        }
        self.position += 1;
        let row = self.data.index(self.index)[offset];
        self.data.decode(self.index, row).map(Some)
    }

    fn position(&self) -> usize {
        self.position
    }

    fn cardinality(&self) -> usize {
        self.range.len()
    }
}
