//! One recognition session: a batch of images or a run of live frames
//! folded into a single deduplicated present set.

use crate::gallery::Gallery;
use crate::ledger::{self, Reconciliation};
use crate::types::{Embedding, Matcher};
use serde::Serialize;
use std::collections::BTreeSet;

/// Running counters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Images or frames passed to [`RecognitionSession::observe`].
    pub inputs: usize,
    pub faces: usize,
    pub unknown_faces: usize,
}

pub struct RecognitionSession<'g, M> {
    gallery: &'g Gallery,
    matcher: M,
    present: BTreeSet<String>,
    stats: SessionStats,
}

impl<'g, M: Matcher> RecognitionSession<'g, M> {
    pub fn new(gallery: &'g Gallery, matcher: M) -> Self {
        Self {
            gallery,
            matcher,
            present: BTreeSet::new(),
            stats: SessionStats::default(),
        }
    }

    /// Match every face found in one image or frame.
    ///
    /// Returns the students seen for the first time in this session.
    pub fn observe(&mut self, faces: &[Embedding]) -> Vec<String> {
        self.stats.inputs += 1;
        let mut newly_present = Vec::new();

        for probe in faces {
            self.stats.faces += 1;
            match self.matcher.identify(probe, self.gallery.entries()) {
                Some(name) => {
                    if self.present.insert(name.to_owned()) {
                        newly_present.push(name.to_owned());
                    }
                }
                None => self.stats.unknown_faces += 1,
            }
        }

        newly_present
    }

    pub fn present(&self) -> &BTreeSet<String> {
        &self.present
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Present/absent split against the gallery roster.
    pub fn reconcile(&self) -> Reconciliation {
        ledger::reconcile(&self.gallery.names(), &self.present)
    }
}
