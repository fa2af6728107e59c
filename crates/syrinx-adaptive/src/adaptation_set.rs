//! Grouping of interchangeable representations.

use std::sync::Arc;

use syrinx_abr::RepresentationPool;

use crate::representation::Representation;

/// Media category of an adaptation set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
    Subtitles,
}

/// A group of interchangeable [`Representation`]s for one media category.
///
/// Pure container: capability filtering and selection are delegated to the
/// adaptation logic, which sees the set through [`RepresentationPool`].
#[derive(Clone, Debug)]
pub struct AdaptationSet {
    id: usize,
    media_type: MediaType,
    representations: Vec<Arc<Representation>>,
}

impl AdaptationSet {
    pub fn new(id: usize, media_type: MediaType) -> Self {
        Self {
            id,
            media_type,
            representations: Vec::new(),
        }
    }

    pub fn with_representation(mut self, representation: Representation) -> Self {
        self.representations.push(Arc::new(representation));
        self
    }

    pub fn push(&mut self, representation: Arc<Representation>) {
        self.representations.push(representation);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn representations(&self) -> &[Arc<Representation>] {
        &self.representations
    }

    pub fn representation_by_id(&self, id: &str) -> Option<&Arc<Representation>> {
        self.representations.iter().find(|r| r.id() == id)
    }
}

impl RepresentationPool for AdaptationSet {
    fn len(&self) -> usize {
        self.representations.len()
    }

    fn bandwidth_bps(&self, index: usize) -> Option<u64> {
        self.representations
            .get(index)
            .map(|r| r.bandwidth_bps())
    }

    fn dimensions(&self, index: usize) -> Option<(u32, u32)> {
        self.representations.get(index).and_then(|r| r.dimensions())
    }
}

/// The manifest-level container the adaptation logic queries by media type.
#[derive(Clone, Debug, Default)]
pub struct Period {
    adaptation_sets: Vec<Arc<AdaptationSet>>,
}

impl Period {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adaptation_set(mut self, set: AdaptationSet) -> Self {
        self.adaptation_sets.push(Arc::new(set));
        self
    }

    pub fn push(&mut self, set: Arc<AdaptationSet>) {
        self.adaptation_sets.push(set);
    }

    pub fn adaptation_sets(&self) -> &[Arc<AdaptationSet>] {
        &self.adaptation_sets
    }

    /// First adaptation set of the given media type.
    pub fn adaptation_set(&self, media_type: MediaType) -> Option<&Arc<AdaptationSet>> {
        self.adaptation_sets
            .iter()
            .find(|s| s.media_type() == media_type)
    }
}
