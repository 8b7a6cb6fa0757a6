//! Process-lifetime draft store. Drafts do not survive a restart.

use {
    async_trait::async_trait,
    dashmap::{DashMap, mapref::entry::Entry},
};

use crate::{
    Error, Result,
    store::{DraftMutation, DraftStore},
    types::Draft,
};

#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: DashMap<String, Draft>,
}

impl InMemoryDraftStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn get(&self, user_id: &str) -> Result<Option<Draft>> {
        Ok(self.drafts.get(user_id).map(|d| d.value().clone()))
    }

    async fn create(&self, draft: Draft) -> Result<Draft> {
        match self.drafts.entry(draft.author_id.clone()) {
            Entry::Occupied(_) => Err(Error::draft_exists(draft.author_id)),
            Entry::Vacant(vacant) => {
                vacant.insert(draft.clone());
                Ok(draft)
            },
        }
    }

    async fn mutate(&self, user_id: &str, mutation: DraftMutation) -> Result<Draft> {
        let mut entry = self
            .drafts
            .get_mut(user_id)
            .ok_or_else(|| Error::no_draft(user_id))?;
        mutation(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn delete(&self, user_id: &str) -> Result<bool> {
        Ok(self.drafts.remove(user_id).is_some())
    }
}
