//! Per-session plan state.
//!
//! A session starts empty. A successful request replaces the plan wholesale;
//! a failed one leaves it untouched.

use tracing::info;

use crate::ai::PlanBackend;
use crate::error::{PhysiqueError, ValidationError};
use crate::photos::PhotoSet;
use crate::plan::{ExtractedSections, PlanDocument};
use crate::profile::{ProfileDraft, UserProfile};
use crate::requester::PlanRequester;

#[derive(Debug, Clone, Default)]
pub struct PlanSession {
    plan: Option<PlanDocument>,
    generation: u64,
}

impl PlanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self) -> Option<&PlanDocument> {
        self.plan.as_ref()
    }

    /// How many plans have been committed in this session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sections(&self) -> Option<ExtractedSections> {
        self.plan.as_ref().map(PlanDocument::sections)
    }

    pub fn commit(&mut self, plan: PlanDocument) -> &PlanDocument {
        self.generation += 1;
        info!(generation = self.generation, "plan committed to session");
        self.plan.insert(plan)
    }

    /// Validate, request and commit. The requester is never called when
    /// validation fails.
    pub async fn generate<B: PlanBackend>(
        &mut self,
        requester: &PlanRequester<B>,
        draft: &ProfileDraft,
        photos: &PhotoSet,
    ) -> Result<&PlanDocument, PhysiqueError> {
        let profile = validate_request(draft, photos)?;
        let plan = requester.request_plan(&profile, photos).await?;
        Ok(self.commit(plan))
    }
}

/// Checks performed one layer above the requester.
pub fn validate_request(draft: &ProfileDraft, photos: &PhotoSet) -> Result<UserProfile, ValidationError> {
    if photos.is_empty() {
        return Err(ValidationError::NoPhotos);
    }
    draft.to_profile()
}
