//! Builds the plan request and drains the streamed answer into one document.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::ai::{ChatRequest, PlanBackend};
use crate::error::BackendError;
use crate::photos::PhotoSet;
use crate::plan::PlanDocument;
use crate::profile::UserProfile;
use crate::prompt::build_plan_prompt;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct PlanRequester<B> {
    backend: B,
    model: String,
    timeout: Duration,
}

impl<B: PlanBackend> PlanRequester<B> {
    pub fn new(backend: B, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn request_plan(&self, profile: &UserProfile, photos: &PhotoSet) -> Result<PlanDocument, BackendError> {
        self.request_plan_with_progress(profile, photos, |_| {}).await
    }

    /// Like [`request_plan`](Self::request_plan), reporting the number of
    /// characters received so far after each fragment.
    pub async fn request_plan_with_progress<F>(
        &self,
        profile: &UserProfile,
        photos: &PhotoSet,
        mut on_progress: F,
    ) -> Result<PlanDocument, BackendError>
    where
        F: FnMut(usize) + Send,
    {
        let request = ChatRequest {
            model: self.model.clone(),
            prompt: build_plan_prompt(profile),
            images: photos.for_request().into_iter().map(|p| p.bytes.clone()).collect(),
        };

        if photos.len() > request.images.len() {
            debug!(
                supplied = photos.len(),
                sent = request.images.len(),
                "dropping photos beyond the request limit"
            );
        }

        info!(model = %self.model, images = request.images.len(), "requesting plan");

        let drain = async {
            let mut fragments = self.backend.open_stream(request).await?;
            let mut text = String::new();
            while let Some(fragment) = fragments.next().await {
                text.push_str(&fragment?);
                on_progress(text.chars().count());
            }
            Ok::<String, BackendError>(text)
        };

        let text = match tokio::time::timeout(self.timeout, drain).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "plan request timed out");
                return Err(BackendError::Timeout(self.timeout));
            }
        };

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        info!(chars = text.chars().count(), "plan received");
        Ok(PlanDocument::new(text))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedBackend, Step};
    use super::*;
    use crate::photos::{Photo, PhotoSource};
    use crate::profile::Goal;

    fn profile() -> UserProfile {
        UserProfile::new(Goal::GetToned, 175, 72, 30).unwrap()
    }

    fn photos(labels: &[&str]) -> PhotoSet {
        let mut set = PhotoSet::new();
        for label in labels {
            set.add_upload(Photo::from_bytes(*label, PhotoSource::Upload, label.as_bytes().to_vec()));
        }
        set
    }

    #[tokio::test]
    async fn test_fragments_concatenated_in_order() {
        let backend = ScriptedBackend::new(vec![
            Step::Text("### Diet Plan\n"),
            Step::Text("Eat "),
            Step::Text("well"),
        ]);
        let requester = PlanRequester::new(backend, "gemma3:4b");

        let plan = requester.request_plan(&profile(), &photos(&["a.jpg"])).await.unwrap();
        assert_eq!(plan.text(), "### Diet Plan\nEat well");
    }

    #[tokio::test]
    async fn test_request_carries_model_prompt_and_images() {
        let backend = ScriptedBackend::new(vec![Step::Text("ok")]);
        let requester = PlanRequester::new(backend.clone(), "llava");

        requester
            .request_plan(&profile(), &photos(&["a.jpg", "b.jpg", "c.jpg"]))
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "llava");
        assert!(requests[0].prompt.contains("Goal: Get Toned"));
        assert_eq!(requests[0].images, vec![b"a.jpg".to_vec(), b"b.jpg".to_vec()]);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_returns_error() {
        let backend = ScriptedBackend::new(vec![Step::Text("### Assessment\n"), Step::Fail]);
        let requester = PlanRequester::new(backend, "gemma3:4b");

        let err = requester.request_plan(&profile(), &photos(&["a.jpg"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Remote(_)));
    }

    #[tokio::test]
    async fn test_blank_response_is_empty_error() {
        let backend = ScriptedBackend::new(vec![Step::Text("  \n")]);
        let requester = PlanRequester::new(backend, "gemma3:4b");

        let err = requester.request_plan(&profile(), &photos(&["a.jpg"])).await.unwrap_err();
        assert!(matches!(err, BackendError::EmptyResponse));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let backend = ScriptedBackend {
            hang: true,
            ..ScriptedBackend::default()
        };
        let requester = PlanRequester::new(backend, "gemma3:4b").with_timeout(Duration::from_secs(5));

        let err = requester.request_plan(&profile(), &photos(&["a.jpg"])).await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn test_accessors_expose_model_and_backend() {
        let requester = PlanRequester::new(ScriptedBackend::default(), "llava:7b");
        assert_eq!(requester.model(), "llava:7b");
        assert_eq!(requester.backend().calls(), 0);
    }

    #[tokio::test]
    async fn test_progress_reports_cumulative_chars() {
        let backend = ScriptedBackend::new(vec![Step::Text("abc"), Step::Text("de")]);
        let requester = PlanRequester::new(backend, "gemma3:4b");

        let mut seen = Vec::new();
        requester
            .request_plan_with_progress(&profile(), &photos(&["a.jpg"]), |n| seen.push(n))
            .await
            .unwrap();
        assert_eq!(seen, vec![3, 5]);
    }
}
