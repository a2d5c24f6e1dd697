pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod photos;
pub mod plan;
pub mod profile;
pub mod prompt;
pub mod requester;
pub mod session;

// Re-export main types for convenience
pub use ai::{ChatRequest, FragmentStream, OllamaClient, PlanBackend};
pub use config::Config;
pub use error::{BackendError, EncodingError, PhysiqueError, ValidationError};
pub use export::{render_document, render_document_with, ExportOptions, SubstitutionPolicy, EXPORT_FILE_NAME, EXPORT_MIME_TYPE};
pub use photos::{Photo, PhotoSet, PhotoSource, MAX_REQUEST_IMAGES};
pub use plan::{extract, parse_sections, Extracted, ExtractedSections, FormatWarning, PlanDocument, SectionKind};
pub use profile::{Goal, ProfileDraft, UserProfile};
pub use requester::PlanRequester;
pub use session::{validate_request, PlanSession};
