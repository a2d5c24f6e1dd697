use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use physique_core::{
    render_document_with, validate_request, BackendError, Config, ExportOptions, ExtractedSections,
    OllamaClient, Photo, PhotoSet, PhotoSource, PlanDocument, PlanRequester, PlanSession, ProfileDraft,
    EXPORT_FILE_NAME, EXPORT_MIME_TYPE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Preview,
    Diet,
    Workout,
}

impl Tab {
    pub fn all() -> [Tab; 3] {
        [Tab::Preview, Tab::Diet, Tab::Workout]
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Preview => "Preview",
            Tab::Diet => "Diet",
            Tab::Workout => "Workout",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Tab::Preview => 0,
            Tab::Diet => 1,
            Tab::Workout => 2,
        }
    }

    pub fn next(&self) -> Tab {
        match self {
            Tab::Preview => Tab::Diet,
            Tab::Diet => Tab::Workout,
            Tab::Workout => Tab::Preview,
        }
    }

    pub fn prev(&self) -> Tab {
        match self {
            Tab::Preview => Tab::Workout,
            Tab::Diet => Tab::Preview,
            Tab::Workout => Tab::Diet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Form,
    Content,
}

/// Rows of the "Start Your Journey" form, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Goal,
    Height,
    Weight,
    Age,
    Camera,
    AddPhoto,
}

impl FormField {
    pub fn all() -> [FormField; 6] {
        [
            FormField::Goal,
            FormField::Height,
            FormField::Weight,
            FormField::Age,
            FormField::Camera,
            FormField::AddPhoto,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Goal => "Fitness Goal",
            FormField::Height => "Height (cm)",
            FormField::Weight => "Weight (kg)",
            FormField::Age => "Age",
            FormField::Camera => "Camera Shot",
            FormField::AddPhoto => "Upload Photo",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FormField::Height | FormField::Weight | FormField::Age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub tab: Tab,

    // Form state
    pub form: ProfileDraft,
    pub form_state: ListState,
    pub field_input: String,
    pub photos: PhotoSet,
    pub photo_state: ListState,

    // Plan state
    pub session: PlanSession,
    pub plan_loading: bool,
    pub plan_task: Option<JoinHandle<Result<PlanDocument, BackendError>>>,
    pub plan_progress: Arc<AtomicUsize>,
    pub last_export: Option<PathBuf>,

    // Content scrolling
    pub content_scroll: u16,
    pub content_height: u16,
    pub total_content_lines: u16,

    // Animation state
    pub animation_frame: u8,

    pub status: Option<StatusMessage>,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,
    pub models_task: Option<JoinHandle<Result<Vec<String>, BackendError>>>,

    // Backend settings
    pub ollama: OllamaClient,
    pub selected_model: String,
    pub request_timeout: Duration,
    pub export_dir: PathBuf,
}

impl App {
    pub fn new(config: &Config, model_override: Option<String>) -> Self {
        let mut form_state = ListState::default();
        form_state.select(Some(0));

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Form,
            tab: Tab::Preview,

            form: ProfileDraft::default(),
            form_state,
            field_input: String::new(),
            photos: PhotoSet::new(),
            photo_state: ListState::default(),

            session: PlanSession::new(),
            plan_loading: false,
            plan_task: None,
            plan_progress: Arc::new(AtomicUsize::new(0)),
            last_export: None,

            content_scroll: 0,
            content_height: 0,
            total_content_lines: 0,

            animation_frame: 0,

            status: None,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),
            models_task: None,

            ollama: OllamaClient::new(&config.ollama_url()),
            selected_model: model_override.unwrap_or_else(|| config.model()),
            request_timeout: config.request_timeout(),
            export_dir: config.export_dir(),
        }
    }

    // Status helpers
    pub fn set_info(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Info,
            text: text.into(),
        });
    }

    pub fn set_warning(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Warning,
            text: text.into(),
        });
    }

    pub fn set_error(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            kind: StatusKind::Error,
            text: text.into(),
        });
    }

    // Form navigation
    pub fn selected_field(&self) -> FormField {
        let fields = FormField::all();
        let i = self.form_state.selected().unwrap_or(0).min(fields.len() - 1);
        fields[i]
    }

    pub fn form_nav_down(&mut self) {
        let len = FormField::all().len();
        let i = self.form_state.selected().unwrap_or(0);
        self.form_state.select(Some((i + 1).min(len - 1)));
    }

    pub fn form_nav_up(&mut self) {
        let i = self.form_state.selected().unwrap_or(0);
        self.form_state.select(Some(i.saturating_sub(1)));
    }

    pub fn field_value(&self, field: FormField) -> String {
        let number = |v: Option<u16>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        match field {
            FormField::Goal => self.form.goal.display_name().to_string(),
            FormField::Height => number(self.form.height_cm),
            FormField::Weight => number(self.form.weight_kg),
            FormField::Age => number(self.form.age),
            FormField::Camera => self
                .photos
                .camera()
                .map(|p| p.label.clone())
                .unwrap_or_else(|| "none".to_string()),
            FormField::AddPhoto => format!("{} uploaded", self.photos.uploads().len()),
        }
    }

    fn numeric_slot(&mut self, field: FormField) -> Option<&mut Option<u16>> {
        match field {
            FormField::Height => Some(&mut self.form.height_cm),
            FormField::Weight => Some(&mut self.form.weight_kg),
            FormField::Age => Some(&mut self.form.age),
            _ => None,
        }
    }

    /// Left/right on the form: cycle the goal or nudge a number.
    pub fn adjust_field(&mut self, forward: bool) {
        let field = self.selected_field();
        if field == FormField::Goal {
            self.form.goal = if forward { self.form.goal.next() } else { self.form.goal.prev() };
            return;
        }
        if let Some(slot) = self.numeric_slot(field) {
            let current = slot.unwrap_or(0);
            *slot = Some(if forward { current.saturating_add(1) } else { current.saturating_sub(1) });
        }
    }

    pub fn begin_edit(&mut self) {
        let field = self.selected_field();
        if field == FormField::Goal {
            self.adjust_field(true);
            return;
        }
        self.field_input = if field.is_numeric() {
            self.field_value(field).trim_matches('-').to_string()
        } else {
            String::new()
        };
        self.input_mode = InputMode::Editing;
    }

    pub fn cancel_edit(&mut self) {
        self.field_input.clear();
        self.input_mode = InputMode::Normal;
    }

    /// Apply the edit buffer to the selected field.
    pub fn commit_edit(&mut self) {
        let field = self.selected_field();
        let input = std::mem::take(&mut self.field_input);
        self.input_mode = InputMode::Normal;

        if field.is_numeric() {
            let trimmed = input.trim();
            let value = if trimmed.is_empty() {
                None
            } else {
                match trimmed.parse::<u16>() {
                    Ok(n) => Some(n),
                    Err(_) => {
                        self.set_warning(format!("{} must be a whole number", field.label()));
                        return;
                    }
                }
            };
            if let Some(slot) = self.numeric_slot(field) {
                *slot = value;
            }
            return;
        }

        let path = input.trim();
        if path.is_empty() {
            return;
        }
        let source = if field == FormField::Camera {
            PhotoSource::Camera
        } else {
            PhotoSource::Upload
        };
        self.add_photo(Path::new(path), source);
    }

    pub fn add_photo(&mut self, path: &Path, source: PhotoSource) {
        match Photo::load(path, source) {
            Ok(photo) => {
                let label = photo.label.clone();
                match source {
                    PhotoSource::Camera => self.photos.set_camera(photo),
                    PhotoSource::Upload => self.photos.add_upload(photo),
                }
                if self.photo_state.selected().is_none() {
                    self.photo_state.select(Some(0));
                }
                self.set_info(format!("Added {}", label));
            }
            Err(e) => {
                warn!(error = %e, "photo rejected");
                self.set_warning(e.to_string());
            }
        }
    }

    // Preview photo list
    pub fn photo_nav_down(&mut self) {
        let len = self.photos.len();
        if len > 0 {
            let i = self.photo_state.selected().unwrap_or(0);
            self.photo_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn photo_nav_up(&mut self) {
        let i = self.photo_state.selected().unwrap_or(0);
        self.photo_state.select(Some(i.saturating_sub(1)));
    }

    pub fn remove_selected_photo(&mut self) {
        if let Some(i) = self.photo_state.selected() {
            if let Some(photo) = self.photos.remove(i) {
                self.set_info(format!("Removed {}", photo.label));
            }
            if self.photos.is_empty() {
                self.photo_state.select(None);
            } else if i >= self.photos.len() {
                self.photo_state.select(Some(self.photos.len() - 1));
            }
        }
    }

    // Content scrolling
    pub fn scroll_down(&mut self) {
        if self.content_scroll < self.total_content_lines.saturating_sub(self.content_height) {
            self.content_scroll = self.content_scroll.saturating_add(1);
        }
    }

    pub fn scroll_up(&mut self) {
        self.content_scroll = self.content_scroll.saturating_sub(1);
    }

    pub fn scroll_half_page_down(&mut self) {
        let half_page = self.content_height / 2;
        let max_scroll = self.total_content_lines.saturating_sub(self.content_height);
        self.content_scroll = (self.content_scroll + half_page).min(max_scroll);
    }

    pub fn scroll_half_page_up(&mut self) {
        let half_page = self.content_height / 2;
        self.content_scroll = self.content_scroll.saturating_sub(half_page);
    }

    pub fn switch_tab(&mut self, tab: Tab) {
        if self.tab != tab {
            self.tab = tab;
            self.content_scroll = 0;
        }
    }

    pub fn sections(&self) -> Option<ExtractedSections> {
        self.session.sections()
    }

    /// Start one background request. Ignored while another is running.
    pub fn start_generation(&mut self) {
        if self.plan_task.is_some() {
            self.set_info("A plan is already being generated");
            return;
        }

        let profile = match validate_request(&self.form, &self.photos) {
            Ok(profile) => profile,
            Err(e) => {
                self.set_warning(format!("Please provide all details and at least one photo! ({})", e));
                return;
            }
        };

        let requester = PlanRequester::new(self.ollama.clone(), self.selected_model.clone())
            .with_timeout(self.request_timeout);
        let photos = self.photos.clone();
        let progress = Arc::clone(&self.plan_progress);
        progress.store(0, Ordering::Relaxed);

        info!(model = %self.selected_model, photos = photos.len(), "starting plan generation");
        self.plan_loading = true;
        self.status = None;
        self.plan_task = Some(tokio::spawn(async move {
            requester
                .request_plan_with_progress(&profile, &photos, |chars| progress.store(chars, Ordering::Relaxed))
                .await
        }));
    }

    pub fn plan_chars_received(&self) -> usize {
        self.plan_progress.load(Ordering::Relaxed)
    }

    /// Collect finished background work. Only a successful request touches the session.
    pub async fn poll_tasks(&mut self) {
        if self.plan_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.plan_task.take() {
                self.plan_loading = false;
                match task.await {
                    Ok(Ok(plan)) => {
                        self.session.commit(plan);
                        self.content_scroll = 0;
                        let warnings = self.sections().map(|s| s.warnings().len()).unwrap_or(0);
                        if warnings > 0 {
                            self.set_warning("Plan ready, but some sections were not found. Press 'e' to export");
                        } else {
                            self.set_info("Plan ready! Press 'e' to download it as PDF");
                        }
                    }
                    Ok(Err(e)) => {
                        error!(error = %e, "plan generation failed");
                        self.set_error(format!("Error: {}", e));
                    }
                    Err(e) => {
                        error!(error = %e, "plan task panicked");
                        self.set_error(format!("Error: {}", e));
                    }
                }
            }
        }

        if self.models_task.as_ref().is_some_and(|t| t.is_finished()) {
            if let Some(task) = self.models_task.take() {
                match task.await {
                    Ok(Ok(models)) => {
                        let current = models.iter().position(|m| *m == self.selected_model);
                        self.available_models = models;
                        if self.available_models.is_empty() {
                            self.set_warning("No models found. Pull one with: ollama pull gemma3:4b");
                        } else {
                            self.model_picker_state.select(Some(current.unwrap_or(0)));
                        }
                    }
                    Ok(Err(e)) => {
                        self.show_model_picker = false;
                        self.set_error(format!("Error connecting to Ollama: {}", e));
                    }
                    Err(e) => {
                        self.show_model_picker = false;
                        self.set_error(format!("Error: {}", e));
                    }
                }
            }
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.plan_loading || self.models_task.is_some() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn export_plan(&mut self) {
        let Some(plan) = self.session.plan() else {
            self.set_warning("Generate your plan first");
            return;
        };

        match save_plan_pdf(plan, &self.export_dir, &ExportOptions::default()) {
            Ok(path) => {
                self.set_info(format!("Saved {}", path.display()));
                self.last_export = Some(path);
            }
            Err(e) => {
                error!(error = %e, "export failed");
                self.set_error(format!("Error: {:#}", e));
            }
        }
    }

    // Model picker methods
    pub fn open_model_picker(&mut self) {
        self.show_model_picker = true;
        self.available_models.clear();
        self.model_picker_state.select(None);
        if self.models_task.is_none() {
            let ollama = self.ollama.clone();
            self.models_task = Some(tokio::spawn(async move { ollama.list_models().await }));
        }
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                // Save to config
                if let Err(e) = Config::save_default_model(&self.selected_model) {
                    warn!(error = %e, "could not persist model choice");
                }
            }
        }
    }
}

/// Render `plan` and write it to `<dir>/Physique_Pro_Plan.pdf`.
pub fn save_plan_pdf(plan: &PlanDocument, dir: &Path, options: &ExportOptions) -> Result<PathBuf> {
    let bytes = render_document_with(plan, options)?;
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), mime = EXPORT_MIME_TYPE, "plan exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use physique_core::Goal;

    fn app() -> App {
        App::new(&Config::new(), Some("test-model".to_string()))
    }

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Preview.next(), Tab::Diet);
        assert_eq!(Tab::Workout.next(), Tab::Preview);
        assert_eq!(Tab::Preview.prev(), Tab::Workout);
        assert_eq!(Tab::all().map(|t| t.index()), [0, 1, 2]);
    }

    #[test]
    fn test_numeric_edit() {
        let mut app = app();
        app.form_state.select(Some(1));
        app.begin_edit();
        assert_eq!(app.input_mode, InputMode::Editing);
        assert_eq!(app.field_input, "170");

        app.field_input = "182".to_string();
        app.commit_edit();
        assert_eq!(app.form.height_cm, Some(182));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_clearing_numeric_field_makes_it_missing() {
        let mut app = app();
        app.form_state.select(Some(3));
        app.begin_edit();
        app.field_input.clear();
        app.commit_edit();
        assert_eq!(app.form.age, None);
    }

    #[test]
    fn test_non_numeric_input_is_rejected() {
        let mut app = app();
        app.form_state.select(Some(2));
        app.begin_edit();
        app.field_input = "heavy".to_string();
        app.commit_edit();
        assert_eq!(app.form.weight_kg, Some(70));
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Warning);
    }

    #[test]
    fn test_goal_cycles_with_adjust() {
        let mut app = app();
        app.adjust_field(true);
        assert_eq!(app.form.goal, Goal::LoseFat);
        app.adjust_field(false);
        app.adjust_field(false);
        assert_eq!(app.form.goal, Goal::Maintain);
    }

    #[tokio::test]
    async fn test_generate_without_photos_warns() {
        let mut app = app();
        app.start_generation();
        assert!(app.plan_task.is_none());
        assert!(!app.plan_loading);
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Warning);
    }

    #[test]
    fn test_export_without_plan_warns() {
        let mut app = app();
        app.export_plan();
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Warning);
        assert!(app.last_export.is_none());
    }

    #[test]
    fn test_export_writes_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app();
        app.export_dir = dir.path().to_path_buf();
        app.session.commit(PlanDocument::new("### Diet Plan\nEat Y"));

        app.export_plan();

        let path = app.last_export.clone().unwrap();
        assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);
        assert!(std::fs::read(path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_add_and_remove_photos() {
        let dir = tempfile::tempdir().unwrap();
        let front = dir.path().join("front.png");
        std::fs::write(&front, b"png-ish").unwrap();

        let mut app = app();
        app.add_photo(&front, PhotoSource::Upload);
        app.add_photo(&dir.path().join("notes.txt"), PhotoSource::Upload);
        assert_eq!(app.photos.len(), 1);
        assert_eq!(app.status.as_ref().unwrap().kind, StatusKind::Warning);

        app.remove_selected_photo();
        assert!(app.photos.is_empty());
        assert!(app.photo_state.selected().is_none());
    }
}
