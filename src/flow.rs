//! Page state for the title → scenes → upload → build flow.
//!
//! Nothing in here touches the network. Each action is split into a `begin_*`
//! that validates and hands out a [`Ticket`], and a `finish_*` that applies the
//! response. A response presenting a ticket that is no longer current is dropped.

use crate::api::{JobId, JobStatus, Scene, Style, UploadId};
use crate::error::ClientError;

pub const VIDEO_EXTENSIONS: [&str; 5] = [".mp4", ".mov", ".avi", ".mkv", ".webm"];
pub const FILE_INPUT_ACCEPT: &str = "image/*,video/*,.mp4,.mov,.avi,.mkv,.webm";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    TitleEntry = 1,
    SceneReview = 2,
    Uploaded = 3,
    Monitoring = 4,
}

impl Step {
    pub fn number(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Generate,
    Upload,
    Build,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Generate, Action::Upload, Action::Build];

    pub fn name(self) -> &'static str {
        match self {
            Action::Generate => "generate",
            Action::Upload => "upload",
            Action::Build => "build",
        }
    }

    pub fn failure_prefix(self) -> &'static str {
        match self {
            Action::Generate => "Generate failed: ",
            Action::Upload => "Upload failed: ",
            Action::Build => "Build failed: ",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    action: Action,
    id: u64,
}

/// Hands out monotonically increasing request ids and remembers the latest
/// in-flight one per action.
#[derive(Debug, Default)]
pub struct RequestGate {
    next_id: u64,
    in_flight: [Option<u64>; 3],
}

impl RequestGate {
    pub fn issue(&mut self, action: Action) -> Ticket {
        self.next_id += 1;
        self.in_flight[action.slot()] = Some(self.next_id);
        Ticket {
            action,
            id: self.next_id,
        }
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.in_flight[action.slot()].is_some()
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.in_flight[ticket.action.slot()] == Some(ticket.id)
    }

    /// Releases the action if `ticket` is current; reports whether it was.
    pub fn settle(&mut self, ticket: Ticket) -> bool {
        if self.is_current(ticket) {
            self.in_flight[ticket.action.slot()] = None;
            true
        } else {
            false
        }
    }

    pub fn invalidate(&mut self, action: Action) {
        self.in_flight[action.slot()] = None;
    }
}

#[derive(Debug, PartialEq)]
pub enum Settled {
    Applied,
    Stale,
    Failed(ClientError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneField {
    Narration,
    ImagePrompt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
        }
    }
}

pub fn is_video_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn classify_media(name: &str, mime: &str) -> Option<MediaKind> {
    if is_video_file(name) {
        Some(MediaKind::Video)
    } else if mime.starts_with("image/") {
        Some(MediaKind::Image)
    } else {
        None
    }
}

pub fn format_size_kb(bytes: f64) -> String {
    format!("{} KB", (bytes / 1024.0).round() as u64)
}

pub fn format_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let rest = (seconds % 60.0).floor() as u64;
    format!("{:02}:{:02}", minutes, rest)
}

/// What the flow needs to know about a user-selected file.
pub trait MediaFile {
    fn file_name(&self) -> String;
    fn mime_type(&self) -> String;
    fn size_bytes(&self) -> f64;
}

impl MediaFile for web_sys::File {
    fn file_name(&self) -> String {
        self.name()
    }

    fn mime_type(&self) -> String {
        self.type_()
    }

    fn size_bytes(&self) -> f64 {
        self.size()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileKey(u64);

impl FileKey {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct PendingFile<F> {
    pub key: FileKey,
    pub file: F,
    pub kind: MediaKind,
    pub preview_url: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: usize,
    pub rejected: Vec<String>,
}

#[derive(Debug)]
pub struct PendingFiles<F> {
    entries: Vec<PendingFile<F>>,
    next_key: u64,
}

impl<F> Default for PendingFiles<F> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_key: 0,
        }
    }
}

impl<F: MediaFile> PendingFiles<F> {
    pub fn add(&mut self, files: impl IntoIterator<Item = F>) -> AddReport {
        let mut report = AddReport::default();
        for file in files {
            let name = file.file_name();
            let Some(kind) = classify_media(&name, &file.mime_type()) else {
                report.rejected.push(name);
                continue;
            };
            self.next_key += 1;
            self.entries.push(PendingFile {
                key: FileKey(self.next_key),
                file,
                kind,
                preview_url: None,
            });
            report.added += 1;
        }
        report
    }
}

impl<F> PendingFiles<F> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingFile<F>> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PendingFile<F>> {
        self.entries.iter_mut()
    }

    pub fn files(&self) -> impl Iterator<Item = &F> {
        self.entries.iter().map(|entry| &entry.file)
    }

    pub fn remove(&mut self, index: usize) -> Option<PendingFile<F>> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) -> Vec<PendingFile<F>> {
        std::mem::take(&mut self.entries)
    }
}

#[derive(Debug)]
pub struct Flow<F> {
    pub title: String,
    pub style: Style,
    pub scenes: Vec<Scene>,
    pub files: PendingFiles<F>,
    pub upload_id: Option<UploadId>,
    pub job_id: Option<JobId>,
    pub job_status: Option<JobStatus>,
    step: Step,
    gate: RequestGate,
}

impl<F> Default for Flow<F> {
    fn default() -> Self {
        Self {
            title: String::new(),
            style: Style::default(),
            scenes: Vec::new(),
            files: PendingFiles::default(),
            upload_id: None,
            job_id: None,
            job_status: None,
            step: Step::TitleEntry,
            gate: RequestGate::default(),
        }
    }
}

impl<F> Flow<F> {
    pub fn step(&self) -> Step {
        self.step
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.gate.is_busy(action)
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_style(&mut self, style: Style) {
        self.style = style;
    }

    /// Title as sent to both generate and build; only emptiness checks trim it.
    pub fn request_title(&self) -> &str {
        &self.title
    }

    pub fn show_scene_editor(&self) -> bool {
        !self.scenes.is_empty()
    }

    pub fn show_upload(&self) -> bool {
        self.step >= Step::SceneReview
    }

    pub fn show_build(&self) -> bool {
        self.step >= Step::Uploaded
    }

    fn begin(&mut self, action: Action) -> Result<Ticket, ClientError> {
        if self.gate.is_busy(action) {
            return Err(ClientError::Validation("Request already in progress"));
        }
        Ok(self.gate.issue(action))
    }

    fn settle<T>(
        &mut self,
        ticket: Ticket,
        result: Result<T, ClientError>,
        apply: impl FnOnce(&mut Self, T),
    ) -> Settled {
        if !self.gate.settle(ticket) {
            return Settled::Stale;
        }
        match result {
            Ok(value) => {
                apply(self, value);
                Settled::Applied
            }
            Err(err) => Settled::Failed(err),
        }
    }

    pub fn begin_generate(&mut self) -> Result<Ticket, ClientError> {
        if self.title.trim().is_empty() {
            return Err(ClientError::Validation("Enter a title"));
        }
        self.begin(Action::Generate)
    }

    pub fn finish_generate(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<Scene>, ClientError>,
    ) -> Settled {
        self.settle(ticket, result, |flow, scenes| {
            flow.scenes = scenes;
            flow.step = Step::SceneReview;
        })
    }

    pub fn begin_upload(&mut self) -> Result<Ticket, ClientError> {
        if self.files.is_empty() {
            return Err(ClientError::Validation("Select files"));
        }
        self.begin(Action::Upload)
    }

    pub fn finish_upload(
        &mut self,
        ticket: Ticket,
        result: Result<UploadId, ClientError>,
    ) -> Settled {
        self.settle(ticket, result, |flow, upload_id| {
            flow.upload_id = Some(upload_id);
            flow.step = Step::Uploaded;
        })
    }

    pub fn begin_build(&mut self) -> Result<Ticket, ClientError> {
        if self.upload_id.is_none() {
            return Err(ClientError::Validation("Upload first"));
        }
        self.begin(Action::Build)
    }

    pub fn finish_build(
        &mut self,
        ticket: Ticket,
        result: Result<Option<JobId>, ClientError>,
    ) -> Settled {
        let result = result.and_then(|job_id| {
            job_id.ok_or(ClientError::Validation("No job_id returned"))
        });
        self.settle(ticket, result, |flow, job_id| {
            flow.job_id = Some(job_id);
            flow.job_status = None;
            flow.step = Step::Monitoring;
        })
    }

    /// Records a polled status if it belongs to the job currently tracked.
    pub fn apply_status(&mut self, job_id: &JobId, status: JobStatus) -> bool {
        if self.job_id.as_ref() != Some(job_id) {
            return false;
        }
        self.job_status = Some(status);
        true
    }

    pub fn edit_scene(&mut self, index: usize, field: SceneField, text: String) -> bool {
        let Some(scene) = self.scenes.get_mut(index) else {
            return false;
        };
        match field {
            SceneField::Narration => scene.narration = text,
            SceneField::ImagePrompt => scene.image_prompt = text,
        }
        true
    }

    pub fn reset_scenes(&mut self) {
        self.gate.invalidate(Action::Generate);
        self.scenes.clear();
        self.step = Step::TitleEntry;
    }

    pub fn continue_to_upload(&mut self) {
        if !self.scenes.is_empty() && self.step < Step::SceneReview {
            self.step = Step::SceneReview;
        }
    }

    pub fn back_to_upload(&mut self) {
        self.step = if self.upload_id.is_some() {
            Step::Uploaded
        } else {
            Step::SceneReview
        };
    }

    pub fn add_files(&mut self, files: impl IntoIterator<Item = F>) -> AddReport
    where
        F: MediaFile,
    {
        self.files.add(files)
    }

    pub fn remove_file(&mut self, index: usize) -> Option<PendingFile<F>> {
        self.files.remove(index)
    }

    /// Drops every pending file and forgets the upload they produced.
    pub fn clear_files(&mut self) -> Vec<PendingFile<F>> {
        self.gate.invalidate(Action::Upload);
        self.upload_id = None;
        self.files.clear()
    }

    pub fn video_ready(&self) -> Option<&JobId> {
        match (&self.job_id, &self.job_status) {
            (Some(job_id), Some(status)) if status.status == crate::api::JobState::Done => {
                Some(job_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobState;

    #[derive(Debug, Clone, PartialEq)]
    struct FakeFile {
        name: &'static str,
        mime: &'static str,
        size: f64,
    }

    impl MediaFile for FakeFile {
        fn file_name(&self) -> String {
            self.name.to_string()
        }

        fn mime_type(&self) -> String {
            self.mime.to_string()
        }

        fn size_bytes(&self) -> f64 {
            self.size
        }
    }

    fn image(name: &'static str) -> FakeFile {
        FakeFile {
            name,
            mime: "image/png",
            size: 2048.0,
        }
    }

    fn scene(n: usize) -> Scene {
        Scene {
            narration: format!("narration {}", n),
            image_prompt: format!("prompt {}", n),
        }
    }

    #[test]
    fn blank_title_never_yields_a_ticket() {
        let mut flow = Flow::<FakeFile>::default();
        flow.title = "   ".to_string();
        assert_eq!(
            flow.begin_generate(),
            Err(ClientError::Validation("Enter a title"))
        );
        assert!(!flow.is_busy(Action::Generate));
        assert_eq!(flow.step(), Step::TitleEntry);
    }

    #[test]
    fn generate_success_moves_to_scene_review() {
        let mut flow = Flow::<FakeFile>::default();
        flow.set_title("Midnight Decisions");
        flow.set_style(Style::Anime);
        let ticket = flow.begin_generate().unwrap();
        assert!(flow.is_busy(Action::Generate));
        assert!(flow.begin_generate().is_err());

        let settled = flow.finish_generate(ticket, Ok((0..5).map(scene).collect()));
        assert_eq!(settled, Settled::Applied);
        assert_eq!(flow.step(), Step::SceneReview);
        assert_eq!(flow.scenes.len(), 5);
        assert!(!flow.is_busy(Action::Generate));
    }

    #[test]
    fn generate_failure_releases_busy_and_keeps_step() {
        let mut flow = Flow::<FakeFile>::default();
        flow.title = "t".to_string();
        let ticket = flow.begin_generate().unwrap();
        let settled = flow.finish_generate(
            ticket,
            Err(ClientError::Transport("Failed to fetch".to_string())),
        );
        assert_eq!(
            settled,
            Settled::Failed(ClientError::Transport("Failed to fetch".to_string()))
        );
        assert_eq!(flow.step(), Step::TitleEntry);
        assert!(!flow.is_busy(Action::Generate));
    }

    #[test]
    fn reset_drops_a_late_generate_response() {
        let mut flow = Flow::<FakeFile>::default();
        flow.title = "t".to_string();
        let ticket = flow.begin_generate().unwrap();
        flow.reset_scenes();

        let settled = flow.finish_generate(ticket, Ok(vec![scene(1)]));
        assert_eq!(settled, Settled::Stale);
        assert!(flow.scenes.is_empty());
        assert_eq!(flow.step(), Step::TitleEntry);
    }

    #[test]
    fn title_is_sent_as_typed() {
        let mut flow = Flow::<FakeFile>::default();
        flow.set_title("  Midnight Decisions ");
        assert!(flow.begin_generate().is_ok());
        assert_eq!(flow.request_title(), "  Midnight Decisions ");
    }

    #[test]
    fn upload_requires_files_and_stores_upload_id() {
        let mut flow = Flow::<FakeFile>::default();
        assert_eq!(flow.begin_upload(), Err(ClientError::Validation("Select files")));

        flow.add_files([image("a.png"), image("b.jpg")]);
        let ticket = flow.begin_upload().unwrap();
        let settled = flow.finish_upload(ticket, Ok(UploadId("u-1".to_string())));
        assert_eq!(settled, Settled::Applied);
        assert_eq!(flow.step(), Step::Uploaded);
        assert_eq!(flow.upload_id, Some(UploadId("u-1".to_string())));
    }

    #[test]
    fn build_without_upload_is_rejected() {
        let mut flow = Flow::<FakeFile>::default();
        assert_eq!(flow.begin_build(), Err(ClientError::Validation("Upload first")));
        assert!(!flow.is_busy(Action::Build));
    }

    #[test]
    fn build_without_job_id_fails() {
        let mut flow = Flow::<FakeFile>::default();
        flow.upload_id = Some(UploadId("u".to_string()));
        let ticket = flow.begin_build().unwrap();
        let settled = flow.finish_build(ticket, Ok(None));
        assert_eq!(
            settled,
            Settled::Failed(ClientError::Validation("No job_id returned"))
        );
        assert_eq!(flow.job_id, None);
    }

    #[test]
    fn new_build_replaces_job_and_clears_status() {
        let mut flow = Flow::<FakeFile>::default();
        flow.upload_id = Some(UploadId("u".to_string()));

        let first = JobId("j-1".to_string());
        let ticket = flow.begin_build().unwrap();
        flow.finish_build(ticket, Ok(Some(first.clone())));
        assert!(flow.apply_status(
            &first,
            JobStatus {
                status: JobState::Done,
                progress: 100.0,
                ..JobStatus::default()
            }
        ));
        assert_eq!(flow.video_ready(), Some(&first));

        let second = JobId("j-2".to_string());
        let ticket = flow.begin_build().unwrap();
        flow.finish_build(ticket, Ok(Some(second.clone())));
        assert_eq!(flow.step(), Step::Monitoring);
        assert_eq!(flow.job_status, None);
        assert_eq!(flow.video_ready(), None);

        // Late status for the abandoned job is ignored.
        assert!(!flow.apply_status(&first, JobStatus::default()));
        assert_eq!(flow.job_status, None);
    }

    #[test]
    fn removing_a_file_keeps_the_rest_in_order() {
        let mut flow = Flow::<FakeFile>::default();
        flow.files
            .add([image("a.png"), image("b.png"), image("c.png"), image("d.png")]);
        let before: Vec<_> = flow.files.iter().map(|f| (f.key, f.file.name)).collect();

        let removed = flow.remove_file(1).unwrap();
        assert_eq!(removed.file.name, "b.png");
        assert_eq!(flow.files.len(), 3);

        let after: Vec<_> = flow.files.iter().map(|f| (f.key, f.file.name)).collect();
        assert_eq!(after, vec![before[0], before[2], before[3]]);
        assert!(flow.remove_file(7).is_none());
        assert_eq!(flow.files.len(), 3);
    }

    #[test]
    fn file_filter_accepts_images_and_listed_videos() {
        let mut files = PendingFiles::default();
        let report = files.add([
            image("still.png"),
            FakeFile {
                name: "Clip.MOV",
                mime: "video/quicktime",
                size: 1.0,
            },
            FakeFile {
                name: "clip.flv",
                mime: "video/x-flv",
                size: 1.0,
            },
            FakeFile {
                name: "notes.txt",
                mime: "text/plain",
                size: 1.0,
            },
        ]);
        assert_eq!(report.added, 2);
        assert_eq!(report.rejected, vec!["clip.flv".to_string(), "notes.txt".to_string()]);
        let kinds: Vec<_> = files.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video]);
    }

    #[test]
    fn clearing_files_forgets_upload_id() {
        let mut flow = Flow::<FakeFile>::default();
        flow.files.add([image("a.png")]);
        flow.upload_id = Some(UploadId("u".to_string()));
        let removed = flow.clear_files();
        assert_eq!(removed.len(), 1);
        assert!(flow.files.is_empty());
        assert_eq!(flow.upload_id, None);
    }

    #[test]
    fn scene_edits_apply_by_index() {
        let mut flow = Flow::<FakeFile>::default();
        flow.scenes = vec![scene(0), scene(1)];
        assert!(flow.edit_scene(1, SceneField::ImagePrompt, "foggy pier".to_string()));
        assert_eq!(flow.scenes[1].image_prompt, "foggy pier");
        assert_eq!(flow.scenes[0], scene(0));
        assert!(!flow.edit_scene(2, SceneField::Narration, "x".to_string()));
    }

    #[test]
    fn navigation_between_sections() {
        let mut flow = Flow::<FakeFile>::default();
        flow.continue_to_upload();
        assert_eq!(flow.step(), Step::TitleEntry);

        flow.scenes = vec![scene(0)];
        flow.continue_to_upload();
        assert_eq!(flow.step(), Step::SceneReview);
        assert!(flow.show_upload());
        assert!(!flow.show_build());

        flow.upload_id = Some(UploadId("u".to_string()));
        flow.back_to_upload();
        assert_eq!(flow.step(), Step::Uploaded);
        assert!(flow.show_build());
    }

    #[test]
    fn formatting_helpers() {
        assert_eq!(format_size_kb(2048.0), "2 KB");
        assert_eq!(format_size_kb(1500.0), "1 KB");
        assert_eq!(format_seconds(75.9), "01:15");
        assert_eq!(format_seconds(f64::NAN), "00:00");
        assert!(is_video_file("TRAILER.WebM"));
        assert!(!is_video_file("poster.webp"));
    }

    #[test]
    fn gate_ids_increase_across_actions() {
        let mut gate = RequestGate::default();
        let a = gate.issue(Action::Generate);
        let b = gate.issue(Action::Generate);
        assert!(!gate.is_current(a));
        assert!(gate.is_current(b));
        assert!(!gate.settle(a));
        assert!(gate.settle(b));
        assert!(!gate.is_busy(Action::Generate));
    }
}
