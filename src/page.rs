//! DOM for the single-page flow and the functions that refresh it.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, HtmlAnchorElement, HtmlButtonElement, HtmlElement, HtmlImageElement,
    HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, HtmlVideoElement,
};

use crate::api::{JobState, JobStatus, Scene, Style};
use crate::flow::{FILE_INPUT_ACCEPT, MediaFile, PendingFile, SceneField, format_size_kb};

const STYLE_ELEMENT_ID: &str = "visionforge-styles";
const DROPZONE_IDLE_LABEL: &str = "Drag & drop images/videos";
const DROPZONE_ACTIVE_LABEL: &str = "Drop files here";

/// Rules for every class the page toggles.
const STYLES: &str = r#"
body { margin: 0; background: #05070c; color: #e6f1ff; font-family: system-ui, sans-serif; }
[hidden] { display: none !important; }
.bg-canvas-wrap { position: fixed; inset: 0; pointer-events: none; z-index: 0; }
.bg-layer { position: absolute; inset: 0; transition: transform 120ms ease-out; }
.app-wrapper { position: relative; z-index: 1; }
.topbar { display: flex; align-items: baseline; gap: 12px; padding: 18px 28px; }
.brand { font-size: 22px; font-weight: 700; letter-spacing: 0.04em; }
.container { max-width: 1080px; margin: 0 auto; padding: 0 20px 48px; display: grid; gap: 20px; }
.card { background: rgba(12, 18, 30, 0.72); border: 1px solid rgba(124, 92, 255, 0.22); border-radius: 14px; padding: 20px; }
.row { display: flex; flex-wrap: wrap; align-items: center; gap: 10px; margin-top: 12px; }
.section-head { display: flex; align-items: center; gap: 12px; margin-bottom: 14px; }
.section-head .small-muted { flex: 1; }
.h2 { font-size: 17px; font-weight: 600; }
.kicker { font-size: 11px; letter-spacing: 0.18em; color: #00ffd1; }
.small-muted { font-size: 12px; color: #8a98b5; }
.glass { width: 100%; box-sizing: border-box; padding: 12px 14px; border-radius: 10px; border: 1px solid rgba(255, 255, 255, 0.12); background: rgba(255, 255, 255, 0.04); color: inherit; font-size: 16px; }
.btn { padding: 9px 16px; border-radius: 10px; border: 1px solid transparent; cursor: pointer; font-weight: 600; color: inherit; text-decoration: none; display: inline-block; }
.btn-primary { background: linear-gradient(135deg, #7c5cff, #00c8b4); color: #05070c; }
.btn-ghost { background: rgba(255, 255, 255, 0.05); border-color: rgba(255, 255, 255, 0.14); }
.btn-danger { color: #ff7a90; }
.btn:disabled { cursor: not-allowed; opacity: 0.55; }
.btn.loading { position: relative; opacity: 0.7; cursor: progress; }
.preview { margin-top: 16px; }
.dot { display: inline-block; width: 8px; height: 8px; border-radius: 50%; margin-right: 8px; background: #3a4458; }
.dot.live { background: #00ffd1; box-shadow: 0 0 10px #00ffd1; }
.prompt-pre { white-space: pre-wrap; font-family: ui-monospace, monospace; font-size: 13px; margin: 6px 0 10px; }
.scenes-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(280px, 1fr)); gap: 14px; }
.scene-card { border: 1px solid rgba(255, 255, 255, 0.08); border-radius: 12px; padding: 14px; }
.scene-header { display: flex; align-items: center; gap: 8px; margin-bottom: 8px; }
.scene-badge { width: 24px; height: 24px; border-radius: 50%; display: grid; place-items: center; background: #7c5cff; font-size: 12px; }
.cyber-label { font-size: 12px; color: #8a98b5; margin-top: 8px; }
.cyber-textarea { width: 100%; box-sizing: border-box; resize: vertical; border-radius: 8px; border: 1px solid rgba(255, 255, 255, 0.1); background: rgba(0, 0, 0, 0.25); color: inherit; padding: 8px; }
.char-count { font-size: 11px; color: #5f6b84; text-align: right; }
.energy-copy-btn { font-size: 12px; padding: 4px 10px; border-radius: 8px; border: 1px solid rgba(0, 255, 209, 0.3); background: transparent; color: #00ffd1; cursor: pointer; }
.energy-copy-btn.copied { background: #00ffd1; color: #05070c; }
.dropzone { border: 2px dashed rgba(124, 92, 255, 0.4); border-radius: 12px; padding: 28px; text-align: center; cursor: pointer; }
.dropzone.drag-over { border-color: #00ffd1; background-color: rgba(0, 255, 209, 0.08); }
.file-grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(160px, 1fr)); gap: 12px; margin-top: 14px; }
.file-card { position: relative; border: 1px solid rgba(255, 255, 255, 0.08); border-radius: 10px; padding: 10px; overflow: hidden; }
.file-name { font-size: 13px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; padding-right: 22px; }
.file-remove { position: absolute; top: 6px; right: 6px; border: none; background: rgba(255, 122, 144, 0.2); color: #ff7a90; border-radius: 50%; width: 22px; height: 22px; cursor: pointer; }
.file-preview { display: block; width: 100%; height: 110px; object-fit: cover; border-radius: 8px; margin-top: 8px; }
.status-panel { margin-top: 16px; display: grid; gap: 8px; }
.status-badge { justify-self: start; padding: 3px 10px; border-radius: 999px; font-size: 12px; background: #1b2336; text-transform: uppercase; }
.status-badge[data-state="building"], .status-badge[data-state="queued"] { background: #2c2370; }
.status-badge[data-state="done"] { background: #0d5c50; }
.status-badge[data-state="error"] { background: #6b1c2b; }
.progress { height: 8px; border-radius: 999px; background: rgba(255, 255, 255, 0.08); overflow: hidden; }
.progress-fill { height: 100%; width: 0; background: linear-gradient(90deg, #7c5cff, #00ffd1); transition: width 400ms ease; }
.status-error { color: #ff7a90; background: rgba(255, 122, 144, 0.08); border-radius: 8px; padding: 8px 10px; }
.output { margin-top: 18px; }
.output video { width: 100%; max-height: 480px; border-radius: 10px; background: #000; }
.share-qr { display: block; width: 176px; height: 176px; margin-top: 12px; image-rendering: pixelated; }
"#;

/// Adds the page stylesheet once per document.
pub fn install_styles(document: &Document) -> Result<(), JsValue> {
    if document.get_element_by_id(STYLE_ELEMENT_ID).is_some() {
        return Ok(());
    }
    let style = document.create_element("style")?;
    style.set_id(STYLE_ELEMENT_ID);
    style.set_text_content(Some(STYLES));
    match document.head() {
        Some(head) => head.append_child(&style)?,
        None => document
            .document_element()
            .ok_or_else(|| JsValue::from_str("Missing document element"))?
            .append_child(&style)?,
    };
    Ok(())
}

/// Enter submits the title unless it is confirming an IME composition.
pub fn submits_title(key: &str, composing: bool) -> bool {
    key == "Enter" && !composing
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CopyTarget {
    pub index: usize,
    pub field: SceneField,
}

pub fn field_key(field: SceneField) -> &'static str {
    match field {
        SceneField::Narration => "narration",
        SceneField::ImagePrompt => "image_prompt",
    }
}

pub fn parse_field_key(key: &str) -> Option<SceneField> {
    match key {
        "narration" => Some(SceneField::Narration),
        "image_prompt" => Some(SceneField::ImagePrompt),
        _ => None,
    }
}

pub fn copy_label(copied: Option<CopyTarget>, index: usize, field: SceneField) -> &'static str {
    let is_copied = copied == Some(CopyTarget { index, field });
    match (field, is_copied) {
        (_, true) => "Copied!",
        (SceneField::ImagePrompt, false) => "Copy Prompt",
        (SceneField::Narration, false) => "Copy Narration",
    }
}

pub fn upload_heading(count: usize) -> String {
    format!("Upload Media ({} files)", count)
}

pub fn scene_count_line(count: usize) -> String {
    format!("{} cinematic scenes ready • Edit before rendering", count)
}

pub fn char_count(text: &str) -> String {
    format!("{} chars", text.chars().count())
}

pub fn progress_line(status: Option<&JobStatus>) -> String {
    let percent = status.map(JobStatus::progress_percent).unwrap_or(0);
    let message = status
        .and_then(|s| s.status_message.as_deref())
        .filter(|m| !m.is_empty())
        .unwrap_or("Waiting to start");
    format!("Progress: {}% • {}", percent, message)
}

/// Text for the inline error box; the backend's `error` is shown as-is.
pub fn status_error_text(status: Option<&JobStatus>) -> Option<String> {
    let status = status.filter(|s| s.status == JobState::Error)?;
    let detail = status
        .error
        .as_deref()
        .or(status.status_message.as_deref())
        .unwrap_or("Unknown error");
    Some(format!("Error: {}", detail))
}

pub fn badge_text(status: Option<&JobStatus>) -> &'static str {
    status.map(|s| s.status.as_str()).unwrap_or("idle")
}

fn el(document: &Document, tag: &str, class: &str) -> Result<HtmlElement, JsValue> {
    let element = document.create_element(tag)?.dyn_into::<HtmlElement>()?;
    if !class.is_empty() {
        element.set_class_name(class);
    }
    Ok(element)
}

fn text_el(document: &Document, tag: &str, class: &str, text: &str) -> Result<HtmlElement, JsValue> {
    let element = el(document, tag, class)?;
    element.set_text_content(Some(text));
    Ok(element)
}

fn button(document: &Document, id: &str, class: &str, text: &str) -> Result<HtmlButtonElement, JsValue> {
    let button = text_el(document, "button", class, text)?.dyn_into::<HtmlButtonElement>()?;
    button.set_id(id);
    button.set_type("button");
    Ok(button)
}

fn append_all(parent: &HtmlElement, children: &[&HtmlElement]) -> Result<(), JsValue> {
    for child in children {
        parent.append_child(child)?;
    }
    Ok(())
}

/// Handles to every element the app updates after construction.
pub struct Ui {
    pub root: HtmlElement,
    pub title_input: HtmlInputElement,
    pub style_select: HtmlSelectElement,
    pub generate_button: HtmlButtonElement,
    pub preview_body: HtmlElement,
    pub preview_empty: HtmlElement,
    pub preview_dot: HtmlElement,
    pub preview_narration: HtmlElement,
    pub preview_prompt: HtmlElement,
    pub preview_copy: HtmlButtonElement,
    pub scenes_card: HtmlElement,
    pub scene_count: HtmlElement,
    pub scenes_grid: HtmlElement,
    pub reset_button: HtmlButtonElement,
    pub continue_button: HtmlButtonElement,
    pub upload_card: HtmlElement,
    pub upload_heading: HtmlElement,
    pub clear_files_button: HtmlButtonElement,
    pub upload_button: HtmlButtonElement,
    pub dropzone: HtmlElement,
    pub dropzone_label: HtmlElement,
    pub file_input: HtmlInputElement,
    pub file_list: HtmlElement,
    pub build_card: HtmlElement,
    pub build_button: HtmlButtonElement,
    pub back_button: HtmlButtonElement,
    pub status_badge: HtmlElement,
    pub progress_fill: HtmlElement,
    pub progress_text: HtmlElement,
    pub status_error: HtmlElement,
    pub output_ready: HtmlElement,
    pub output_placeholder: HtmlElement,
    pub video: HtmlVideoElement,
    pub video_duration: HtmlElement,
    pub download_link: HtmlAnchorElement,
    pub copy_link_button: HtmlButtonElement,
    pub share_qr: HtmlImageElement,
}

impl Ui {
    pub fn build(document: &Document, root: &HtmlElement) -> Result<Self, JsValue> {
        install_styles(document)?;
        root.set_class_name("app-wrapper");

        let header = el(document, "header", "topbar")?;
        let brand = text_el(document, "div", "brand", "VisionForge")?;
        let tagline = text_el(document, "div", "small-muted", "AI cinematic video generator")?;
        append_all(&header, &[&brand, &tagline])?;

        let main = el(document, "main", "container")?;
        append_all(root, &[&header, &main])?;

        // Title entry + live preview.
        let title_card = el(document, "section", "card")?;
        title_card.set_id("title-card");
        let kicker = text_el(document, "div", "kicker", "START HERE")?;
        let title_input = document
            .create_element("input")?
            .dyn_into::<HtmlInputElement>()?;
        title_input.set_id("title-input");
        title_input.set_class_name("glass");
        title_input.set_placeholder("Type a cinematic title – e.g. 'Midnight Decisions'");

        let style_select = document
            .create_element("select")?
            .dyn_into::<HtmlSelectElement>()?;
        style_select.set_id("style-select");
        style_select.set_class_name("btn btn-ghost");
        for style in Style::ALL {
            let option = text_el(document, "option", "", style.label())?;
            option.set_attribute("value", style.as_str())?;
            style_select.append_child(&option)?;
        }
        style_select.set_value(Style::default().as_str());

        let generate_button = button(document, "generate-btn", "btn btn-primary", "Generate Prompts")?;
        let hint = text_el(document, "div", "small-muted", "Keep title short & cinematic")?;
        let controls = el(document, "div", "row")?;
        append_all(&controls, &[&style_select, &generate_button, &hint])?;

        let preview = el(document, "div", "card preview")?;
        let preview_head = el(document, "div", "h2")?;
        let preview_dot = el(document, "span", "dot")?;
        preview_head.append_child(&preview_dot)?;
        preview_head.append_with_str_1("Live Preview")?;
        let preview_empty = text_el(
            document,
            "div",
            "small-muted",
            "Generate prompts to preview your first scene",
        )?;
        let preview_body = el(document, "div", "")?;
        let preview_narration = el(document, "div", "preview-narration")?;
        let preview_prompt = el(document, "div", "prompt-pre")?;
        let preview_copy = button(document, "preview-copy", "btn btn-ghost", "Copy Prompt")?;
        append_all(
            &preview_body,
            &[
                &text_el(document, "div", "small-muted", "Narration")?,
                &preview_narration,
                &text_el(document, "div", "small-muted", "Image Prompt")?,
                &preview_prompt,
                &preview_copy,
            ],
        )?;
        append_all(&preview, &[&preview_head, &preview_empty, &preview_body])?;

        let entry = el(document, "div", "")?;
        append_all(&entry, &[&kicker, &title_input, &controls])?;
        append_all(&title_card, &[&entry, &preview])?;

        // Scene editor.
        let scenes_card = el(document, "section", "card")?;
        scenes_card.set_id("scenes-card");
        let scenes_head = el(document, "div", "section-head")?;
        let scenes_title = text_el(document, "div", "h2", "Prompts & Narrations")?;
        let scene_count = el(document, "div", "small-muted")?;
        let reset_button = button(document, "reset-btn", "btn btn-ghost btn-danger", "Reset All")?;
        append_all(&scenes_head, &[&scenes_title, &scene_count, &reset_button])?;
        let scenes_grid = el(document, "div", "scenes-grid")?;
        scenes_grid.set_id("scenes-grid");
        let continue_button =
            button(document, "continue-btn", "btn btn-primary", "Continue to Upload")?;
        append_all(&scenes_card, &[&scenes_head, &scenes_grid, &continue_button])?;

        // Upload.
        let upload_card = el(document, "section", "card")?;
        upload_card.set_id("upload-card");
        let upload_head = el(document, "div", "section-head")?;
        let upload_heading_el = el(document, "div", "h2")?;
        let clear_files_button = button(document, "clear-files-btn", "btn btn-ghost", "Clear All")?;
        let upload_button = button(document, "upload-btn", "btn btn-primary", "Upload (0)")?;
        append_all(
            &upload_head,
            &[&upload_heading_el, &clear_files_button, &upload_button],
        )?;
        let dropzone = el(document, "div", "dropzone")?;
        dropzone.set_id("dropzone");
        let dropzone_label = text_el(document, "div", "", DROPZONE_IDLE_LABEL)?;
        let dropzone_hint = text_el(
            document,
            "div",
            "small-muted",
            "or click to browse • MP4, MOV, AVI, MKV, WEBM and images",
        )?;
        let file_input = document
            .create_element("input")?
            .dyn_into::<HtmlInputElement>()?;
        file_input.set_id("file-input");
        file_input.set_type("file");
        file_input.set_multiple(true);
        file_input.set_accept(FILE_INPUT_ACCEPT);
        file_input.set_hidden(true);
        append_all(&dropzone, &[&dropzone_label, &dropzone_hint])?;
        let file_list = el(document, "div", "file-grid")?;
        file_list.set_id("file-list");
        append_all(&upload_card, &[&upload_head, &dropzone, &file_input, &file_list])?;

        // Build + status + output.
        let build_card = el(document, "section", "card")?;
        build_card.set_id("build-card");
        let build_controls = el(document, "div", "row")?;
        let build_button = button(document, "build-btn", "btn btn-primary", "Start Build")?;
        let back_button = button(document, "back-btn", "btn btn-ghost", "Back to Upload")?;
        append_all(&build_controls, &[&build_button, &back_button])?;

        let status_panel = el(document, "div", "status-panel")?;
        let status_badge = el(document, "div", "status-badge")?;
        status_badge.set_id("status-badge");
        let progress = el(document, "div", "progress")?;
        let progress_fill = el(document, "div", "progress-fill")?;
        progress.append_child(&progress_fill)?;
        let progress_text = el(document, "div", "small-muted")?;
        progress_text.set_id("progress-text");
        let status_error = el(document, "div", "status-error")?;
        status_error.set_id("status-error");
        append_all(
            &status_panel,
            &[
                &text_el(document, "div", "small-muted", "Status")?,
                &status_badge,
                &progress,
                &progress_text,
                &status_error,
            ],
        )?;

        let output = el(document, "div", "output")?;
        let output_placeholder = text_el(
            document,
            "div",
            "small-muted",
            "Your rendered video will appear here",
        )?;
        let output_ready = el(document, "div", "")?;
        output_ready.set_id("output-ready");
        let video = document
            .create_element("video")?
            .dyn_into::<HtmlVideoElement>()?;
        video.set_controls(true);
        let video_duration = el(document, "div", "small-muted")?;
        let download_link = text_el(document, "a", "btn btn-primary", "Download")?
            .dyn_into::<HtmlAnchorElement>()?;
        download_link.set_download("");
        let copy_link_button = button(document, "copy-link-btn", "btn btn-ghost", "Copy Link")?;
        let share_qr = document
            .create_element("img")?
            .dyn_into::<HtmlImageElement>()?;
        share_qr.set_alt("Scan to open the video on another device");
        share_qr.set_class_name("share-qr");
        append_all(
            &output_ready,
            &[&video, &video_duration, &download_link, &copy_link_button, &share_qr],
        )?;
        append_all(&output, &[&output_placeholder, &output_ready])?;
        append_all(&build_card, &[
            &text_el(document, "div", "h2", "Build & Render")?,
            &build_controls,
            &status_panel,
            &output,
        ])?;

        append_all(&main, &[&title_card, &scenes_card, &upload_card, &build_card])?;

        Ok(Self {
            root: root.clone(),
            title_input,
            style_select,
            generate_button,
            preview_body,
            preview_empty,
            preview_dot,
            preview_narration,
            preview_prompt,
            preview_copy,
            scenes_card,
            scene_count,
            scenes_grid,
            reset_button,
            continue_button,
            upload_card,
            upload_heading: upload_heading_el,
            clear_files_button,
            upload_button,
            dropzone,
            dropzone_label,
            file_input,
            file_list,
            build_card,
            build_button,
            back_button,
            status_badge,
            progress_fill,
            progress_text,
            status_error,
            output_ready,
            output_placeholder,
            video,
            video_duration,
            download_link,
            copy_link_button,
            share_qr,
        })
    }
}

pub fn set_dropzone_active(ui: &Ui, active: bool) {
    let _ = ui.dropzone.class_list().toggle_with_force("drag-over", active);
    ui.dropzone_label.set_text_content(Some(if active {
        DROPZONE_ACTIVE_LABEL
    } else {
        DROPZONE_IDLE_LABEL
    }));
}

pub fn set_busy(button: &HtmlButtonElement, busy: bool) {
    button.set_disabled(busy);
    let _ = button.class_list().toggle_with_force("loading", busy);
}

pub fn render_preview(ui: &Ui, first: Option<&Scene>, copied: Option<CopyTarget>) {
    ui.preview_empty.set_hidden(first.is_some());
    ui.preview_body.set_hidden(first.is_none());
    let _ = ui.preview_dot.class_list().toggle_with_force("live", first.is_some());
    if let Some(scene) = first {
        ui.preview_narration.set_text_content(Some(&scene.narration));
        ui.preview_prompt.set_text_content(Some(&scene.image_prompt));
    }
    ui.preview_copy
        .set_text_content(Some(copy_label(copied, 0, SceneField::ImagePrompt)));
}

fn scene_card(document: &Document, index: usize, scene: &Scene) -> Result<HtmlElement, JsValue> {
    let card = el(document, "div", "scene-card")?;
    card.set_attribute("data-scene-index", &index.to_string())?;

    let header = el(document, "div", "scene-header")?;
    append_all(&header, &[
        &text_el(document, "div", "scene-badge", &(index + 1).to_string())?,
        &text_el(document, "div", "scene-title", &format!("Scene {}", index + 1))?,
    ])?;
    card.append_child(&header)?;

    for (field, label, rows, text) in [
        (SceneField::Narration, "Narration", 2, &scene.narration),
        (SceneField::ImagePrompt, "Image Prompt", 4, &scene.image_prompt),
    ] {
        let key = field_key(field);
        let textarea = document
            .create_element("textarea")?
            .dyn_into::<HtmlTextAreaElement>()?;
        textarea.set_class_name("cyber-textarea");
        textarea.set_rows(rows);
        textarea.set_value(text);
        textarea.set_attribute("data-scene-index", &index.to_string())?;
        textarea.set_attribute("data-field", key)?;

        let counter = text_el(document, "div", "char-count", &char_count(text))?;
        counter.set_attribute("data-count-for", &format!("{}-{}", index, key))?;

        let copy = text_el(document, "button", "energy-copy-btn", copy_label(None, index, field))?;
        copy.set_attribute("type", "button")?;
        copy.set_attribute("data-copy", key)?;
        copy.set_attribute("data-scene-index", &index.to_string())?;

        append_all(&card, &[
            &text_el(document, "div", "cyber-label", label)?,
            &textarea.unchecked_into::<HtmlElement>(),
            &counter,
            &copy,
        ])?;
    }

    Ok(card)
}

pub fn render_scene_grid(document: &Document, ui: &Ui, scenes: &[Scene]) -> Result<(), JsValue> {
    ui.scenes_grid.set_inner_html("");
    for (index, scene) in scenes.iter().enumerate() {
        let card = scene_card(document, index, scene)?;
        ui.scenes_grid.append_child(&card)?;
    }
    ui.scene_count.set_text_content(Some(&scene_count_line(scenes.len())));
    Ok(())
}

pub fn render_copy_labels(ui: &Ui, copied: Option<CopyTarget>) -> Result<(), JsValue> {
    let buttons = ui.scenes_grid.query_selector_all("[data-copy]")?;
    for i in 0..buttons.length() {
        let Some(node) = buttons.get(i) else {
            continue;
        };
        let Ok(button) = node.dyn_into::<HtmlElement>() else {
            continue;
        };
        let field = button
            .get_attribute("data-copy")
            .and_then(|key| parse_field_key(&key));
        let index = button
            .get_attribute("data-scene-index")
            .and_then(|value| value.parse::<usize>().ok());
        if let (Some(field), Some(index)) = (field, index) {
            button.set_text_content(Some(copy_label(copied, index, field)));
            let _ = button.class_list().toggle_with_force(
                "copied",
                copied == Some(CopyTarget { index, field }),
            );
        }
    }
    Ok(())
}

pub fn update_char_count(ui: &Ui, index: usize, field: SceneField, text: &str) -> Result<(), JsValue> {
    let selector = format!("[data-count-for=\"{}-{}\"]", index, field_key(field));
    if let Some(counter) = ui.scenes_grid.query_selector(&selector)? {
        counter.set_text_content(Some(&char_count(text)));
    }
    Ok(())
}

pub fn render_file_list<F: MediaFile>(
    document: &Document,
    ui: &Ui,
    files: &[&PendingFile<F>],
) -> Result<(), JsValue> {
    ui.file_list.set_inner_html("");
    for (index, entry) in files.iter().enumerate() {
        let card = el(document, "div", "file-card")?;
        card.set_attribute("data-file-key", &entry.key.value().to_string())?;

        let name = text_el(document, "div", "file-name", &entry.file.file_name())?;
        let remove = text_el(document, "button", "file-remove", "×")?;
        remove.set_attribute("type", "button")?;
        remove.set_attribute("aria-label", "Remove file")?;
        remove.set_attribute("data-remove-index", &index.to_string())?;
        let meta = text_el(
            document,
            "div",
            "small-muted",
            &format!("{} • {}", format_size_kb(entry.file.size_bytes()), entry.kind.label()),
        )?;
        append_all(&card, &[&name, &remove, &meta])?;

        if let Some(url) = &entry.preview_url {
            let preview = match entry.kind {
                crate::flow::MediaKind::Video => {
                    let video = document
                        .create_element("video")?
                        .dyn_into::<HtmlVideoElement>()?;
                    video.set_src(url);
                    video.set_muted(true);
                    video.unchecked_into::<HtmlElement>()
                }
                crate::flow::MediaKind::Image => {
                    let image = document
                        .create_element("img")?
                        .dyn_into::<HtmlImageElement>()?;
                    image.set_src(url);
                    image.set_alt(&entry.file.file_name());
                    image.unchecked_into::<HtmlElement>()
                }
            };
            preview.set_class_name("file-preview");
            card.append_child(&preview)?;
        }

        ui.file_list.append_child(&card)?;
    }

    ui.upload_heading
        .set_text_content(Some(&upload_heading(files.len())));
    ui.upload_button
        .set_text_content(Some(&format!("Upload ({})", files.len())));
    ui.clear_files_button.set_hidden(files.is_empty());
    Ok(())
}

pub fn render_status(ui: &Ui, status: Option<&JobStatus>) -> Result<(), JsValue> {
    ui.status_badge.set_text_content(Some(badge_text(status)));
    ui.status_badge.set_attribute("data-state", badge_text(status))?;

    let percent = status.map(JobStatus::progress_percent).unwrap_or(0);
    ui.progress_fill
        .style()
        .set_property("width", &format!("{}%", percent))?;
    ui.progress_text.set_text_content(Some(&progress_line(status)));

    match status_error_text(status) {
        Some(text) => {
            ui.status_error.set_text_content(Some(&text));
            ui.status_error.set_hidden(false);
        }
        None => {
            ui.status_error.set_text_content(None);
            ui.status_error.set_hidden(true);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: JobState) -> JobStatus {
        JobStatus {
            status: state,
            ..JobStatus::default()
        }
    }

    #[test]
    fn progress_line_defaults() {
        assert_eq!(progress_line(None), "Progress: 0% • Waiting to start");
        let building = JobStatus {
            status: JobState::Building,
            progress: 60.0,
            status_message: Some("Generating voiceovers...".to_string()),
            error: None,
        };
        assert_eq!(
            progress_line(Some(&building)),
            "Progress: 60% • Generating voiceovers..."
        );
    }

    #[test]
    fn error_text_is_verbatim() {
        let failed = JobStatus {
            error: Some("Upload u-9 has no usable images".to_string()),
            ..status(JobState::Error)
        };
        assert_eq!(
            status_error_text(Some(&failed)).as_deref(),
            Some("Error: Upload u-9 has no usable images")
        );
        assert_eq!(status_error_text(Some(&status(JobState::Building))), None);
        assert_eq!(
            status_error_text(Some(&status(JobState::Error))).as_deref(),
            Some("Error: Unknown error")
        );
    }

    #[test]
    fn badge_falls_back_to_idle() {
        assert_eq!(badge_text(None), "idle");
        assert_eq!(badge_text(Some(&status(JobState::Queued))), "queued");
    }

    #[test]
    fn copy_labels_track_the_copied_target() {
        let copied = Some(CopyTarget {
            index: 2,
            field: SceneField::Narration,
        });
        assert_eq!(copy_label(copied, 2, SceneField::Narration), "Copied!");
        assert_eq!(copy_label(copied, 2, SceneField::ImagePrompt), "Copy Prompt");
        assert_eq!(copy_label(copied, 1, SceneField::Narration), "Copy Narration");
    }

    #[test]
    fn enter_during_composition_does_not_submit() {
        assert!(submits_title("Enter", false));
        assert!(!submits_title("Enter", true));
        assert!(!submits_title("a", false));
    }

    #[test]
    fn stylesheet_covers_toggled_classes() {
        for selector in [
            ".progress {",
            ".progress-fill {",
            ".dropzone.drag-over",
            ".file-preview",
            ".btn.loading",
            ".dot.live",
            ".copied",
            ".status-error",
        ] {
            assert!(STYLES.contains(selector), "no rule for {}", selector);
        }
    }

    #[test]
    fn field_keys_round_trip() {
        for field in [SceneField::Narration, SceneField::ImagePrompt] {
            assert_eq!(parse_field_key(field_key(field)), Some(field));
        }
        assert_eq!(parse_field_key("title"), None);
    }

    #[test]
    fn headings() {
        assert_eq!(upload_heading(3), "Upload Media (3 files)");
        assert_eq!(char_count("héllo"), "5 chars");
        assert_eq!(
            scene_count_line(6),
            "6 cinematic scenes ready • Edit before rendering"
        );
    }
}
