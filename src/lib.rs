pub mod api;
pub mod background;
pub mod config;
pub mod error;
pub mod flow;
pub mod page;
pub mod poller;
pub mod share;
pub mod timer;

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, DragEvent, Element, Event, EventTarget, File, FileList, HtmlElement,
    HtmlTextAreaElement, KeyboardEvent, PageTransitionEvent, Url, Window,
};

use crate::api::{ApiClient, JobId, JobStatus, Style, share_url};
use crate::background::Background;
use crate::config::ClientConfig;
use crate::error::{ClientError, js_value_to_string};
use crate::flow::{Action, Flow, SceneField, Settled, format_seconds};
use crate::page::{CopyTarget, Ui};
use crate::poller::{StatusCallback, StatusPoller};
use crate::timer::Timeout;

const SHARE_QR_SIZE_PX: u32 = 176;

struct AppState {
    window: Window,
    document: Document,
    config: ClientConfig,
    client: ApiClient,
    flow: Flow<File>,
    poller: StatusPoller,
    background: Option<Background>,
    ui: Ui,
    scenes_rev: u64,
    rendered_scenes_rev: u64,
    files_rev: u64,
    rendered_files_rev: u64,
    rendered_video: Option<JobId>,
    copied: Option<CopyTarget>,
    copied_reset: Option<Timeout>,
    last_event: String,
}

type Shared = Rc<RefCell<AppState>>;

fn alert(message: &str) {
    if let Some(win) = web_sys::window() {
        let _ = win.alert_with_message(message);
    }
}

fn listen(
    target: &EventTarget,
    event: &str,
    handler: impl FnMut(Event) + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
    target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn event_element(event: &Event, selector: &str) -> Option<Element> {
    event
        .target()?
        .dyn_into::<Element>()
        .ok()?
        .closest(selector)
        .ok()
        .flatten()
}

fn index_attr(element: &Element, name: &str) -> Option<usize> {
    element.get_attribute(name)?.parse().ok()
}

fn scene_field_event(event: &Event) -> Option<(usize, SceneField, String)> {
    let element = event_element(event, "textarea[data-field]")?;
    let textarea = element.dyn_ref::<HtmlTextAreaElement>()?;
    let index = index_attr(&element, "data-scene-index")?;
    let field = page::parse_field_key(&element.get_attribute("data-field")?)?;
    Some((index, field, textarea.value()))
}

fn render(st: &mut AppState) -> Result<(), JsValue> {
    st.ui
        .root
        .set_attribute("data-step", &st.flow.step().number().to_string())?;
    st.ui.root.set_attribute("data-last-event", &st.last_event)?;

    let generating = st.flow.is_busy(Action::Generate);
    page::set_busy(&st.ui.generate_button, generating);
    st.ui.generate_button.set_text_content(Some(if generating {
        "Generating..."
    } else {
        "Generate Prompts"
    }));
    page::render_preview(&st.ui, st.flow.scenes.first(), st.copied);

    st.ui.scenes_card.set_hidden(!st.flow.show_scene_editor());
    if st.rendered_scenes_rev != st.scenes_rev {
        page::render_scene_grid(&st.document, &st.ui, &st.flow.scenes)?;
        st.rendered_scenes_rev = st.scenes_rev;
    }
    page::render_copy_labels(&st.ui, st.copied)?;

    st.ui.upload_card.set_hidden(!st.flow.show_upload());
    if st.rendered_files_rev != st.files_rev {
        let files: Vec<_> = st.flow.files.iter().collect();
        page::render_file_list(&st.document, &st.ui, &files)?;
        st.rendered_files_rev = st.files_rev;
    }
    let uploading = st.flow.is_busy(Action::Upload);
    page::set_busy(&st.ui.upload_button, uploading);
    let upload_label = if uploading {
        "Uploading...".to_string()
    } else {
        format!("Upload ({})", st.flow.files.len())
    };
    st.ui.upload_button.set_text_content(Some(&upload_label));

    st.ui.build_card.set_hidden(!st.flow.show_build());
    let building = st.flow.is_busy(Action::Build);
    page::set_busy(&st.ui.build_button, building);
    st.ui
        .build_button
        .set_text_content(Some(if building { "Starting..." } else { "Start Build" }));

    page::render_status(&st.ui, st.flow.job_status.as_ref())?;
    render_output(st)
}

fn render_output(st: &mut AppState) -> Result<(), JsValue> {
    let ready = st.flow.video_ready().cloned();
    st.ui.output_ready.set_hidden(ready.is_none());
    st.ui.output_placeholder.set_hidden(ready.is_some());
    if ready == st.rendered_video {
        return Ok(());
    }

    match &ready {
        Some(job_id) => {
            let url = st.client.video_url(job_id);
            st.ui.video.set_src(&url);
            st.ui.download_link.set_href(&url);
            st.ui.video_duration.set_text_content(None);
            match share::render_qr_data_url(&st.document, &url, SHARE_QR_SIZE_PX) {
                Ok(data_url) => {
                    st.ui.share_qr.set_src(&data_url);
                    st.ui.share_qr.set_hidden(false);
                }
                Err(err) => {
                    log::warn!("share QR failed: {}", js_value_to_string(&err));
                    st.ui.share_qr.set_hidden(true);
                }
            }
            log::info!("video ready for job {}", job_id);
        }
        None => {
            st.ui.video.remove_attribute("src")?;
            st.ui.download_link.remove_attribute("href")?;
        }
    }
    st.rendered_video = ready;
    Ok(())
}

fn rerender(st: &mut AppState) {
    if let Err(err) = render(st) {
        log::error!("render failed: {}", js_value_to_string(&err));
    }
}

fn sync_inputs(st: &mut AppState) {
    let title = st.ui.title_input.value();
    let style = Style::parse(&st.ui.style_select.value()).unwrap_or_default();
    st.flow.set_title(title);
    st.flow.set_style(style);
}

/// Common tail of every request: log, alert on failure, refresh the page.
fn settle(state: &Shared, action: Action, settled: Settled) {
    let mut st = state.borrow_mut();
    match settled {
        Settled::Applied => {
            log::info!("{} succeeded", action.name());
            st.last_event = format!("{}_ok", action.name());
        }
        Settled::Stale => {
            log::debug!("dropped stale {} response", action.name());
            return;
        }
        Settled::Failed(err) => {
            log::warn!("{} failed: {}", action.name(), err);
            st.last_event = format!("{}_failed", action.name());
            rerender(&mut st);
            drop(st);
            alert(&format!("{}{}", action.failure_prefix(), err));
            return;
        }
    }
    rerender(&mut st);
}

fn run_generate(state: &Shared) {
    let (ticket, client, title, style) = {
        let mut st = state.borrow_mut();
        sync_inputs(&mut st);
        let begun = st.flow.begin_generate();
        let ticket = match begun {
            Ok(ticket) => ticket,
            Err(err) => {
                drop(st);
                alert(&err.to_string());
                return;
            }
        };
        st.last_event = "generate".to_string();
        rerender(&mut st);
        (ticket, st.client.clone(), st.flow.request_title().to_string(), st.flow.style)
    };

    let state = Rc::clone(state);
    spawn_local(async move {
        let result = client.generate(&title, style).await;
        let settled = {
            let mut st = state.borrow_mut();
            let settled = st.flow.finish_generate(ticket, result);
            if settled == Settled::Applied {
                st.scenes_rev += 1;
                log::info!("received {} scenes", st.flow.scenes.len());
            }
            settled
        };
        settle(&state, Action::Generate, settled);
    });
}

fn run_upload(state: &Shared) {
    let (ticket, client, files) = {
        let mut st = state.borrow_mut();
        let begun = st.flow.begin_upload();
        let ticket = match begun {
            Ok(ticket) => ticket,
            Err(err) => {
                drop(st);
                alert(&err.to_string());
                return;
            }
        };
        st.last_event = "upload".to_string();
        rerender(&mut st);
        let files: Vec<File> = st.flow.files.files().cloned().collect();
        (ticket, st.client.clone(), files)
    };

    let state = Rc::clone(state);
    spawn_local(async move {
        log::info!("uploading {} files", files.len());
        let result = client.upload(&files).await;
        let settled = state.borrow_mut().flow.finish_upload(ticket, result);
        settle(&state, Action::Upload, settled);
    });
}

fn run_build(state: &Shared) {
    let (ticket, client, upload_id, title, style) = {
        let mut st = state.borrow_mut();
        sync_inputs(&mut st);
        let begun = st.flow.begin_build();
        let ticket = match begun {
            Ok(ticket) => ticket,
            Err(err) => {
                drop(st);
                alert(&err.to_string());
                return;
            }
        };
        let Some(upload_id) = st.flow.upload_id.clone() else {
            st.flow
                .finish_build(ticket, Err(ClientError::Validation("Upload first")));
            return;
        };
        st.last_event = "build".to_string();
        rerender(&mut st);
        (ticket, st.client.clone(), upload_id, st.flow.request_title().to_string(), st.flow.style)
    };

    let state = Rc::clone(state);
    spawn_local(async move {
        let result = client.build(&upload_id, &title, style).await;
        let settled = state.borrow_mut().flow.finish_build(ticket, result);
        let started = settled == Settled::Applied;
        settle(&state, Action::Build, settled);
        if started {
            start_polling(&state);
        }
    });
}

fn start_polling(state: &Shared) {
    let weak = Rc::downgrade(state);
    let on_status: StatusCallback = Rc::new(move |job_id: &JobId, status: JobStatus| {
        let Some(state) = weak.upgrade() else {
            return;
        };
        let mut st = state.borrow_mut();
        let label = status.status.as_str();
        if st.flow.apply_status(job_id, status) {
            st.last_event = format!("status_{}", label);
            rerender(&mut st);
        }
    });

    let mut st = state.borrow_mut();
    let Some(job_id) = st.flow.job_id.clone() else {
        return;
    };
    let client = st.client.clone();
    let interval_ms = st.config.poll_interval_ms;
    if let Err(err) = st.poller.start(client, job_id, interval_ms, on_status) {
        log::error!("could not start status polling: {}", js_value_to_string(&err));
    }
}

fn flash_copied(state: &Shared, target: CopyTarget) {
    let mut st = state.borrow_mut();
    st.copied = Some(target);
    st.last_event = "copied".to_string();
    if let Some(reset) = &st.copied_reset {
        if let Err(err) = reset.restart(st.config.copied_flash_ms) {
            log::warn!("copied flash timer failed: {}", js_value_to_string(&err));
        }
    }
    rerender(&mut st);
}

fn copied_reset_timer(state: &Shared, window: Window) -> Timeout {
    let weak = Rc::downgrade(state);
    Timeout::new(window, move || {
        let Some(state) = weak.upgrade() else {
            return;
        };
        let mut st = state.borrow_mut();
        st.copied = None;
        rerender(&mut st);
    })
}

fn copy_scene_text(state: &Shared, target: CopyTarget) {
    let text = {
        let st = state.borrow();
        let Some(scene) = st.flow.scenes.get(target.index) else {
            return;
        };
        match target.field {
            SceneField::Narration => scene.narration.clone(),
            SceneField::ImagePrompt => scene.image_prompt.clone(),
        }
    };

    let state = Rc::clone(state);
    spawn_local(async move {
        match share::copy_text(&text).await {
            Ok(()) => flash_copied(&state, target),
            Err(reason) => {
                log::warn!("copy failed: {}", reason);
                alert(&format!("Copy failed: {}", reason));
            }
        }
    });
}

fn add_files(state: &Shared, list: Option<FileList>) {
    let Some(list) = list else {
        return;
    };
    let files: Vec<File> = (0..list.length()).filter_map(|i| list.get(i)).collect();
    if files.is_empty() {
        return;
    }

    let mut st = state.borrow_mut();
    let report = st.flow.add_files(files);
    if !report.rejected.is_empty() {
        log::info!("skipped unsupported files: {}", report.rejected.join(", "));
    }
    for entry in st.flow.files.iter_mut() {
        if entry.preview_url.is_none() {
            match Url::create_object_url_with_blob(&entry.file) {
                Ok(url) => entry.preview_url = Some(url),
                Err(err) => log::warn!("no preview for {}: {}", entry.file.name(), js_value_to_string(&err)),
            }
        }
    }
    st.files_rev += 1;
    st.last_event = format!("files_added_{}", report.added);
    rerender(&mut st);
}

fn revoke_preview(url: Option<String>) {
    if let Some(url) = url {
        let _ = Url::revoke_object_url(&url);
    }
}

fn teardown(st: &mut AppState) {
    st.poller.stop();
    if let Some(mut background) = st.background.take() {
        background.destroy();
    }
    for entry in st.flow.files.iter_mut() {
        revoke_preview(entry.preview_url.take());
    }
    if let Some(reset) = &st.copied_reset {
        reset.cancel();
    }
}

fn app_root(document: &Document) -> Result<HtmlElement, JsValue> {
    if let Some(existing) = document.get_element_by_id("app") {
        return existing.dyn_into::<HtmlElement>().map_err(JsValue::from);
    }
    let body = document
        .body()
        .ok_or_else(|| JsValue::from_str("Missing document body"))?;
    let root = document.create_element("div")?.dyn_into::<HtmlElement>()?;
    root.set_id("app");
    body.append_child(&root)?;
    Ok(root)
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    if let Err(err) = start_impl() {
        let message = format!("fatal: {}", js_value_to_string(&err));
        log::error!("{}", message);

        if let Some(win) = web_sys::window() {
            if let Some(doc) = win.document() {
                if let Some(el) = doc.document_element() {
                    let _ = el.set_attribute("data-app-status", "error");
                }
                if let Some(root) = doc.get_element_by_id("app") {
                    root.set_text_content(Some(&message));
                } else if let Some(body) = doc.body() {
                    body.set_text_content(Some(&message));
                }
            }
        }

        web_sys::console::error_1(&err);
    }
}

fn start_impl() -> Result<(), JsValue> {
    let win = web_sys::window().ok_or_else(|| JsValue::from_str("Missing window"))?;
    let document = win
        .document()
        .ok_or_else(|| JsValue::from_str("Missing document"))?;

    let config = ClientConfig::from_window(&win);
    log::info!("VisionForge client using API root {}", config.api_root);

    let root = app_root(&document)?;
    let ui = Ui::build(&document, &root)?;

    let background = match (config.background, document.body()) {
        (Some(options), Some(body)) => {
            match Background::mount(&document, &body, options, config.particle_reseed_debounce_ms) {
                Ok(background) => Some(background),
                Err(err) => {
                    log::warn!("background disabled: {}", js_value_to_string(&err));
                    None
                }
            }
        }
        _ => None,
    };

    let state: Shared = Rc::new(RefCell::new(AppState {
        window: win.clone(),
        document: document.clone(),
        client: ApiClient::new(config.api_root.clone()),
        config,
        flow: Flow::default(),
        poller: StatusPoller::new(),
        background,
        ui,
        scenes_rev: 0,
        rendered_scenes_rev: 0,
        files_rev: 0,
        // Forces the first render to fill in the upload heading.
        rendered_files_rev: u64::MAX,
        rendered_video: None,
        copied: None,
        copied_reset: None,
        last_event: "init".to_string(),
    }));
    let copied_reset = copied_reset_timer(&state, win.clone());
    state.borrow_mut().copied_reset = Some(copied_reset);

    {
        let st = state.borrow();
        let ui = &st.ui;

        let s = Rc::clone(&state);
        listen(&ui.generate_button, "click", move |_| run_generate(&s))?;

        let s = Rc::clone(&state);
        listen(&ui.title_input, "keydown", move |event| {
            let submits = event
                .dyn_ref::<KeyboardEvent>()
                .is_some_and(|key| page::submits_title(&key.key(), key.is_composing()));
            if submits {
                event.prevent_default();
                run_generate(&s);
            }
        })?;

        let s = Rc::clone(&state);
        listen(&ui.preview_copy, "click", move |_| {
            copy_scene_text(
                &s,
                CopyTarget {
                    index: 0,
                    field: SceneField::ImagePrompt,
                },
            )
        })?;

        let s = Rc::clone(&state);
        listen(&ui.reset_button, "click", move |_| {
            let mut st = s.borrow_mut();
            st.flow.reset_scenes();
            st.scenes_rev += 1;
            st.last_event = "reset_scenes".to_string();
            rerender(&mut st);
        })?;

        let s = Rc::clone(&state);
        listen(&ui.continue_button, "click", move |_| {
            let mut st = s.borrow_mut();
            st.flow.continue_to_upload();
            st.last_event = "continue".to_string();
            rerender(&mut st);
            st.ui.upload_card.scroll_into_view();
        })?;

        let s = Rc::clone(&state);
        listen(&ui.scenes_grid, "input", move |event| {
            let Some((index, field, text)) = scene_field_event(&event) else {
                return;
            };
            let _ = page::update_char_count(&s.borrow().ui, index, field, &text);
        })?;

        // Edits are committed when the textarea loses focus.
        let s = Rc::clone(&state);
        listen(&ui.scenes_grid, "focusout", move |event| {
            let Some((index, field, text)) = scene_field_event(&event) else {
                return;
            };
            let mut st = s.borrow_mut();
            if st.flow.edit_scene(index, field, text) {
                st.last_event = "scene_edit".to_string();
                rerender(&mut st);
            }
        })?;

        let s = Rc::clone(&state);
        listen(&ui.scenes_grid, "click", move |event| {
            let Some(button) = event_element(&event, "[data-copy]") else {
                return;
            };
            let index = index_attr(&button, "data-scene-index");
            let field = button
                .get_attribute("data-copy")
                .and_then(|key| page::parse_field_key(&key));
            if let (Some(index), Some(field)) = (index, field) {
                copy_scene_text(&s, CopyTarget { index, field });
            }
        })?;

        let file_input = ui.file_input.clone();
        listen(&ui.dropzone, "click", move |_| file_input.click())?;

        let s = Rc::clone(&state);
        listen(&ui.dropzone, "dragover", move |event| {
            event.prevent_default();
            page::set_dropzone_active(&s.borrow().ui, true);
        })?;

        let s = Rc::clone(&state);
        listen(&ui.dropzone, "dragleave", move |_| {
            page::set_dropzone_active(&s.borrow().ui, false);
        })?;

        let s = Rc::clone(&state);
        listen(&ui.dropzone, "drop", move |event| {
            event.prevent_default();
            page::set_dropzone_active(&s.borrow().ui, false);
            let files = event
                .dyn_ref::<DragEvent>()
                .and_then(|drag| drag.data_transfer())
                .and_then(|transfer| transfer.files());
            add_files(&s, files);
        })?;

        let s = Rc::clone(&state);
        let file_input = ui.file_input.clone();
        listen(&ui.file_input, "change", move |_| {
            add_files(&s, file_input.files());
            // Lets the same file be picked again after removal.
            file_input.set_value("");
        })?;

        let s = Rc::clone(&state);
        listen(&ui.file_list, "click", move |event| {
            let Some(button) = event_element(&event, "[data-remove-index]") else {
                return;
            };
            let Some(index) = index_attr(&button, "data-remove-index") else {
                return;
            };
            let mut st = s.borrow_mut();
            if let Some(removed) = st.flow.remove_file(index) {
                revoke_preview(removed.preview_url);
                st.files_rev += 1;
                st.last_event = "file_removed".to_string();
                rerender(&mut st);
            }
        })?;

        let s = Rc::clone(&state);
        listen(&ui.clear_files_button, "click", move |_| {
            let mut st = s.borrow_mut();
            for removed in st.flow.clear_files() {
                revoke_preview(removed.preview_url);
            }
            st.files_rev += 1;
            st.last_event = "files_cleared".to_string();
            rerender(&mut st);
        })?;

        let s = Rc::clone(&state);
        listen(&ui.upload_button, "click", move |_| run_upload(&s))?;

        let s = Rc::clone(&state);
        listen(&ui.build_button, "click", move |_| run_build(&s))?;

        let s = Rc::clone(&state);
        listen(&ui.back_button, "click", move |_| {
            let mut st = s.borrow_mut();
            st.flow.back_to_upload();
            st.last_event = "back_to_upload".to_string();
            rerender(&mut st);
            st.ui.upload_card.scroll_into_view();
        })?;

        let video = ui.video.clone();
        let duration = ui.video_duration.clone();
        listen(&ui.video, "loadedmetadata", move |_| {
            duration.set_text_content(Some(&format!("Duration: {}", format_seconds(video.duration()))));
        })?;

        let s = Rc::clone(&state);
        listen(&ui.copy_link_button, "click", move |_| {
            let link = {
                let st = s.borrow();
                let Some(job_id) = st.flow.video_ready() else {
                    return;
                };
                let origin = st.window.location().origin().unwrap_or_default();
                share_url(&origin, job_id)
            };
            spawn_local(async move {
                match share::copy_text(&link).await {
                    Ok(()) => alert("Copied video URL"),
                    Err(reason) => {
                        log::warn!("copy link failed: {}", reason);
                        alert(&format!("Copy failed: {}", reason));
                    }
                }
            });
        })?;

        let s = Rc::clone(&state);
        listen(&win, "pagehide", move |event| {
            let persisted = event
                .dyn_ref::<PageTransitionEvent>()
                .is_some_and(|transition| transition.persisted());
            if !persisted {
                teardown(&mut s.borrow_mut());
            }
        })?;
    }

    {
        let mut st = state.borrow_mut();
        render(&mut st)?;
    }
    if let Some(el) = document.document_element() {
        el.set_attribute("data-app-status", "ready")?;
    }

    Ok(())
}
