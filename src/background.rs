//! Decorative particle + wave backdrop.
//!
//! Two full-viewport canvases sit behind the page. The frame loop, the pointer
//! parallax and the resize handling are all owned by [`Background`]; dropping it
//! (or calling [`Background::destroy`]) stops every one of them.

use std::cell::{Cell, RefCell};
use std::f64::consts::TAU;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, HtmlCanvasElement, HtmlElement,
    MouseEvent, Window,
};

pub const MIN_PARTICLES: usize = 30;
pub const AREA_PER_PARTICLE: f64 = 14_000.0;
pub const TICK_STEP: f64 = 0.006;
const WRAP_MARGIN: f64 = 10.0;
const WAVE_BANDS: usize = 3;
const WAVE_SAMPLE_STEP: f64 = 40.0;
const PARTICLE_SHIFT_PX: f64 = 8.0;
const WAVE_SHIFT_PX: f64 = 6.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PixelRatio {
    /// Follow `window.devicePixelRatio`.
    Device,
    Fixed(f64),
}

impl PixelRatio {
    pub fn resolve(self, device_pixel_ratio: f64) -> f64 {
        let ratio = match self {
            PixelRatio::Device => device_pixel_ratio,
            PixelRatio::Fixed(ratio) => ratio,
        };
        if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundOptions {
    pub pixel_ratio: PixelRatio,
    pub parallax_gain: f64,
    /// Radial-gradient glow per particle; plain dots otherwise.
    pub glow: bool,
}

impl Default for BackgroundOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: PixelRatio::Device,
            parallax_gain: 1.2,
            glow: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

pub fn backing_size(viewport: Viewport, ratio: f64) -> (u32, u32) {
    (
        (viewport.width * ratio).floor().max(1.0) as u32,
        (viewport.height * ratio).floor().max(1.0) as u32,
    )
}

pub fn particle_count(viewport: Viewport) -> usize {
    ((viewport.area() / AREA_PER_PARTICLE).floor() as usize).max(MIN_PARTICLES)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub hue: f64,
}

impl Particle {
    pub fn advance(&mut self, viewport: Viewport) {
        self.x += self.velocity_x;
        self.y += self.velocity_y;

        if self.x < -WRAP_MARGIN {
            self.x = viewport.width + WRAP_MARGIN;
        }
        if self.x > viewport.width + WRAP_MARGIN {
            self.x = -WRAP_MARGIN;
        }
        if self.y < -WRAP_MARGIN {
            self.y = viewport.height + WRAP_MARGIN;
        }
        if self.y > viewport.height + WRAP_MARGIN {
            self.y = -WRAP_MARGIN;
        }
    }
}

/// `random` must yield values in `[0, 1)`.
pub fn seed_particles(viewport: Viewport, mut random: impl FnMut() -> f64) -> Vec<Particle> {
    (0..particle_count(viewport))
        .map(|_| Particle {
            x: random() * viewport.width,
            y: random() * viewport.height,
            radius: random() * 2.0 + 0.6,
            velocity_x: (random() - 0.5) * 0.6,
            velocity_y: (random() - 0.5) * 0.6,
            hue: 230.0 + random() * 60.0,
        })
        .collect()
}

pub fn wave_baseline(band: usize, viewport: Viewport) -> f64 {
    viewport.height * (0.5 + band as f64 * 0.08)
}

pub fn wave_alpha(band: usize) -> f64 {
    0.11 - band as f64 * 0.02
}

/// Top edge of one wave band, sampled left to right.
pub fn wave_points(band: usize, viewport: Viewport, tick: f64) -> Vec<(f64, f64)> {
    let base = wave_baseline(band, viewport);
    let speed = 0.9 + band as f64 * 0.4;
    let amplitude = 40.0 + band as f64 * 12.0;

    let samples = (viewport.width / WAVE_SAMPLE_STEP).floor() as usize;
    (0..=samples)
        .map(|i| {
            let x = i as f64 * WAVE_SAMPLE_STEP;
            (x, base + (x / 200.0 + tick * speed).sin() * amplitude)
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParallaxOffset {
    pub particles: (f64, f64),
    pub waves: (f64, f64),
}

pub fn parallax_offset(client_x: f64, client_y: f64, viewport: Viewport, gain: f64) -> ParallaxOffset {
    let cx = ((client_x / viewport.width).clamp(0.0, 1.0) - 0.5) * gain;
    let cy = ((client_y / viewport.height).clamp(0.0, 1.0) - 0.5) * gain;
    ParallaxOffset {
        particles: (cx * PARTICLE_SHIFT_PX, cy * PARTICLE_SHIFT_PX),
        waves: (cx * WAVE_SHIFT_PX, cy * WAVE_SHIFT_PX),
    }
}

#[derive(Debug)]
pub struct ParticleField {
    pub viewport: Viewport,
    pub particles: Vec<Particle>,
    pub tick: f64,
}

impl ParticleField {
    pub fn new(viewport: Viewport, random: impl FnMut() -> f64) -> Self {
        Self {
            viewport,
            particles: seed_particles(viewport, random),
            tick: 0.0,
        }
    }

    pub fn reseed(&mut self, random: impl FnMut() -> f64) {
        self.particles = seed_particles(self.viewport, random);
    }

    pub fn step(&mut self) {
        self.tick += TICK_STEP;
        let viewport = self.viewport;
        for particle in &mut self.particles {
            particle.advance(viewport);
        }
    }
}

struct Layers {
    window: Window,
    wrap: Element,
    particles_canvas: HtmlCanvasElement,
    waves_canvas: HtmlCanvasElement,
    particles_ctx: CanvasRenderingContext2d,
    waves_ctx: CanvasRenderingContext2d,
    ratio: f64,
    field: ParticleField,
}

fn create_layer(document: &Document, id: &str) -> Result<(HtmlCanvasElement, CanvasRenderingContext2d), JsValue> {
    let canvas = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    canvas.set_id(id);
    canvas.set_class_name("bg-layer");
    let ctx = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2D canvas unavailable for background"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    Ok((canvas, ctx))
}

fn window_viewport(window: &Window) -> Result<Viewport, JsValue> {
    Ok(Viewport::new(
        window.inner_width()?.as_f64().unwrap_or(1.0),
        window.inner_height()?.as_f64().unwrap_or(1.0),
    ))
}

fn random() -> f64 {
    js_sys::Math::random()
}

impl Layers {
    fn fit(&mut self, pixel_ratio: PixelRatio) -> Result<(), JsValue> {
        let viewport = window_viewport(&self.window)?;
        let ratio = pixel_ratio.resolve(self.window.device_pixel_ratio());
        let (width, height) = backing_size(viewport, ratio);

        for (canvas, ctx) in [
            (&self.particles_canvas, &self.particles_ctx),
            (&self.waves_canvas, &self.waves_ctx),
        ] {
            canvas.set_width(width);
            canvas.set_height(height);
            let style = canvas.style();
            style.set_property("width", "100%")?;
            style.set_property("height", "100%")?;
            // Resizing the backing store resets the context transform.
            ctx.set_transform(ratio, 0.0, 0.0, ratio, 0.0, 0.0)?;
        }

        self.ratio = ratio;
        self.field.viewport = viewport;
        Ok(())
    }

    fn draw_waves(&self) -> Result<(), JsValue> {
        let ctx = &self.waves_ctx;
        let viewport = self.field.viewport;
        ctx.clear_rect(0.0, 0.0, viewport.width, viewport.height);

        let gradient = ctx.create_linear_gradient(0.0, 0.0, viewport.width, viewport.height);
        gradient.add_color_stop(0.0, "rgba(124,92,255,0.06)")?;
        gradient.add_color_stop(0.5, "rgba(12,20,30,0.02)")?;
        gradient.add_color_stop(1.0, "rgba(0,255,209,0.02)")?;
        ctx.set_fill_style_canvas_gradient(&gradient);

        for band in 0..WAVE_BANDS {
            ctx.begin_path();
            ctx.move_to(0.0, wave_baseline(band, viewport));
            for (x, y) in wave_points(band, viewport, self.field.tick) {
                ctx.line_to(x, y);
            }
            ctx.line_to(viewport.width, viewport.height);
            ctx.line_to(0.0, viewport.height);
            ctx.close_path();
            ctx.set_global_alpha(wave_alpha(band));
            ctx.fill();
        }
        ctx.set_global_alpha(1.0);
        Ok(())
    }

    fn draw_particles(&self, glow: bool) -> Result<(), JsValue> {
        let ctx = &self.particles_ctx;
        let viewport = self.field.viewport;
        ctx.clear_rect(0.0, 0.0, viewport.width, viewport.height);

        for p in &self.field.particles {
            if glow {
                let gradient =
                    ctx.create_radial_gradient(p.x, p.y, 0.0, p.x, p.y, p.radius * 10.0)?;
                gradient.add_color_stop(0.0, &format!("hsla({:.0},100%,68%,0.18)", p.hue))?;
                gradient.add_color_stop(0.5, "rgba(6,200,180,0.08)")?;
                gradient.add_color_stop(1.0, "rgba(3,6,10,0)")?;
                ctx.set_fill_style_canvas_gradient(&gradient);
                ctx.begin_path();
                ctx.arc(p.x, p.y, p.radius * 6.0, 0.0, TAU)?;
            } else {
                ctx.set_fill_style_str(&format!("hsla({:.0},100%,70%,0.35)", p.hue));
                ctx.begin_path();
                ctx.arc(p.x, p.y, p.radius, 0.0, TAU)?;
            }
            ctx.fill();
        }
        Ok(())
    }

    fn apply_parallax(&self, offset: ParallaxOffset) -> Result<(), JsValue> {
        let (px, py) = offset.particles;
        let (wx, wy) = offset.waves;
        self.particles_canvas
            .style()
            .set_property("transform", &format!("translate({:.2}px,{:.2}px)", px, py))?;
        self.waves_canvas
            .style()
            .set_property("transform", &format!("translate({:.2}px,{:.2}px)", wx, wy))?;
        Ok(())
    }
}

pub struct Background {
    layers: Rc<RefCell<Layers>>,
    frame_cb: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>,
    frame_id: Rc<Cell<Option<i32>>>,
    reseed_timer: Rc<Cell<Option<i32>>>,
    listeners: Vec<(&'static str, Closure<dyn FnMut(Event)>)>,
    _reseed_cb: Rc<Closure<dyn FnMut()>>,
    destroyed: bool,
}

impl Background {
    pub fn mount(
        document: &Document,
        parent: &HtmlElement,
        options: BackgroundOptions,
        reseed_debounce_ms: i32,
    ) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;

        let wrap = document.create_element("div")?;
        wrap.set_class_name("bg-canvas-wrap");
        wrap.set_attribute("aria-hidden", "true")?;
        let (particles_canvas, particles_ctx) = create_layer(document, "particles-canvas")?;
        let (waves_canvas, waves_ctx) = create_layer(document, "waves-canvas")?;
        wrap.append_child(&particles_canvas)?;
        wrap.append_child(&waves_canvas)?;
        parent.prepend_with_node_1(&wrap)?;

        let viewport = window_viewport(&window)?;
        let mut layers = Layers {
            window: window.clone(),
            wrap,
            particles_canvas,
            waves_canvas,
            particles_ctx,
            waves_ctx,
            ratio: 1.0,
            field: ParticleField::new(viewport, random),
        };
        layers.fit(options.pixel_ratio)?;
        log::debug!(
            "background mounted: {}x{} css, ratio {:.2}, {} particles",
            viewport.width,
            viewport.height,
            layers.ratio,
            layers.field.particles.len()
        );
        let layers = Rc::new(RefCell::new(layers));

        let frame_cb: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
        let frame_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        {
            let layers = Rc::clone(&layers);
            let frame_cb_loop = Rc::clone(&frame_cb);
            let frame_id_loop = Rc::clone(&frame_id);
            let window_loop = window.clone();
            *frame_cb.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
                frame_id_loop.set(None);
                {
                    let mut layers = layers.borrow_mut();
                    layers.field.step();
                    let drawn = layers
                        .draw_waves()
                        .and_then(|_| layers.draw_particles(options.glow));
                    if let Err(err) = drawn {
                        log::warn!("background frame failed: {:?}", err);
                    }
                }

                // The slot is emptied on teardown, which ends the loop.
                if let Some(cb) = frame_cb_loop.borrow().as_ref() {
                    if let Ok(id) = window_loop.request_animation_frame(cb.as_ref().unchecked_ref()) {
                        frame_id_loop.set(Some(id));
                    }
                }
            }) as Box<dyn FnMut(f64)>));
        }
        if let Some(cb) = frame_cb.borrow().as_ref() {
            frame_id.set(Some(window.request_animation_frame(cb.as_ref().unchecked_ref())?));
        }

        let layers_reseed = Rc::clone(&layers);
        let reseed_cb: Rc<Closure<dyn FnMut()>> = Rc::new(Closure::wrap(Box::new(move || {
            let mut layers = layers_reseed.borrow_mut();
            layers.field.reseed(random);
            log::debug!("background reseeded: {} particles", layers.field.particles.len());
        }) as Box<dyn FnMut()>));

        let reseed_timer: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let mut listeners: Vec<(&'static str, Closure<dyn FnMut(Event)>)> = Vec::new();

        let layers_resize = Rc::clone(&layers);
        let reseed_timer_ev = Rc::clone(&reseed_timer);
        let reseed_cb_ev = Rc::clone(&reseed_cb);
        let window_resize = window.clone();
        let on_resize = Closure::wrap(Box::new(move |_event: Event| {
            if let Err(err) = layers_resize.borrow_mut().fit(options.pixel_ratio) {
                log::warn!("background fit failed: {:?}", err);
            }

            if let Some(id) = reseed_timer_ev.take() {
                window_resize.clear_timeout_with_handle(id);
            }
            match window_resize.set_timeout_with_callback_and_timeout_and_arguments_0(
                reseed_cb_ev.as_ref().as_ref().unchecked_ref(),
                reseed_debounce_ms,
            ) {
                Ok(id) => reseed_timer_ev.set(Some(id)),
                Err(_) => layers_resize.borrow_mut().field.reseed(random),
            }
        }) as Box<dyn FnMut(_)>);
        window.add_event_listener_with_callback("resize", on_resize.as_ref().unchecked_ref())?;
        listeners.push(("resize", on_resize));

        let layers_pointer = Rc::clone(&layers);
        let on_pointer = Closure::wrap(Box::new(move |event: Event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            let layers = layers_pointer.borrow();
            let offset = parallax_offset(
                mouse.client_x() as f64,
                mouse.client_y() as f64,
                layers.field.viewport,
                options.parallax_gain,
            );
            let _ = layers.apply_parallax(offset);
        }) as Box<dyn FnMut(_)>);
        window.add_event_listener_with_callback("pointermove", on_pointer.as_ref().unchecked_ref())?;
        listeners.push(("pointermove", on_pointer));

        Ok(Self {
            layers,
            frame_cb,
            frame_id,
            reseed_timer,
            listeners,
            _reseed_cb: reseed_cb,
            destroyed: false,
        })
    }

    pub fn particle_count(&self) -> usize {
        self.layers.borrow().field.particles.len()
    }

    pub fn backing_size(&self) -> (u32, u32) {
        let layers = self.layers.borrow();
        (layers.particles_canvas.width(), layers.particles_canvas.height())
    }

    pub fn is_running(&self) -> bool {
        self.frame_id.get().is_some()
    }

    /// Cancels the frame loop, the pending reseed and the window listeners,
    /// then removes the canvases.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let layers = self.layers.borrow();
        if let Some(id) = self.frame_id.take() {
            let _ = layers.window.cancel_animation_frame(id);
        }
        if let Some(id) = self.reseed_timer.take() {
            layers.window.clear_timeout_with_handle(id);
        }
        for (name, listener) in self.listeners.drain(..) {
            let _ = layers
                .window
                .remove_event_listener_with_callback(name, listener.as_ref().unchecked_ref());
        }
        layers.wrap.remove();
        drop(layers);

        self.frame_cb.borrow_mut().take();
        log::debug!("background torn down");
    }
}

impl Drop for Background {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic stand-in for `Math.random`.
    fn lcg(seed: u64) -> impl FnMut() -> f64 {
        let mut state = seed;
        move || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    #[test]
    fn particle_count_scales_with_area_with_a_floor() {
        assert_eq!(particle_count(Viewport::new(320.0, 480.0)), 30);
        assert_eq!(particle_count(Viewport::new(1920.0, 1080.0)), 148);
        assert_eq!(particle_count(Viewport::new(2560.0, 1440.0)), 263);
        assert_eq!(particle_count(Viewport::new(0.0, 0.0)), 30);
    }

    #[test]
    fn backing_store_follows_pixel_ratio() {
        for (w, h) in [(1280.0, 720.0), (375.0, 812.0), (1001.0, 333.0)] {
            let viewport = Viewport::new(w, h);
            for dpr in [1.0, 1.5, 2.0, 3.0] {
                let ratio = PixelRatio::Device.resolve(dpr);
                assert_eq!(
                    backing_size(viewport, ratio),
                    ((w * dpr).floor() as u32, (h * dpr).floor() as u32)
                );
            }
        }
        assert_eq!(PixelRatio::Fixed(2.0).resolve(3.0), 2.0);
        assert_eq!(PixelRatio::Device.resolve(0.0), 1.0);
    }

    #[test]
    fn seeded_particles_stay_in_range() {
        let viewport = Viewport::new(1440.0, 900.0);
        let particles = seed_particles(viewport, lcg(7));
        assert_eq!(particles.len(), particle_count(viewport));
        for p in particles {
            assert!((0.0..viewport.width).contains(&p.x));
            assert!((0.0..viewport.height).contains(&p.y));
            assert!((0.6..2.6).contains(&p.radius));
            assert!((-0.3..0.3).contains(&p.velocity_x));
            assert!((-0.3..0.3).contains(&p.velocity_y));
            assert!((230.0..290.0).contains(&p.hue));
        }
    }

    #[test]
    fn particles_wrap_past_the_margin() {
        let viewport = Viewport::new(100.0, 50.0);
        let mut p = Particle {
            x: -9.9,
            y: 60.0,
            radius: 1.0,
            velocity_x: -0.2,
            velocity_y: 0.2,
            hue: 240.0,
        };
        p.advance(viewport);
        assert_eq!(p.x, 110.0);
        assert_eq!(p.y, -10.0);
    }

    #[test]
    fn waves_cover_the_width_and_move_with_tick() {
        let viewport = Viewport::new(800.0, 600.0);
        let still = wave_points(0, viewport, 0.0);
        assert_eq!(still.len(), 21);
        assert_eq!(still[0], (0.0, 300.0));
        assert_eq!(still.last().unwrap().0, 800.0);

        let moved = wave_points(0, viewport, 1.0);
        assert_ne!(still[0].1, moved[0].1);
        for (_, y) in wave_points(2, viewport, 3.7) {
            assert!((y - wave_baseline(2, viewport)).abs() <= 64.0 + 1e-9);
        }
        assert!((wave_alpha(2) - 0.07).abs() < 1e-12);
    }

    #[test]
    fn parallax_is_bounded() {
        let viewport = Viewport::new(1000.0, 500.0);
        let centre = parallax_offset(500.0, 250.0, viewport, 1.2);
        assert_eq!(centre.particles, (0.0, 0.0));

        let corner = parallax_offset(5000.0, -20.0, viewport, 1.2);
        assert!((corner.particles.0 - 4.8).abs() < 1e-9);
        assert!((corner.particles.1 + 4.8).abs() < 1e-9);
        assert!((corner.waves.0 - 3.6).abs() < 1e-9);
    }

    #[test]
    fn field_step_advances_tick_and_particles() {
        let viewport = Viewport::new(640.0, 480.0);
        let mut field = ParticleField::new(viewport, lcg(3));
        let before = field.particles.clone();
        field.step();
        field.step();
        assert!((field.tick - 2.0 * TICK_STEP).abs() < 1e-12);
        assert_eq!(field.particles.len(), before.len());
        assert_ne!(field.particles, before);

        field.viewport = Viewport::new(3000.0, 2000.0);
        field.reseed(lcg(9));
        assert_eq!(field.particles.len(), 428);
    }
}
