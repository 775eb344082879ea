pub mod runner;

pub use runner::MotionRunner;

use std::cell::RefCell;

use scrollwork::{InputEvent, MotionConfig, Rect, TargetId};
use wasm_bindgen::prelude::*;

thread_local! {
    static RUNNER: RefCell<Option<MotionRunner>> = const { RefCell::new(None) };
}

/// Run `f` against the runner. Calls made before `motion_init` (or after the
/// page tore the runner down) are logged and ignored.
fn with_runner<R>(f: impl FnOnce(&mut MotionRunner) -> R) -> Option<R> {
    RUNNER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        match borrow.as_mut() {
            Some(runner) => Some(f(runner)),
            None => {
                log::warn!("scrollwork not initialized, call motion_init() first");
                None
            }
        }
    })
}

fn to_js(err: scrollwork::MotionError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Create the runner. `config_json` may be empty for defaults.
#[wasm_bindgen]
pub fn motion_init(config_json: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let config = if config_json.trim().is_empty() {
        MotionConfig::default()
    } else {
        MotionConfig::from_json(config_json).map_err(to_js)?
    };
    RUNNER.with(|cell| {
        *cell.borrow_mut() = Some(MotionRunner::new(config));
    });
    log::info!("scrollwork: initialized");
    Ok(())
}

#[wasm_bindgen]
pub fn motion_load_manifest(json: &str) -> Result<(), JsValue> {
    with_runner(|r| r.load_manifest(json))
        .unwrap_or(Ok(()))
        .map_err(to_js)
}

/// Run one frame from a requestAnimationFrame timestamp (ms).
#[wasm_bindgen]
pub fn motion_tick(timestamp_ms: f64) {
    with_runner(|r| r.tick(timestamp_ms));
}

/// Advance text scrambles by the real time elapsed since the previous call.
/// Schedule with `setInterval(() => ..., get_scramble_interval_ms())`, apart
/// from the rAF loop; results ship with the next `motion_tick`.
#[wasm_bindgen]
pub fn motion_scramble_tick(elapsed_ms: f64) {
    with_runner(|r| r.scramble_tick(elapsed_ms));
}

#[wasm_bindgen]
pub fn get_scramble_interval_ms() -> f64 {
    with_runner(|r| r.scramble_interval_ms()).unwrap_or_default()
}

// ---- Input ----

#[wasm_bindgen]
pub fn motion_wheel(delta_y: f32) {
    with_runner(|r| r.push_input(InputEvent::Wheel { delta_y }));
}

#[wasm_bindgen]
pub fn motion_touch(delta_y: f32) {
    with_runner(|r| r.push_input(InputEvent::Touch { delta_y }));
}

#[wasm_bindgen]
pub fn motion_native_scroll(offset: f32) {
    with_runner(|r| r.push_input(InputEvent::NativeScroll { offset }));
}

#[wasm_bindgen]
pub fn motion_resize(width: f32, height: f32) {
    with_runner(|r| r.push_input(InputEvent::Resize { width, height }));
}

#[wasm_bindgen]
pub fn motion_content_height(height: f32) {
    with_runner(|r| r.push_input(InputEvent::ContentHeight { height }));
}

#[wasm_bindgen]
pub fn motion_pointer_enter(target: u32) {
    with_runner(|r| r.push_input(InputEvent::PointerEnter { target: TargetId(target) }));
}

#[wasm_bindgen]
pub fn motion_pointer_leave(target: u32) {
    with_runner(|r| r.push_input(InputEvent::PointerLeave { target: TargetId(target) }));
}

#[wasm_bindgen]
pub fn motion_navigate(section: u32) {
    with_runner(|r| r.push_input(InputEvent::NavigateTo { section }));
}

/// Navigate by section name. Returns false for unknown names.
#[wasm_bindgen]
pub fn motion_navigate_to(name: &str) -> bool {
    with_runner(|r| r.with_engine(|e| e.navigate(name))).unwrap_or(false)
}

// ---- Targets ----

#[wasm_bindgen]
pub fn motion_mount(target: u32, tag: &str, x: f32, y: f32, width: f32, height: f32, text: &str) {
    with_runner(|r| r.mount(TargetId(target), tag, Rect::new(x, y, width, height), text));
}

#[wasm_bindgen]
pub fn motion_set_bounds(target: u32, x: f32, y: f32, width: f32, height: f32) {
    with_runner(|r| r.set_bounds(TargetId(target), Rect::new(x, y, width, height)));
}

#[wasm_bindgen]
pub fn motion_detach(target: u32) {
    with_runner(|r| r.detach(TargetId(target)));
}

/// Fonts or images loaded: re-measure zones and sections.
#[wasm_bindgen]
pub fn motion_layout_changed() {
    with_runner(|r| r.with_engine(|e| e.layout_changed()));
}

// ---- Data accessors ----

#[wasm_bindgen]
pub fn get_buffer_ptr() -> *const f32 {
    with_runner(|r| r.buffer_ptr()).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_write_count() -> u32 {
    with_runner(|r| r.write_count()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_event_count() -> u32 {
    with_runner(|r| r.event_count()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_scroll_offset() -> f32 {
    with_runner(|r| r.scroll_offset()).unwrap_or_default()
}

/// Text writes from the last frame as a flat `[id, text, id, text, ...]` array.
#[wasm_bindgen]
pub fn get_text_writes() -> js_sys::Array {
    let array = js_sys::Array::new();
    with_runner(|r| {
        for (target, text) in r.text_writes() {
            array.push(&JsValue::from(target.0));
            array.push(&JsValue::from_str(&text));
        }
    });
    array
}

// ---- Capacity accessors ----

#[wasm_bindgen]
pub fn get_max_writes() -> u32 {
    with_runner(|r| r.max_writes()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_max_events() -> u32 {
    with_runner(|r| r.max_events()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_write_data_offset() -> u32 {
    with_runner(|r| r.write_data_offset()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_event_data_offset() -> u32 {
    with_runner(|r| r.event_data_offset()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_buffer_total_floats() -> u32 {
    with_runner(|r| r.buffer_total_floats()).unwrap_or_default()
}

/// Tear down: release scroll capture and drop every animation.
/// The final frame buffer still carries the release event.
#[wasm_bindgen]
pub fn motion_destroy() {
    with_runner(|r| r.destroy());
}
