//! Assessment checkout web frontend
//!
//! Leptos-based WASM checkout initiator, mounted on the payment,
//! success and consultation pages.

mod api;
mod app;
mod components;
mod forms;
mod pages;

pub use app::App;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    leptos::mount::mount_to_body(App);
}
