//! UI Components

use std::time::Duration;

use leptos::ev::{MouseEvent, SubmitEvent};
use leptos::prelude::*;

use crate::api;
use crate::forms::{self, ConsultationErrors};

/// How long the error label stays before the button is usable again
const RETRY_DELAY: Duration = Duration::from_secs(2);

fn new_token() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn navigate(url: &str) -> Result<(), String> {
    web_sys::window()
        .ok_or_else(|| "No window".to_string())?
        .location()
        .set_href(url)
        .map_err(|e| format!("{e:?}"))
}

/// Button that starts a hosted checkout for one product
#[component]
pub fn PaymentButton(product_id: &'static str, #[prop(into)] label: String) -> impl IntoView {
    let (busy, set_busy) = signal(false);
    let (failed, set_failed) = signal(false);
    let (text, set_text) = signal(label.clone());
    // One token per attempt; a re-click after an error starts a new session
    let (token, set_token) = signal(new_token());

    let on_click = move |ev: MouseEvent| {
        ev.prevent_default();
        if busy.get_untracked() {
            return;
        }

        set_busy.set(true);
        set_failed.set(false);
        set_text.set("Processing...".into());

        let key = token.get_untracked();
        let label = label.clone();
        leptos::task::spawn_local(async move {
            let result = match api::create_checkout(product_id, &key).await {
                Ok(url) => navigate(&url),
                Err(e) => Err(e),
            };

            if let Err(e) = result {
                leptos::logging::error!("Payment error: {}", e);
                set_failed.set(true);
                set_text.set("Error - Try Again".into());
                set_token.set(new_token());
                set_timeout(
                    move || {
                        set_text.set(label);
                        set_busy.set(false);
                    },
                    RETRY_DELAY,
                );
            }
        });
    };

    view! {
        <button
            class="btn btn-primary payment-button"
            class:error=move || failed.get()
            disabled=move || busy.get()
            on:click=on_click
        >
            {move || text.get()}
        </button>
        <Show when=move || failed.get()>
            <p class="payment-error">"We couldn't start checkout. Please try again."</p>
        </Show>
    }
}

/// Consultation request form with inline field errors
#[component]
pub fn ConsultationForm() -> impl IntoView {
    let (email, set_email) = signal(String::new());
    let (message, set_message) = signal(String::new());
    let (errors, set_errors) = signal(ConsultationErrors::default());
    let (submitted, set_submitted) = signal(false);

    let on_submit = move |ev: SubmitEvent| {
        ev.prevent_default();

        let checked = forms::validate_consultation(&email.get_untracked(), &message.get_untracked());
        let valid = checked.is_valid();
        set_errors.set(checked);
        set_submitted.set(valid);

        if valid {
            set_email.set(String::new());
            set_message.set(String::new());
        }
    };

    view! {
        <form id="consultationForm" class="consultation-form" novalidate=true on:submit=on_submit>
            <label for="consultation-email">"Email"</label>
            <input
                id="consultation-email"
                type="email"
                prop:value=move || email.get()
                on:input=move |ev| {
                    set_submitted.set(false);
                    set_email.set(event_target_value(&ev));
                }
            />
            {move || errors.get().email.map(|e| view! { <div class="error-message">{e}</div> })}

            <label for="consultation-message">"What would you like to discuss?"</label>
            <textarea
                id="consultation-message"
                rows="5"
                prop:value=move || message.get()
                on:input=move |ev| {
                    set_submitted.set(false);
                    set_message.set(event_target_value(&ev));
                }
            ></textarea>
            {move || errors.get().message.map(|e| view! { <div class="error-message">{e}</div> })}

            <button type="submit" class="btn btn-primary">"Request Consultation"</button>
            <Show when=move || submitted.get()>
                <p class="form-success">{forms::SUBMITTED}</p>
            </Show>
        </form>
    }
}
