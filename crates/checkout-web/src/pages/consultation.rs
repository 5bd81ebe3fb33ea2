//! Consultation Page

use leptos::prelude::*;

use crate::components::ConsultationForm;

#[component]
pub fn ConsultationPage() -> impl IntoView {
    view! {
        <div class="consultation">
            <h1>"Book a Consultation"</h1>
            <p class="subtitle">"Tell us about your project and we'll reply within 24 hours"</p>
            <ConsultationForm />
        </div>
    }
}
