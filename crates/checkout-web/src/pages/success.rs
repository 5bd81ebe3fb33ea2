//! Success Page

use leptos::prelude::*;
use leptos_router::hooks::use_query_map;

#[component]
pub fn SuccessPage() -> impl IntoView {
    let query = use_query_map();
    let session_id = move || query.read().get("session_id");

    view! {
        <div class="success">
            <h1>"Payment Successful"</h1>
            <p>"Thank you! A confirmation email is on its way with a link to our intake form."</p>
            <Show when=move || session_id().is_some()>
                <p class="order-ref">"Order reference: " {session_id}</p>
            </Show>
        </div>
    }
}
