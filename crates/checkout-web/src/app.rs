//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::pages::{ConsultationPage, PaymentPage, SuccessPage};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <main class="app">
                <Routes fallback=PaymentPage>
                    <Route path=path!("/success") view=SuccessPage />
                    <Route path=path!("/success.html") view=SuccessPage />
                    <Route path=path!("/consultation") view=ConsultationPage />
                    <Route path=path!("/consultation.html") view=ConsultationPage />
                </Routes>
            </main>
        </Router>
    }
}
