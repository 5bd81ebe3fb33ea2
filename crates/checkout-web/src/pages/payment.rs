//! Payment Page

use leptos::prelude::*;

use crate::components::PaymentButton;

#[component]
pub fn PaymentPage() -> impl IntoView {
    view! {
        <div class="payment">
            <h1>"Choose Your Assessment"</h1>
            <p class="subtitle">"One-time payment, secure checkout by Stripe"</p>

            <div class="plans">
                <div class="plan">
                    <h2>"In-Depth Assessment"</h2>
                    <div class="price">"$247"</div>
                    <ul>
                        <li>"Detailed custom service assessment"</li>
                    </ul>
                    <PaymentButton product_id="basic_service" label="Purchase Assessment" />
                </div>

                <div class="plan featured">
                    <span class="badge">"Popular"</span>
                    <h2>"Assessment + Priority Support"</h2>
                    <div class="price">"$296"</div>
                    <ul>
                        <li>"Everything in the assessment"</li>
                        <li>"24-hour response time"</li>
                        <li>"Priority scheduling"</li>
                        <li>"Extended support period"</li>
                    </ul>
                    <PaymentButton product_id="with_upsell" label="Purchase with Priority Support" />
                </div>
            </div>
        </div>
    }
}
