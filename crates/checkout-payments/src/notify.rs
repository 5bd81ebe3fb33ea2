//! Purchase Notifications
//!
//! Two messages per completed checkout: a confirmation to the customer with
//! the intake form link, and an alert to the admin.

use std::sync::Arc;

use crate::catalog::format_amount;
use crate::config::Settings;
use crate::email::{EmailMessage, Mailer};
use crate::error::Result;
use crate::webhook::CompletedCheckout;

const CUSTOMER_SUBJECT: &str = "Your Purchase Confirmation";
const ADMIN_SUBJECT: &str = "New Purchase Notification";
const STRIPE_DASHBOARD_PAYMENTS: &str = "https://dashboard.stripe.com/payments";

/// Sends purchase emails through a `Mailer`
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    admin_email: String,
    followup_form_url: String,
}

impl Notifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        from: impl Into<String>,
        admin_email: impl Into<String>,
        followup_form_url: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            from: from.into(),
            admin_email: admin_email.into(),
            followup_form_url: followup_form_url.into(),
        }
    }

    pub fn from_settings(mailer: Arc<dyn Mailer>, settings: &Settings) -> Self {
        Self::new(
            mailer,
            settings.email_from.clone(),
            settings.admin_email.clone(),
            settings.followup_form_url.clone(),
        )
    }

    /// Send both notifications.
    ///
    /// The admin alert is attempted even if the customer confirmation
    /// failed; the first error is returned. Returns the number of messages
    /// accepted by the provider.
    pub async fn notify(&self, checkout: &CompletedCheckout) -> Result<usize> {
        let mut sent = 0;
        let mut first_error = None;

        if let Some(message) = self.customer_confirmation(checkout) {
            match self.mailer.send(&message).await {
                Ok(_) => sent += 1,
                Err(e) => first_error = Some(e),
            }
        } else {
            tracing::debug!(session_id = %checkout.session_id, "No customer email, skipping confirmation");
        }

        match self.mailer.send(&self.admin_alert(checkout)).await {
            Ok(_) => sent += 1,
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(sent),
        }
    }

    /// Confirmation for the customer, if we know their address
    pub fn customer_confirmation(&self, checkout: &CompletedCheckout) -> Option<EmailMessage> {
        let to = checkout.customer_email.clone()?;

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2>Thank you for your purchase!</h2>
  <p>We've received your payment and will begin working on your assessment.</p>
  <p><strong>Next Step:</strong> Please fill out our detailed form to help us better understand your needs:</p>
  <p style="text-align: center; margin: 30px 0;">
    <a href="{form}" style="background-color: #4361ee; color: white; padding: 12px 24px; text-decoration: none; border-radius: 8px; font-weight: bold;">Complete Your Details Form</a>
  </p>
  <p>If you have any questions, please reply to this email.</p>
  <hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
  <p style="font-size: 12px; color: #666;">
    Order ID: {order}<br>
    Amount: ${amount}
  </p>
</div>"#,
            form = escape(&self.followup_form_url),
            order = escape(&checkout.session_id),
            amount = format_amount(checkout.amount_total),
        );

        Some(EmailMessage {
            from: self.from.clone(),
            to,
            subject: CUSTOMER_SUBJECT.into(),
            html,
        })
    }

    /// Alert for the shop admin
    pub fn admin_alert(&self, checkout: &CompletedCheckout) -> EmailMessage {
        let customer = checkout
            .customer_email
            .as_deref()
            .unwrap_or("No email provided");

        let dashboard = checkout
            .payment_intent
            .as_deref()
            .map(|pi| {
                format!(
                    "\n  <p><a href=\"{STRIPE_DASHBOARD_PAYMENTS}/{}\">View in Stripe Dashboard</a></p>",
                    escape(pi)
                )
            })
            .unwrap_or_default();

        let currency = checkout
            .currency
            .as_deref()
            .map(|c| format!(" {}", escape(&c.to_uppercase())))
            .unwrap_or_default();

        let html = format!(
            r#"<div style="font-family: Arial, sans-serif;">
  <h3>New Purchase Received</h3>
  <p><strong>Customer:</strong> {customer}</p>
  <p><strong>Amount:</strong> ${amount}{currency}</p>
  <p><strong>Session ID:</strong> {order}</p>
  <p><strong>Product:</strong> {product}</p>{dashboard}
</div>"#,
            customer = escape(customer),
            amount = format_amount(checkout.amount_total),
            order = escape(&checkout.session_id),
            product = escape(&checkout.product_id),
        );

        EmailMessage {
            from: self.from.clone(),
            to: self.admin_email.clone(),
            subject: ADMIN_SUBJECT.into(),
            html,
        }
    }
}

/// Minimal HTML escaping for values interpolated into templates
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
