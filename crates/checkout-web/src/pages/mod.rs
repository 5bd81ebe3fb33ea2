//! Page Components

mod consultation;
mod payment;
mod success;

pub use consultation::ConsultationPage;
pub use payment::PaymentPage;
pub use success::SuccessPage;
