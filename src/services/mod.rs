//! Business logic services layer

pub mod auth_service;
pub mod clock;
pub mod mail_service;
pub mod oauth;

pub use auth_service::AuthService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use mail_service::{MailDispatcher, MailSender, MailStats, TemplateLogSender};
pub use oauth::{generate_state, GoogleOAuthClient, OAuthProvider, ProviderProfile};
