//! Alert notification rendering and channel dispatch for Clawbernetes.
//!
//! `claw-notify` turns a batch of alerts into one notification per channel.
//! A notifier renders a title and an optional user message from the batch,
//! builds a delivery command carrying a fully resolved view model, and hands
//! it to an injected command bus. It never talks to a transport itself.
//!
//! # Features
//!
//! - **View models**: Alerts are extended with their fingerprint, silence,
//!   dashboard and panel links, and batches with their common labels
//! - **Templates**: User messages are handlebars templates; bundled HTML and
//!   text layouts escape user content
//! - **Email channel**: Recipients are configured as a `;`-separated list
//! - **Command bus**: Commands are routed in-process to handlers such as the
//!   [`EmailService`] mail composer
//! - **Cancellation**: Every dispatch is bounded by a [`NotifyContext`]
//!
//! # Example
//!
//! ```rust
//! use claw_notify::{
//!     build_notifier, Alert, CommandKind, EmailService, InProcBus, MailerConfig, Notifier,
//!     NotificationChannelConfig, NotifyContext, TemplateRenderer,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> claw_notify::Result<()> {
//! let renderer = TemplateRenderer::new("http://localhost:3000")?;
//!
//! // Compose emails in-process
//! let mailer = Arc::new(EmailService::new(MailerConfig::default(), renderer.clone())?);
//! let bus = Arc::new(InProcBus::new());
//! bus.add_handler(CommandKind::SendEmail, mailer.clone());
//!
//! // Configure an email channel
//! let config = NotificationChannelConfig::new(
//!     "ops",
//!     "email",
//!     json!({"addresses": "ops@example.com;dev@example.com"}),
//! );
//! let notifier = build_notifier(&config, &renderer, bus)?;
//!
//! let alert = Alert::default()
//!     .with_label("alertname", "HighCPU")
//!     .with_label("severity", "warning");
//! notifier.notify(&NotifyContext::new(), &[alert]).await?;
//!
//! let message = mailer.mail_queue_pop().expect("queued message");
//! assert_eq!(message.subject, "[FIRING:1]  (HighCPU warning)");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/claw-notify/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bus;
pub mod channels;
pub mod context;
pub mod error;
pub mod fingerprint;
pub mod links;
pub mod mailer;
pub mod template;
pub mod types;
pub mod view;

// Re-export main types at crate root
pub use bus::{
    CommandBus, CommandHandler, CommandKind, DeliveryCommand, InProcBus, SendEmailCommand,
};
pub use channels::{
    build_notifier, ChannelKind, EmailNotifier, EmailSettings, NotificationChannelConfig,
    Notifier,
};
pub use context::NotifyContext;
pub use error::{NotifyError, Result};
pub use fingerprint::Fingerprint;
pub use links::LinkBuilder;
pub use mailer::{EmailService, MailerConfig, Message};
pub use template::{Rendered, TemplateRenderer};
pub use types::{Alert, AlertStatus, Labels};
pub use view::{ExtendedAlert, ExtendedAlerts, NotificationGroup, TemplateContext};
