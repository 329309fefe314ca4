mod webhook;

pub use webhook::{SIGNATURE_HEADER, WebhookClient, sign_payload};
