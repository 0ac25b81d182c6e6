//! Session management: authentication, connection setup and registration.

mod auth;
mod connect;
mod registration;

pub use auth::{
    build_registration_query, create_sas_token, create_sas_token_at, url_encode, SasTokenSigner,
    TokenSigner, DEFAULT_TOKEN_LIFETIME,
};
pub use connect::{ConnectionOpener, RetryPolicy, DEFAULT_INITIAL_DELAY_SECS, DEFAULT_MAX_DELAY_SECS};
pub use registration::{
    build_registration_payload, Registration, RegistrationReply, RegistrationRequest,
    RegistrationStatus, LINK_FORMAT, PAYLOAD_PREFIX, REGISTRATION_PATH,
};
