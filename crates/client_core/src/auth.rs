//! Login/signup form state and the unauthenticated auth endpoints.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::ClientError,
    protocol::{ErrorBody, LoginRequest, LoginResponse, SignupRequest, SignupResponse},
};
use tracing::{debug, info, warn};

use crate::session::SessionManager;

pub const MISSING_FIELDS_MESSAGE: &str = "Please fill out all fields";
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed";
pub const LOGIN_SUCCESS_NOTICE: &str = "Logged in successfully!";
pub const SIGNUP_SUCCESS_NOTICE: &str = "Signup successful! Please login.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

/// Copy shown by the auth modal for a given mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthLabels {
    pub title: &'static str,
    pub subtitle: &'static str,
    pub primary: &'static str,
    pub switch: &'static str,
    pub switch_prompt: &'static str,
    pub show_username: bool,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Login => Self::Signup,
            Self::Signup => Self::Login,
        }
    }

    pub fn labels(self) -> AuthLabels {
        match self {
            Self::Login => AuthLabels {
                title: "Sign In",
                subtitle: "Enter your credentials",
                primary: "Login",
                switch: "Create Account",
                switch_prompt: "Don't have an account?",
                show_username: false,
            },
            Self::Signup => AuthLabels {
                title: "Create Account",
                subtitle: "Create an account",
                primary: "Sign Up",
                switch: "Login",
                switch_prompt: "Already have an account?",
                show_username: true,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSubmission {
    Login(LoginPayload),
    Signup(SignupPayload),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl AuthForm {
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn labels(&self) -> AuthLabels {
        self.mode.labels()
    }

    pub fn clear_fields(&mut self) {
        self.username.clear();
        self.email.clear();
        self.password.clear();
    }

    /// Trims every field; the username only counts in signup mode.
    pub fn validate(&self) -> Result<AuthSubmission, ClientError> {
        let email = self.email.trim();
        let password = self.password.trim();
        let username = self.username.trim();

        let missing_username = self.mode == AuthMode::Signup && username.is_empty();
        if email.is_empty() || password.is_empty() || missing_username {
            return Err(ClientError::validation(MISSING_FIELDS_MESSAGE));
        }

        Ok(match self.mode {
            AuthMode::Login => AuthSubmission::Login(LoginPayload {
                email: email.to_string(),
                password: password.to_string(),
            }),
            AuthMode::Signup => AuthSubmission::Signup(SignupPayload {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            }),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    LoggedIn,
    SignedUp,
}

impl AuthOutcome {
    pub fn notice(self) -> &'static str {
        match self {
            Self::LoggedIn => LOGIN_SUCCESS_NOTICE,
            Self::SignedUp => SIGNUP_SUCCESS_NOTICE,
        }
    }
}

pub struct AuthClient {
    session: Arc<SessionManager>,
}

impl AuthClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Entry point of the browser OAuth flow. Front ends navigate or open
    /// this URL; it is never fetched here.
    pub fn google_auth_url(&self) -> String {
        format!("{}/google", self.session.auth_base_url())
    }

    /// Validates and submits the form. A login stores the token; a signup
    /// flips the form back to login mode. Fields are cleared on success.
    pub async fn submit(&self, form: &mut AuthForm) -> Result<AuthOutcome, ClientError> {
        let outcome = match form.validate()? {
            AuthSubmission::Login(payload) => {
                self.login(&payload.email, &payload.password).await?;
                AuthOutcome::LoggedIn
            }
            AuthSubmission::Signup(payload) => {
                self.signup(&payload.username, &payload.email, &payload.password)
                    .await?;
                form.mode = AuthMode::Login;
                AuthOutcome::SignedUp
            }
        };
        form.clear_fields();
        Ok(outcome)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let body: LoginResponse = self
            .post(
                "/login",
                &LoginRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;

        if body.access_token.trim().is_empty() {
            return Err(ClientError::UnexpectedResponse(
                "login response carried an empty access token".into(),
            ));
        }
        self.session.set_token(&body.access_token)?;
        info!("logged in");
        Ok(())
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignupResponse, ClientError> {
        let body: SignupResponse = self
            .post(
                "/signup",
                &SignupRequest {
                    username: username.to_string(),
                    email: email.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        info!(user_id = ?body.user_id, "account created");
        Ok(body)
    }

    async fn post<T, B>(&self, endpoint: &str, payload: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = format!("{}{endpoint}", self.session.auth_base_url());
        debug!(url = %url, "sending auth request");

        let response = self
            .session
            .http()
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|err| ClientError::transport(err.to_string()))?;

        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "auth request rejected");
            return Err(auth_failure(status, &raw));
        }

        serde_json::from_str(&raw).map_err(|err| {
            ClientError::UnexpectedResponse(format!("malformed {endpoint} response: {err}"))
        })
    }
}

fn auth_failure(status: StatusCode, raw: &str) -> ClientError {
    ClientError::Http {
        status: status.as_u16(),
        message: ErrorBody::parse(raw).unwrap_or_else(|| AUTH_FAILED_MESSAGE.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
