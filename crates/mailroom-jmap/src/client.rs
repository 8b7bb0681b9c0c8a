use std::time::Duration;

use mailroom_core::{AuthFailure, MailError, MailResult};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::session::{Credential, Session};
use crate::{CAPABILITY_CORE, CAPABILITY_MAIL};

/// `[name, arguments, callId]` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation(pub String, pub Value, pub String);

impl Invocation {
    pub fn new(name: &str, args: Value, call_id: &str) -> Self {
        Self(name.to_string(), args, call_id.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    using: [&'a str; 2],
    method_calls: &'a [Invocation],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    method_responses: Vec<Invocation>,
}

/// HTTP transport for the session resource and the JMAP API endpoint.
#[derive(Debug, Clone)]
pub struct JmapClient {
    http: reqwest::Client,
}

impl JmapClient {
    pub fn new(timeout: Duration) -> MailResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("mailroom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport_error)?;
        Ok(Self { http })
    }

    /// One GET against the session resource. Never retried here; the caller
    /// decides what to do with the failure.
    pub async fn open_session(
        &self,
        session_url: &str,
        credential: Credential,
    ) -> MailResult<Session> {
        let url = Url::parse(session_url).map_err(|err| {
            MailError::auth(
                AuthFailure::Malformed,
                format!("invalid session url {}: {}", session_url, err),
            )
        })?;
        let response = self
            .http
            .get(url.clone())
            .bearer_auth(credential.bearer())
            .send()
            .await
            .map_err(|err| MailError::auth(AuthFailure::Network, err.to_string()))?;
        let status = response.status();
        if is_unauthorized(status) {
            return Err(MailError::auth(
                AuthFailure::Unauthorized,
                format!("session endpoint answered {}", status),
            ));
        }
        if !status.is_success() {
            return Err(MailError::auth(
                AuthFailure::Network,
                format!("session endpoint answered {}", status),
            ));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|err| MailError::auth(AuthFailure::Malformed, err.to_string()))?;
        let session = Session::from_resource(&url, &body, credential)?;
        debug!(account_id = %session.account_id, api_url = %session.api_url, "jmap session opened");
        Ok(session)
    }

    /// Posts one batch of method calls and returns the method responses in
    /// server order.
    pub async fn call(
        &self,
        session: &Session,
        calls: &[Invocation],
    ) -> MailResult<Vec<Invocation>> {
        let request = Request {
            using: [CAPABILITY_CORE, CAPABILITY_MAIL],
            method_calls: calls,
        };
        let response = self
            .http
            .post(session.api_url.clone())
            .bearer_auth(session.credential().bearer())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if is_unauthorized(status) {
            return Err(MailError::auth(
                AuthFailure::Unauthorized,
                format!("api endpoint answered {}", status),
            ));
        }
        if !status.is_success() {
            return Err(MailError::Network(format!("api endpoint answered {}", status)));
        }
        let body: Response = response
            .json()
            .await
            .map_err(|err| MailError::Protocol(format!("unreadable api response: {}", err)))?;
        Ok(body.method_responses)
    }
}

fn is_unauthorized(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn transport_error(err: reqwest::Error) -> MailError {
    if err.is_timeout() {
        MailError::Network(format!("request timed out: {}", err))
    } else {
        MailError::Network(err.to_string())
    }
}

/// Picks the result of `call_id`, turning a JMAP `error` response into a
/// typed failure.
pub(crate) fn take_result(
    responses: Vec<Invocation>,
    call_id: &str,
    method: &str,
) -> MailResult<Value> {
    let Some(Invocation(name, args, _)) = responses.into_iter().find(|inv| inv.2 == call_id) else {
        return Err(MailError::Protocol(format!("no response for {} ({})", method, call_id)));
    };
    if name == "error" {
        let kind = args.get("type").and_then(Value::as_str).unwrap_or("unknown");
        let description = args.get("description").and_then(Value::as_str).unwrap_or("");
        return Err(match kind {
            "accountNotFound" | "notFound" => MailError::NotFound(format!("{}: {}", method, kind)),
            _ => MailError::Protocol(
                format!("{} failed: {} {}", method, kind, description)
                    .trim()
                    .to_string(),
            ),
        });
    }
    if name != method {
        return Err(MailError::Protocol(format!("expected {} but got {}", method, name)));
    }
    Ok(args)
}
