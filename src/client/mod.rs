//! Typed client for the review workflow API.
//!
//! Every mutating call runs the same checks the server runs before it sends
//! anything, so a front-end gets field errors without a round trip. Reads are
//! retried on transient failures. Mutations are sent once.

pub mod decode;
pub mod error;
pub mod retry;

pub use error::{ClientError, RemoteError};
pub use retry::RetryPolicy;

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::auth::Role;
use crate::errors::ValidationErrors;
use crate::models::review_form::checklist;
use crate::models::review_form::{
    ChairReviewOutcome, ChairReviewRequest, Decision, DeanReviewRequest, INVALID_DECISION,
};
use crate::models::syllabus::{SyllabusDetail, readiness};
use crate::models::tos::{NewTos, TosDetail, TosTerm, validation};
use crate::models::workflow::{self, Action, DocumentState, WorkflowError};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Sent as `X-User-Id`.
    pub user_id: i64,
    /// Sent as `?role=` on every request.
    pub role: Role,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, user_id: i64, role: Role) -> Self {
        Self {
            base_url: base_url.into(),
            user_id,
            role,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// The mutations guarded against double submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    SubmitSyllabus,
    ReviewSyllabusChair,
    ReviewSyllabusDean,
    ReplicateSyllabus,
    CreateTos,
    SubmitTos,
    ReviewTos,
    ReplicateTos,
}

type InFlight = Arc<Mutex<HashSet<(Mutation, i64)>>>;

fn lock(set: &InFlight) -> MutexGuard<'_, HashSet<(Mutation, i64)>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds a (mutation, document) slot until dropped, so a cancelled future
/// frees it as well.
struct InFlightGuard {
    set: InFlight,
    key: (Mutation, i64),
}

impl InFlightGuard {
    fn acquire(set: &InFlight, key: (Mutation, i64)) -> Result<Self, ClientError> {
        if !lock(set).insert(key) {
            log::warn!("{:?} on document {} is already in flight", key.0, key.1);
            return Err(ClientError::InFlight);
        }
        Ok(Self { set: Arc::clone(set), key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.key);
    }
}

#[derive(Clone)]
pub struct ReviewClient {
    client: reqwest::Client,
    base_url: String,
    user_id: i64,
    role: Role,
    retry: RetryPolicy,
    in_flight: InFlight,
}

impl ReviewClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(RemoteError::from)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_id: config.user_id,
            role: config.role,
            retry: config.retry,
            in_flight: Arc::default(),
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    // -- Syllabus --

    pub async fn get_syllabus(&self, id: i64) -> Result<SyllabusDetail, ClientError> {
        self.get(&format!("/syllabi/{id}/")).await
    }

    /// Checks readiness on the detail the caller is showing, then submits it.
    pub async fn submit_syllabus(
        &self,
        syllabus: &SyllabusDetail,
    ) -> Result<SyllabusDetail, ClientError> {
        check_transition(syllabus.state(), Action::Submit)?;
        readiness::check_submission(syllabus)?;
        let id = syllabus.id();
        self.mutate(
            Method::PATCH,
            &format!("/syllabi/{id}/submit-syllabus/"),
            (Mutation::SubmitSyllabus, id),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn review_syllabus_chair(
        &self,
        id: i64,
        review: &ChairReviewRequest,
    ) -> Result<ChairReviewOutcome, ClientError> {
        let decision = parse_decision(&review.decision)?;
        let entries = checklist::from_wire(
            &review.srf_no,
            review.srf_yes_no.as_deref(),
            review.srf_remarks.as_deref(),
        )?;
        checklist::validate_checklist(&entries, decision)?;
        self.mutate(
            Method::POST,
            &format!("/syllabi/{id}/review-syllabus-chair/"),
            (Mutation::ReviewSyllabusChair, id),
            review,
        )
        .await
    }

    pub async fn review_syllabus_dean(
        &self,
        id: i64,
        review: &DeanReviewRequest,
    ) -> Result<SyllabusDetail, ClientError> {
        let decision = parse_decision(&review.decision)?;
        checklist::validate_dean_feedback(decision, review.feedback_text.as_deref())?;
        self.mutate(
            Method::PATCH,
            &format!("/syllabi/{id}/review-syllabus-dean/"),
            (Mutation::ReviewSyllabusDean, id),
            review,
        )
        .await
    }

    pub async fn replicate_syllabus(
        &self,
        syllabus: &SyllabusDetail,
    ) -> Result<SyllabusDetail, ClientError> {
        if !syllabus.is_latest {
            return Err(workflow_invalid(WorkflowError::NotLatest));
        }
        check_transition(syllabus.state(), Action::Replicate)?;
        let id = syllabus.id();
        self.mutate(
            Method::POST,
            &format!("/syllabi/{id}/replicate-syllabus/"),
            (Mutation::ReplicateSyllabus, id),
            &serde_json::json!({}),
        )
        .await
    }

    // -- TOS --

    pub async fn get_tos(&self, id: i64) -> Result<TosDetail, ClientError> {
        self.get(&format!("/tos/{id}/")).await
    }

    pub async fn create_tos(&self, new: &NewTos) -> Result<TosDetail, ClientError> {
        new.term
            .parse::<TosTerm>()
            .map_err(|msg| ValidationErrors::field("term", msg))?;
        validation::validate_settings(&new.settings, &new.selected_topics)?;
        self.mutate(
            Method::POST,
            "/tos/",
            (Mutation::CreateTos, new.syllabus_id),
            new,
        )
        .await
    }

    pub async fn submit_tos(&self, id: i64) -> Result<TosDetail, ClientError> {
        self.mutate(
            Method::PATCH,
            &format!("/tos/{id}/submit-tos/"),
            (Mutation::SubmitTos, id),
            &serde_json::json!({}),
        )
        .await
    }

    pub async fn review_tos(&self, id: i64, decision: Decision) -> Result<TosDetail, ClientError> {
        self.mutate(
            Method::PATCH,
            &format!("/tos/{id}/review-tos/"),
            (Mutation::ReviewTos, id),
            &serde_json::json!({ "decision": decision }),
        )
        .await
    }

    pub async fn replicate_tos(&self, tos: &TosDetail) -> Result<TosDetail, ClientError> {
        if !tos.is_latest {
            return Err(workflow_invalid(WorkflowError::NotLatest));
        }
        check_transition(tos.state(), Action::Replicate)?;
        let id = tos.id();
        self.mutate(
            Method::POST,
            &format!("/tos/{id}/replicate-tos/"),
            (Mutation::ReplicateTos, id),
            &serde_json::json!({}),
        )
        .await
    }

    // -- Transport --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("X-User-Id", self.user_id.to_string())
            .query(&[("role", self.role.code())])
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match send(self.request(Method::GET, path)).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    log::warn!("GET {path} failed ({e}), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn mutate<B, T>(
        &self,
        method: Method,
        path: &str,
        key: (Mutation, i64),
        body: &B,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let _guard = InFlightGuard::acquire(&self.in_flight, key)?;
        Ok(send(self.request(method, path).json(body)).await?)
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(RemoteError::Server {
            status: status.as_u16(),
            messages: decode::error_messages(&body),
        });
    }
    Ok(serde_json::from_slice(&body)?)
}

fn parse_decision(raw: &str) -> Result<Decision, ValidationErrors> {
    Decision::parse(raw).ok_or_else(|| ValidationErrors::field("decision", INVALID_DECISION))
}

fn workflow_invalid(e: WorkflowError) -> ClientError {
    ClientError::Validation(ValidationErrors::general(e.to_string()))
}

fn check_transition(
    state: Result<DocumentState, WorkflowError>,
    action: Action,
) -> Result<(), ClientError> {
    let state = state.map_err(workflow_invalid)?;
    workflow::plan(&state, action).map_err(workflow_invalid)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_slot_is_released_on_drop() {
        let set = InFlight::default();
        let key = (Mutation::SubmitTos, 4);
        let first = InFlightGuard::acquire(&set, key).unwrap();
        assert!(matches!(
            InFlightGuard::acquire(&set, key),
            Err(ClientError::InFlight)
        ));
        // another document is independent
        let _other = InFlightGuard::acquire(&set, (Mutation::SubmitTos, 5)).unwrap();
        drop(first);
        assert!(InFlightGuard::acquire(&set, key).is_ok());
    }

    #[test]
    fn unknown_decision_is_a_field_error() {
        let err = parse_decision("maybe").unwrap_err();
        assert_eq!(err.get("decision"), Some(&[INVALID_DECISION.to_string()][..]));
        assert_eq!(parse_decision(" Approve ").unwrap(), Decision::Approve);
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let client = ReviewClient::new(ClientConfig::new("http://localhost:8080/", 1, Role::Dean))
            .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
