use std::{any::Any, collections::HashMap, fmt};

use super::{serialize_request_data, Client};
use crate::{
    requests::{BatchRequest, ExecutionType, RequestType},
    responses::{BatchResponseElement, Status},
    Error, Result,
};

impl Client {
    /// Start collecting requests into a batch, to be executed by the server
    /// as one ordered unit under a chosen policy.
    ///
    /// ```no_run
    /// use obsession::requests::scenes::{GetCurrentProgramScene, SetCurrentProgramScene};
    ///
    /// # async fn run(client: obsession::Client) -> obsession::Result<()> {
    /// let mut batch = client.batch();
    /// batch
    ///     .push(Some("switch"), &SetCurrentProgramScene { scene_name: "Scene 2" })?
    ///     .push(Some("confirm"), &GetCurrentProgramScene)?;
    /// let responses = batch.halt_on_failure(true).send().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn batch(&self) -> Batch<'_> {
        Batch {
            client: self,
            requests: Vec::new(),
            halt_on_failure: None,
            execution_type: ExecutionType::default(),
        }
    }

    /// Execute several requests of a single type as one batch, mapping each
    /// caller-chosen ID to the typed response of its request.
    ///
    /// Per-element failures are part of the returned map and don't fail the
    /// batch call itself. IDs missing from the map belong to requests the
    /// server never executed.
    pub async fn send_batch<R, I>(
        &self,
        requests: I,
    ) -> Result<HashMap<String, Result<R::Response>>>
    where
        R: RequestType,
        I: IntoIterator<Item = (String, R)>,
    {
        let mut wire = Vec::new();
        let mut ids = Vec::new();

        for (id, request) in requests {
            wire.push(BatchRequest {
                request_id: Some(id.clone()),
                request_type: R::NAME,
                request_data: serialize_request_data(&request)?,
            });
            ids.push(id);
        }

        let response = self
            .send_batch_message(None, ExecutionType::default(), &wire)
            .await?;

        Ok(response
            .results
            .into_iter()
            .zip(ids)
            .map(|(element, id)| {
                let value = if element.request_status.result {
                    serde_json::from_value(element.response_data)
                        .map_err(Error::DeserializeResponse)
                } else {
                    Err(Error::RequestFailed {
                        code: element.request_status.code,
                        comment: element.request_status.comment,
                    })
                };
                (id, value)
            })
            .collect())
    }
}

/// An ordered list of requests, submitted to the server as one unit.
///
/// Sub-requests can mix types freely; each remembers how to decode its own
/// response. Created through [`Client::batch`].
pub struct Batch<'a> {
    client: &'a Client,
    requests: Vec<PreparedRequest>,
    halt_on_failure: Option<bool>,
    execution_type: ExecutionType,
}

struct PreparedRequest {
    id: Option<String>,
    request_type: &'static str,
    data: Option<serde_json::Value>,
    decode: fn(serde_json::Value) -> Result<Box<dyn Any + Send>, serde_json::Error>,
}

fn decode_erased<R: RequestType>(
    value: serde_json::Value,
) -> Result<Box<dyn Any + Send>, serde_json::Error> {
    serde_json::from_value::<R::Response>(value).map(|response| Box::new(response) as _)
}

impl Batch<'_> {
    /// Append a request to the batch.
    ///
    /// The ID keys this request's entry in the [`BatchResponses`]. Requests
    /// without an ID are keyed by their discriminator instead, where later
    /// entries of the same type overwrite earlier ones; supply IDs whenever
    /// that matters.
    pub fn push<R: RequestType>(&mut self, id: Option<&str>, request: &R) -> Result<&mut Self> {
        self.requests.push(PreparedRequest {
            id: id.map(str::to_owned),
            request_type: R::NAME,
            data: serialize_request_data(request)?,
            decode: decode_erased::<R>,
        });

        Ok(self)
    }

    /// Ask the server to stop executing the batch at the first failure. The
    /// responses then only cover the executed prefix.
    #[must_use]
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = Some(halt);
        self
    }

    /// Pick the execution policy, [`ExecutionType::SerialRealtime`] by
    /// default.
    #[must_use]
    pub fn execution_type(mut self, ty: ExecutionType) -> Self {
        self.execution_type = ty;
        self
    }

    /// Submit the batch and wait for all results.
    ///
    /// The server reports results in submission order; per-element failures
    /// land in the returned map without failing the batch call.
    pub async fn send(self) -> Result<BatchResponses> {
        let wire = self
            .requests
            .iter()
            .map(|prepared| BatchRequest {
                request_id: prepared.id.clone(),
                request_type: prepared.request_type,
                request_data: prepared.data.clone(),
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .send_batch_message(self.halt_on_failure, self.execution_type, &wire)
            .await?;

        let entries = response
            .results
            .into_iter()
            .zip(self.requests)
            .map(|(element, prepared)| {
                let key = prepared
                    .id
                    .unwrap_or_else(|| prepared.request_type.to_owned());
                let outcome = outcome(element, prepared.decode);
                (key, outcome)
            })
            .collect();

        Ok(BatchResponses { entries })
    }
}

fn outcome(
    element: BatchResponseElement,
    decode: fn(serde_json::Value) -> Result<Box<dyn Any + Send>, serde_json::Error>,
) -> BatchOutcome {
    if element.request_status.result {
        match decode(element.response_data) {
            Ok(response) => BatchOutcome::Response(response),
            Err(error) => BatchOutcome::DecodeError(error),
        }
    } else {
        BatchOutcome::Failed(element.request_status)
    }
}

/// Results of a batch, keyed by the sub-request IDs (or, for requests
/// submitted without one, their discriminator).
///
/// When the batch was halted early, entries for the unexecuted suffix are
/// absent.
pub struct BatchResponses {
    entries: HashMap<String, BatchOutcome>,
}

impl BatchResponses {
    /// Number of results the server reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the server reported no results at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw outcome of one sub-request, or [`None`] if the server never
    /// executed it.
    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&BatchOutcome> {
        self.entries.get(id)
    }

    /// Decoded response of one successful sub-request. The type parameter
    /// must repeat the request type used in [`Batch::push`] for this ID.
    #[must_use]
    pub fn response<R: RequestType>(&self, id: &str) -> Option<&R::Response> {
        match self.entries.get(id)? {
            BatchOutcome::Response(response) => response.downcast_ref(),
            _ => None,
        }
    }

    /// Failure status of one failed sub-request.
    #[must_use]
    pub fn failure(&self, id: &str) -> Option<&Status> {
        match self.entries.get(id)? {
            BatchOutcome::Failed(status) => Some(status),
            _ => None,
        }
    }
}

/// Outcome of one sub-request of a batch.
pub enum BatchOutcome {
    /// The request succeeded; the payload decodes through
    /// [`BatchResponses::response`].
    Response(Box<dyn Any + Send>),
    /// The server reported a failure status for this request.
    Failed(Status),
    /// The request succeeded but its payload did not match the registered
    /// response shape.
    DecodeError(serde_json::Error),
}

impl fmt::Debug for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(_) => f.write_str("Response"),
            Self::Failed(status) => f.debug_tuple("Failed").field(status).finish(),
            Self::DecodeError(error) => f.debug_tuple("DecodeError").field(error).finish(),
        }
    }
}
