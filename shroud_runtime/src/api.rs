//! A serializable request/response surface over [`Engine`], suitable for line-delimited JSON.

use log::warn;
use serde::{Deserialize, Serialize};
use shroud_lattice::Scheme;

use crate::{
    AggregationRequest, AggregationResult, ArithmeticRequest, ArithmeticResult, DEFAULT_PRESET,
    Engine, Error, ErrorKind, KeyId, KeyInfo, Operation, PayloadId, PayloadInfo, Result,
    ScoringRequest, ScoringResult, SimilarityRequest, SimilarityResult, StatusReport, VoteRequest,
    VoteResult,
};

fn default_preset() -> String {
    DEFAULT_PRESET.to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
/// A request to an [`Engine`].
pub enum Request {
    /// See [`Engine::generate_context`].
    GenerateContext {
        /// The scheme family.
        scheme: Scheme,
        /// The preset name.
        #[serde(default = "default_preset")]
        preset: String,
        /// Generate rotation keys.
        #[serde(default)]
        rotation_keys: bool,
        /// Generate relinearization keys.
        #[serde(default)]
        relin_keys: bool,
    },

    /// See [`Engine::cleanup_context`].
    CleanupContext {
        /// The context to destroy.
        key_id: KeyId,
    },

    /// See [`Engine::get_key_info`].
    KeyInfo {
        /// The context to describe.
        key_id: KeyId,
    },

    /// See [`Engine::list_keys`].
    ListKeys,

    /// See [`Engine::encrypt`].
    Encrypt {
        /// The context to encrypt under.
        key_id: KeyId,
        /// The values to encrypt.
        values: Vec<f64>,
    },

    /// See [`Engine::compute`].
    Compute {
        /// The context owning the operands.
        key_id: KeyId,
        /// The operation.
        operation: Operation,
        /// The first operand.
        a: PayloadId,
        /// The second operand of binary operations.
        #[serde(default)]
        b: Option<PayloadId>,
    },

    /// See [`Engine::decrypt`].
    Decrypt {
        /// The context owning the payload.
        key_id: KeyId,
        /// The payload to decrypt.
        payload_id: PayloadId,
    },

    /// See [`Engine::payload_info`].
    PayloadInfo {
        /// The payload to describe.
        payload_id: PayloadId,
    },

    /// See [`Engine::export_payload`].
    ExportPayload {
        /// The context owning the payload.
        key_id: KeyId,
        /// The payload to export.
        payload_id: PayloadId,
    },

    /// See [`Engine::import_payload`].
    ImportPayload {
        /// The context the ciphertext was exported from.
        key_id: KeyId,
        /// The base64 ciphertext.
        ciphertext: String,
        /// The number of meaningful values.
        logical_len: usize,
    },

    /// See [`Engine::status`].
    Status,

    /// See [`Engine::weighted_score`].
    Score(ScoringRequest),

    /// See [`Engine::similarity_rank`].
    Similarity(SimilarityRequest),

    /// See [`Engine::aggregate`].
    Aggregate(AggregationRequest),

    /// See [`Engine::verified_arithmetic`].
    Arithmetic(ArithmeticRequest),

    /// See [`Engine::tally_votes`].
    Vote(VoteRequest),
}

impl Request {
    /// A stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateContext { .. } => "generate_context",
            Self::CleanupContext { .. } => "cleanup_context",
            Self::KeyInfo { .. } => "key_info",
            Self::ListKeys => "list_keys",
            Self::Encrypt { .. } => "encrypt",
            Self::Compute { .. } => "compute",
            Self::Decrypt { .. } => "decrypt",
            Self::PayloadInfo { .. } => "payload_info",
            Self::ExportPayload { .. } => "export_payload",
            Self::ImportPayload { .. } => "import_payload",
            Self::Status => "status",
            Self::Score(_) => "score",
            Self::Similarity(_) => "similarity",
            Self::Aggregate(_) => "aggregate",
            Self::Arithmetic(_) => "arithmetic",
            Self::Vote(_) => "vote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The successful result of a [`Request`].
pub enum ResponseBody {
    /// A new context.
    Context {
        /// Its handle.
        key_id: KeyId,
        /// Its description.
        key_info: KeyInfo,
    },

    /// Whether a cleanup found the context.
    Cleaned {
        /// `false` if the context didn't exist.
        removed: bool,
    },

    /// A context's description.
    KeyInfo(KeyInfo),

    /// Every live context.
    Keys {
        /// Their handles.
        key_ids: Vec<KeyId>,
    },

    /// A new payload.
    Payload {
        /// Its handle.
        payload_id: PayloadId,
    },

    /// A payload's description.
    PayloadInfo(PayloadInfo),

    /// Decrypted values.
    Values {
        /// The values.
        values: Vec<f64>,
    },

    /// An exported ciphertext.
    Ciphertext {
        /// Standard base64 bincode.
        ciphertext: String,
    },

    /// See [`StatusReport`].
    Status(StatusReport),

    /// See [`ScoringResult`].
    Score(ScoringResult),

    /// See [`SimilarityResult`].
    Similarity(SimilarityResult),

    /// See [`AggregationResult`].
    Aggregate(AggregationResult),

    /// See [`ArithmeticResult`].
    Arithmetic(ArithmeticResult),

    /// See [`VoteResult`].
    Vote(VoteResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// The answer to a [`Request`].
pub enum Response {
    /// The request succeeded.
    Ok(ResponseBody),

    /// The request failed.
    Error {
        /// The failure's classification.
        kind: ErrorKind,
        /// A human readable description.
        message: String,
    },
}

impl From<Error> for Response {
    fn from(e: Error) -> Self {
        Self::Error {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl Engine {
    fn dispatch(&self, request: Request) -> Result<ResponseBody> {
        Ok(match request {
            Request::GenerateContext {
                scheme,
                preset,
                rotation_keys,
                relin_keys,
            } => {
                let (key_id, key_info) =
                    self.generate_context(scheme, &preset, rotation_keys, relin_keys)?;

                ResponseBody::Context { key_id, key_info }
            }
            Request::CleanupContext { key_id } => ResponseBody::Cleaned {
                removed: self.cleanup_context(key_id)?,
            },
            Request::KeyInfo { key_id } => ResponseBody::KeyInfo(self.get_key_info(key_id)?),
            Request::ListKeys => ResponseBody::Keys {
                key_ids: self.list_keys()?,
            },
            Request::Encrypt { key_id, values } => ResponseBody::Payload {
                payload_id: self.encrypt(key_id, &values)?,
            },
            Request::Compute {
                key_id,
                operation,
                a,
                b,
            } => ResponseBody::Payload {
                payload_id: self.compute(key_id, &operation, a, b)?,
            },
            Request::Decrypt { key_id, payload_id } => ResponseBody::Values {
                values: self.decrypt(key_id, payload_id)?,
            },
            Request::PayloadInfo { payload_id } => {
                ResponseBody::PayloadInfo(self.payload_info(payload_id)?)
            }
            Request::ExportPayload { key_id, payload_id } => ResponseBody::Ciphertext {
                ciphertext: self.export_payload(key_id, payload_id)?,
            },
            Request::ImportPayload {
                key_id,
                ciphertext,
                logical_len,
            } => ResponseBody::Payload {
                payload_id: self.import_payload(key_id, &ciphertext, logical_len)?,
            },
            Request::Status => ResponseBody::Status(self.status()),
            Request::Score(r) => ResponseBody::Score(self.weighted_score(&r)?),
            Request::Similarity(r) => ResponseBody::Similarity(self.similarity_rank(&r)?),
            Request::Aggregate(r) => ResponseBody::Aggregate(self.aggregate(&r)?),
            Request::Arithmetic(r) => ResponseBody::Arithmetic(self.verified_arithmetic(&r)?),
            Request::Vote(r) => ResponseBody::Vote(self.tally_votes(&r)?),
        })
    }

    /// Runs `request`, converting any failure into [`Response::Error`].
    pub fn handle(&self, request: Request) -> Response {
        let name = request.name();

        match self.dispatch(request) {
            Ok(body) => Response::Ok(body),
            Err(e) => {
                warn!("{name} failed: {e}");
                e.into()
            }
        }
    }

    /// Parses a JSON [`Request`], runs it and serializes the [`Response`] as a single line of
    /// JSON. Unparseable requests produce an [`ErrorKind::InvalidInput`] response.
    pub fn handle_json(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(e) => Error::invalid_input(format!("malformed request: {e}")).into(),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(r#"{{"error":{{"kind":"internal","message":"{e}"}}}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::test_utils::engine;

    fn call(engine: &Engine, request: Value) -> Value {
        serde_json::from_str(&engine.handle_json(&request.to_string())).unwrap()
    }

    #[test]
    fn can_drive_a_session_over_json() {
        let engine = engine();

        let resp = call(
            &engine,
            json!({"request": "generate_context", "scheme": "exact_integer"}),
        );
        let key_id = resp["ok"]["context"]["key_id"].clone();
        assert_eq!(resp["ok"]["context"]["key_info"]["preset"], "light");

        let resp = call(
            &engine,
            json!({"request": "encrypt", "key_id": key_id, "values": [1, 2, 3]}),
        );
        let a = resp["ok"]["payload"]["payload_id"].clone();

        let resp = call(
            &engine,
            json!({
                "request": "compute",
                "key_id": key_id,
                "operation": {"op": "add_plain", "values": [10]},
                "a": a,
            }),
        );
        let b = resp["ok"]["payload"]["payload_id"].clone();

        let resp = call(
            &engine,
            json!({"request": "decrypt", "key_id": key_id, "payload_id": b}),
        );
        assert_eq!(resp["ok"]["values"]["values"], json!([11.0, 12.0, 13.0]));

        let resp = call(
            &engine,
            json!({"request": "export_payload", "key_id": key_id, "payload_id": b}),
        );
        let ciphertext = resp["ok"]["ciphertext"]["ciphertext"].clone();

        let resp = call(
            &engine,
            json!({
                "request": "import_payload",
                "key_id": key_id,
                "ciphertext": ciphertext,
                "logical_len": 2,
            }),
        );
        let c = resp["ok"]["payload"]["payload_id"].clone();

        let resp = call(
            &engine,
            json!({"request": "decrypt", "key_id": key_id, "payload_id": c}),
        );
        assert_eq!(resp["ok"]["values"]["values"], json!([11.0, 12.0]));

        let resp = call(&engine, json!({"request": "cleanup_context", "key_id": key_id}));
        assert_eq!(resp["ok"]["cleaned"]["removed"], true);

        let resp = call(
            &engine,
            json!({"request": "decrypt", "key_id": key_id, "payload_id": c}),
        );
        assert_eq!(resp["error"]["kind"], "not_found");
    }

    #[test]
    fn protocols_are_reachable() {
        let engine = engine();

        let resp = call(
            &engine,
            json!({"request": "vote", "votes": [1, 1, 0], "num_candidates": 2}),
        );
        assert_eq!(resp["ok"]["vote"]["winner_label"], "candidate_1");

        let resp = call(
            &engine,
            json!({
                "request": "aggregate",
                "participants": [[1, 2], [3, 4]],
                "mode": "sum",
                "scheme": "exact_integer",
            }),
        );
        assert_eq!(resp["ok"]["aggregate"]["values"], json!([4.0, 6.0]));
    }

    #[test]
    fn bad_requests_become_errors() {
        let engine = engine();

        let resp = call(&engine, json!({"request": "frobnicate"}));
        assert_eq!(resp["error"]["kind"], "invalid_input");

        let resp = call(
            &engine,
            json!({
                "request": "compute",
                "key_id": 1,
                "operation": {"op": "divide"},
                "a": 1,
            }),
        );
        assert_eq!(resp["error"]["kind"], "invalid_input");

        let resp = call(&engine, json!({"request": "key_info", "key_id": 123456789}));
        assert_eq!(resp["error"]["kind"], "not_found");

        assert!(
            serde_json::from_str::<Value>(&engine.handle_json("{not json")).unwrap()["error"]
                .is_object()
        );
    }

    #[test]
    fn status_is_available_when_disabled() {
        let engine = crate::test_utils::disabled_engine();

        let resp = engine.handle(Request::Status);
        assert!(matches!(resp, Response::Ok(ResponseBody::Status(s)) if !s.available));

        let resp = engine.handle(Request::ListKeys);
        assert!(matches!(resp, Response::Error { kind: ErrorKind::Unavailable, .. }));
    }
}
