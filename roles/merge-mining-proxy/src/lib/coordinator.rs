//! ## Merge-Mining Coordinator
//!
//! Implements the `getwork` method exposed to the worker.
//!
//! Without arguments it builds a template: a fresh auxiliary block is requested, its hash is
//! committed into the parent template through `getworkaux`, and the template target is
//! lowered to the auxiliary target when that one is harder.
//!
//! With a solved header it submits the share: the parent first checks the share as an
//! auxiliary proof candidate, the proof is relayed to the auxiliary chain, and only then the
//! parent is asked to accept the share as a block of its own.
use rpc_mm::{Dispatcher, MethodError, RpcApi};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    aux_chain::{aux_hash_of, AuxBlockHandle, AuxChains},
    error::{ProxyError, ProxyResult},
    report::{SolveRecord, SolveReporter},
    target::harder_target,
};

pub const GETWORK: &str = "getwork";
pub const GETWORKAUX: &str = "getworkaux";
pub const GETAUXBLOCK: &str = "getauxblock";

/// `getworkaux` flag: validate the share as an auxiliary proof candidate only.
const CANDIDATE_ONLY: u32 = 0;

/// Template handed to the worker. Members other than `data`, `target` and `aux` (such as
/// `midstate` or `hash1`) are passed through as the parent returned them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkTemplate {
    pub data: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct MergeMiningCoordinator {
    parent: Arc<dyn RpcApi>,
    aux: AuxChains,
    reporter: Arc<dyn SolveReporter>,
    // Submissions run one at a time, in arrival order. Templates are not serialized.
    submission: Mutex<()>,
}

impl MergeMiningCoordinator {
    pub fn new(
        parent: Arc<dyn RpcApi>,
        aux: AuxChains,
        reporter: Arc<dyn SolveReporter>,
    ) -> Self {
        Self {
            parent,
            aux,
            reporter,
            submission: Mutex::new(()),
        }
    }

    /// Registers `getwork` on `dispatcher`.
    pub fn register(self: &Arc<Self>, dispatcher: &mut Dispatcher) {
        let coordinator = self.clone();
        dispatcher.register(GETWORK, move |params| {
            let coordinator = coordinator.clone();
            async move {
                coordinator
                    .getwork(params)
                    .await
                    .map_err(MethodError::from)
            }
        });
    }

    /// `getwork()` returns a [`WorkTemplate`], `getwork(data)` whether the share was accepted.
    pub async fn getwork(&self, params: Vec<Value>) -> ProxyResult<Value> {
        match solved_data(params)? {
            None => Ok(serde_json::to_value(self.get_template().await?)?),
            Some(data) => Ok(Value::Bool(self.submit(&data).await?.accepted())),
        }
    }

    pub async fn get_template(&self) -> ProxyResult<WorkTemplate> {
        let aux_block = self.aux.chain().call(GETAUXBLOCK, vec![]).await?;
        let handle: AuxBlockHandle = serde_json::from_value(aux_block)
            .map_err(|e| ProxyError::MalformedAuxBlock(e.to_string()))?;
        let commitment = self.aux.commit(&handle)?.to_hex();

        let work = self
            .parent
            .call(GETWORKAUX, vec![Value::String(commitment.clone())])
            .await?;
        let mut template: WorkTemplate = serde_json::from_value(work)
            .map_err(|e| ProxyError::MalformedTemplate(e.to_string()))?;

        let target = harder_target(&template.target, &handle.target)?.to_string();
        debug!(
            "New work for aux block {}: parent target {}, aux target {}, using {}",
            handle.hash, template.target, handle.target, target
        );
        template.target = target;
        template.aux.get_or_insert(commitment);
        Ok(template)
    }

    pub async fn submit(&self, data: &str) -> ProxyResult<SolveRecord> {
        let _submission = self.submission.lock().await;

        let proof = self
            .parent
            .call(
                GETWORKAUX,
                vec![json!(""), json!(data), json!(CANDIDATE_ONLY)],
            )
            .await?;
        if !is_truthy(&proof) {
            // Nothing to relay: the share is not valid for the auxiliary chain.
            return Ok(self.report(false, false));
        }

        let commitment = proof
            .get("aux")
            .and_then(Value::as_str)
            .ok_or_else(|| ProxyError::MalformedProof("missing `aux` commitment".to_string()))?;
        let aux_hash = aux_hash_of(commitment)?.to_string();

        let aux_accepted = self
            .aux
            .chain()
            .call(GETAUXBLOCK, vec![Value::String(aux_hash), proof.clone()])
            .await?;
        let parent_accepted = self
            .parent
            .call(GETWORKAUX, vec![json!(""), json!(data)])
            .await?;

        Ok(self.report(is_truthy(&parent_accepted), is_truthy(&aux_accepted)))
    }

    fn report(&self, parent_accepted: bool, aux_accepted: bool) -> SolveRecord {
        let record = SolveRecord::new(parent_accepted, aux_accepted);
        self.reporter.report(&record);
        record
    }
}

/// `getwork` takes no argument or a single hex string. `null` and `""` mean no argument.
fn solved_data(mut params: Vec<Value>) -> ProxyResult<Option<String>> {
    if params.len() > 1 {
        return Err(ProxyError::InvalidParams(format!(
            "expected at most 1 param, got {}",
            params.len()
        )));
    }
    match params.pop() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(data)) if data.is_empty() => Ok(None),
        Some(Value::String(data)) => Ok(Some(data)),
        Some(other) => Err(ProxyError::InvalidParams(format!(
            "expected hex string, got {other}"
        ))),
    }
}

/// Daemons answer with `false`, `null` or empty values for "no".
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
