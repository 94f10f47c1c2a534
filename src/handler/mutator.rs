//! Mutator dispatch (spec §4.4).

use tracing::warn;

use crate::config::{Registry, ResolvedMutator};
use crate::error::{LookupError, MutatorError, SentrixError};
use crate::model::DispatchEvent;
use crate::process::execute_command;

/// `mutate` (spec §4.4). No mutator name ⇒ the canonical JSON encoding of
/// `event`. A named mutator that fails (non-zero exit, extension error, or
/// an unknown name) is logged and aborts *this handler's* dispatch only —
/// callers must not propagate the error past the single handler in flight.
pub async fn mutate(
    registry: &Registry,
    name: Option<&str>,
    event: &DispatchEvent,
) -> Result<Vec<u8>, SentrixError> {
    let Some(name) = name else {
        return Ok(serde_json::to_vec(event).map_err(|e| SentrixError::internal(e.to_string()))?);
    };

    let payload = serde_json::to_vec(event).map_err(|e| SentrixError::internal(e.to_string()))?;

    match registry.mutator(name) {
        None => {
            warn!(mutator = name, "unknown mutator");
            Err(SentrixError::from(LookupError::Mutator(name.to_string())))
        }
        Some(ResolvedMutator::Config(cfg)) => {
            let Some(command) = cfg.command.clone() else {
                warn!(mutator = name, "mutator config has no command");
                return Err(SentrixError::from(LookupError::Mutator(name.to_string())));
            };
            let output = execute_command(&command, Some(payload)).await.map_err(|e| {
                warn!(mutator = name, error = %e, "mutator spawn failed");
                SentrixError::from(MutatorError::Spawn { mutator: name.to_string(), reason: e.to_string() })
            })?;
            if !output.success {
                warn!(mutator = name, status = output.code, "mutator exited non-zero");
                return Err(SentrixError::from(MutatorError::NonZeroExit {
                    mutator: name.to_string(),
                    status: output.code.unwrap_or(-1),
                }));
            }
            Ok(output.stdout.into_bytes())
        }
        Some(ResolvedMutator::Extension(ext)) => {
            let settings = registry.to_hash();
            ext.call(&payload, &settings).await.map_err(|e| {
                warn!(mutator = name, error = %e, "mutator extension failed");
                SentrixError::from(MutatorError::Extension { mutator: name.to_string(), reason: e.to_string() })
            })
        }
    }
}
