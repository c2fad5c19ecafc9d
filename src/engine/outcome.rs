//! Maps a command outcome to the prediction outcome that wins.

use crate::types::{CommandOutcome, Prediction};

/// Pick the winning outcome id: the success outcome when the command
/// succeeded, the failure outcome otherwise.
pub fn winning_outcome_id(prediction: &Prediction, outcome: CommandOutcome) -> &str {
    match outcome {
        CommandOutcome::Succeeded => &prediction.success_outcome_id,
        CommandOutcome::Failed => &prediction.failure_outcome_id,
    }
}
