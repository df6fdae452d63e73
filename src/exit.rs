//! Process exit codes of the command line tools.
//!
//! | code | meaning |
//! |------|---------|
//! | 0 | success |
//! | 1 | conversion failed: every attempted method failed, a mandatory upgrade failed, a partial file could not be removed, or two batch files share an output. Batch: at least one file failed |
//! | 2 | invalid command line |
//! | 3 | output file exists and `--force` was not given |
//! | 4 | no conversion method is available |
//! | 5 | input missing, configuration or other I/O error |

use crate::error::ConvertError;
use crate::outcome::ConversionOutcome;

pub const SUCCESS: u8 = 0;
pub const CONVERSION_FAILED: u8 = 1;
pub const USAGE: u8 = 2;
pub const OUTPUT_EXISTS: u8 = 3;
pub const NO_METHOD_AVAILABLE: u8 = 4;
pub const INPUT_OR_IO: u8 = 5;

pub fn for_outcome(outcome: &ConversionOutcome) -> u8 {
    match &outcome.error {
        None if outcome.is_success() => SUCCESS,
        None => CONVERSION_FAILED,
        Some(ConvertError::AlreadyExists(_)) => OUTPUT_EXISTS,
        Some(ConvertError::NoMethodAvailable { .. }) => NO_METHOD_AVAILABLE,
        Some(ConvertError::InputNotFound(_)) | Some(ConvertError::Io(_)) => INPUT_OR_IO,
        Some(
            ConvertError::AllMethodsFailed { .. }
            | ConvertError::UpgradeFailed { .. }
            | ConvertError::PartialWrite { .. }
            | ConvertError::DuplicateOutput { .. },
        ) => CONVERSION_FAILED,
    }
}
