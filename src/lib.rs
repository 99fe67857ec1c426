/// Binary codecs shared by the quest and model formats: cursors, PRS, `.qst` containers
pub mod data;
/// Warnings collected while decoding
pub mod diagnostics;
/// Ninja chunk models (`.nj`)
pub mod models;
/// Quest assembly from `.qst` containers, plus the `.dat` and `.bin` codecs
pub mod quest;
/// Generic wrapper for values that may or may not match a known variant.
pub mod recognized;
