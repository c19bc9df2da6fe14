/// Output key carrying the classifier label.
pub const CLASSIFICATION_KEY: &str = "classification";
/// Output key carrying the classifier confidence.
pub const CONFIDENCE_KEY: &str = "confidence";
/// Context variable holding the last reply text.
pub const LAST_REPLY_KEY: &str = "lastReply";
/// Condition value when the field has no value.
pub const NO_VALUE: &str = "none";

pub const REPLY_RECEIVED: &str = "reply received";
pub const NO_REPLY_TO_CLASSIFY: &str = "No reply to classify";
pub const DEFAULT_BRANCH_RESULT: &str = "Default branch: next step";
