use super::domain::{ApplyChannel, DocumentId, DocumentKind, JobRecord, RunContext};

/// What the run should do with a posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Submit now with these documents, in the posting's declared order.
    Submit(Vec<DocumentId>),
    DeferOpenDate,
    RejectExternalChannel,
    /// Carries the first required kind the user has no document for.
    RejectUnsupportedDocument(DocumentKind),
}

impl Action {
    pub fn summary(&self) -> String {
        match self {
            Action::Submit(documents) => {
                format!("eligible, submitting {} document(s)", documents.len())
            }
            Action::DeferOpenDate => "application window not open yet".to_string(),
            Action::RejectExternalChannel => "applications are taken off-platform".to_string(),
            Action::RejectUnsupportedDocument(kind) => {
                format!("requires a {kind} with no configured document")
            }
        }
    }
}

/// Classify a posting. First matching rule wins:
///
/// 1. external channel
/// 2. window opens after `context.now`
/// 3. a required document kind is unbound
/// 4. submit
///
/// The channel check comes first so an external posting never lands on the waitlist.
pub fn decide(record: &JobRecord, context: &RunContext) -> Action {
    if record.apply_channel() != ApplyChannel::Internal {
        return Action::RejectExternalChannel;
    }

    if let Some(opens_at) = record.apply_opens_at() {
        if opens_at > context.now {
            return Action::DeferOpenDate;
        }
    }

    let mut documents = Vec::with_capacity(record.required_documents().len());
    for kind in record.required_documents() {
        match context.documents.get(*kind) {
            Some(id) => documents.push(id),
            None => return Action::RejectUnsupportedDocument(*kind),
        }
    }

    Action::Submit(documents)
}
