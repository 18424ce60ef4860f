use chrono::{DateTime, Utc};
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::stage::Stage;

/// What happened to a candidate. Recorded structurally at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityAction {
    StageChanged { from: Stage, to: Stage },
    CandidateCreated,
    NoteAdded,
    Other { text: String },
}

impl ActivityAction {
    /// Compact token form, e.g. `stage_changed:applied->screening`.
    pub fn token(&self) -> String {
        match self {
            ActivityAction::StageChanged { from, to } => format!("stage_changed:{}->{}", from, to),
            ActivityAction::CandidateCreated => "candidate_created".to_string(),
            ActivityAction::NoteAdded => "note_added".to_string(),
            ActivityAction::Other { text } => text.clone(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ActivityAction::StageChanged { from, to } => {
                format!("Stage moved: {} -> {}", from.label(), to.label())
            }
            ActivityAction::CandidateCreated => "Candidate created".to_string(),
            ActivityAction::NoteAdded => "Note added".to_string(),
            ActivityAction::Other { text } => text.replace('_', " "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, FromRow)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub candidate_id: Uuid,
    #[sqlx(json)]
    pub action: ActivityAction,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Serialized with the rendered `token` and `label` next to the structured action.
impl Serialize for ActivityLogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entry = serializer.serialize_struct("ActivityLogEntry", 7)?;
        entry.serialize_field("id", &self.id)?;
        entry.serialize_field("candidate_id", &self.candidate_id)?;
        entry.serialize_field("action", &self.action)?;
        entry.serialize_field("token", &self.action.token())?;
        entry.serialize_field("label", &self.action.label())?;
        entry.serialize_field("performed_by", &self.performed_by)?;
        entry.serialize_field("created_at", &self.created_at)?;
        entry.end()
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub action: ActivityAction,
    pub performed_by: Option<Uuid>,
}

impl NewActivity {
    pub fn new(action: ActivityAction, performed_by: Uuid) -> Self {
        Self {
            action,
            performed_by: Some(performed_by),
        }
    }
}
