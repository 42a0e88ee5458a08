use crate::errors::AppResult;
use crate::goals;
use crate::models::{SmartGoalSet, WhiteboardRecord, WhiteboardScene};
use crate::store::{BlobStore, DocumentStore};
use crate::whiteboard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Screens inside the brainstorming area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ActiveView {
    Brainstorming {
        #[serde(default)]
        search: Option<String>,
    },
    /// `url: None` opens a blank canvas.
    Whiteboard {
        #[serde(default)]
        url: Option<String>,
    },
    SmartGoals,
    MindFlow,
}

impl Default for ActiveView {
    fn default() -> Self {
        Self::Brainstorming { search: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum ViewData {
    Brainstorming { whiteboards: Vec<WhiteboardRecord> },
    Whiteboard { url: Option<String>, scene: WhiteboardScene },
    SmartGoals { goals: SmartGoalSet },
    MindFlow,
}

/// Loads what the selected screen shows. Without a signed-in user the
/// per-user screens come back empty.
pub fn render(
    view: &ActiveView,
    store: &dyn DocumentStore,
    blobs: &dyn BlobStore,
    uid: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<ViewData> {
    match view {
        ActiveView::Brainstorming { search } => {
            let mut whiteboards = match uid {
                Some(uid) => whiteboard::list_whiteboards(store, uid)?,
                None => Vec::new(),
            };
            if let Some(needle) = search.as_deref().map(str::trim).filter(|needle| !needle.is_empty()) {
                let needle = needle.to_lowercase();
                whiteboards.retain(|record| record.title.to_lowercase().contains(&needle));
            }
            Ok(ViewData::Brainstorming { whiteboards })
        }
        ActiveView::Whiteboard { url: None } => Ok(ViewData::Whiteboard {
            url: None,
            scene: WhiteboardScene {
                kind: "excalidraw".to_string(),
                ..WhiteboardScene::default()
            },
        }),
        ActiveView::Whiteboard { url: Some(url) } => Ok(ViewData::Whiteboard {
            scene: whiteboard::open_whiteboard(store, blobs, uid, url, now)?,
            url: Some(url.clone()),
        }),
        ActiveView::SmartGoals => {
            let goals = match uid {
                Some(uid) => goals::load_goals(store, uid)?,
                None => SmartGoalSet::default(),
            };
            Ok(ViewData::SmartGoals { goals })
        }
        ActiveView::MindFlow => Ok(ViewData::MindFlow),
    }
}
