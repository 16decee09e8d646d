//! Action extraction from raw model responses.
//!
//! The scanner is an explicit state machine (outside-wrapper, seeking-marker,
//! capturing-body) rather than a regular expression, so body capture can later
//! be made length-delimited or escape-aware without touching callers.
//!
//! Known limitation: action bodies are matched non-greedily, so a file whose
//! content contains the literal closing marker text mis-terminates early. The
//! source markup vocabulary has no escape mechanism; this stays best-effort.

use super::Action;

const ARTIFACT_OPEN: &str = "<boltArtifact";
const ARTIFACT_CLOSE: &str = "</boltArtifact>";
const ACTION_OPEN: &str = "<boltAction";
const ACTION_CLOSE: &str = "</boltAction>";

const DEFAULT_TITLE: &str = "Project Files";

/// Result of scanning one model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Artifact title ("Project Files" when absent)
    pub title: String,
    /// Actions in encounter order
    pub actions: Vec<Action>,
    /// Trimmed free text before the wrapper's opening tag
    pub intro: Option<String>,
    /// Trimmed free text after the wrapper's closing tag
    pub outro: Option<String>,
    /// Whether a complete wrapper was found. Distinguishes "no actionable
    /// content yet" (conversational reply) from an artifact with zero actions.
    pub artifact_found: bool,
}

impl Extraction {
    fn absent(intro: Option<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            actions: Vec::new(),
            intro,
            outro: None,
            artifact_found: false,
        }
    }
}

/// Extract actions and surrounding free text from a raw model response.
///
/// Absence of the wrapper is not an error: it signals "no actionable content
/// yet" (conversational replies), and the whole response becomes the intro.
/// A wrapper whose closing tag never arrives is treated the same way; the
/// markup is streaming-unsafe and a half-received artifact yields nothing
/// actionable rather than a partial parse.
pub fn extract(response: &str) -> Extraction {
    // Outside-wrapper state: locate the single outermost wrapper.
    let Some(open_idx) = response.find(ARTIFACT_OPEN) else {
        return Extraction::absent(non_empty_trimmed(response));
    };
    let intro = non_empty_trimmed(&response[..open_idx]);

    let Some(tag_len) = response[open_idx..].find('>') else {
        return Extraction::absent(intro);
    };
    let attrs = &response[open_idx + ARTIFACT_OPEN.len()..open_idx + tag_len];
    let title = attr_value(attrs, "title")
        .unwrap_or(DEFAULT_TITLE)
        .to_string();

    let body_start = open_idx + tag_len + 1;
    let Some(close_rel) = response[body_start..].find(ARTIFACT_CLOSE) else {
        let mut extraction = Extraction::absent(intro);
        extraction.title = title;
        return extraction;
    };

    let body = &response[body_start..body_start + close_rel];
    let outro = non_empty_trimmed(&response[body_start + close_rel + ARTIFACT_CLOSE.len()..]);

    Extraction {
        title,
        actions: scan_actions(body),
        intro,
        outro,
        artifact_found: true,
    }
}

/// Scanner state inside the wrapper body.
enum ScanState {
    /// Looking for the next `<boltAction ...>` marker.
    SeekingMarker,
    /// Marker parsed; capturing raw inner text until the closing marker.
    CapturingBody {
        kind: String,
        file_path: Option<String>,
    },
}

/// Scan a block of text for action markers, in encounter order.
///
/// This deliberately does not require the artifact wrapper: the tree builder
/// re-runs it over synthesized markup that carries bare file actions.
/// Unrecognized marker types are skipped, not errors.
pub fn scan_actions(text: &str) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut pos = 0;
    let mut state = ScanState::SeekingMarker;

    loop {
        match state {
            ScanState::SeekingMarker => {
                let Some(open_rel) = text[pos..].find(ACTION_OPEN) else {
                    break;
                };
                let tag_start = pos + open_rel;
                let Some(tag_len) = text[tag_start..].find('>') else {
                    // Truncated opening tag; nothing more to recover.
                    break;
                };
                let attrs = &text[tag_start + ACTION_OPEN.len()..tag_start + tag_len];
                state = ScanState::CapturingBody {
                    kind: attr_value(attrs, "type").unwrap_or_default().to_string(),
                    file_path: attr_value(attrs, "filePath").map(str::to_string),
                };
                pos = tag_start + tag_len + 1;
            }
            ScanState::CapturingBody { kind, file_path } => {
                let Some(close_rel) = text[pos..].find(ACTION_CLOSE) else {
                    // Unterminated action body; drop the incomplete action.
                    break;
                };
                let raw = &text[pos..pos + close_rel];

                match (kind.as_str(), file_path) {
                    ("file", Some(path)) => actions.push(Action::File {
                        path,
                        content: raw.to_string(),
                    }),
                    ("shell", _) => actions.push(Action::Shell {
                        command: raw.trim().to_string(),
                    }),
                    (other, _) => {
                        tracing::debug!("Skipping unrecognized action type {:?}", other);
                    }
                }

                pos += close_rel + ACTION_CLOSE.len();
                state = ScanState::SeekingMarker;
            }
        }
    }

    actions
}

/// Find `name="value"` inside a tag's attribute text.
fn attr_value<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let start = attrs.find(&needle)? + needle.len();
    let len = attrs[start..].find('"')?;
    Some(&attrs[start..start + len])
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
