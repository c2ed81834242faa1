use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    Mouse,
    Keyboard,
    System,
    Web,
    File,
}

impl InteractionType {
    pub const ALL: [InteractionType; 5] = [
        InteractionType::Mouse,
        InteractionType::Keyboard,
        InteractionType::System,
        InteractionType::Web,
        InteractionType::File,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Read,
    Write,
}

/// A single desktop, web, file or shell action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Mouse {
        x: i32,
        y: i32,
        #[serde(default)]
        click: bool,
        #[serde(default)]
        button: MouseButton,
    },
    Keyboard {
        text: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    System {
        command: String,
    },
    Web {
        url: String,
    },
    File {
        path: PathBuf,
        operation: FileOperation,
        #[serde(default)]
        content: Option<String>,
    },
    /// Pointer path through `points`, smoothed into curves.
    Gesture {
        points: Vec<(f64, f64)>,
    },
    KeySequence {
        sequence: Vec<String>,
    },
    SystemSequence {
        commands: Vec<String>,
    },
}

impl Action {
    pub fn interaction_type(&self) -> InteractionType {
        match self {
            Action::Mouse { .. } | Action::Gesture { .. } => InteractionType::Mouse,
            Action::Keyboard { .. } | Action::Hotkey { .. } | Action::KeySequence { .. } => {
                InteractionType::Keyboard
            }
            Action::System { .. } | Action::SystemSequence { .. } => InteractionType::System,
            Action::Web { .. } => InteractionType::Web,
            Action::File { .. } => InteractionType::File,
        }
    }
}
