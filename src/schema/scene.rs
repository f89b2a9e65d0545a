use serde::{Deserialize, Serialize};

/// One selectable option within a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

impl Choice {
    pub fn new(label: &str, text: &str) -> Choice {
        Choice {
            label: label.to_string(),
            text: text.to_string(),
        }
    }
}

/// A unit of narrative shown to the player: prose plus the choices it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub narrative: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub is_epilogue: bool,
}

/// What the player picked in response to a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    /// Index into the current scene's choices.
    Option(usize),
    /// Free text typed by the player instead of a listed option.
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_defaults_to_not_epilogue() {
        let scene: Scene = ron::from_str(r#"(narrative: "x", choices: [(label: "A", text: "go")])"#)
            .unwrap();
        assert!(!scene.is_epilogue);
        assert_eq!(scene.choices[0], Choice::new("A", "go"));
    }
}
