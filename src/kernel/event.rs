use serde::{Deserialize, Serialize};

/// Methods the operator can force on the nearest target instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceTarget {
    ButtonPress,
    /// Closest to the native path; opens a trace window first when armed.
    OnClick,
}

impl ForceTarget {
    pub fn method_name(&self) -> &'static str {
        match self {
            ForceTarget::ButtonPress => "ButtonPress",
            ForceTarget::OnClick => "OnClick",
        }
    }

    pub fn opens_window(&self) -> bool {
        matches!(self, ForceTarget::OnClick)
    }
}

/// Operator triggers, however the host's input system delivers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Mark,
    ToggleTrace,
    ForceInvoke(ForceTarget),
}

impl Action {
    /// Parses an action name as typed on a console (`mark`, `toggle`, `buttonpress`, `onclick`).
    pub fn parse(name: &str) -> Option<Action> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mark" => Some(Action::Mark),
            "toggle" | "toggletrace" | "trace" => Some(Action::ToggleTrace),
            "buttonpress" => Some(Action::ForceInvoke(ForceTarget::ButtonPress)),
            "onclick" => Some(Action::ForceInvoke(ForceTarget::OnClick)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Action(Action),
    /// The host swapped scene/context; the instance cache must be rebuilt.
    ContextChanged,
}
