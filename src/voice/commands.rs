//! Quick command catalogue

/// A pre-supplied command offered next to the microphone button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickCommand {
    pub label: &'static str,
    pub command: &'static str,
}

pub const QUICK_COMMANDS: &[QuickCommand] = &[
    QuickCommand {
        label: "Car Status",
        command: "What's my car status?",
    },
    QuickCommand {
        label: "Check Speed",
        command: "What's my current speed?",
    },
    QuickCommand {
        label: "Fuel Level",
        command: "How much fuel do I have?",
    },
    QuickCommand {
        label: "Engine Temp",
        command: "What's the engine temperature?",
    },
    QuickCommand {
        label: "Trip Info",
        command: "What's my trip distance?",
    },
    QuickCommand {
        label: "Help",
        command: "What can you do?",
    },
];

impl QuickCommand {
    /// Lowercase, dash-separated label (`"Check Speed"` -> `"check-speed"`)
    #[must_use]
    pub fn slug(&self) -> String {
        self.label.to_lowercase().replace(' ', "-")
    }
}

/// Look up a quick command by label or slug, ignoring case
#[must_use]
pub fn find_quick_command(name: &str) -> Option<&'static QuickCommand> {
    let name = name.trim();
    QUICK_COMMANDS
        .iter()
        .find(|quick| quick.label.eq_ignore_ascii_case(name) || quick.slug() == name.to_lowercase())
}
