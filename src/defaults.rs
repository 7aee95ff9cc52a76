//! Default values for new tasks and the seed sets used by self-heal.

/// Status name used when a task's status cannot be resolved and the project has none.
pub const DEFAULT_STATUS: &str = "Not Started";

/// Sentinel display name for an absent priority or type.
pub const UNSELECTED: &str = "Unselected";

/// Key shown for a task until the store assigns the real one.
pub const PENDING_KEY: &str = "Generating...";

/// A seed enumeration entry: (name, color, icon).
pub type SeedEntry = (&'static str, Option<&'static str>, Option<&'static str>);

pub const DEFAULT_STATUSES: [SeedEntry; 3] = [
    ("Not Started", Some("slate"), None),
    ("In Progress", Some("blue"), None),
    ("Done", Some("emerald"), None),
];

pub const DEFAULT_PRIORITIES: [SeedEntry; 3] = [
    ("High", Some("rose"), None),
    ("Medium", Some("amber"), None),
    ("Low", Some("blue"), None),
];

pub const DEFAULT_TYPES: [SeedEntry; 4] = [
    ("Bug", None, Some("bug")),
    ("Task", None, Some("check")),
    ("Request", None, Some("lightbulb")),
    ("Other", None, Some("help-circle")),
];

/// Sections created alongside a new project.
pub const DEFAULT_SECTIONS: [&str; 3] = ["Not Started", "In Progress", "Done"];
