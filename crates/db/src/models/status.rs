//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data in the
//! corresponding `*_statuses` table, and its name matches the `name` column.

use serde::Serialize;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lookup-table name of this status.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Map a database status ID back to its variant.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

define_status_enum! {
    /// Run job lifecycle: `queued -> running -> {completed, failed}`.
    JobStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl JobStatus {
    /// Statuses that count toward the one-active-job-per-order rule.
    pub const ACTIVE: [JobStatus; 2] = [JobStatus::Queued, JobStatus::Running];

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }
}

define_status_enum! {
    /// Order pipeline status.
    OrderStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Review = 3 => "review",
        Completed = 4 => "completed",
        Error = 5 => "error",
    }
}

define_status_enum! {
    /// Validation project status.
    ProjectStatus {
        Pending = 1 => "pending",
        Researching = 2 => "researching",
        Review = 3 => "review",
        Completed = 4 => "completed",
        Error = 5 => "error",
    }
}
